use crate::registry::{Probe, Registry};
use crate::timings::{Metric, TimingRecord};
use std::collections::HashMap;

/// Runs timing probes and the calibration routine.
///
/// Implementations fill every field of `out`. They are always called with
/// interrupts masked by the caller and must not signal errors.
pub trait ProbeSource {
    /// Measures the bare harness overhead (an empty probe body).
    fn calibrate(&mut self, out: &mut TimingRecord);

    fn run(&mut self, probe: Probe, out: &mut TimingRecord);
}

impl<S: ProbeSource + ?Sized> ProbeSource for &mut S {
    fn calibrate(&mut self, out: &mut TimingRecord) {
        (**self).calibrate(out);
    }

    fn run(&mut self, probe: Probe, out: &mut TimingRecord) {
        (**self).run(probe, out);
    }
}

impl<S: ProbeSource + ?Sized> ProbeSource for Box<S> {
    fn calibrate(&mut self, out: &mut TimingRecord) {
        (**self).calibrate(out);
    }

    fn run(&mut self, probe: Probe, out: &mut TimingRecord) {
        (**self).run(probe, out);
    }
}

/// Model of a console that matches every expectation in a registry.
///
/// Calibration returns the calibration entry's expected values; each probe
/// returns the current baseline plus the expected delta of the first test
/// using it. Individual metrics can be skewed to model a timing bug.
#[derive(Debug, Clone)]
pub struct ReferenceProbes {
    baseline: TimingRecord,
    /// Cycles each probe adds on top of the baseline.
    probes: HashMap<Probe, TimingRecord>,
    calibrations: u64,
    runs: u64,
}

impl ReferenceProbes {
    pub fn new(registry: &Registry) -> Self {
        let baseline = registry.calibration().expected;
        let mut probes = HashMap::new();
        for test in registry.iter() {
            if let Some(probe) = test.probe {
                probes.entry(probe).or_insert(test.expected);
            }
        }
        Self {
            baseline,
            probes,
            calibrations: 0,
            runs: 0,
        }
    }

    pub fn baseline(&self) -> &TimingRecord {
        &self.baseline
    }

    /// Adds `cycles` to one metric of one probe's raw output.
    pub fn skew(&mut self, probe: Probe, metric: Metric, cycles: i32) -> &mut Self {
        let record = self.probes.entry(probe).or_insert(TimingRecord::ZERO);
        record[metric] = record[metric].wrapping_add(cycles);
        self
    }

    /// Adds `cycles` to one metric of the harness overhead. Probes carry the
    /// same overhead, so only the calibration row's own delta moves.
    pub fn skew_calibration(&mut self, metric: Metric, cycles: i32) -> &mut Self {
        self.baseline[metric] = self.baseline[metric].wrapping_add(cycles);
        self
    }

    pub fn calibrations(&self) -> u64 {
        self.calibrations
    }

    pub fn runs(&self) -> u64 {
        self.runs
    }
}

impl ProbeSource for ReferenceProbes {
    fn calibrate(&mut self, out: &mut TimingRecord) {
        self.calibrations += 1;
        *out = self.baseline;
    }

    fn run(&mut self, probe: Probe, out: &mut TimingRecord) {
        self.runs += 1;
        let body = self.probes.get(&probe).copied().unwrap_or(TimingRecord::ZERO);
        *out = self.baseline.offset_by(&body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_output_is_baseline_plus_expected() {
        let registry = Registry::builtin();
        let mut probes = ReferenceProbes::new(&registry);
        let mut baseline = TimingRecord::ZERO;
        probes.calibrate(&mut baseline);
        assert_eq!(baseline, registry.calibration().expected);

        let nop = &registry[1];
        let mut measured = TimingRecord::ZERO;
        probes.run(Probe::Nop, &mut measured);
        assert_eq!(measured.delta(&baseline), nop.expected);
        assert_eq!(probes.calibrations(), 1);
        assert_eq!(probes.runs(), 1);
    }

    #[test]
    fn calibration_is_repeatable() {
        let registry = Registry::builtin();
        let mut probes = ReferenceProbes::new(&registry);
        let mut first = TimingRecord::ZERO;
        let mut second = TimingRecord::ZERO;
        probes.calibrate(&mut first);
        probes.calibrate(&mut second);
        assert_eq!(first, second);
    }

    #[test]
    fn skew_shifts_a_single_metric() {
        let registry = Registry::builtin();
        let mut probes = ReferenceProbes::new(&registry);
        probes.skew(Probe::Nop, Metric::ArmRom0000, 1);
        let mut measured = TimingRecord::ZERO;
        probes.run(Probe::Nop, &mut measured);
        let delta = measured.delta(probes.baseline());
        assert_eq!(delta[Metric::ArmRom0000], 7);
        assert_eq!(delta[Metric::ArmRom4000], 6);
    }
}
