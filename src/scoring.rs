// Calibrate-then-probe protocol and pass/fail accounting.

use crate::platform::{InterruptControl, InterruptGuard, Platform};
use crate::probe::ProbeSource;
use crate::registry::{Registry, TimingTest};
use crate::timings::{Metric, TimingRecord};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Raw probe output paired with the baseline it is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Measurement {
    pub measured: TimingRecord,
    pub baseline: TimingRecord,
}

impl Measurement {
    pub fn delta(&self, metric: Metric) -> i32 {
        self.measured[metric].wrapping_sub(self.baseline[metric])
    }

    pub fn deltas(&self) -> TimingRecord {
        self.measured.delta(&self.baseline)
    }
}

/// Calibrates and runs `test`'s probe with interrupts masked.
///
/// `calibration` is overwritten with the fresh baseline. For the calibration
/// entry (no probe) the fresh baseline is itself the measurement and it is
/// compared against zero, so its delta is the raw overhead.
pub fn measure<I, S>(
    interrupts: &mut I,
    probes: &mut S,
    test: &TimingTest,
    calibration: &mut TimingRecord,
) -> Measurement
where
    I: InterruptControl + ?Sized,
    S: ProbeSource + ?Sized,
{
    let _masked = InterruptGuard::new(interrupts);
    probes.calibrate(calibration);
    match test.probe {
        Some(probe) => {
            let mut measured = TimingRecord::ZERO;
            probes.run(probe, &mut measured);
            Measurement {
                measured,
                baseline: *calibration,
            }
        }
        None => Measurement {
            measured: *calibration,
            baseline: TimingRecord::ZERO,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricOutcome {
    pub metric: Metric,
    /// WAITCNT setting the metric was measured under; `None` for work RAM.
    pub waitcnt: Option<u16>,
    pub delta: i32,
    pub expected: i32,
    pub passed: bool,
}

/// Compares every metric active for `test` against its expectation.
pub fn outcomes<'a>(
    test: &'a TimingTest,
    measurement: &'a Measurement,
) -> impl Iterator<Item = MetricOutcome> + 'a {
    test.modes.active_metrics().iter().map(move |&metric| {
        let delta = measurement.delta(metric);
        let expected = test.expected[metric];
        MetricOutcome {
            metric,
            waitcnt: metric.waitcnt(),
            delta,
            expected,
            passed: delta == expected,
        }
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TestScore {
    pub passes: u32,
    pub total: u32,
}

impl TestScore {
    pub fn all_passed(&self) -> bool {
        self.passes == self.total
    }
}

pub fn score(test: &TimingTest, measurement: &Measurement) -> TestScore {
    let mut result = TestScore::default();
    for outcome in outcomes(test, measurement) {
        result.total += 1;
        if outcome.passed {
            result.passes += 1;
        }
    }
    result
}

/// Pass/total counters from the startup sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ScoreSummary {
    passes: u32,
    total_results: u32,
}

impl ScoreSummary {
    pub fn passes(&self) -> u32 {
        self.passes
    }

    pub fn total_results(&self) -> u32 {
        self.total_results
    }

    pub fn failures(&self) -> u32 {
        self.total_results - self.passes
    }

    fn record(&mut self, score: TestScore) {
        self.passes += score.passes;
        self.total_results += score.total;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestResult {
    pub index: usize,
    pub measurement: Measurement,
    pub score: TestScore,
}

/// Outcome of the one-time sweep over the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sweep {
    pub summary: ScoreSummary,
    pub results: Vec<TestResult>,
}

/// Measures and scores every registry entry in order, one per frame.
///
/// Each entry waits for VBlank with interrupts enabled, then calibrates and
/// probes inside an [`InterruptGuard`].
pub fn run_sweep<P, S>(
    platform: &mut P,
    probes: &mut S,
    registry: &Registry,
    calibration: &mut TimingRecord,
) -> Sweep
where
    P: Platform + ?Sized,
    S: ProbeSource + ?Sized,
{
    let mut summary = ScoreSummary::default();
    let mut results = Vec::with_capacity(registry.len());
    for (index, test) in registry.iter().enumerate() {
        platform.wait_for_vblank();
        let measurement = measure(&mut *platform, &mut *probes, test, calibration);
        let test_score = score(test, &measurement);
        for outcome in outcomes(test, &measurement).filter(|o| !o.passed) {
            warn!(
                test = test.name,
                metric = outcome.metric.label(),
                delta = outcome.delta,
                expected = outcome.expected,
                "timing mismatch"
            );
        }
        debug!(
            index,
            test = test.name,
            passes = test_score.passes,
            total = test_score.total,
            "scored"
        );
        summary.record(test_score);
        results.push(TestResult {
            index,
            measurement,
            score: test_score,
        });
    }
    info!(
        passes = summary.passes,
        total = summary.total_results,
        "timing sweep complete"
    );
    Sweep { summary, results }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::HeadlessPlatform;
    use crate::probe::ReferenceProbes;
    use crate::registry::Probe;
    use crate::timings::Modes;

    #[test]
    fn measure_masks_interrupts_once_and_restores() {
        let registry = Registry::builtin();
        let mut platform = HeadlessPlatform::new();
        let mut probes = ReferenceProbes::new(&registry);
        let mut calibration = TimingRecord::ZERO;
        measure(&mut platform, &mut probes, &registry[1], &mut calibration);
        assert_eq!(platform.mask_count(), 1);
        assert!(platform.interrupts_enabled());
        assert_eq!(calibration, registry.calibration().expected);
    }

    #[test]
    fn calibration_entry_compares_against_zero() {
        let registry = Registry::builtin();
        let mut platform = HeadlessPlatform::new();
        let mut probes = ReferenceProbes::new(&registry);
        let mut calibration = TimingRecord::ZERO;
        let m = measure(&mut platform, &mut probes, registry.calibration(), &mut calibration);
        assert_eq!(m.baseline, TimingRecord::ZERO);
        assert_eq!(m.deltas(), m.measured);
        assert_eq!(m.measured, calibration);
        assert_eq!(probes.runs(), 0);
    }

    #[test]
    fn nop_example_passes_when_calibration_is_six() {
        let test = TimingTest::new(
            "nop",
            Some(Probe::Nop),
            Modes::BOTH,
            TimingRecord::new([6; 20]),
        );
        let mut measured = TimingRecord::ZERO;
        measured[Metric::ArmRom0000] = 12;
        let mut baseline = TimingRecord::ZERO;
        baseline[Metric::ArmRom0000] = 6;
        let m = Measurement { measured, baseline };
        let first = outcomes(&test, &m).next().expect("first metric");
        assert_eq!(first.delta, 6);
        assert!(first.passed);

        baseline[Metric::ArmRom0000] = 5;
        let m = Measurement { measured, baseline };
        let first = outcomes(&test, &m).next().expect("first metric");
        assert_eq!(first.delta, 7);
        assert!(!first.passed);
        assert_eq!(first.expected, 6);
    }

    #[test]
    fn arm_only_test_scores_ten_metrics() {
        let test = TimingTest::new(
            "ldmia",
            Some(Probe::Ldmia1),
            Modes::ARM,
            TimingRecord::arm_only([1; 10]),
        );
        let mut measured = TimingRecord::new([1; 20]);
        // Garbage in the Thumb half must not be counted.
        measured[Metric::ThumbRom0000] = 999;
        let m = Measurement {
            measured,
            baseline: TimingRecord::ZERO,
        };
        let result = score(&test, &m);
        assert_eq!(result, TestScore { passes: 10, total: 10 });
        assert!(result.all_passed());
    }

    #[test]
    fn reference_sweep_passes_everything() {
        let registry = Registry::builtin();
        let mut platform = HeadlessPlatform::new();
        let mut probes = ReferenceProbes::new(&registry);
        let mut calibration = TimingRecord::ZERO;
        let sweep = run_sweep(&mut platform, &mut probes, &registry, &mut calibration);
        assert_eq!(sweep.summary.total_results(), 500);
        assert_eq!(sweep.summary.passes(), 500);
        assert_eq!(sweep.summary.failures(), 0);
        assert_eq!(sweep.results.len(), registry.len());
        assert_eq!(platform.frames(), registry.len() as u64);
        assert_eq!(platform.mask_count(), registry.len() as u64);
        assert_eq!(platform.masked_vblank_waits(), 0);
    }

    #[test]
    fn skewed_probe_fails_shared_rows() {
        let registry = Registry::builtin();
        let mut platform = HeadlessPlatform::new();
        let mut probes = ReferenceProbes::new(&registry);
        probes.skew(Probe::B, Metric::ThumbIwram, 2);
        let mut calibration = TimingRecord::ZERO;
        let sweep = run_sweep(&mut platform, &mut probes, &registry, &mut calibration);
        // "b pc" and "nop ; b pc" both use the branch probe.
        assert_eq!(sweep.summary.failures(), 2);
        let failing: Vec<&str> = sweep
            .results
            .iter()
            .filter(|r| !r.score.all_passed())
            .map(|r| registry[r.index].name)
            .collect();
        assert_eq!(failing, vec!["b pc", "nop ; b pc"]);
    }

    #[test]
    fn calibration_skew_only_moves_calibration_row() {
        let registry = Registry::builtin();
        let mut platform = HeadlessPlatform::new();
        let mut probes = ReferenceProbes::new(&registry);
        // A shifted baseline cancels out for every probe but shows up in the
        // calibration row's own delta.
        probes.skew_calibration(Metric::ArmEwram, 3);
        let mut calibration = TimingRecord::ZERO;
        let sweep = run_sweep(&mut platform, &mut probes, &registry, &mut calibration);
        assert_eq!(sweep.summary.failures(), 1);
        assert!(!sweep.results[0].score.all_passed());
    }
}
