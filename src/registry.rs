use crate::timings::{Modes, TimingRecord};
use crate::{HarnessError, Result};
use serde::{Deserialize, Serialize};

/// Hand-timed instruction sequences. Each variant names one probe routine; the
/// routine itself lives on the target (see [`crate::probe::ProbeSource`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Probe {
    Nop,
    Nop2,
    Ldrh,
    LdrhNop,
    NopLdrh,
    Strh,
    StrhNop,
    NopStrh,
    Ldmia1,
    Ldmia2,
    Ldmia6,
    Ldmia1x2,
    Ldmia2x2,
    Ldmia6x2,
    Stmia1,
    Stmia2,
    Stmia6,
    Stmia1x2,
    Stmia2x2,
    Stmia6x2,
    Mul0,
    Mul1,
    Mul2,
    Mul3,
    Mul4,
    B,
    Bx,
    Div,
    CpuSet,
}

impl Probe {
    pub const ALL: [Probe; 29] = [
        Probe::Nop,
        Probe::Nop2,
        Probe::Ldrh,
        Probe::LdrhNop,
        Probe::NopLdrh,
        Probe::Strh,
        Probe::StrhNop,
        Probe::NopStrh,
        Probe::Ldmia1,
        Probe::Ldmia2,
        Probe::Ldmia6,
        Probe::Ldmia1x2,
        Probe::Ldmia2x2,
        Probe::Ldmia6x2,
        Probe::Stmia1,
        Probe::Stmia2,
        Probe::Stmia6,
        Probe::Stmia1x2,
        Probe::Stmia2x2,
        Probe::Stmia6x2,
        Probe::Mul0,
        Probe::Mul1,
        Probe::Mul2,
        Probe::Mul3,
        Probe::Mul4,
        Probe::B,
        Probe::Bx,
        Probe::Div,
        Probe::CpuSet,
    ];
}

/// One row of the timing battery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimingTest {
    pub name: &'static str,
    /// `None` only for the calibration entry.
    pub probe: Option<Probe>,
    pub modes: Modes,
    pub expected: TimingRecord,
}

impl TimingTest {
    pub const fn new(
        name: &'static str,
        probe: Option<Probe>,
        modes: Modes,
        expected: TimingRecord,
    ) -> Self {
        Self {
            name,
            probe,
            modes,
            expected,
        }
    }

    pub fn is_calibration(&self) -> bool {
        self.probe.is_none()
    }

    pub fn metric_count(&self) -> usize {
        self.modes.metric_count()
    }
}

const fn both(values: [i32; 20]) -> TimingRecord {
    TimingRecord::new(values)
}

const fn arm(values: [i32; 10]) -> TimingRecord {
    TimingRecord::arm_only(values)
}

/// Expected deltas measured on hardware (AGB-001), in cycles.
pub static BUILTIN_TESTS: [TimingTest; 31] = [
    TimingTest::new(
        "Calibration",
        None,
        Modes::BOTH,
        both([7, 4, 6, 4, 6, 2, 5, 2, 5, 0, 4, 1, 3, 1, 4, 0, 3, 0, 2, 0]),
    ),
    TimingTest::new(
        "nop",
        Some(Probe::Nop),
        Modes::BOTH,
        both([6, 6, 6, 6, 4, 4, 4, 4, 6, 1, 3, 3, 3, 3, 2, 2, 2, 2, 3, 1]),
    ),
    TimingTest::new(
        "nop / nop",
        Some(Probe::Nop2),
        Modes::BOTH,
        both([12, 12, 12, 12, 8, 8, 8, 8, 12, 2, 6, 6, 6, 6, 4, 4, 4, 4, 6, 2]),
    ),
    TimingTest::new(
        "ldrh r2, [sp]",
        Some(Probe::Ldrh),
        Modes::BOTH,
        both([10, 6, 9, 6, 9, 4, 8, 4, 8, 3, 7, 3, 6, 3, 7, 3, 6, 3, 5, 3]),
    ),
    TimingTest::new(
        "ldrh r2, [sp] / nop",
        Some(Probe::LdrhNop),
        Modes::BOTH,
        both([16, 12, 15, 12, 13, 8, 12, 8, 14, 4, 10, 6, 9, 6, 9, 4, 8, 4, 8, 4]),
    ),
    TimingTest::new(
        "nop / ldrh r2, [sp]",
        Some(Probe::NopLdrh),
        Modes::BOTH,
        both([16, 12, 15, 12, 13, 8, 12, 8, 14, 4, 10, 6, 9, 6, 9, 5, 8, 5, 8, 4]),
    ),
    TimingTest::new(
        "strh r3, [sp]",
        Some(Probe::Strh),
        Modes::BOTH,
        both([9, 6, 8, 6, 8, 4, 7, 4, 7, 2, 6, 3, 5, 3, 6, 2, 5, 2, 4, 2]),
    ),
    TimingTest::new(
        "strh r3, [sp] / nop",
        Some(Probe::StrhNop),
        Modes::BOTH,
        both([15, 12, 14, 12, 12, 8, 11, 8, 13, 3, 9, 6, 8, 6, 8, 4, 7, 4, 7, 3]),
    ),
    TimingTest::new(
        "nop / strh r3, [sp]",
        Some(Probe::NopStrh),
        Modes::BOTH,
        both([15, 12, 14, 12, 12, 8, 11, 8, 13, 3, 9, 6, 8, 6, 8, 4, 7, 4, 7, 3]),
    ),
    TimingTest::new(
        "ldmia sp, {r2}",
        Some(Probe::Ldmia1),
        Modes::ARM,
        arm([10, 6, 9, 6, 9, 4, 8, 4, 8, 3]),
    ),
    TimingTest::new(
        "ldmia sp, {r2, r3}",
        Some(Probe::Ldmia2),
        Modes::ARM,
        arm([11, 6, 10, 6, 10, 4, 9, 4, 9, 4]),
    ),
    TimingTest::new(
        "ldmia sp, {r2-r7}",
        Some(Probe::Ldmia6),
        Modes::ARM,
        arm([15, 8, 14, 8, 14, 8, 13, 8, 13, 8]),
    ),
    TimingTest::new(
        "ldmia sp, {r2} x2",
        Some(Probe::Ldmia1x2),
        Modes::ARM,
        arm([20, 12, 18, 12, 18, 8, 16, 8, 16, 6]),
    ),
    TimingTest::new(
        "ldmia sp, {r2, r3} x2",
        Some(Probe::Ldmia2x2),
        Modes::ARM,
        arm([22, 12, 20, 12, 20, 8, 18, 8, 18, 8]),
    ),
    TimingTest::new(
        "ldmia sp, {r2-r7} x2",
        Some(Probe::Ldmia6x2),
        Modes::ARM,
        arm([30, 16, 28, 16, 28, 16, 26, 16, 26, 16]),
    ),
    TimingTest::new(
        "stmia sp, {r2}",
        Some(Probe::Stmia1),
        Modes::ARM,
        arm([9, 6, 8, 6, 8, 4, 7, 4, 7, 2]),
    ),
    TimingTest::new(
        "stmia sp, {r2, r3}",
        Some(Probe::Stmia2),
        Modes::ARM,
        arm([10, 6, 9, 6, 9, 4, 8, 4, 8, 3]),
    ),
    TimingTest::new(
        "stmia sp, {r2-r7}",
        Some(Probe::Stmia6),
        Modes::ARM,
        arm([14, 7, 13, 7, 13, 7, 12, 7, 12, 7]),
    ),
    TimingTest::new(
        "stmia sp, {r2} x2",
        Some(Probe::Stmia1x2),
        Modes::ARM,
        arm([18, 12, 16, 12, 16, 8, 14, 8, 14, 4]),
    ),
    TimingTest::new(
        "stmia sp, {r2, r3} x2",
        Some(Probe::Stmia2x2),
        Modes::ARM,
        arm([20, 12, 18, 12, 18, 8, 16, 8, 16, 6]),
    ),
    TimingTest::new(
        "stmia sp, {r2-r7} x2",
        Some(Probe::Stmia6x2),
        Modes::ARM,
        arm([28, 14, 26, 14, 26, 14, 24, 14, 24, 14]),
    ),
    TimingTest::new(
        "mul #0x00000000, #0xFF",
        Some(Probe::Mul0),
        Modes::BOTH,
        both([9, 6, 8, 6, 8, 4, 7, 4, 7, 2, 6, 3, 5, 3, 6, 2, 5, 2, 4, 2]),
    ),
    TimingTest::new(
        "mul #0x00000078, #0xFF",
        Some(Probe::Mul1),
        Modes::BOTH,
        both([9, 6, 8, 6, 8, 4, 7, 4, 7, 2, 6, 3, 5, 3, 6, 2, 5, 2, 4, 2]),
    ),
    TimingTest::new(
        "mul #0x00005678, #0xFF",
        Some(Probe::Mul2),
        Modes::BOTH,
        both([10, 6, 9, 6, 9, 4, 8, 4, 8, 3, 7, 3, 6, 3, 7, 3, 6, 3, 5, 3]),
    ),
    TimingTest::new(
        "mul #0x00345678, #0xFF",
        Some(Probe::Mul3),
        Modes::BOTH,
        both([11, 6, 10, 6, 10, 4, 9, 4, 9, 4, 8, 4, 7, 4, 8, 4, 7, 4, 6, 4]),
    ),
    TimingTest::new(
        "mul #0x12345678, #0xFF",
        Some(Probe::Mul4),
        Modes::BOTH,
        both([12, 6, 11, 6, 11, 5, 10, 5, 10, 5, 9, 5, 8, 5, 9, 5, 8, 5, 7, 5]),
    ),
    TimingTest::new(
        "b pc",
        Some(Probe::B),
        Modes::BOTH,
        both([26, 26, 25, 25, 19, 19, 18, 18, 24, 4, 14, 14, 13, 13, 11, 11, 10, 10, 12, 4]),
    ),
    // Shares the "b pc" probe and expectations; kept as its own row.
    TimingTest::new(
        "nop ; b pc",
        Some(Probe::B),
        Modes::BOTH,
        both([26, 26, 25, 25, 19, 19, 18, 18, 24, 4, 14, 14, 13, 13, 11, 11, 10, 10, 12, 4]),
    ),
    TimingTest::new(
        "bx",
        Some(Probe::Bx),
        Modes::BOTH,
        both([78, 78, 74, 74, 59, 59, 55, 55, 72, 22, 57, 57, 53, 53, 45, 45, 41, 41, 51, 24]),
    ),
    TimingTest::new(
        "Division",
        Some(Probe::Div),
        Modes::BOTH,
        both([
            398, 398, 394, 394, 381, 381, 377, 377, 390, 338, 371, 371, 367, 367, 363, 363, 359,
            359, 363, 338,
        ]),
    ),
    TimingTest::new(
        "CpuSet",
        Some(Probe::CpuSet),
        Modes::BOTH,
        both([
            3453, 3453, 3451, 3451, 3434, 3434, 3432, 3432, 3449, 3397, 3456, 3456, 3448, 3448,
            3447, 3447, 3439, 3439, 3440, 3403,
        ]),
    ),
];

/// Ordered, immutable list of timing tests. Index 0 is always the calibration
/// entry.
#[derive(Debug, Clone)]
pub struct Registry {
    tests: Vec<TimingTest>,
}

impl Registry {
    pub fn new(tests: Vec<TimingTest>) -> Result<Self> {
        let Some(first) = tests.first() else {
            return Err(HarnessError::InvalidRegistry("registry is empty".to_string()));
        };
        if !first.is_calibration() {
            return Err(HarnessError::InvalidRegistry(format!(
                "entry 0 ({:?}) must be the calibration entry",
                first.name
            )));
        }
        if let Some((index, test)) = tests
            .iter()
            .enumerate()
            .skip(1)
            .find(|(_, test)| test.is_calibration())
        {
            return Err(HarnessError::InvalidRegistry(format!(
                "entry {index} ({:?}) has no probe; only entry 0 may",
                test.name
            )));
        }
        if let Some((index, test)) = tests
            .iter()
            .enumerate()
            .find(|(_, test)| !test.modes.contains(Modes::ARM))
        {
            return Err(HarnessError::InvalidRegistry(format!(
                "entry {index} ({:?}) does not enable ARM mode",
                test.name
            )));
        }
        Ok(Self { tests })
    }

    pub fn builtin() -> Self {
        Self {
            tests: BUILTIN_TESTS.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TimingTest> {
        self.tests.get(index)
    }

    pub fn calibration(&self) -> &TimingTest {
        &self.tests[0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimingTest> {
        self.tests.iter()
    }

    /// Probes referenced by at least one entry, in first-use order.
    pub fn probes(&self) -> Vec<Probe> {
        let mut seen = Vec::new();
        for probe in self.tests.iter().filter_map(|test| test.probe) {
            if !seen.contains(&probe) {
                seen.push(probe);
            }
        }
        seen
    }

    /// Sum of active metrics over the whole registry.
    pub fn total_metrics(&self) -> usize {
        self.tests.iter().map(TimingTest::metric_count).sum()
    }
}

impl std::ops::Index<usize> for Registry {
    type Output = TimingTest;

    fn index(&self, index: usize) -> &TimingTest {
        &self.tests[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timings::Metric;

    #[test]
    fn builtin_registry_passes_validation() {
        let registry = Registry::new(BUILTIN_TESTS.to_vec()).expect("builtin registry is valid");
        assert_eq!(registry.len(), 31);
        assert!(registry.calibration().is_calibration());
        assert_eq!(registry.calibration().name, "Calibration");
    }

    #[test]
    fn builtin_total_metrics() {
        let registry = Registry::builtin();
        // 12 ARM-only entries, 19 dual-mode entries.
        assert_eq!(registry.total_metrics(), 12 * 10 + 19 * 20);
    }

    #[test]
    fn branch_rows_share_probe_and_expectations() {
        let registry = Registry::builtin();
        let b = registry.iter().find(|t| t.name == "b pc").expect("b pc row");
        let nop_b = registry
            .iter()
            .find(|t| t.name == "nop ; b pc")
            .expect("nop ; b pc row");
        assert_eq!(b.probe, Some(Probe::B));
        assert_eq!(nop_b.probe, Some(Probe::B));
        assert_eq!(b.expected, nop_b.expected);
    }

    #[test]
    fn every_probe_is_referenced() {
        let registry = Registry::builtin();
        let mut probes = registry.probes();
        probes.sort();
        let mut all = Probe::ALL.to_vec();
        all.sort();
        assert_eq!(probes, all);
    }

    #[test]
    fn nop_expectation_matches_hardware() {
        let registry = Registry::builtin();
        assert_eq!(registry[1].name, "nop");
        assert_eq!(registry[1].expected[Metric::ArmRom0000], 6);
        assert_eq!(registry[1].expected[Metric::ThumbIwram], 1);
    }

    #[test]
    fn rejects_empty_registry() {
        let err = Registry::new(Vec::new()).unwrap_err();
        assert!(matches!(err, HarnessError::InvalidRegistry(_)));
    }

    #[test]
    fn rejects_calibration_not_first() {
        let tests = vec![BUILTIN_TESTS[1].clone(), BUILTIN_TESTS[0].clone()];
        let err = Registry::new(tests).unwrap_err();
        assert!(err.to_string().contains("entry 0"), "{err}");
    }

    #[test]
    fn rejects_second_probeless_entry() {
        let tests = vec![
            BUILTIN_TESTS[0].clone(),
            BUILTIN_TESTS[1].clone(),
            TimingTest::new("extra", None, Modes::BOTH, TimingRecord::ZERO),
        ];
        let err = Registry::new(tests).unwrap_err();
        assert!(err.to_string().contains("entry 2"), "{err}");
    }

    #[test]
    fn rejects_thumb_only_entry() {
        let tests = vec![
            BUILTIN_TESTS[0].clone(),
            TimingTest::new("thumb", Some(Probe::Nop), Modes::THUMB, TimingRecord::ZERO),
        ];
        assert!(Registry::new(tests).is_err());
    }
}
