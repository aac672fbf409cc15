use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};

/// Metrics per instruction-set mode.
pub const METRICS_PER_MODE: usize = 10;
pub const METRIC_COUNT: usize = METRICS_PER_MODE * 2;

// WAITCNT bits exercised by the ROM metrics.
pub const WAITCNT_PREFETCH: u16 = 0x4000;
pub const WAITCNT_WS0_N3: u16 = 0x0004;
pub const WAITCNT_WS0_S1: u16 = 0x0010;

/// One timed bus/access condition under one instruction-set mode.
///
/// The ROM variants are suffixed with the WAITCNT value active while the probe
/// ran (see `WAITCNT_*`). Declaration order is the on-screen order and the
/// layout of [`TimingRecord`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    ArmRom0000,
    ArmRom4000,
    ArmRom0004,
    ArmRom4004,
    ArmRom0010,
    ArmRom4010,
    ArmRom0014,
    ArmRom4014,
    ArmEwram,
    ArmIwram,
    ThumbRom0000,
    ThumbRom4000,
    ThumbRom0004,
    ThumbRom4004,
    ThumbRom0010,
    ThumbRom4010,
    ThumbRom0014,
    ThumbRom4014,
    ThumbEwram,
    ThumbIwram,
}

impl Metric {
    pub const ALL: [Metric; METRIC_COUNT] = [
        Metric::ArmRom0000,
        Metric::ArmRom4000,
        Metric::ArmRom0004,
        Metric::ArmRom4004,
        Metric::ArmRom0010,
        Metric::ArmRom4010,
        Metric::ArmRom0014,
        Metric::ArmRom4014,
        Metric::ArmEwram,
        Metric::ArmIwram,
        Metric::ThumbRom0000,
        Metric::ThumbRom4000,
        Metric::ThumbRom0004,
        Metric::ThumbRom4004,
        Metric::ThumbRom0010,
        Metric::ThumbRom4010,
        Metric::ThumbRom0014,
        Metric::ThumbRom4014,
        Metric::ThumbEwram,
        Metric::ThumbIwram,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Display label. ROM labels read `P` (prefetch), `N` (short first
    /// access) and `S` (short sequential access), `.` where the bit is clear.
    pub fn label(self) -> &'static str {
        match self {
            Metric::ArmRom0000 => "ARM/ROM ...",
            Metric::ArmRom4000 => "ARM/ROM P..",
            Metric::ArmRom0004 => "ARM/ROM .N.",
            Metric::ArmRom4004 => "ARM/ROM PN.",
            Metric::ArmRom0010 => "ARM/ROM ..S",
            Metric::ArmRom4010 => "ARM/ROM P.S",
            Metric::ArmRom0014 => "ARM/ROM .NS",
            Metric::ArmRom4014 => "ARM/ROM PNS",
            Metric::ArmEwram => "ARM/WRAM",
            Metric::ArmIwram => "ARM/IWRAM",
            Metric::ThumbRom0000 => "Thumb/ROM ...",
            Metric::ThumbRom4000 => "Thumb/ROM P..",
            Metric::ThumbRom0004 => "Thumb/ROM .N.",
            Metric::ThumbRom4004 => "Thumb/ROM PN.",
            Metric::ThumbRom0010 => "Thumb/ROM ..S",
            Metric::ThumbRom4010 => "Thumb/ROM P.S",
            Metric::ThumbRom0014 => "Thumb/ROM .NS",
            Metric::ThumbRom4014 => "Thumb/ROM PNS",
            Metric::ThumbEwram => "Thumb/WRAM",
            Metric::ThumbIwram => "Thumb/IWRAM",
        }
    }

    pub fn is_thumb(self) -> bool {
        self.index() >= METRICS_PER_MODE
    }

    /// WAITCNT value for ROM metrics, `None` for the work-RAM metrics.
    pub fn waitcnt(self) -> Option<u16> {
        let slot = self.index() % METRICS_PER_MODE;
        if slot >= 8 {
            return None;
        }
        let mut value = 0;
        if slot & 1 != 0 {
            value |= WAITCNT_PREFETCH;
        }
        if slot & 2 != 0 {
            value |= WAITCNT_WS0_N3;
        }
        if slot & 4 != 0 {
            value |= WAITCNT_WS0_S1;
        }
        Some(value)
    }
}

/// Instruction-set modes a test is evaluated under. ARM is always measured;
/// `THUMB` adds the second metric group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Modes(u8);

impl Modes {
    pub const ARM: Modes = Modes(1);
    pub const THUMB: Modes = Modes(2);
    pub const BOTH: Modes = Modes(1 | 2);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn union(self, other: Modes) -> Modes {
        Modes(self.0 | other.0)
    }

    pub const fn contains(self, other: Modes) -> bool {
        self.0 & other.0 == other.0
    }

    /// Number of leading metrics that are meaningful for this mode set.
    pub const fn metric_count(self) -> usize {
        if self.contains(Modes::THUMB) {
            METRIC_COUNT
        } else {
            METRICS_PER_MODE
        }
    }

    pub fn active_metrics(self) -> &'static [Metric] {
        &Metric::ALL[..self.metric_count()]
    }
}

/// Twenty raw cycle counts, one per [`Metric`].
///
/// The same shape carries probe output, the calibration baseline, expected
/// values, and deltas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimingRecord([i32; METRIC_COUNT]);

impl TimingRecord {
    pub const ZERO: TimingRecord = TimingRecord([0; METRIC_COUNT]);

    pub const fn new(values: [i32; METRIC_COUNT]) -> Self {
        Self(values)
    }

    /// Builds a record with only the ARM group populated.
    pub const fn arm_only(arm: [i32; METRICS_PER_MODE]) -> Self {
        let mut values = [0; METRIC_COUNT];
        let mut i = 0;
        while i < METRICS_PER_MODE {
            values[i] = arm[i];
            i += 1;
        }
        Self(values)
    }

    pub fn values(&self) -> &[i32; METRIC_COUNT] {
        &self.0
    }

    pub fn get(&self, metric: Metric) -> i32 {
        self.0[metric.index()]
    }

    pub fn set(&mut self, metric: Metric, value: i32) {
        self.0[metric.index()] = value;
    }

    /// Element-wise `self - baseline`, wrapping like the 32-bit hardware
    /// counters it mirrors.
    pub fn delta(&self, baseline: &TimingRecord) -> TimingRecord {
        let mut out = [0; METRIC_COUNT];
        for (slot, (value, base)) in out.iter_mut().zip(self.0.iter().zip(baseline.0.iter())) {
            *slot = value.wrapping_sub(*base);
        }
        TimingRecord(out)
    }

    /// Element-wise `self + other`.
    pub fn offset_by(&self, other: &TimingRecord) -> TimingRecord {
        let mut out = [0; METRIC_COUNT];
        for (slot, (value, add)) in out.iter_mut().zip(self.0.iter().zip(other.0.iter())) {
            *slot = value.wrapping_add(*add);
        }
        TimingRecord(out)
    }
}

impl Index<Metric> for TimingRecord {
    type Output = i32;

    fn index(&self, metric: Metric) -> &i32 {
        &self.0[metric.index()]
    }
}

impl IndexMut<Metric> for TimingRecord {
    fn index_mut(&mut self, metric: Metric) -> &mut i32 {
        &mut self.0[metric.index()]
    }
}
