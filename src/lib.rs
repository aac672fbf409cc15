//! Game Boy Advance instruction timing suite.
//!
//! Hand-timed probe routines are measured under eight ROM wait-state
//! configurations plus EWRAM and IWRAM, in ARM and Thumb state. Each result
//! is differenced against a calibration baseline and compared with the
//! expected cycle count. The results are browsed on a 32x32 text grid.
//!
//! Hardware access goes through [`Platform`] and [`ProbeSource`]; the crate
//! ships a headless platform, a reference probe model and a capture replay
//! source so the whole flow runs on a host.

use thiserror::Error;

pub mod capture;
pub mod harness;
pub mod navigator;
pub mod platform;
pub mod probe;
pub mod registry;
pub mod render;
pub mod report;
pub mod scoring;
pub mod text_grid;
pub mod timings;

pub use capture::{CaptureFile, CaptureProbes, CAPTURE_MAGIC, CAPTURE_VERSION};
pub use harness::Harness;
pub use navigator::{Navigator, View, PAGE_COUNT, VIEW_SIZE};
pub use platform::{HeadlessPlatform, InterruptControl, InterruptGuard, Keys, Platform};
pub use probe::{ProbeSource, ReferenceProbes};
pub use registry::{Probe, Registry, TimingTest, BUILTIN_TESTS};
pub use render::{InspectLayout, TITLE};
pub use report::{SweepReport, TestReport};
pub use scoring::{
    measure, outcomes, run_sweep, score, Measurement, MetricOutcome, ScoreSummary, Sweep,
    TestResult, TestScore,
};
pub use text_grid::{TextGrid, GRID_COLS, GRID_ROWS, VISIBLE_ROWS};
pub use timings::{Metric, Modes, TimingRecord, METRICS_PER_MODE, METRIC_COUNT};

pub type Result<T> = std::result::Result<T, HarnessError>;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialize error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid registry: {0}")]
    InvalidRegistry(String),
    #[error("capture has no output for probe {0:?}")]
    MissingProbe(Probe),
    #[error("capture error: {0}")]
    InvalidCapture(String),
}
