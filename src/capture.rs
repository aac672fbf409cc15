// Raw probe output recorded from a console or an emulator, replayed through
// `ProbeSource` so the scoring and browser code can run on a host.

use crate::probe::ProbeSource;
use crate::registry::{Probe, Registry};
use crate::timings::TimingRecord;
use crate::{HarnessError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const CAPTURE_MAGIC: &str = "gba-timing.capture";
pub const CAPTURE_VERSION: u32 = 1;

fn default_magic() -> String {
    CAPTURE_MAGIC.to_string()
}

fn default_version() -> u32 {
    CAPTURE_VERSION
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureFile {
    #[serde(default = "default_magic")]
    pub magic: String,
    #[serde(default = "default_version")]
    pub version: u32,
    /// Where the numbers came from, e.g. "AGB-001" or an emulator build.
    #[serde(default)]
    pub source: Option<String>,
    /// Raw output of the calibration routine.
    pub calibration: TimingRecord,
    /// Raw output of each probe (not yet differenced).
    pub probes: BTreeMap<Probe, TimingRecord>,
}

impl CaptureFile {
    /// Runs the calibration routine and every probe the registry references
    /// once, keeping the raw records.
    pub fn record<S: ProbeSource>(source: &mut S, registry: &Registry) -> Self {
        let mut calibration = TimingRecord::ZERO;
        source.calibrate(&mut calibration);
        let mut probes = BTreeMap::new();
        for probe in registry.probes() {
            let mut out = TimingRecord::ZERO;
            source.run(probe, &mut out);
            probes.insert(probe, out);
        }
        Self {
            magic: CAPTURE_MAGIC.to_string(),
            version: CAPTURE_VERSION,
            source: None,
            calibration,
            probes,
        }
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let capture: CaptureFile = serde_json::from_str(text)?;
        if capture.magic != CAPTURE_MAGIC {
            return Err(HarnessError::InvalidCapture(format!(
                "unexpected magic {:?}",
                capture.magic
            )));
        }
        if capture.version != CAPTURE_VERSION {
            return Err(HarnessError::InvalidCapture(format!(
                "unsupported version {} (expected {CAPTURE_VERSION})",
                capture.version
            )));
        }
        Ok(capture)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Fails with the first probe the registry needs but the capture lacks.
    pub fn ensure_covers(&self, registry: &Registry) -> Result<()> {
        match registry
            .probes()
            .into_iter()
            .find(|probe| !self.probes.contains_key(probe))
        {
            Some(missing) => Err(HarnessError::MissingProbe(missing)),
            None => Ok(()),
        }
    }
}

/// Replays a [`CaptureFile`]. Every call returns the recorded record, so the
/// replay is as deterministic as the calibration contract requires.
#[derive(Debug, Clone)]
pub struct CaptureProbes {
    capture: CaptureFile,
}

impl CaptureProbes {
    pub fn new(capture: CaptureFile, registry: &Registry) -> Result<Self> {
        capture.ensure_covers(registry)?;
        Ok(Self { capture })
    }

    pub fn capture(&self) -> &CaptureFile {
        &self.capture
    }
}

impl ProbeSource for CaptureProbes {
    fn calibrate(&mut self, out: &mut TimingRecord) {
        *out = self.capture.calibration;
    }

    fn run(&mut self, probe: Probe, out: &mut TimingRecord) {
        // Coverage is checked in `new`; an unknown probe reads as pure overhead.
        *out = self
            .capture
            .probes
            .get(&probe)
            .copied()
            .unwrap_or(self.capture.calibration);
    }
}
