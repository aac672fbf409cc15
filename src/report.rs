use crate::registry::{Probe, Registry};
use crate::scoring::{outcomes, MetricOutcome, Sweep};
use crate::timings::Modes;
use crate::Result;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Per-metric results of one sweep, in registry order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub passes: u32,
    pub total_results: u32,
    pub tests: Vec<TestReport>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestReport {
    pub index: usize,
    pub name: String,
    pub probe: Option<Probe>,
    pub modes: Modes,
    pub passes: u32,
    pub total: u32,
    pub metrics: Vec<MetricOutcome>,
}

impl TestReport {
    pub fn failures(&self) -> impl Iterator<Item = &MetricOutcome> {
        self.metrics.iter().filter(|outcome| !outcome.passed)
    }
}

impl SweepReport {
    pub fn new(registry: &Registry, sweep: &Sweep) -> Self {
        let tests = sweep
            .results
            .iter()
            .filter_map(|result| {
                let test = registry.get(result.index)?;
                Some(TestReport {
                    index: result.index,
                    name: test.name.to_string(),
                    probe: test.probe,
                    modes: test.modes,
                    passes: result.score.passes,
                    total: result.score.total,
                    metrics: outcomes(test, &result.measurement).collect(),
                })
            })
            .collect();
        Self {
            passes: sweep.summary.passes(),
            total_results: sweep.summary.total_results(),
            tests,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.passes == self.total_results
    }

    /// Tests with at least one failing metric.
    pub fn failing_tests(&self) -> impl Iterator<Item = &TestReport> {
        self.tests.iter().filter(|test| test.passes != test.total)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
