use crate::navigator::{Navigator, View};
use crate::platform::Platform;
use crate::probe::ProbeSource;
use crate::registry::Registry;
use crate::render::{render_browse, render_inspect, render_testing, InspectLayout};
use crate::scoring::{measure, run_sweep, Measurement, ScoreSummary, Sweep};
use crate::text_grid::TextGrid;
use crate::timings::TimingRecord;
use crate::Result;
use tracing::trace;

/// Owns all harness state: the registry, the probe source, the platform, the
/// calibration baseline, the sweep result, the navigator and the text grid.
pub struct Harness<P: Platform, S: ProbeSource> {
    registry: Registry,
    probes: S,
    platform: P,
    layout: InspectLayout,
    calibration: TimingRecord,
    sweep: Option<Sweep>,
    navigator: Navigator,
    grid: TextGrid,
    last_measurement: Option<Measurement>,
    frames: u64,
}

impl<P: Platform, S: ProbeSource> Harness<P, S> {
    pub fn new(registry: Registry, probes: S, platform: P) -> Self {
        Self {
            registry,
            probes,
            platform,
            layout: InspectLayout::default(),
            calibration: TimingRecord::ZERO,
            sweep: None,
            navigator: Navigator::new(),
            grid: TextGrid::new(),
            last_measurement: None,
            frames: 0,
        }
    }

    pub fn with_layout(mut self, layout: InspectLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Shows the boot screen and runs the scored sweep. Only the first call
    /// does any work; the summary is frozen afterwards.
    pub fn boot(&mut self) -> Result<&Sweep> {
        let sweep = match self.sweep.take() {
            Some(sweep) => sweep,
            None => {
                render_testing(&mut self.grid);
                self.platform.present(&self.grid)?;
                run_sweep(
                    &mut self.platform,
                    &mut self.probes,
                    &self.registry,
                    &mut self.calibration,
                )
            }
        };
        Ok(self.sweep.insert(sweep))
    }

    /// One pass of the interactive loop: sample keys, update the navigator,
    /// re-run the selected probe when inspecting, draw, present, and wait for
    /// the next VBlank. Boots first if needed.
    pub fn frame(&mut self) -> Result<()> {
        if self.sweep.is_none() {
            self.boot()?;
        }
        self.grid.clear_from_row(1);
        let keys = self.platform.poll_keys();
        self.navigator.handle(keys, self.registry.len());

        match self.navigator.view() {
            View::Browse => {
                self.last_measurement = None;
                let summary = self.summary();
                render_browse(&mut self.grid, &self.registry, &self.navigator, &summary);
            }
            View::Inspect { page } => {
                let test = &self.registry[self.navigator.selected()];
                let measurement = measure(
                    &mut self.platform,
                    &mut self.probes,
                    test,
                    &mut self.calibration,
                );
                trace!(test = test.name, page, "live re-run");
                render_inspect(&mut self.grid, test, &measurement, page, self.layout);
                self.last_measurement = Some(measurement);
            }
        }

        self.platform.present(&self.grid)?;
        self.platform.wait_for_vblank();
        self.frames += 1;
        Ok(())
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn probes(&self) -> &S {
        &self.probes
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn grid(&self) -> &TextGrid {
        &self.grid
    }

    pub fn layout(&self) -> InspectLayout {
        self.layout
    }

    /// Most recent calibration baseline.
    pub fn calibration(&self) -> &TimingRecord {
        &self.calibration
    }

    pub fn sweep(&self) -> Option<&Sweep> {
        self.sweep.as_ref()
    }

    /// Sweep totals; zero before [`Harness::boot`].
    pub fn summary(&self) -> ScoreSummary {
        self.sweep
            .as_ref()
            .map(|sweep| sweep.summary)
            .unwrap_or_default()
    }

    /// Measurement drawn by the last inspect frame.
    pub fn last_measurement(&self) -> Option<&Measurement> {
        self.last_measurement.as_ref()
    }

    /// Interactive frames run so far (boot excluded).
    pub fn frames(&self) -> u64 {
        self.frames
    }
}
