use anyhow::Context;
use clap::Parser;
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    terminal::{Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use gba_timing::{
    CaptureFile, CaptureProbes, Harness, HeadlessPlatform, InspectLayout, InterruptControl, Keys,
    Platform, ProbeSource, ReferenceProbes, Registry, SweepReport, TextGrid, VISIBLE_ROWS,
};
use std::fs::File;
use std::io::{stdout, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Mutex;
use std::thread::sleep;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// 280896 cycles at 16.78 MHz.
const FRAME_PERIOD: Duration = Duration::from_micros(16_743);

#[derive(Parser, Debug)]
#[command(
    name = "gba-timing",
    about = "Run the GBA instruction timing suite and browse the results."
)]
struct Args {
    /// Replay raw probe output from a JSON capture (defaults to the reference model).
    #[arg(long, value_name = "PATH")]
    capture: Option<PathBuf>,

    /// How inspect pages map onto the result rows.
    #[arg(long, value_enum, default_value_t = InspectLayout::Paged)]
    layout: InspectLayout,

    /// Run the sweep, print the results and exit (status 1 if any metric failed).
    #[arg(long, default_value_t = false)]
    headless: bool,

    /// Write the sweep report as JSON.
    #[arg(long, value_name = "PATH")]
    report: Option<PathBuf>,

    /// Do not use the alternate screen buffer (useful in tmux capture panes).
    #[arg(long, default_value_t = false)]
    no_alt_screen: bool,

    /// Force raw-mode + key polling even if stdin/stdout are not TTYs.
    #[arg(long, default_value_t = false)]
    force_tty: bool,

    /// Log filter (e.g. `debug`, `gba_timing=trace`); overrides RUST_LOG.
    #[arg(long, value_name = "FILTER")]
    log: Option<String>,

    /// Write logs to a file instead of stderr.
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,

    /// Number of frames to run before exiting (0 = run until q/Ctrl+C).
    #[arg(long, default_value_t = 0)]
    frames: u64,
}

/// Host stand-in for the console: frames are paced at the GBA refresh rate,
/// the grid is drawn to the terminal and keyboard input maps onto the pad.
///
/// In TTY mode the terminal is switched to raw mode (and optionally the
/// alternate screen) for the platform's lifetime and restored on drop.
struct TerminalPlatform {
    use_tty: bool,
    use_alt: bool,
    ime: bool,
    next_vblank: Instant,
    last_lines: Vec<String>,
    quit: bool,
}

impl TerminalPlatform {
    fn open(use_tty: bool, use_alt: bool) -> anyhow::Result<Self> {
        let platform = Self {
            use_tty,
            use_alt: use_tty && use_alt,
            ime: true,
            next_vblank: Instant::now() + FRAME_PERIOD,
            last_lines: Vec::new(),
            quit: false,
        };
        if use_tty {
            crossterm::terminal::enable_raw_mode().context("failed to enable raw mode")?;
            let mut out = stdout();
            if platform.use_alt {
                crossterm::queue!(out, EnterAlternateScreen)?;
            }
            crossterm::queue!(out, Hide, Clear(ClearType::All))?;
            out.flush()?;
        }
        Ok(platform)
    }

    fn quit_requested(&self) -> bool {
        self.quit
    }

    fn read_keys(&mut self) -> std::io::Result<Keys> {
        let mut keys = Keys::NONE;
        while event::poll(Duration::from_millis(0))? {
            if let Event::Key(key) = event::read()? {
                match map_key(key) {
                    KeyAction::Pad(pressed) => keys |= pressed,
                    KeyAction::Quit => self.quit = true,
                    KeyAction::None => {}
                }
            }
        }
        Ok(keys)
    }
}

impl InterruptControl for TerminalPlatform {
    fn interrupts_enabled(&self) -> bool {
        self.ime
    }

    fn set_interrupts_enabled(&mut self, enabled: bool) {
        self.ime = enabled;
    }
}

impl Platform for TerminalPlatform {
    fn wait_for_vblank(&mut self) {
        let now = Instant::now();
        if now < self.next_vblank {
            sleep(self.next_vblank - now);
            self.next_vblank += FRAME_PERIOD;
        } else {
            self.next_vblank = now + FRAME_PERIOD;
        }
    }

    fn present(&mut self, grid: &TextGrid) -> gba_timing::Result<()> {
        let lines: Vec<String> = grid.lines().into_iter().take(VISIBLE_ROWS).collect();
        if lines == self.last_lines {
            return Ok(());
        }
        let mut out = stdout();
        if self.use_tty {
            for (row, line) in lines.iter().enumerate() {
                crossterm::queue!(out, MoveTo(0, row as u16), Clear(ClearType::CurrentLine))?;
                write!(out, "{line}")?;
            }
        } else {
            for line in &lines {
                writeln!(out, "{line}")?;
            }
            writeln!(out)?;
        }
        out.flush()?;
        self.last_lines = lines;
        Ok(())
    }

    fn poll_keys(&mut self) -> Keys {
        if !self.use_tty {
            return Keys::NONE;
        }
        match self.read_keys() {
            Ok(keys) => keys,
            Err(err) => {
                warn!(%err, "input poll failed");
                self.quit = true;
                Keys::NONE
            }
        }
    }
}

impl Drop for TerminalPlatform {
    fn drop(&mut self) {
        if !self.use_tty {
            return;
        }
        let mut out = stdout();
        let _ = crossterm::queue!(out, Show);
        if self.use_alt {
            let _ = crossterm::queue!(out, LeaveAlternateScreen);
        }
        let _ = out.flush();
        let _ = crossterm::terminal::disable_raw_mode();
    }
}

enum KeyAction {
    Pad(Keys),
    Quit,
    None,
}

fn map_key(key: KeyEvent) -> KeyAction {
    if key.kind != KeyEventKind::Press {
        return KeyAction::None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        if let KeyCode::Char('c' | 'C') = key.code {
            return KeyAction::Quit;
        }
    }
    match key.code {
        KeyCode::Up => KeyAction::Pad(Keys::UP),
        KeyCode::Down => KeyAction::Pad(Keys::DOWN),
        KeyCode::Left => KeyAction::Pad(Keys::LEFT),
        KeyCode::Right => KeyAction::Pad(Keys::RIGHT),
        KeyCode::Enter | KeyCode::Char('z' | 'Z') => KeyAction::Pad(Keys::A),
        KeyCode::Backspace | KeyCode::Esc | KeyCode::Char('x' | 'X') => KeyAction::Pad(Keys::B),
        KeyCode::Char('q' | 'Q') => KeyAction::Quit,
        _ => KeyAction::None,
    }
}

fn init_logging(args: &Args, interactive: bool) -> anyhow::Result<()> {
    // The terminal UI owns stdout/stderr; stay quiet unless asked.
    let fallback = if interactive && args.log_file.is_none() {
        "off"
    } else {
        "info"
    };
    let filter = match &args.log {
        Some(directives) => EnvFilter::try_new(directives)
            .with_context(|| format!("invalid log filter {directives:?}"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
    };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    match &args.log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create log file {}", path.display()))?;
            builder.with_ansi(false).with_writer(Mutex::new(file)).init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}

fn probe_source(args: &Args, registry: &Registry) -> anyhow::Result<Box<dyn ProbeSource>> {
    match &args.capture {
        Some(path) => {
            let capture = CaptureFile::load(path)
                .with_context(|| format!("failed to load capture {}", path.display()))?;
            info!(
                path = %path.display(),
                source = capture.source.as_deref().unwrap_or("unknown"),
                "replaying capture"
            );
            Ok(Box::new(CaptureProbes::new(capture, registry)?))
        }
        None => Ok(Box::new(ReferenceProbes::new(registry))),
    }
}

fn write_report(path: &Path, report: &SweepReport) -> anyhow::Result<()> {
    report
        .save(path)
        .with_context(|| format!("failed to write report {}", path.display()))?;
    info!(path = %path.display(), "report saved");
    Ok(())
}

fn print_report(report: &SweepReport) {
    for test in &report.tests {
        let status = if test.passes == test.total { "ok" } else { "FAIL" };
        println!(
            "{:>2} {:<24} {:>2}/{:<2} {status}",
            test.index, test.name, test.passes, test.total
        );
        for outcome in test.failures() {
            let waitcnt = match outcome.waitcnt {
                Some(value) => format!("WAITCNT={value:04X}"),
                None => String::new(),
            };
            println!(
                "     {:<13} {:>5} != {:>5} {waitcnt}",
                outcome.metric.label(),
                outcome.delta,
                outcome.expected
            );
        }
    }
    println!("{}/{} metrics passed", report.passes, report.total_results);
}

fn run_headless(
    args: &Args,
    registry: Registry,
    probes: Box<dyn ProbeSource>,
) -> anyhow::Result<ExitCode> {
    let mut harness = Harness::new(registry, probes, HeadlessPlatform::new());
    harness.boot()?;
    let (report, all_passed) = match harness.sweep() {
        Some(sweep) => {
            let report = SweepReport::new(harness.registry(), sweep);
            let all_passed = report.all_passed();
            (report, all_passed)
        }
        None => anyhow::bail!("sweep did not run"),
    };
    print_report(&report);
    if let Some(path) = &args.report {
        write_report(path, &report)?;
    }
    Ok(if all_passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn run_interactive(
    args: &Args,
    registry: Registry,
    probes: Box<dyn ProbeSource>,
) -> anyhow::Result<ExitCode> {
    let use_tty = args.force_tty || (stdout().is_terminal() && std::io::stdin().is_terminal());
    let platform = TerminalPlatform::open(use_tty, !args.no_alt_screen)?;
    let mut harness = Harness::new(registry, probes, platform).with_layout(args.layout);
    harness.boot()?;
    if let (Some(path), Some(sweep)) = (&args.report, harness.sweep()) {
        write_report(path, &SweepReport::new(harness.registry(), sweep))?;
    }

    // Without a terminal there is no input, so one frame of the list is enough.
    let frame_limit = match (use_tty, args.frames) {
        (false, 0) => 1,
        (_, limit) => limit,
    };
    while !harness.platform().quit_requested() {
        harness.frame()?;
        if frame_limit > 0 && harness.frames() >= frame_limit {
            break;
        }
    }
    debug!(frames = harness.frames(), "leaving browser");
    Ok(ExitCode::SUCCESS)
}

fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    init_logging(&args, !args.headless)?;

    let registry = Registry::builtin();
    let probes = probe_source(&args, &registry)?;
    if args.headless {
        run_headless(&args, registry, probes)
    } else {
        run_interactive(&args, registry, probes)
    }
}
