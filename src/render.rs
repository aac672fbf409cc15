// Screen layout for the result browser. Everything is drawn into a TextGrid;
// rows 0 (title) and 1 (header) are fixed, data rows start at DATA_ROW.

use crate::navigator::{Navigator, PAGE_COUNT, VIEW_SIZE};
use crate::registry::{Registry, TimingTest};
use crate::scoring::{Measurement, ScoreSummary};
use crate::text_grid::TextGrid;
use crate::timings::{Metric, METRIC_COUNT};

pub const TITLE: &str = "Game Boy Advance Test Suite";
const TITLE_ROW: usize = 0;
const TITLE_COL: usize = 2;
const HEADER_ROW: usize = 1;
const SCORE_COL: usize = 23;
const SCORE_WIDTH: usize = 7;
pub const DATA_ROW: usize = 3;
const TESTING_ROW: usize = 4;
const TESTING_COL: usize = 11;

/// Longest text written on one row.
const LINE_WIDTH: usize = 30;
const LABEL_WIDTH: usize = 13;
const VALUE_WIDTH: usize = 6;
const STATUS_COL: usize = 21;
const STATUS_WIDTH: usize = 9;

/// Result rows per page in the paged inspect layout.
pub const PAGE_ROWS: usize = METRIC_COUNT / PAGE_COUNT;

/// How the inspect page index maps onto the 20 metrics.
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InspectLayout {
    /// Page `n` shows metrics `4n..4n+4`.
    #[default]
    Paged,
    /// The page index is a line offset; up to 16 metrics are shown from it.
    Scrolling,
}

impl InspectLayout {
    pub fn rows(self) -> usize {
        match self {
            InspectLayout::Paged => PAGE_ROWS,
            InspectLayout::Scrolling => VIEW_SIZE,
        }
    }

    /// First metric index shown for `page`.
    pub fn first_metric(self, page: usize) -> usize {
        match self {
            InspectLayout::Paged => page * PAGE_ROWS,
            InspectLayout::Scrolling => page,
        }
    }
}

pub fn render_title(grid: &mut TextGrid) {
    grid.write(TITLE_ROW, TITLE_COL, TITLE, LINE_WIDTH);
}

/// Boot screen shown while the sweep runs.
pub fn render_testing(grid: &mut TextGrid) {
    grid.clear();
    render_title(grid);
    grid.write(TESTING_ROW, TESTING_COL, "Testing...", LINE_WIDTH);
}

/// Test list with the selection marker and the frozen sweep score.
pub fn render_browse(
    grid: &mut TextGrid,
    registry: &Registry,
    navigator: &Navigator,
    summary: &ScoreSummary,
) {
    grid.clear_from_row(HEADER_ROW);
    grid.write(HEADER_ROW, 0, "Timing tests", LINE_WIDTH);
    let score = format!("{:>3}/{:<3}", summary.passes(), summary.total_results());
    grid.write(HEADER_ROW, SCORE_COL, &score, SCORE_WIDTH);

    for (row, index) in navigator.visible(registry.len()).enumerate() {
        let marker = if index == navigator.selected() { '>' } else { ' ' };
        let line = format!("{marker}{}", registry[index].name);
        grid.write(DATA_ROW + row, 0, &line, LINE_WIDTH);
    }
}

/// One test's results for the current page.
///
/// Rows past the test's active metric count are left blank.
pub fn render_inspect(
    grid: &mut TextGrid,
    test: &TimingTest,
    measurement: &Measurement,
    page: usize,
    layout: InspectLayout,
) {
    grid.clear_from_row(HEADER_ROW);
    grid.write(HEADER_ROW, 0, &format!("Timing test: {}", test.name), LINE_WIDTH);

    let active = test.metric_count();
    let first = layout.first_metric(page);
    for row in 0..layout.rows() {
        let index = first + row;
        if index >= active {
            break;
        }
        let metric = Metric::ALL[index];
        write_result(
            grid,
            DATA_ROW + row,
            metric.label(),
            measurement.delta(metric),
            test.expected[metric],
        );
    }
}

/// `<label:13>: <delta:5>` then `PASS` or `!= <expected:5>` at column 21.
pub fn write_result(grid: &mut TextGrid, row: usize, label: &str, delta: i32, expected: i32) {
    let mut value = format!("{delta:>5}");
    value.truncate(VALUE_WIDTH);
    let line = format!("{label:<width$.width$}: {value}", width = LABEL_WIDTH);
    grid.write(row, 0, &line, LINE_WIDTH);

    let status = if delta == expected {
        "PASS".to_string()
    } else {
        format!("!= {expected:>5}")
    };
    grid.write(row, STATUS_COL, &status, STATUS_WIDTH);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::Keys;
    use crate::registry::Probe;
    use crate::timings::{Modes, TimingRecord};

    fn nop_test() -> TimingTest {
        TimingTest::new("nop", Some(Probe::Nop), Modes::BOTH, TimingRecord::new([6; 20]))
    }

    #[test]
    fn result_line_pass() {
        let mut grid = TextGrid::new();
        write_result(&mut grid, 3, "ARM/ROM ...", 6, 6);
        assert_eq!(grid.row_text(3), "ARM/ROM ...  :     6 PASS");
    }

    #[test]
    fn result_line_mismatch_shows_expected() {
        let mut grid = TextGrid::new();
        write_result(&mut grid, 3, "ARM/ROM ...", 7, 6);
        assert_eq!(grid.row_text(3), "ARM/ROM ...  :     7 !=     6");
    }

    #[test]
    fn result_line_truncates_long_fields() {
        let mut grid = TextGrid::new();
        write_result(&mut grid, 3, "A label that is far too long", -1234567, 1234567);
        let text = grid.row_text(3);
        assert!(text.starts_with("A label that : -12345"), "{text:?}");
        assert_eq!(grid.row_text(3).len(), 30);
        assert_eq!(&text[21..], "!= 123456");
    }

    #[test]
    fn browse_shows_header_score_and_marker() {
        let registry = Registry::builtin();
        let mut nav = Navigator::new();
        nav.handle(Keys::DOWN, registry.len());
        let mut grid = TextGrid::new();
        let summary = ScoreSummary::default();
        render_browse(&mut grid, &registry, &nav, &summary);
        assert_eq!(grid.row_text(1), "Timing tests             0/0");
        assert_eq!(grid.row_text(DATA_ROW), " Calibration");
        assert_eq!(grid.row_text(DATA_ROW + 1), ">nop");
        assert_eq!(grid.row_text(DATA_ROW + VIEW_SIZE - 1), " stmia sp, {r2}");
        assert_eq!(grid.row_text(DATA_ROW + VIEW_SIZE), "");
    }

    #[test]
    fn browse_at_end_of_list_stays_in_bounds() {
        let registry = Registry::builtin();
        let mut nav = Navigator::new();
        nav.handle(Keys::UP, registry.len());
        let mut grid = TextGrid::new();
        render_browse(&mut grid, &registry, &nav, &ScoreSummary::default());
        assert_eq!(grid.row_text(DATA_ROW), " stmia sp, {r2}");
        assert_eq!(grid.row_text(DATA_ROW + VIEW_SIZE - 1), ">CpuSet");
    }

    #[test]
    fn paged_inspect_shows_four_rows() {
        let test = nop_test();
        let mut measured = TimingRecord::new([12; 20]);
        measured[Metric::ArmRom4004] = 13;
        let m = Measurement {
            measured,
            baseline: TimingRecord::new([6; 20]),
        };
        let mut grid = TextGrid::new();
        render_inspect(&mut grid, &test, &m, 0, InspectLayout::Paged);
        assert_eq!(grid.row_text(1), "Timing test: nop");
        assert_eq!(grid.row_text(DATA_ROW), "ARM/ROM ...  :     6 PASS");
        assert_eq!(grid.row_text(DATA_ROW + 3), "ARM/ROM PN.  :     7 !=     6");
        assert_eq!(grid.row_text(DATA_ROW + 4), "");

        render_inspect(&mut grid, &test, &m, 4, InspectLayout::Paged);
        assert_eq!(grid.row_text(DATA_ROW), "Thumb/ROM .NS:     6 PASS");
        assert_eq!(grid.row_text(DATA_ROW + 3), "Thumb/IWRAM  :     6 PASS");
    }

    #[test]
    fn arm_only_pages_past_active_metrics_are_blank() {
        let test = TimingTest::new(
            "ldmia sp, {r2}",
            Some(Probe::Ldmia1),
            Modes::ARM,
            TimingRecord::arm_only([1; 10]),
        );
        let m = Measurement {
            measured: TimingRecord::new([1; 20]),
            baseline: TimingRecord::ZERO,
        };
        let mut grid = TextGrid::new();
        render_inspect(&mut grid, &test, &m, 2, InspectLayout::Paged);
        assert_eq!(grid.row_text(DATA_ROW), "ARM/WRAM     :     1 PASS");
        assert_eq!(grid.row_text(DATA_ROW + 1), "ARM/IWRAM    :     1 PASS");
        assert_eq!(grid.row_text(DATA_ROW + 2), "");

        for page in 3..PAGE_COUNT {
            render_inspect(&mut grid, &test, &m, page, InspectLayout::Paged);
            for row in DATA_ROW..DATA_ROW + PAGE_ROWS {
                assert_eq!(grid.row_text(row), "", "page {page} row {row}");
            }
        }
    }

    #[test]
    fn scrolling_inspect_uses_page_as_line_offset() {
        let test = nop_test();
        let m = Measurement {
            measured: TimingRecord::new([6; 20]),
            baseline: TimingRecord::ZERO,
        };
        let mut grid = TextGrid::new();
        render_inspect(&mut grid, &test, &m, 4, InspectLayout::Scrolling);
        assert_eq!(grid.row_text(DATA_ROW), "ARM/ROM ..S  :     6 PASS");
        assert_eq!(grid.row_text(DATA_ROW + 15), "Thumb/IWRAM  :     6 PASS");
    }

    #[test]
    fn testing_screen_has_title_and_notice() {
        let mut grid = TextGrid::new();
        grid.write(10, 0, "stale", 5);
        render_testing(&mut grid);
        assert_eq!(grid.row_text(0), "  Game Boy Advance Test Suite");
        assert_eq!(grid.row_text(4), "           Testing...");
        assert_eq!(grid.row_text(10), "");
    }

    #[test]
    fn inspect_render_is_idempotent() {
        let test = nop_test();
        let m = Measurement {
            measured: TimingRecord::new([9; 20]),
            baseline: TimingRecord::new([3; 20]),
        };
        let mut first = TextGrid::new();
        let mut second = TextGrid::new();
        render_title(&mut first);
        render_title(&mut second);
        render_inspect(&mut first, &test, &m, 1, InspectLayout::Paged);
        render_inspect(&mut second, &test, &m, 1, InspectLayout::Paged);
        render_inspect(&mut second, &test, &m, 1, InspectLayout::Paged);
        assert_eq!(first, second);
    }
}
