use crate::platform::Keys;
use std::ops::Range;

/// Test names visible at once in the browse list.
pub const VIEW_SIZE: usize = 16;
/// Result pages in the inspect view.
pub const PAGE_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Browse,
    Inspect { page: usize },
}

/// Browse/inspect state machine for the result browser.
///
/// Per frame the keys are applied in a fixed order: B (back to the list), then
/// A (open the selected test), then UP/DOWN in whichever view is now active.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigator {
    view: View,
    selected: usize,
    viewport: usize,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    pub fn new() -> Self {
        Self {
            view: View::Browse,
            selected: 0,
            viewport: 0,
        }
    }

    pub fn view(&self) -> View {
        self.view
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn viewport(&self) -> usize {
        self.viewport
    }

    pub fn page(&self) -> Option<usize> {
        match self.view {
            View::Browse => None,
            View::Inspect { page } => Some(page),
        }
    }

    pub fn is_inspecting(&self) -> bool {
        matches!(self.view, View::Inspect { .. })
    }

    /// Registry indices shown in the browse list.
    pub fn visible(&self, test_count: usize) -> Range<usize> {
        let start = self.viewport.min(test_count);
        start..(self.viewport + VIEW_SIZE).min(test_count)
    }

    /// Applies one frame of newly pressed keys.
    pub fn handle(&mut self, keys: Keys, test_count: usize) {
        if keys.contains(Keys::B) {
            self.view = View::Browse;
        }
        if keys.contains(Keys::A) && self.view == View::Browse && test_count > 0 {
            self.view = View::Inspect { page: 0 };
        }

        match &mut self.view {
            View::Inspect { page } => {
                if keys.contains(Keys::UP) {
                    *page = (*page + PAGE_COUNT - 1) % PAGE_COUNT;
                }
                if keys.contains(Keys::DOWN) {
                    *page = (*page + 1) % PAGE_COUNT;
                }
            }
            View::Browse => {
                if test_count == 0 {
                    return;
                }
                if keys.contains(Keys::UP) {
                    self.selected = match self.selected {
                        0 => test_count - 1,
                        n => n - 1,
                    };
                }
                if keys.contains(Keys::DOWN) {
                    self.selected = (self.selected + 1) % test_count;
                }
                self.selected = self.selected.min(test_count - 1);
                self.scroll_to_selection();
            }
        }
    }

    fn scroll_to_selection(&mut self) {
        if self.selected < self.viewport {
            self.viewport = self.selected;
        } else if self.selected >= self.viewport + VIEW_SIZE {
            self.viewport = self.selected + 1 - VIEW_SIZE;
        }
    }
}
