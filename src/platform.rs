// Hardware services consumed by the harness: frame sync, interrupt masking,
// display output and key sampling.

use crate::text_grid::TextGrid;
use crate::Result;
use std::collections::VecDeque;
use std::ops::{BitOr, BitOrAssign};

/// KEYINPUT bit layout; a set bit means "newly pressed this frame".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Keys(u16);

impl Keys {
    pub const NONE: Keys = Keys(0);
    pub const A: Keys = Keys(1 << 0);
    pub const B: Keys = Keys(1 << 1);
    pub const SELECT: Keys = Keys(1 << 2);
    pub const START: Keys = Keys(1 << 3);
    pub const RIGHT: Keys = Keys(1 << 4);
    pub const LEFT: Keys = Keys(1 << 5);
    pub const UP: Keys = Keys(1 << 6);
    pub const DOWN: Keys = Keys(1 << 7);
    pub const R: Keys = Keys(1 << 8);
    pub const L: Keys = Keys(1 << 9);

    pub const fn from_bits(bits: u16) -> Self {
        Keys(bits & 0x03FF)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: Keys) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for Keys {
    type Output = Keys;

    fn bitor(self, rhs: Keys) -> Keys {
        Keys(self.0 | rhs.0)
    }
}

impl BitOrAssign for Keys {
    fn bitor_assign(&mut self, rhs: Keys) {
        self.0 |= rhs.0;
    }
}

/// Master interrupt enable (IME).
pub trait InterruptControl {
    fn interrupts_enabled(&self) -> bool;
    fn set_interrupts_enabled(&mut self, enabled: bool);
}

pub trait Platform: InterruptControl {
    /// Blocks until the next VBlank.
    fn wait_for_vblank(&mut self);
    /// Copies the visible part of `grid` to the screen.
    fn present(&mut self, grid: &TextGrid) -> Result<()>;
    /// Keys that went down since the previous call.
    fn poll_keys(&mut self) -> Keys;
}

/// Masks interrupts for its lifetime and restores the previous IME state on
/// drop, including during unwinding.
pub struct InterruptGuard<'a, I: InterruptControl + ?Sized> {
    control: &'a mut I,
    restore: bool,
}

impl<'a, I: InterruptControl + ?Sized> InterruptGuard<'a, I> {
    pub fn new(control: &'a mut I) -> Self {
        let restore = control.interrupts_enabled();
        control.set_interrupts_enabled(false);
        Self { control, restore }
    }
}

impl<I: InterruptControl + ?Sized> Drop for InterruptGuard<'_, I> {
    fn drop(&mut self) {
        self.control.set_interrupts_enabled(self.restore);
    }
}

/// In-memory platform: scripted key presses, no real display.
///
/// Tracks enough bookkeeping to check the masking discipline: on hardware a
/// VBlank wait with IME clear never returns, so `masked_vblank_waits` must stay
/// zero.
#[derive(Debug)]
pub struct HeadlessPlatform {
    ime: bool,
    frames: u64,
    script: VecDeque<Keys>,
    last_frame: Option<TextGrid>,
    presented: u64,
    mask_count: u64,
    masked_vblank_waits: u64,
}

impl Default for HeadlessPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessPlatform {
    pub fn new() -> Self {
        Self {
            ime: true,
            frames: 0,
            script: VecDeque::new(),
            last_frame: None,
            presented: 0,
            mask_count: 0,
            masked_vblank_waits: 0,
        }
    }

    /// Queues one frame's worth of key presses.
    pub fn push_keys(&mut self, keys: Keys) {
        self.script.push_back(keys);
    }

    pub fn with_script(keys: impl IntoIterator<Item = Keys>) -> Self {
        let mut platform = Self::new();
        platform.script.extend(keys);
        platform
    }

    pub fn pending_keys(&self) -> usize {
        self.script.len()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }

    pub fn last_frame(&self) -> Option<&TextGrid> {
        self.last_frame.as_ref()
    }

    /// Number of enabled -> disabled transitions of IME.
    pub fn mask_count(&self) -> u64 {
        self.mask_count
    }

    pub fn masked_vblank_waits(&self) -> u64 {
        self.masked_vblank_waits
    }
}

impl InterruptControl for HeadlessPlatform {
    fn interrupts_enabled(&self) -> bool {
        self.ime
    }

    fn set_interrupts_enabled(&mut self, enabled: bool) {
        if self.ime && !enabled {
            self.mask_count += 1;
        }
        self.ime = enabled;
    }
}

impl Platform for HeadlessPlatform {
    fn wait_for_vblank(&mut self) {
        if !self.ime {
            self.masked_vblank_waits += 1;
        }
        self.frames += 1;
    }

    fn present(&mut self, grid: &TextGrid) -> Result<()> {
        self.presented += 1;
        match self.last_frame.as_mut() {
            Some(frame) => frame.clone_from(grid),
            None => self.last_frame = Some(grid.clone()),
        }
        Ok(())
    }

    fn poll_keys(&mut self) -> Keys {
        self.script.pop_front().unwrap_or(Keys::NONE)
    }
}
