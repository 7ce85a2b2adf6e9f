use std::fmt;

use crate::frame::TransientArena;
use crate::render::CommandList;

/// Position on the device's completion timeline.
///
/// Every submission is assigned the next value; the device reports the highest
/// value whose work has fully completed. Zero is never assigned, so a fresh
/// device has always "completed" fence zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FenceValue(pub u64);

impl FenceValue {
    pub const ZERO: Self = Self(0);

    #[inline]
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }

    #[inline]
    pub fn is_reached_by(self, completed: FenceValue) -> bool {
        completed >= self
    }
}

impl fmt::Display for FenceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// GPU-side signal ordering queue work against image acquisition and
/// presentation. Only its identity lives on the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Semaphore(pub u32);

/// Drawable size in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// A zero-area surface, e.g. a minimized window.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

/// Everything a backend needs to execute one recorded frame.
#[derive(Debug, Clone, Copy)]
pub struct Submission<'a> {
    pub slot: usize,
    pub frame: u64,
    pub commands: &'a CommandList,
    pub arena: &'a TransientArena,
    /// Signals the queue waits on before executing.
    pub wait: &'a [Semaphore],
    /// Signals raised once the work completes.
    pub signal: &'a [Semaphore],
}
