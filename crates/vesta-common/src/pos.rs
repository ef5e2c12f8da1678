//! Source positions.
//!
//! Positions are byte offsets into a single source file. The checker works on
//! one function body at a time, so diagnostics carry a `Pos` and the driver
//! attaches the file name when rendering.

use serde::Serialize;

/// A half-open byte span `[start, end)` in the current source file.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Pos {
    pub start: u32,
    pub end: u32,
}

impl Pos {
    /// Sentinel for synthesized nodes with no source location.
    pub const NONE: Pos = Pos { start: 0, end: 0 };

    pub const fn new(start: u32, end: u32) -> Self {
        Pos { start, end }
    }

    pub const fn len(self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    pub const fn is_none(self) -> bool {
        self.start == 0 && self.end == 0
    }

    /// Span covering both positions.
    pub fn merge(self, other: Pos) -> Pos {
        if self.is_none() {
            return other;
        }
        if other.is_none() {
            return self;
        }
        Pos {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}
