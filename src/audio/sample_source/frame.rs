// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::ops::{Add, AddAssign};

/// One sample instant of stereo audio. Values are nominally in [-1.0, 1.0] but
/// nothing in the mixing path clamps them.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Frame {
    pub left: f32,
    pub right: f32,
}

impl Frame {
    /// A frame of silence.
    pub const ZERO: Frame = Frame {
        left: 0.0,
        right: 0.0,
    };

    pub const fn new(left: f32, right: f32) -> Frame {
        Frame { left, right }
    }

    /// A frame with the same value on both sides.
    pub const fn mono(value: f32) -> Frame {
        Frame {
            left: value,
            right: value,
        }
    }
}

impl Add for Frame {
    type Output = Frame;

    #[inline]
    fn add(self, rhs: Frame) -> Frame {
        Frame {
            left: self.left + rhs.left,
            right: self.right + rhs.right,
        }
    }
}

impl AddAssign for Frame {
    #[inline]
    fn add_assign(&mut self, rhs: Frame) {
        self.left += rhs.left;
        self.right += rhs.right;
    }
}

impl From<(f32, f32)> for Frame {
    fn from((left, right): (f32, f32)) -> Self {
        Frame { left, right }
    }
}
