//! Math types.
//!
//! Positions in the tile world are plain 2D floats in pixels. This module
//! stays small and deterministic.

use serde::{Deserialize, Serialize};

/// Linear blend between two scalars.
///
/// `t` is not clamped; callers that need clamping use [`Vec2::lerp`].
pub fn linear(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}

/// 2D vector in world pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }

    pub fn scale(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s)
    }

    pub fn len(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(self, other: Self) -> f32 {
        self.sub(other).len()
    }

    pub fn lerp(self, to: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        Self::new(linear(self.x, to.x, t), linear(self.y, to.y, t))
    }
}
