//! Interpolation.
//!
//! Remote players are drawn at a render position that chases the last
//! position received from the room. Every frame closes a fixed fraction of
//! the remaining gap on each axis, so the render position converges
//! geometrically and never overshoots.

use ranch_shared::math::{linear, Vec2};

/// Default per-frame blend factor.
pub const DEFAULT_FACTOR: f32 = 0.2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interpolator {
    factor: f32,
}

impl Default for Interpolator {
    fn default() -> Self {
        Self::new(DEFAULT_FACTOR)
    }
}

impl Interpolator {
    /// `factor` is clamped to $[0,1]$.
    pub fn new(factor: f32) -> Self {
        Self {
            factor: factor.clamp(0.0, 1.0),
        }
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }

    /// One frame of blending. Without a target the position stays put.
    pub fn step(&self, render: Vec2, target: Option<Vec2>) -> Vec2 {
        match target {
            Some(t) => Vec2::new(
                linear(render.x, t.x, self.factor),
                linear(render.y, t.y, self.factor),
            ),
            None => render,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_closes_a_fifth_of_the_gap() {
        let i = Interpolator::default();
        let p = i.step(Vec2::new(0.0, 100.0), Some(Vec2::new(100.0, 0.0)));
        assert!((p.x - 20.0).abs() < 1e-4);
        assert!((p.y - 80.0).abs() < 1e-4);
    }

    #[test]
    fn converges_geometrically_without_overshoot() {
        let i = Interpolator::default();
        let target = Vec2::new(100.0, 0.0);
        let mut p = Vec2::ZERO;
        for frame in 1..=30 {
            p = i.step(p, Some(target));
            let expected_gap = 100.0 * 0.8f32.powi(frame);
            assert!((target.x - p.x - expected_gap).abs() < 1e-3);
            assert!(p.x <= target.x);
        }
    }

    #[test]
    fn no_target_keeps_position() {
        let i = Interpolator::default();
        let p = Vec2::new(3.0, 4.0);
        assert_eq!(i.step(p, None), p);
    }

    #[test]
    fn factor_is_clamped() {
        assert_eq!(Interpolator::new(3.0).factor(), 1.0);
        assert_eq!(Interpolator::new(-1.0).factor(), 0.0);
    }
}
