//! Client-side prediction for the local player.
//!
//! The local body moves as soon as input is sampled. The room echoes back
//! the authoritative position, which is kept alongside for the debug
//! reference boxes and, when a snap distance is configured, pulls the body
//! back once the two drift too far apart.

use ranch_shared::math::Vec2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictedPlayer {
    /// Locally simulated position.
    pub position: Vec2,
    /// Last position received from the room.
    pub server_position: Vec2,
}

impl PredictedPlayer {
    pub fn new(spawn: Vec2) -> Self {
        Self {
            position: spawn,
            server_position: spawn,
        }
    }

    /// Moves the local body by `velocity` (pixels per second) for `dt_sec`.
    pub fn integrate(&mut self, velocity: Vec2, dt_sec: f32) {
        self.position = self.position.add(velocity.scale(dt_sec));
    }

    pub fn on_server_update(&mut self, position: Vec2) {
        self.server_position = position;
    }

    pub fn drift(&self) -> f32 {
        self.position.distance(self.server_position)
    }

    /// Snaps to the server position when drift exceeds `snap_distance`.
    /// Returns true when a correction happened.
    pub fn reconcile(&mut self, snap_distance: Option<f32>) -> bool {
        match snap_distance {
            Some(limit) if self.drift() > limit => {
                self.position = self.server_position;
                true
            }
            _ => false,
        }
    }
}
