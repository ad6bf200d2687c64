//! Input handling.
//!
//! The backend samples keys once per frame into an [`InputState`]. Gameplay
//! only needs the four cursor directions, the scene-switch key and a pointer
//! press.

use ranch_shared::{math::Vec2, net::DirectionalInput};

bitflags::bitflags! {
    /// Keys the client reacts to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Keys: u8 {
        const LEFT = 1 << 0;
        const RIGHT = 1 << 1;
        const UP = 1 << 2;
        const DOWN = 1 << 3;
        /// Scene switch / debug overlay key.
        const SWITCH = 1 << 4;
    }
}

impl Keys {
    /// Parses a key name as typed on the client console.
    pub fn from_console_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "left" => Some(Keys::LEFT),
            "right" => Some(Keys::RIGHT),
            "up" => Some(Keys::UP),
            "down" => Some(Keys::DOWN),
            "d" | "switch" => Some(Keys::SWITCH),
            _ => None,
        }
    }
}

/// Input sampled for one frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputState {
    /// Keys held down this frame.
    pub held: Keys,
    /// Keys that went down since the previous frame.
    pub pressed: Keys,
    /// Pointer went down since the previous frame.
    pub pointer_down: bool,
}

impl InputState {
    pub fn holding(held: Keys) -> Self {
        Self {
            held,
            ..Default::default()
        }
    }

    pub fn is_down(&self, keys: Keys) -> bool {
        self.held.contains(keys)
    }

    pub fn just_pressed(&self, keys: Keys) -> bool {
        self.pressed.contains(keys)
    }

    /// Next frame's state: `held` carries over, edges are computed against it.
    pub fn advance(&self, held: Keys, pointer_down: bool) -> Self {
        Self {
            held,
            pressed: held - self.held,
            pointer_down,
        }
    }
}

/// Cursor-key velocity: left wins over right, up wins over down.
pub fn velocity_for(keys: Keys, speed: f32) -> Vec2 {
    let x = if keys.contains(Keys::LEFT) {
        -speed
    } else if keys.contains(Keys::RIGHT) {
        speed
    } else {
        0.0
    };
    let y = if keys.contains(Keys::UP) {
        -speed
    } else if keys.contains(Keys::DOWN) {
        speed
    } else {
        0.0
    };
    Vec2::new(x, y)
}

/// Raw direction flags sent to rooms that simulate movement themselves.
pub fn directional(keys: Keys) -> DirectionalInput {
    DirectionalInput {
        up: keys.contains(Keys::UP),
        down: keys.contains(Keys::DOWN),
        left: keys.contains(Keys::LEFT),
        right: keys.contains(Keys::RIGHT),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn left_beats_right_and_up_beats_down() {
        let v = velocity_for(Keys::all(), 175.0);
        assert_eq!(v, Vec2::new(-175.0, -175.0));
    }

    #[test]
    fn single_direction() {
        assert_eq!(velocity_for(Keys::RIGHT, 50.0), Vec2::new(50.0, 0.0));
        assert_eq!(velocity_for(Keys::DOWN, 50.0), Vec2::new(0.0, 50.0));
        assert_eq!(velocity_for(Keys::empty(), 50.0), Vec2::ZERO);
    }

    #[test]
    fn advance_reports_only_new_presses() {
        let first = InputState::default().advance(Keys::LEFT | Keys::SWITCH, false);
        assert!(first.just_pressed(Keys::SWITCH));

        let second = first.advance(Keys::LEFT | Keys::SWITCH, false);
        assert!(second.is_down(Keys::SWITCH));
        assert!(!second.just_pressed(Keys::SWITCH));
        assert!(!second.just_pressed(Keys::LEFT));
    }

    #[test]
    fn directional_flags_mirror_keys() {
        let d = directional(Keys::UP | Keys::RIGHT);
        assert!(d.up && d.right && !d.down && !d.left);
    }

    #[test]
    fn key_names() {
        assert_eq!(Keys::from_console_name("Left"), Some(Keys::LEFT));
        assert_eq!(Keys::from_console_name("d"), Some(Keys::SWITCH));
        assert_eq!(Keys::from_console_name("jump"), None);
    }
}
