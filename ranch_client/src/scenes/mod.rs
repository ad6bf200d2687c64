//! Built-in scenes: the boot menu and the room-backed play scene.

pub mod boot;
pub mod play;

pub use boot::{BootScene, SELECTOR_KEY};
pub use play::{InputMode, PlayScene, PlaySceneConfig, SyncMode};
