//! `ranch_client`
//!
//! Client side of the tile-world rooms:
//! - Room connection, join and state patches ([`client`])
//! - Keyboard and pointer state ([`input`])
//! - Local prediction and remote interpolation ([`predict`], [`interp`])
//! - Rendering backend abstraction with a headless recorder ([`render`])
//! - Asset manifest and tile map layouts ([`assets`])
//! - Scene lifecycle and the concrete scenes ([`scene`], [`scenes`])

pub mod assets;
pub mod client;
pub mod game;
pub mod input;
pub mod interp;
pub mod predict;
pub mod render;
pub mod scene;
pub mod scenes;

pub use client::{Client, Room, RoomEvent};
pub use game::Game;
