//! `ranch_server`
//!
//! Loopback room service for local development and tests:
//! - Join-or-create by room name
//! - Authoritative player positions, from client positions or held directions
//! - Fixed-rate state patches
//!
//! Networking model:
//! - TCP with length-prefixed JSON frames, one connection per session

pub mod room;
pub mod server;

pub use room::{RoomError, RoomManager};
pub use server::RoomServer;
