//! `ranch_shared`
//!
//! Libraries shared by the room client and the loopback room service.
//!
//! Design goals:
//! - Room state is owned by the service; clients mirror it from patches.
//! - Explicit, versioned wire messages (JSON frames).
//! - No `unsafe`.

pub mod config;
pub mod endpoint;
pub mod event;
pub mod math;
pub mod net;
pub mod schema;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::*;
    pub use crate::endpoint::*;
    pub use crate::event::*;
    pub use crate::math::*;
    pub use crate::net::*;
    pub use crate::schema::*;
}
