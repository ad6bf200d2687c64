//! Configuration.
//!
//! Client and server configuration parse from JSON strings (file IO is left to
//! the binaries). Every field has a default so partial files are accepted.

use serde::{Deserialize, Serialize};

use crate::endpoint::{
    derive_endpoint, Endpoint, EndpointError, PageLocation, DEFAULT_FALLBACK_ENDPOINT,
};

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// URL the client was served from, if any.
    #[serde(default)]
    pub origin: Option<String>,
    /// Endpoint used for local development hosts or when `origin` is unset.
    #[serde(default = "default_fallback_endpoint")]
    pub fallback_endpoint: String,
    /// Scene the menu starts when clicked.
    #[serde(default = "default_start_scene")]
    pub start_scene: String,
    /// Target frame rate of the update loop.
    #[serde(default = "default_frame_hz")]
    pub frame_hz: u32,
    /// Per-frame blend factor for remote players.
    #[serde(default = "default_interp_factor")]
    pub interp_factor: f32,
    /// Snap the local player to the server position past this drift, in pixels.
    #[serde(default)]
    pub reconcile_snap_distance: Option<f32>,
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,
    /// Outbound message queue depth per room.
    #[serde(default = "default_send_queue")]
    pub send_queue: usize,
}

fn default_fallback_endpoint() -> String {
    DEFAULT_FALLBACK_ENDPOINT.to_string()
}

fn default_start_scene() -> String {
    "waitroom".to_string()
}

fn default_frame_hz() -> u32 {
    60
}

fn default_interp_factor() -> f32 {
    0.2
}

fn default_join_timeout_ms() -> u64 {
    5_000
}

fn default_send_queue() -> usize {
    64
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            origin: None,
            fallback_endpoint: default_fallback_endpoint(),
            start_scene: default_start_scene(),
            frame_hz: default_frame_hz(),
            interp_factor: default_interp_factor(),
            reconcile_snap_distance: None,
            join_timeout_ms: default_join_timeout_ms(),
            send_queue: default_send_queue(),
        }
    }
}

impl GameConfig {
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Parsed page location, if an origin is configured.
    pub fn page(&self) -> Result<Option<PageLocation>, EndpointError> {
        self.origin.as_deref().map(PageLocation::parse).transpose()
    }

    /// Room service endpoint for this client.
    pub fn endpoint(&self) -> Result<Endpoint, EndpointError> {
        let page = self.page()?;
        derive_endpoint(page.as_ref(), &self.fallback_endpoint)
    }

    /// Scene named by the page hash, if any.
    pub fn hash_scene(&self) -> Option<String> {
        self.page().ok().flatten().and_then(|p| p.hash)
    }
}

/// Loopback room service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Patch broadcast rate.
    #[serde(default = "default_patch_hz")]
    pub patch_hz: u32,
    /// Room names clients may join or create.
    #[serde(default = "default_room_names")]
    pub rooms: Vec<String>,
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,
    /// Speed applied to directional input, in pixels per second.
    #[serde(default = "default_move_speed")]
    pub move_speed: f32,
}

fn default_listen_addr() -> String {
    "127.0.0.1:2567".to_string()
}

fn default_patch_hz() -> u32 {
    20
}

fn default_room_names() -> Vec<String> {
    vec![
        "waitroom".to_string(),
        "main_room".to_string(),
        "my_room".to_string(),
    ]
}

fn default_max_clients() -> usize {
    16
}

fn default_move_speed() -> f32 {
    175.0
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            patch_hz: default_patch_hz(),
            rooms: default_room_names(),
            max_clients: default_max_clients(),
            move_speed: default_move_speed(),
        }
    }
}

impl ServerConfig {
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}
