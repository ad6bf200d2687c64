//! Rendering abstraction.
//!
//! The client never draws anything itself: tile maps, atlases, sprites and
//! text all belong to the rendering backend. Scenes talk to it through
//! [`RenderBackend`]. [`HeadlessRenderer`] records the resulting scene graph
//! and is what tests and the console client run against.

use std::collections::{BTreeMap, HashMap};

use anyhow::bail;
use ranch_shared::math::Vec2;
use tracing::debug;

/// Handle to a backend-owned display object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub u64);

/// Text styling hints.
#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    /// `#rrggbb`.
    pub color: String,
    pub font_size: u32,
    pub padding: u32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            color: "#ff0000".to_string(),
            font_size: 16,
            padding: 4,
        }
    }
}

/// Asset kinds a backend can preload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadedAsset {
    Image { url: String },
    Tilemap { url: String },
    Atlas { image_url: String, data_url: String },
}

/// A minimal 2D scene API.
pub trait RenderBackend: Send {
    fn set_background(&mut self, rgb: u32);

    fn load_image(&mut self, key: &str, url: &str);
    fn load_tilemap(&mut self, key: &str, url: &str);
    fn load_atlas(&mut self, key: &str, image_url: &str, data_url: &str);

    /// Creates a tile layer from a loaded tile map.
    fn create_layer(&mut self, map_key: &str, layer: &str, tileset_key: &str)
        -> anyhow::Result<ObjectId>;
    /// Size in pixels of a loaded tile map, when the backend knows it.
    fn map_size(&self, map_key: &str) -> Option<Vec2>;

    fn add_sprite(&mut self, position: Vec2, texture: &str, frame: &str) -> ObjectId;
    fn add_text(&mut self, position: Vec2, text: &str, style: &TextStyle) -> ObjectId;
    fn set_text(&mut self, id: ObjectId, text: &str);
    /// Outlined rectangle.
    fn add_rect(&mut self, position: Vec2, size: Vec2, stroke_rgb: u32) -> ObjectId;

    fn set_position(&mut self, id: ObjectId, position: Vec2);
    fn position(&self, id: ObjectId) -> Option<Vec2>;
    /// Returns false if the object was already gone.
    fn destroy(&mut self, id: ObjectId) -> bool;

    fn camera_follow(&mut self, id: ObjectId);
    fn camera_bounds(&mut self, origin: Vec2, size: Vec2);
    fn camera_zoom(&mut self, zoom: f32);

    fn enable_debug_overlay(&mut self);
}

/// What a recorded object is.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectKind {
    Layer { map: String, name: String },
    Sprite { texture: String, frame: String },
    Text { text: String, style: TextStyle },
    Rect { size: Vec2, stroke_rgb: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    pub kind: ObjectKind,
    pub position: Vec2,
}

/// Camera settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub follow: Option<ObjectId>,
    pub bounds: Option<(Vec2, Vec2)>,
    pub zoom: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            follow: None,
            bounds: None,
            zoom: 1.0,
        }
    }
}

/// Backend that keeps the scene graph in memory.
#[derive(Debug, Default)]
pub struct HeadlessRenderer {
    next_id: u64,
    objects: BTreeMap<ObjectId, Object>,
    assets: HashMap<String, LoadedAsset>,
    map_sizes: HashMap<String, Vec2>,
    pub background: u32,
    pub camera: Camera,
    pub debug_overlay: bool,
}

impl HeadlessRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares the pixel size of a tile map, standing in for parsing it.
    pub fn with_map_size(mut self, map_key: &str, size: Vec2) -> Self {
        self.map_sizes.insert(map_key.to_string(), size);
        self
    }

    pub fn object(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(&id)
    }

    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &Object)> {
        self.objects.iter().map(|(id, o)| (*id, o))
    }

    pub fn asset(&self, key: &str) -> Option<&LoadedAsset> {
        self.assets.get(key)
    }

    pub fn asset_count(&self) -> usize {
        self.assets.len()
    }

    pub fn sprite_count(&self) -> usize {
        self.objects
            .values()
            .filter(|o| matches!(o.kind, ObjectKind::Sprite { .. }))
            .count()
    }

    /// Contents of every live text object, in creation order.
    pub fn texts(&self) -> Vec<&str> {
        self.objects
            .values()
            .filter_map(|o| match &o.kind {
                ObjectKind::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn layer_names(&self) -> Vec<&str> {
        self.objects
            .values()
            .filter_map(|o| match &o.kind {
                ObjectKind::Layer { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    fn insert(&mut self, kind: ObjectKind, position: Vec2) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.objects.insert(id, Object { kind, position });
        id
    }
}

impl RenderBackend for HeadlessRenderer {
    fn set_background(&mut self, rgb: u32) {
        self.background = rgb;
    }

    fn load_image(&mut self, key: &str, url: &str) {
        debug!(key, url, "Load image");
        self.assets.insert(
            key.to_string(),
            LoadedAsset::Image {
                url: url.to_string(),
            },
        );
    }

    fn load_tilemap(&mut self, key: &str, url: &str) {
        debug!(key, url, "Load tilemap");
        self.assets.insert(
            key.to_string(),
            LoadedAsset::Tilemap {
                url: url.to_string(),
            },
        );
    }

    fn load_atlas(&mut self, key: &str, image_url: &str, data_url: &str) {
        debug!(key, image_url, data_url, "Load atlas");
        self.assets.insert(
            key.to_string(),
            LoadedAsset::Atlas {
                image_url: image_url.to_string(),
                data_url: data_url.to_string(),
            },
        );
    }

    fn create_layer(
        &mut self,
        map_key: &str,
        layer: &str,
        tileset_key: &str,
    ) -> anyhow::Result<ObjectId> {
        if !matches!(self.assets.get(map_key), Some(LoadedAsset::Tilemap { .. })) {
            bail!("tilemap '{map_key}' is not loaded");
        }
        if !matches!(self.assets.get(tileset_key), Some(LoadedAsset::Image { .. })) {
            bail!("tileset image '{tileset_key}' is not loaded");
        }
        Ok(self.insert(
            ObjectKind::Layer {
                map: map_key.to_string(),
                name: layer.to_string(),
            },
            Vec2::ZERO,
        ))
    }

    fn map_size(&self, map_key: &str) -> Option<Vec2> {
        self.map_sizes.get(map_key).copied()
    }

    fn add_sprite(&mut self, position: Vec2, texture: &str, frame: &str) -> ObjectId {
        self.insert(
            ObjectKind::Sprite {
                texture: texture.to_string(),
                frame: frame.to_string(),
            },
            position,
        )
    }

    fn add_text(&mut self, position: Vec2, text: &str, style: &TextStyle) -> ObjectId {
        self.insert(
            ObjectKind::Text {
                text: text.to_string(),
                style: style.clone(),
            },
            position,
        )
    }

    fn set_text(&mut self, id: ObjectId, text: &str) {
        if let Some(Object {
            kind: ObjectKind::Text { text: t, .. },
            ..
        }) = self.objects.get_mut(&id)
        {
            *t = text.to_string();
        }
    }

    fn add_rect(&mut self, position: Vec2, size: Vec2, stroke_rgb: u32) -> ObjectId {
        self.insert(ObjectKind::Rect { size, stroke_rgb }, position)
    }

    fn set_position(&mut self, id: ObjectId, position: Vec2) {
        if let Some(o) = self.objects.get_mut(&id) {
            o.position = position;
        }
    }

    fn position(&self, id: ObjectId) -> Option<Vec2> {
        self.objects.get(&id).map(|o| o.position)
    }

    fn destroy(&mut self, id: ObjectId) -> bool {
        if self.camera.follow == Some(id) {
            self.camera.follow = None;
        }
        self.objects.remove(&id).is_some()
    }

    fn camera_follow(&mut self, id: ObjectId) {
        self.camera.follow = Some(id);
    }

    fn camera_bounds(&mut self, origin: Vec2, size: Vec2) {
        self.camera.bounds = Some((origin, size));
    }

    fn camera_zoom(&mut self, zoom: f32) {
        self.camera.zoom = zoom;
    }

    fn enable_debug_overlay(&mut self) {
        self.debug_overlay = true;
    }
}
