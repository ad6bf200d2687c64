//! Asset wiring.
//!
//! Which files to preload and which tile layers a map is assembled from.
//! Decoding is the backend's job.

use anyhow::Context;
use tracing::info;

use crate::render::{ObjectId, RenderBackend};

const ASSET_ROOT: &str = "https://TarotCop.github.io/assets";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Asset {
    Image {
        key: String,
        url: String,
    },
    Tilemap {
        key: String,
        url: String,
    },
    Atlas {
        key: String,
        image_url: String,
        data_url: String,
    },
}

impl Asset {
    pub fn key(&self) -> &str {
        match self {
            Asset::Image { key, .. } | Asset::Tilemap { key, .. } | Asset::Atlas { key, .. } => key,
        }
    }
}

/// Everything a scene preloads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetManifest {
    pub entries: Vec<Asset>,
}

impl AssetManifest {
    pub fn image(mut self, key: &str, url: &str) -> Self {
        self.entries.push(Asset::Image {
            key: key.to_string(),
            url: url.to_string(),
        });
        self
    }

    pub fn tilemap(mut self, key: &str, url: &str) -> Self {
        self.entries.push(Asset::Tilemap {
            key: key.to_string(),
            url: url.to_string(),
        });
        self
    }

    pub fn atlas(mut self, key: &str, image_url: &str, data_url: &str) -> Self {
        self.entries.push(Asset::Atlas {
            key: key.to_string(),
            image_url: image_url.to_string(),
            data_url: data_url.to_string(),
        });
        self
    }

    /// Ranch tilesets, both maps and the farmer atlas.
    pub fn ranch() -> Self {
        Self::default()
            .image("tiles", &format!("{ASSET_ROOT}/TinyRanch_Tiles.png"))
            .image("structures", &format!("{ASSET_ROOT}/TinyRanch_Structures.png"))
            .image("decorations", &format!("{ASSET_ROOT}/TinyRanch_MapDecorations.png"))
            .tilemap("map", &format!("{ASSET_ROOT}/Waitroom_map.json"))
            .tilemap("main_map", &format!("{ASSET_ROOT}/Main_map.json"))
            .atlas(
                "atlas",
                &format!("{ASSET_ROOT}/TinyFarm_Characters.png"),
                &format!("{ASSET_ROOT}/Farmer.json"),
            )
    }

    pub fn preload(&self, renderer: &mut dyn RenderBackend) {
        for asset in &self.entries {
            match asset {
                Asset::Image { key, url } => renderer.load_image(key, url),
                Asset::Tilemap { key, url } => renderer.load_tilemap(key, url),
                Asset::Atlas {
                    key,
                    image_url,
                    data_url,
                } => renderer.load_atlas(key, image_url, data_url),
            }
        }
        info!(assets = self.entries.len(), "Preloaded assets");
    }
}

/// A tile layer and the tileset image it draws from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSpec {
    pub name: String,
    pub tileset_key: String,
}

/// How a tile map is turned into layers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapLayout {
    pub map_key: String,
    pub layers: Vec<LayerSpec>,
}

impl MapLayout {
    pub fn new(map_key: &str) -> Self {
        Self {
            map_key: map_key.to_string(),
            layers: Vec::new(),
        }
    }

    pub fn layer(mut self, name: &str, tileset_key: &str) -> Self {
        self.layers.push(LayerSpec {
            name: name.to_string(),
            tileset_key: tileset_key.to_string(),
        });
        self
    }

    /// Waiting-room map: ground tiles below, structures on the world and top layers.
    pub fn waitroom() -> Self {
        Self::new("map")
            .layer("Below Player", "tiles")
            .layer("World", "structures")
            .layer("Above Player", "structures")
    }

    pub fn main_map() -> Self {
        Self::new("main_map")
            .layer("Below Player", "tiles")
            .layer("World", "tiles")
    }

    /// Single-tileset layout used by the classic room.
    pub fn classic() -> Self {
        Self::new("map")
            .layer("Below Player", "tiles")
            .layer("World", "tiles")
            .layer("Above Player", "tiles")
    }

    pub fn build(&self, renderer: &mut dyn RenderBackend) -> anyhow::Result<Vec<ObjectId>> {
        self.layers
            .iter()
            .map(|l| {
                renderer
                    .create_layer(&self.map_key, &l.name, &l.tileset_key)
                    .with_context(|| format!("create layer '{}'", l.name))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::HeadlessRenderer;

    #[test]
    fn ranch_manifest_loads_every_key() {
        let mut r = HeadlessRenderer::new();
        let manifest = AssetManifest::ranch();
        manifest.preload(&mut r);
        assert_eq!(r.asset_count(), manifest.entries.len());
        for asset in &manifest.entries {
            assert!(r.asset(asset.key()).is_some(), "{} missing", asset.key());
        }
    }

    #[test]
    fn both_layouts_build_after_preload() {
        let mut r = HeadlessRenderer::new();
        AssetManifest::ranch().preload(&mut r);
        assert_eq!(MapLayout::waitroom().build(&mut r).unwrap().len(), 3);
        assert_eq!(MapLayout::main_map().build(&mut r).unwrap().len(), 2);
    }

    #[test]
    fn build_names_the_failing_layer() {
        let mut r = HeadlessRenderer::new();
        let err = MapLayout::waitroom().build(&mut r).unwrap_err();
        assert!(format!("{err:#}").contains("Below Player"));
    }
}
