//! Boot / menu scene.
//!
//! Preloads the shared assets and offers a single menu entry. A click starts
//! the configured play scene; a page hash naming a scene skips the menu. The
//! menu is drawn either way, so it stays usable if the hash names no scene.

use async_trait::async_trait;
use ranch_shared::math::Vec2;
use tracing::info;

use crate::{
    assets::AssetManifest,
    render::{ObjectId, TextStyle},
    scene::{Scene, SceneContext, SceneRequest},
};

pub const SELECTOR_KEY: &str = "selector";

pub const MENU_LABEL: &str = "Play Game";
pub const JOIN_HINT: &str = "Click to join.";

pub struct BootScene {
    manifest: AssetManifest,
    menu: Vec<ObjectId>,
    requested: bool,
}

impl BootScene {
    pub fn new(manifest: AssetManifest) -> Self {
        Self {
            manifest,
            menu: Vec::new(),
            requested: false,
        }
    }

    fn request(&mut self, ctx: &mut SceneContext<'_>, to: String) {
        info!(scene = %to, "Menu starting scene");
        self.requested = true;
        ctx.bus.push(SceneRequest::Switch {
            from: SELECTOR_KEY.to_string(),
            to,
        });
    }
}

impl Default for BootScene {
    fn default() -> Self {
        Self::new(AssetManifest::ranch())
    }
}

#[async_trait]
impl Scene for BootScene {
    fn key(&self) -> &str {
        SELECTOR_KEY
    }

    fn preload(&mut self, ctx: &mut SceneContext<'_>) {
        ctx.renderer.set_background(0x000000);
        self.manifest.preload(ctx.renderer);
    }

    async fn create(&mut self, ctx: &mut SceneContext<'_>) -> anyhow::Result<()> {
        self.requested = false;

        if let Some(hash) = ctx.config.hash_scene() {
            info!(scene = %hash, "Page hash names a scene");
            ctx.bus.push(SceneRequest::Switch {
                from: SELECTOR_KEY.to_string(),
                to: hash,
            });
        }

        let label = TextStyle {
            padding: 6,
            ..TextStyle::default()
        };
        let hint = TextStyle {
            color: "#ffffff".to_string(),
            font_size: 18,
            padding: 0,
        };
        self.menu.push(ctx.renderer.add_text(Vec2::new(100.0, 75.0), MENU_LABEL, &label));
        self.menu.push(ctx.renderer.add_text(Vec2::new(10.0, 10.0), JOIN_HINT, &hint));
        Ok(())
    }

    fn update(&mut self, ctx: &mut SceneContext<'_>) {
        if ctx.input.pointer_down && !self.requested {
            let to = ctx.config.start_scene.clone();
            self.request(ctx, to);
        }
    }

    fn shutdown(&mut self, ctx: &mut SceneContext<'_>) {
        for id in self.menu.drain(..) {
            ctx.renderer.destroy(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use ranch_shared::{config::GameConfig, event::EventBus};

    use super::*;
    use crate::{
        input::InputState,
        render::HeadlessRenderer,
        scene::FrameTime,
    };

    #[tokio::test]
    async fn click_requests_start_scene_once() {
        let mut scene = BootScene::default();
        let mut renderer = HeadlessRenderer::new();
        let mut bus = EventBus::new();
        let config = GameConfig::default();
        let idle = InputState::default();
        let click = InputState {
            pointer_down: true,
            ..Default::default()
        };

        {
            let mut ctx = SceneContext {
                renderer: &mut renderer,
                bus: &mut bus,
                input: &idle,
                config: &config,
                time: FrameTime::default(),
            };
            scene.preload(&mut ctx);
            scene.create(&mut ctx).await.unwrap();
            scene.update(&mut ctx);
        }
        assert_eq!(renderer.texts(), vec![MENU_LABEL, JOIN_HINT]);
        assert!(renderer.asset("atlas").is_some());
        assert_eq!(bus.pending::<SceneRequest>(), 0);

        for _ in 0..2 {
            let mut ctx = SceneContext {
                renderer: &mut renderer,
                bus: &mut bus,
                input: &click,
                config: &config,
                time: FrameTime::default(),
            };
            scene.update(&mut ctx);
        }
        assert_eq!(
            bus.drain::<SceneRequest>(),
            vec![SceneRequest::Switch {
                from: SELECTOR_KEY.into(),
                to: "waitroom".into()
            }]
        );
    }

    #[tokio::test]
    async fn page_hash_skips_the_menu() {
        let mut scene = BootScene::default();
        let mut renderer = HeadlessRenderer::new();
        let mut bus = EventBus::new();
        let config = GameConfig {
            origin: Some("http://localhost:8080/#mainroom".into()),
            ..Default::default()
        };
        let input = InputState::default();
        let mut ctx = SceneContext {
            renderer: &mut renderer,
            bus: &mut bus,
            input: &input,
            config: &config,
            time: FrameTime::default(),
        };
        scene.create(&mut ctx).await.unwrap();

        assert_eq!(
            bus.drain::<SceneRequest>(),
            vec![SceneRequest::Switch {
                from: SELECTOR_KEY.into(),
                to: "mainroom".into()
            }]
        );
        // Drawn anyway; shutdown clears it when the switch goes through.
        assert_eq!(renderer.texts(), vec![MENU_LABEL, JOIN_HINT]);
    }
}
