//! Scene lifecycle.
//!
//! A scene is preloaded, created (the one place allowed to await, which is
//! where rooms are joined), updated once per frame, and shut down when
//! another scene replaces it. Scenes ask for transitions by pushing a
//! [`SceneRequest`] onto the bus; the [`SceneManager`] carries them out
//! between frames.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use ranch_shared::{config::GameConfig, event::EventBus};
use tracing::{info, warn};

use crate::{input::InputState, render::RenderBackend};

/// Frame timing.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameTime {
    /// Time since the game started.
    pub now: Duration,
    /// Time since the previous frame.
    pub delta: Duration,
    /// Measured frames per second.
    pub fps: f32,
}

/// Everything a scene may touch during a lifecycle call.
pub struct SceneContext<'a> {
    pub renderer: &'a mut dyn RenderBackend,
    pub bus: &'a mut EventBus,
    pub input: &'a InputState,
    pub config: &'a GameConfig,
    pub time: FrameTime,
}

/// Scene transition requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneRequest {
    /// Stop the active scene and start `to`.
    Switch { from: String, to: String },
}

#[async_trait]
pub trait Scene: Send {
    fn key(&self) -> &str;

    fn preload(&mut self, _ctx: &mut SceneContext<'_>) {}

    async fn create(&mut self, ctx: &mut SceneContext<'_>) -> anyhow::Result<()>;

    fn update(&mut self, ctx: &mut SceneContext<'_>);

    fn shutdown(&mut self, _ctx: &mut SceneContext<'_>) {}
}

/// Owns the registered scenes and the active one.
#[derive(Default)]
pub struct SceneManager {
    scenes: Vec<Box<dyn Scene>>,
    active: Option<usize>,
}

impl SceneManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, scene: Box<dyn Scene>) {
        self.scenes.push(scene);
    }

    pub fn active_key(&self) -> Option<&str> {
        self.active.map(|i| self.scenes[i].key())
    }

    pub fn keys(&self) -> Vec<&str> {
        self.scenes.iter().map(|s| s.key()).collect()
    }

    /// Shuts down the active scene, then preloads and creates `key`.
    pub async fn start(&mut self, key: &str, ctx: &mut SceneContext<'_>) -> anyhow::Result<()> {
        let idx = self
            .scenes
            .iter()
            .position(|s| s.key() == key)
            .with_context(|| format!("unknown scene '{key}'"))?;

        if let Some(prev) = self.active.take() {
            info!(from = %self.scenes[prev].key(), to = %key, "Switching scene");
            self.scenes[prev].shutdown(ctx);
        } else {
            info!(scene = %key, "Starting scene");
        }

        let scene = &mut self.scenes[idx];
        scene.preload(ctx);
        scene
            .create(ctx)
            .await
            .with_context(|| format!("create scene '{key}'"))?;
        self.active = Some(idx);
        Ok(())
    }

    pub fn update(&mut self, ctx: &mut SceneContext<'_>) {
        if let Some(i) = self.active {
            self.scenes[i].update(ctx);
        }
    }

    /// Carries out queued transitions. A request whose `from` is no longer
    /// the active scene is stale and skipped, as is one naming an
    /// unregistered scene; the active scene stays up in both cases.
    pub async fn process_requests(&mut self, ctx: &mut SceneContext<'_>) -> anyhow::Result<()> {
        for req in ctx.bus.drain::<SceneRequest>() {
            match req {
                SceneRequest::Switch { from, to } => {
                    if self.active_key() != Some(from.as_str()) {
                        warn!(%from, %to, "Ignoring stale scene switch");
                        continue;
                    }
                    if !self.scenes.iter().any(|s| s.key() == to) {
                        warn!(%from, %to, "Ignoring switch to unknown scene");
                        continue;
                    }
                    self.start(&to, ctx).await?;
                }
            }
        }
        Ok(())
    }

    /// Shuts down the active scene, if any.
    pub fn shutdown(&mut self, ctx: &mut SceneContext<'_>) {
        if let Some(i) = self.active.take() {
            self.scenes[i].shutdown(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::render::HeadlessRenderer;

    struct Recorder {
        key: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        switch_to: Option<&'static str>,
    }

    #[async_trait]
    impl Scene for Recorder {
        fn key(&self) -> &str {
            self.key
        }

        fn preload(&mut self, _ctx: &mut SceneContext<'_>) {
            self.log.lock().unwrap().push(format!("{}:preload", self.key));
        }

        async fn create(&mut self, _ctx: &mut SceneContext<'_>) -> anyhow::Result<()> {
            self.log.lock().unwrap().push(format!("{}:create", self.key));
            Ok(())
        }

        fn update(&mut self, ctx: &mut SceneContext<'_>) {
            self.log.lock().unwrap().push(format!("{}:update", self.key));
            if let Some(to) = self.switch_to.take() {
                ctx.bus.push(SceneRequest::Switch {
                    from: self.key.to_string(),
                    to: to.to_string(),
                });
            }
        }

        fn shutdown(&mut self, _ctx: &mut SceneContext<'_>) {
            self.log.lock().unwrap().push(format!("{}:shutdown", self.key));
        }
    }

    #[tokio::test]
    async fn switch_runs_full_lifecycle_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = SceneManager::new();
        manager.add(Box::new(Recorder {
            key: "selector",
            log: log.clone(),
            switch_to: Some("waitroom"),
        }));
        manager.add(Box::new(Recorder {
            key: "waitroom",
            log: log.clone(),
            switch_to: None,
        }));

        let mut renderer = HeadlessRenderer::new();
        let mut bus = EventBus::new();
        let input = InputState::default();
        let config = GameConfig::default();
        let mut ctx = SceneContext {
            renderer: &mut renderer,
            bus: &mut bus,
            input: &input,
            config: &config,
            time: FrameTime::default(),
        };

        manager.start("selector", &mut ctx).await.unwrap();
        manager.update(&mut ctx);
        manager.process_requests(&mut ctx).await.unwrap();
        manager.update(&mut ctx);

        assert_eq!(manager.active_key(), Some("waitroom"));
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "selector:preload",
                "selector:create",
                "selector:update",
                "selector:shutdown",
                "waitroom:preload",
                "waitroom:create",
                "waitroom:update",
            ]
        );
    }

    #[tokio::test]
    async fn unknown_scene_is_an_error() {
        let mut manager = SceneManager::new();
        let mut renderer = HeadlessRenderer::new();
        let mut bus = EventBus::new();
        let input = InputState::default();
        let config = GameConfig::default();
        let mut ctx = SceneContext {
            renderer: &mut renderer,
            bus: &mut bus,
            input: &input,
            config: &config,
            time: FrameTime::default(),
        };
        assert!(manager.start("nowhere", &mut ctx).await.is_err());
        assert_eq!(manager.active_key(), None);
    }

    #[tokio::test]
    async fn switch_to_unknown_scene_keeps_active_one() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = SceneManager::new();
        manager.add(Box::new(Recorder {
            key: "selector",
            log: log.clone(),
            switch_to: Some("bogus"),
        }));

        let mut renderer = HeadlessRenderer::new();
        let mut bus = EventBus::new();
        let input = InputState::default();
        let config = GameConfig::default();
        let mut ctx = SceneContext {
            renderer: &mut renderer,
            bus: &mut bus,
            input: &input,
            config: &config,
            time: FrameTime::default(),
        };

        manager.start("selector", &mut ctx).await.unwrap();
        manager.update(&mut ctx);
        manager.process_requests(&mut ctx).await.unwrap();

        assert_eq!(manager.active_key(), Some("selector"));
        assert!(!log.lock().unwrap().iter().any(|l| l.ends_with(":shutdown")));
    }
}
