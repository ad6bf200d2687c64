//! Top-level game state: renderer, event bus, scenes and the frame clock.

use std::time::Duration;

use ranch_shared::{config::GameConfig, event::EventBus};
use tracing::debug;

use crate::{
    input::InputState,
    render::RenderBackend,
    scene::{FrameTime, Scene, SceneContext, SceneManager},
};

/// Weight of the newest sample in the smoothed frame rate.
const FPS_SMOOTHING: f32 = 0.1;

#[derive(Debug, Clone, Copy, Default)]
struct FrameClock {
    now: Duration,
    fps: f32,
}

impl FrameClock {
    fn tick(&mut self, delta: Duration) -> FrameTime {
        self.now += delta;
        let secs = delta.as_secs_f32();
        if secs > 0.0 {
            let sample = 1.0 / secs;
            self.fps = if self.fps == 0.0 {
                sample
            } else {
                self.fps + (sample - self.fps) * FPS_SMOOTHING
            };
        }
        FrameTime {
            now: self.now,
            delta,
            fps: self.fps,
        }
    }

    fn time(&self) -> FrameTime {
        FrameTime {
            now: self.now,
            delta: Duration::ZERO,
            fps: self.fps,
        }
    }
}

pub struct Game<R: RenderBackend> {
    config: GameConfig,
    renderer: R,
    bus: EventBus,
    scenes: SceneManager,
    clock: FrameClock,
}

impl<R: RenderBackend> Game<R> {
    pub fn new(config: GameConfig, renderer: R) -> Self {
        Self {
            config,
            renderer,
            bus: EventBus::new(),
            scenes: SceneManager::new(),
            clock: FrameClock::default(),
        }
    }

    pub fn add_scene(&mut self, scene: impl Scene + 'static) {
        self.scenes.add(Box::new(scene));
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn active_scene(&self) -> Option<&str> {
        self.scenes.active_key()
    }

    pub fn fps(&self) -> f32 {
        self.clock.fps
    }

    /// Target time between frames.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.config.frame_hz.max(1)))
    }

    /// Starts the first scene, then any transition it requested right away.
    pub async fn boot(&mut self, key: &str) -> anyhow::Result<()> {
        let input = InputState::default();
        let mut ctx = SceneContext {
            renderer: &mut self.renderer,
            bus: &mut self.bus,
            input: &input,
            config: &self.config,
            time: self.clock.time(),
        };
        self.scenes.start(key, &mut ctx).await?;
        self.scenes.process_requests(&mut ctx).await
    }

    /// Advances one frame: updates the active scene, then applies any scene
    /// switch it asked for.
    pub async fn run_frame(&mut self, input: &InputState, delta: Duration) -> anyhow::Result<()> {
        let time = self.clock.tick(delta);
        let mut ctx = SceneContext {
            renderer: &mut self.renderer,
            bus: &mut self.bus,
            input,
            config: &self.config,
            time,
        };
        self.scenes.update(&mut ctx);
        self.scenes.process_requests(&mut ctx).await?;
        if time.now.as_secs() != (time.now - delta).as_secs() {
            debug!(fps = time.fps, scene = ?self.scenes.active_key(), "Frame");
        }
        Ok(())
    }

    pub fn shutdown(&mut self) {
        let input = InputState::default();
        let mut ctx = SceneContext {
            renderer: &mut self.renderer,
            bus: &mut self.bus,
            input: &input,
            config: &self.config,
            time: self.clock.time(),
        };
        self.scenes.shutdown(&mut ctx);
    }
}
