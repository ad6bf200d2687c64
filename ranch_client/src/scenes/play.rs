//! Room-backed play scene.
//!
//! One implementation serves every room variant; [`PlaySceneConfig`] picks
//! the map, the room name, how remote state is applied and what input is
//! sent.
//!
//! Per frame:
//! 1. Fold room patches into events and apply them to the entity map.
//! 2. Move the local player from held keys (prediction).
//! 3. Send this frame's input to the room.
//! 4. Blend every remote player toward its last server position.

use std::{collections::BTreeMap, time::Duration};

use async_trait::async_trait;
use ranch_shared::{
    config::GameConfig,
    math::Vec2,
    net::{MessageKind, PositionInput, SessionId},
};
use tracing::{debug, info, warn};

use crate::{
    assets::MapLayout,
    client::{Client, Room, RoomEvent},
    input::{directional, velocity_for, InputState, Keys},
    interp::Interpolator,
    predict::PredictedPlayer,
    render::{ObjectId, RenderBackend, TextStyle},
    scene::{Scene, SceneContext, SceneRequest},
};

pub const CONNECTING_TEXT: &str = "Trying to connect with the server...";
pub const FAILED_TEXT: &str = "Could not connect with the server.";

/// Player body size, used for the reference boxes.
pub const PLAYER_SIZE: Vec2 = Vec2::new(30.0, 40.0);

const LOCAL_REF_RGB: u32 = 0x00ff00;
const REMOTE_REF_RGB: u32 = 0xff0000;

/// How server positions reach the sprites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Local player predicted, remote players interpolated.
    Interpolate,
    /// Every sprite jumps to the server position.
    Snap,
}

/// What the scene sends every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// The predicted position, as message type 0.
    Position,
    /// Raw direction flags, as message `"input"`.
    Directional,
}

#[derive(Debug, Clone)]
pub struct PlaySceneConfig {
    pub key: String,
    pub room_name: String,
    pub layout: MapLayout,
    pub sprite_texture: String,
    pub sprite_frame: String,
    /// Pixels per second.
    pub velocity: f32,
    pub sync: SyncMode,
    pub input: InputMode,
    /// Whether `D` acts as the switch key in this scene.
    pub switch_key: bool,
    /// Scene the switch key moves to; without one the key shows the debug overlay.
    pub next_scene: Option<String>,
    pub show_fps: bool,
    pub zoom: Option<f32>,
}

impl PlaySceneConfig {
    pub fn waitroom() -> Self {
        Self {
            key: "waitroom".to_string(),
            room_name: "waitroom".to_string(),
            layout: MapLayout::waitroom(),
            sprite_texture: "atlas".to_string(),
            sprite_frame: "front".to_string(),
            velocity: 50.0,
            sync: SyncMode::Interpolate,
            input: InputMode::Position,
            switch_key: true,
            next_scene: Some("mainroom".to_string()),
            show_fps: false,
            zoom: None,
        }
    }

    pub fn mainroom() -> Self {
        Self {
            key: "mainroom".to_string(),
            room_name: "main_room".to_string(),
            layout: MapLayout::main_map(),
            sprite_frame: "misa-front".to_string(),
            velocity: 175.0,
            next_scene: None,
            show_fps: true,
            ..Self::waitroom()
        }
    }

    /// Server-simulated room: direction flags up, positions snapped down.
    pub fn classic() -> Self {
        Self {
            key: "classic".to_string(),
            room_name: "my_room".to_string(),
            layout: MapLayout::classic(),
            sprite_frame: String::new(),
            sync: SyncMode::Snap,
            input: InputMode::Directional,
            // D is a movement key here.
            switch_key: false,
            next_scene: None,
            zoom: Some(0.5),
            ..Self::waitroom()
        }
    }
}

async fn connect(room_name: &str, config: &GameConfig) -> anyhow::Result<Room> {
    let endpoint = config.endpoint()?;
    Client::new(endpoint)
        .with_join_timeout(Duration::from_millis(config.join_timeout_ms))
        .with_send_queue(config.send_queue)
        .join_or_create(room_name, serde_json::json!({}))
        .await
}

#[derive(Debug, Clone, Copy)]
struct PlayerEntity {
    sprite: ObjectId,
    position: Vec2,
    /// Last server position, for interpolated remote players.
    target: Option<Vec2>,
}

#[derive(Debug, Clone, Copy)]
struct ReferenceBoxes {
    local: ObjectId,
    remote: ObjectId,
}

pub struct PlayScene {
    cfg: PlaySceneConfig,
    room: Option<Room>,
    local_session: Option<SessionId>,
    entities: BTreeMap<SessionId, PlayerEntity>,
    predicted: Option<PredictedPlayer>,
    refs: Option<ReferenceBoxes>,
    status_text: Option<ObjectId>,
    fps_text: Option<ObjectId>,
    layers: Vec<ObjectId>,
    interpolator: Interpolator,
    switch_used: bool,
    join_failed: bool,
}

impl PlayScene {
    pub fn new(cfg: PlaySceneConfig) -> Self {
        Self {
            cfg,
            room: None,
            local_session: None,
            entities: BTreeMap::new(),
            predicted: None,
            refs: None,
            status_text: None,
            fps_text: None,
            layers: Vec::new(),
            interpolator: Interpolator::default(),
            switch_used: false,
            join_failed: false,
        }
    }

    pub fn config(&self) -> &PlaySceneConfig {
        &self.cfg
    }

    pub fn is_connected(&self) -> bool {
        self.room.as_ref().is_some_and(Room::is_open)
    }

    pub fn join_failed(&self) -> bool {
        self.join_failed
    }

    pub fn local_session(&self) -> Option<&SessionId> {
        self.local_session.as_ref()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entity_position(&self, id: &SessionId) -> Option<Vec2> {
        self.entities.get(id).map(|e| e.position)
    }

    fn is_local(&self, id: &SessionId) -> bool {
        self.local_session.as_ref() == Some(id)
    }

    fn apply_event(&mut self, event: RoomEvent, renderer: &mut dyn RenderBackend) {
        match event {
            RoomEvent::PlayerAdded { session_id, player } => {
                if self.entities.contains_key(&session_id) {
                    debug!(session = %session_id, "Player already has an entity");
                    return;
                }
                let pos = player.position();
                let sprite =
                    renderer.add_sprite(pos, &self.cfg.sprite_texture, &self.cfg.sprite_frame);
                let local = self.is_local(&session_id);
                info!(session = %session_id, local, "Player joined");
                self.entities.insert(
                    session_id,
                    PlayerEntity {
                        sprite,
                        position: pos,
                        target: None,
                    },
                );

                if local {
                    renderer.camera_follow(sprite);
                    if let Some(size) = renderer.map_size(&self.cfg.layout.map_key) {
                        renderer.camera_bounds(Vec2::ZERO, size);
                    }
                    if self.cfg.sync == SyncMode::Interpolate {
                        self.predicted = Some(PredictedPlayer::new(pos));
                        self.refs = Some(ReferenceBoxes {
                            local: renderer.add_rect(pos, PLAYER_SIZE, LOCAL_REF_RGB),
                            remote: renderer.add_rect(pos, PLAYER_SIZE, REMOTE_REF_RGB),
                        });
                    }
                }
            }
            RoomEvent::PlayerChanged { session_id, player } => {
                let pos = player.position();
                let local = self.is_local(&session_id);
                let Some(entity) = self.entities.get_mut(&session_id) else {
                    debug!(session = %session_id, "Change for unknown player");
                    return;
                };
                match (self.cfg.sync, local) {
                    (SyncMode::Interpolate, true) => {
                        if let Some(p) = self.predicted.as_mut() {
                            p.on_server_update(pos);
                        }
                        if let Some(refs) = self.refs {
                            renderer.set_position(refs.remote, pos);
                        }
                    }
                    (SyncMode::Interpolate, false) => entity.target = Some(pos),
                    (SyncMode::Snap, _) => {
                        entity.position = pos;
                        renderer.set_position(entity.sprite, pos);
                    }
                }
            }
            RoomEvent::PlayerRemoved { session_id } => {
                if let Some(entity) = self.entities.remove(&session_id) {
                    renderer.destroy(entity.sprite);
                    info!(session = %session_id, "Player left");
                }
                if self.is_local(&session_id) {
                    self.predicted = None;
                    if let Some(refs) = self.refs.take() {
                        renderer.destroy(refs.local);
                        renderer.destroy(refs.remote);
                    }
                }
            }
            RoomEvent::StateChanged => {}
            RoomEvent::Left { reason } => {
                warn!(room = %self.cfg.room_name, %reason, "Lost room connection");
            }
        }
    }

    /// Only live once the room has been joined.
    fn handle_switch_key(&mut self, ctx: &mut SceneContext<'_>) {
        if !self.cfg.switch_key || self.local_session.is_none() || self.switch_used {
            return;
        }
        if !ctx.input.just_pressed(Keys::SWITCH) {
            return;
        }
        self.switch_used = true;
        match &self.cfg.next_scene {
            Some(to) => ctx.bus.push(SceneRequest::Switch {
                from: self.cfg.key.clone(),
                to: to.clone(),
            }),
            None => ctx.renderer.enable_debug_overlay(),
        }
    }

    fn predict_local(&mut self, ctx: &mut SceneContext<'_>, local: &SessionId) {
        let Some(p) = self.predicted.as_mut() else {
            return;
        };
        p.integrate(
            velocity_for(ctx.input.held, self.cfg.velocity),
            ctx.time.delta.as_secs_f32(),
        );
        if p.reconcile(ctx.config.reconcile_snap_distance) {
            debug!(session = %local, "Snapped local player to server position");
        }
        let pos = p.position;

        if let Some(entity) = self.entities.get_mut(local) {
            entity.position = pos;
            ctx.renderer.set_position(entity.sprite, pos);
        }
        if let Some(refs) = self.refs {
            ctx.renderer.set_position(refs.local, pos);
        }
    }

    fn send_input(&self, input: &InputState, local: &SessionId) {
        let Some(room) = self.room.as_ref() else {
            return;
        };
        match self.cfg.input {
            InputMode::Position => {
                if let Some(e) = self.entities.get(local) {
                    room.send(
                        MessageKind::POSITION,
                        &PositionInput {
                            x: e.position.x,
                            y: e.position.y,
                        },
                    );
                }
            }
            InputMode::Directional => room.send(MessageKind::input(), &directional(input.held)),
        }
    }

    fn interpolate_remotes(&mut self, renderer: &mut dyn RenderBackend, local: &SessionId) {
        for (id, entity) in self.entities.iter_mut() {
            if id == local {
                continue;
            }
            let next = self.interpolator.step(entity.position, entity.target);
            if next != entity.position {
                entity.position = next;
                renderer.set_position(entity.sprite, next);
            }
        }
    }

    fn clear(&mut self, renderer: &mut dyn RenderBackend) {
        if let Some(mut room) = self.room.take() {
            room.leave();
        }
        for (_, e) in std::mem::take(&mut self.entities) {
            renderer.destroy(e.sprite);
        }
        if let Some(refs) = self.refs.take() {
            renderer.destroy(refs.local);
            renderer.destroy(refs.remote);
        }
        for id in self
            .status_text
            .take()
            .into_iter()
            .chain(self.fps_text.take())
            .chain(self.layers.drain(..))
        {
            renderer.destroy(id);
        }
        self.local_session = None;
        self.predicted = None;
        self.switch_used = false;
        self.join_failed = false;
    }
}

#[async_trait]
impl Scene for PlayScene {
    fn key(&self) -> &str {
        &self.cfg.key
    }

    async fn create(&mut self, ctx: &mut SceneContext<'_>) -> anyhow::Result<()> {
        self.clear(ctx.renderer);
        self.interpolator = Interpolator::new(ctx.config.interp_factor);

        let style = TextStyle::default();
        if self.cfg.show_fps {
            self.fps_text = Some(ctx.renderer.add_text(Vec2::new(4.0, 4.0), "", &style));
        }
        let status = ctx.renderer.add_text(Vec2::ZERO, CONNECTING_TEXT, &style);

        let room_name = self.cfg.room_name.clone();
        match connect(&room_name, ctx.config).await {
            Ok(room) => {
                ctx.renderer.destroy(status);
                self.local_session = Some(room.session_id().clone());
                self.room = Some(room);
            }
            Err(e) => {
                warn!(room = %self.cfg.room_name, error = %format!("{e:#}"), "Join failed");
                ctx.renderer.set_text(status, FAILED_TEXT);
                self.status_text = Some(status);
                self.join_failed = true;
                return Ok(());
            }
        }

        match self.cfg.layout.build(ctx.renderer) {
            Ok(layers) => self.layers = layers,
            Err(e) => warn!(
                map = %self.cfg.layout.map_key,
                error = %format!("{e:#}"),
                "Map layers unavailable"
            ),
        }
        if let Some(zoom) = self.cfg.zoom {
            ctx.renderer.camera_zoom(zoom);
        }
        Ok(())
    }

    fn update(&mut self, ctx: &mut SceneContext<'_>) {
        if let Some(room) = self.room.as_mut() {
            room.poll(ctx.bus);
        }
        for event in ctx.bus.drain::<RoomEvent>() {
            self.apply_event(event, ctx.renderer);
        }
        self.handle_switch_key(ctx);

        // Nothing to drive until the room has announced our own player.
        let Some(local) = self.local_session.clone() else {
            return;
        };
        if !self.entities.contains_key(&local) {
            return;
        }

        if let Some(id) = self.fps_text {
            ctx.renderer.set_text(id, &format!("Frame rate: {:.1}", ctx.time.fps));
        }

        if self.cfg.sync == SyncMode::Interpolate {
            self.predict_local(ctx, &local);
        }
        self.send_input(ctx.input, &local);
        if self.cfg.sync == SyncMode::Interpolate {
            self.interpolate_remotes(ctx.renderer, &local);
        }
    }

    fn shutdown(&mut self, ctx: &mut SceneContext<'_>) {
        self.clear(ctx.renderer);
    }
}

#[cfg(test)]
mod tests {
    use ranch_shared::{event::EventBus, schema::Player};

    use super::*;
    use crate::{assets::AssetManifest, render::HeadlessRenderer, scene::FrameTime};

    fn sid(s: &str) -> SessionId {
        SessionId::new(s)
    }

    fn added(id: &str, x: f32, y: f32) -> RoomEvent {
        RoomEvent::PlayerAdded {
            session_id: sid(id),
            player: Player::new(x, y),
        }
    }

    fn scene_as(local: &str) -> PlayScene {
        let mut scene = PlayScene::new(PlaySceneConfig::waitroom());
        scene.local_session = Some(sid(local));
        scene
    }

    #[tokio::test]
    async fn unreachable_service_shows_failure_text() {
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let config = GameConfig {
            fallback_endpoint: format!("ws://127.0.0.1:{port}"),
            join_timeout_ms: 500,
            ..Default::default()
        };

        let mut scene = PlayScene::new(PlaySceneConfig::waitroom());
        let mut renderer = HeadlessRenderer::new();
        let mut bus = EventBus::new();
        let input = InputState::default().advance(Keys::LEFT | Keys::SWITCH, false);
        let mut ctx = SceneContext {
            renderer: &mut renderer,
            bus: &mut bus,
            input: &input,
            config: &config,
            time: FrameTime::default(),
        };
        scene.create(&mut ctx).await.unwrap();
        scene.update(&mut ctx);

        assert!(scene.join_failed());
        assert!(!scene.is_connected());
        // The switch key stays inert on the failure screen.
        assert_eq!(bus.pending::<SceneRequest>(), 0);
        assert_eq!(renderer.texts(), vec![FAILED_TEXT]);
        assert!(renderer.layer_names().is_empty());
        assert_eq!(renderer.sprite_count(), 0);
    }

    #[test]
    fn one_entity_per_session_and_camera_on_local() {
        let mut scene = scene_as("me");
        let mut r = HeadlessRenderer::new().with_map_size("map", Vec2::new(640.0, 480.0));

        scene.apply_event(added("me", 10.0, 10.0), &mut r);
        scene.apply_event(added("other", 50.0, 50.0), &mut r);
        scene.apply_event(added("other", 99.0, 99.0), &mut r);

        assert_eq!(scene.entity_count(), 2);
        // Two player sprites plus the two reference boxes.
        assert_eq!(r.sprite_count(), 2);
        assert_eq!(r.objects().count(), 4);
        assert_eq!(scene.entity_position(&sid("other")), Some(Vec2::new(50.0, 50.0)));
        assert!(r.camera.follow.is_some());
        assert_eq!(r.camera.bounds, Some((Vec2::ZERO, Vec2::new(640.0, 480.0))));
    }

    #[test]
    fn removed_player_loses_sprite_and_mapping() {
        let mut scene = scene_as("me");
        let mut r = HeadlessRenderer::new();
        scene.apply_event(added("me", 0.0, 0.0), &mut r);
        scene.apply_event(added("other", 5.0, 5.0), &mut r);

        scene.apply_event(
            RoomEvent::PlayerRemoved {
                session_id: sid("other"),
            },
            &mut r,
        );
        assert_eq!(scene.entity_count(), 1);
        assert_eq!(scene.entity_position(&sid("other")), None);
        assert_eq!(r.sprite_count(), 1);

        scene.apply_event(
            RoomEvent::PlayerRemoved {
                session_id: sid("me"),
            },
            &mut r,
        );
        assert_eq!(scene.entity_count(), 0);
        assert_eq!(r.objects().count(), 0);
    }

    #[test]
    fn remote_players_chase_server_position() {
        let mut scene = scene_as("me");
        let mut r = HeadlessRenderer::new();
        let mut bus = EventBus::new();
        let config = GameConfig::default();
        let input = InputState::default();

        bus.extend([
            added("me", 0.0, 0.0),
            added("other", 0.0, 0.0),
            RoomEvent::PlayerChanged {
                session_id: sid("other"),
                player: Player::new(100.0, 0.0),
            },
        ]);

        let mut ctx = SceneContext {
            renderer: &mut r,
            bus: &mut bus,
            input: &input,
            config: &config,
            time: FrameTime {
                delta: Duration::from_millis(16),
                ..Default::default()
            },
        };
        scene.update(&mut ctx);
        let x1 = scene.entity_position(&sid("other")).unwrap().x;
        assert!((x1 - 20.0).abs() < 1e-3);

        scene.update(&mut ctx);
        let x2 = scene.entity_position(&sid("other")).unwrap().x;
        assert!((x2 - 36.0).abs() < 1e-3);
    }

    #[test]
    fn local_player_is_predicted_and_server_echo_moves_remote_ref() {
        let mut scene = scene_as("me");
        let mut r = HeadlessRenderer::new();
        let mut bus = EventBus::new();
        let config = GameConfig::default();
        let input = InputState::holding(Keys::RIGHT | Keys::DOWN);

        bus.push(added("me", 100.0, 100.0));
        {
            let mut ctx = SceneContext {
                renderer: &mut r,
                bus: &mut bus,
                input: &input,
                config: &config,
                time: FrameTime {
                    delta: Duration::from_millis(500),
                    ..Default::default()
                },
            };
            scene.update(&mut ctx);
        }
        // Waitroom speed is 50 px/s.
        assert_eq!(scene.entity_position(&sid("me")), Some(Vec2::new(125.0, 125.0)));

        scene.apply_event(
            RoomEvent::PlayerChanged {
                session_id: sid("me"),
                player: Player::new(110.0, 100.0),
            },
            &mut r,
        );
        let refs = scene.refs.unwrap();
        assert_eq!(r.position(refs.remote), Some(Vec2::new(110.0, 100.0)));
        assert_eq!(r.position(refs.local), Some(Vec2::new(125.0, 125.0)));
        // The echo alone doesn't move the predicted body.
        assert_eq!(scene.entity_position(&sid("me")), Some(Vec2::new(125.0, 125.0)));
    }

    #[test]
    fn snap_mode_jumps_straight_to_server_position() {
        let mut scene = PlayScene::new(PlaySceneConfig::classic());
        scene.local_session = Some(sid("me"));
        let mut r = HeadlessRenderer::new();
        scene.apply_event(added("me", 0.0, 0.0), &mut r);
        scene.apply_event(added("other", 0.0, 0.0), &mut r);

        for id in ["me", "other"] {
            scene.apply_event(
                RoomEvent::PlayerChanged {
                    session_id: sid(id),
                    player: Player::new(64.0, 32.0),
                },
                &mut r,
            );
            assert_eq!(scene.entity_position(&sid(id)), Some(Vec2::new(64.0, 32.0)));
        }
        // No reference boxes without prediction.
        assert_eq!(r.objects().count(), 2);
    }

    #[test]
    fn switch_key_requests_next_scene_once() {
        let mut scene = scene_as("me");
        let mut r = HeadlessRenderer::new();
        let mut bus = EventBus::new();
        let config = GameConfig::default();
        let press = InputState::default().advance(Keys::SWITCH, false);

        for _ in 0..2 {
            let mut ctx = SceneContext {
                renderer: &mut r,
                bus: &mut bus,
                input: &press,
                config: &config,
                time: FrameTime::default(),
            };
            scene.update(&mut ctx);
        }
        assert_eq!(
            bus.drain::<SceneRequest>(),
            vec![SceneRequest::Switch {
                from: "waitroom".into(),
                to: "mainroom".into()
            }]
        );
    }

    #[test]
    fn switch_key_without_next_scene_enables_debug_overlay() {
        let mut scene = PlayScene::new(PlaySceneConfig::mainroom());
        scene.local_session = Some(sid("me"));
        let mut r = HeadlessRenderer::new();
        let mut bus = EventBus::new();
        let config = GameConfig::default();
        let press = InputState::default().advance(Keys::SWITCH, false);
        let mut ctx = SceneContext {
            renderer: &mut r,
            bus: &mut bus,
            input: &press,
            config: &config,
            time: FrameTime::default(),
        };
        scene.update(&mut ctx);
        assert!(r.debug_overlay);
    }

    #[test]
    fn classic_room_has_no_switch_key() {
        let mut scene = PlayScene::new(PlaySceneConfig::classic());
        scene.local_session = Some(sid("me"));
        let mut r = HeadlessRenderer::new();
        let mut bus = EventBus::new();
        let config = GameConfig::default();
        let press = InputState::default().advance(Keys::SWITCH, false);
        let mut ctx = SceneContext {
            renderer: &mut r,
            bus: &mut bus,
            input: &press,
            config: &config,
            time: FrameTime::default(),
        };
        scene.update(&mut ctx);
        assert!(!r.debug_overlay);
        assert_eq!(bus.pending::<SceneRequest>(), 0);
    }

    #[test]
    fn presets_use_known_layouts() {
        let mut r = HeadlessRenderer::new();
        AssetManifest::ranch().preload(&mut r);
        for cfg in [
            PlaySceneConfig::waitroom(),
            PlaySceneConfig::mainroom(),
            PlaySceneConfig::classic(),
        ] {
            assert!(cfg.layout.build(&mut r).is_ok(), "{}", cfg.key);
        }
    }
}
