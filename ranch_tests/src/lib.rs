//! Shared helpers for the socket-level tests.

use std::{net::SocketAddr, time::Duration};

use ranch_client::{
    assets::AssetManifest,
    game::Game,
    input::InputState,
    render::{HeadlessRenderer, ObjectId, ObjectKind},
    scenes::{PlayScene, PlaySceneConfig},
};
use ranch_server::server::bind_ephemeral;
use ranch_shared::{
    config::{GameConfig, ServerConfig},
    math::Vec2,
};

pub type TestGame = Game<HeadlessRenderer>;

/// Frame step used by the helpers.
pub const FRAME: Duration = Duration::from_millis(16);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();
}

/// Starts a room service on an ephemeral port.
pub async fn spawn_server(cfg: ServerConfig) -> anyhow::Result<SocketAddr> {
    let server = bind_ephemeral(cfg).await?;
    let addr = server.local_addr()?;
    server.spawn();
    Ok(addr)
}

pub fn client_config(addr: SocketAddr) -> GameConfig {
    GameConfig {
        fallback_endpoint: format!("ws://{addr}"),
        join_timeout_ms: 2_000,
        ..Default::default()
    }
}

/// A game with the shared assets loaded, already inside `scene`.
pub async fn game_in(addr: SocketAddr, scene: PlaySceneConfig) -> anyhow::Result<TestGame> {
    let key = scene.key.clone();
    let mut game = Game::new(client_config(addr), HeadlessRenderer::new());
    AssetManifest::ranch().preload(game.renderer_mut());
    game.add_scene(PlayScene::new(scene));
    game.boot(&key).await?;
    Ok(game)
}

/// Runs frames on every game until `done` holds, or fails after `limit`.
pub async fn run_until(
    games: &mut [&mut TestGame],
    input: &InputState,
    limit: Duration,
    mut done: impl FnMut(&[&mut TestGame]) -> bool,
) -> anyhow::Result<()> {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        for g in games.iter_mut() {
            g.run_frame(input, FRAME).await?;
        }
        if done(games) {
            return Ok(());
        }
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("condition not reached within {limit:?}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Player sprites other than the one the camera follows.
pub fn remote_sprites(game: &TestGame) -> Vec<(ObjectId, Vec2)> {
    let r = game.renderer();
    r.objects()
        .filter(|(id, o)| {
            matches!(o.kind, ObjectKind::Sprite { .. }) && r.camera.follow != Some(*id)
        })
        .map(|(id, o)| (id, o.position))
        .collect()
}

/// Position of the sprite the camera follows.
pub fn local_sprite(game: &TestGame) -> Option<Vec2> {
    let r = game.renderer();
    r.camera.follow.and_then(|id| r.object(id)).map(|o| o.position)
}
