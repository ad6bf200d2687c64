use std::time::Duration;

use ranch_server::server::bind_ephemeral;
use ranch_shared::config::ServerConfig;

/// Smoke test: the service ticks with no rooms and reports an empty status.
#[tokio::test]
async fn server_idles_without_rooms() -> anyhow::Result<()> {
    let server = bind_ephemeral(ServerConfig {
        patch_hz: 100,
        ..Default::default()
    })
    .await?;
    let rooms = server.rooms();
    let handle = server.spawn();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!handle.is_finished());
    assert_eq!(rooms.lock().await.status(), vec!["Rooms: 0", "Sessions: 0"]);

    handle.abort();
    Ok(())
}
