//! Room service.
//!
//! Accepts framed connections, performs the join handshake, then runs one
//! task per connection plus a shared patch tick. It supports:
//! - Join-or-create by room name, with a protocol version check
//! - Position (type 0) and direction (`"input"`) messages
//! - Patch broadcast at a fixed rate
//! - A `status` summary for the console
//!
//! Connections are plain TCP; a secure endpoint is expected to be terminated
//! in front of this service.

use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
    time::Duration,
};

use anyhow::{bail, Context};
use ranch_shared::{
    config::ServerConfig,
    net::{FrameListener, FramedConn, RoomMsg, SessionId, PROTOCOL_VERSION},
};
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::room::RoomManager;

pub struct RoomServer {
    cfg: ServerConfig,
    listener: FrameListener,
    rooms: Arc<Mutex<RoomManager>>,
}

impl RoomServer {
    pub async fn bind(cfg: ServerConfig) -> anyhow::Result<Self> {
        let addr: SocketAddr = cfg.listen_addr.parse().context("parse listen_addr")?;
        let listener = FrameListener::bind(addr).await?;
        let rooms = Arc::new(Mutex::new(RoomManager::new(&cfg)));
        Ok(Self {
            cfg,
            listener,
            rooms,
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.cfg
    }

    /// Shared handle to the room registry.
    pub fn rooms(&self) -> Arc<Mutex<RoomManager>> {
        self.rooms.clone()
    }

    pub async fn status(&self) -> Vec<String> {
        self.rooms.lock().await.status()
    }

    /// Serves until the listener fails. The patch tick stops with it.
    pub async fn run(self) -> anyhow::Result<()> {
        let ticker = tokio::spawn(tick_loop(
            self.rooms.clone(),
            self.cfg.patch_hz,
            self.cfg.move_speed,
        ));

        let result = self.accept_loop().await;
        ticker.abort();
        result
    }

    /// Runs the server on a background task.
    pub fn spawn(self) -> JoinHandle<anyhow::Result<()>> {
        tokio::spawn(self.run())
    }

    async fn accept_loop(&self) -> anyhow::Result<()> {
        loop {
            let (conn, peer) = match self.listener.accept().await {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %format!("{e:#}"), "Accept failed");
                    continue;
                }
            };
            debug!(%peer, "Connection accepted");
            let rooms = self.rooms.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(conn, rooms).await {
                    warn!(%peer, error = %format!("{e:#}"), "Connection ended with error");
                }
            });
        }
    }
}

async fn tick_loop(rooms: Arc<Mutex<RoomManager>>, patch_hz: u32, speed: f32) {
    let dt = Duration::from_secs_f32(1.0 / patch_hz.max(1) as f32);
    let mut interval = time::interval(dt);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        interval.tick().await;
        let sent = rooms.lock().await.tick(dt.as_secs_f32(), speed);
        if sent > 0 {
            debug!(changes = sent, "Patches sent");
        }
    }
}

async fn handle_connection(
    mut conn: FramedConn,
    rooms: Arc<Mutex<RoomManager>>,
) -> anyhow::Result<()> {
    let room_name = match conn.recv().await.context("handshake")? {
        RoomMsg::JoinOrCreate {
            protocol,
            room_name,
            ..
        } if protocol == PROTOCOL_VERSION => room_name,
        RoomMsg::JoinOrCreate { protocol, .. } => {
            let reason = format!("protocol {protocol} not supported");
            conn.send(&RoomMsg::JoinFailed { reason }).await?;
            return Ok(());
        }
        other => bail!("unexpected handshake msg: {other:?}"),
    };

    let session = SessionId::generate();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let joined = rooms
        .lock()
        .await
        .join_or_create(&room_name, session.clone(), tx);
    let (room_id, state) = match joined {
        Ok(v) => v,
        Err(e) => {
            info!(room = %room_name, error = %e, "Join refused");
            conn.send(&RoomMsg::JoinFailed {
                reason: e.to_string(),
            })
            .await?;
            return Ok(());
        }
    };

    // Patches queued since the join go out after this, in order.
    let sent = conn
        .send(&RoomMsg::Joined {
            room_id,
            session_id: session.clone(),
            state,
        })
        .await;
    if let Err(e) = sent {
        rooms.lock().await.leave(&session);
        return Err(e);
    }

    let (mut reader, mut writer) = conn.into_split();
    let writer_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = writer.send(&msg).await {
                debug!(error = %format!("{e:#}"), "Write failed");
                break;
            }
        }
    });

    loop {
        match reader.recv().await {
            Ok(RoomMsg::Message { kind, payload }) => {
                if let Err(e) = rooms.lock().await.on_message(&session, kind, payload) {
                    warn!(session = %session, error = %e, "Message rejected");
                }
            }
            Ok(RoomMsg::Leave) => {
                debug!(session = %session, "Leave requested");
                break;
            }
            Ok(other) => debug!(session = %session, ?other, "Unexpected client message"),
            Err(e) => {
                debug!(session = %session, error = %format!("{e:#}"), "Connection closed");
                break;
            }
        }
    }

    rooms.lock().await.leave(&session);
    // Dropping the member's outbox ends the writer.
    let _ = writer_task.await;
    Ok(())
}

/// Helper for tests: bind to an ephemeral port on localhost.
pub async fn bind_ephemeral(cfg: ServerConfig) -> anyhow::Result<RoomServer> {
    let cfg = ServerConfig {
        listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0).to_string(),
        ..cfg
    };
    RoomServer::bind(cfg).await
}

#[cfg(test)]
mod tests {
    use ranch_shared::{
        net::{MessageKind, PositionInput},
        schema::{Player, StateChange},
    };

    use super::*;

    async fn connect(server: &RoomServer) -> FramedConn {
        let addr = server.local_addr().unwrap();
        FramedConn::connect(&addr.to_string()).await.unwrap()
    }

    async fn join(conn: &mut FramedConn, room: &str) -> RoomMsg {
        conn.send(&RoomMsg::JoinOrCreate {
            protocol: PROTOCOL_VERSION,
            room_name: room.to_string(),
            options: serde_json::json!({}),
        })
        .await
        .unwrap();
        conn.recv().await.unwrap()
    }

    #[tokio::test]
    async fn wrong_protocol_is_refused() {
        let server = bind_ephemeral(ServerConfig::default()).await.unwrap();
        let mut conn = connect(&server).await;
        server.spawn();

        conn.send(&RoomMsg::JoinOrCreate {
            protocol: PROTOCOL_VERSION + 1,
            room_name: "waitroom".into(),
            options: serde_json::Value::Null,
        })
        .await
        .unwrap();
        assert!(matches!(conn.recv().await.unwrap(), RoomMsg::JoinFailed { .. }));
    }

    #[tokio::test]
    async fn unknown_room_is_refused() {
        let server = bind_ephemeral(ServerConfig::default()).await.unwrap();
        let mut conn = connect(&server).await;
        server.spawn();

        match join(&mut conn, "nowhere").await {
            RoomMsg::JoinFailed { reason } => assert!(reason.contains("nowhere")),
            other => panic!("expected JoinFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn position_reaches_other_member() {
        let server = bind_ephemeral(ServerConfig {
            patch_hz: 50,
            ..Default::default()
        })
        .await
        .unwrap();
        let mut a = connect(&server).await;
        let mut b = connect(&server).await;
        server.spawn();

        let RoomMsg::Joined { session_id: sa, .. } = join(&mut a, "waitroom").await else {
            panic!("a did not join");
        };
        let RoomMsg::Joined { state, .. } = join(&mut b, "waitroom").await else {
            panic!("b did not join");
        };
        assert!(state.players.contains_key(&sa));

        a.send(&RoomMsg::Message {
            kind: MessageKind::POSITION,
            payload: serde_json::to_value(PositionInput { x: 7.0, y: 8.0 }).unwrap(),
        })
        .await
        .unwrap();

        let msg = time::timeout(Duration::from_secs(2), b.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            msg,
            RoomMsg::Patch {
                changes: vec![StateChange::Change {
                    session_id: sa,
                    player: Player::new(7.0, 8.0),
                }]
            }
        );
    }

    #[tokio::test]
    async fn status_reports_sessions() {
        let server = bind_ephemeral(ServerConfig::default()).await.unwrap();
        let rooms = server.rooms();
        let mut conn = connect(&server).await;
        server.spawn();

        assert!(matches!(join(&mut conn, "main_room").await, RoomMsg::Joined { .. }));
        let status = rooms.lock().await.status();
        assert_eq!(status[1], "Sessions: 1");
    }
}
