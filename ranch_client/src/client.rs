//! Room client.
//!
//! A [`Client`] points at one room service endpoint. Joining a room is the only
//! awaited step; afterwards a [`Room`] runs two background tasks:
//! - a reader that forwards inbound frames into a channel,
//! - a writer that drains a bounded queue of outbound messages.
//!
//! The frame loop calls [`Room::poll`] to fold inbound patches into the local
//! state mirror and emit [`RoomEvent`]s, and [`Room::send`] to queue input
//! without waiting on the socket.

use std::{fmt, time::Duration};

use anyhow::bail;
use ranch_shared::{
    endpoint::Endpoint,
    event::EventBus,
    net::{
        FrameReader, FrameWriter, FramedConn, MessageKind, RoomId, RoomMsg, SessionId,
        PROTOCOL_VERSION,
    },
    schema::{Player, RoomState, StateChange},
};
use serde::Serialize;
use tokio::{
    sync::mpsc::{self, error::TryRecvError, error::TrySendError},
    task::JoinHandle,
    time,
};
use tracing::{debug, info, warn};

/// Room-level failures surfaced to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    /// The service answered the join with a refusal.
    JoinRejected(String),
    /// No answer within the join timeout.
    Timeout,
}

impl fmt::Display for RoomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomError::JoinRejected(reason) => write!(f, "join rejected: {reason}"),
            RoomError::Timeout => f.write_str("join timed out"),
        }
    }
}

impl std::error::Error for RoomError {}

/// Changes observed on a room, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum RoomEvent {
    PlayerAdded { session_id: SessionId, player: Player },
    PlayerChanged { session_id: SessionId, player: Player },
    PlayerRemoved { session_id: SessionId },
    /// Emitted after each batch of player events.
    StateChanged,
    /// The connection is gone; no further events follow.
    Left { reason: String },
}

impl From<StateChange> for RoomEvent {
    fn from(change: StateChange) -> Self {
        match change {
            StateChange::Add { session_id, player } => RoomEvent::PlayerAdded { session_id, player },
            StateChange::Change { session_id, player } => {
                RoomEvent::PlayerChanged { session_id, player }
            }
            StateChange::Remove { session_id } => RoomEvent::PlayerRemoved { session_id },
        }
    }
}

enum Inbound {
    Msg(RoomMsg),
    Closed(String),
}

/// Entry point to a room service.
#[derive(Debug, Clone)]
pub struct Client {
    endpoint: Endpoint,
    join_timeout: Duration,
    send_queue: usize,
}

impl Client {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            join_timeout: Duration::from_secs(5),
            send_queue: 64,
        }
    }

    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    pub fn with_send_queue(mut self, depth: usize) -> Self {
        self.send_queue = depth.max(1);
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Joins an existing room with this name, or has the service create one.
    pub async fn join_or_create(
        &self,
        room_name: &str,
        options: serde_json::Value,
    ) -> anyhow::Result<Room> {
        info!(endpoint = %self.endpoint, room = %room_name, "Joining room");

        let handshake = async {
            let mut conn = FramedConn::connect(&self.endpoint.socket_addr_string()).await?;
            conn.send(&RoomMsg::JoinOrCreate {
                protocol: PROTOCOL_VERSION,
                room_name: room_name.to_string(),
                options,
            })
            .await?;
            match conn.recv().await? {
                RoomMsg::Joined {
                    room_id,
                    session_id,
                    state,
                } => Ok::<_, anyhow::Error>((conn, room_id, session_id, state)),
                RoomMsg::JoinFailed { reason } => Err(RoomError::JoinRejected(reason).into()),
                other => bail!("expected Joined, got {other:?}"),
            }
        };

        let (conn, room_id, session_id, state) = time::timeout(self.join_timeout, handshake)
            .await
            .map_err(|_| RoomError::Timeout)??;

        info!(
            room = %room_name,
            room_id = %room_id,
            session = %session_id,
            players = state.players.len(),
            "Joined room"
        );

        Ok(Room::start(
            conn,
            room_name.to_string(),
            room_id,
            session_id,
            state,
            self.send_queue,
        ))
    }
}

/// Handle to a joined room.
pub struct Room {
    name: String,
    room_id: RoomId,
    session_id: SessionId,
    state: RoomState,
    /// Players present at join time, announced on the first poll.
    replay: Vec<(SessionId, Player)>,
    outbound: mpsc::Sender<RoomMsg>,
    inbound: mpsc::UnboundedReceiver<Inbound>,
    open: bool,
    reader: JoinHandle<()>,
    _writer: JoinHandle<()>,
}

impl Room {
    fn start(
        conn: FramedConn,
        name: String,
        room_id: RoomId,
        session_id: SessionId,
        state: RoomState,
        send_queue: usize,
    ) -> Self {
        let (reader, writer) = conn.into_split();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::channel(send_queue);

        let replay = state
            .players
            .iter()
            .map(|(id, p)| (id.clone(), *p))
            .collect();

        Self {
            name,
            room_id,
            session_id,
            state,
            replay,
            outbound: out_tx,
            inbound: in_rx,
            open: true,
            reader: tokio::spawn(read_loop(reader, in_tx)),
            _writer: tokio::spawn(write_loop(writer, out_rx)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Local mirror of the room state.
    pub fn state(&self) -> &RoomState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Queues a message for the room. Never waits; a full queue or a closed
    /// room drops the message.
    pub fn send<T: Serialize>(&self, kind: impl Into<MessageKind>, payload: &T) {
        let kind = kind.into();
        if !self.open {
            debug!(%kind, "Room closed, message dropped");
            return;
        }
        let payload = match serde_json::to_value(payload) {
            Ok(v) => v,
            Err(e) => {
                warn!(%kind, error = %e, "Failed to serialize message");
                return;
            }
        };
        match self.outbound.try_send(RoomMsg::Message { kind, payload }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!("Send queue full, message dropped"),
            Err(TrySendError::Closed(_)) => debug!("Writer gone, message dropped"),
        }
    }

    /// Applies everything received since the last call and pushes the
    /// resulting [`RoomEvent`]s onto `bus`. Returns how many were pushed.
    pub fn poll(&mut self, bus: &mut EventBus) -> usize {
        let mut events: Vec<RoomEvent> = self
            .replay
            .drain(..)
            .map(|(session_id, player)| RoomEvent::PlayerAdded { session_id, player })
            .collect();
        if !events.is_empty() {
            events.push(RoomEvent::StateChanged);
        }

        while self.open {
            match self.inbound.try_recv() {
                Ok(Inbound::Msg(RoomMsg::Patch { changes })) => {
                    let before = events.len();
                    for change in changes {
                        if self.state.apply(&change) {
                            events.push(change.into());
                        } else {
                            warn!(session = %change.session_id(), "Patch does not match local state");
                        }
                    }
                    if events.len() > before {
                        events.push(RoomEvent::StateChanged);
                    }
                }
                Ok(Inbound::Msg(RoomMsg::Disconnect { reason })) => self.close(reason, &mut events),
                Ok(Inbound::Msg(other)) => debug!(?other, "Unexpected room message"),
                Ok(Inbound::Closed(reason)) => self.close(reason, &mut events),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.close("connection closed".to_string(), &mut events)
                }
            }
        }

        let n = events.len();
        bus.extend(events);
        n
    }

    /// Tells the room we are leaving. Further sends are dropped.
    pub fn leave(&mut self) {
        if !self.open {
            return;
        }
        if self.outbound.try_send(RoomMsg::Leave).is_err() {
            debug!("Could not queue leave message");
        }
        self.open = false;
        info!(room = %self.name, session = %self.session_id, "Left room");
    }

    fn close(&mut self, reason: String, events: &mut Vec<RoomEvent>) {
        if self.open {
            warn!(room = %self.name, reason = %reason, "Room connection closed");
            self.open = false;
            events.push(RoomEvent::Left { reason });
        }
    }
}

impl Drop for Room {
    fn drop(&mut self) {
        // The writer finishes on its own once the queue sender is dropped,
        // flushing a pending leave.
        self.reader.abort();
    }
}

async fn read_loop(mut reader: FrameReader, tx: mpsc::UnboundedSender<Inbound>) {
    loop {
        match reader.recv().await {
            Ok(msg) => {
                if tx.send(Inbound::Msg(msg)).is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = tx.send(Inbound::Closed(format!("{e:#}")));
                break;
            }
        }
    }
}

async fn write_loop(mut writer: FrameWriter, mut rx: mpsc::Receiver<RoomMsg>) {
    while let Some(msg) = rx.recv().await {
        if let Err(e) = writer.send(&msg).await {
            warn!(error = %e, "Room write failed");
            break;
        }
    }
}
