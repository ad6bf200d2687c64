//! Room registry.
//!
//! # Room lifecycle
//! 1. A client asks to join-or-create a room by name
//! 2. The first open instance of that name takes the client, or a new one is made
//! 3. Clients send position or direction messages; state changes accumulate
//! 4. Every patch tick, the difference since the last patch goes to all members
//! 5. A room is dropped once its last member leaves
//!
//! Joins and leaves are announced to the other members immediately, so the
//! joining client never receives its own `Add` twice.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

use chrono::{DateTime, Utc};
use rand::Rng;
use ranch_shared::{
    config::ServerConfig,
    math::Vec2,
    net::{DirectionalInput, MessageKind, PositionInput, RoomId, RoomMsg, SessionId},
    schema::{Player, RoomState, StateChange},
};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Outbound queue of one connection.
pub type Outbox = mpsc::UnboundedSender<RoomMsg>;

/// Spawn area, in pixels.
const SPAWN_MIN: Vec2 = Vec2::new(100.0, 100.0);
const SPAWN_MAX: Vec2 = Vec2::new(400.0, 300.0);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    UnknownRoom(String),
    UnknownSession(SessionId),
    AlreadyJoined(SessionId),
    BadPayload { kind: MessageKind, reason: String },
    UnknownMessage(MessageKind),
}

impl fmt::Display for RoomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomError::UnknownRoom(name) => write!(f, "no room named '{name}'"),
            RoomError::UnknownSession(id) => write!(f, "session {id} is not in a room"),
            RoomError::AlreadyJoined(id) => write!(f, "session {id} already joined a room"),
            RoomError::BadPayload { kind, reason } => {
                write!(f, "bad payload for message {kind}: {reason}")
            }
            RoomError::UnknownMessage(kind) => write!(f, "unknown message type {kind}"),
        }
    }
}

impl std::error::Error for RoomError {}

#[derive(Debug)]
struct Member {
    outbox: Outbox,
    joined_at: DateTime<Utc>,
    input: DirectionalInput,
}

/// One room instance.
#[derive(Debug)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    max_clients: usize,
    members: BTreeMap<SessionId, Member>,
    state: RoomState,
    /// State as of the last patch every member has seen.
    last_sent: RoomState,
}

impl Room {
    pub fn new(name: &str, max_clients: usize) -> Self {
        Self {
            id: RoomId::generate(),
            name: name.to_string(),
            created_at: Utc::now(),
            max_clients: max_clients.max(1),
            members: BTreeMap::new(),
            state: RoomState::default(),
            last_sent: RoomState::default(),
        }
    }

    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= self.max_clients
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn state(&self) -> &RoomState {
        &self.state
    }

    /// Adds a member and returns the state it should start from.
    fn join(&mut self, session: SessionId, outbox: Outbox, spawn: Player) -> RoomState {
        self.broadcast(&RoomMsg::Patch {
            changes: vec![StateChange::Add {
                session_id: session.clone(),
                player: spawn,
            }],
        });
        self.state.players.insert(session.clone(), spawn);
        self.last_sent.players.insert(session.clone(), spawn);
        self.members.insert(
            session,
            Member {
                outbox,
                joined_at: Utc::now(),
                input: DirectionalInput::default(),
            },
        );
        self.last_sent.clone()
    }

    fn leave(&mut self, session: &SessionId) -> bool {
        if self.members.remove(session).is_none() {
            return false;
        }
        self.state.players.remove(session);
        self.last_sent.players.remove(session);
        self.broadcast(&RoomMsg::Patch {
            changes: vec![StateChange::Remove {
                session_id: session.clone(),
            }],
        });
        true
    }

    fn on_message(
        &mut self,
        session: &SessionId,
        kind: MessageKind,
        payload: serde_json::Value,
    ) -> Result<(), RoomError> {
        let bad = |kind: &MessageKind, e: serde_json::Error| RoomError::BadPayload {
            kind: kind.clone(),
            reason: e.to_string(),
        };

        if kind == MessageKind::POSITION {
            let pos: PositionInput = serde_json::from_value(payload).map_err(|e| bad(&kind, e))?;
            let player = self
                .state
                .players
                .get_mut(session)
                .ok_or_else(|| RoomError::UnknownSession(session.clone()))?;
            *player = pos.into();
            Ok(())
        } else if kind == MessageKind::input() {
            let input: DirectionalInput =
                serde_json::from_value(payload).map_err(|e| bad(&kind, e))?;
            let member = self
                .members
                .get_mut(session)
                .ok_or_else(|| RoomError::UnknownSession(session.clone()))?;
            member.input = input;
            Ok(())
        } else {
            Err(RoomError::UnknownMessage(kind))
        }
    }

    /// Applies held directions, then sends the accumulated difference.
    /// Returns the number of changes sent.
    fn tick(&mut self, dt_sec: f32, speed: f32) -> usize {
        let step = speed * dt_sec;
        for (id, member) in &self.members {
            let DirectionalInput {
                up,
                down,
                left,
                right,
            } = member.input;
            if let Some(p) = self.state.players.get_mut(id) {
                if left {
                    p.x -= step;
                } else if right {
                    p.x += step;
                }
                if up {
                    p.y -= step;
                } else if down {
                    p.y += step;
                }
            }
        }

        let changes = RoomState::diff(&self.last_sent, &self.state);
        if changes.is_empty() {
            return 0;
        }
        let n = changes.len();
        self.broadcast(&RoomMsg::Patch { changes });
        self.last_sent = self.state.clone();
        n
    }

    fn broadcast(&self, msg: &RoomMsg) {
        for (id, member) in &self.members {
            if member.outbox.send(msg.clone()).is_err() {
                debug!(room = %self.name, session = %id, "Member outbox closed");
            }
        }
    }
}

/// All live rooms plus the session → room index.
#[derive(Debug)]
pub struct RoomManager {
    defined: Vec<String>,
    max_clients: usize,
    rooms: BTreeMap<RoomId, Room>,
    sessions: HashMap<SessionId, RoomId>,
}

impl RoomManager {
    pub fn new(cfg: &ServerConfig) -> Self {
        Self {
            defined: cfg.rooms.clone(),
            max_clients: cfg.max_clients,
            rooms: BTreeMap::new(),
            sessions: HashMap::new(),
        }
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.defined.iter().any(|n| n == name)
    }

    pub fn room(&self, id: &RoomId) -> Option<&Room> {
        self.rooms.get(id)
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Puts `session` in the first open room called `name`, creating one if
    /// every instance is full.
    pub fn join_or_create(
        &mut self,
        name: &str,
        session: SessionId,
        outbox: Outbox,
    ) -> Result<(RoomId, RoomState), RoomError> {
        if !self.is_defined(name) {
            return Err(RoomError::UnknownRoom(name.to_string()));
        }
        if self.sessions.contains_key(&session) {
            return Err(RoomError::AlreadyJoined(session));
        }

        let existing = self
            .rooms
            .values()
            .find(|r| r.name == name && !r.is_full())
            .map(|r| r.id.clone());
        let room_id = match existing {
            Some(id) => id,
            None => {
                let room = Room::new(name, self.max_clients);
                let id = room.id.clone();
                info!(room = %name, room_id = %id, "Room created");
                self.rooms.insert(id.clone(), room);
                id
            }
        };
        let room = self
            .rooms
            .get_mut(&room_id)
            .ok_or_else(|| RoomError::UnknownRoom(name.to_string()))?;

        let state = room.join(session.clone(), outbox, random_spawn());
        info!(
            room = %name,
            room_id = %room_id,
            session = %session,
            members = room.member_count(),
            "Session joined"
        );
        self.sessions.insert(session, room_id.clone());
        Ok((room_id, state))
    }

    /// Removes `session` from its room; empty rooms are dropped.
    pub fn leave(&mut self, session: &SessionId) -> bool {
        let Some(room_id) = self.sessions.remove(session) else {
            return false;
        };
        let Some(room) = self.rooms.get_mut(&room_id) else {
            return false;
        };
        room.leave(session);
        info!(room = %room.name, session = %session, "Session left");
        if room.is_empty() {
            info!(room = %room.name, room_id = %room_id, "Room disposed");
            self.rooms.remove(&room_id);
        }
        true
    }

    pub fn on_message(
        &mut self,
        session: &SessionId,
        kind: MessageKind,
        payload: serde_json::Value,
    ) -> Result<(), RoomError> {
        let room = self
            .sessions
            .get(session)
            .and_then(|id| self.rooms.get_mut(id))
            .ok_or_else(|| RoomError::UnknownSession(session.clone()))?;
        room.on_message(session, kind, payload)
    }

    /// Runs one patch tick over every room. Returns the number of changes sent.
    pub fn tick(&mut self, dt_sec: f32, speed: f32) -> usize {
        self.rooms.values_mut().map(|r| r.tick(dt_sec, speed)).sum()
    }

    /// Human-readable summary for the server console.
    pub fn status(&self) -> Vec<String> {
        let mut out = vec![
            format!("Rooms: {}", self.rooms.len()),
            format!("Sessions: {}", self.sessions.len()),
        ];
        let now = Utc::now();
        for room in self.rooms.values() {
            out.push(format!(
                "  {} ({}): {} member(s), up {}s, created {}",
                room.name,
                room.id,
                room.member_count(),
                (now - room.created_at).num_seconds(),
                room.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
            ));
            for (id, m) in &room.members {
                let pos = room.state.player(id).copied().unwrap_or_default();
                out.push(format!(
                    "    {id}: ({:.1}, {:.1}) joined {}",
                    pos.x,
                    pos.y,
                    m.joined_at.format("%H:%M:%S"),
                ));
            }
        }
        out
    }
}

fn random_spawn() -> Player {
    let mut rng = rand::thread_rng();
    Player::new(
        rng.gen_range(SPAWN_MIN.x..SPAWN_MAX.x),
        rng.gen_range(SPAWN_MIN.y..SPAWN_MAX.y),
    )
}
