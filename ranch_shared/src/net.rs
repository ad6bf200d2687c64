//! Networking primitives.
//!
//! Goals:
//! - One ordered, reliable channel per room session (TCP).
//! - Length-prefixed JSON frames, explicit and versionable.
//! - Message types shared by the client and the loopback room service.
//!
//! The room service owns the authoritative state; the client only mirrors
//! it from `Patch` messages.

use std::{fmt, net::SocketAddr};

use anyhow::{bail, Context};
use bytes::{BufMut, Bytes, BytesMut};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream,
    },
};
use tracing::trace;

use crate::schema::{Player, RoomState, StateChange};

/// Protocol version for compatibility checks.
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest frame either side accepts.
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

const ID_LEN: usize = 9;

/// Identifies one connected client for the lifetime of its session.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new(id: impl Into<String>) -> Self {
        SessionId(id.into())
    }

    pub fn generate() -> Self {
        SessionId(random_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one room instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn generate() -> Self {
        RoomId(random_id())
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn random_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

/// Client-to-server message type: numeric or named.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageKind {
    Code(u8),
    Name(String),
}

impl MessageKind {
    /// Type of the per-frame position message.
    pub const POSITION: MessageKind = MessageKind::Code(0);

    /// Name of the per-frame directional input message.
    pub const INPUT_NAME: &'static str = "input";

    pub fn input() -> Self {
        MessageKind::Name(Self::INPUT_NAME.to_string())
    }
}

impl From<u8> for MessageKind {
    fn from(code: u8) -> Self {
        MessageKind::Code(code)
    }
}

impl From<&str> for MessageKind {
    fn from(name: &str) -> Self {
        MessageKind::Name(name.to_string())
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Code(c) => write!(f, "{c}"),
            MessageKind::Name(n) => f.write_str(n),
        }
    }
}

/// High-level message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum RoomMsg {
    // ─── Client -> server ───
    JoinOrCreate {
        protocol: u32,
        room_name: String,
        #[serde(default)]
        options: serde_json::Value,
    },
    Message {
        kind: MessageKind,
        payload: serde_json::Value,
    },
    Leave,

    // ─── Server -> client ───
    Joined {
        room_id: RoomId,
        session_id: SessionId,
        state: RoomState,
    },
    JoinFailed {
        reason: String,
    },
    Patch {
        changes: Vec<StateChange>,
    },
    Disconnect {
        reason: String,
    },
}

/// Payload of the per-frame position message (type 0).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct PositionInput {
    pub x: f32,
    pub y: f32,
}

impl From<PositionInput> for Player {
    fn from(p: PositionInput) -> Self {
        Player { x: p.x, y: p.y }
    }
}

/// Payload of the per-frame `"input"` message.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DirectionalInput {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

/// Writes one length-prefixed JSON frame.
pub async fn write_frame<W>(w: &mut W, msg: &RoomMsg) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let payload = encode_to_bytes(msg)?;
    if payload.len() > MAX_FRAME_LEN {
        bail!("frame of {} bytes exceeds limit", payload.len());
    }
    let mut buf = BytesMut::with_capacity(4 + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.extend_from_slice(&payload);
    w.write_all(&buf).await.context("tcp write")?;
    trace!(len = payload.len(), "frame sent");
    Ok(())
}

/// Reads one length-prefixed JSON frame.
pub async fn read_frame<R>(r: &mut R) -> anyhow::Result<RoomMsg>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    r.read_exact(&mut len_buf).await.context("tcp read len")?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        bail!("frame of {len} bytes exceeds limit");
    }
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)
        .await
        .context("tcp read payload")?;
    decode_from_bytes(&payload)
}

/// Framed connection over TCP.
#[derive(Debug)]
pub struct FramedConn {
    stream: TcpStream,
}

impl FramedConn {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    pub async fn connect(addr: &str) -> anyhow::Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("tcp connect {addr}"))?;
        stream.set_nodelay(true).context("set nodelay")?;
        Ok(Self::new(stream))
    }

    pub async fn send(&mut self, msg: &RoomMsg) -> anyhow::Result<()> {
        write_frame(&mut self.stream, msg).await
    }

    pub async fn recv(&mut self) -> anyhow::Result<RoomMsg> {
        read_frame(&mut self.stream).await
    }

    /// Splits into halves for independent reader and writer tasks.
    pub fn into_split(self) -> (FrameReader, FrameWriter) {
        let (r, w) = self.stream.into_split();
        (FrameReader { half: r }, FrameWriter { half: w })
    }
}

/// Read half of a [`FramedConn`].
#[derive(Debug)]
pub struct FrameReader {
    half: OwnedReadHalf,
}

impl FrameReader {
    pub async fn recv(&mut self) -> anyhow::Result<RoomMsg> {
        read_frame(&mut self.half).await
    }
}

/// Write half of a [`FramedConn`].
#[derive(Debug)]
pub struct FrameWriter {
    half: OwnedWriteHalf,
}

impl FrameWriter {
    pub async fn send(&mut self, msg: &RoomMsg) -> anyhow::Result<()> {
        write_frame(&mut self.half, msg).await
    }
}

/// TCP listener handing out framed connections.
pub struct FrameListener {
    listener: TcpListener,
}

impl FrameListener {
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await.context("tcp bind")?;
        Ok(Self { listener })
    }

    pub async fn accept(&self) -> anyhow::Result<(FramedConn, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await.context("tcp accept")?;
        stream.set_nodelay(true).context("set nodelay")?;
        Ok((FramedConn::new(stream), addr))
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

pub fn encode_to_bytes(msg: &RoomMsg) -> anyhow::Result<Bytes> {
    let payload = serde_json::to_vec(msg).context("serialize")?;
    Ok(Bytes::from(payload))
}

pub fn decode_from_bytes(b: &[u8]) -> anyhow::Result<RoomMsg> {
    serde_json::from_slice(b).context("deserialize")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_kind_is_untagged_on_the_wire() {
        assert_eq!(serde_json::to_string(&MessageKind::POSITION).unwrap(), "0");
        assert_eq!(
            serde_json::to_string(&MessageKind::input()).unwrap(),
            "\"input\""
        );
        let back: MessageKind = serde_json::from_str("\"input\"").unwrap();
        assert_eq!(back, MessageKind::input());
    }

    #[test]
    fn join_options_default_to_null() {
        let raw = br#"{"JoinOrCreate":{"protocol":1,"room_name":"waitroom"}}"#;
        let msg = decode_from_bytes(raw).unwrap();
        assert_eq!(
            msg,
            RoomMsg::JoinOrCreate {
                protocol: 1,
                room_name: "waitroom".into(),
                options: serde_json::Value::Null,
            }
        );
    }

    #[test]
    fn generated_ids_are_nine_alphanumerics() {
        let id = SessionId::generate();
        assert_eq!(id.as_str().len(), 9);
        assert!(id.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id, SessionId::generate());
    }

    #[test]
    fn patch_messages_roundtrip() {
        let msg = RoomMsg::Patch {
            changes: vec![
                StateChange::Add {
                    session_id: SessionId("abc".into()),
                    player: Player::new(120.0, 80.0),
                },
                StateChange::Remove {
                    session_id: SessionId("xyz".into()),
                },
            ],
        };
        let bytes = encode_to_bytes(&msg).unwrap();
        assert_eq!(decode_from_bytes(&bytes).unwrap(), msg);
    }

    #[tokio::test]
    async fn frames_survive_a_duplex_pipe() {
        let (mut a, mut b) = tokio::io::duplex(1024);
        let msg = RoomMsg::JoinFailed {
            reason: "no such room".into(),
        };
        write_frame(&mut a, &msg).await.unwrap();
        assert_eq!(read_frame(&mut b).await.unwrap(), msg);
    }

    #[tokio::test]
    async fn oversized_length_prefix_is_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&(MAX_FRAME_LEN as u32 + 1).to_be_bytes())
            .await
            .unwrap();
        assert!(read_frame(&mut b).await.is_err());
    }
}
