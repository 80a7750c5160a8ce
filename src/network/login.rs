//! Handshake, status and login exchanges. Upstream we play an offline-mode
//! client; downstream an offline-mode server with room for one player.
use crate::prelude::*;
use crate::protocol::{var, Cursor, Packet, GAME_VERSION, PROTOCOL_VERSION};

const HANDSHAKE: i32 = 0x00;
const INTENT_STATUS: i32 = 1;
const INTENT_LOGIN: i32 = 2;

mod id {
    // serverbound
    pub const LOGIN_START: i32 = 0x00;
    pub const PLUGIN_RESPONSE: i32 = 0x02;
    pub const STATUS_REQUEST: i32 = 0x00;
    pub const PING: i32 = 0x01;

    // clientbound
    pub const LOGIN_DISCONNECT: i32 = 0x00;
    pub const ENCRYPTION_REQUEST: i32 = 0x01;
    pub const LOGIN_SUCCESS: i32 = 0x02;
    pub const SET_COMPRESSION: i32 = 0x03;
    pub const PLUGIN_REQUEST: i32 = 0x04;
    pub const STATUS_RESPONSE: i32 = 0x00;
    pub const PONG: i32 = 0x01;
}

/// The identity the server gave us. Handed unchanged to attaching clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    /// Hyphenated, as sent in login success.
    pub uuid: String,
    pub name: String,
}

fn build(id: i32, fields: impl crate::protocol::ToWire) -> Packet {
    let mut payload = vec![];
    fields.encode(&mut payload);
    Packet { id, payload }
}

/// Handshake and login start for the upstream server.
pub fn hello(host: &str, port: u16, username: &str) -> [Packet; 2] {
    [
        build(HANDSHAKE, (var(PROTOCOL_VERSION), host, port, var(INTENT_LOGIN))),
        build(id::LOGIN_START, username),
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamStep {
    Reply(Packet),
    /// Frames above this size are compressed from now on; `None` turns it off.
    Compress(Option<usize>),
    Joined(Profile),
}

pub fn upstream(packet: &Packet) -> Result<UpstreamStep, LoginError> {
    let mut cur = Cursor::new(&packet.payload);
    match packet.id {
        id::LOGIN_DISCONNECT => Err(LoginError::Disconnected(cur.string()?)),
        id::ENCRYPTION_REQUEST => Err(LoginError::EncryptionRequired),
        id::LOGIN_SUCCESS => {
            let (uuid, name): (String, String) = cur.read()?;
            Ok(UpstreamStep::Joined(Profile { uuid, name }))
        }
        id::SET_COMPRESSION => {
            let threshold = cur.varint()?;
            Ok(UpstreamStep::Compress(usize::try_from(threshold).ok()))
        }
        id::PLUGIN_REQUEST => {
            let message = cur.varint()?;
            let channel = cur.string()?;
            log::debug!("declining login plugin request on {channel}");
            Ok(UpstreamStep::Reply(packet_response(message)))
        }
        other => Err(LoginError::Unexpected { phase: "logging in upstream", id: other }),
    }
}

fn packet_response(message: i32) -> Packet {
    // not understood
    build(id::PLUGIN_RESPONSE, (var(message), false))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Handshaking,
    Status,
    Login { protocol: i32 },
    Play,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DownstreamStep {
    Phase(Phase),
    Reply(Packet),
    /// Send this and hang up.
    Close(Packet),
    /// The client asked to log in with this name.
    Join(String),
}

/// What the server list shows for the proxy. Only a client in the free slot
/// can ask, so nobody else is ever online.
pub fn status_json(motd: &str) -> String {
    serde_json::json!({
        "version": { "name": GAME_VERSION, "protocol": PROTOCOL_VERSION },
        "players": { "max": 1, "online": 0, "sample": [] },
        "description": { "text": motd },
    })
    .to_string()
}

pub fn downstream(phase: Phase, packet: &Packet, motd: &str) -> Result<DownstreamStep, LoginError> {
    let mut cur = Cursor::new(&packet.payload);
    match (phase, packet.id) {
        (Phase::Handshaking, HANDSHAKE) => {
            let (var(protocol), _host, _port, var(intent)): (var<i32>, &str, u16, var<i32>) = cur.read()?;
            match intent {
                INTENT_STATUS => Ok(DownstreamStep::Phase(Phase::Status)),
                INTENT_LOGIN => Ok(DownstreamStep::Phase(Phase::Login { protocol })),
                other => Err(LoginError::UnknownIntent(other)),
            }
        }
        (Phase::Status, id::STATUS_REQUEST) => {
            Ok(DownstreamStep::Reply(build(id::STATUS_RESPONSE, status_json(motd))))
        }
        (Phase::Status, id::PING) => {
            let token: i64 = cur.read()?;
            Ok(DownstreamStep::Close(build(id::PONG, token)))
        }
        (Phase::Login { protocol }, id::LOGIN_START) => {
            let name = cur.string()?;
            if protocol != PROTOCOL_VERSION {
                log::info!("{name} tried to join with protocol {protocol}");
                let reason = Chat::text(&format!("This proxy only speaks {GAME_VERSION}"));
                return Ok(DownstreamStep::Close(build(id::LOGIN_DISCONNECT, reason)));
            }
            Ok(DownstreamStep::Join(name))
        }
        (phase, other) => Err(LoginError::Unexpected { phase: phase.name(), id: other }),
    }
}

impl Phase {
    fn name(self) -> &'static str {
        match self {
            Phase::Handshaking => "handshaking",
            Phase::Status => "serving status",
            Phase::Login { .. } => "logging in downstream",
            Phase::Play => "playing",
        }
    }
}

/// Login success for an attaching client, carrying the upstream identity.
pub fn welcome(profile: &Profile) -> Packet {
    build(id::LOGIN_SUCCESS, (profile.uuid.as_str(), profile.name.as_str()))
}

/// Kick a client that is still logging in.
pub fn refuse(reason: &str) -> Packet {
    build(id::LOGIN_DISCONNECT, Chat::text(reason))
}
