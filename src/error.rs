use thiserror::Error;

use crate::types::Uuid;

/// Malformed or truncated input while reading a packet field.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WireError {
    #[error("packet too short: need {needed} more bytes, have {remaining}")]
    TooShort { needed: usize, remaining: usize },

    #[error("varint longer than {0} bytes")]
    VarIntTooLong(usize),

    #[error("negative length {0}")]
    NegativeLength(i64),

    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    #[error("invalid boolean byte 0x{0:02x}")]
    InvalidBool(u8),

    #[error("unknown nbt tag {0}")]
    UnknownNbtTag(u8),

    #[error("nbt nested deeper than {0}")]
    NbtTooDeep(usize),

    #[error("nbt decode: {0}")]
    Nbt(String),

    #[error("unknown entity metadata type {0}")]
    UnknownMetadataType(i32),

    #[error("unsupported bits per block {0}")]
    BitsPerBlock(u8),

    #[error("palette index {0} out of range")]
    PaletteIndex(u64),

    #[error("frame of {0} bytes exceeds the limit")]
    FrameTooLarge(usize),

    #[error("decompression: {0}")]
    Decompress(String),
}

/// A fault raised by a tracker while applying a packet to the shadow.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TrackerError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("no entity with id {0} in the shadow")]
    MissingEntity(i32),

    #[error("no chunk at ({0}, {1}) in the shadow")]
    MissingChunk(i32, i32),

    #[error("no boss bar {0}")]
    MissingBossBar(Uuid),

    #[error("no player {0} in the tab list")]
    MissingPlayer(Uuid),

    #[error("slot {0} outside the player inventory")]
    SlotOutOfRange(i16),

    #[error("effect {effect} not active on entity {entity}")]
    MissingEffect { entity: i32, effect: i8 },

    #[error("player is not riding anything")]
    NoVehicle,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    #[error("a client is already attached")]
    Occupied,

    #[error("no client is attached")]
    NotAttached,
}

/// Reasons a downstream connection is closed at accept time.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Refusal {
    #[error("no upstream session")]
    NoUpstream,

    #[error("a client is already connected")]
    Occupied,

    #[error("address is not on the allow-list")]
    NotAllowed,
}

/// Faults during the handshake and login exchanges on either side.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LoginError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("disconnected during login: {0}")]
    Disconnected(String),

    #[error("server requires online-mode encryption")]
    EncryptionRequired,

    #[error("unexpected packet 0x{id:02x} while {phase}")]
    Unexpected { phase: &'static str, id: i32 },

    #[error("unknown handshake intent {0}")]
    UnknownIntent(i32),
}
