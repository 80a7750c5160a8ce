//! Field codecs and packet ids for the game protocol.
pub mod encode;
pub mod nbt;
pub mod packets;
pub mod section;
pub mod wire;

pub use encode::ToWire;
pub use packets::{Clientbound, Packet, PacketKind, Serverbound};
pub use wire::{var, Cursor, Position, Wire};

pub const PROTOCOL_VERSION: i32 = 404;
pub const GAME_VERSION: &str = "1.13.2";
