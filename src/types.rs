use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct V3<T> {
    pub x: T,
    pub y: T,
    pub z: T,
}
impl<T> V3<T> {
    pub const fn new(x: T, y: T, z: T) -> Self {
        Self { x, y, z }
    }
}

/// Which way a packet travels through the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Client to server.
    Serverbound,
    /// Server to client.
    Clientbound,
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Uuid(pub u128);
impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.0;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            (n >> 96) as u32,
            (n >> 80) as u16,
            (n >> 64) as u16,
            (n >> 48) as u16,
            n & 0xFFFF_FFFF_FFFF
        )
    }
}
impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A rotation in 1/256ths of a full turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Angle(pub u8);
impl Angle {
    pub fn from_degrees(degrees: f32) -> Self {
        Self((degrees.rem_euclid(360.0) * 256.0 / 360.0) as u8)
    }
    pub fn degrees(self) -> f32 {
        self.0 as f32 * 360.0 / 256.0
    }
}

/// A JSON text component, kept as the server sent it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Chat(pub String);
impl Chat {
    pub fn text(msg: &str) -> Self {
        Self(serde_json::json!({ "text": msg }).to_string())
    }
}

/// An NBT compound. `None` is the lone `TAG_End` the protocol uses for "no data".
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Nbt(pub Option<fastnbt::Value>);
impl Nbt {
    pub const NONE: Nbt = Nbt(None);

    pub fn int(&self, key: &str) -> Option<i32> {
        match &self.0 {
            Some(fastnbt::Value::Compound(map)) => match map.get(key)? {
                fastnbt::Value::Int(n) => Some(*n),
                _ => None,
            },
            _ => None,
        }
    }

    /// Overlay the keys of `other` onto this compound.
    pub fn merge(&mut self, other: Nbt) {
        match (&mut self.0, other.0) {
            (Some(fastnbt::Value::Compound(old)), Some(fastnbt::Value::Compound(new))) => old.extend(new),
            (slot, new) => *slot = new,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Slot {
    /// Item id, -1 when the slot is empty.
    pub id: i32,
    pub count: u8,
    pub nbt: Nbt,
}
impl Slot {
    pub const EMPTY: Slot = Slot { id: -1, count: 0, nbt: Nbt::NONE };

    pub fn is_empty(&self) -> bool {
        self.id == -1
    }
}

/// One entity metadata value: its type id and the encoded value bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaEntry {
    pub kind: i32,
    pub raw: Vec<u8>,
}

/// Entity metadata keyed by index. Updates overwrite per index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Metadata(pub BTreeMap<u8, MetaEntry>);
impl Metadata {
    pub fn merge(&mut self, update: Metadata) {
        self.0.extend(update.0);
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
