use crate::prelude::*;
use std::collections::BTreeMap;

#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct var<T>(pub T);

pub trait Wire<'a>: Sized {
    fn decode(pkt: &'a [u8]) -> Result<(Self, &'a [u8]), WireError>;
}

/// A positioned reader over one packet payload.
///
/// Trackers pull fields in wire order. `save`/`restore` let the dispatcher
/// hand the same bytes to every interested tracker.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
    mark: usize,
}
impl<'a> Cursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0, mark: 0 }
    }
    pub fn read<T: Wire<'a>>(&mut self) -> Result<T, WireError> {
        let (value, rem) = T::decode(&self.buf[self.pos..])?;
        self.pos = self.buf.len() - rem.len();
        Ok(value)
    }
    pub fn varint(&mut self) -> Result<i32, WireError> {
        self.read::<var<i32>>().map(|v| v.0)
    }
    /// Read a varint count, rejecting negative values.
    pub fn count(&mut self) -> Result<usize, WireError> {
        let n = self.varint()?;
        usize::try_from(n).map_err(|_| WireError::NegativeLength(n as i64))
    }
    pub fn string(&mut self) -> Result<String, WireError> {
        self.read::<&str>().map(str::to_owned)
    }
    /// Take every byte left in the payload.
    pub fn rest(&mut self) -> &'a [u8] {
        let rest = &self.buf[self.pos..];
        self.pos = self.buf.len();
        rest
    }
    pub fn discard(&mut self) {
        self.pos = self.buf.len();
    }
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
    pub fn is_empty(&self) -> bool {
        self.pos == self.buf.len()
    }
    pub fn position(&self) -> usize {
        self.pos
    }
    pub fn save(&mut self) {
        self.mark = self.pos;
    }
    pub fn restore(&mut self) {
        self.pos = self.mark;
    }
}

macro_rules! impl_wire {
    {} => {};
    {$t:ident $($rt:ident)*} => {
        #[allow(non_snake_case)]
        impl<'a, $t: Wire<'a>, $($rt: Wire<'a>),*> Wire<'a> for ($t,$($rt,)*) {
            fn decode(pkt: &'a [u8]) -> Result<(Self, &'a [u8]), WireError> {
                let ($t, pkt) = $t::decode(pkt)?;
                $(let ($rt, pkt) = $rt::decode(pkt)?;)*
                Ok((($t, $($rt,)*), pkt))
            }
        }
        impl_wire!($($rt)*);
    }
}
impl_wire!(A B C D E F G H);

fn short(needed: usize, buf: &[u8]) -> WireError {
    WireError::TooShort { needed, remaining: buf.len() }
}

macro_rules! be {
    { $($i:ident)* } => {
        $(
            pub fn $i(buf: &[u8]) -> Result<($i, &[u8]), WireError> {
                const N: usize = core::mem::size_of::<$i>();
                if buf.len() < N {
                    return Err(short(N, buf));
                }
                let (n, rem) = buf.split_at(N);
                let mut bytes = [0; N];
                bytes.copy_from_slice(n);
                Ok(($i::from_be_bytes(bytes), rem))
            }
            impl Wire<'_> for $i {
                fn decode(pkt: &[u8]) -> Result<(Self, &[u8]), WireError> {
                    $i(pkt)
                }
            }
        )*
    }
}
be! { u8 i8 u16 i16 i32 i64 u64 f32 f64 u128 }

fn varnum(buf: &[u8], max_bytes: usize) -> Result<(u64, &[u8]), WireError> {
    let mut n = 0u64;
    let mut i = 0;
    loop {
        let b = *buf.get(i).ok_or_else(|| short(i + 1, buf))?;
        n |= (b as u64 & 0b111_1111) << (7 * i);
        i += 1;
        if b >> 7 == 0 {
            break;
        }
        if i == max_bytes {
            return Err(WireError::VarIntTooLong(max_bytes));
        }
    }
    Ok((n, &buf[i..]))
}
pub fn varint(buf: &[u8]) -> Result<(i32, &[u8]), WireError> {
    varnum(buf, 5).map(|(n, rem)| (n as u32 as i32, rem))
}
pub fn varlong(buf: &[u8]) -> Result<(i64, &[u8]), WireError> {
    varnum(buf, 10).map(|(n, rem)| (n as i64, rem))
}
impl Wire<'_> for var<i32> {
    fn decode(pkt: &[u8]) -> Result<(Self, &[u8]), WireError> {
        varint(pkt).map(|(n, rem)| (Self(n), rem))
    }
}
impl Wire<'_> for var<i64> {
    fn decode(pkt: &[u8]) -> Result<(Self, &[u8]), WireError> {
        varlong(pkt).map(|(n, rem)| (Self(n), rem))
    }
}

pub fn bytes(buf: &[u8]) -> Result<(&[u8], &[u8]), WireError> {
    let (l, rem) = varint(buf)?;
    let l = usize::try_from(l).map_err(|_| WireError::NegativeLength(l as i64))?;
    if l <= rem.len() {
        Ok(rem.split_at(l))
    } else {
        Err(short(l, rem))
    }
}
impl<'a> Wire<'a> for &'a [u8] {
    fn decode(pkt: &'a [u8]) -> Result<(Self, &'a [u8]), WireError> {
        bytes(pkt)
    }
}
impl<'a> Wire<'a> for &'a str {
    fn decode(pkt: &'a [u8]) -> Result<(Self, &'a [u8]), WireError> {
        let (buf, rem) = bytes(pkt)?;
        Ok((core::str::from_utf8(buf).map_err(|_| WireError::InvalidUtf8)?, rem))
    }
}
impl Wire<'_> for String {
    fn decode(pkt: &[u8]) -> Result<(Self, &[u8]), WireError> {
        <&str>::decode(pkt).map(|(s, rem)| (s.to_owned(), rem))
    }
}
impl Wire<'_> for bool {
    fn decode(pkt: &[u8]) -> Result<(Self, &[u8]), WireError> {
        let (id, rem) = u8(pkt)?;
        Ok((match id {
            0 => false,
            1 => true,
            b => return Err(WireError::InvalidBool(b)),
        }, rem))
    }
}
impl<'a, T: Wire<'a>> Wire<'a> for Option<T> {
    fn decode(pkt: &'a [u8]) -> Result<(Self, &'a [u8]), WireError> {
        let (present, pkt) = bool::decode(pkt)?;
        if present {
            let (value, pkt) = T::decode(pkt)?;
            Ok((Some(value), pkt))
        } else {
            Ok((None, pkt))
        }
    }
}
impl<'a, T: Wire<'a>> Wire<'a> for V3<T> {
    fn decode(pkt: &'a [u8]) -> Result<(Self, &'a [u8]), WireError> {
        let ((x, y, z), pkt) = Wire::decode(pkt)?;
        Ok((Self { x, y, z }, pkt))
    }
}
impl Wire<'_> for Uuid {
    fn decode(pkt: &[u8]) -> Result<(Self, &[u8]), WireError> {
        u128(pkt).map(|(n, rem)| (Self(n), rem))
    }
}
impl Wire<'_> for Angle {
    fn decode(pkt: &[u8]) -> Result<(Self, &[u8]), WireError> {
        u8(pkt).map(|(n, rem)| (Self(n), rem))
    }
}
impl Wire<'_> for Chat {
    fn decode(pkt: &[u8]) -> Result<(Self, &[u8]), WireError> {
        String::decode(pkt).map(|(s, rem)| (Self(s), rem))
    }
}

/// A block position packed into one long, 26 bits x, 12 bits y, 26 bits z.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position(pub V3<i32>);
pub fn pos(buf: &[u8]) -> Result<(V3<i32>, &[u8]), WireError> {
    let (position, rem) = u64(buf)?;
    let mut x = (position >> 38) as i32;
    let mut y = ((position >> 26) & 0xFFF) as i32;
    let mut z = (position & 0x3FFFFFF) as i32;
    if x >= 1 << 25 { x -= 1 << 26 }
    if y >= 1 << 11 { y -= 1 << 12 }
    if z >= 1 << 25 { z -= 1 << 26 }
    Ok((V3::new(x, y, z), rem))
}
impl Wire<'_> for Position {
    fn decode(pkt: &[u8]) -> Result<(Self, &[u8]), WireError> {
        pos(pkt).map(|(pos, rem)| (Self(pos), rem))
    }
}

impl Wire<'_> for Nbt {
    fn decode(pkt: &[u8]) -> Result<(Self, &[u8]), WireError> {
        let len = super::nbt::span(pkt)?;
        let (blob, rem) = pkt.split_at(len);
        Ok((super::nbt::parse(blob)?, rem))
    }
}

impl Wire<'_> for Slot {
    fn decode(pkt: &[u8]) -> Result<(Self, &[u8]), WireError> {
        let (present, pkt) = bool::decode(pkt)?;
        if !present {
            return Ok((Slot::EMPTY, pkt));
        }
        let ((var(id), count, nbt), pkt) = Wire::decode(pkt)?;
        Ok((Slot { id, count, nbt }, pkt))
    }
}

/// Skip over one metadata value of the given type, returning its length.
fn metadata_value_len(kind: i32, buf: &[u8]) -> Result<usize, WireError> {
    let rem = match kind {
        0 => u8(buf)?.1,
        1 => varint(buf)?.1,
        2 => f32(buf)?.1,
        3 | 4 => bytes(buf)?.1,
        5 => Option::<&[u8]>::decode(buf)?.1,
        6 => Slot::decode(buf)?.1,
        7 => bool::decode(buf)?.1,
        8 => <(f32, f32, f32)>::decode(buf)?.1,
        9 => pos(buf)?.1,
        10 => Option::<Position>::decode(buf)?.1,
        11 => varint(buf)?.1,
        12 => Option::<Uuid>::decode(buf)?.1,
        13 => varint(buf)?.1,
        14 => Nbt::decode(buf)?.1,
        15 => {
            let (particle, rem) = varint(buf)?;
            match particle {
                // block, falling_dust
                3 | 20 => varint(rem)?.1,
                // dust
                11 => <(f32, f32, f32, f32)>::decode(rem)?.1,
                // item
                27 => Slot::decode(rem)?.1,
                _ => rem,
            }
        }
        _ => return Err(WireError::UnknownMetadataType(kind)),
    };
    Ok(buf.len() - rem.len())
}
impl Wire<'_> for Metadata {
    fn decode(mut pkt: &[u8]) -> Result<(Self, &[u8]), WireError> {
        let mut entries = BTreeMap::new();
        loop {
            let (index, rem) = u8(pkt)?;
            if index == 0xFF {
                return Ok((Metadata(entries), rem));
            }
            let (kind, rem) = varint(rem)?;
            let len = metadata_value_len(kind, rem)?;
            let (raw, rem) = rem.split_at(len);
            entries.insert(index, MetaEntry { kind, raw: raw.to_vec() });
            pkt = rem;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_edges() {
        assert_eq!(varint(&[0x00]).unwrap().0, 0);
        assert_eq!(varint(&[0x7f]).unwrap().0, 127);
        assert_eq!(varint(&[0xff, 0x01]).unwrap().0, 255);
        assert_eq!(varint(&[0xff, 0xff, 0xff, 0xff, 0x0f]).unwrap().0, -1);
        assert!(matches!(varint(&[0xff, 0xff, 0xff, 0xff, 0xff, 0x01]), Err(WireError::VarIntTooLong(5))));
        assert!(matches!(varint(&[0x80]), Err(WireError::TooShort { .. })));
    }

    #[test]
    fn position_sign_extends() {
        let packed: u64 = ((-5i64 as u64 & 0x3FFFFFF) << 38) | ((70u64 & 0xFFF) << 26) | (-1i64 as u64 & 0x3FFFFFF);
        let bytes = packed.to_be_bytes();
        let (p, rem) = pos(&bytes).unwrap();
        assert!(rem.is_empty());
        assert_eq!(p, V3::new(-5, 70, -1));
    }

    #[test]
    fn cursor_save_restore() {
        let buf = [0x05, 0x00, 0x00, 0x00, 0x07];
        let mut cur = Cursor::new(&buf);
        cur.save();
        assert_eq!(cur.varint().unwrap(), 5);
        assert_eq!(cur.read::<i32>().unwrap(), 7);
        assert!(cur.is_empty());
        cur.restore();
        assert_eq!(cur.remaining(), 5);
        assert_eq!(cur.rest(), &buf[..]);
        assert!(cur.is_empty());
    }

    #[test]
    fn metadata_reads_to_terminator() {
        // index 0 byte 0x20, index 2 string "hi", index 6 boolean true, end
        let buf = [0, 0, 0x20, 2, 3, 2, b'h', b'i', 6, 7, 1, 0xFF, 0xAA];
        let (meta, rem) = Metadata::decode(&buf).unwrap();
        assert_eq!(rem, &[0xAA]);
        assert_eq!(meta.0.len(), 3);
        assert_eq!(meta.0[&2], MetaEntry { kind: 3, raw: vec![2, b'h', b'i'] });
    }

    #[test]
    fn empty_slot_is_one_byte() {
        let (slot, rem) = Slot::decode(&[0, 9]).unwrap();
        assert!(slot.is_empty());
        assert_eq!(rem, &[9]);
    }
}
