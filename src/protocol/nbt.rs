//! NBT blobs embedded in packets.
//!
//! The protocol gives no length prefix, so the blob is walked once to find
//! where it ends, then handed to fastnbt.
use crate::prelude::*;

const MAX_DEPTH: usize = 512;

struct Walker<'a> {
    buf: &'a [u8],
    pos: usize,
}
impl Walker<'_> {
    fn take(&mut self, n: usize) -> Result<&[u8], WireError> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.buf.len()).ok_or(WireError::TooShort {
            needed: n,
            remaining: self.buf.len() - self.pos,
        })?;
        let taken = &self.buf[self.pos..end];
        self.pos = end;
        Ok(taken)
    }
    fn u8(&mut self) -> Result<u8, WireError> {
        Ok(self.take(1)?[0])
    }
    fn u16(&mut self) -> Result<usize, WireError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]) as usize)
    }
    fn len(&mut self) -> Result<usize, WireError> {
        let b = self.take(4)?;
        let n = i32::from_be_bytes([b[0], b[1], b[2], b[3]]);
        usize::try_from(n).map_err(|_| WireError::NegativeLength(n as i64))
    }
    fn name(&mut self) -> Result<(), WireError> {
        let n = self.u16()?;
        self.take(n).map(drop)
    }
    fn payload(&mut self, tag: u8, depth: usize) -> Result<(), WireError> {
        if depth > MAX_DEPTH {
            return Err(WireError::NbtTooDeep(MAX_DEPTH));
        }
        match tag {
            1 => self.take(1).map(drop),
            2 => self.take(2).map(drop),
            3 | 5 => self.take(4).map(drop),
            4 | 6 => self.take(8).map(drop),
            7 => {
                let n = self.len()?;
                self.take(n).map(drop)
            }
            8 => {
                let n = self.u16()?;
                self.take(n).map(drop)
            }
            9 => {
                let inner = self.u8()?;
                let n = self.len()?;
                if n > 0 && inner == 0 {
                    return Err(WireError::UnknownNbtTag(inner));
                }
                for _ in 0..n {
                    self.payload(inner, depth + 1)?;
                }
                Ok(())
            }
            10 => loop {
                let inner = self.u8()?;
                if inner == 0 {
                    return Ok(());
                }
                self.name()?;
                self.payload(inner, depth + 1)?;
            },
            11 => {
                let n = self.len()?;
                self.take(n.saturating_mul(4)).map(drop)
            }
            12 => {
                let n = self.len()?;
                self.take(n.saturating_mul(8)).map(drop)
            }
            _ => Err(WireError::UnknownNbtTag(tag)),
        }
    }
}

/// Length in bytes of the named root tag at the start of `buf`.
pub fn span(buf: &[u8]) -> Result<usize, WireError> {
    let mut walker = Walker { buf, pos: 0 };
    let tag = walker.u8()?;
    if tag != 0 {
        walker.name()?;
        walker.payload(tag, 0)?;
    }
    Ok(walker.pos)
}

pub fn parse(blob: &[u8]) -> Result<Nbt, WireError> {
    if blob == [0] {
        return Ok(Nbt::NONE);
    }
    fastnbt::from_bytes::<fastnbt::Value>(blob)
        .map(|v| Nbt(Some(v)))
        .map_err(|e| WireError::Nbt(e.to_string()))
}

pub fn write(nbt: &Nbt, buf: &mut Vec<u8>) {
    match &nbt.0 {
        None => buf.push(0),
        Some(value) => match fastnbt::to_bytes(value) {
            Ok(bytes) => buf.extend(bytes),
            Err(e) => {
                log::error!("unable to encode nbt, sending none: {e}");
                buf.push(0);
            }
        },
    }
}
