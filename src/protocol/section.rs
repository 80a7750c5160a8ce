//! 16x16x16 chunk sections in the 1.13 paletted format.
use crate::prelude::*;
use super::encode::ToWire;
use super::wire::{self, var};

pub const BLOCKS: usize = 16 * 16 * 16;
pub const LIGHT_BYTES: usize = BLOCKS / 2;
/// Bits per entry when the section uses global block state ids.
const GLOBAL_BITS: u8 = 14;

#[derive(Clone, PartialEq, Eq)]
pub struct Section {
    /// Global block state ids, indexed `y * 256 + z * 16 + x`.
    pub blocks: Box<[u16; BLOCKS]>,
    pub block_light: Box<[u8; LIGHT_BYTES]>,
    /// Only present in dimensions with a sky.
    pub sky_light: Option<Box<[u8; LIGHT_BYTES]>>,
}
impl std::fmt::Debug for Section {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Section")
            .field("non_air", &self.blocks.iter().filter(|b| **b != 0).count())
            .field("sky_light", &self.sky_light.is_some())
            .finish()
    }
}
impl Section {
    pub fn empty(skylight: bool) -> Self {
        Self {
            blocks: Box::new([0; BLOCKS]),
            block_light: Box::new([0; LIGHT_BYTES]),
            sky_light: skylight.then(|| Box::new([0; LIGHT_BYTES])),
        }
    }
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|b| *b == 0)
    }
    pub fn index(x: i32, y: i32, z: i32) -> usize {
        (y.rem_euclid(16) * 256 + z.rem_euclid(16) * 16 + x.rem_euclid(16)) as usize
    }

    pub fn decode(buf: &[u8], skylight: bool) -> Result<(Self, &[u8]), WireError> {
        let (bits, rem) = wire::u8(buf)?;
        if bits == 0 || bits > 32 {
            return Err(WireError::BitsPerBlock(bits));
        }
        let mut rem = rem;
        let palette = if bits <= 8 {
            let (n, r) = wire::varint(rem)?;
            rem = r;
            let mut palette = Vec::with_capacity(n.clamp(0, 256) as usize);
            for _ in 0..n {
                let (id, r) = wire::varint(rem)?;
                rem = r;
                palette.push(id as u16);
            }
            Some(palette)
        } else {
            None
        };
        let (longs, r) = wire::varint(rem)?;
        rem = r;
        let longs = usize::try_from(longs).map_err(|_| WireError::NegativeLength(longs as i64))?;
        if longs * 64 < BLOCKS * bits as usize {
            return Err(WireError::TooShort { needed: BLOCKS * bits as usize / 64, remaining: longs });
        }
        let needed = longs.checked_mul(8).unwrap_or(usize::MAX);
        if needed > rem.len() {
            return Err(WireError::TooShort { needed, remaining: rem.len() });
        }
        let mut data = Vec::with_capacity(longs);
        for _ in 0..longs {
            let (l, r) = wire::u64(rem)?;
            rem = r;
            data.push(l);
        }

        let mask = (1u64 << bits) - 1;
        let mut blocks = Box::new([0u16; BLOCKS]);
        for (i, block) in blocks.iter_mut().enumerate() {
            let bit = i * bits as usize;
            let (word, offset) = (bit / 64, bit % 64);
            let mut value = data[word] >> offset;
            if offset + bits as usize > 64 {
                value |= data[word + 1] << (64 - offset);
            }
            let value = value & mask;
            *block = match &palette {
                Some(palette) => *palette.get(value as usize).ok_or(WireError::PaletteIndex(value))?,
                None => value as u16,
            };
        }

        let (light, r) = light(rem)?;
        rem = r;
        let sky_light = if skylight {
            let (light, r) = self::light(rem)?;
            rem = r;
            Some(light)
        } else {
            None
        };
        Ok((Self { blocks, block_light: light, sky_light }, rem))
    }
}

fn light(buf: &[u8]) -> Result<(Box<[u8; LIGHT_BYTES]>, &[u8]), WireError> {
    if buf.len() < LIGHT_BYTES {
        return Err(WireError::TooShort { needed: LIGHT_BYTES, remaining: buf.len() });
    }
    let (light, rem) = buf.split_at(LIGHT_BYTES);
    let mut out = Box::new([0; LIGHT_BYTES]);
    out.copy_from_slice(light);
    Ok((out, rem))
}

impl ToWire for Section {
    fn encode(&self, buf: &mut Vec<u8>) {
        let mut palette: Vec<u16> = self.blocks.to_vec();
        palette.sort_unstable();
        palette.dedup();
        let needed = (usize::BITS - (palette.len() - 1).leading_zeros()) as u8;
        let bits = match needed.max(4) {
            bits @ 4..=8 => bits,
            _ => GLOBAL_BITS,
        };
        buf.push(bits);
        if bits <= 8 {
            var(palette.len()).encode(buf);
            for id in &palette {
                var(*id as i32).encode(buf);
            }
        }

        let mut data = vec![0u64; BLOCKS * bits as usize / 64];
        for (i, block) in self.blocks.iter().enumerate() {
            let value = if bits <= 8 {
                palette.binary_search(block).unwrap_or(0) as u64
            } else {
                *block as u64
            };
            let bit = i * bits as usize;
            let (word, offset) = (bit / 64, bit % 64);
            data[word] |= value << offset;
            if offset + bits as usize > 64 {
                data[word + 1] |= value >> (64 - offset);
            }
        }
        var(data.len()).encode(buf);
        for long in data {
            long.encode(buf);
        }
        buf.extend_from_slice(&self.block_light[..]);
        if let Some(sky) = &self.sky_light {
            buf.extend_from_slice(&sky[..]);
        }
    }
}
