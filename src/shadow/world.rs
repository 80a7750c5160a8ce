//! Loaded chunks: block states, light, block entities and pending block actions.
use std::collections::BTreeMap;

use crate::prelude::*;
use crate::protocol::encode::{Each, ToWire};
use crate::protocol::section::Section;
use crate::protocol::{var, wire, Clientbound, Cursor, Packet, PacketKind, Position};
use super::{Flow, Outbox, ReplayStep, Tracker};

pub(super) const INTERESTS: &[PacketKind] = &[
    PacketKind::Clientbound(Clientbound::JoinGame),
    PacketKind::Clientbound(Clientbound::Respawn),
    PacketKind::Clientbound(Clientbound::ChunkData),
    PacketKind::Clientbound(Clientbound::UnloadChunk),
    PacketKind::Clientbound(Clientbound::BlockChange),
    PacketKind::Clientbound(Clientbound::MultiBlockChange),
    PacketKind::Clientbound(Clientbound::Explosion),
    PacketKind::Clientbound(Clientbound::UpdateBlockEntity),
    PacketKind::Clientbound(Clientbound::BlockAction),
];

pub const SECTIONS: usize = 16;
pub const BIOMES: usize = 256;
const OVERWORLD: i32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockAction {
    pub action: u8,
    pub param: u8,
    pub block_type: i32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Chunk {
    pub sections: [Option<Section>; SECTIONS],
    pub biomes: Vec<i32>,
    /// Keyed by absolute block position.
    pub block_entities: BTreeMap<V3<i32>, Nbt>,
    pub block_actions: BTreeMap<V3<i32>, BlockAction>,
}
impl Chunk {
    pub fn bitmask(&self) -> i32 {
        self.sections.iter().enumerate().filter(|(_, s)| s.is_some()).fold(0, |mask, (i, _)| mask | 1 << i)
    }

    fn set_block(&mut self, pos: V3<i32>, state: u16, skylight: bool) {
        let Some(slot) = usize::try_from(pos.y >> 4).ok().and_then(|y| self.sections.get_mut(y)) else {
            return;
        };
        if slot.is_none() && state == 0 {
            return;
        }
        let section = slot.get_or_insert_with(|| Section::empty(skylight));
        section.blocks[Section::index(pos.x, pos.y, pos.z)] = state;
        self.block_actions.remove(&pos);
    }
}

/// Chunk coordinates containing a block position.
fn chunk_of(pos: V3<i32>) -> (i32, i32) {
    (pos.x >> 4, pos.z >> 4)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct World {
    pub dimension: i32,
    pub chunks: BTreeMap<(i32, i32), Chunk>,
}

impl World {
    fn skylight(&self) -> bool {
        self.dimension == OVERWORLD
    }

    fn chunk_data(&mut self, cur: &mut Cursor) -> Result<(), TrackerError> {
        let (x, z, full, var(bitmask), data): (i32, i32, bool, var<i32>, &[u8]) = cur.read()?;
        let mut block_entities = vec![];
        for _ in 0..cur.count()? {
            block_entities.push(cur.read::<Nbt>()?);
        }

        let mut sections: [Option<Section>; SECTIONS] = Default::default();
        let mut rem = data;
        for (i, slot) in sections.iter_mut().enumerate() {
            if bitmask & 1 << i != 0 {
                let (section, r) = Section::decode(rem, self.skylight())?;
                *slot = Some(section);
                rem = r;
            }
        }
        let mut biomes = Vec::new();
        if full {
            biomes.reserve(BIOMES);
            for _ in 0..BIOMES {
                let (biome, r) = wire::i32(rem)?;
                biomes.push(biome);
                rem = r;
            }
        }
        if !rem.is_empty() {
            log::debug!("chunk ({x}, {z}) carried {} trailing data bytes", rem.len());
        }

        if full {
            self.chunks.insert((x, z), Chunk { biomes, ..Default::default() });
        }
        let chunk = self.chunks.get_mut(&(x, z)).ok_or(TrackerError::MissingChunk(x, z))?;
        for (i, section) in sections.into_iter().enumerate() {
            if section.is_some() {
                chunk.sections[i] = section;
            }
        }
        for nbt in block_entities {
            match (nbt.int("x"), nbt.int("y"), nbt.int("z")) {
                (Some(x), Some(y), Some(z)) => {
                    chunk.block_entities.insert(V3::new(x, y, z), nbt);
                }
                _ => log::debug!("block entity without a position in chunk ({x}, {z})"),
            }
        }
        Ok(())
    }

    fn multi_block_change(&mut self, cur: &mut Cursor) -> Result<(), TrackerError> {
        let (cx, cz): (i32, i32) = cur.read()?;
        let mut records = vec![];
        for _ in 0..cur.count()? {
            let (horizontal, y, var(state)): (u8, u8, var<i32>) = cur.read()?;
            let pos = V3::new(cx * 16 + (horizontal >> 4) as i32, y as i32, cz * 16 + (horizontal & 0xF) as i32);
            records.push((pos, state as u16));
        }
        let skylight = self.skylight();
        let chunk = self.chunks.get_mut(&(cx, cz)).ok_or(TrackerError::MissingChunk(cx, cz))?;
        for (pos, state) in records {
            chunk.set_block(pos, state, skylight);
        }
        Ok(())
    }

    fn explosion(&mut self, cur: &mut Cursor) -> Result<(), TrackerError> {
        let (x, y, z, _radius, records): (f32, f32, f32, f32, i32) = cur.read()?;
        // records are relative to the centre truncated toward zero, not floored
        let origin = V3::new(x as i32, y as i32, z as i32);
        let skylight = self.skylight();
        for _ in 0..records.max(0) {
            let (dx, dy, dz): (i8, i8, i8) = cur.read()?;
            let pos = V3::new(origin.x + dx as i32, origin.y + dy as i32, origin.z + dz as i32);
            // blasts can reach into chunks the client never loaded
            if let Some(chunk) = self.chunks.get_mut(&chunk_of(pos)) {
                chunk.set_block(pos, 0, skylight);
                chunk.block_entities.remove(&pos);
            }
        }
        let _player_motion: (f32, f32, f32) = cur.read()?;
        Ok(())
    }
}

impl Tracker for World {
    fn apply(&mut self, kind: PacketKind, cur: &mut Cursor, _out: &mut Outbox) -> Result<Flow, TrackerError> {
        let PacketKind::Clientbound(kind) = kind else {
            cur.discard();
            return Ok(Flow::Forward);
        };
        match kind {
            Clientbound::JoinGame => {
                let (_entity, _gamemode, dimension): (i32, u8, i32) = cur.read()?;
                cur.discard();
                self.dimension = dimension;
                self.chunks.clear();
            }
            Clientbound::Respawn => {
                let dimension: i32 = cur.read()?;
                cur.discard();
                if dimension != self.dimension {
                    self.chunks.clear();
                }
                self.dimension = dimension;
            }
            Clientbound::ChunkData => self.chunk_data(cur)?,
            Clientbound::UnloadChunk => {
                let (x, z): (i32, i32) = cur.read()?;
                self.chunks.remove(&(x, z)).ok_or(TrackerError::MissingChunk(x, z))?;
            }
            Clientbound::BlockChange => {
                let (Position(pos), var(state)): (Position, var<i32>) = cur.read()?;
                let skylight = self.skylight();
                let (cx, cz) = chunk_of(pos);
                let chunk = self.chunks.get_mut(&(cx, cz)).ok_or(TrackerError::MissingChunk(cx, cz))?;
                chunk.set_block(pos, state as u16, skylight);
            }
            Clientbound::MultiBlockChange => self.multi_block_change(cur)?,
            Clientbound::Explosion => self.explosion(cur)?,
            Clientbound::UpdateBlockEntity => {
                let (Position(pos), _action, nbt): (Position, u8, Nbt) = cur.read()?;
                let (cx, cz) = chunk_of(pos);
                let chunk = self.chunks.get_mut(&(cx, cz)).ok_or(TrackerError::MissingChunk(cx, cz))?;
                match (chunk.block_entities.get_mut(&pos), nbt.0.is_some()) {
                    (Some(_), false) => {
                        chunk.block_entities.remove(&pos);
                    }
                    (Some(old), true) => old.merge(nbt),
                    (None, true) => {
                        chunk.block_entities.insert(pos, nbt);
                    }
                    (None, false) => {}
                }
            }
            Clientbound::BlockAction => {
                let (Position(pos), action, param, var(block_type)): (Position, u8, u8, var<i32>) = cur.read()?;
                let (cx, cz) = chunk_of(pos);
                let chunk = self.chunks.get_mut(&(cx, cz)).ok_or(TrackerError::MissingChunk(cx, cz))?;
                chunk.block_actions.insert(pos, BlockAction { action, param, block_type });
            }
            _ => cur.discard(),
        }
        Ok(Flow::Forward)
    }

    fn replay(&mut self, _step: ReplayStep, out: &mut Outbox) {
        for (&(x, z), chunk) in &self.chunks {
            let mut data = vec![];
            for section in chunk.sections.iter().flatten() {
                section.encode(&mut data);
            }
            Each(&chunk.biomes).encode(&mut data);
            out.client(Packet::new(
                Clientbound::ChunkData,
                (
                    x,
                    z,
                    true,
                    var(chunk.bitmask()),
                    &data,
                    var(chunk.block_entities.len()),
                    Each(chunk.block_entities.values()),
                ),
            ));
            for (&pos, a) in &chunk.block_actions {
                out.client(Packet::new(Clientbound::BlockAction, (Position(pos), a.action, a.param, var(a.block_type))));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode::Raw;
    use crate::shadow::testkit;
    use fastnbt::Value;

    fn sign(x: i32, y: i32, z: i32, text: &str) -> Nbt {
        let mut map = std::collections::HashMap::new();
        map.insert("x".to_string(), Value::Int(x));
        map.insert("y".to_string(), Value::Int(y));
        map.insert("z".to_string(), Value::Int(z));
        map.insert("Text1".to_string(), Value::String(text.into()));
        Nbt(Some(Value::Compound(map)))
    }

    fn loaded() -> World {
        let mut world = World::default();
        testkit::apply(&mut world, Clientbound::ChunkData, Raw(&testkit::chunk_payload(0, 0, true, 0b1111, true)));
        world
    }

    #[test]
    fn replay_keeps_section_bitmask() {
        let mut world = loaded();
        let sent = testkit::replay(&mut world, ReplayStep::Chunks);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].id, Clientbound::ChunkData.id());
        let (x, z, full, var(bitmask)): (i32, i32, bool, var<i32>) = Cursor::new(&sent[0].payload).read().unwrap();
        assert_eq!((x, z, full, bitmask), (0, 0, true, 0b1111));
    }

    #[test]
    fn partial_update_replaces_masked_sections_only() {
        let mut world = loaded();
        let before = world.chunks[&(0, 0)].sections[0].clone();
        testkit::apply(&mut world, Clientbound::ChunkData, Raw(&testkit::chunk_payload(0, 0, false, 0b10010, true)));
        let chunk = &world.chunks[&(0, 0)];
        assert_eq!(chunk.bitmask(), 0b11111);
        assert_eq!(chunk.sections[0], before);
        assert_eq!(chunk.biomes.len(), BIOMES);
    }

    #[test]
    fn partial_update_without_chunk_is_missing() {
        let mut world = World::default();
        let err = testkit::try_apply(&mut world, Clientbound::ChunkData, Raw(&testkit::chunk_payload(3, 4, false, 1, true)));
        assert!(matches!(err, Err(TrackerError::MissingChunk(3, 4))));
    }

    #[test]
    fn block_changes_land_in_sections() {
        let mut world = loaded();
        testkit::apply(&mut world, Clientbound::BlockChange, (Position(V3::new(3, 70, 5)), var(9)));
        testkit::apply(&mut world, Clientbound::MultiBlockChange, (0i32, 0i32, var(1), 0x12u8, 2u8, var(33)));
        let chunk = &world.chunks[&(0, 0)];
        assert_eq!(chunk.sections[4].as_ref().unwrap().blocks[Section::index(3, 70, 5)], 9);
        assert_eq!(chunk.sections[0].as_ref().unwrap().blocks[Section::index(1, 2, 2)], 33);
        assert!(chunk.sections[5].is_none());
    }

    #[test]
    fn explosion_clears_blocks() {
        let mut world = loaded();
        testkit::apply(&mut world, Clientbound::BlockChange, (Position(V3::new(1, 1, 1)), var(5)));
        testkit::apply(
            &mut world,
            Clientbound::Explosion,
            (1.5f32, 1.2f32, 1.9f32, 3.0f32, 2i32, (0i8, 0i8, 0i8), (-40i8, 0i8, 0i8), (0f32, 0f32, 0f32)),
        );
        assert_eq!(world.chunks[&(0, 0)].sections[0].as_ref().unwrap().blocks[Section::index(1, 1, 1)], 0);
    }

    #[test]
    fn explosion_offsets_truncate_toward_zero() {
        let mut world = loaded();
        testkit::apply(&mut world, Clientbound::ChunkData, Raw(&testkit::chunk_payload(-1, 0, true, 0b1, true)));
        testkit::apply(&mut world, Clientbound::BlockChange, (Position(V3::new(0, 1, 0)), var(5)));
        testkit::apply(&mut world, Clientbound::BlockChange, (Position(V3::new(-1, 1, 0)), var(5)));
        testkit::apply(
            &mut world,
            Clientbound::Explosion,
            (-0.5f32, 1.5f32, 0.5f32, 1.0f32, 1i32, (0i8, 0i8, 0i8), (0f32, 0f32, 0f32)),
        );
        let block = |chunk: (i32, i32), x| world.chunks[&chunk].sections[0].as_ref().unwrap().blocks[Section::index(x, 1, 0)];
        assert_eq!(block((0, 0), 0), 0);
        assert_eq!(block((-1, 0), -1), 5);
    }

    #[test]
    fn block_entities_merge_and_replay() {
        let mut world = loaded();
        let pos = Position(V3::new(2, 64, 3));
        testkit::apply(&mut world, Clientbound::UpdateBlockEntity, (pos, 9u8, sign(2, 64, 3, "a")));
        testkit::apply(&mut world, Clientbound::UpdateBlockEntity, (pos, 9u8, sign(2, 64, 3, "b")));
        testkit::apply(&mut world, Clientbound::BlockAction, (Position(V3::new(0, 10, 0)), 1u8, 2u8, var(54)));
        assert_eq!(world.chunks[&(0, 0)].block_entities.len(), 1);

        let mut mirror = World::default();
        for packet in testkit::replay(&mut world, ReplayStep::Chunks) {
            let kind = packet.kind(Direction::Clientbound).unwrap();
            testkit::apply(&mut mirror, kind, Raw(&packet.payload));
        }
        assert_eq!(mirror, world);

        testkit::apply(&mut world, Clientbound::UpdateBlockEntity, (pos, 9u8, Nbt::NONE));
        assert!(world.chunks[&(0, 0)].block_entities.is_empty());
    }

    #[test]
    fn nether_sections_have_no_sky() {
        let mut world = World::default();
        testkit::apply(&mut world, Clientbound::Respawn, (-1i32, 0u8, 0u8, "default"));
        testkit::apply(&mut world, Clientbound::ChunkData, Raw(&testkit::chunk_payload(1, 1, true, 0b1, false)));
        assert!(world.chunks[&(1, 1)].sections[0].as_ref().unwrap().sky_light.is_none());
        testkit::apply(&mut world, Clientbound::Respawn, (0i32, 0u8, 0u8, "default"));
        assert!(world.chunks.is_empty());
    }
}
