//! Helpers for driving trackers with encoded packets in tests.
use crate::prelude::*;
use crate::protocol::encode::Each;
use crate::protocol::section::Section;
use crate::protocol::{var, Cursor, Packet, PacketKind, ToWire};
use super::{world, Flow, Outbox, ReplayStep, Tracker};

/// Apply one packet built from `fields`, asserting the handler succeeds and
/// reads the payload to its end.
pub(crate) fn apply<T: Tracker>(tracker: &mut T, kind: impl Into<PacketKind>, fields: impl ToWire) -> Outbox {
    let mut out = Outbox::new(false);
    apply_with(tracker, kind, fields, &mut out);
    out
}

pub(crate) fn apply_with<T: Tracker>(tracker: &mut T, kind: impl Into<PacketKind>, fields: impl ToWire, out: &mut Outbox) -> Flow {
    let kind = kind.into();
    let packet = Packet::new(kind, fields);
    let mut cur = Cursor::new(&packet.payload);
    let flow = tracker.apply(kind, &mut cur, out).unwrap_or_else(|e| panic!("{kind}: {e}"));
    assert!(cur.is_empty(), "{kind} left {} bytes unread", cur.remaining());
    flow
}

pub(crate) fn try_apply<T: Tracker>(tracker: &mut T, kind: impl Into<PacketKind>, fields: impl ToWire) -> Result<Flow, TrackerError> {
    let kind = kind.into();
    let packet = Packet::new(kind, fields);
    let mut cur = Cursor::new(&packet.payload);
    tracker.apply(kind, &mut cur, &mut Outbox::new(false))
}

pub(crate) fn replay<T: Tracker>(tracker: &mut T, step: ReplayStep) -> Vec<Packet> {
    let mut out = Outbox::new(true);
    tracker.replay(step, &mut out);
    assert!(out.to_server.is_empty());
    out.to_client
}

pub(crate) fn cleanup<T: Tracker>(tracker: &mut T) -> Vec<Packet> {
    let mut out = Outbox::new(false);
    tracker.cleanup(&mut out);
    out.to_server
}

pub(crate) fn read<'a, T: crate::protocol::Wire<'a>>(packet: &'a Packet) -> T {
    let mut cur = Cursor::new(&packet.payload);
    let value = cur.read().unwrap();
    assert!(cur.is_empty());
    value
}

/// A `chunk_data` payload with one marker block in each section of `bitmask`.
pub(crate) fn chunk_payload(x: i32, z: i32, full: bool, bitmask: i32, skylight: bool) -> Vec<u8> {
    let mut data = vec![];
    for i in 0..world::SECTIONS {
        if bitmask & 1 << i != 0 {
            let mut section = Section::empty(skylight);
            section.blocks[i] = 1 + i as u16;
            section.encode(&mut data);
        }
    }
    if full {
        Each(&[1i32; world::BIOMES]).encode(&mut data);
    }
    let mut payload = vec![];
    (x, z, full, var(bitmask), &data, var(0)).encode(&mut payload);
    payload
}

/// One well-formed packet for every kind some tracker registers for, ordered
/// so that each reference points at something an earlier packet created.
pub(crate) fn samples() -> Vec<(Direction, Packet)> {
    use crate::protocol::encode::Raw;
    use crate::protocol::{Clientbound as C, Position, Serverbound as S};
    use super::player_list::Property;

    const ME: i32 = 1;
    const MOB: i32 = 2;
    let origin = V3::new(0.5f64, 64.0, 0.5);
    let still = V3::new(0i16, 0, 0);
    let block = Position(V3::new(1, 2, 3));
    let chunk = chunk_payload(0, 0, true, 0b1, true);
    let down = |kind: C, fields: &dyn Fn(&mut Vec<u8>)| {
        let mut payload = vec![];
        fields(&mut payload);
        (Direction::Clientbound, Packet { id: kind.id(), payload })
    };
    let up = |kind: S, fields: &dyn Fn(&mut Vec<u8>)| {
        let mut payload = vec![];
        fields(&mut payload);
        (Direction::Serverbound, Packet { id: kind.id(), payload })
    };

    vec![
        down(C::JoinGame, &|b| (ME, 0u8, 0i32, 2u8, 20u8, "default", false).encode(b)),
        down(C::Respawn, &|b| (0i32, 2u8, 0u8, "default").encode(b)),
        down(C::ServerDifficulty, &|b| 2u8.encode(b)),
        down(C::ChangeGameState, &|b| (2u8, 0f32).encode(b)),
        down(C::SpawnPosition, &|b| block.encode(b)),
        down(C::KeepAlive, &|b| 5i64.encode(b)),
        down(C::Tags, &|b| Raw(&[0, 0, 0]).encode(b)),
        down(C::DeclareRecipes, &|b| var(0).encode(b)),
        down(C::DeclareCommands, &|b| (var(1), 0u8, var(0), var(0)).encode(b)),
        down(C::PluginMessage, &|b| ("minecraft:brand", "vanilla").encode(b)),
        down(C::PlayerAbilities, &|b| (0u8, 0.05f32, 0.1f32).encode(b)),
        up(S::PlayerAbilities, &|b| (2u8, 0.05f32, 0.1f32).encode(b)),
        down(C::WindowItems, &|b| (0i8, 46i16, Each(vec![Slot::EMPTY; 46])).encode(b)),
        down(C::SetSlot, &|b| (0i8, 36i16, Slot { id: 1, count: 64, nbt: Nbt::NONE }).encode(b)),
        down(C::HeldItemChange, &|b| 1u8.encode(b)),
        up(S::HeldItemChange, &|b| 2i16.encode(b)),
        down(C::UnlockRecipes, &|b| (var(0), (false, false, false, false), vec!["minecraft:torch"], Vec::<&str>::new()).encode(b)),
        down(C::UpdateHealth, &|b| (20f32, var(20), 5f32).encode(b)),
        down(C::SetExperience, &|b| (0f32, var(0), var(0)).encode(b)),
        down(C::TimeUpdate, &|b| (0i64, 0i64).encode(b)),
        down(C::WorldBorder, &|b| (var(0), 100f64).encode(b)),
        down(C::ChunkData, &|b| Raw(&chunk).encode(b)),
        down(C::BlockChange, &|b| (block, var(5)).encode(b)),
        down(C::MultiBlockChange, &|b| (0i32, 0i32, var(1), 0x11u8, 2u8, var(3)).encode(b)),
        down(C::Explosion, &|b| (1f32, 1f32, 1f32, 2f32, 1i32, (0i8, 0i8, 0i8), (0f32, 0f32, 0f32)).encode(b)),
        down(C::UpdateBlockEntity, &|b| (block, 9u8, Nbt::NONE).encode(b)),
        down(C::BlockAction, &|b| (block, 1u8, 1u8, var(54)).encode(b)),
        down(C::SpawnObject, &|b| (var(3), Uuid(3), 2i8, origin, Angle(0), Angle(0), 1i32, still).encode(b)),
        down(C::SpawnExperienceOrb, &|b| (var(4), origin, 3i16).encode(b)),
        down(C::SpawnGlobalEntity, &|b| (var(5), 1i8, origin).encode(b)),
        down(C::SpawnMob, &|b| {
            (var(MOB), Uuid(2), var(29), origin, Angle(0), Angle(0), Angle(0), still, Metadata::default()).encode(b)
        }),
        down(C::SpawnPainting, &|b| (var(6), Uuid(6), var(1), block, 2u8).encode(b)),
        down(C::SpawnPlayer, &|b| (var(7), Uuid(7), origin, Angle(0), Angle(0), Metadata::default()).encode(b)),
        down(C::EntityTeleport, &|b| (var(MOB), origin, Angle(1), Angle(2), true).encode(b)),
        down(C::EntityRelativeMove, &|b| (var(MOB), V3::new(1i16, 2, 3), true).encode(b)),
        down(C::EntityLookAndRelativeMove, &|b| (var(MOB), still, Angle(3), Angle(4), false).encode(b)),
        down(C::EntityLook, &|b| (var(MOB), Angle(5), Angle(6), true).encode(b)),
        down(C::EntityVelocity, &|b| (var(MOB), V3::new(10i16, 0, -10)).encode(b)),
        down(C::EntityHeadLook, &|b| (var(MOB), Angle(7)).encode(b)),
        down(C::EntityMetadata, &|b| (var(MOB), Metadata::default()).encode(b)),
        down(C::EntityEffect, &|b| (var(MOB), 1i8, 0i8, var(10), 0i8).encode(b)),
        down(C::EntityEffect, &|b| (var(MOB), 5i8, 1i8, var(600), 2i8).encode(b)),
        down(C::RemoveEntityEffect, &|b| (var(MOB), 1i8).encode(b)),
        down(C::EntityEquipment, &|b| (var(MOB), var(0), Slot { id: 276, count: 1, nbt: Nbt::NONE }).encode(b)),
        down(C::SetPassengers, &|b| (var(MOB), vec![var(ME)]).encode(b)),
        down(C::AttachEntity, &|b| (MOB, -1i32).encode(b)),
        down(C::EntityProperties, &|b| (var(MOB), 0i32).encode(b)),
        down(C::UseBed, &|b| (var(ME), block).encode(b)),
        down(C::Animation, &|b| (var(ME), 2u8).encode(b)),
        down(C::PlayerPositionAndLook, &|b| (origin, 0f32, 0f32, 0u8, var(1)).encode(b)),
        down(C::VehicleMove, &|b| (origin, 90f32, 0f32).encode(b)),
        up(S::VehicleMove, &|b| (origin, 90f32, 0f32).encode(b)),
        up(S::Player, &|b| true.encode(b)),
        up(S::PlayerPosition, &|b| (origin, true).encode(b)),
        up(S::PlayerLook, &|b| (0f32, 0f32, true).encode(b)),
        up(S::PlayerPositionAndLook, &|b| (origin, 0f32, 0f32, true).encode(b)),
        up(S::EntityAction, &|b| (var(ME), var(0), var(0)).encode(b)),
        down(C::DestroyEntities, &|b| vec![var(MOB)].encode(b)),
        down(C::UnloadChunk, &|b| (0i32, 0i32).encode(b)),
        down(C::BossBar, &|b| (Uuid(1), var(0), Chat::text("boss"), 1f32, var(0), var(0), 0u8).encode(b)),
        down(C::ResourcePackSend, &|b| ("http://example.com/pack.zip", "0a1b").encode(b)),
        down(C::PlayerListItem, &|b| {
            (var(0), var(1), Uuid(7), "jeb_", Vec::<Property>::new(), var(0), var(10), None::<Chat>).encode(b)
        }),
        down(C::PlayerListHeaderFooter, &|b| (Chat::text("top"), Chat::text("bottom")).encode(b)),
        down(C::ChatMessage, &|b| (Chat::text("hi"), 0i8).encode(b)),
        up(S::ChatMessage, &|b| "hello".encode(b)),
    ]
}
