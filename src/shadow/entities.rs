//! Every entity the server has spawned for us, plus the proxy's own player.
//!
//! Replay happens in two passes. The first spawns each entity by kind, the
//! second attaches state that may point at other entities (passengers,
//! leashes) or that the spawn packet for that kind has no room for.
use std::collections::BTreeMap;

use crate::prelude::*;
use crate::protocol::encode::{Each, ToWire};
use crate::protocol::{var, Clientbound, Cursor, Packet, PacketKind, Position, Serverbound};
use super::{Flow, Outbox, ReplayStep, Tracker};

pub(super) const INTERESTS: &[PacketKind] = &[
    PacketKind::Clientbound(Clientbound::JoinGame),
    PacketKind::Clientbound(Clientbound::Respawn),
    PacketKind::Clientbound(Clientbound::SpawnObject),
    PacketKind::Clientbound(Clientbound::SpawnExperienceOrb),
    PacketKind::Clientbound(Clientbound::SpawnGlobalEntity),
    PacketKind::Clientbound(Clientbound::SpawnMob),
    PacketKind::Clientbound(Clientbound::SpawnPainting),
    PacketKind::Clientbound(Clientbound::SpawnPlayer),
    PacketKind::Clientbound(Clientbound::DestroyEntities),
    PacketKind::Clientbound(Clientbound::EntityTeleport),
    PacketKind::Clientbound(Clientbound::EntityRelativeMove),
    PacketKind::Clientbound(Clientbound::EntityLookAndRelativeMove),
    PacketKind::Clientbound(Clientbound::EntityLook),
    PacketKind::Clientbound(Clientbound::EntityVelocity),
    PacketKind::Clientbound(Clientbound::EntityHeadLook),
    PacketKind::Clientbound(Clientbound::EntityMetadata),
    PacketKind::Clientbound(Clientbound::EntityEffect),
    PacketKind::Clientbound(Clientbound::RemoveEntityEffect),
    PacketKind::Clientbound(Clientbound::EntityEquipment),
    PacketKind::Clientbound(Clientbound::SetPassengers),
    PacketKind::Clientbound(Clientbound::AttachEntity),
    PacketKind::Clientbound(Clientbound::EntityProperties),
    PacketKind::Clientbound(Clientbound::UseBed),
    PacketKind::Clientbound(Clientbound::Animation),
    PacketKind::Clientbound(Clientbound::PlayerPositionAndLook),
    PacketKind::Clientbound(Clientbound::VehicleMove),
    PacketKind::Serverbound(Serverbound::Player),
    PacketKind::Serverbound(Serverbound::PlayerPosition),
    PacketKind::Serverbound(Serverbound::PlayerLook),
    PacketKind::Serverbound(Serverbound::PlayerPositionAndLook),
    PacketKind::Serverbound(Serverbound::EntityAction),
    PacketKind::Serverbound(Serverbound::VehicleMove),
];

/// Relative moves are in 1/4096ths of a block.
const MOVE_SCALE: f64 = 4096.0;
const LEAVE_BED: u8 = 2;

pub mod action {
    pub const START_SNEAKING: i32 = 0;
    pub const STOP_SNEAKING: i32 = 1;
    pub const LEAVE_BED: i32 = 2;
    pub const START_SPRINTING: i32 = 3;
    pub const STOP_SPRINTING: i32 = 4;
    pub const START_HORSE_JUMP: i32 = 5;
    pub const STOP_HORSE_JUMP: i32 = 6;
}

/// The proxy's own player, as the server last saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: i32,
    pub position: V3<f64>,
    pub yaw: f32,
    pub pitch: f32,
    pub on_ground: bool,
    pub vehicle: Option<i32>,
    pub sneaking: bool,
    pub sprinting: bool,
    pub horse_jumping: bool,
    /// Set by the first server position, before which the server ignores movement.
    pub spawned: bool,
}
impl Default for Player {
    fn default() -> Self {
        Self {
            id: 0,
            position: V3::default(),
            yaw: 0.0,
            pitch: 0.0,
            on_ground: true,
            vehicle: None,
            sneaking: false,
            sprinting: false,
            horse_jumping: false,
            spawned: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    /// The proxy's own player entity. Never spawned on replay.
    Client,
    Player { uuid: Uuid },
    Mob { uuid: Uuid, mob_type: i32, head_pitch: Angle },
    Object { uuid: Uuid, object_type: i8, data: i32 },
    Painting { uuid: Uuid, motive: i32, location: V3<i32>, direction: u8 },
    Global { global_type: i8 },
    ExperienceOrb { count: i16 },
}
impl EntityKind {
    fn spawn_carries_metadata(&self) -> bool {
        matches!(self, EntityKind::Player { .. } | EntityKind::Mob { .. })
    }
    fn spawn_carries_velocity(&self) -> bool {
        matches!(self, EntityKind::Mob { .. } | EntityKind::Object { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Effect {
    pub amplifier: i8,
    pub duration: i32,
    pub flags: i8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Modifier {
    pub uuid: Uuid,
    pub amount: f64,
    pub operation: i8,
}
impl ToWire for Modifier {
    fn encode(&self, buf: &mut Vec<u8>) {
        (self.uuid, self.amount, self.operation).encode(buf)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub value: f64,
    pub modifiers: Vec<Modifier>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub kind: EntityKind,
    pub position: V3<f64>,
    pub yaw: Angle,
    pub pitch: Angle,
    pub head_yaw: Option<Angle>,
    pub velocity: V3<i16>,
    pub metadata: Metadata,
    /// Non-empty equipment slots only.
    pub equipment: BTreeMap<i32, Slot>,
    pub effects: BTreeMap<i8, Effect>,
    pub properties: BTreeMap<String, Attribute>,
    pub passengers: Vec<i32>,
    /// Entity holding this one's leash.
    pub attached: Option<i32>,
    pub bed: Option<V3<i32>>,
}
impl Entity {
    pub fn new(kind: EntityKind, position: V3<f64>) -> Self {
        Self {
            kind,
            position,
            yaw: Angle::default(),
            pitch: Angle::default(),
            head_yaw: None,
            velocity: V3::default(),
            metadata: Metadata::default(),
            equipment: BTreeMap::new(),
            effects: BTreeMap::new(),
            properties: BTreeMap::new(),
            passengers: vec![],
            attached: None,
            bed: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Entities {
    pub player: Player,
    pub dimension: i32,
    pub entities: BTreeMap<i32, Entity>,
}

impl Entities {
    fn get(&mut self, id: i32) -> Result<&mut Entity, TrackerError> {
        self.entities.get_mut(&id).ok_or(TrackerError::MissingEntity(id))
    }

    fn spawn(&mut self, id: i32, entity: Entity) {
        if self.entities.insert(id, entity).is_some() {
            log::debug!("entity {id} respawned without being destroyed");
        }
    }

    fn reset(&mut self, player_id: i32) {
        self.player = Player { id: player_id, ..Default::default() };
        self.entities.clear();
        self.entities.insert(player_id, Entity::new(EntityKind::Client, V3::default()));
    }

    fn apply_clientbound(&mut self, kind: Clientbound, cur: &mut Cursor, out: &mut Outbox) -> Result<(), TrackerError> {
        match kind {
            Clientbound::JoinGame => {
                let (id, _gamemode, dimension): (i32, u8, i32) = cur.read()?;
                cur.discard();
                self.reset(id);
                self.dimension = dimension;
            }
            Clientbound::Respawn => {
                let dimension: i32 = cur.read()?;
                cur.discard();
                if dimension != self.dimension {
                    let own = self.player.id;
                    self.entities.retain(|&id, _| id == own);
                }
                self.dimension = dimension;
                self.player.vehicle = None;
            }
            Clientbound::SpawnObject => {
                let (var(id), uuid, object_type, position, pitch, yaw, data, velocity): (
                    var<i32>,
                    Uuid,
                    i8,
                    V3<f64>,
                    Angle,
                    Angle,
                    i32,
                    V3<i16>,
                ) = cur.read()?;
                let entity = Entity { pitch, yaw, velocity, ..Entity::new(EntityKind::Object { uuid, object_type, data }, position) };
                self.spawn(id, entity);
            }
            Clientbound::SpawnExperienceOrb => {
                let (var(id), position, count): (var<i32>, V3<f64>, i16) = cur.read()?;
                self.spawn(id, Entity::new(EntityKind::ExperienceOrb { count }, position));
            }
            Clientbound::SpawnGlobalEntity => {
                let (var(id), global_type, position): (var<i32>, i8, V3<f64>) = cur.read()?;
                self.spawn(id, Entity::new(EntityKind::Global { global_type }, position));
            }
            Clientbound::SpawnMob => {
                let (var(id), uuid, var(mob_type), position, yaw, pitch, head_pitch, velocity): (
                    var<i32>,
                    Uuid,
                    var<i32>,
                    V3<f64>,
                    Angle,
                    Angle,
                    Angle,
                    V3<i16>,
                ) = cur.read()?;
                let metadata: Metadata = cur.read()?;
                let kind = EntityKind::Mob { uuid, mob_type, head_pitch };
                self.spawn(id, Entity { yaw, pitch, velocity, metadata, ..Entity::new(kind, position) });
            }
            Clientbound::SpawnPainting => {
                let (var(id), uuid, var(motive), Position(location), direction): (var<i32>, Uuid, var<i32>, Position, u8) =
                    cur.read()?;
                let position = V3::new(location.x as f64, location.y as f64, location.z as f64);
                self.spawn(id, Entity::new(EntityKind::Painting { uuid, motive, location, direction }, position));
            }
            Clientbound::SpawnPlayer => {
                let (var(id), uuid, position, yaw, pitch, metadata): (var<i32>, Uuid, V3<f64>, Angle, Angle, Metadata) =
                    cur.read()?;
                self.spawn(id, Entity { yaw, pitch, metadata, ..Entity::new(EntityKind::Player { uuid }, position) });
            }
            Clientbound::DestroyEntities => {
                for _ in 0..cur.count()? {
                    let id = cur.varint()?;
                    if self.entities.remove(&id).is_none() {
                        log::warn!("{}", TrackerError::MissingEntity(id));
                    }
                    if self.player.vehicle == Some(id) {
                        self.player.vehicle = None;
                    }
                }
            }
            Clientbound::EntityTeleport => {
                let (var(id), position, yaw, pitch, _on_ground): (var<i32>, V3<f64>, Angle, Angle, bool) = cur.read()?;
                let entity = self.get(id)?;
                entity.position = position;
                entity.yaw = yaw;
                entity.pitch = pitch;
            }
            Clientbound::EntityRelativeMove => {
                let (var(id), delta, _on_ground): (var<i32>, V3<i16>, bool) = cur.read()?;
                self.get(id)?.shift(delta);
            }
            Clientbound::EntityLookAndRelativeMove => {
                let (var(id), delta, yaw, pitch, _on_ground): (var<i32>, V3<i16>, Angle, Angle, bool) = cur.read()?;
                let entity = self.get(id)?;
                entity.shift(delta);
                entity.yaw = yaw;
                entity.pitch = pitch;
            }
            Clientbound::EntityLook => {
                let (var(id), yaw, pitch, _on_ground): (var<i32>, Angle, Angle, bool) = cur.read()?;
                let entity = self.get(id)?;
                entity.yaw = yaw;
                entity.pitch = pitch;
            }
            Clientbound::EntityVelocity => {
                let (var(id), velocity): (var<i32>, V3<i16>) = cur.read()?;
                self.get(id)?.velocity = velocity;
            }
            Clientbound::EntityHeadLook => {
                let (var(id), head_yaw): (var<i32>, Angle) = cur.read()?;
                self.get(id)?.head_yaw = Some(head_yaw);
            }
            Clientbound::EntityMetadata => {
                let (var(id), update): (var<i32>, Metadata) = cur.read()?;
                self.get(id)?.metadata.merge(update);
            }
            Clientbound::EntityEffect => {
                let (var(id), effect, amplifier, var(duration), flags): (var<i32>, i8, i8, var<i32>, i8) = cur.read()?;
                self.get(id)?.effects.insert(effect, Effect { amplifier, duration, flags });
            }
            Clientbound::RemoveEntityEffect => {
                let (var(id), effect): (var<i32>, i8) = cur.read()?;
                self.get(id)?.effects.remove(&effect).ok_or(TrackerError::MissingEffect { entity: id, effect })?;
            }
            Clientbound::EntityEquipment => {
                let (var(id), var(slot), item): (var<i32>, var<i32>, Slot) = cur.read()?;
                let equipment = &mut self.get(id)?.equipment;
                if item.is_empty() {
                    equipment.remove(&slot);
                } else {
                    equipment.insert(slot, item);
                }
            }
            Clientbound::SetPassengers => {
                let id = cur.varint()?;
                let mut passengers = Vec::new();
                for _ in 0..cur.count()? {
                    passengers.push(cur.varint()?);
                }
                if passengers.contains(&self.player.id) {
                    self.player.vehicle = Some(id);
                } else if self.player.vehicle == Some(id) {
                    self.player.vehicle = None;
                }
                self.get(id)?.passengers = passengers;
            }
            Clientbound::AttachEntity => {
                let (id, holder): (i32, i32) = cur.read()?;
                self.get(id)?.attached = (holder != -1).then_some(holder);
            }
            Clientbound::EntityProperties => {
                let id = cur.varint()?;
                let count: i32 = cur.read()?;
                let mut properties = Vec::new();
                for _ in 0..count.max(0) {
                    let (key, value): (String, f64) = cur.read()?;
                    let mut modifiers = Vec::new();
                    for _ in 0..cur.count()? {
                        let (uuid, amount, operation): (Uuid, f64, i8) = cur.read()?;
                        modifiers.push(Modifier { uuid, amount, operation });
                    }
                    properties.push((key, Attribute { value, modifiers }));
                }
                self.get(id)?.properties.extend(properties);
            }
            Clientbound::UseBed => {
                let (var(id), Position(bed)): (var<i32>, Position) = cur.read()?;
                self.get(id)?.bed = Some(bed);
            }
            Clientbound::Animation => {
                let (var(id), animation): (var<i32>, u8) = cur.read()?;
                if animation == LEAVE_BED {
                    self.get(id)?.bed = None;
                }
            }
            Clientbound::PlayerPositionAndLook => {
                let (position, yaw, pitch, flags, var(teleport)): (V3<f64>, f32, f32, u8, var<i32>) = cur.read()?;
                let p = &mut self.player;
                let rel = |bit: u8, old: f64, new: f64| if flags & bit != 0 { old + new } else { new };
                p.position = V3::new(
                    rel(0x01, p.position.x, position.x),
                    rel(0x02, p.position.y, position.y),
                    rel(0x04, p.position.z, position.z),
                );
                p.yaw = rel(0x08, p.yaw as f64, yaw as f64) as f32;
                p.pitch = rel(0x10, p.pitch as f64, pitch as f64) as f32;
                if !out.attached() {
                    out.server(Packet::new(Serverbound::TeleportConfirm, var(teleport)));
                }
                if !p.spawned {
                    log::debug!("player {} spawned at {:?}", p.id, p.position);
                    p.spawned = true;
                }
            }
            Clientbound::VehicleMove => {
                let (position, yaw, pitch): (V3<f64>, f32, f32) = cur.read()?;
                self.move_vehicle(position, yaw, pitch)?;
            }
            _ => cur.discard(),
        }
        Ok(())
    }

    fn apply_serverbound(&mut self, kind: Serverbound, cur: &mut Cursor) -> Result<(), TrackerError> {
        let p = &mut self.player;
        match kind {
            Serverbound::Player => p.on_ground = cur.read()?,
            Serverbound::PlayerPosition => {
                let (position, on_ground): (V3<f64>, bool) = cur.read()?;
                p.position = position;
                p.on_ground = on_ground;
            }
            Serverbound::PlayerLook => {
                let (yaw, pitch, on_ground): (f32, f32, bool) = cur.read()?;
                p.yaw = yaw;
                p.pitch = pitch;
                p.on_ground = on_ground;
            }
            Serverbound::PlayerPositionAndLook => {
                let (position, yaw, pitch, on_ground): (V3<f64>, f32, f32, bool) = cur.read()?;
                p.position = position;
                p.yaw = yaw;
                p.pitch = pitch;
                p.on_ground = on_ground;
            }
            Serverbound::EntityAction => {
                let (var(_id), var(id), var(_jump_boost)): (var<i32>, var<i32>, var<i32>) = cur.read()?;
                match id {
                    action::START_SNEAKING => p.sneaking = true,
                    action::STOP_SNEAKING => p.sneaking = false,
                    action::LEAVE_BED => {
                        let own = p.id;
                        if let Some(entity) = self.entities.get_mut(&own) {
                            entity.bed = None;
                        }
                    }
                    action::START_SPRINTING => p.sprinting = true,
                    action::STOP_SPRINTING => p.sprinting = false,
                    action::START_HORSE_JUMP => p.horse_jumping = true,
                    action::STOP_HORSE_JUMP => p.horse_jumping = false,
                    _ => {}
                }
            }
            Serverbound::VehicleMove => {
                let (position, yaw, pitch): (V3<f64>, f32, f32) = cur.read()?;
                self.move_vehicle(position, yaw, pitch)?;
            }
            _ => cur.discard(),
        }
        Ok(())
    }

    fn move_vehicle(&mut self, position: V3<f64>, yaw: f32, pitch: f32) -> Result<(), TrackerError> {
        let id = self.player.vehicle.ok_or(TrackerError::NoVehicle)?;
        let vehicle = self.get(id)?;
        vehicle.position = position;
        vehicle.yaw = Angle::from_degrees(yaw);
        vehicle.pitch = Angle::from_degrees(pitch);
        let p = &mut self.player;
        p.position = position;
        p.yaw = yaw;
        p.pitch = pitch;
        Ok(())
    }

    fn replay_spawns(&self, out: &mut Outbox) {
        for (&id, e) in &self.entities {
            let packet = match &e.kind {
                EntityKind::Client => continue,
                EntityKind::Player { uuid } => {
                    Packet::new(Clientbound::SpawnPlayer, (var(id), uuid, e.position, e.yaw, e.pitch, &e.metadata))
                }
                EntityKind::Mob { uuid, mob_type, head_pitch } => Packet::new(
                    Clientbound::SpawnMob,
                    (var(id), uuid, var(*mob_type), e.position, e.yaw, e.pitch, head_pitch, e.velocity, &e.metadata),
                ),
                EntityKind::Object { uuid, object_type, data } => Packet::new(
                    Clientbound::SpawnObject,
                    (var(id), uuid, object_type, e.position, e.pitch, e.yaw, data, e.velocity),
                ),
                EntityKind::Painting { uuid, motive, location, direction } => Packet::new(
                    Clientbound::SpawnPainting,
                    (var(id), uuid, var(*motive), Position(*location), direction),
                ),
                EntityKind::Global { global_type } => {
                    Packet::new(Clientbound::SpawnGlobalEntity, (var(id), global_type, e.position))
                }
                EntityKind::ExperienceOrb { count } => {
                    Packet::new(Clientbound::SpawnExperienceOrb, (var(id), e.position, count))
                }
            };
            out.client(packet);
        }
    }

    fn replay_state(&self, out: &mut Outbox) {
        for (&id, e) in &self.entities {
            if !e.kind.spawn_carries_metadata() && !e.metadata.is_empty() {
                out.client(Packet::new(Clientbound::EntityMetadata, (var(id), &e.metadata)));
            }
            if !e.kind.spawn_carries_velocity() && e.velocity != V3::default() {
                out.client(Packet::new(Clientbound::EntityVelocity, (var(id), e.velocity)));
            }
            for (slot, item) in &e.equipment {
                out.client(Packet::new(Clientbound::EntityEquipment, (var(id), var(*slot), item)));
            }
            for (effect, fx) in &e.effects {
                out.client(Packet::new(
                    Clientbound::EntityEffect,
                    (var(id), effect, fx.amplifier, var(fx.duration), fx.flags),
                ));
            }
            if !e.properties.is_empty() {
                let properties = e
                    .properties
                    .iter()
                    .map(|(key, attr)| (key, attr.value, &attr.modifiers));
                out.client(Packet::new(
                    Clientbound::EntityProperties,
                    (var(id), e.properties.len() as i32, Each(properties)),
                ));
            }
            if !e.passengers.is_empty() {
                let passengers: Vec<var<i32>> = e.passengers.iter().map(|&p| var(p)).collect();
                out.client(Packet::new(Clientbound::SetPassengers, (var(id), passengers)));
            }
            if let Some(holder) = e.attached {
                out.client(Packet::new(Clientbound::AttachEntity, (id, holder)));
            }
            if let Some(bed) = e.bed {
                out.client(Packet::new(Clientbound::UseBed, (var(id), Position(bed))));
            }
            if let Some(head_yaw) = e.head_yaw {
                out.client(Packet::new(Clientbound::EntityHeadLook, (var(id), head_yaw)));
            }
        }
    }
}

impl Entity {
    fn shift(&mut self, delta: V3<i16>) {
        self.position.x += delta.x as f64 / MOVE_SCALE;
        self.position.y += delta.y as f64 / MOVE_SCALE;
        self.position.z += delta.z as f64 / MOVE_SCALE;
    }
}

impl Tracker for Entities {
    fn apply(&mut self, kind: PacketKind, cur: &mut Cursor, out: &mut Outbox) -> Result<Flow, TrackerError> {
        match kind {
            PacketKind::Clientbound(kind) => self.apply_clientbound(kind, cur, out)?,
            PacketKind::Serverbound(kind) => self.apply_serverbound(kind, cur)?,
        }
        Ok(Flow::Forward)
    }

    fn replay(&mut self, step: ReplayStep, out: &mut Outbox) {
        match step {
            ReplayStep::EntitySpawns => self.replay_spawns(out),
            ReplayStep::EntityState => self.replay_state(out),
            ReplayStep::PlayerPosition => {
                let p = &self.player;
                // absolute on every axis; teleport id 0 is confirmed by the client and ignored upstream
                out.client(Packet::new(
                    Clientbound::PlayerPositionAndLook,
                    (p.position, p.yaw, p.pitch, 0u8, var(0)),
                ));
            }
            _ => {}
        }
    }

    fn cleanup(&mut self, out: &mut Outbox) {
        let p = &mut self.player;
        for (held, release) in [
            (&mut p.sneaking, action::STOP_SNEAKING),
            (&mut p.sprinting, action::STOP_SPRINTING),
            (&mut p.horse_jumping, action::STOP_HORSE_JUMP),
        ] {
            if *held {
                out.server(Packet::new(Serverbound::EntityAction, (var(p.id), var(release), var(0))));
                *held = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode::Raw;
    use crate::shadow::testkit;

    const ME: i32 = 10;
    const ZOMBIE: i32 = 20;
    const HORSE: i32 = 30;

    fn joined() -> Entities {
        let mut entities = Entities::default();
        testkit::apply(&mut entities, Clientbound::JoinGame, (ME, 0u8, 0i32, 2u8, 20u8, "default", false));
        entities
    }

    fn with_zombie() -> Entities {
        let mut entities = joined();
        let mut meta = Metadata::default();
        meta.0.insert(0, MetaEntry { kind: 0, raw: vec![0] });
        testkit::apply(
            &mut entities,
            Clientbound::SpawnMob,
            (
                var(ZOMBIE),
                Uuid(99),
                var(54),
                V3::new(1.5f64, 64.0, -2.5),
                Angle(10),
                Angle(0),
                Angle(10),
                V3::new(0i16, 0, 0),
                meta,
            ),
        );
        entities
    }

    #[test]
    fn relative_moves_are_fixed_point() {
        let mut entities = with_zombie();
        testkit::apply(&mut entities, Clientbound::EntityRelativeMove, (var(ZOMBIE), V3::new(4096i16, -2048, 1024), true));
        assert_eq!(entities.entities[&ZOMBIE].position, V3::new(2.5, 63.5, -2.25));
    }

    #[test]
    fn missing_entity_is_reported() {
        let mut entities = joined();
        let err = testkit::try_apply(&mut entities, Clientbound::EntityVelocity, (var(77), V3::new(1i16, 2, 3)));
        assert!(matches!(err, Err(TrackerError::MissingEntity(77))));
    }

    #[test]
    fn equipment_drops_empty_slots() {
        let mut entities = with_zombie();
        let helmet = Slot { id: 300, count: 1, nbt: Nbt::NONE };
        testkit::apply(&mut entities, Clientbound::EntityEquipment, (var(ZOMBIE), var(5), &helmet));
        assert_eq!(entities.entities[&ZOMBIE].equipment[&5], helmet);
        testkit::apply(&mut entities, Clientbound::EntityEquipment, (var(ZOMBIE), var(5), Slot::EMPTY));
        assert!(entities.entities[&ZOMBIE].equipment.is_empty());
    }

    #[test]
    fn effects_come_and_go() {
        let mut entities = with_zombie();
        testkit::apply(&mut entities, Clientbound::EntityEffect, (var(ZOMBIE), 1i8, 0i8, var(600), 0i8));
        testkit::apply(&mut entities, Clientbound::RemoveEntityEffect, (var(ZOMBIE), 1i8));
        let err = testkit::try_apply(&mut entities, Clientbound::RemoveEntityEffect, (var(ZOMBIE), 1i8));
        assert!(matches!(err, Err(TrackerError::MissingEffect { entity: ZOMBIE, effect: 1 })));
    }

    #[test]
    fn riding_follows_passengers() {
        let mut entities = joined();
        testkit::apply(
            &mut entities,
            Clientbound::SpawnMob,
            (var(HORSE), Uuid(5), var(29), V3::new(0f64, 64.0, 0.0), Angle(0), Angle(0), Angle(0), V3::new(0i16, 0, 0), Metadata::default()),
        );
        testkit::apply(&mut entities, Clientbound::SetPassengers, (var(HORSE), vec![var(ME)]));
        assert_eq!(entities.player.vehicle, Some(HORSE));

        testkit::apply(&mut entities, Serverbound::VehicleMove, (V3::new(3.0f64, 65.0, 1.0), 90f32, 0f32));
        assert_eq!(entities.entities[&HORSE].position, V3::new(3.0, 65.0, 1.0));
        assert_eq!(entities.player.position, V3::new(3.0, 65.0, 1.0));

        testkit::apply(&mut entities, Clientbound::SetPassengers, (var(HORSE), Vec::<var<i32>>::new()));
        assert_eq!(entities.player.vehicle, None);
        let err = testkit::try_apply(&mut entities, Serverbound::VehicleMove, (V3::new(0f64, 0.0, 0.0), 0f32, 0f32));
        assert!(matches!(err, Err(TrackerError::NoVehicle)));
    }

    #[test]
    fn server_teleport_honours_relative_flags() {
        let mut entities = joined();
        testkit::apply(&mut entities, Serverbound::PlayerPosition, (V3::new(10.0f64, 70.0, 10.0), true));
        let out = testkit::apply(
            &mut entities,
            Clientbound::PlayerPositionAndLook,
            (V3::new(1.0f64, 0.0, 5.0), 45f32, 0f32, 0x01u8 | 0x02, var(7)),
        );
        assert_eq!(entities.player.position, V3::new(11.0, 70.0, 5.0));
        assert!(entities.player.spawned);
        assert_eq!(out.to_server, vec![Packet::new(Serverbound::TeleportConfirm, var(7))]);
    }

    #[test]
    fn dimension_change_keeps_only_self() {
        let mut entities = with_zombie();
        testkit::apply(&mut entities, Clientbound::Respawn, (0i32, 0u8, 0u8, "default"));
        assert!(entities.entities.contains_key(&ZOMBIE));
        testkit::apply(&mut entities, Clientbound::Respawn, (-1i32, 0u8, 0u8, "default"));
        assert_eq!(entities.entities.keys().collect::<Vec<_>>(), [&ME]);
    }

    #[test]
    fn cleanup_releases_only_held_actions() {
        let mut entities = joined();
        testkit::apply(&mut entities, Serverbound::EntityAction, (var(ME), var(action::START_SNEAKING), var(0)));
        let sent = testkit::cleanup(&mut entities);
        assert_eq!(sent, vec![Packet::new(Serverbound::EntityAction, (var(ME), var(action::STOP_SNEAKING), var(0)))]);
        assert!(!entities.player.sneaking);
        assert!(testkit::cleanup(&mut entities).is_empty());
    }

    #[test]
    fn replay_rebuilds_every_kind() {
        let mut entities = with_zombie();
        let ops: Vec<(Clientbound, Vec<u8>)> = vec![
            (Clientbound::SpawnPlayer, encode((var(21), Uuid(7), V3::new(0.0f64, 1.0, 2.0), Angle(3), Angle(4), Metadata::default()))),
            (Clientbound::SpawnObject, encode((var(22), Uuid(8), 2i8, V3::new(5.0f64, 6.0, 7.0), Angle(1), Angle(2), 1i32, V3::new(1i16, 2, 3)))),
            (Clientbound::SpawnPainting, encode((var(23), Uuid(9), var(4), Position(V3::new(1, 2, 3)), 2u8))),
            (Clientbound::SpawnGlobalEntity, encode((var(24), 1i8, V3::new(9.0f64, 9.0, 9.0)))),
            (Clientbound::SpawnExperienceOrb, encode((var(25), V3::new(0.5f64, 0.5, 0.5), 7i16))),
            (Clientbound::EntityVelocity, encode((var(21), V3::new(-1i16, 0, 1)))),
            (Clientbound::EntityHeadLook, encode((var(ZOMBIE), Angle(50)))),
            (Clientbound::EntityEquipment, encode((var(ZOMBIE), var(0), Slot { id: 1, count: 1, nbt: Nbt::NONE }))),
            (Clientbound::EntityEffect, encode((var(ZOMBIE), 5i8, 1i8, var(100), 2i8))),
            (
                Clientbound::EntityProperties,
                encode((var(ZOMBIE), 1i32, "generic.movementSpeed", 0.23f64, vec![Modifier { uuid: Uuid(3), amount: 0.1, operation: 1 }])),
            ),
            (Clientbound::SetPassengers, encode((var(22), vec![var(ZOMBIE)]))),
            (Clientbound::AttachEntity, encode((ZOMBIE, 21i32))),
            (Clientbound::UseBed, encode((var(21), Position(V3::new(4, 64, 4))))),
            (Clientbound::EntityMetadata, encode((var(22), {
                let mut m = Metadata::default();
                m.0.insert(6, MetaEntry { kind: 7, raw: vec![1] });
                m
            }))),
            (Clientbound::EntityMetadata, encode((var(ME), {
                let mut m = Metadata::default();
                m.0.insert(13, MetaEntry { kind: 0, raw: vec![0x7f] });
                m
            }))),
        ];
        for (kind, payload) in &ops {
            testkit::apply(&mut entities, *kind, Raw(payload));
        }

        let mut mirror = joined();
        for step in [ReplayStep::EntitySpawns, ReplayStep::EntityState] {
            for packet in testkit::replay(&mut entities, step) {
                let kind = packet.kind(Direction::Clientbound).unwrap();
                testkit::apply(&mut mirror, kind, Raw(&packet.payload));
            }
        }
        assert_eq!(mirror.entities, entities.entities);
    }

    fn encode(fields: impl ToWire) -> Vec<u8> {
        let mut buf = vec![];
        fields.encode(&mut buf);
        buf
    }
}
