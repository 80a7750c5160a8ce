//! Play-state packet ids for protocol 404 (1.13.2).
//!
//! Only packets some part of the proxy reads or writes are named; everything
//! else travels through as an opaque id and payload.
use crate::prelude::*;
use super::encode::ToWire;

macro_rules! packets {
    {$($dir:ident { $($name:ident = $id:literal $wire:literal,)* })*} => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            pub enum $dir {
                $($name,)*
            }
            impl $dir {
                pub const ALL: &'static [$dir] = &[$($dir::$name,)*];
                pub fn id(self) -> i32 {
                    match self {
                        $($dir::$name => $id,)*
                    }
                }
                pub fn from_id(id: i32) -> Option<Self> {
                    match id {
                        $($id => Some($dir::$name),)*
                        _ => None,
                    }
                }
                pub fn name(self) -> &'static str {
                    match self {
                        $($dir::$name => $wire,)*
                    }
                }
            }
        )*
    };
}

packets! {
    Clientbound {
        SpawnObject = 0x00 "spawn_object",
        SpawnExperienceOrb = 0x01 "spawn_experience_orb",
        SpawnGlobalEntity = 0x02 "spawn_global_entity",
        SpawnMob = 0x03 "spawn_mob",
        SpawnPainting = 0x04 "spawn_painting",
        SpawnPlayer = 0x05 "spawn_player",
        Animation = 0x06 "animation",
        UpdateBlockEntity = 0x09 "update_block_entity",
        BlockAction = 0x0A "block_action",
        BlockChange = 0x0B "block_change",
        BossBar = 0x0C "boss_bar",
        ServerDifficulty = 0x0D "server_difficulty",
        ChatMessage = 0x0E "chat_message",
        MultiBlockChange = 0x0F "multi_block_change",
        DeclareCommands = 0x11 "declare_commands",
        WindowItems = 0x15 "window_items",
        SetSlot = 0x17 "set_slot",
        PluginMessage = 0x19 "plugin_message",
        Disconnect = 0x1B "disconnect",
        Explosion = 0x1E "explosion",
        UnloadChunk = 0x1F "unload_chunk",
        ChangeGameState = 0x20 "change_game_state",
        KeepAlive = 0x21 "keep_alive",
        ChunkData = 0x22 "chunk_data",
        JoinGame = 0x25 "join_game",
        EntityRelativeMove = 0x28 "entity_relative_move",
        EntityLookAndRelativeMove = 0x29 "entity_look_and_relative_move",
        EntityLook = 0x2A "entity_look",
        VehicleMove = 0x2B "vehicle_move",
        PlayerAbilities = 0x2E "player_abilities",
        PlayerListItem = 0x30 "player_list_item",
        PlayerPositionAndLook = 0x32 "player_position_and_look",
        UseBed = 0x33 "use_bed",
        UnlockRecipes = 0x34 "unlock_recipes",
        DestroyEntities = 0x35 "destroy_entities",
        RemoveEntityEffect = 0x36 "remove_entity_effect",
        ResourcePackSend = 0x37 "resource_pack_send",
        Respawn = 0x38 "respawn",
        EntityHeadLook = 0x39 "entity_head_look",
        WorldBorder = 0x3B "world_border",
        HeldItemChange = 0x3D "held_item_change",
        EntityMetadata = 0x3F "entity_metadata",
        AttachEntity = 0x40 "attach_entity",
        EntityVelocity = 0x41 "entity_velocity",
        EntityEquipment = 0x42 "entity_equipment",
        SetExperience = 0x43 "set_experience",
        UpdateHealth = 0x44 "update_health",
        SetPassengers = 0x46 "set_passengers",
        SpawnPosition = 0x49 "spawn_position",
        TimeUpdate = 0x4A "time_update",
        PlayerListHeaderFooter = 0x4E "player_list_header_footer",
        EntityTeleport = 0x50 "entity_teleport",
        EntityProperties = 0x52 "entity_properties",
        EntityEffect = 0x53 "entity_effect",
        DeclareRecipes = 0x54 "declare_recipes",
        Tags = 0x55 "tags",
    }
    Serverbound {
        TeleportConfirm = 0x00 "teleport_confirm",
        ChatMessage = 0x02 "chat_message",
        KeepAlive = 0x0E "keep_alive",
        Player = 0x0F "player",
        PlayerPosition = 0x10 "player_position",
        PlayerPositionAndLook = 0x11 "player_position_and_look",
        PlayerLook = 0x12 "player_look",
        VehicleMove = 0x13 "vehicle_move",
        PlayerAbilities = 0x17 "player_abilities",
        EntityAction = 0x19 "entity_action",
        SteerVehicle = 0x1A "steer_vehicle",
        HeldItemChange = 0x21 "held_item_change",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketKind {
    Clientbound(Clientbound),
    Serverbound(Serverbound),
}
impl PacketKind {
    pub fn lookup(direction: Direction, id: i32) -> Option<Self> {
        match direction {
            Direction::Clientbound => Clientbound::from_id(id).map(Self::Clientbound),
            Direction::Serverbound => Serverbound::from_id(id).map(Self::Serverbound),
        }
    }
    pub fn direction(self) -> Direction {
        match self {
            Self::Clientbound(_) => Direction::Clientbound,
            Self::Serverbound(_) => Direction::Serverbound,
        }
    }
    pub fn id(self) -> i32 {
        match self {
            Self::Clientbound(p) => p.id(),
            Self::Serverbound(p) => p.id(),
        }
    }
    pub fn name(self) -> &'static str {
        match self {
            Self::Clientbound(p) => p.name(),
            Self::Serverbound(p) => p.name(),
        }
    }
}
impl From<Clientbound> for PacketKind {
    fn from(p: Clientbound) -> Self {
        Self::Clientbound(p)
    }
}
impl From<Serverbound> for PacketKind {
    fn from(p: Serverbound) -> Self {
        Self::Serverbound(p)
    }
}
impl std::fmt::Display for PacketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dir = match self.direction() {
            Direction::Clientbound => "downstream",
            Direction::Serverbound => "upstream",
        };
        write!(f, "{dir} {}", self.name())
    }
}

/// One play-state packet: id plus undecoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub id: i32,
    pub payload: Vec<u8>,
}
impl Packet {
    pub fn new(kind: impl Into<PacketKind>, fields: impl ToWire) -> Self {
        let mut payload = vec![];
        fields.encode(&mut payload);
        Self { id: kind.into().id(), payload }
    }
    pub fn kind(&self, direction: Direction) -> Option<PacketKind> {
        PacketKind::lookup(direction, self.id)
    }
}
