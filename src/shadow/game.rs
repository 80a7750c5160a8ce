//! World-level facts: the join parameters, difficulty, weather, spawn point,
//! and the registries (tags, recipes, commands) the client needs before play.
use crate::prelude::*;
use crate::protocol::encode::Raw;
use crate::protocol::{Clientbound, Cursor, Packet, PacketKind, Position, Serverbound};
use super::{Flow, Outbox, ReplayStep, Tracker};

pub(super) const INTERESTS: &[PacketKind] = &[
    PacketKind::Clientbound(Clientbound::JoinGame),
    PacketKind::Clientbound(Clientbound::Respawn),
    PacketKind::Clientbound(Clientbound::ServerDifficulty),
    PacketKind::Clientbound(Clientbound::ChangeGameState),
    PacketKind::Clientbound(Clientbound::SpawnPosition),
    PacketKind::Clientbound(Clientbound::KeepAlive),
    PacketKind::Clientbound(Clientbound::Tags),
    PacketKind::Clientbound(Clientbound::DeclareRecipes),
    PacketKind::Clientbound(Clientbound::DeclareCommands),
];

mod reason {
    pub const END_RAINING: u8 = 1;
    pub const BEGIN_RAINING: u8 = 2;
    pub const CHANGE_GAMEMODE: u8 = 3;
    pub const RAIN_LEVEL: u8 = 7;
    pub const THUNDER_LEVEL: u8 = 8;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Game {
    pub entity_id: i32,
    /// Game mode with the hardcore flag in bit 3.
    pub gamemode: u8,
    pub dimension: i32,
    pub difficulty: u8,
    pub max_players: u8,
    pub level_type: String,
    pub reduced_debug_info: bool,
    pub spawn: V3<i32>,
    pub raining: bool,
    pub rain_level: f32,
    pub thunder_level: f32,
    // registries are kept verbatim; only the server interprets them
    pub tags: Option<Vec<u8>>,
    pub recipes: Option<Vec<u8>>,
    pub commands: Option<Vec<u8>>,
}
impl Default for Game {
    fn default() -> Self {
        Self {
            entity_id: 0,
            gamemode: 0,
            dimension: 0,
            difficulty: 0,
            max_players: 0,
            level_type: "default".into(),
            reduced_debug_info: false,
            spawn: V3::default(),
            raining: false,
            rain_level: 0.0,
            thunder_level: 0.0,
            tags: None,
            recipes: None,
            commands: None,
        }
    }
}

impl Tracker for Game {
    fn apply(&mut self, kind: PacketKind, cur: &mut Cursor, out: &mut Outbox) -> Result<Flow, TrackerError> {
        let PacketKind::Clientbound(kind) = kind else {
            cur.discard();
            return Ok(Flow::Forward);
        };
        match kind {
            Clientbound::JoinGame => {
                let (entity_id, gamemode, dimension, difficulty, max_players, level_type, reduced_debug_info): (
                    i32,
                    u8,
                    i32,
                    u8,
                    u8,
                    String,
                    bool,
                ) = cur.read()?;
                *self = Self {
                    entity_id,
                    gamemode,
                    dimension,
                    difficulty,
                    max_players,
                    level_type,
                    reduced_debug_info,
                    ..Default::default()
                };
            }
            Clientbound::Respawn => {
                let (dimension, difficulty, gamemode, level_type): (i32, u8, u8, String) = cur.read()?;
                self.dimension = dimension;
                self.difficulty = difficulty;
                self.gamemode = gamemode | (self.gamemode & 0x8);
                self.level_type = level_type;
            }
            Clientbound::ServerDifficulty => self.difficulty = cur.read()?,
            Clientbound::ChangeGameState => {
                let (reason, value): (u8, f32) = cur.read()?;
                match reason {
                    reason::END_RAINING => self.raining = false,
                    reason::BEGIN_RAINING => self.raining = true,
                    reason::CHANGE_GAMEMODE => self.gamemode = value as u8 | (self.gamemode & 0x8),
                    reason::RAIN_LEVEL => self.rain_level = value,
                    reason::THUNDER_LEVEL => self.thunder_level = value,
                    _ => {}
                }
            }
            Clientbound::SpawnPosition => self.spawn = cur.read::<Position>()?.0,
            Clientbound::KeepAlive => {
                let id: i64 = cur.read()?;
                if !out.attached() {
                    out.server(Packet::new(Serverbound::KeepAlive, id));
                }
            }
            Clientbound::Tags => self.tags = Some(cur.rest().to_vec()),
            Clientbound::DeclareRecipes => self.recipes = Some(cur.rest().to_vec()),
            Clientbound::DeclareCommands => self.commands = Some(cur.rest().to_vec()),
            _ => cur.discard(),
        }
        Ok(Flow::Forward)
    }

    fn replay(&mut self, step: ReplayStep, out: &mut Outbox) {
        match step {
            ReplayStep::JoinGame => {
                out.client(Packet::new(
                    Clientbound::JoinGame,
                    (
                        self.entity_id,
                        self.gamemode,
                        self.dimension,
                        self.difficulty,
                        self.max_players,
                        &self.level_type,
                        self.reduced_debug_info,
                    ),
                ));
                out.client(Packet::new(Clientbound::ServerDifficulty, self.difficulty));
                for (kind, blob) in [
                    (Clientbound::DeclareRecipes, &self.recipes),
                    (Clientbound::Tags, &self.tags),
                    (Clientbound::DeclareCommands, &self.commands),
                ] {
                    if let Some(blob) = blob {
                        out.client(Packet::new(kind, Raw(blob)));
                    }
                }
            }
            ReplayStep::SpawnPosition => out.client(Packet::new(Clientbound::SpawnPosition, Position(self.spawn))),
            ReplayStep::Weather => {
                if self.raining {
                    out.client(Packet::new(Clientbound::ChangeGameState, (reason::BEGIN_RAINING, 0f32)));
                }
                if self.rain_level != 0.0 {
                    out.client(Packet::new(Clientbound::ChangeGameState, (reason::RAIN_LEVEL, self.rain_level)));
                }
                if self.thunder_level != 0.0 {
                    out.client(Packet::new(Clientbound::ChangeGameState, (reason::THUNDER_LEVEL, self.thunder_level)));
                }
            }
            _ => {}
        }
    }
}
