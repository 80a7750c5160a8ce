//! The shadow: an in-memory mirror of everything the server has told us,
//! split into trackers that each own one slice of it.
use crate::prelude::*;
use crate::protocol::{Cursor, Packet, PacketKind};

pub mod abilities;
pub mod boss_bar;
pub mod channel;
pub mod chat;
pub mod dispatch;
pub mod entities;
pub mod game;
pub mod inventory;
pub mod player_list;
pub mod presence;
pub mod resource_pack;
pub mod session;
pub mod stats;
pub mod time;
pub mod world;
pub mod world_border;

#[cfg(test)]
pub(crate) mod testkit;

pub use dispatch::{Dispatched, Dispatcher, Fault};
pub use session::{Mode, Session};

/// What happens to a packet after a tracker has seen it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Forward,
    /// Handled locally, must not reach the other side.
    Absorb,
}

/// Packets produced while handling one event, drained by the reactor.
#[derive(Debug, Default)]
pub struct Outbox {
    attached: bool,
    pub to_server: Vec<Packet>,
    pub to_client: Vec<Packet>,
    pub shutdown: bool,
}
impl Outbox {
    pub fn new(attached: bool) -> Self {
        Self { attached, ..Default::default() }
    }
    /// Whether a client is attached and answering the server itself.
    pub fn attached(&self) -> bool {
        self.attached
    }
    pub fn server(&mut self, packet: Packet) {
        self.to_server.push(packet);
    }
    pub fn client(&mut self, packet: Packet) {
        self.to_client.push(packet);
    }
    pub fn is_empty(&self) -> bool {
        self.to_server.is_empty() && self.to_client.is_empty()
    }
}

pub trait Tracker {
    /// Fold one packet into this tracker's state. Must read the payload to
    /// its end, discarding whatever it doesn't model.
    fn apply(&mut self, kind: PacketKind, cur: &mut Cursor, out: &mut Outbox) -> Result<Flow, TrackerError>;

    /// Emit the packets for `step` so a fresh client matches the shadow.
    fn replay(&mut self, _step: ReplayStep, _out: &mut Outbox) {}

    /// Leave the server-visible state consistent with no client attached.
    fn cleanup(&mut self, _out: &mut Outbox) {}
}

macro_rules! trackers {
    ($($id:ident => $field:ident: $ty:ty,)*) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum TrackerId {
            $($id,)*
        }
        impl TrackerId {
            pub const ALL: &'static [TrackerId] = &[$(TrackerId::$id,)*];
            pub fn interests(self) -> &'static [PacketKind] {
                match self {
                    $(TrackerId::$id => $field::INTERESTS,)*
                }
            }
        }

        /// Every tracker's state. No field is written by more than one tracker.
        #[derive(Debug, Default)]
        pub struct Shadow {
            $(pub $field: $ty,)*
        }
        impl Shadow {
            pub fn tracker_mut(&mut self, id: TrackerId) -> &mut dyn Tracker {
                match id {
                    $(TrackerId::$id => &mut self.$field as &mut dyn Tracker,)*
                }
            }
        }
    };
}

trackers! {
    Game => game: game::Game,
    Channel => channel: channel::Channels,
    Abilities => abilities: abilities::Abilities,
    Inventory => inventory: inventory::Inventory,
    Stats => stats: stats::Stats,
    Time => time: time::Time,
    WorldBorder => world_border: world_border::WorldBorder,
    World => world: world::World,
    Entities => entities: entities::Entities,
    BossBar => boss_bar: boss_bar::BossBars,
    ResourcePack => resource_pack: resource_pack::ResourcePack,
    PlayerList => player_list: player_list::Roster,
    Chat => chat: chat::Scrollback,
}

impl Shadow {
    pub fn new(scrollback: usize) -> Self {
        Self { chat: chat::Scrollback::new(scrollback), ..Default::default() }
    }
}

/// One stage of bringing a newly attached client up to date, in the order
/// the client needs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayStep {
    JoinGame,
    Channels,
    SpawnPosition,
    Abilities,
    Inventory,
    Stats,
    Time,
    WorldBorder,
    Weather,
    Chunks,
    EntitySpawns,
    EntityState,
    RosterHeader,
    RosterItems,
    BossBars,
    PlayerPosition,
    ResourcePack,
    Scrollback,
}
impl ReplayStep {
    pub const ORDER: &'static [ReplayStep] = &[
        ReplayStep::JoinGame,
        ReplayStep::Channels,
        ReplayStep::SpawnPosition,
        ReplayStep::Abilities,
        ReplayStep::Inventory,
        ReplayStep::Stats,
        ReplayStep::Time,
        ReplayStep::WorldBorder,
        ReplayStep::Weather,
        ReplayStep::Chunks,
        ReplayStep::EntitySpawns,
        ReplayStep::EntityState,
        ReplayStep::RosterHeader,
        ReplayStep::RosterItems,
        ReplayStep::BossBars,
        ReplayStep::PlayerPosition,
        ReplayStep::ResourcePack,
        ReplayStep::Scrollback,
    ];

    pub fn owner(self) -> TrackerId {
        match self {
            ReplayStep::JoinGame | ReplayStep::SpawnPosition | ReplayStep::Weather => TrackerId::Game,
            ReplayStep::Channels => TrackerId::Channel,
            ReplayStep::Abilities => TrackerId::Abilities,
            ReplayStep::Inventory => TrackerId::Inventory,
            ReplayStep::Stats => TrackerId::Stats,
            ReplayStep::Time => TrackerId::Time,
            ReplayStep::WorldBorder => TrackerId::WorldBorder,
            ReplayStep::Chunks => TrackerId::World,
            ReplayStep::EntitySpawns | ReplayStep::EntityState | ReplayStep::PlayerPosition => TrackerId::Entities,
            ReplayStep::RosterHeader | ReplayStep::RosterItems => TrackerId::PlayerList,
            ReplayStep::BossBars => TrackerId::BossBar,
            ReplayStep::ResourcePack => TrackerId::ResourcePack,
            ReplayStep::Scrollback => TrackerId::Chat,
        }
    }
}
