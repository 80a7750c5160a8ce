use std::collections::BTreeMap;

use crate::prelude::*;
use crate::protocol::encode::{Each, ToWire};
use crate::protocol::{var, Clientbound, Cursor, Packet, PacketKind};
use super::{Flow, Outbox, ReplayStep, Tracker};

pub(super) const INTERESTS: &[PacketKind] = &[
    PacketKind::Clientbound(Clientbound::PlayerListItem),
    PacketKind::Clientbound(Clientbound::PlayerListHeaderFooter),
];

const ADD_PLAYER: i32 = 0;
const UPDATE_GAMEMODE: i32 = 1;
const UPDATE_LATENCY: i32 = 2;
const UPDATE_DISPLAY_NAME: i32 = 3;
const REMOVE_PLAYER: i32 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    pub name: String,
    pub value: String,
    pub signature: Option<String>,
}
impl ToWire for Property {
    fn encode(&self, buf: &mut Vec<u8>) {
        (&self.name, &self.value, &self.signature).encode(buf)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub name: String,
    pub properties: Vec<Property>,
    pub gamemode: i32,
    pub ping: i32,
    pub display_name: Option<Chat>,
}

/// The tab list: one listing per player uuid plus the header and footer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Roster {
    pub players: BTreeMap<Uuid, Listing>,
    pub header_footer: Option<(Chat, Chat)>,
}

impl Roster {
    fn player_list_item(&mut self, cur: &mut Cursor) -> Result<(), TrackerError> {
        let action = cur.varint()?;
        for _ in 0..cur.count()? {
            let uuid: Uuid = cur.read()?;
            match action {
                ADD_PLAYER => {
                    let name = cur.string()?;
                    let mut properties = vec![];
                    for _ in 0..cur.count()? {
                        let (name, value, signature): (String, String, Option<String>) = cur.read()?;
                        properties.push(Property { name, value, signature });
                    }
                    let (var(gamemode), var(ping), display_name): (var<i32>, var<i32>, Option<Chat>) = cur.read()?;
                    self.players.insert(uuid, Listing { name, properties, gamemode, ping, display_name });
                }
                UPDATE_GAMEMODE | UPDATE_LATENCY | UPDATE_DISPLAY_NAME => {
                    let mut gamemode = None;
                    let mut ping = None;
                    let mut display_name = None;
                    match action {
                        UPDATE_GAMEMODE => gamemode = Some(cur.varint()?),
                        UPDATE_LATENCY => ping = Some(cur.varint()?),
                        _ => display_name = Some(cur.read::<Option<Chat>>()?),
                    }
                    let Some(listing) = self.players.get_mut(&uuid) else {
                        log::warn!("{}", TrackerError::MissingPlayer(uuid));
                        continue;
                    };
                    if let Some(gamemode) = gamemode {
                        listing.gamemode = gamemode;
                    }
                    if let Some(ping) = ping {
                        listing.ping = ping;
                    }
                    if let Some(display_name) = display_name {
                        listing.display_name = display_name;
                    }
                }
                REMOVE_PLAYER => {
                    if self.players.remove(&uuid).is_none() {
                        log::warn!("{}", TrackerError::MissingPlayer(uuid));
                    }
                }
                _ => {
                    cur.discard();
                    break;
                }
            }
        }
        Ok(())
    }
}

impl Tracker for Roster {
    fn apply(&mut self, kind: PacketKind, cur: &mut Cursor, _out: &mut Outbox) -> Result<Flow, TrackerError> {
        match kind {
            PacketKind::Clientbound(Clientbound::PlayerListItem) => self.player_list_item(cur)?,
            PacketKind::Clientbound(Clientbound::PlayerListHeaderFooter) => self.header_footer = Some(cur.read()?),
            _ => cur.discard(),
        }
        Ok(Flow::Forward)
    }

    fn replay(&mut self, step: ReplayStep, out: &mut Outbox) {
        match step {
            ReplayStep::RosterHeader => {
                if let Some((header, footer)) = &self.header_footer {
                    out.client(Packet::new(Clientbound::PlayerListHeaderFooter, (header, footer)));
                }
            }
            ReplayStep::RosterItems if !self.players.is_empty() => {
                let records = self.players.iter().map(|(uuid, p)| {
                    (uuid, &p.name, &p.properties, var(p.gamemode), var(p.ping), &p.display_name)
                });
                out.client(Packet::new(
                    Clientbound::PlayerListItem,
                    (var(ADD_PLAYER), var(self.players.len()), Each(records)),
                ));
            }
            _ => {}
        }
    }
}
