use std::collections::BTreeSet;

use crate::prelude::*;
use crate::protocol::encode::Raw;
use crate::protocol::{Clientbound, Cursor, Packet, PacketKind};
use super::{Flow, Outbox, ReplayStep, Tracker};

pub(super) const INTERESTS: &[PacketKind] = &[PacketKind::Clientbound(Clientbound::PluginMessage)];

const REGISTER: &str = "minecraft:register";
const UNREGISTER: &str = "minecraft:unregister";
const BRAND: &str = "minecraft:brand";

/// Plugin channels the server has registered, and its brand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Channels {
    pub registered: BTreeSet<String>,
    /// Brand payload as sent, a length-prefixed string.
    pub brand: Option<Vec<u8>>,
}

fn names(data: &[u8]) -> impl Iterator<Item = String> + '_ {
    data.split(|&b| b == 0).filter(|name| !name.is_empty()).map(|name| String::from_utf8_lossy(name).into_owned())
}

impl Tracker for Channels {
    fn apply(&mut self, _kind: PacketKind, cur: &mut Cursor, _out: &mut Outbox) -> Result<Flow, TrackerError> {
        let channel = cur.string()?;
        let data = cur.rest();
        match channel.as_str() {
            REGISTER => self.registered.extend(names(data)),
            UNREGISTER => {
                for name in names(data) {
                    self.registered.remove(&name);
                }
            }
            BRAND => self.brand = Some(data.to_vec()),
            _ => {}
        }
        Ok(Flow::Forward)
    }

    fn replay(&mut self, _step: ReplayStep, out: &mut Outbox) {
        if let Some(brand) = &self.brand {
            out.client(Packet::new(Clientbound::PluginMessage, (BRAND, Raw(brand))));
        }
        if !self.registered.is_empty() {
            let joined = self.registered.iter().map(String::as_str).collect::<Vec<_>>().join("\0");
            out.client(Packet::new(Clientbound::PluginMessage, (REGISTER, Raw(joined.as_bytes()))));
        }
    }
}
