use crate::prelude::*;
use crate::protocol::{Clientbound, Cursor, Packet, PacketKind};
use super::{Flow, Outbox, ReplayStep, Tracker};

pub(super) const INTERESTS: &[PacketKind] = &[PacketKind::Clientbound(Clientbound::ResourcePackSend)];

/// The last resource pack offer, re-sent so a new client downloads it too.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourcePack {
    pub offer: Option<(String, String)>,
}

impl Tracker for ResourcePack {
    fn apply(&mut self, _kind: PacketKind, cur: &mut Cursor, _out: &mut Outbox) -> Result<Flow, TrackerError> {
        let (url, hash): (String, String) = cur.read()?;
        self.offer = Some((url, hash));
        Ok(Flow::Forward)
    }

    fn replay(&mut self, _step: ReplayStep, out: &mut Outbox) {
        if let Some((url, hash)) = &self.offer {
            out.client(Packet::new(Clientbound::ResourcePackSend, (url, hash)));
        }
    }
}
