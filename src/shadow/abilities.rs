use crate::prelude::*;
use crate::protocol::{Clientbound, Cursor, Packet, PacketKind, Serverbound};
use super::{Flow, Outbox, ReplayStep, Tracker};

pub(super) const INTERESTS: &[PacketKind] = &[
    PacketKind::Clientbound(Clientbound::PlayerAbilities),
    PacketKind::Serverbound(Serverbound::PlayerAbilities),
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Abilities {
    pub invulnerable: bool,
    pub flying: bool,
    pub allow_flying: bool,
    pub creative_mode: bool,
    pub flying_speed: f32,
    /// Field of view modifier, or walking speed when the client reports it.
    pub fov_modifier: f32,
}
impl Abilities {
    fn flags(&self) -> u8 {
        self.invulnerable as u8 | (self.flying as u8) << 1 | (self.allow_flying as u8) << 2 | (self.creative_mode as u8) << 3
    }
    fn set_flags(&mut self, flags: u8) {
        self.invulnerable = flags & 1 != 0;
        self.flying = flags & 2 != 0;
        self.allow_flying = flags & 4 != 0;
        self.creative_mode = flags & 8 != 0;
    }
}

impl Tracker for Abilities {
    fn apply(&mut self, _kind: PacketKind, cur: &mut Cursor, _out: &mut Outbox) -> Result<Flow, TrackerError> {
        // both directions carry flags followed by two floats
        let (flags, flying_speed, fov_modifier): (u8, f32, f32) = cur.read()?;
        self.set_flags(flags);
        self.flying_speed = flying_speed;
        self.fov_modifier = fov_modifier;
        Ok(Flow::Forward)
    }

    fn replay(&mut self, _step: ReplayStep, out: &mut Outbox) {
        out.client(Packet::new(Clientbound::PlayerAbilities, (self.flags(), self.flying_speed, self.fov_modifier)));
    }
}
