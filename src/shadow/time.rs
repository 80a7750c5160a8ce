use crate::prelude::*;
use crate::protocol::{Clientbound, Cursor, Packet, PacketKind};
use super::{Flow, Outbox, ReplayStep, Tracker};

pub(super) const INTERESTS: &[PacketKind] = &[PacketKind::Clientbound(Clientbound::TimeUpdate)];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Time {
    pub world_age: i64,
    /// Negative while the daylight cycle is frozen.
    pub time_of_day: i64,
}

impl Tracker for Time {
    fn apply(&mut self, _kind: PacketKind, cur: &mut Cursor, _out: &mut Outbox) -> Result<Flow, TrackerError> {
        let (world_age, time_of_day): (i64, i64) = cur.read()?;
        self.world_age = world_age;
        self.time_of_day = time_of_day;
        Ok(Flow::Forward)
    }

    fn replay(&mut self, _step: ReplayStep, out: &mut Outbox) {
        out.client(Packet::new(Clientbound::TimeUpdate, (self.world_age, self.time_of_day)));
    }
}
