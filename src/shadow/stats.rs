use crate::prelude::*;
use crate::protocol::{var, Clientbound, Cursor, Packet, PacketKind};
use super::{Flow, Outbox, ReplayStep, Tracker};

pub(super) const INTERESTS: &[PacketKind] = &[
    PacketKind::Clientbound(Clientbound::UpdateHealth),
    PacketKind::Clientbound(Clientbound::SetExperience),
];

#[derive(Debug, Clone, PartialEq)]
pub struct Stats {
    pub health: f32,
    pub food: i32,
    pub saturation: f32,
    pub experience_bar: f32,
    pub level: i32,
    pub total_experience: i32,
}
impl Default for Stats {
    fn default() -> Self {
        Self { health: 20.0, food: 20, saturation: 5.0, experience_bar: 0.0, level: 0, total_experience: 0 }
    }
}

impl Tracker for Stats {
    fn apply(&mut self, kind: PacketKind, cur: &mut Cursor, _out: &mut Outbox) -> Result<Flow, TrackerError> {
        match kind {
            PacketKind::Clientbound(Clientbound::UpdateHealth) => {
                let (health, var(food), saturation): (f32, var<i32>, f32) = cur.read()?;
                self.health = health;
                self.food = food;
                self.saturation = saturation;
            }
            PacketKind::Clientbound(Clientbound::SetExperience) => {
                let (bar, var(level), var(total)): (f32, var<i32>, var<i32>) = cur.read()?;
                self.experience_bar = bar;
                self.level = level;
                self.total_experience = total;
            }
            _ => cur.discard(),
        }
        Ok(Flow::Forward)
    }

    fn replay(&mut self, _step: ReplayStep, out: &mut Outbox) {
        out.client(Packet::new(Clientbound::UpdateHealth, (self.health, var(self.food), self.saturation)));
        out.client(Packet::new(
            Clientbound::SetExperience,
            (self.experience_bar, var(self.level), var(self.total_experience)),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shadow::testkit;

    #[test]
    fn tracks_health_and_experience() {
        let mut stats = Stats::default();
        testkit::apply(&mut stats, Clientbound::UpdateHealth, (7.5f32, var(12), 1.0f32));
        testkit::apply(&mut stats, Clientbound::SetExperience, (0.25f32, var(3), var(40)));
        assert_eq!(stats, Stats { health: 7.5, food: 12, saturation: 1.0, experience_bar: 0.25, level: 3, total_experience: 40 });

        let sent = testkit::replay(&mut stats, ReplayStep::Stats);
        assert_eq!(sent[0], Packet::new(Clientbound::UpdateHealth, (7.5f32, var(12), 1.0f32)));
        assert_eq!(sent[1].id, Clientbound::SetExperience.id());
    }
}
