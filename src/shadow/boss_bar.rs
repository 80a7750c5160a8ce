use std::collections::BTreeMap;

use crate::prelude::*;
use crate::protocol::{var, Clientbound, Cursor, Packet, PacketKind};
use super::{Flow, Outbox, ReplayStep, Tracker};

pub(super) const INTERESTS: &[PacketKind] = &[PacketKind::Clientbound(Clientbound::BossBar)];

const ADD: i32 = 0;
const REMOVE: i32 = 1;
const UPDATE_HEALTH: i32 = 2;
const UPDATE_TITLE: i32 = 3;
const UPDATE_STYLE: i32 = 4;
const UPDATE_FLAGS: i32 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct BossBar {
    pub title: Chat,
    pub health: f32,
    pub color: i32,
    pub division: i32,
    pub flags: u8,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BossBars {
    pub bars: BTreeMap<Uuid, BossBar>,
}

impl Tracker for BossBars {
    fn apply(&mut self, _kind: PacketKind, cur: &mut Cursor, _out: &mut Outbox) -> Result<Flow, TrackerError> {
        let (uuid, var(action)): (Uuid, var<i32>) = cur.read()?;
        match action {
            ADD => {
                let (title, health, var(color), var(division), flags): (Chat, f32, var<i32>, var<i32>, u8) = cur.read()?;
                self.bars.insert(uuid, BossBar { title, health, color, division, flags });
            }
            REMOVE => {
                self.bars.remove(&uuid).ok_or(TrackerError::MissingBossBar(uuid))?;
            }
            UPDATE_HEALTH..=UPDATE_FLAGS => {
                let bar = self.bars.get_mut(&uuid).ok_or(TrackerError::MissingBossBar(uuid))?;
                match action {
                    UPDATE_HEALTH => bar.health = cur.read()?,
                    UPDATE_TITLE => bar.title = cur.read()?,
                    UPDATE_STYLE => {
                        let (var(color), var(division)): (var<i32>, var<i32>) = cur.read()?;
                        bar.color = color;
                        bar.division = division;
                    }
                    _ => bar.flags = cur.read()?,
                }
            }
            _ => cur.discard(),
        }
        Ok(Flow::Forward)
    }

    fn replay(&mut self, _step: ReplayStep, out: &mut Outbox) {
        for (uuid, bar) in &self.bars {
            out.client(Packet::new(
                Clientbound::BossBar,
                (uuid, var(ADD), &bar.title, bar.health, var(bar.color), var(bar.division), bar.flags),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shadow::testkit;

    const WITHER: Uuid = Uuid(0xabc);

    fn added() -> BossBars {
        let mut bars = BossBars::default();
        testkit::apply(&mut bars, Clientbound::BossBar, (WITHER, var(ADD), Chat::text("Wither"), 1.0f32, var(5), var(0), 0u8));
        bars
    }

    #[test]
    fn updates_apply_to_known_bar() {
        let mut bars = added();
        testkit::apply(&mut bars, Clientbound::BossBar, (WITHER, var(UPDATE_HEALTH), 0.5f32));
        testkit::apply(&mut bars, Clientbound::BossBar, (WITHER, var(UPDATE_STYLE), var(2), var(1)));
        testkit::apply(&mut bars, Clientbound::BossBar, (WITHER, var(UPDATE_FLAGS), 0x1u8));
        let bar = &bars.bars[&WITHER];
        assert_eq!((bar.health, bar.color, bar.division, bar.flags), (0.5, 2, 1, 1));
    }

    #[test]
    fn unknown_bar_is_a_desync() {
        let mut bars = added();
        let err = testkit::try_apply(&mut bars, Clientbound::BossBar, (Uuid(1), var(UPDATE_HEALTH), 0.5f32)).unwrap_err();
        assert!(matches!(err, TrackerError::MissingBossBar(Uuid(1))));
        testkit::apply(&mut bars, Clientbound::BossBar, (WITHER, var(REMOVE)));
        assert!(bars.bars.is_empty());
    }

    #[test]
    fn replay_adds_every_bar() {
        let mut bars = added();
        testkit::apply(&mut bars, Clientbound::BossBar, (WITHER, var(UPDATE_TITLE), Chat::text("Dying")));
        let sent = testkit::replay(&mut bars, ReplayStep::BossBars);
        let mut mirror = BossBars::default();
        testkit::apply(&mut mirror, Clientbound::BossBar, crate::protocol::encode::Raw(&sent[0].payload));
        assert_eq!(mirror, bars);
    }
}
