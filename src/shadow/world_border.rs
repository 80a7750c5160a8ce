use crate::prelude::*;
use crate::protocol::{var, Clientbound, Cursor, Packet, PacketKind};
use super::{Flow, Outbox, ReplayStep, Tracker};

pub(super) const INTERESTS: &[PacketKind] = &[PacketKind::Clientbound(Clientbound::WorldBorder)];

const SET_SIZE: i32 = 0;
const LERP_SIZE: i32 = 1;
const SET_CENTER: i32 = 2;
const INITIALIZE: i32 = 3;
const SET_WARNING_TIME: i32 = 4;
const SET_WARNING_BLOCKS: i32 = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct WorldBorder {
    pub x: f64,
    pub z: f64,
    pub old_diameter: f64,
    pub new_diameter: f64,
    /// Milliseconds until `new_diameter` is reached.
    pub speed: i64,
    pub portal_teleport_boundary: i32,
    pub warning_time: i32,
    pub warning_blocks: i32,
}
impl Default for WorldBorder {
    fn default() -> Self {
        Self {
            x: 0.0,
            z: 0.0,
            old_diameter: 60_000_000.0,
            new_diameter: 60_000_000.0,
            speed: 0,
            portal_teleport_boundary: 29_999_984,
            warning_time: 15,
            warning_blocks: 5,
        }
    }
}

impl Tracker for WorldBorder {
    fn apply(&mut self, _kind: PacketKind, cur: &mut Cursor, _out: &mut Outbox) -> Result<Flow, TrackerError> {
        match cur.varint()? {
            SET_SIZE => {
                let diameter: f64 = cur.read()?;
                self.old_diameter = diameter;
                self.new_diameter = diameter;
                self.speed = 0;
            }
            LERP_SIZE => {
                let (old, new, var(speed)): (f64, f64, var<i64>) = cur.read()?;
                self.old_diameter = old;
                self.new_diameter = new;
                self.speed = speed;
            }
            SET_CENTER => {
                let (x, z): (f64, f64) = cur.read()?;
                self.x = x;
                self.z = z;
            }
            INITIALIZE => {
                let (x, z, old, new, var(speed), var(boundary), var(time), var(blocks)): (
                    f64,
                    f64,
                    f64,
                    f64,
                    var<i64>,
                    var<i32>,
                    var<i32>,
                    var<i32>,
                ) = cur.read()?;
                *self = Self {
                    x,
                    z,
                    old_diameter: old,
                    new_diameter: new,
                    speed,
                    portal_teleport_boundary: boundary,
                    warning_time: time,
                    warning_blocks: blocks,
                };
            }
            SET_WARNING_TIME => self.warning_time = cur.varint()?,
            SET_WARNING_BLOCKS => self.warning_blocks = cur.varint()?,
            action => {
                log::debug!("world border action {action} not modelled");
                cur.discard();
            }
        }
        Ok(Flow::Forward)
    }

    fn replay(&mut self, _step: ReplayStep, out: &mut Outbox) {
        out.client(Packet::new(
            Clientbound::WorldBorder,
            (
                var(INITIALIZE),
                self.x,
                self.z,
                self.old_diameter,
                self.new_diameter,
                var(self.speed),
                var(self.portal_teleport_boundary),
                var(self.warning_time),
                var(self.warning_blocks),
            ),
        ));
    }
}
