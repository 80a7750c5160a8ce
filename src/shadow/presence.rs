//! Movement traffic sent on the player's behalf while no client is attached,
//! so the server keeps treating the session as live.
use crate::protocol::{Packet, Serverbound};
use super::entities::Player;
use super::Outbox;

/// Ticks between full position updates.
pub const SLOW_INTERVAL: u64 = 20;

#[derive(Debug, Default)]
pub struct Presence {
    running: bool,
    ticks: u64,
}

impl Presence {
    pub fn start(&mut self) {
        if !self.running {
            log::debug!("presence started");
            self.running = true;
            self.ticks = 0;
        }
    }

    pub fn stop(&mut self) {
        if self.running {
            log::debug!("presence stopped after {} ticks", self.ticks);
            self.running = false;
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Called once per game tick by the reactor.
    pub fn tick(&mut self, player: &Player, out: &mut Outbox) {
        if !self.running || !player.spawned {
            return;
        }
        self.ticks += 1;
        fast(player, out);
        if self.ticks % SLOW_INTERVAL == 0 {
            slow(player, out);
        }
    }
}

fn fast(player: &Player, out: &mut Outbox) {
    if player.vehicle.is_some() {
        out.server(Packet::new(Serverbound::PlayerLook, (player.yaw, player.pitch, player.on_ground)));
        out.server(Packet::new(Serverbound::SteerVehicle, (0f32, 0f32, 0u8)));
        out.server(Packet::new(Serverbound::VehicleMove, (player.position, player.yaw, player.pitch)));
    } else {
        out.server(Packet::new(Serverbound::Player, player.on_ground));
    }
}

fn slow(player: &Player, out: &mut Outbox) {
    // the vehicle carries the rider's position
    if player.vehicle.is_none() {
        out.server(Packet::new(
            Serverbound::PlayerPositionAndLook,
            (player.position, player.yaw, player.pitch, player.on_ground),
        ));
    }
}
