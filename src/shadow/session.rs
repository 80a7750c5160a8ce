//! Attach/detach orchestration around one upstream session.
use crate::prelude::*;
use crate::protocol::Packet;
use super::presence::Presence;
use super::{Dispatcher, Outbox, ReplayStep, Shadow, TrackerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Detached,
    Attaching,
    Attached,
    Detaching,
}

/// The shadow of one upstream session, plus whatever client is currently
/// looking at it.
#[derive(Debug)]
pub struct Session {
    shadow: Shadow,
    dispatcher: Dispatcher,
    presence: Presence,
    mode: Mode,
}

impl Session {
    pub fn new(scrollback: usize) -> Self {
        let mut presence = Presence::default();
        presence.start();
        Self { shadow: Shadow::new(scrollback), dispatcher: Dispatcher::new(), presence, mode: Mode::Detached }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn shadow(&self) -> &Shadow {
        &self.shadow
    }

    /// Whether a new client may attach.
    pub fn can_accept(&self) -> bool {
        self.mode == Mode::Detached
    }

    /// Fold a play packet into the shadow and forward it to the other side
    /// when a client is attached.
    pub fn on_packet(&mut self, direction: Direction, packet: Packet) -> Outbox {
        let attached = self.mode == Mode::Attached;
        let mut out = Outbox::new(attached);
        let dispatched = self.dispatcher.dispatch(&mut self.shadow, direction, &packet, &mut out);
        if attached && !dispatched.absorbed {
            log::trace!("forwarding {direction:?} packet 0x{:02x}", packet.id);
            match direction {
                Direction::Clientbound => out.client(packet),
                Direction::Serverbound => out.server(packet),
            }
        }
        out
    }

    /// Bring a freshly logged-in client up to date with the shadow.
    pub fn attach(&mut self) -> Result<Outbox, SessionError> {
        if self.mode != Mode::Detached {
            return Err(SessionError::Occupied);
        }
        log::info!("attaching");
        self.mode = Mode::Attaching;
        self.presence.stop();
        let mut out = Outbox::new(true);
        for &step in ReplayStep::ORDER {
            let before = out.to_client.len();
            self.shadow.tracker_mut(step.owner()).replay(step, &mut out);
            log::debug!("replayed {step:?}: {} packets", out.to_client.len() - before);
        }
        self.mode = Mode::Attached;
        log::info!("attached after replaying {} packets", out.to_client.len());
        Ok(out)
    }

    /// Release whatever the departed client left held and go back to keeping
    /// the session alive alone.
    pub fn detach(&mut self) -> Result<Outbox, SessionError> {
        if self.mode != Mode::Attached {
            return Err(SessionError::NotAttached);
        }
        log::info!("detaching");
        self.mode = Mode::Detaching;
        let mut out = Outbox::new(false);
        for &id in TrackerId::ALL {
            self.shadow.tracker_mut(id).cleanup(&mut out);
        }
        self.mode = Mode::Detached;
        self.presence.start();
        log::info!("detached");
        Ok(out)
    }

    pub fn tick(&mut self) -> Outbox {
        let mut out = Outbox::new(self.mode == Mode::Attached);
        self.presence.tick(&self.shadow.entities.player, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode::Raw;
    use crate::protocol::{var, Clientbound, Cursor, Serverbound};
    use crate::shadow::chat::END_OF_SCROLLBACK;
    use crate::shadow::{entities, testkit};

    fn populated() -> Session {
        let mut session = Session::new(10);
        for (direction, packet) in testkit::samples() {
            let kind = packet.kind(direction).unwrap();
            // keep the world and entities populated; keep the client side quiet
            if matches!(kind.name(), "destroy_entities" | "unload_chunk") || direction == Direction::Serverbound {
                continue;
            }
            let out = session.on_packet(direction, packet);
            assert!(out.to_client.is_empty());
        }
        session
    }

    #[test]
    fn attach_rebuilds_the_shadow() {
        let mut session = populated();
        let heard = session.shadow().chat.messages.clone();
        assert_eq!(heard, [Chat::text("hi")]);
        let mob = &session.shadow().entities.entities[&2];
        assert_eq!(mob.equipment[&0].id, 276);
        assert_eq!(mob.effects.keys().copied().collect::<Vec<_>>(), [5]);
        assert_eq!(session.shadow().entities.player.vehicle, Some(2));

        let out = session.attach().unwrap();
        assert!(out.to_server.is_empty());

        let dispatcher = Dispatcher::new();
        let mut mirror = Shadow::new(10);
        for packet in &out.to_client {
            let result = dispatcher.dispatch(&mut mirror, Direction::Clientbound, packet, &mut Outbox::new(false));
            assert!(result.faults.is_empty(), "{:?}", result.faults);
        }

        let shadow = session.shadow();
        assert_eq!(mirror.game, shadow.game);
        assert_eq!(mirror.channel, shadow.channel);
        assert_eq!(mirror.abilities, shadow.abilities);
        assert_eq!(mirror.inventory, shadow.inventory);
        assert_eq!(mirror.stats, shadow.stats);
        assert_eq!(mirror.time, shadow.time);
        assert_eq!(mirror.world_border, shadow.world_border);
        assert_eq!(mirror.world, shadow.world);
        assert_eq!(mirror.entities, shadow.entities);
        assert_eq!(mirror.boss_bar, shadow.boss_bar);
        assert_eq!(mirror.resource_pack, shadow.resource_pack);
        assert_eq!(mirror.player_list, shadow.player_list);

        let mut expected = heard;
        expected.push_back(Chat::text(END_OF_SCROLLBACK));
        assert_eq!(mirror.chat.messages, expected);
        assert!(shadow.chat.messages.is_empty());
    }

    #[test]
    fn chunks_replay_their_bitmask() {
        let mut session = Session::new(0);
        session.on_packet(Direction::Clientbound, Packet::new(Clientbound::JoinGame, (1i32, 0u8, 0i32, 2u8, 20u8, "default", false)));
        let chunk = testkit::chunk_payload(3, -4, true, 0b1111, true);
        session.on_packet(Direction::Clientbound, Packet::new(Clientbound::ChunkData, Raw(&chunk)));

        let out = session.attach().unwrap();
        let chunks: Vec<&Packet> = out.to_client.iter().filter(|p| p.id == Clientbound::ChunkData.id()).collect();
        assert_eq!(chunks.len(), 1);
        let mut cur = Cursor::new(&chunks[0].payload);
        let (x, z, full, bitmask): (i32, i32, bool, var<i32>) = cur.read().unwrap();
        assert_eq!((x, z, full, bitmask.0), (3, -4, true, 0b1111));
    }

    #[test]
    fn forwards_only_while_attached() {
        let mut session = Session::new(10);
        let time = Packet::new(Clientbound::TimeUpdate, (1i64, 2i64));
        assert!(session.on_packet(Direction::Clientbound, time.clone()).is_empty());

        session.attach().unwrap();
        let out = session.on_packet(Direction::Clientbound, time.clone());
        assert_eq!(out.to_client, [time]);
        assert_eq!(session.shadow().time.world_age, 1);

        // unknown ids are still forwarded
        let opaque = Packet { id: 0x7E, payload: vec![1, 2] };
        assert_eq!(session.on_packet(Direction::Clientbound, opaque.clone()).to_client, [opaque]);

        let chat = Packet::new(Serverbound::ChatMessage, "hello");
        assert_eq!(session.on_packet(Direction::Serverbound, chat.clone()).to_server, [chat]);

        let out = session.on_packet(Direction::Serverbound, Packet::new(Serverbound::ChatMessage, "/bnc"));
        assert!(out.to_server.is_empty());
        assert_eq!(out.to_client.len(), 1);
    }

    #[test]
    fn one_client_at_a_time() {
        let mut session = Session::new(10);
        assert_eq!(session.detach().unwrap_err(), SessionError::NotAttached);
        assert!(session.can_accept());
        session.attach().unwrap();
        assert!(!session.can_accept());
        assert_eq!(session.attach().unwrap_err(), SessionError::Occupied);
        assert_eq!(session.mode(), Mode::Attached);
        session.detach().unwrap();
        assert_eq!(session.mode(), Mode::Detached);
        assert!(session.attach().is_ok());
    }

    #[test]
    fn detach_releases_sneaking_only() {
        let mut session = Session::new(10);
        session.on_packet(Direction::Clientbound, Packet::new(Clientbound::JoinGame, (5i32, 0u8, 0i32, 2u8, 20u8, "default", false)));
        session.attach().unwrap();
        let sneak = Packet::new(Serverbound::EntityAction, (var(5), var(entities::action::START_SNEAKING), var(0)));
        assert_eq!(session.on_packet(Direction::Serverbound, sneak.clone()).to_server, [sneak]);

        let out = session.detach().unwrap();
        assert_eq!(
            out.to_server,
            [Packet::new(Serverbound::EntityAction, (var(5), var(entities::action::STOP_SNEAKING), var(0)))]
        );
        assert!(out.to_client.is_empty());
        assert!(!session.shadow().entities.player.sneaking);
    }

    #[test]
    fn presence_runs_only_while_detached() {
        let mut session = Session::new(10);
        let look = Packet::new(Clientbound::PlayerPositionAndLook, (V3::new(0.0f64, 64.0, 0.0), 0f32, 0f32, 0u8, var(1)));
        let out = session.on_packet(Direction::Clientbound, look);
        assert_eq!(out.to_server, [Packet::new(Serverbound::TeleportConfirm, var(1))]);
        assert_eq!(session.tick().to_server, [Packet::new(Serverbound::Player, true)]);

        session.attach().unwrap();
        assert!(session.tick().is_empty());
        session.detach().unwrap();
        assert_eq!(session.tick().to_server.len(), 1);
    }
}
