use std::collections::VecDeque;

use crate::prelude::*;
use crate::protocol::{Clientbound, Cursor, Packet, PacketKind, Serverbound};
use super::{Flow, Outbox, ReplayStep, Tracker};

pub(super) const INTERESTS: &[PacketKind] = &[
    PacketKind::Clientbound(Clientbound::ChatMessage),
    PacketKind::Serverbound(Serverbound::ChatMessage),
];

pub const DEFAULT_LIMIT: usize = 100;
pub const END_OF_SCROLLBACK: &str = "\u{a7}a--- end scrollback ---";
const COMMAND: &str = "/bnc";

const POSITION_CHAT: i8 = 0;
const POSITION_SYSTEM: i8 = 1;

/// Chat received while no client was attached, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct Scrollback {
    pub messages: VecDeque<Chat>,
    limit: usize,
}
impl Default for Scrollback {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT)
    }
}
impl Scrollback {
    pub fn new(limit: usize) -> Self {
        Self { messages: VecDeque::with_capacity(limit), limit }
    }

    fn push(&mut self, message: Chat) {
        if self.limit == 0 {
            return;
        }
        if self.messages.len() == self.limit {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }

    /// Run a proxy command typed by the attached client, returning the reply.
    fn command(&self, args: &[&str], out: &mut Outbox) -> String {
        match args {
            [] => "subcommands: stop".into(),
            ["stop", ..] => {
                log::info!("stop requested by the attached client");
                out.shutdown = true;
                "stopping".into()
            }
            [other, ..] => format!("unknown subcommand: {other}"),
        }
    }
}

impl Tracker for Scrollback {
    fn apply(&mut self, kind: PacketKind, cur: &mut Cursor, out: &mut Outbox) -> Result<Flow, TrackerError> {
        match kind {
            PacketKind::Clientbound(Clientbound::ChatMessage) => {
                let (message, position): (Chat, i8) = cur.read()?;
                // messages are only kept while nobody is reading them
                if !out.attached() && matches!(position, POSITION_CHAT | POSITION_SYSTEM) {
                    self.push(message);
                }
            }
            PacketKind::Serverbound(Serverbound::ChatMessage) => {
                let line = cur.string()?;
                let mut words = line.split_whitespace();
                if words.next() == Some(COMMAND) {
                    let args: Vec<&str> = words.collect();
                    let reply = self.command(&args, out);
                    out.client(Packet::new(Clientbound::ChatMessage, (Chat::text(&reply), POSITION_SYSTEM)));
                    return Ok(Flow::Absorb);
                }
            }
            _ => cur.discard(),
        }
        Ok(Flow::Forward)
    }

    fn replay(&mut self, _step: ReplayStep, out: &mut Outbox) {
        if self.messages.is_empty() {
            return;
        }
        self.messages.push_back(Chat::text(END_OF_SCROLLBACK));
        for message in self.messages.drain(..) {
            out.client(Packet::new(Clientbound::ChatMessage, (message, POSITION_CHAT)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shadow::testkit;

    fn hear(chat: &mut Scrollback, text: &str, position: i8) {
        testkit::apply(chat, Clientbound::ChatMessage, (Chat::text(text), position));
    }

    #[test]
    fn bounded_and_filtered() {
        let mut chat = Scrollback::new(2);
        hear(&mut chat, "one", 0);
        hear(&mut chat, "above hotbar", 2);
        hear(&mut chat, "two", 1);
        hear(&mut chat, "three", 0);
        assert_eq!(chat.messages, [Chat::text("two"), Chat::text("three")]);
    }

    #[test]
    fn replay_appends_sentinel_and_clears() {
        let mut chat = Scrollback::default();
        hear(&mut chat, "hello", 0);
        let sent = testkit::replay(&mut chat, ReplayStep::Scrollback);
        assert_eq!(
            sent,
            vec![
                Packet::new(Clientbound::ChatMessage, (Chat::text("hello"), 0i8)),
                Packet::new(Clientbound::ChatMessage, (Chat::text(END_OF_SCROLLBACK), 0i8)),
            ]
        );
        assert!(chat.messages.is_empty());
        assert!(testkit::replay(&mut chat, ReplayStep::Scrollback).is_empty());
    }

    #[test]
    fn not_recorded_while_attached() {
        let mut chat = Scrollback::default();
        let mut out = Outbox::new(true);
        testkit::apply_with(&mut chat, Clientbound::ChatMessage, (Chat::text("live"), 0i8), &mut out);
        assert!(chat.messages.is_empty());
    }

    #[test]
    fn command_is_absorbed() {
        let mut chat = Scrollback::default();
        let mut out = Outbox::new(true);
        let flow = testkit::apply_with(&mut chat, Serverbound::ChatMessage, "/bnc", &mut out);
        assert_eq!(flow, Flow::Absorb);
        assert_eq!(out.to_client.len(), 1);
        assert!(!out.shutdown);

        let flow = testkit::apply_with(&mut chat, Serverbound::ChatMessage, "/bnc stop", &mut out);
        assert_eq!(flow, Flow::Absorb);
        assert!(out.shutdown);
        assert!(out.to_server.is_empty());

        let flow = testkit::apply_with(&mut chat, Serverbound::ChatMessage, "/bncx hi", &mut out);
        assert_eq!(flow, Flow::Forward);
    }
}
