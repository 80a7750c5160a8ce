//! Routing of one packet to every tracker registered for its kind.
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use crate::prelude::*;
use crate::protocol::{Cursor, Packet, PacketKind};
use super::{Flow, Outbox, Shadow, Tracker, TrackerId};

#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
    /// The handler returned an error or panicked.
    Handler { tracker: TrackerId, kind: PacketKind, message: String },
    /// The handler succeeded but left bytes unread.
    Drift { tracker: TrackerId, kind: PacketKind, unread: usize },
}

#[derive(Debug, Default)]
pub struct Dispatched {
    /// Some tracker consumed the packet; it must not be forwarded.
    pub absorbed: bool,
    pub faults: Vec<Fault>,
}

/// Where the dispatcher finds the tracker behind each id.
pub trait Trackers {
    fn tracker_mut(&mut self, id: TrackerId) -> &mut dyn Tracker;
}

impl Trackers for Shadow {
    fn tracker_mut(&mut self, id: TrackerId) -> &mut dyn Tracker {
        Shadow::tracker_mut(self, id)
    }
}

/// Registration table built once from every tracker's interests.
#[derive(Debug)]
pub struct Dispatcher {
    table: HashMap<PacketKind, Vec<TrackerId>>,
}
impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub fn new() -> Self {
        let mut table: HashMap<PacketKind, Vec<TrackerId>> = HashMap::new();
        for &id in TrackerId::ALL {
            for &kind in id.interests() {
                table.entry(kind).or_default().push(id);
            }
        }
        Self { table }
    }

    pub fn handlers(&self, kind: PacketKind) -> &[TrackerId] {
        self.table.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Hand `packet` to each registered tracker in turn. Every handler sees
    /// the payload from its first byte; faults are logged and collected, never
    /// propagated.
    pub fn dispatch<T: Trackers>(&self, trackers: &mut T, direction: Direction, packet: &Packet, out: &mut Outbox) -> Dispatched {
        let mut result = Dispatched::default();
        let Some(kind) = packet.kind(direction) else {
            log::trace!("{direction:?} packet 0x{:02x} has no handlers", packet.id);
            return result;
        };
        let mut cur = Cursor::new(&packet.payload);
        cur.save();
        for &tracker in self.handlers(kind) {
            let handler = trackers.tracker_mut(tracker);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler.apply(kind, &mut cur, out)));
            match outcome {
                Ok(Ok(flow)) => {
                    if !cur.is_empty() {
                        log::error!("{kind} left {} bytes unread by {tracker:?}", cur.remaining());
                        result.faults.push(Fault::Drift { tracker, kind, unread: cur.remaining() });
                    }
                    result.absorbed |= flow == Flow::Absorb;
                }
                Ok(Err(e)) => {
                    match e {
                        TrackerError::Wire(_) => log::error!("{tracker:?} failed on {kind}: {e}"),
                        _ => log::warn!("{tracker:?} on {kind}: {e}"),
                    }
                    result.faults.push(Fault::Handler { tracker, kind, message: e.to_string() });
                }
                Err(payload) => {
                    let message = payload
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| payload.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".into());
                    log::error!("{tracker:?} panicked on {kind}: {message}");
                    result.faults.push(Fault::Handler { tracker, kind, message });
                }
            }
            cur.restore();
        }
        result
    }
}
