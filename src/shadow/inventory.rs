use std::collections::BTreeSet;

use crate::prelude::*;
use crate::protocol::encode::Each;
use crate::protocol::{var, Clientbound, Cursor, Packet, PacketKind, Serverbound};
use super::{Flow, Outbox, ReplayStep, Tracker};

pub(super) const INTERESTS: &[PacketKind] = &[
    PacketKind::Clientbound(Clientbound::WindowItems),
    PacketKind::Clientbound(Clientbound::SetSlot),
    PacketKind::Clientbound(Clientbound::HeldItemChange),
    PacketKind::Clientbound(Clientbound::UnlockRecipes),
    PacketKind::Serverbound(Serverbound::HeldItemChange),
];

/// Slots in the player's own window: crafting, armor, main, hotbar, offhand.
pub const SLOTS: usize = 46;
const PLAYER_WINDOW: i8 = 0;
const HOTBAR: i16 = 9;

const RECIPES_INIT: i32 = 0;
const RECIPES_ADD: i32 = 1;
const RECIPES_REMOVE: i32 = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookFlags {
    pub crafting_open: bool,
    pub crafting_filter: bool,
    pub smelting_open: bool,
    pub smelting_filter: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Inventory {
    pub slots: Vec<Slot>,
    /// Hotbar index, 0 to 8.
    pub held_item: u8,
    pub recipes: BTreeSet<String>,
    pub book: BookFlags,
}
impl Default for Inventory {
    fn default() -> Self {
        Self { slots: vec![Slot::EMPTY; SLOTS], held_item: 0, recipes: BTreeSet::new(), book: BookFlags::default() }
    }
}

impl Inventory {
    fn select(&mut self, slot: i16) {
        match u8::try_from(slot) {
            Ok(slot) if i16::from(slot) < HOTBAR => self.held_item = slot,
            _ => log::debug!("ignoring held item {slot}"),
        }
    }

    fn unlock_recipes(&mut self, cur: &mut Cursor) -> Result<(), TrackerError> {
        let action = cur.varint()?;
        let (crafting_open, crafting_filter, smelting_open, smelting_filter): (bool, bool, bool, bool) = cur.read()?;
        self.book = BookFlags { crafting_open, crafting_filter, smelting_open, smelting_filter };
        let lists = if action == RECIPES_INIT { 2 } else { 1 };
        for _ in 0..lists {
            for _ in 0..cur.count()? {
                let recipe = cur.string()?;
                match action {
                    RECIPES_INIT | RECIPES_ADD => {
                        self.recipes.insert(recipe);
                    }
                    RECIPES_REMOVE => {
                        self.recipes.remove(&recipe);
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

impl Tracker for Inventory {
    fn apply(&mut self, kind: PacketKind, cur: &mut Cursor, _out: &mut Outbox) -> Result<Flow, TrackerError> {
        match kind {
            PacketKind::Clientbound(Clientbound::WindowItems) => {
                let (window, count): (i8, i16) = cur.read()?;
                let mut slots = Vec::with_capacity(count.max(0) as usize);
                for _ in 0..count {
                    slots.push(cur.read::<Slot>()?);
                }
                if window == PLAYER_WINDOW {
                    if slots.len() != SLOTS {
                        log::debug!("player window sent {} slots", slots.len());
                    }
                    slots.resize(SLOTS, Slot::EMPTY);
                    self.slots = slots;
                }
            }
            PacketKind::Clientbound(Clientbound::SetSlot) => {
                let (window, index, slot): (i8, i16, Slot) = cur.read()?;
                if window == PLAYER_WINDOW {
                    let target = usize::try_from(index)
                        .ok()
                        .and_then(|i| self.slots.get_mut(i))
                        .ok_or(TrackerError::SlotOutOfRange(index))?;
                    *target = slot;
                }
            }
            PacketKind::Clientbound(Clientbound::HeldItemChange) => {
                let slot: i8 = cur.read()?;
                self.select(slot.into());
            }
            PacketKind::Serverbound(Serverbound::HeldItemChange) => {
                let slot: i16 = cur.read()?;
                self.select(slot);
            }
            PacketKind::Clientbound(Clientbound::UnlockRecipes) => self.unlock_recipes(cur)?,
            _ => cur.discard(),
        }
        Ok(Flow::Forward)
    }

    fn replay(&mut self, _step: ReplayStep, out: &mut Outbox) {
        out.client(Packet::new(
            Clientbound::WindowItems,
            (PLAYER_WINDOW, self.slots.len() as i16, Each(&self.slots)),
        ));
        out.client(Packet::new(Clientbound::HeldItemChange, self.held_item));
        let BookFlags { crafting_open, crafting_filter, smelting_open, smelting_filter } = self.book;
        let recipes: Vec<&String> = self.recipes.iter().collect();
        out.client(Packet::new(
            Clientbound::UnlockRecipes,
            (
                var(RECIPES_INIT),
                (crafting_open, crafting_filter, smelting_open, smelting_filter),
                recipes,
                // nothing to highlight as newly unlocked
                var(0),
            ),
        ));
    }
}
