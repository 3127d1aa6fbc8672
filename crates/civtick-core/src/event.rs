//! Domain events emitted by a tick.
//!
//! The core never calls listeners. Events are appended to an
//! [`EventQueue`] in emission order and handed back to the caller in the
//! [`TickReport`](crate::sim::TickReport), which dispatches them to UI,
//! audio and effects.
//!
//! Ordering is part of the contract: for one tile,
//! [`SimEvent::BuildingOrUpgradeComplete`] is always emitted before
//! [`SimEvent::BuildingComplete`].
//!
//! # Suppression
//!
//! Event kinds can be suppressed via [`EventQueue::suppress`]. Suppressed
//! events are never recorded, which keeps offline catch-up cheap.

use serde::{Deserialize, Serialize};

use crate::fixed::Fixed64;
use crate::id::{ResourceId, TechId, Tile};

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SimEvent {
    /// A level or stack was gained or lost.
    BuildingOrUpgradeComplete { tile: Tile },
    /// A construction site finished its first build.
    BuildingComplete { tile: Tile },
    /// A production cycle ran. Also fires for cycles with no output.
    ProductionComplete { tile: Tile, offline: bool },
    /// The market hour bucket changed.
    PriceUpdated { price_id: u64 },
    /// Visual amount popping out of a tile.
    Floater {
        tile: Tile,
        resource: ResourceId,
        amount: Fixed64,
    },
    TechUnlocked { tech: TechId },
}

/// Discriminant of [`SimEvent`], used for suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    BuildingOrUpgradeComplete,
    BuildingComplete,
    ProductionComplete,
    PriceUpdated,
    Floater,
    TechUnlocked,
}

impl EventKind {
    const COUNT: usize = 6;

    fn index(self) -> usize {
        self as usize
    }
}

impl SimEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            SimEvent::BuildingOrUpgradeComplete { .. } => EventKind::BuildingOrUpgradeComplete,
            SimEvent::BuildingComplete { .. } => EventKind::BuildingComplete,
            SimEvent::ProductionComplete { .. } => EventKind::ProductionComplete,
            SimEvent::PriceUpdated { .. } => EventKind::PriceUpdated,
            SimEvent::Floater { .. } => EventKind::Floater,
            SimEvent::TechUnlocked { .. } => EventKind::TechUnlocked,
        }
    }

    /// Tile the event refers to, if any.
    pub fn tile(&self) -> Option<Tile> {
        match self {
            SimEvent::BuildingOrUpgradeComplete { tile }
            | SimEvent::BuildingComplete { tile }
            | SimEvent::ProductionComplete { tile, .. }
            | SimEvent::Floater { tile, .. } => Some(*tile),
            SimEvent::PriceUpdated { .. } | SimEvent::TechUnlocked { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Queue
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: Vec<SimEvent>,
    suppressed: [bool; EventKind::COUNT],
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event. No-ops if its kind is suppressed.
    pub fn emit(&mut self, event: SimEvent) {
        if self.suppressed[event.kind().index()] {
            return;
        }
        self.events.push(event);
    }

    /// Stop recording a kind. Already buffered events of that kind are
    /// dropped.
    pub fn suppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = true;
        self.events.retain(|e| e.kind() != kind);
    }

    pub fn unsuppress(&mut self, kind: EventKind) {
        self.suppressed[kind.index()] = false;
    }

    pub fn is_suppressed(&self, kind: EventKind) -> bool {
        self.suppressed[kind.index()]
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SimEvent> {
        self.events.iter()
    }

    /// Take every buffered event, in emission order.
    pub fn drain(&mut self) -> Vec<SimEvent> {
        std::mem::take(&mut self.events)
    }
}
