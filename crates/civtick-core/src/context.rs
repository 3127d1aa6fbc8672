use crate::cache::TransportSourceCache;
use crate::event::{EventQueue, SimEvent};
use crate::fixed::Fixed64;
use crate::id::{ResourceId, Tile};
use crate::options::GameOptions;
use crate::registry::{Registry, SpecialEffect};
use crate::tick_data::{IntraTickCache, NotProducingReason, TickData};
use crate::transport::TransportQueue;
use crate::world::World;

/// Transportable output waiting to be stored once the tile pass ends.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingDeposit {
    pub tile: Tile,
    pub resource: ResourceId,
    pub amount: Fixed64,
}

/// Everything one tile step may read or write.
///
/// `current` is read-only for the whole tile pass; aggregates are written
/// to `next` only.
pub struct TickContext<'a> {
    pub registry: &'a Registry,
    pub options: &'a GameOptions,
    pub world: &'a mut World,
    pub current: &'a TickData,
    pub next: &'a mut TickData,
    pub intra: &'a mut IntraTickCache,
    pub transports: &'a mut TransportQueue,
    pub source_cache: &'a mut TransportSourceCache,
    pub events: &'a mut EventQueue,
    pub pending_deposits: &'a mut Vec<PendingDeposit>,
    /// Resource used as transport fuel and production labor.
    pub worker: Option<ResourceId>,
    pub offline: bool,
}

impl TickContext<'_> {
    pub fn available_workers(&self) -> Fixed64 {
        match self.worker {
            Some(w) => self.intra.available_workers(self.current, w),
            None => Fixed64::ZERO,
        }
    }

    pub fn use_workers(&mut self, amount: Fixed64) {
        if let Some(w) = self.worker {
            self.intra.use_workers(w, amount);
        }
    }

    pub fn emit(&mut self, event: SimEvent) {
        self.events.emit(event);
    }

    pub fn set_reason(&mut self, tile: Tile, reason: NotProducingReason) {
        self.next.not_producing_reasons.insert(tile, reason);
    }

    /// Tiles of last tick's special buildings carrying `effect`.
    pub fn special_tiles(&self, effect: SpecialEffect) -> Vec<Tile> {
        self.current
            .special_buildings
            .iter()
            .filter(|(ty, _)| {
                self.registry
                    .building(**ty)
                    .is_some_and(|d| d.special == Some(effect))
            })
            .map(|(_, t)| *t)
            .collect()
    }

    /// True when some special building with `effect` is within `radius`.
    pub fn near_special(&self, tile: Tile, effect: SpecialEffect, radius: u32) -> bool {
        self.special_tiles(effect)
            .into_iter()
            .any(|s| self.world.grid.distance(s, tile) <= radius)
    }
}
