//! Per-tick aggregates and the current/next double buffer.
//!
//! During a tick every read of aggregate state goes to
//! [`TickBuffers::current`] (the previous tick, finalized) and every write
//! goes to [`TickBuffers::next`]. Tile processing order therefore cannot
//! leak into what other tiles observe within the same tick.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::fixed::Fixed64;
use crate::id::{BuildingTypeId, ResourceId, Tile};
use crate::registry::{GlobalMultiplierKind, Multiplier};
use crate::resource::ResourceMap;

/// Why a tile did not produce (or advance construction) this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotProducingReason {
    NotOnDeposit,
    TurnedOff,
    NoPower,
    NotEnoughWorkers,
    NotEnoughResources,
    StorageFull,
    NoActiveTransports,
}

/// A tile offering a resource, as tabulated last tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSource {
    pub tile: Tile,
    pub amount: Fixed64,
    pub used_storage_percentage: Fixed64,
}

/// Which part of a [`Multiplier`] to sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultiplierField {
    Output,
    Input,
    Worker,
    Storage,
}

impl MultiplierField {
    fn pick(self, m: &Multiplier) -> Fixed64 {
        match self {
            MultiplierField::Output => m.output,
            MultiplierField::Input => m.input,
            MultiplierField::Worker => m.worker,
            MultiplierField::Storage => m.storage,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickData {
    /// Every non-import building holding or producing a resource.
    pub resources_by_tile: BTreeMap<ResourceId, Vec<ResourceSource>>,
    /// Import-capable buildings and their used storage percentage.
    pub resource_import_buildings: BTreeMap<Tile, Fixed64>,
    /// Holdings of completed buildings, summed.
    pub resource_amount: ResourceMap,
    pub total_value: Fixed64,
    pub not_producing_reasons: BTreeMap<Tile, NotProducingReason>,
    pub storage_percentages: BTreeMap<Tile, Fixed64>,
    /// One-of-a-kind buildings by type.
    pub special_buildings: BTreeMap<BuildingTypeId, Tile>,
    pub power_plants: BTreeSet<Tile>,
    pub power_buildings: BTreeSet<Tile>,
    pub power_grid: BTreeSet<Tile>,
    /// Non-transportable output pooled for the next tick (workers, power).
    pub workers_available: ResourceMap,
    pub science_produced: BTreeMap<Tile, Fixed64>,
    pub pollution_produced: BTreeMap<Tile, Fixed64>,
    pub unlocked_buildings: BTreeSet<BuildingTypeId>,
    pub building_multipliers: BTreeMap<BuildingTypeId, Vec<Multiplier>>,
    pub tile_multipliers: BTreeMap<Tile, Vec<Multiplier>>,
    pub global_multipliers: BTreeMap<GlobalMultiplierKind, Vec<(Fixed64, String)>>,
}

impl TickData {
    /// `base + Σ` of one multiplier field for a building type on a tile.
    pub fn total_multiplier_for(
        &self,
        tile: Tile,
        type_id: BuildingTypeId,
        field: MultiplierField,
        base: Fixed64,
    ) -> Fixed64 {
        let by_type = self.building_multipliers.get(&type_id).into_iter().flatten();
        let by_tile = self.tile_multipliers.get(&tile).into_iter().flatten();
        by_type
            .chain(by_tile)
            .fold(base, |acc, m| acc.saturating_add(field.pick(m)))
    }

    pub fn global_multiplier(&self, kind: GlobalMultiplierKind) -> Fixed64 {
        self.global_multipliers
            .get(&kind)
            .into_iter()
            .flatten()
            .fold(Fixed64::ZERO, |acc, (v, _)| acc.saturating_add(*v))
    }

    pub fn add_global_multiplier(&mut self, kind: GlobalMultiplierKind, value: Fixed64, source: &str) {
        self.global_multipliers
            .entry(kind)
            .or_default()
            .push((value, source.to_string()));
    }

    pub fn add_source(&mut self, res: ResourceId, source: ResourceSource) {
        self.resources_by_tile.entry(res).or_default().push(source);
    }

    pub fn has_source(&self, res: ResourceId, tile: Tile) -> bool {
        self.resources_by_tile
            .get(&res)
            .is_some_and(|v| v.iter().any(|s| s.tile == tile))
    }
}

/// The double buffer. Swapped once at the start of every tick.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickBuffers {
    pub current: TickData,
    pub next: TickData,
}

impl TickBuffers {
    pub fn new() -> Self {
        Self::default()
    }

    /// `current <- next`, `next <- empty`.
    pub fn swap(&mut self) {
        self.current = std::mem::take(&mut self.next);
    }
}

/// Scratch state that lives for exactly one tick.
#[derive(Debug, Clone, Default)]
pub struct IntraTickCache {
    /// Workers (and other pooled resources) consumed so far this tick.
    pub workers_used: ResourceMap,
}

impl IntraTickCache {
    pub fn clear(&mut self) {
        self.workers_used.clear();
    }

    /// Pool size from last tick minus what was used this tick.
    pub fn available_workers(&self, current: &TickData, res: ResourceId) -> Fixed64 {
        current
            .workers_available
            .get(res)
            .saturating_sub(self.workers_used.get(res))
    }

    pub fn use_workers(&mut self, res: ResourceId, amount: Fixed64) {
        if amount > Fixed64::ZERO {
            self.workers_used.add(res, amount);
        }
    }
}
