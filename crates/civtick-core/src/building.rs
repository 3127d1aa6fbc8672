//! Placed buildings and their per-kind state.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::fixed::Fixed64;
use crate::id::{BuildingTypeId, ResourceId};
use crate::registry::{BuildingClass, BuildingDef};
use crate::resource::ResourceMap;

/// Construction / production state of a building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildingStatus {
    Building,
    Upgrading,
    Downgrading,
    Stacking,
    Completed,
    Paused,
}

impl BuildingStatus {
    /// Building or upgrading: material is still being delivered for a level.
    pub fn is_under_construction(self) -> bool {
        matches!(self, BuildingStatus::Building | BuildingStatus::Upgrading)
    }
}

/// Why an input is not being requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SuspendedInput {
    /// Enough material has arrived; set and cleared by the simulation.
    AutoSuspended,
    /// Player turned the input off; never cleared by the simulation.
    ManualSuspended,
}

/// How the router orders source candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InputMode {
    /// Nearest first.
    #[default]
    Distance,
    /// Largest holding first.
    Amount,
    /// Fullest storage first.
    StoragePercentage,
}

// ---------------------------------------------------------------------------
// Kind-specific state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketState {
    /// Sell resource -> buy resource pairing for the current hour.
    pub available_resources: BTreeMap<ResourceId, ResourceId>,
    /// Resources the player chose to sell.
    pub sell_resources: BTreeSet<ResourceId>,
    /// Drop every sell choice when the pairing is regenerated.
    pub clear_after_update: bool,
}

/// One configured import of a Warehouse or ResourceImport building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceImport {
    /// Requested every production tick.
    pub per_cycle: Fixed64,
    /// Stop importing once holdings plus in-transit reach this.
    pub cap: Fixed64,
    pub input_mode: InputMode,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceImportState {
    pub resource_imports: BTreeMap<ResourceId, ResourceImport>,
    /// Recompute imports from nearby producers every tick.
    pub managed_import: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseOptions {
    /// Pull from storage-full buildings nearby.
    pub autopilot: bool,
    /// Autopilot only pulls resources that have an import cap left.
    pub autopilot_respect_cap: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CloneState {
    pub input_resource: Option<ResourceId>,
    /// Amount delivered by transports and not yet consumed.
    pub transported_amount: Fixed64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwissBankState {
    /// Holdings are never offered to the router.
    pub no_export: bool,
}

/// Kind-specific state. Dispatch matches on the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BuildingKind {
    Standard,
    Market(MarketState),
    Warehouse {
        imports: ResourceImportState,
        options: WarehouseOptions,
    },
    ResourceImport(ResourceImportState),
    CloneFactory(CloneState),
    SwissBank(SwissBankState),
}

impl BuildingKind {
    pub fn for_class(class: BuildingClass) -> Self {
        match class {
            BuildingClass::Standard => BuildingKind::Standard,
            BuildingClass::Market => BuildingKind::Market(MarketState::default()),
            BuildingClass::Warehouse => BuildingKind::Warehouse {
                imports: ResourceImportState::default(),
                options: WarehouseOptions::default(),
            },
            BuildingClass::ResourceImport => {
                BuildingKind::ResourceImport(ResourceImportState::default())
            }
            BuildingClass::CloneFactory => BuildingKind::CloneFactory(CloneState::default()),
            BuildingClass::SwissBank => BuildingKind::SwissBank(SwissBankState::default()),
        }
    }

    /// Import configuration for import-capable kinds.
    pub fn imports(&self) -> Option<&ResourceImportState> {
        match self {
            BuildingKind::Warehouse { imports, .. } | BuildingKind::ResourceImport(imports) => {
                Some(imports)
            }
            _ => None,
        }
    }

    pub fn imports_mut(&mut self) -> Option<&mut ResourceImportState> {
        match self {
            BuildingKind::Warehouse { imports, .. } | BuildingKind::ResourceImport(imports) => {
                Some(imports)
            }
            _ => None,
        }
    }

    pub fn is_import_capable(&self) -> bool {
        self.imports().is_some()
    }

    pub fn is_warehouse(&self) -> bool {
        matches!(self, BuildingKind::Warehouse { .. })
    }
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub type_id: BuildingTypeId,
    pub level: u32,
    pub desired_level: u32,
    pub stack: u32,
    pub desired_stack: u32,
    pub status: BuildingStatus,
    /// Production throttle in `[0, 1]`. Zero turns the building off.
    pub capacity: Fixed64,
    pub priority: u8,
    pub construction_priority: u8,
    pub resources: ResourceMap,
    pub suspended_input: BTreeMap<ResourceId, SuspendedInput>,
    /// Overrides the game-wide default input mode.
    pub input_mode: Option<InputMode>,
    pub max_input_distance: Option<u32>,
    /// Input multiples requested per production tick.
    pub stockpile_capacity: u32,
    /// Input multiples held before requests stop. `None` shares storage.
    pub stockpile_max: Option<u32>,
    pub kind: BuildingKind,
}

impl Building {
    /// A fresh construction site: level 0, building toward level 1.
    pub fn new(type_id: BuildingTypeId, def: &BuildingDef) -> Self {
        Self {
            type_id,
            level: 0,
            desired_level: 1,
            stack: 1,
            desired_stack: 1,
            status: BuildingStatus::Building,
            capacity: Fixed64::ONE,
            priority: 1,
            construction_priority: 1,
            resources: ResourceMap::new(),
            suspended_input: BTreeMap::new(),
            input_mode: None,
            max_input_distance: None,
            stockpile_capacity: 1,
            stockpile_max: Some(5),
            kind: BuildingKind::for_class(def.class),
        }
    }

    /// Priority used for tile ordering this tick.
    pub fn current_priority(&self) -> u8 {
        if self.status.is_under_construction() {
            self.construction_priority
        } else {
            self.priority
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_building_is_a_site() {
        let def = BuildingDef::new("Hut", BuildingClass::Standard);
        let b = Building::new(BuildingTypeId(0), &def);
        assert_eq!(b.status, BuildingStatus::Building);
        assert_eq!(b.level, 0);
        assert_eq!(b.desired_level, 1);
        assert_eq!(b.kind, BuildingKind::Standard);
    }

    #[test]
    fn kind_follows_class() {
        let def = BuildingDef::new("Warehouse", BuildingClass::Warehouse);
        let b = Building::new(BuildingTypeId(1), &def);
        assert!(b.kind.is_import_capable());
        assert!(b.kind.is_warehouse());
        let def = BuildingDef::new("Market", BuildingClass::Market);
        assert!(!Building::new(BuildingTypeId(2), &def).kind.is_import_capable());
    }

    #[test]
    fn construction_priority_applies_while_building() {
        let def = BuildingDef::new("Hut", BuildingClass::Standard);
        let mut b = Building::new(BuildingTypeId(0), &def);
        b.priority = 3;
        b.construction_priority = 7;
        assert_eq!(b.current_priority(), 7);
        b.status = BuildingStatus::Completed;
        assert_eq!(b.current_priority(), 3);
    }
}
