//! Static content tables: resources, buildings and unlockables.
//!
//! The registry is assembled through [`RegistryBuilder`] and frozen by
//! [`RegistryBuilder::build`]. The simulation only ever reads it.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::fixed::{Fixed64, from_count};
use crate::id::*;
use crate::resource::ResourceMap;

// ---------------------------------------------------------------------------
// Resources
// ---------------------------------------------------------------------------

/// How a resource moves through the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Stored in buildings and carried by transports.
    Transportable,
    /// Sinks into the headquarter's wallet.
    Science,
    /// Sinks into the headquarter and the global pollution counter.
    Pollution,
    /// Marks the producer as a power plant.
    Power,
    /// Feeds the global worker pool.
    Worker,
}

impl ResourceKind {
    pub fn is_transportable(self) -> bool {
        matches!(self, ResourceKind::Transportable)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDef {
    pub name: String,
    pub kind: ResourceKind,
    /// Market price. `None` means the resource cannot be traded.
    pub price: Option<Fixed64>,
    /// Tech that unlocks trading of this resource, if any.
    pub unlocked_by: Option<TechId>,
}

// ---------------------------------------------------------------------------
// Buildings
// ---------------------------------------------------------------------------

/// Variant tag for a building template. Determines which
/// [`BuildingKind`](crate::building::BuildingKind) a placed building gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BuildingClass {
    Standard,
    Market,
    Warehouse,
    ResourceImport,
    CloneFactory,
    SwissBank,
}

impl BuildingClass {
    /// Warehouses and import buildings are source candidates for every
    /// resource and take their input from configured imports.
    pub fn is_import_capable(self) -> bool {
        matches!(self, BuildingClass::Warehouse | BuildingClass::ResourceImport)
    }
}

/// How the construction cost of one level grows with level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum CostScaling {
    /// Every level costs the base amount.
    Flat,
    /// Level `l -> l+1` costs `base * (l + 1)`.
    Linear,
    /// Level `l -> l+1` costs `base * m^l`.
    Exponential(Fixed64),
}

/// Effect carried by a one-of-a-kind building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecialEffect {
    /// Receives science and pollution output.
    Headquarter,
    /// Transports within range have unlimited capacity.
    UnlimitedTransport,
    /// Transports within range arrive after one tick.
    ImmediateTransport,
    /// Nearby markets get their own price pairing.
    PriceStabilizer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildingDef {
    pub name: String,
    pub class: BuildingClass,
    /// Per-level input consumed each production tick.
    pub input: ResourceMap,
    /// Per-level output produced each production tick.
    pub output: ResourceMap,
    /// Base cost of one level.
    pub construction_cost: ResourceMap,
    pub cost_scaling: CostScaling,
    pub tier: u32,
    /// Consumes power: only produces when connected to the power grid.
    pub power: bool,
    /// The tile must carry all of these deposits.
    pub deposit: BTreeSet<ResourceId>,
    pub range: Option<u32>,
    /// Maximum number of instances in the world.
    pub max: Option<u32>,
    pub special: Option<SpecialEffect>,
    /// Skipped entirely until its tile is explored.
    pub natural_wonder: bool,
    pub world_wonder: bool,
    /// Storage per level.
    pub storage: Fixed64,
    /// Workers needed per level.
    pub workers: Fixed64,
    /// Amount of construction material requested per tick.
    pub builder_capacity: Fixed64,
    /// Import capacity per level (Warehouse / ResourceImport).
    pub import_capacity: Fixed64,
    /// Value a market trades per level per tick.
    pub trade_value: Fixed64,
}

impl BuildingDef {
    /// A template with empty tables and neutral defaults.
    pub fn new(name: &str, class: BuildingClass) -> Self {
        Self {
            name: name.to_string(),
            class,
            input: ResourceMap::new(),
            output: ResourceMap::new(),
            construction_cost: ResourceMap::new(),
            cost_scaling: CostScaling::Linear,
            tier: 1,
            power: false,
            deposit: BTreeSet::new(),
            range: None,
            max: None,
            special: None,
            natural_wonder: false,
            world_wonder: false,
            storage: Fixed64::ZERO,
            workers: Fixed64::ZERO,
            builder_capacity: Fixed64::ONE,
            import_capacity: Fixed64::ZERO,
            trade_value: Fixed64::ZERO,
        }
    }

    /// One-of-a-kind buildings (wonders, headquarter).
    pub fn is_special(&self) -> bool {
        self.max == Some(1)
    }

    fn level_factor(&self, level: u32) -> Fixed64 {
        match self.cost_scaling {
            CostScaling::Flat => Fixed64::ONE,
            CostScaling::Linear => from_count(level.saturating_add(1)),
            CostScaling::Exponential(m) => {
                (0..level).fold(Fixed64::ONE, |acc, _| acc.saturating_mul(m))
            }
        }
    }

    /// Cost of raising `level` by one with `stack` copies.
    pub fn level_cost(&self, level: u32, stack: u32) -> ResourceMap {
        self.construction_cost
            .scaled(self.level_factor(level).saturating_mul(from_count(stack)))
    }

    /// Cost of going from level `from` to level `to` with `stack` copies.
    pub fn total_cost(&self, from: u32, to: u32, stack: u32) -> ResourceMap {
        let mut out = ResourceMap::new();
        for level in from..to {
            out.add_all(&self.level_cost(level, stack));
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Unlockables
// ---------------------------------------------------------------------------

/// Additive bonuses applied to a building type or a tile. Each field is
/// added to a base of one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Multiplier {
    pub output: Fixed64,
    pub input: Fixed64,
    pub worker: Fixed64,
    pub storage: Fixed64,
    /// Where the bonus comes from (for the UI).
    pub source: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GlobalMultiplierKind {
    BuilderCapacity,
    TransportCapacity,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnlockableDef {
    pub name: String,
    pub unlock_buildings: Vec<BuildingTypeId>,
    pub building_multipliers: Vec<(BuildingTypeId, Multiplier)>,
    pub global_multipliers: Vec<(GlobalMultiplierKind, Fixed64)>,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for constructing an immutable Registry.
/// Three-phase lifecycle: registration -> mutation -> finalization.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    resources: Vec<ResourceDef>,
    resource_name_to_id: HashMap<String, ResourceId>,
    buildings: Vec<BuildingDef>,
    building_name_to_id: HashMap<String, BuildingTypeId>,
    unlockables: Vec<UnlockableDef>,
    unlockable_name_to_id: HashMap<String, TechId>,
    duplicates: Vec<String>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Phase 1: Register a resource. Returns its ID.
    pub fn register_resource(&mut self, name: &str, kind: ResourceKind) -> ResourceId {
        let id = ResourceId(self.resources.len() as u32);
        self.resources.push(ResourceDef {
            name: name.to_string(),
            kind,
            price: None,
            unlocked_by: None,
        });
        if self.resource_name_to_id.insert(name.to_string(), id).is_some() {
            self.duplicates.push(name.to_string());
        }
        id
    }

    /// Phase 1: Register a building template. Returns its ID.
    pub fn register_building(&mut self, def: BuildingDef) -> BuildingTypeId {
        let id = BuildingTypeId(self.buildings.len() as u32);
        if self.building_name_to_id.insert(def.name.clone(), id).is_some() {
            self.duplicates.push(def.name.clone());
        }
        self.buildings.push(def);
        id
    }

    /// Phase 1: Register an unlockable. Returns its ID.
    pub fn register_unlockable(&mut self, def: UnlockableDef) -> TechId {
        let id = TechId(self.unlockables.len() as u32);
        if self.unlockable_name_to_id.insert(def.name.clone(), id).is_some() {
            self.duplicates.push(def.name.clone());
        }
        self.unlockables.push(def);
        id
    }

    /// Phase 2: Mutate an existing resource by name.
    pub fn mutate_resource<F>(&mut self, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut ResourceDef),
    {
        let id = self
            .resource_name_to_id
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        f(&mut self.resources[id.0 as usize]);
        Ok(())
    }

    /// Phase 2: Mutate an existing building template by name.
    pub fn mutate_building<F>(&mut self, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: FnOnce(&mut BuildingDef),
    {
        let id = self
            .building_name_to_id
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))?;
        f(&mut self.buildings[id.0 as usize]);
        Ok(())
    }

    pub fn resource_id(&self, name: &str) -> Option<ResourceId> {
        self.resource_name_to_id.get(name).copied()
    }

    pub fn building_id(&self, name: &str) -> Option<BuildingTypeId> {
        self.building_name_to_id.get(name).copied()
    }

    pub fn unlockable_id(&self, name: &str) -> Option<TechId> {
        self.unlockable_name_to_id.get(name).copied()
    }

    /// Phase 3: Validate references and freeze.
    pub fn build(self) -> Result<Registry, RegistryError> {
        if let Some(name) = self.duplicates.into_iter().next() {
            return Err(RegistryError::Duplicate(name));
        }
        let resource_count = self.resources.len();
        let check_res = |r: ResourceId| {
            if r.0 as usize >= resource_count {
                Err(RegistryError::InvalidResourceRef(r))
            } else {
                Ok(())
            }
        };
        for def in &self.buildings {
            for r in def
                .input
                .keys()
                .chain(def.output.keys())
                .chain(def.construction_cost.keys())
                .chain(def.deposit.iter().copied())
            {
                check_res(r)?;
            }
        }
        for def in &self.resources {
            if let Some(tech) = def.unlocked_by
                && tech.0 as usize >= self.unlockables.len()
            {
                return Err(RegistryError::InvalidTechRef(tech));
            }
        }
        let building_count = self.buildings.len();
        for def in &self.unlockables {
            for b in def
                .unlock_buildings
                .iter()
                .chain(def.building_multipliers.iter().map(|(b, _)| b))
            {
                if b.0 as usize >= building_count {
                    return Err(RegistryError::InvalidBuildingRef(*b));
                }
            }
        }

        Ok(Registry {
            resources: self.resources,
            resource_name_to_id: self.resource_name_to_id,
            buildings: self.buildings,
            building_name_to_id: self.building_name_to_id,
            unlockables: self.unlockables,
            unlockable_name_to_id: self.unlockable_name_to_id,
        })
    }
}

// ---------------------------------------------------------------------------
// Frozen registry
// ---------------------------------------------------------------------------

/// Immutable registry. Frozen after build(). Thread-safe to share.
#[derive(Debug)]
pub struct Registry {
    resources: Vec<ResourceDef>,
    resource_name_to_id: HashMap<String, ResourceId>,
    buildings: Vec<BuildingDef>,
    building_name_to_id: HashMap<String, BuildingTypeId>,
    unlockables: Vec<UnlockableDef>,
    unlockable_name_to_id: HashMap<String, TechId>,
}

impl Registry {
    pub fn resource(&self, id: ResourceId) -> Option<&ResourceDef> {
        self.resources.get(id.0 as usize)
    }

    pub fn building(&self, id: BuildingTypeId) -> Option<&BuildingDef> {
        self.buildings.get(id.0 as usize)
    }

    pub fn unlockable(&self, id: TechId) -> Option<&UnlockableDef> {
        self.unlockables.get(id.0 as usize)
    }

    pub fn resource_id(&self, name: &str) -> Option<ResourceId> {
        self.resource_name_to_id.get(name).copied()
    }

    pub fn building_id(&self, name: &str) -> Option<BuildingTypeId> {
        self.building_name_to_id.get(name).copied()
    }

    pub fn unlockable_id(&self, name: &str) -> Option<TechId> {
        self.unlockable_name_to_id.get(name).copied()
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    pub fn building_count(&self) -> usize {
        self.buildings.len()
    }

    pub fn unlockable_count(&self) -> usize {
        self.unlockables.len()
    }

    pub fn resources(&self) -> impl Iterator<Item = (ResourceId, &ResourceDef)> {
        self.resources
            .iter()
            .enumerate()
            .map(|(i, d)| (ResourceId(i as u32), d))
    }

    pub fn buildings(&self) -> impl Iterator<Item = (BuildingTypeId, &BuildingDef)> {
        self.buildings
            .iter()
            .enumerate()
            .map(|(i, d)| (BuildingTypeId(i as u32), d))
    }

    /// Unknown resources count as non-transportable.
    pub fn is_transportable(&self, id: ResourceId) -> bool {
        self.resource(id).is_some_and(|d| d.kind.is_transportable())
    }

    pub fn resource_kind(&self, id: ResourceId) -> Option<ResourceKind> {
        self.resource(id).map(|d| d.kind)
    }

    pub fn price(&self, id: ResourceId) -> Option<Fixed64> {
        self.resource(id).and_then(|d| d.price)
    }

    /// The resource that fuels transports and staffs buildings.
    pub fn worker_resource(&self) -> Option<ResourceId> {
        self.resources()
            .find(|(_, d)| d.kind == ResourceKind::Worker)
            .map(|(id, _)| id)
    }

    /// Building types carrying `effect`.
    pub fn buildings_with_effect(&self, effect: SpecialEffect) -> Vec<BuildingTypeId> {
        self.buildings()
            .filter(|(_, d)| d.special == Some(effect))
            .map(|(id, _)| id)
            .collect()
    }

    /// Storage needed for the transportable part of `map`.
    pub fn storage_required(&self, map: &ResourceMap) -> Fixed64 {
        map.iter()
            .filter(|(r, _)| self.is_transportable(*r))
            .fold(Fixed64::ZERO, |acc, (_, a)| acc.saturating_add(a))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("duplicate name: {0}")]
    Duplicate(String),
    #[error("invalid resource reference: {0:?}")]
    InvalidResourceRef(ResourceId),
    #[error("invalid building reference: {0:?}")]
    InvalidBuildingRef(BuildingTypeId),
    #[error("invalid tech reference: {0:?}")]
    InvalidTechRef(TechId),
}
