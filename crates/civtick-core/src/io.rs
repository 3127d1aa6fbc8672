//! Quantities derived from a building's template, level and multipliers:
//! input/output tables, storage, worker need and builder capacity.

use crate::building::{Building, BuildingKind};
use crate::fixed::{Fixed64, div_or_zero, from_count};
use crate::id::{ResourceId, Tile};
use crate::registry::{BuildingDef, GlobalMultiplierKind, Registry};
use crate::resource::ResourceMap;
use crate::tick_data::{MultiplierField, TickData};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoDirection {
    Input,
    Output,
}

/// What to fold into an IO table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IoScale {
    pub multiplier: bool,
    pub capacity: bool,
}

impl IoScale {
    pub const RAW: IoScale = IoScale {
        multiplier: false,
        capacity: false,
    };
    pub const FULL: IoScale = IoScale {
        multiplier: true,
        capacity: true,
    };
}

/// Per-tick amount a market sells of `sell`, before capacity.
pub fn market_sell_amount(
    registry: &Registry,
    def: &BuildingDef,
    building: &Building,
    sell: ResourceId,
) -> Fixed64 {
    let Some(price) = registry.price(sell) else {
        return Fixed64::ZERO;
    };
    let value = def
        .trade_value
        .saturating_mul(from_count(building.level))
        .saturating_mul(from_count(building.stack));
    div_or_zero(value, price)
}

/// What selling `amount` of `sell` buys of `buy`.
pub fn market_buy_amount(
    registry: &Registry,
    sell: ResourceId,
    amount: Fixed64,
    buy: ResourceId,
) -> Fixed64 {
    match (registry.price(sell), registry.price(buy)) {
        (Some(ps), Some(pb)) => div_or_zero(amount.saturating_mul(ps), pb),
        _ => Fixed64::ZERO,
    }
}

/// Input or output of `building` for one production tick.
pub fn building_io(
    registry: &Registry,
    current: &TickData,
    tile: Tile,
    building: &Building,
    dir: IoDirection,
    scale: IoScale,
) -> ResourceMap {
    let Some(def) = registry.building(building.type_id) else {
        return ResourceMap::new();
    };
    let level_stack = from_count(building.level).saturating_mul(from_count(building.stack));
    let base = match &building.kind {
        BuildingKind::Warehouse { imports, .. } | BuildingKind::ResourceImport(imports) => {
            // Import tables are absolute, not per level.
            return match dir {
                IoDirection::Input => imports
                    .resource_imports
                    .iter()
                    .map(|(r, ri)| (*r, ri.per_cycle))
                    .collect(),
                IoDirection::Output => ResourceMap::new(),
            };
        }
        BuildingKind::Market(market) => {
            let mut m = ResourceMap::new();
            for sell in &market.sell_resources {
                let Some(buy) = market.available_resources.get(sell) else {
                    continue;
                };
                let amount = market_sell_amount(registry, def, building, *sell);
                match dir {
                    IoDirection::Input => m.add(*sell, amount),
                    IoDirection::Output => {
                        m.add(*buy, market_buy_amount(registry, *sell, amount, *buy))
                    }
                }
            }
            m
        }
        BuildingKind::CloneFactory(clone) => match clone.input_resource {
            Some(res) => {
                let per_level = match dir {
                    IoDirection::Input => Fixed64::ONE,
                    IoDirection::Output => Fixed64::from_num(2),
                };
                [(res, per_level.saturating_mul(level_stack))].into_iter().collect()
            }
            None => ResourceMap::new(),
        },
        BuildingKind::Standard | BuildingKind::SwissBank(_) => match dir {
            IoDirection::Input => def.input.scaled(level_stack),
            IoDirection::Output => def.output.scaled(level_stack),
        },
    };
    let mut factor = Fixed64::ONE;
    if scale.multiplier {
        let field = match dir {
            IoDirection::Input => MultiplierField::Input,
            IoDirection::Output => MultiplierField::Output,
        };
        factor = current.total_multiplier_for(tile, building.type_id, field, Fixed64::ONE);
    }
    if scale.capacity {
        factor = factor.saturating_mul(building.capacity);
    }
    base.scaled(factor)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Storage {
    pub total: Fixed64,
    pub used: Fixed64,
}

impl Storage {
    /// Used over total; a building without storage counts as full.
    pub fn percentage(&self) -> Fixed64 {
        if self.total <= Fixed64::ZERO {
            return Fixed64::ONE;
        }
        div_or_zero(self.used, self.total)
    }

    pub fn free(&self) -> Fixed64 {
        self.total.saturating_sub(self.used).max(Fixed64::ZERO)
    }
}

pub fn storage_for(registry: &Registry, current: &TickData, tile: Tile, building: &Building) -> Storage {
    let used = registry.storage_required(&building.resources);
    let Some(def) = registry.building(building.type_id) else {
        return Storage {
            total: Fixed64::ZERO,
            used,
        };
    };
    let multiplier =
        current.total_multiplier_for(tile, building.type_id, MultiplierField::Storage, Fixed64::ONE);
    let total = def
        .storage
        .saturating_mul(from_count(building.level.max(1)))
        .saturating_mul(from_count(building.stack))
        .saturating_mul(multiplier);
    Storage { total, used }
}

/// Workers a building needs for one production tick.
pub fn workers_required(def: &BuildingDef, building: &Building) -> Fixed64 {
    def.workers
        .saturating_mul(from_count(building.level))
        .saturating_mul(from_count(building.stack))
        .saturating_mul(building.capacity)
}

/// Construction material a site may request per tick.
pub fn builder_capacity(def: &BuildingDef, building: &Building, current: &TickData) -> Fixed64 {
    let multiplier = Fixed64::ONE
        .saturating_add(current.global_multiplier(GlobalMultiplierKind::BuilderCapacity));
    def.builder_capacity
        .saturating_mul(from_count(building.level.max(1)))
        .saturating_mul(multiplier)
}

/// Per-trip capacity of one worker carrying input for `tile`.
pub fn input_worker_capacity(current: &TickData, tile: Tile, building: &Building) -> Fixed64 {
    current.total_multiplier_for(tile, building.type_id, MultiplierField::Worker, Fixed64::ONE)
}

/// How much of `res` a source building can give away right now.
pub fn available_resource(
    registry: &Registry,
    current: &TickData,
    tile: Tile,
    building: &Building,
    res: ResourceId,
) -> Fixed64 {
    let held = building.resources.get(res);
    if building.kind.is_import_capable() {
        return held;
    }
    let input = building_io(registry, current, tile, building, IoDirection::Input, IoScale::RAW);
    if input.contains(res) {
        return Fixed64::ZERO;
    }
    held
}
