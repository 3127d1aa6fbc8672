//! Production engine: per-tile tabulation, input requests, gate checks and
//! output.
//!
//! Gates run in a fixed order and the first failing one is recorded as the
//! tile's [`NotProducingReason`]:
//!
//! ```text
//! NotOnDeposit -> TurnedOff -> NoPower -> NotEnoughWorkers
//!     -> NotEnoughResources -> StorageFull
//! ```
//!
//! Transportable output is not stored right away. It becomes a
//! [`PendingDeposit`] that the engine applies after the tile pass, so goods
//! made this tick are never shipped this tick.

use crate::building::{Building, BuildingKind, BuildingStatus, InputMode, ResourceImport, SuspendedInput};
use crate::context::{PendingDeposit, TickContext};
use crate::event::SimEvent;
use crate::fixed::{Fixed64, ceil_div, div_or_zero, from_count};
use crate::id::{ResourceId, Tile};
use crate::io::{
    IoDirection, IoScale, building_io, input_worker_capacity, market_buy_amount,
    market_sell_amount, storage_for, workers_required,
};
use crate::registry::{GlobalMultiplierKind, Registry, ResourceKind, SpecialEffect};
use crate::resource::ResourceMap;
use crate::router::{RouteRequest, route};
use crate::tick_data::{NotProducingReason, ResourceSource, TickData};

// ---------------------------------------------------------------------------
// Tabulation
// ---------------------------------------------------------------------------

/// Publish this tile's holdings and role into `next`. Runs for every
/// processed tile before construction or production.
pub fn tabulate(ctx: &mut TickContext<'_>, tile: Tile) {
    let registry = ctx.registry;
    let current = ctx.current;
    let Some(b) = ctx.world.building(tile) else {
        return;
    };
    let Some(def) = registry.building(b.type_id) else {
        return;
    };
    let percentage = storage_for(registry, current, tile, b).percentage();
    let import_capable = b.kind.is_import_capable();
    let completed = b.status == BuildingStatus::Completed;

    for (res, amount) in b.resources.iter() {
        if completed {
            ctx.next.resource_amount.add(res, amount);
            if let Some(price) = registry.price(res) {
                ctx.next.total_value = ctx.next.total_value.saturating_add(amount.saturating_mul(price));
            }
        }
        if import_capable || !registry.is_transportable(res) {
            continue;
        }
        ctx.next.add_source(
            res,
            ResourceSource {
                tile,
                amount,
                used_storage_percentage: percentage,
            },
        );
    }

    if import_capable {
        ctx.next.resource_import_buildings.insert(tile, percentage);
    } else {
        // Producers are candidates even while empty or under construction.
        for res in output_resources(registry, current, tile, b) {
            if registry.is_transportable(res) && !b.resources.contains(res) {
                ctx.next.add_source(
                    res,
                    ResourceSource {
                        tile,
                        amount: Fixed64::ZERO,
                        used_storage_percentage: percentage,
                    },
                );
            }
        }
    }

    if def.is_special()
        && matches!(
            b.status,
            BuildingStatus::Completed
                | BuildingStatus::Upgrading
                | BuildingStatus::Downgrading
                | BuildingStatus::Stacking
        )
    {
        ctx.next.special_buildings.insert(b.type_id, tile);
    }
}

fn output_resources(registry: &Registry, current: &TickData, tile: Tile, b: &Building) -> Vec<ResourceId> {
    match &b.kind {
        BuildingKind::Standard | BuildingKind::SwissBank(_) => registry
            .building(b.type_id)
            .map(|d| d.output.keys().collect())
            .unwrap_or_default(),
        _ => building_io(registry, current, tile, b, IoDirection::Output, IoScale::RAW)
            .keys()
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Production
// ---------------------------------------------------------------------------

/// Run one production tick for the completed building on `tile`.
pub fn tick_production(ctx: &mut TickContext<'_>, tile: Tile) {
    let registry = ctx.registry;
    let current = ctx.current;
    let Some(tile_data) = ctx.world.tile(tile) else {
        return;
    };
    let Some(b) = tile_data.building.as_ref() else {
        return;
    };
    let Some(def) = registry.building(b.type_id) else {
        return;
    };
    let percentage = storage_for(registry, current, tile, b).percentage();
    let on_deposit = def.deposit.iter().all(|d| tile_data.deposit.contains(d));
    let turned_off = b.capacity <= Fixed64::ZERO;
    let managed = b.kind.imports().is_some_and(|i| i.managed_import);

    ctx.next.storage_percentages.insert(tile, percentage);
    if !on_deposit {
        ctx.set_reason(tile, NotProducingReason::NotOnDeposit);
        return;
    }
    if turned_off {
        ctx.set_reason(tile, NotProducingReason::TurnedOff);
        return;
    }
    if managed {
        refresh_managed_imports(ctx, tile);
    }

    let transported = transport_inputs(ctx, tile);

    let Some(b) = ctx.world.building(tile) else {
        return;
    };
    if b.kind.is_import_capable() {
        let autopilot = match &b.kind {
            BuildingKind::Warehouse { options, .. } => options.autopilot,
            _ => false,
        };
        let storage = storage_for(registry, current, tile, b);
        if storage.used >= storage.total {
            ctx.set_reason(tile, NotProducingReason::StorageFull);
        } else if !transported {
            ctx.set_reason(tile, NotProducingReason::NoActiveTransports);
        }
        if autopilot && ctx.world.upgrades.warehouse_upgrade {
            warehouse_autopilot(ctx, tile);
        }
        return;
    }
    if matches!(b.kind, BuildingKind::Market(_)) {
        market_production(ctx, tile);
        return;
    }
    produce(ctx, tile);
}

/// Gates and output for standard, clone and bank buildings.
fn produce(ctx: &mut TickContext<'_>, tile: Tile) {
    let registry = ctx.registry;
    let current = ctx.current;
    let Some(b) = ctx.world.building(tile) else {
        return;
    };
    let Some(def) = registry.building(b.type_id) else {
        return;
    };
    let input = building_io(registry, current, tile, b, IoDirection::Input, IoScale::FULL);
    let output = building_io(registry, current, tile, b, IoDirection::Output, IoScale::FULL);

    if def.power {
        if !current.power_grid.contains(&tile) {
            ctx.set_reason(tile, NotProducingReason::NoPower);
            return;
        }
        ctx.next.power_buildings.insert(tile);
    }

    let workers = workers_required(def, b);
    if ctx.available_workers() < workers {
        ctx.set_reason(tile, NotProducingReason::NotEnoughWorkers);
        return;
    }

    let has_input = match &b.kind {
        BuildingKind::CloneFactory(clone) => input
            .iter()
            .all(|(r, a)| clone.transported_amount.min(b.resources.get(r)) >= a),
        _ => b.resources.has_all(&input),
    };
    if !has_input {
        ctx.set_reason(tile, NotProducingReason::NotEnoughResources);
        return;
    }

    let storage = storage_for(registry, current, tile, b);
    let needed = storage
        .used
        .saturating_add(registry.storage_required(&output))
        .saturating_add(
            registry
                .storage_required(&input)
                .saturating_mul(from_count(b.stockpile_capacity)),
        );
    let has_storage = output.is_empty()
        || def.special == Some(SpecialEffect::Headquarter)
        || needed <= storage.total;

    if !has_storage {
        let non_transportable = output.filtered(|r| !registry.is_transportable(r));
        if non_transportable.is_empty() {
            ctx.set_reason(tile, NotProducingReason::StorageFull);
            return;
        }
        consume(ctx, tile, workers, &input);
        for (res, amount) in non_transportable.iter() {
            sink(ctx, tile, res, amount);
        }
        if non_transportable.len() < output.len() {
            ctx.set_reason(tile, NotProducingReason::StorageFull);
        }
        return;
    }

    consume(ctx, tile, workers, &input);
    for (res, amount) in output.iter() {
        let visible = if registry.is_transportable(res) {
            ctx.pending_deposits.push(PendingDeposit {
                tile,
                resource: res,
                amount,
            });
            true
        } else {
            sink(ctx, tile, res, amount)
        };
        if visible {
            ctx.emit(SimEvent::Floater {
                tile,
                resource: res,
                amount,
            });
        }
    }
    let offline = ctx.offline;
    ctx.emit(SimEvent::ProductionComplete { tile, offline });
}

/// Pay workers and inputs for one cycle.
fn consume(ctx: &mut TickContext<'_>, tile: Tile, workers: Fixed64, input: &ResourceMap) {
    ctx.use_workers(workers);
    let Some(b) = ctx.world.building_mut(tile) else {
        return;
    };
    b.resources.deduct_all(input);
    if let BuildingKind::CloneFactory(clone) = &mut b.kind {
        clone.transported_amount = clone.transported_amount.saturating_sub(input.total()).max(Fixed64::ZERO);
    }
}

/// Route a non-transportable output to where it lives. Returns true when
/// it landed in the Headquarter.
fn sink(ctx: &mut TickContext<'_>, tile: Tile, res: ResourceId, amount: Fixed64) -> bool {
    let kind = ctx.registry.resource_kind(res);
    let mut in_headquarter = false;
    match kind {
        Some(ResourceKind::Science) | Some(ResourceKind::Pollution) => {
            if let Some(hq) = ctx.special_tiles(SpecialEffect::Headquarter).first().copied()
                && let Some(hq_building) = ctx.world.building_mut(hq)
            {
                hq_building.resources.add(res, amount);
                in_headquarter = true;
            }
            let produced = if kind == Some(ResourceKind::Science) {
                &mut ctx.next.science_produced
            } else {
                &mut ctx.next.pollution_produced
            };
            let v = produced.entry(tile).or_insert(Fixed64::ZERO);
            *v = v.saturating_add(amount);
        }
        Some(ResourceKind::Power) => {
            ctx.next.power_plants.insert(tile);
        }
        Some(ResourceKind::Worker) | Some(ResourceKind::Transportable) | None => {}
    }
    ctx.next.workers_available.add(res, amount);
    in_headquarter
}

// ---------------------------------------------------------------------------
// Input transport
// ---------------------------------------------------------------------------

/// Request this tick's inputs. Returns whether anything was routed.
fn transport_inputs(ctx: &mut TickContext<'_>, tile: Tile) -> bool {
    let registry = ctx.registry;
    let current = ctx.current;
    let default_mode = ctx.options.default_input_mode;
    let Some(b) = ctx.world.building(tile) else {
        return false;
    };
    let input = building_io(registry, current, tile, b, IoDirection::Input, IoScale::FULL)
        .filtered(|r| registry.is_transportable(r));
    if input.is_empty() {
        return false;
    }
    let storage = storage_for(registry, current, tile, b);
    let total_input = registry.storage_required(&input);
    let worker_capacity = input_worker_capacity(current, tile, b);

    let mut requests: Vec<(ResourceId, Fixed64, InputMode)> = Vec::new();
    for (res, raw) in input.iter() {
        if b.suspended_input.get(&res) == Some(&SuspendedInput::ManualSuspended) {
            continue;
        }
        let (amount, max_amount, mode) = match b.kind.imports() {
            Some(imports) => {
                let Some(ri) = imports.resource_imports.get(&res) else {
                    continue;
                };
                (raw, ri.cap, ri.input_mode)
            }
            None => {
                let amount = raw.saturating_mul(from_count(b.stockpile_capacity));
                let max_amount = match b.stockpile_max {
                    Some(m) => raw.saturating_mul(from_count(m)),
                    None => div_or_zero(storage.total.saturating_mul(raw), total_input),
                };
                (amount, max_amount, b.input_mode.unwrap_or(default_mode))
            }
        };
        if amount <= Fixed64::ZERO {
            continue;
        }
        if storage.used.saturating_add(amount) > storage.total {
            continue;
        }
        let held = match &b.kind {
            BuildingKind::CloneFactory(clone) => b.resources.get(res).min(clone.transported_amount),
            _ => b.resources.get(res),
        };
        if held.saturating_add(ctx.transports.amount_in_transit(tile, res)) > max_amount {
            continue;
        }
        requests.push((res, amount, mode));
    }

    let allow_cache = ctx.offline || ctx.options.enable_transport_source_cache;
    let mut transported = false;
    for (res, amount, mode) in requests {
        let left = route(
            ctx,
            RouteRequest {
                resource: res,
                amount,
                worker_capacity,
                target: tile,
                mode,
                allow_cache,
                source_override: None,
            },
        );
        if left < amount {
            transported = true;
        }
    }
    transported
}

// ---------------------------------------------------------------------------
// Import buildings
// ---------------------------------------------------------------------------

/// Derive imports from working producers within the managed import range.
fn refresh_managed_imports(ctx: &mut TickContext<'_>, tile: Tile) {
    let registry = ctx.registry;
    let current = ctx.current;
    let grid = ctx.world.grid;
    let range = ctx.options.managed_import_range;
    let mut per_cycle = ResourceMap::new();
    for p in grid.range(grid.tile_to_point(tile), range) {
        let Some(other) = grid.point_to_tile(p) else {
            continue;
        };
        if other == tile {
            continue;
        }
        let Some(b) = ctx.world.building(other) else {
            continue;
        };
        if b.status != BuildingStatus::Completed || b.kind.is_import_capable() {
            continue;
        }
        let output = building_io(registry, current, other, b, IoDirection::Output, IoScale::FULL);
        for (res, amount) in output.iter() {
            if registry.is_transportable(res) {
                per_cycle.add(res, amount);
            }
        }
    }
    let Some(b) = ctx.world.building(tile) else {
        return;
    };
    let storage = storage_for(registry, current, tile, b);
    let share = if per_cycle.is_empty() {
        Fixed64::ZERO
    } else {
        storage.total / from_count(per_cycle.len() as u32)
    };
    let Some(imports) = ctx.world.building_mut(tile).and_then(|b| b.kind.imports_mut()) else {
        return;
    };
    imports.resource_imports = per_cycle
        .iter()
        .map(|(res, amount)| {
            (
                res,
                ResourceImport {
                    per_cycle: amount,
                    cap: share,
                    input_mode: InputMode::Distance,
                },
            )
        })
        .collect();
}

/// Pull output from nearby storage-full buildings, nearest first.
fn warehouse_autopilot(ctx: &mut TickContext<'_>, tile: Tile) {
    let registry = ctx.registry;
    let current = ctx.current;
    let Some(b) = ctx.world.building(tile) else {
        return;
    };
    let Some(def) = registry.building(b.type_id) else {
        return;
    };
    let BuildingKind::Warehouse { imports, options } = &b.kind else {
        return;
    };
    let mut capacity = def
        .import_capacity
        .saturating_mul(from_count(b.level))
        .saturating_mul(from_count(b.stack))
        .saturating_mul(b.capacity)
        .saturating_sub(ctx.transports.total_in_transit_to(tile));
    if capacity <= Fixed64::ZERO {
        return;
    }
    let worker_capacity = input_worker_capacity(current, tile, b);
    let per_trip =
        worker_capacity.saturating_add(current.global_multiplier(GlobalMultiplierKind::TransportCapacity));
    let workers = ctx.available_workers();
    if ceil_div(capacity, per_trip).is_none_or(|fuel| fuel > workers) {
        capacity = workers.saturating_mul(per_trip);
    }
    capacity = capacity.min(storage_for(registry, current, tile, b).free());
    if capacity <= Fixed64::ZERO {
        return;
    }

    let respect_cap = options.autopilot_respect_cap;
    let below_cap = |res: ResourceId| -> bool {
        imports.resource_imports.get(&res).is_some_and(|ri| {
            b.resources
                .get(res)
                .saturating_add(ctx.transports.amount_in_transit(tile, res))
                < ri.cap
        })
    };

    let grid = ctx.world.grid;
    let mut full: Vec<(u32, Tile)> = current
        .not_producing_reasons
        .iter()
        .filter(|(t, r)| **r == NotProducingReason::StorageFull && **t != tile)
        .map(|(t, _)| (grid.distance(*t, tile), *t))
        .collect();
    full.sort_by_key(|(d, _)| *d);

    let mut plan: Vec<(Tile, Vec<ResourceId>)> = Vec::new();
    for (_, from) in full {
        let Some(src) = ctx.world.building(from) else {
            continue;
        };
        let Some(src_def) = registry.building(src.type_id) else {
            continue;
        };
        let mut held: Vec<(ResourceId, Fixed64)> = src
            .resources
            .iter()
            .filter(|(r, _)| src_def.output.contains(*r) && registry.is_transportable(*r))
            .filter(|(r, _)| !respect_cap || below_cap(*r))
            .collect();
        held.sort_by(|a, b| b.1.cmp(&a.1));
        plan.push((from, held.into_iter().map(|(r, _)| r).collect()));
    }

    for (from, resources) in plan {
        let sources = [from];
        for res in resources {
            let left = route(
                ctx,
                RouteRequest {
                    resource: res,
                    amount: capacity,
                    worker_capacity,
                    target: tile,
                    mode: InputMode::Distance,
                    allow_cache: false,
                    source_override: Some(&sources),
                },
            );
            if left < capacity {
                ctx.next.not_producing_reasons.remove(&tile);
            }
            capacity = left;
            if capacity <= Fixed64::ZERO {
                return;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

fn market_production(ctx: &mut TickContext<'_>, tile: Tile) {
    let registry = ctx.registry;
    let current = ctx.current;
    let Some(b) = ctx.world.building(tile) else {
        return;
    };
    let Some(def) = registry.building(b.type_id) else {
        return;
    };
    let BuildingKind::Market(market) = &b.kind else {
        return;
    };
    let storage = storage_for(registry, current, tile, b);

    let mut unpaired = Vec::new();
    let mut trades: Vec<(ResourceId, Fixed64, ResourceId, Fixed64)> = Vec::new();
    let mut storage_full = false;
    for sell in &market.sell_resources {
        let Some(buy) = market.available_resources.get(sell) else {
            unpaired.push(*sell);
            continue;
        };
        let sell_amount = market_sell_amount(registry, def, b, *sell)
            .saturating_mul(b.capacity)
            .max(Fixed64::ZERO)
            .min(b.resources.get(*sell));
        let buy_amount = market_buy_amount(registry, *sell, sell_amount, *buy);
        if storage
            .used
            .saturating_sub(sell_amount)
            .saturating_add(buy_amount)
            > storage.total
        {
            storage_full = true;
            continue;
        }
        trades.push((*sell, sell_amount, *buy, buy_amount));
    }

    if storage_full {
        ctx.set_reason(tile, NotProducingReason::StorageFull);
    }
    let Some(b) = ctx.world.building_mut(tile) else {
        return;
    };
    if let BuildingKind::Market(market) = &mut b.kind {
        for res in &unpaired {
            market.sell_resources.remove(res);
        }
    }
    let mut total_bought = Fixed64::ZERO;
    let mut bought = Vec::new();
    for (sell, sell_amount, buy, buy_amount) in trades {
        b.resources.take(sell, sell_amount);
        if buy_amount > Fixed64::ZERO {
            bought.push((buy, buy_amount));
            total_bought = total_bought.saturating_add(buy_amount);
        }
    }
    for (res, amount) in &bought {
        ctx.pending_deposits.push(PendingDeposit {
            tile,
            resource: *res,
            amount: *amount,
        });
    }
    if total_bought > Fixed64::ZERO {
        for (res, amount) in bought {
            ctx.emit(SimEvent::Floater {
                tile,
                resource: res,
                amount,
            });
        }
        let offline = ctx.offline;
        ctx.emit(SimEvent::ProductionComplete { tile, offline });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::building::WarehouseOptions;
    use crate::test_utils::*;

    #[test]
    fn tabulation_publishes_holdings_and_outputs() {
        let mut fx = Fixture::new();
        let store = fx.completed_store(Tile::from_xy(0, 0), &[(fx.wood, 7.0)]);
        let mill = fx.place_completed(Tile::from_xy(2, 0), fx.mill, 1);
        fx.with_ctx(|ctx| {
            tabulate(ctx, store);
            tabulate(ctx, mill);
        });
        let wood = &fx.next.resources_by_tile[&fx.wood];
        assert_eq!(wood.len(), 1);
        assert_eq!(wood[0].amount, fixed(7.0));
        let plank = &fx.next.resources_by_tile[&fx.plank];
        assert_eq!(plank[0].tile, mill);
        assert_eq!(plank[0].amount, Fixed64::ZERO);
        assert_eq!(fx.next.resource_amount.get(fx.wood), fixed(7.0));
    }

    #[test]
    fn tabulation_indexes_specials_and_imports() {
        let mut fx = Fixture::new();
        let hq = fx.place_completed(Tile::from_xy(0, 0), fx.headquarter, 1);
        let wh = fx.place_completed(Tile::from_xy(3, 3), fx.warehouse, 1);
        fx.give(wh, &[(fx.wood, 4.0)]);
        fx.with_ctx(|ctx| {
            tabulate(ctx, hq);
            tabulate(ctx, wh);
        });
        assert_eq!(fx.next.special_buildings.get(&fx.headquarter), Some(&hq));
        assert!(fx.next.resource_import_buildings.contains_key(&wh));
        assert!(!fx.next.resources_by_tile.contains_key(&fx.wood));
    }

    #[test]
    fn gates_run_in_order() {
        let mut fx = Fixture::new();
        let quarry = fx.place_completed(Tile::from_xy(0, 0), fx.quarry, 1);
        fx.with_ctx(|ctx| tick_production(ctx, quarry));
        assert_eq!(fx.reason(quarry), Some(NotProducingReason::NotOnDeposit));

        let mill = fx.place_completed(Tile::from_xy(2, 0), fx.mill, 1);
        fx.world.building_mut(mill).unwrap().capacity = Fixed64::ZERO;
        fx.with_ctx(|ctx| tick_production(ctx, mill));
        assert_eq!(fx.reason(mill), Some(NotProducingReason::TurnedOff));

        fx.world.building_mut(mill).unwrap().capacity = Fixed64::ONE;
        fx.with_ctx(|ctx| tick_production(ctx, mill));
        assert_eq!(fx.reason(mill), Some(NotProducingReason::NotEnoughWorkers));

        fx.set_workers(10.0);
        fx.with_ctx(|ctx| tick_production(ctx, mill));
        assert_eq!(fx.reason(mill), Some(NotProducingReason::NotEnoughResources));

        fx.give(mill, &[(fx.wood, 2.0), (fx.plank, 49.5)]);
        fx.with_ctx(|ctx| tick_production(ctx, mill));
        assert_eq!(fx.reason(mill), Some(NotProducingReason::StorageFull));
    }

    #[test]
    fn normal_production_defers_output() {
        let mut fx = Fixture::new();
        fx.set_workers(10.0);
        let mill = fx.place_completed(Tile::from_xy(0, 0), fx.mill, 1);
        fx.give(mill, &[(fx.wood, 5.0)]);
        fx.with_ctx(|ctx| tick_production(ctx, mill));
        assert_eq!(fx.reason(mill), None);
        let b = fx.world.building(mill).unwrap();
        assert_eq!(b.resources.get(fx.wood), fixed(3.0));
        assert!(!b.resources.contains(fx.plank), "output waits for the end of the pass");
        assert_eq!(
            fx.pending,
            vec![PendingDeposit {
                tile: mill,
                resource: fx.plank,
                amount: fixed(1.0)
            }]
        );
        assert_eq!(fx.intra.workers_used.get(fx.worker), fixed(1.0));
        assert!(fx.events.iter().any(|e| matches!(e, SimEvent::ProductionComplete { tile, offline: false } if *tile == mill)));
    }

    #[test]
    fn production_complete_fires_without_output() {
        let mut fx = Fixture::new();
        let idle = fx.place_completed(Tile::from_xy(0, 0), fx.store, 1);
        fx.with_ctx(|ctx| tick_production(ctx, idle));
        assert_eq!(
            fx.events.drain(),
            vec![SimEvent::ProductionComplete {
                tile: idle,
                offline: false
            }]
        );
    }

    #[test]
    fn non_transportables_sink_even_when_storage_full() {
        let mut fx = Fixture::new();
        fx.set_workers(10.0);
        let hq = fx.place_completed(Tile::from_xy(5, 5), fx.headquarter, 1);
        fx.current.special_buildings.insert(fx.headquarter, hq);
        let lab = fx.place_completed(Tile::from_xy(0, 0), fx.lab, 1);
        fx.give(lab, &[(fx.plank, 10.0)]);
        fx.with_ctx(|ctx| tick_production(ctx, lab));
        // Lab makes science (sinks) and paper (blocked by full storage).
        assert_eq!(fx.reason(lab), Some(NotProducingReason::StorageFull));
        assert_eq!(fx.world.building(hq).unwrap().resources.get(fx.science), fixed(2.0));
        assert_eq!(fx.next.science_produced.get(&lab), Some(&fixed(2.0)));
        assert_eq!(fx.next.workers_available.get(fx.science), fixed(2.0));
        assert!(fx.pending.is_empty());
    }

    #[test]
    fn floaters_show_goods_and_headquarter_income_only() {
        let floaters = |fx: &mut Fixture| -> Vec<ResourceId> {
            fx.events
                .drain()
                .into_iter()
                .filter_map(|e| match e {
                    SimEvent::Floater { resource, .. } => Some(resource),
                    _ => None,
                })
                .collect()
        };
        let mut fx = Fixture::new();
        fx.set_workers(10.0);
        let house = fx.place_completed(Tile::from_xy(0, 0), fx.house, 1);
        let plant = fx.place_completed(Tile::from_xy(2, 0), fx.power_plant, 1);
        let lab = fx.place_completed(Tile::from_xy(4, 0), fx.lab, 1);
        fx.give(lab, &[(fx.plank, 2.0)]);
        fx.with_ctx(|ctx| {
            tick_production(ctx, house);
            tick_production(ctx, plant);
            tick_production(ctx, lab);
        });
        // Workers and power never float; science has no Headquarter to go to.
        assert_eq!(floaters(&mut fx), vec![fx.paper]);

        let hq = fx.place_completed(Tile::from_xy(6, 6), fx.headquarter, 1);
        fx.current.special_buildings.insert(fx.headquarter, hq);
        fx.with_ctx(|ctx| tick_production(ctx, lab));
        let mut shown = floaters(&mut fx);
        shown.sort();
        let mut expected = vec![fx.science, fx.paper];
        expected.sort();
        assert_eq!(shown, expected);
    }

    #[test]
    fn power_gate_and_power_plants() {
        let mut fx = Fixture::new();
        fx.set_workers(10.0);
        let factory = fx.place_completed(Tile::from_xy(1, 0), fx.factory, 1);
        fx.with_ctx(|ctx| tick_production(ctx, factory));
        assert_eq!(fx.reason(factory), Some(NotProducingReason::NoPower));

        fx.current.power_grid.insert(factory);
        fx.next = TickData::default();
        fx.with_ctx(|ctx| tick_production(ctx, factory));
        assert_eq!(fx.reason(factory), None);
        assert!(fx.next.power_buildings.contains(&factory));

        let plant = fx.place_completed(Tile::from_xy(0, 0), fx.power_plant, 1);
        fx.with_ctx(|ctx| tick_production(ctx, plant));
        assert!(fx.next.power_plants.contains(&plant));
    }

    #[test]
    fn inputs_are_requested_up_to_stockpile() {
        let mut fx = Fixture::new();
        fx.set_workers(100.0);
        let src = fx.completed_store(Tile::from_xy(2, 0), &[(fx.wood, 100.0)]);
        fx.tabulate_source(fx.wood, src, 100.0);
        let mill = fx.place_completed(Tile::from_xy(0, 0), fx.mill, 1);
        fx.world.building_mut(mill).unwrap().stockpile_capacity = 3;
        fx.with_ctx(|ctx| tick_production(ctx, mill));
        assert_eq!(fx.transports.amount_in_transit(mill, fx.wood), fixed(6.0));

        // Stockpile max 5 cycles (10 wood): 6 in transit + 6 more would pass it.
        fx.give(mill, &[(fx.wood, 5.0)]);
        fx.with_ctx(|ctx| tick_production(ctx, mill));
        assert_eq!(fx.transports.amount_in_transit(mill, fx.wood), fixed(6.0));
    }

    #[test]
    fn clone_factory_needs_transported_input() {
        let mut fx = Fixture::new();
        fx.set_workers(10.0);
        let clone = fx.place_completed(Tile::from_xy(0, 0), fx.clone_lab, 1);
        {
            let b = fx.world.building_mut(clone).unwrap();
            if let BuildingKind::CloneFactory(c) = &mut b.kind {
                c.input_resource = Some(fx.gold);
            }
            b.resources.add(fx.gold, fixed(3.0));
        }
        fx.with_ctx(|ctx| tick_production(ctx, clone));
        assert_eq!(fx.reason(clone), Some(NotProducingReason::NotEnoughResources));

        if let BuildingKind::CloneFactory(c) = &mut fx.world.building_mut(clone).unwrap().kind {
            c.transported_amount = fixed(3.0);
        }
        fx.next = TickData::default();
        fx.with_ctx(|ctx| tick_production(ctx, clone));
        assert_eq!(fx.reason(clone), None);
        let b = fx.world.building(clone).unwrap();
        assert_eq!(b.resources.get(fx.gold), fixed(2.0));
        match &b.kind {
            BuildingKind::CloneFactory(c) => assert_eq!(c.transported_amount, fixed(2.0)),
            _ => unreachable!(),
        }
        assert_eq!(fx.pending[0].amount, fixed(2.0));
    }

    #[test]
    fn market_swaps_paired_resources() {
        let mut fx = Fixture::new();
        let market = fx.place_completed(Tile::from_xy(0, 0), fx.market, 1);
        {
            let b = fx.world.building_mut(market).unwrap();
            b.resources.add(fx.wood, fixed(100.0));
            if let BuildingKind::Market(m) = &mut b.kind {
                m.sell_resources.insert(fx.wood);
                m.sell_resources.insert(fx.stone);
                m.available_resources.insert(fx.wood, fx.gold);
            }
        }
        fx.with_ctx(|ctx| tick_production(ctx, market));
        let b = fx.world.building(market).unwrap();
        // trade value 20 / wood price 2 = 10 wood -> 20 / gold price 10 = 2 gold
        assert_eq!(b.resources.get(fx.wood), fixed(90.0));
        assert_eq!(fx.pending[0].resource, fx.gold);
        assert_eq!(fx.pending[0].amount, fixed(2.0));
        match &b.kind {
            BuildingKind::Market(m) => assert!(!m.sell_resources.contains(&fx.stone)),
            _ => unreachable!(),
        }
        assert!(fx.events.iter().any(|e| matches!(e, SimEvent::ProductionComplete { .. })));
    }

    #[test]
    fn import_building_reports_idle_transports() {
        let mut fx = Fixture::new();
        let wh = fx.place_completed(Tile::from_xy(0, 0), fx.warehouse, 1);
        fx.world
            .building_mut(wh)
            .unwrap()
            .kind
            .imports_mut()
            .unwrap()
            .resource_imports
            .insert(
                fx.wood,
                ResourceImport {
                    per_cycle: fixed(5.0),
                    cap: fixed(50.0),
                    input_mode: InputMode::Distance,
                },
            );
        fx.with_ctx(|ctx| tick_production(ctx, wh));
        assert_eq!(fx.reason(wh), Some(NotProducingReason::NoActiveTransports));

        fx.set_workers(100.0);
        let src = fx.completed_store(Tile::from_xy(1, 0), &[(fx.wood, 100.0)]);
        fx.tabulate_source(fx.wood, src, 100.0);
        fx.next = TickData::default();
        fx.with_ctx(|ctx| tick_production(ctx, wh));
        assert_eq!(fx.reason(wh), None);
        assert_eq!(fx.transports.amount_in_transit(wh, fx.wood), fixed(5.0));
    }

    #[test]
    fn managed_import_follows_neighbors() {
        let mut fx = Fixture::new();
        let wh = fx.place_completed(Tile::from_xy(2, 2), fx.warehouse, 1);
        fx.place_completed(Tile::from_xy(3, 2), fx.mill, 2);
        fx.world
            .building_mut(wh)
            .unwrap()
            .kind
            .imports_mut()
            .unwrap()
            .managed_import = true;
        fx.with_ctx(|ctx| tick_production(ctx, wh));
        let imports = fx.world.building(wh).unwrap().kind.imports().unwrap().clone();
        assert_eq!(imports.resource_imports.len(), 1);
        assert_eq!(imports.resource_imports[&fx.plank].per_cycle, fixed(2.0));
    }

    #[test]
    fn warehouse_autopilot_drains_full_neighbors() {
        let mut fx = Fixture::new();
        fx.world.upgrades.warehouse_upgrade = true;
        fx.set_workers(100.0);
        let wh = fx.place_completed(Tile::from_xy(0, 0), fx.warehouse, 1);
        if let BuildingKind::Warehouse { options, .. } = &mut fx.world.building_mut(wh).unwrap().kind {
            *options = WarehouseOptions {
                autopilot: true,
                autopilot_respect_cap: false,
            };
        }
        let mill = fx.place_completed(Tile::from_xy(2, 0), fx.mill, 1);
        fx.give(mill, &[(fx.plank, 40.0)]);
        fx.current
            .not_producing_reasons
            .insert(mill, NotProducingReason::StorageFull);
        fx.with_ctx(|ctx| tick_production(ctx, wh));
        // Import capacity 10 per level.
        assert_eq!(fx.transports.amount_in_transit(wh, fx.plank), fixed(10.0));
        assert_eq!(fx.reason(wh), None);
    }
}
