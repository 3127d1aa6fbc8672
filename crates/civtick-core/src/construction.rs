//! Construction state machine: building, upgrading, downgrading and
//! stacking.
//!
//! ```text
//! building ──> upgrading ──> completed
//! completed ──> upgrading | downgrading | stacking ──> completed
//! ```
//!
//! Material for the next step (or, with greedy transport, for the whole
//! jump to the desired level/stack) is requested through the router. A
//! level is gained only when every required resource has arrived.

use tracing::debug;

use crate::building::{Building, BuildingStatus, SuspendedInput};
use crate::context::TickContext;
use crate::event::SimEvent;
use crate::fixed::{Fixed64, from_count};
use crate::id::{ResourceId, Tile};
use crate::io::builder_capacity;
use crate::options::GameOptions;
use crate::registry::BuildingDef;
use crate::resource::ResourceMap;
use crate::router::{RouteRequest, route};
use crate::tick_data::NotProducingReason;

/// Whether construction used up the tile's turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Construction logic ran; skip production.
    Handled,
    /// The building is completed; run production.
    Produce,
}

/// Apply player intent (desired level/stack) to a building's status.
/// Runs before tabulation every tick.
pub fn update_status(b: &mut Building, options: &GameOptions) {
    if b.stack == 0 {
        b.stack = 1;
        b.desired_stack = 1;
    }
    if b.status == BuildingStatus::Completed {
        if b.desired_level > b.level {
            b.status = if b.level > 0 {
                BuildingStatus::Upgrading
            } else {
                BuildingStatus::Building
            };
        } else if b.desired_level < b.level
            && b.desired_level.saturating_add(options.max_downgrade_levels) >= b.level
            && b.desired_level > 0
        {
            b.status = BuildingStatus::Downgrading;
        } else {
            b.desired_level = b.level;
        }
    }
    if options.stacking_enabled
        && b.status == BuildingStatus::Completed
        && b.desired_stack > b.stack
    {
        if b.level == 0 {
            b.stack = b.desired_stack;
        } else {
            b.status = BuildingStatus::Stacking;
        }
    }
}

/// Run one tick of construction for the building on `tile`.
pub fn tick_construction(ctx: &mut TickContext<'_>, tile: Tile) -> Progress {
    let registry = ctx.registry;
    let Some(b) = ctx.world.building(tile) else {
        return Progress::Handled;
    };
    let Some(def) = registry.building(b.type_id) else {
        return Progress::Handled;
    };
    match b.status {
        BuildingStatus::Building | BuildingStatus::Upgrading => {
            if b.status == BuildingStatus::Upgrading && b.level >= b.desired_level {
                if let Some(b) = ctx.world.building_mut(tile) {
                    b.status = BuildingStatus::Completed;
                }
                return Progress::Produce;
            }
            advance_level(ctx, tile, def);
            Progress::Handled
        }
        BuildingStatus::Downgrading => {
            downgrade(ctx, tile, def);
            Progress::Handled
        }
        BuildingStatus::Stacking => {
            advance_stack(ctx, tile, def);
            Progress::Handled
        }
        BuildingStatus::Completed => Progress::Produce,
        BuildingStatus::Paused => Progress::Handled,
    }
}

fn advance_level(ctx: &mut TickContext<'_>, tile: Tile, def: &BuildingDef) {
    let Some(b) = ctx.world.building(tile) else {
        return;
    };
    let level = b.level;
    let target_level = b.desired_level.max(level + 1);
    let cost = def.level_cost(level, b.stack);
    let max_cost = def.total_cost(level, target_level, b.stack);
    let upgrading_wonder = def.world_wonder && b.status == BuildingStatus::Upgrading;
    register_high_level_power(ctx, tile, def, level);

    let Some((completed, max_completed)) = request_materials(ctx, tile, def, &cost, &max_cost)
    else {
        return;
    };
    if upgrading_wonder {
        let offline = ctx.offline;
        ctx.emit(SimEvent::ProductionComplete { tile, offline });
    }

    let Some(b) = ctx.world.building_mut(tile) else {
        return;
    };
    // One-of-a-kind buildings climb one level per completion so every
    // per-level effect fires.
    if max_completed && !def.is_special() {
        b.level = target_level;
        b.resources.deduct_all(&max_cost);
    } else if completed {
        b.level += 1;
        b.resources.deduct_all(&cost);
    } else {
        return;
    }
    b.suspended_input.clear();
    let mut building_complete = false;
    if b.status == BuildingStatus::Building {
        b.status = if b.desired_level > b.level {
            BuildingStatus::Upgrading
        } else {
            BuildingStatus::Completed
        };
        building_complete = true;
    }
    if b.status == BuildingStatus::Upgrading && b.level >= b.desired_level {
        b.status = BuildingStatus::Completed;
    }
    ctx.emit(SimEvent::BuildingOrUpgradeComplete { tile });
    if building_complete {
        ctx.emit(SimEvent::BuildingComplete { tile });
    }
}

fn downgrade(ctx: &mut TickContext<'_>, tile: Tile, def: &BuildingDef) {
    let Some(level) = ctx.world.building(tile).map(|b| b.level) else {
        return;
    };
    register_high_level_power(ctx, tile, def, level);
    let Some(b) = ctx.world.building_mut(tile) else {
        return;
    };
    if b.level == 0 {
        b.status = BuildingStatus::Completed;
        return;
    }
    b.level -= 1;
    let refund = def.level_cost(b.level, b.stack);
    b.resources.add_all(&refund);
    b.suspended_input.clear();
    if b.level <= b.desired_level {
        b.status = BuildingStatus::Completed;
    }
    debug!(tile = %tile, level = b.level, desired = b.desired_level, "building downgraded");
    ctx.emit(SimEvent::BuildingOrUpgradeComplete { tile });
}

fn advance_stack(ctx: &mut TickContext<'_>, tile: Tile, def: &BuildingDef) {
    let Some(b) = ctx.world.building(tile) else {
        return;
    };
    let (level, stack, desired_stack) = (b.level, b.stack, b.desired_stack.max(b.stack + 1));
    register_high_level_power(ctx, tile, def, level);
    let built = def.total_cost(0, level, stack);
    let cost = def.total_cost(0, level, stack + 1).difference(&built);
    let max_cost = def.total_cost(0, level, desired_stack).difference(&built);

    let Some((completed, max_completed)) = request_materials(ctx, tile, def, &cost, &max_cost)
    else {
        return;
    };

    let Some(b) = ctx.world.building_mut(tile) else {
        return;
    };
    if max_completed {
        b.stack = desired_stack;
        b.resources.deduct_all(&max_cost);
    } else if completed {
        b.stack += 1;
        b.resources.deduct_all(&cost);
    } else {
        return;
    }
    b.suspended_input.clear();
    if b.stack >= b.desired_stack {
        b.status = BuildingStatus::Completed;
    }
    debug!(tile = %tile, stack = b.stack, desired = b.desired_stack, "building stacked");
    ctx.emit(SimEvent::BuildingOrUpgradeComplete { tile });
}

/// High-level power consumers keep drawing power while under construction.
fn register_high_level_power(ctx: &mut TickContext<'_>, tile: Tile, def: &BuildingDef, level: u32) {
    if def.power && level >= ctx.options.high_level_power_threshold {
        ctx.next.power_buildings.insert(tile);
    }
}

/// Suspend satisfied inputs and route the rest. Returns whether the
/// single-step and the full cost are covered by what has arrived.
fn request_materials(
    ctx: &mut TickContext<'_>,
    tile: Tile,
    def: &BuildingDef,
    cost: &ResourceMap,
    max_cost: &ResourceMap,
) -> Option<(bool, bool)> {
    let greedy = ctx.options.greedy_transport;
    let default_mode = ctx.options.default_input_mode;
    let current = ctx.current;
    let transports = &*ctx.transports;
    let b = ctx.world.building_mut(tile)?;
    let completed = b.resources.has_all(cost);
    let max_completed = b.resources.has_all(max_cost);
    let threshold = if greedy { max_cost } else { cost };

    let mut requests: Vec<(ResourceId, Fixed64)> = Vec::new();
    for (res, amount) in threshold.iter() {
        let arrived = b.resources.get(res);
        if arrived >= amount {
            b.suspended_input.insert(res, SuspendedInput::AutoSuspended);
            continue;
        }
        let left = amount
            .saturating_sub(transports.amount_in_transit(tile, res))
            .saturating_sub(arrived);
        if left <= Fixed64::ZERO {
            continue;
        }
        if b.suspended_input.get(&res) == Some(&SuspendedInput::ManualSuspended) {
            continue;
        }
        b.suspended_input.remove(&res);
        requests.push((res, left));
    }
    let mode = b.input_mode.unwrap_or(default_mode);
    let per_resource = if requests.is_empty() {
        Fixed64::ZERO
    } else {
        builder_capacity(def, b, current) / from_count(requests.len() as u32)
    };

    if !requests.is_empty() && ctx.available_workers() <= Fixed64::ZERO {
        ctx.set_reason(tile, NotProducingReason::NotEnoughWorkers);
    }
    let allow_cache = ctx.offline || ctx.options.enable_transport_source_cache;
    for (res, left) in requests {
        route(
            ctx,
            RouteRequest {
                resource: res,
                amount: left.min(per_resource).max(Fixed64::ZERO),
                worker_capacity: per_resource,
                target: tile,
                mode,
                allow_cache,
                source_override: None,
            },
        );
    }
    Some((completed, max_completed))
}
