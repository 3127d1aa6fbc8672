//! Resource router: picks source tiles for a needed resource and commits
//! transports, paying worker fuel.
//!
//! Source candidates are last tick's tabulated holders of the resource plus
//! every import-capable building, ordered by the target's [`InputMode`].
//! For distance ordering the sorted list is memoized in the
//! [`TransportSourceCache`](crate::cache::TransportSourceCache).

use tracing::trace;

use crate::building::{BuildingKind, BuildingStatus, InputMode};
use crate::context::TickContext;
use crate::fixed::{Fixed64, ceil_div, div_or_zero};
use crate::id::{ResourceId, Tile, TransportId};
use crate::io::available_resource;
use crate::registry::{GlobalMultiplierKind, ResourceKind, SpecialEffect};
use crate::transport::Transport;

/// One routing request.
#[derive(Debug, Clone, Copy)]
pub struct RouteRequest<'s> {
    pub resource: ResourceId,
    pub amount: Fixed64,
    /// Amount one worker carries per trip, before global bonuses.
    pub worker_capacity: Fixed64,
    pub target: Tile,
    pub mode: InputMode,
    pub allow_cache: bool,
    /// Use exactly these sources, in this order.
    pub source_override: Option<&'s [Tile]>,
}

/// Per-trip capacity of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCapacity {
    Limited(Fixed64),
    Unlimited,
}

impl TransportCapacity {
    /// Workers needed to move `amount`. `None` when nothing can be carried.
    pub fn fuel_for(self, amount: Fixed64) -> Option<Fixed64> {
        match self {
            TransportCapacity::Unlimited => Some(Fixed64::ZERO),
            TransportCapacity::Limited(c) => ceil_div(amount, c),
        }
    }
}

/// Facts about the target that stay fixed for one request.
struct TargetInfo {
    is_warehouse: bool,
    completed_clone: bool,
    outputs_worker: bool,
    max_input_distance: Option<u32>,
    import_capable: bool,
}

/// Route up to `req.amount` of `req.resource` to `req.target`.
///
/// Returns the amount that could not be routed this tick. Never more than
/// requested, and never takes more from a source than it holds.
pub fn route(ctx: &mut TickContext<'_>, req: RouteRequest<'_>) -> Fixed64 {
    if req.amount <= Fixed64::ZERO {
        return req.amount;
    }
    if ctx.available_workers() <= Fixed64::ZERO {
        return req.amount;
    }
    let Some(target) = target_info(ctx, req.target) else {
        return req.amount;
    };

    let cacheable = req.allow_cache && req.mode == InputMode::Distance && !target.import_capable;
    let sources: Vec<Tile> = match req.source_override {
        Some(list) => list.to_vec(),
        None => {
            let cached = if cacheable {
                ctx.source_cache
                    .get(req.target, req.resource)
                    .map(|s| s.to_vec())
            } else {
                None
            };
            match cached {
                Some(s) => s,
                None => {
                    let fresh = candidates(ctx, req.target, req.resource, req.mode);
                    if cacheable {
                        ctx.source_cache.insert(req.target, req.resource, fresh.clone());
                    }
                    fresh
                }
            }
        }
    };

    let base_capacity = req
        .worker_capacity
        .saturating_add(ctx.current.global_multiplier(GlobalMultiplierKind::TransportCapacity));
    let immediate_radius = ctx.options.immediate_transport_radius;
    let target_immediate =
        ctx.near_special(req.target, SpecialEffect::ImmediateTransport, immediate_radius);

    let registry = ctx.registry;
    let current = ctx.current;
    let mut left = req.amount;
    for from in sources {
        if left <= Fixed64::ZERO {
            break;
        }
        if from == req.target {
            continue;
        }
        let Some(source) = ctx.world.building(from) else {
            continue;
        };
        if source.status != BuildingStatus::Completed {
            continue;
        }
        let Some(source_def) = registry.building(source.type_id) else {
            continue;
        };
        if target.completed_clone && !source_def.output.contains(req.resource) {
            continue;
        }
        if let BuildingKind::SwissBank(bank) = &source.kind
            && bank.no_export
        {
            continue;
        }
        let distance = ctx.world.grid.distance(from, req.target);
        if target.max_input_distance.is_some_and(|max| distance > max) {
            continue;
        }
        let available = available_resource(registry, current, from, source, req.resource);
        if available <= Fixed64::ZERO {
            continue;
        }
        let source_is_warehouse = source.kind.is_warehouse();
        let source_range = source_def.range.unwrap_or(1);
        let capacity = transport_capacity(
            ctx,
            &target,
            source_is_warehouse,
            source_range,
            from,
            req.target,
            distance,
            base_capacity,
        );
        let workers_left = ctx.available_workers();
        let wanted = available.min(left);
        let Some(fuel) = capacity.fuel_for(wanted) else {
            continue;
        };
        let immediate = target_immediate
            || ctx.near_special(from, SpecialEffect::ImmediateTransport, immediate_radius);
        let ticks = if immediate { 1 } else { distance.max(1) };

        if fuel <= workers_left {
            commit(ctx, req, from, wanted, fuel, ticks);
            left = left.saturating_sub(wanted);
        } else if workers_left > Fixed64::ZERO {
            let partial = wanted.saturating_mul(div_or_zero(workers_left, fuel));
            commit(ctx, req, from, partial, workers_left, ticks);
            return left.saturating_sub(partial);
        } else {
            return left;
        }
    }
    left
}

fn target_info(ctx: &TickContext<'_>, tile: Tile) -> Option<TargetInfo> {
    let b = ctx.world.building(tile)?;
    let def = ctx.registry.building(b.type_id)?;
    Some(TargetInfo {
        is_warehouse: b.kind.is_warehouse(),
        completed_clone: matches!(b.kind, BuildingKind::CloneFactory(_))
            && b.status == BuildingStatus::Completed,
        outputs_worker: def
            .output
            .keys()
            .any(|r| ctx.registry.resource_kind(r) == Some(ResourceKind::Worker)),
        max_input_distance: b.max_input_distance,
        import_capable: b.kind.is_import_capable(),
    })
}

/// Fresh candidate list for `(target, res)`, sorted by `mode`.
fn candidates(ctx: &TickContext<'_>, target: Tile, res: ResourceId, mode: InputMode) -> Vec<Tile> {
    struct Candidate {
        tile: Tile,
        amount: Fixed64,
        percentage: Fixed64,
        distance: u32,
    }
    let grid = ctx.world.grid;
    let mut list: Vec<Candidate> = ctx
        .current
        .resources_by_tile
        .get(&res)
        .into_iter()
        .flatten()
        .map(|s| Candidate {
            tile: s.tile,
            amount: s.amount,
            percentage: s.used_storage_percentage,
            distance: grid.distance(s.tile, target),
        })
        .collect();
    for (tile, percentage) in &ctx.current.resource_import_buildings {
        let amount = ctx
            .world
            .building(*tile)
            .map(|b| b.resources.get(res))
            .unwrap_or(Fixed64::ZERO);
        list.push(Candidate {
            tile: *tile,
            amount,
            percentage: *percentage,
            distance: grid.distance(*tile, target),
        });
    }
    // Stable sorts: ties keep tabulation order.
    match mode {
        InputMode::Distance => list.sort_by_key(|c| c.distance),
        InputMode::Amount => list.sort_by(|a, b| b.amount.cmp(&a.amount)),
        InputMode::StoragePercentage => list.sort_by(|a, b| b.percentage.cmp(&a.percentage)),
    }
    list.into_iter().map(|c| c.tile).collect()
}

#[allow(clippy::too_many_arguments)]
fn transport_capacity(
    ctx: &TickContext<'_>,
    target: &TargetInfo,
    source_is_warehouse: bool,
    source_range: u32,
    from: Tile,
    to: Tile,
    distance: u32,
    base: Fixed64,
) -> TransportCapacity {
    if target.outputs_worker {
        return TransportCapacity::Unlimited;
    }
    // Warehouse routes are measured against the source's range.
    if source_is_warehouse || target.is_warehouse {
        let upgrades = &ctx.world.upgrades;
        if upgrades.unlimited_warehouse_transport
            || (upgrades.warehouse_upgrade && distance <= source_range)
        {
            return TransportCapacity::Unlimited;
        }
    }
    let radius = ctx.options.unlimited_transport_radius;
    if ctx.near_special(from, SpecialEffect::UnlimitedTransport, radius)
        || ctx.near_special(to, SpecialEffect::UnlimitedTransport, radius)
    {
        return TransportCapacity::Unlimited;
    }
    TransportCapacity::Limited(base)
}

fn commit(
    ctx: &mut TickContext<'_>,
    req: RouteRequest<'_>,
    from: Tile,
    amount: Fixed64,
    fuel: Fixed64,
    ticks_required: u32,
) {
    if amount <= Fixed64::ZERO {
        return;
    }
    let Some(fuel_type) = ctx.worker else {
        return;
    };
    let taken = match ctx.world.building_mut(from) {
        Some(b) => b.resources.take(req.resource, amount),
        None => return,
    };
    ctx.use_workers(fuel);
    let id = TransportId(ctx.world.next_transport_id());
    trace!(
        transport = id.0,
        from = %from,
        to = %req.target,
        resource = req.resource.0,
        amount = %taken,
        fuel = %fuel,
        ticks_required,
        "transport committed"
    );
    ctx.transports.push(Transport {
        id,
        resource: req.resource,
        amount: taken,
        fuel_type,
        fuel_per_tick: fuel,
        from,
        to: req.target,
        ticks_spent: 0,
        ticks_required,
        has_enough_fuel: true,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::BuildingTypeId;
    use crate::test_utils::*;

    fn request(res: ResourceId, amount: f64, target: Tile) -> RouteRequest<'static> {
        RouteRequest {
            resource: res,
            amount: fixed(amount),
            worker_capacity: fixed(10.0),
            target,
            mode: InputMode::Distance,
            allow_cache: true,
            source_override: None,
        }
    }

    #[test]
    fn no_workers_returns_everything() {
        let mut fx = Fixture::new();
        let src = fx.completed_store(Tile::from_xy(0, 0), &[(fx.wood, 20.0)]);
        let dst = fx.site(Tile::from_xy(3, 0));
        fx.tabulate_source(fx.wood, src, 20.0);
        let req = request(fx.wood, 5.0, dst);
        let left = fx.with_ctx(|ctx| route(ctx, req));
        assert_eq!(left, fixed(5.0));
        assert!(fx.transports.is_empty());
    }

    #[test]
    fn routes_from_nearest_source_first() {
        let mut fx = Fixture::new();
        fx.set_workers(100.0);
        let far = fx.completed_store(Tile::from_xy(6, 0), &[(fx.wood, 20.0)]);
        let near = fx.completed_store(Tile::from_xy(1, 0), &[(fx.wood, 20.0)]);
        let dst = fx.site(Tile::from_xy(0, 0));
        fx.tabulate_source(fx.wood, far, 20.0);
        fx.tabulate_source(fx.wood, near, 20.0);
        let req = request(fx.wood, 5.0, dst);
        let left = fx.with_ctx(|ctx| route(ctx, req));
        assert_eq!(left, Fixed64::ZERO);
        let t = fx.transports.iter().next().unwrap();
        assert_eq!(t.from, near);
        assert_eq!(t.ticks_required, 1);
        assert_eq!(fx.world.building(near).unwrap().resources.get(fx.wood), fixed(15.0));
        assert_eq!(fx.world.building(far).unwrap().resources.get(fx.wood), fixed(20.0));
    }

    #[test]
    fn splits_across_sources_and_charges_fuel() {
        let mut fx = Fixture::new();
        fx.set_workers(100.0);
        let a = fx.completed_store(Tile::from_xy(1, 0), &[(fx.wood, 4.0)]);
        let b = fx.completed_store(Tile::from_xy(2, 0), &[(fx.wood, 30.0)]);
        let dst = fx.site(Tile::from_xy(0, 0));
        fx.tabulate_source(fx.wood, a, 4.0);
        fx.tabulate_source(fx.wood, b, 30.0);
        let req = request(fx.wood, 25.0, dst);
        let left = fx.with_ctx(|ctx| route(ctx, req));
        assert_eq!(left, Fixed64::ZERO);
        let amounts: Vec<Fixed64> = fx.transports.iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![fixed(4.0), fixed(21.0)]);
        // ceil(4/10) + ceil(21/10)
        assert_eq!(fx.intra.workers_used.get(fx.worker), fixed(4.0));
    }

    #[test]
    fn partial_fuel_commits_proportional_amount() {
        let mut fx = Fixture::new();
        fx.set_workers(1.0);
        let src = fx.completed_store(Tile::from_xy(1, 0), &[(fx.wood, 40.0)]);
        let dst = fx.site(Tile::from_xy(0, 0));
        fx.tabulate_source(fx.wood, src, 40.0);
        let req = request(fx.wood, 40.0, dst);
        let left = fx.with_ctx(|ctx| route(ctx, req));
        // Needs 4 workers, has 1: a quarter goes.
        assert_eq!(left, fixed(30.0));
        assert_eq!(fx.transports.iter().next().unwrap().amount, fixed(10.0));
        assert_eq!(fx.world.building(src).unwrap().resources.get(fx.wood), fixed(30.0));
    }

    #[test]
    fn skips_incomplete_self_and_distant_sources() {
        let mut fx = Fixture::new();
        fx.set_workers(100.0);
        let site = fx.site(Tile::from_xy(1, 0));
        fx.world.building_mut(site).unwrap().resources.add(fx.wood, fixed(50.0));
        let dst = fx.completed_store(Tile::from_xy(0, 0), &[(fx.wood, 50.0)]);
        let distant = fx.completed_store(Tile::from_xy(7, 0), &[(fx.wood, 50.0)]);
        fx.world.building_mut(dst).unwrap().max_input_distance = Some(3);
        fx.tabulate_source(fx.wood, site, 50.0);
        fx.tabulate_source(fx.wood, dst, 50.0);
        fx.tabulate_source(fx.wood, distant, 50.0);
        let req = request(fx.wood, 5.0, dst);
        let left = fx.with_ctx(|ctx| route(ctx, req));
        assert_eq!(left, fixed(5.0));
        assert!(fx.transports.is_empty());
    }

    #[test]
    fn swiss_bank_no_export_is_skipped() {
        let mut fx = Fixture::new();
        fx.set_workers(100.0);
        let bank = fx.place_completed(Tile::from_xy(1, 0), fx.bank, 1);
        fx.world.building_mut(bank).unwrap().resources.add(fx.wood, fixed(10.0));
        if let BuildingKind::SwissBank(s) = &mut fx.world.building_mut(bank).unwrap().kind {
            s.no_export = true;
        }
        let dst = fx.site(Tile::from_xy(0, 0));
        fx.tabulate_source(fx.wood, bank, 10.0);
        let req = request(fx.wood, 5.0, dst);
        assert_eq!(fx.with_ctx(|ctx| route(ctx, req)), fixed(5.0));
    }

    #[test]
    fn amount_mode_prefers_largest_holding() {
        let mut fx = Fixture::new();
        fx.set_workers(100.0);
        let small = fx.completed_store(Tile::from_xy(1, 0), &[(fx.wood, 5.0)]);
        let big = fx.completed_store(Tile::from_xy(5, 0), &[(fx.wood, 50.0)]);
        let dst = fx.site(Tile::from_xy(0, 0));
        fx.tabulate_source(fx.wood, small, 5.0);
        fx.tabulate_source(fx.wood, big, 50.0);
        let mut req = request(fx.wood, 5.0, dst);
        req.mode = InputMode::Amount;
        fx.with_ctx(|ctx| route(ctx, req));
        assert_eq!(fx.transports.iter().next().unwrap().from, big);
        assert!(fx.source_cache.is_empty(), "amount mode is never cached");
    }

    #[test]
    fn distance_mode_populates_cache() {
        let mut fx = Fixture::new();
        fx.set_workers(100.0);
        let src = fx.completed_store(Tile::from_xy(1, 0), &[(fx.wood, 50.0)]);
        let dst = fx.site(Tile::from_xy(0, 0));
        fx.tabulate_source(fx.wood, src, 50.0);
        let req = request(fx.wood, 5.0, dst);
        fx.with_ctx(|ctx| route(ctx, req));
        assert_eq!(fx.source_cache.len(), 1);
        fx.with_ctx(|ctx| route(ctx, req));
        assert_eq!(fx.source_cache.hits(), 1);
    }

    #[test]
    fn source_override_bypasses_tabulation() {
        let mut fx = Fixture::new();
        fx.set_workers(100.0);
        let src = fx.completed_store(Tile::from_xy(2, 0), &[(fx.wood, 50.0)]);
        let dst = fx.site(Tile::from_xy(0, 0));
        let list = [src];
        let mut req = request(fx.wood, 5.0, dst);
        req.source_override = Some(&list);
        assert_eq!(fx.with_ctx(|ctx| route(ctx, req)), Fixed64::ZERO);
        assert!(fx.source_cache.is_empty());
    }

    #[test]
    fn worker_target_moves_for_free() {
        let mut fx = Fixture::new();
        fx.set_workers(1.0);
        let src = fx.completed_store(Tile::from_xy(1, 0), &[(fx.wood, 500.0)]);
        let house = fx.place_completed(Tile::from_xy(0, 0), fx.house, 1);
        fx.tabulate_source(fx.wood, src, 500.0);
        let req = request(fx.wood, 300.0, house);
        assert_eq!(fx.with_ctx(|ctx| route(ctx, req)), Fixed64::ZERO);
        assert_eq!(fx.transports.iter().next().unwrap().fuel_per_tick, Fixed64::ZERO);
    }

    /// Place a completed special building and index it as last tick did.
    fn special(fx: &mut Fixture, type_id: BuildingTypeId, tile: Tile) {
        fx.place_completed(tile, type_id, 1);
        fx.current.special_buildings.insert(type_id, tile);
    }

    /// Route 300 wood from a stocked Store at `from` to `to` with plenty of
    /// workers and return the committed transport's fuel and travel time.
    fn ship_300(fx: &mut Fixture, from: Tile, to: Tile) -> (Fixed64, u32) {
        fx.set_workers(100.0);
        fx.completed_store(from, &[(fx.wood, 300.0)]);
        fx.tabulate_source(fx.wood, from, 300.0);
        let req = request(fx.wood, 300.0, to);
        assert_eq!(fx.with_ctx(|ctx| route(ctx, req)), Fixed64::ZERO);
        let t = fx.transports.iter().next().unwrap();
        (t.fuel_per_tick, t.ticks_required)
    }

    #[test]
    fn warehouse_upgrade_measures_the_source_range() {
        // A plain Store has range 1, so a Warehouse two tiles away pays.
        let mut fx = Fixture::new();
        fx.world.upgrades.warehouse_upgrade = true;
        let dst = fx.place_completed(Tile::from_xy(0, 0), fx.warehouse, 1);
        let (fuel, _) = ship_300(&mut fx, Tile::from_xy(2, 0), dst);
        assert_eq!(fuel, fixed(30.0));

        // Next door is within the Store's default range.
        let mut fx = Fixture::new();
        fx.world.upgrades.warehouse_upgrade = true;
        let dst = fx.place_completed(Tile::from_xy(0, 0), fx.warehouse, 1);
        let (fuel, _) = ship_300(&mut fx, Tile::from_xy(1, 0), dst);
        assert_eq!(fuel, Fixed64::ZERO);
    }

    #[test]
    fn warehouse_source_ships_free_within_its_range() {
        for (x, expected) in [(2, Fixed64::ZERO), (3, fixed(30.0))] {
            let mut fx = Fixture::new();
            fx.set_workers(100.0);
            fx.world.upgrades.warehouse_upgrade = true;
            let src = fx.place_completed(Tile::from_xy(x, 0), fx.warehouse, 1);
            fx.give(src, &[(fx.wood, 300.0)]);
            fx.tabulate_source(fx.wood, src, 300.0);
            let dst = fx.site(Tile::from_xy(0, 0));
            let req = request(fx.wood, 300.0, dst);
            assert_eq!(fx.with_ctx(|ctx| route(ctx, req)), Fixed64::ZERO);
            let t = fx.transports.iter().next().unwrap();
            assert_eq!(t.fuel_per_tick, expected, "warehouse at distance {x}");
        }
    }

    #[test]
    fn warehouse_routes_need_an_upgrade() {
        let mut fx = Fixture::new();
        let dst = fx.place_completed(Tile::from_xy(0, 0), fx.warehouse, 1);
        let (fuel, _) = ship_300(&mut fx, Tile::from_xy(1, 0), dst);
        assert_eq!(fuel, fixed(30.0));
    }

    #[test]
    fn unlimited_warehouse_transport_ignores_distance() {
        let mut fx = Fixture::new();
        fx.world.upgrades.unlimited_warehouse_transport = true;
        let dst = fx.place_completed(Tile::from_xy(0, 0), fx.warehouse, 1);
        let (fuel, ticks) = ship_300(&mut fx, Tile::from_xy(6, 0), dst);
        assert_eq!(fuel, Fixed64::ZERO);
        assert_eq!(ticks, 6);
    }

    #[test]
    fn unlimited_transport_zone_covers_either_end() {
        // Near the target.
        let mut fx = Fixture::new();
        let ty = fx.mausoleum;
        special(&mut fx, ty, Tile::from_xy(1, 0));
        let dst = fx.site(Tile::from_xy(0, 0));
        let (fuel, ticks) = ship_300(&mut fx, Tile::from_xy(5, 0), dst);
        assert_eq!(fuel, Fixed64::ZERO);
        assert_eq!(ticks, 5, "capacity zone does not shorten the trip");

        // Near the source.
        let mut fx = Fixture::new();
        let ty = fx.mausoleum;
        special(&mut fx, ty, Tile::from_xy(7, 0));
        let dst = fx.site(Tile::from_xy(0, 0));
        let (fuel, _) = ship_300(&mut fx, Tile::from_xy(5, 0), dst);
        assert_eq!(fuel, Fixed64::ZERO);

        // Out of reach of both.
        let mut fx = Fixture::new();
        let ty = fx.mausoleum;
        special(&mut fx, ty, Tile::from_xy(10, 0));
        let dst = fx.site(Tile::from_xy(0, 0));
        let (fuel, _) = ship_300(&mut fx, Tile::from_xy(5, 0), dst);
        assert_eq!(fuel, fixed(30.0));
    }

    #[test]
    fn immediate_transport_zone_covers_either_end() {
        // Near the target.
        let mut fx = Fixture::new();
        let ty = fx.stupa;
        special(&mut fx, ty, Tile::from_xy(1, 0));
        let dst = fx.site(Tile::from_xy(0, 0));
        let (fuel, ticks) = ship_300(&mut fx, Tile::from_xy(6, 0), dst);
        assert_eq!(ticks, 1);
        assert_eq!(fuel, fixed(30.0), "immediate trips still pay fuel");

        // Near the source only.
        let mut fx = Fixture::new();
        let ty = fx.stupa;
        special(&mut fx, ty, Tile::from_xy(8, 0));
        let dst = fx.site(Tile::from_xy(1, 0));
        let (_, ticks) = ship_300(&mut fx, Tile::from_xy(7, 0), dst);
        assert_eq!(ticks, 1);

        // Out of reach of both.
        let mut fx = Fixture::new();
        let ty = fx.stupa;
        special(&mut fx, ty, Tile::from_xy(11, 0));
        let dst = fx.site(Tile::from_xy(0, 0));
        let (_, ticks) = ship_300(&mut fx, Tile::from_xy(6, 0), dst);
        assert_eq!(ticks, 6);
    }

    #[test]
    fn fuel_for_capacity() {
        assert_eq!(
            TransportCapacity::Limited(fixed(10.0)).fuel_for(fixed(25.0)),
            Some(fixed(3.0))
        );
        assert_eq!(TransportCapacity::Limited(Fixed64::ZERO).fuel_for(fixed(1.0)), None);
        assert_eq!(TransportCapacity::Unlimited.fuel_for(fixed(1e6)), Some(Fixed64::ZERO));
    }
}
