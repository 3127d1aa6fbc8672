//! The simulation: owns the world and drives the tick pipeline.
//!
//! One tick runs, in order:
//!
//! 1. swap the tick buffers and clear the intra-tick cache
//! 2. research effects into `next`
//! 3. market pricing for the current hour
//! 4. advance transports and deliver arrivals
//! 5. the tile pass, in [`Simulation::sorted_tiles`] order; each tile
//!    tabulates, then runs construction or production
//! 6. apply pending deposits
//! 7. power propagation
//! 8. tick counter and state hash

use serde::Serialize;
use tracing::debug;

use crate::building::{Building, BuildingStatus};
use crate::cache::TransportSourceCache;
use crate::construction::{Progress, tick_construction, update_status};
use crate::context::{PendingDeposit, TickContext};
use crate::error::SimError;
use crate::event::EventQueue;
use crate::fixed::Ticks;
use crate::grid::Grid;
use crate::id::{BuildingTypeId, ResourceId, TechId, Tile};
use crate::market::tick_prices;
use crate::options::GameOptions;
use crate::power::tick_power;
use crate::production::{tabulate, tick_production};
use crate::registry::Registry;
use crate::sim::{AdvanceResult, StateHash, TickReport};
use crate::tick_data::{IntraTickCache, TickBuffers, TickData};
use crate::transport::TransportQueue;
use crate::unlockable::tick_unlockables;
use crate::world::{TileData, World, WorldUpgrades};

/// The economic simulation of one city.
#[derive(Debug)]
pub struct Simulation {
    registry: Registry,
    options: GameOptions,
    world: World,
    buffers: TickBuffers,
    intra: IntraTickCache,
    transports: TransportQueue,
    source_cache: TransportSourceCache,
    events: EventQueue,
    /// Resource that fuels transports, resolved once from the registry.
    worker: Option<ResourceId>,
    last_state_hash: u64,
}

/// Borrowed view of the state a snapshot encodes.
#[derive(Serialize)]
struct SnapshotView<'a> {
    world: &'a World,
    buffers: &'a TickBuffers,
    transports: &'a TransportQueue,
}

impl Simulation {
    /// An empty, fully explored world on `grid`.
    pub fn new(registry: Registry, options: GameOptions, grid: Grid) -> Self {
        let worker = registry.worker_resource();
        Self {
            registry,
            options,
            world: World::new(grid),
            buffers: TickBuffers::new(),
            intra: IntraTickCache::default(),
            transports: TransportQueue::new(),
            source_cache: TransportSourceCache::new(),
            events: EventQueue::new(),
            worker,
            last_state_hash: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn options(&self) -> &GameOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut GameOptions {
        &mut self.options
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Aggregates finalized by the last completed tick. The next tick reads
    /// these as its `current` buffer.
    pub fn tick_data(&self) -> &TickData {
        &self.buffers.next
    }

    pub fn transports(&self) -> &TransportQueue {
        &self.transports
    }

    pub fn source_cache(&self) -> &TransportSourceCache {
        &self.source_cache
    }

    /// Event suppression. Buffered events are handed out with each tick.
    pub fn events_mut(&mut self) -> &mut EventQueue {
        &mut self.events
    }

    pub fn tick_count(&self) -> Ticks {
        self.world.tick
    }

    pub fn building(&self, tile: Tile) -> Option<&Building> {
        self.world.building(tile)
    }

    /// Player settings: desired level/stack, capacity, priority, input
    /// modes, market and warehouse options.
    pub fn building_mut(&mut self, tile: Tile) -> Option<&mut Building> {
        self.world.building_mut(tile)
    }

    pub fn upgrades_mut(&mut self) -> &mut WorldUpgrades {
        &mut self.world.upgrades
    }

    /// Map generation: deposits and exploration of a bare tile.
    pub fn tile_setup(&mut self, tile: Tile) -> Result<TileSetup<'_>, SimError> {
        let data = self.world.tile_mut(tile).ok_or(SimError::OutOfGrid(tile))?;
        Ok(TileSetup { data })
    }

    /// Hash of the state as of the last completed tick.
    pub fn state_hash(&self) -> u64 {
        self.last_state_hash
    }

    /// Encode world, tick buffers and transports. Two runs that agree
    /// byte for byte have diverged nowhere.
    pub fn snapshot(&self) -> Result<Vec<u8>, SimError> {
        let view = SnapshotView {
            world: &self.world,
            buffers: &self.buffers,
            transports: &self.transports,
        };
        bitcode::serialize(&view).map_err(|e| SimError::Snapshot(e.to_string()))
    }

    // -----------------------------------------------------------------------
    // Topology
    // -----------------------------------------------------------------------

    /// Put a new construction site on a bare tile.
    pub fn place_building(&mut self, tile: Tile, type_id: BuildingTypeId) -> Result<(), SimError> {
        let def = self
            .registry
            .building(type_id)
            .ok_or(SimError::UnknownBuilding(type_id))?;
        let data = self.world.tile(tile).ok_or(SimError::OutOfGrid(tile))?;
        if data.building.is_some() {
            return Err(SimError::TileOccupied(tile));
        }
        if let Some(max) = def.max {
            let count = self
                .world
                .buildings()
                .filter(|(_, b)| b.type_id == type_id)
                .count();
            if count >= max as usize {
                return Err(SimError::InstanceLimit { type_id, max });
            }
        }
        self.world.put_building(tile, Building::new(type_id, def));
        self.source_cache.invalidate();
        Ok(())
    }

    /// Demolish the building on `tile`. Shipments heading to it are
    /// cancelled.
    pub fn remove_building(&mut self, tile: Tile) -> Result<Building, SimError> {
        let b = self
            .world
            .take_building(tile)
            .ok_or(SimError::NoBuilding(tile))?;
        self.transports.cancel_for(tile);
        self.source_cache.invalidate();
        Ok(b)
    }

    /// Relocate a building to an explored, bare tile, keeping its level,
    /// stock and settings.
    pub fn move_building(&mut self, from: Tile, to: Tile) -> Result<(), SimError> {
        let target = self.world.tile(to).ok_or(SimError::OutOfGrid(to))?;
        if target.building.is_some() {
            return Err(SimError::TileOccupied(to));
        }
        if !target.explored {
            return Err(SimError::Unexplored(to));
        }
        let b = self
            .world
            .take_building(from)
            .ok_or(SimError::NoBuilding(from))?;
        self.world.put_building(to, b);
        self.transports.cancel_for(from);
        self.source_cache.invalidate();
        Ok(())
    }

    pub fn unlock_tech(&mut self, tech: TechId) -> Result<(), SimError> {
        self.registry
            .unlockable(tech)
            .ok_or(SimError::UnknownTech(tech))?;
        if self.world.unlocked.insert(tech) {
            self.events.emit(crate::event::SimEvent::TechUnlocked { tech });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Ticking
    // -----------------------------------------------------------------------

    /// Run one online tick at wall-clock time `now_ms`.
    pub fn tick(&mut self, now_ms: u64) -> TickReport {
        self.step(now_ms, false)
    }

    /// Run `ticks` offline ticks back to back. Each sees the previous
    /// tick's finalized buffer.
    pub fn catch_up(&mut self, ticks: u64, now_ms: u64) -> AdvanceResult {
        let mut result = AdvanceResult::default();
        for _ in 0..ticks {
            let report = self.step(now_ms, true);
            result.absorb(report);
        }
        result
    }

    /// Tiles in processing order: construction sites first, then priority
    /// descending, then tier ascending, then tile key. Paused buildings and
    /// unexplored natural wonders are left out.
    pub fn sorted_tiles(&self) -> Vec<Tile> {
        let mut tiles: Vec<(bool, u8, u32, Tile)> = self
            .world
            .tiles()
            .filter_map(|(tile, data)| {
                let b = data.building.as_ref()?;
                if b.status == BuildingStatus::Paused {
                    return None;
                }
                let def = self.registry.building(b.type_id)?;
                if def.natural_wonder && !data.explored {
                    return None;
                }
                Some((
                    !b.status.is_under_construction(),
                    b.current_priority(),
                    def.tier,
                    tile,
                ))
            })
            .collect();
        tiles.sort_by(|a, b| {
            a.0.cmp(&b.0)
                .then(b.1.cmp(&a.1))
                .then(a.2.cmp(&b.2))
                .then(a.3.cmp(&b.3))
        });
        tiles.into_iter().map(|(_, _, _, t)| t).collect()
    }

    fn step(&mut self, now_ms: u64, offline: bool) -> TickReport {
        self.buffers.swap();
        self.intra.clear();
        self.source_cache.begin_tick();

        tick_unlockables(&self.registry, &self.world, &mut self.buffers.next);
        tick_prices(
            &self.registry,
            &mut self.world,
            &self.buffers.current,
            &mut self.events,
            now_ms,
        );
        let delivered = self
            .transports
            .advance(&mut self.world, &self.registry, &self.buffers.current, &mut self.intra)
            .len();

        let order = self.sorted_tiles();
        let mut pending: Vec<PendingDeposit> = Vec::new();
        {
            let TickBuffers { current, next } = &mut self.buffers;
            let mut ctx = TickContext {
                registry: &self.registry,
                options: &self.options,
                world: &mut self.world,
                current,
                next,
                intra: &mut self.intra,
                transports: &mut self.transports,
                source_cache: &mut self.source_cache,
                events: &mut self.events,
                pending_deposits: &mut pending,
                worker: self.worker,
                offline,
            };
            for tile in order {
                tick_tile(&mut ctx, tile);
            }
        }
        for d in pending {
            if let Some(b) = self.world.building_mut(d.tile) {
                b.resources.add(d.resource, d.amount);
            }
        }

        tick_power(&self.world.grid, &mut self.buffers.next);
        self.world.tick += 1;
        self.last_state_hash = self.compute_hash();

        let events = self.events.drain();
        let interval = self.options.persist_interval;
        let persist_due = interval > 0 && self.world.tick % interval == 0;
        debug!(
            tick = self.world.tick,
            transports = self.transports.len(),
            delivered,
            events = events.len(),
            hash = self.last_state_hash,
            offline,
            "tick complete"
        );
        TickReport {
            tick: self.world.tick,
            events,
            transports_delivered: delivered,
            persist_due,
        }
    }

    fn compute_hash(&self) -> u64 {
        let mut h = StateHash::new();
        h.write_u64(self.world.tick);
        for (tile, b) in self.world.buildings() {
            h.write_u32(tile.0);
            h.write_u32(b.type_id.0);
            h.write_u32(b.level);
            h.write_u32(b.stack);
            h.write(&[b.status as u8]);
            for (res, amount) in b.resources.iter() {
                h.write_u32(res.0);
                h.write_fixed64(amount);
            }
        }
        for t in self.transports.iter() {
            h.write_u64(t.id.0);
            h.write_fixed64(t.amount);
            h.write_u32(t.ticks_spent);
        }
        for tile in &self.buffers.next.power_grid {
            h.write_u32(tile.0);
        }
        h.finish()
    }
}

/// One tile's turn in the tile pass.
fn tick_tile(ctx: &mut TickContext<'_>, tile: Tile) {
    let options = ctx.options;
    let Some(b) = ctx.world.building_mut(tile) else {
        return;
    };
    update_status(b, options);
    tabulate(ctx, tile);
    if tick_construction(ctx, tile) == Progress::Produce {
        tick_production(ctx, tile);
    }
}

/// Mutable access to a tile's map-generation data.
pub struct TileSetup<'a> {
    data: &'a mut TileData,
}

impl TileSetup<'_> {
    pub fn deposit(self, res: ResourceId) -> Self {
        self.data.deposit.insert(res);
        self
    }

    pub fn explored(self, explored: bool) -> Self {
        self.data.explored = explored;
        self
    }
}
