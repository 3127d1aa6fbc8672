//! Shared test fixtures: a small content registry and a hand-driven tick
//! context.
//!
//! Available to this crate's unit tests and, behind the `test-utils`
//! feature, to dependents.

use crate::building::{Building, BuildingStatus};
use crate::cache::TransportSourceCache;
use crate::context::{PendingDeposit, TickContext};
use crate::engine::Simulation;
use crate::event::EventQueue;
use crate::fixed::Fixed64;
use crate::grid::Grid;
use crate::id::{BuildingTypeId, ResourceId, TechId, Tile};
use crate::options::GameOptions;
use crate::registry::{
    BuildingClass, BuildingDef, CostScaling, GlobalMultiplierKind, Multiplier, Registry,
    RegistryBuilder, ResourceKind, SpecialEffect, UnlockableDef,
};
use crate::resource::ResourceMap;
use crate::tick_data::{IntraTickCache, NotProducingReason, ResourceSource, TickData};
use crate::transport::TransportQueue;
use crate::world::World;

/// Grid used by fixtures unless a test asks for another size.
pub const FIXTURE_GRID: (u16, u16) = (12, 12);

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

fn table(entries: &[(ResourceId, f64)]) -> ResourceMap {
    entries.iter().map(|(r, a)| (*r, fixed(*a))).collect()
}

/// Ids of everything in the fixture content.
#[derive(Debug, Clone, Copy)]
pub struct Content {
    pub wood: ResourceId,
    pub stone: ResourceId,
    pub plank: ResourceId,
    pub paper: ResourceId,
    pub gold: ResourceId,
    pub science: ResourceId,
    pub pollution: ResourceId,
    pub power: ResourceId,
    pub worker: ResourceId,

    pub store: BuildingTypeId,
    pub hut: BuildingTypeId,
    pub house: BuildingTypeId,
    pub mill: BuildingTypeId,
    pub lab: BuildingTypeId,
    pub power_plant: BuildingTypeId,
    pub factory: BuildingTypeId,
    pub market: BuildingTypeId,
    pub warehouse: BuildingTypeId,
    pub clone_lab: BuildingTypeId,
    pub bank: BuildingTypeId,
    pub headquarter: BuildingTypeId,
    pub wonder: BuildingTypeId,
    pub quarry: BuildingTypeId,
    pub bazaar: BuildingTypeId,
    pub stupa: BuildingTypeId,
    pub mausoleum: BuildingTypeId,

    pub sawmills: TechId,
    pub logistics: TechId,
}

/// Build the fixture content.
///
/// | building    | role                                             |
/// |-------------|--------------------------------------------------|
/// | Store       | plain storage, 1000                              |
/// | Hut         | costs Wood 10 + Stone 5 per level, linear        |
/// | House       | makes 10 workers per level                       |
/// | Mill        | 2 Wood -> 1 Plank, 1 worker                      |
/// | Lab         | 1 Plank -> 2 Science + 1 Paper, storage 10       |
/// | PowerPlant  | makes Power                                      |
/// | Factory     | needs power, makes 1 Plank                       |
/// | Headquarter | one of a kind, receives science and pollution    |
/// | Wonder      | world wonder, 100 Stone per level                |
pub fn content() -> (Registry, Content) {
    let mut b = RegistryBuilder::new();
    let wood = b.register_resource("Wood", ResourceKind::Transportable);
    let stone = b.register_resource("Stone", ResourceKind::Transportable);
    let plank = b.register_resource("Plank", ResourceKind::Transportable);
    let paper = b.register_resource("Paper", ResourceKind::Transportable);
    let gold = b.register_resource("Gold", ResourceKind::Transportable);
    let science = b.register_resource("Science", ResourceKind::Science);
    let pollution = b.register_resource("Pollution", ResourceKind::Pollution);
    let power = b.register_resource("Power", ResourceKind::Power);
    let worker = b.register_resource("Worker", ResourceKind::Worker);
    for (name, price) in [("Wood", 2.0), ("Stone", 1.0), ("Plank", 4.0), ("Gold", 10.0)] {
        b.mutate_resource(name, |r| r.price = Some(fixed(price)))
            .expect("fixture resource");
    }

    let mut def = BuildingDef::new("Store", BuildingClass::Standard);
    def.storage = fixed(1000.0);
    let store = b.register_building(def);

    let mut def = BuildingDef::new("Hut", BuildingClass::Standard);
    def.construction_cost = table(&[(wood, 10.0), (stone, 5.0)]);
    def.builder_capacity = fixed(100.0);
    def.storage = fixed(100.0);
    let hut = b.register_building(def);

    let mut def = BuildingDef::new("House", BuildingClass::Standard);
    def.output = table(&[(worker, 10.0)]);
    def.construction_cost = table(&[(wood, 5.0)]);
    def.builder_capacity = fixed(100.0);
    let house = b.register_building(def);

    let mut def = BuildingDef::new("Mill", BuildingClass::Standard);
    def.input = table(&[(wood, 2.0)]);
    def.output = table(&[(plank, 1.0)]);
    def.construction_cost = table(&[(wood, 5.0)]);
    def.workers = Fixed64::ONE;
    def.storage = fixed(50.0);
    def.builder_capacity = fixed(100.0);
    let mill = b.register_building(def);

    let mut def = BuildingDef::new("Lab", BuildingClass::Standard);
    def.input = table(&[(plank, 1.0)]);
    def.output = table(&[(science, 2.0), (paper, 1.0)]);
    def.workers = Fixed64::ONE;
    def.storage = fixed(10.0);
    let lab = b.register_building(def);

    let mut def = BuildingDef::new("PowerPlant", BuildingClass::Standard);
    def.output = table(&[(power, 1.0)]);
    let power_plant = b.register_building(def);

    let mut def = BuildingDef::new("Factory", BuildingClass::Standard);
    def.output = table(&[(plank, 1.0)]);
    def.power = true;
    def.workers = Fixed64::ONE;
    def.storage = fixed(50.0);
    let factory = b.register_building(def);

    let mut def = BuildingDef::new("Market", BuildingClass::Market);
    def.trade_value = fixed(20.0);
    def.storage = fixed(1000.0);
    let market = b.register_building(def);

    let mut def = BuildingDef::new("Warehouse", BuildingClass::Warehouse);
    def.storage = fixed(100.0);
    def.import_capacity = fixed(10.0);
    def.range = Some(2);
    let warehouse = b.register_building(def);

    let mut def = BuildingDef::new("CloneLab", BuildingClass::CloneFactory);
    def.workers = Fixed64::ONE;
    def.storage = fixed(100.0);
    let clone_lab = b.register_building(def);

    let mut def = BuildingDef::new("Bank", BuildingClass::SwissBank);
    def.storage = fixed(100.0);
    let bank = b.register_building(def);

    let mut def = BuildingDef::new("Headquarter", BuildingClass::Standard);
    def.max = Some(1);
    def.special = Some(SpecialEffect::Headquarter);
    let headquarter = b.register_building(def);

    let mut def = BuildingDef::new("Wonder", BuildingClass::Standard);
    def.max = Some(1);
    def.world_wonder = true;
    def.construction_cost = table(&[(stone, 100.0)]);
    def.cost_scaling = CostScaling::Flat;
    def.builder_capacity = fixed(1000.0);
    let wonder = b.register_building(def);

    let mut def = BuildingDef::new("Quarry", BuildingClass::Standard);
    def.deposit.insert(stone);
    def.output = table(&[(stone, 1.0)]);
    def.storage = fixed(50.0);
    let quarry = b.register_building(def);

    let mut specials = Vec::new();
    for (name, effect) in [
        ("Bazaar", SpecialEffect::PriceStabilizer),
        ("Mausoleum", SpecialEffect::UnlimitedTransport),
        ("Stupa", SpecialEffect::ImmediateTransport),
    ] {
        let mut def = BuildingDef::new(name, BuildingClass::Standard);
        def.max = Some(1);
        def.special = Some(effect);
        specials.push(b.register_building(def));
    }

    let sawmills = b.register_unlockable(UnlockableDef {
        name: "Sawmills".to_string(),
        unlock_buildings: vec![mill],
        building_multipliers: vec![(
            mill,
            Multiplier {
                output: fixed(1.0),
                source: "Sawmills".to_string(),
                ..Default::default()
            },
        )],
        global_multipliers: Vec::new(),
    });
    let logistics = b.register_unlockable(UnlockableDef {
        name: "Logistics".to_string(),
        unlock_buildings: Vec::new(),
        building_multipliers: Vec::new(),
        global_multipliers: vec![
            (GlobalMultiplierKind::TransportCapacity, fixed(1.0)),
            (GlobalMultiplierKind::BuilderCapacity, fixed(0.5)),
        ],
    });
    b.mutate_resource("Gold", |r| r.unlocked_by = Some(logistics))
        .expect("fixture resource");

    let registry = b.build().expect("fixture registry");
    let content = Content {
        wood,
        stone,
        plank,
        paper,
        gold,
        science,
        pollution,
        power,
        worker,
        store,
        hut,
        house,
        mill,
        lab,
        power_plant,
        factory,
        market,
        warehouse,
        clone_lab,
        bank,
        headquarter,
        wonder,
        quarry,
        bazaar: specials[0],
        mausoleum: specials[1],
        stupa: specials[2],
        sawmills,
        logistics,
    };
    (registry, content)
}

/// A completed building of `type_id` at `level`.
pub fn completed_building(registry: &Registry, type_id: BuildingTypeId, level: u32) -> Building {
    let def = registry.building(type_id).expect("fixture building");
    let mut b = Building::new(type_id, def);
    b.level = level;
    b.desired_level = level;
    b.status = BuildingStatus::Completed;
    b
}

/// A simulation over the fixture content on a `width × height` grid.
pub fn simulation(width: u16, height: u16) -> (Simulation, Content) {
    let (registry, content) = content();
    let sim = Simulation::new(registry, GameOptions::default(), Grid::new(width, height));
    (sim, content)
}

// ---------------------------------------------------------------------------
// Fixture
// ---------------------------------------------------------------------------

/// Owns every piece of a [`TickContext`] so single tile steps can be driven
/// and inspected without the engine.
pub struct Fixture {
    pub registry: Registry,
    pub options: GameOptions,
    pub world: World,
    pub current: TickData,
    pub next: TickData,
    pub intra: IntraTickCache,
    pub transports: TransportQueue,
    pub source_cache: TransportSourceCache,
    pub events: EventQueue,
    pub pending: Vec<PendingDeposit>,
    pub offline: bool,

    pub wood: ResourceId,
    pub stone: ResourceId,
    pub plank: ResourceId,
    pub paper: ResourceId,
    pub gold: ResourceId,
    pub science: ResourceId,
    pub pollution: ResourceId,
    pub power: ResourceId,
    pub worker: ResourceId,

    pub store: BuildingTypeId,
    pub hut: BuildingTypeId,
    pub house: BuildingTypeId,
    pub mill: BuildingTypeId,
    pub lab: BuildingTypeId,
    pub power_plant: BuildingTypeId,
    pub factory: BuildingTypeId,
    pub market: BuildingTypeId,
    pub warehouse: BuildingTypeId,
    pub clone_lab: BuildingTypeId,
    pub bank: BuildingTypeId,
    pub headquarter: BuildingTypeId,
    pub wonder: BuildingTypeId,
    pub quarry: BuildingTypeId,
    pub bazaar: BuildingTypeId,
    pub stupa: BuildingTypeId,
    pub mausoleum: BuildingTypeId,
}

impl Fixture {
    pub fn new() -> Self {
        let (registry, c) = content();
        let (w, h) = FIXTURE_GRID;
        Self {
            registry,
            options: GameOptions::default(),
            world: World::new(Grid::new(w, h)),
            current: TickData::default(),
            next: TickData::default(),
            intra: IntraTickCache::default(),
            transports: TransportQueue::new(),
            source_cache: TransportSourceCache::new(),
            events: EventQueue::new(),
            pending: Vec::new(),
            offline: false,
            wood: c.wood,
            stone: c.stone,
            plank: c.plank,
            paper: c.paper,
            gold: c.gold,
            science: c.science,
            pollution: c.pollution,
            power: c.power,
            worker: c.worker,
            store: c.store,
            hut: c.hut,
            house: c.house,
            mill: c.mill,
            lab: c.lab,
            power_plant: c.power_plant,
            factory: c.factory,
            market: c.market,
            warehouse: c.warehouse,
            clone_lab: c.clone_lab,
            bank: c.bank,
            headquarter: c.headquarter,
            wonder: c.wonder,
            quarry: c.quarry,
            bazaar: c.bazaar,
            stupa: c.stupa,
            mausoleum: c.mausoleum,
        }
    }

    /// Run `f` with a context borrowing the fixture's state.
    pub fn with_ctx<R>(&mut self, f: impl FnOnce(&mut TickContext<'_>) -> R) -> R {
        let mut ctx = TickContext {
            registry: &self.registry,
            options: &self.options,
            world: &mut self.world,
            current: &self.current,
            next: &mut self.next,
            intra: &mut self.intra,
            transports: &mut self.transports,
            source_cache: &mut self.source_cache,
            events: &mut self.events,
            pending_deposits: &mut self.pending,
            worker: Some(self.worker),
            offline: self.offline,
        };
        f(&mut ctx)
    }

    /// Workers available from last tick.
    pub fn set_workers(&mut self, amount: f64) {
        self.current.workers_available.set(self.worker, fixed(amount));
    }

    pub fn place_site(&mut self, tile: Tile, type_id: BuildingTypeId) {
        let def = self.registry.building(type_id).expect("fixture building");
        let b = Building::new(type_id, def);
        self.world.tile_mut(tile).expect("tile in grid").building = Some(b);
    }

    /// A Hut construction site.
    pub fn site(&mut self, tile: Tile) -> Tile {
        self.place_site(tile, self.hut);
        tile
    }

    pub fn place_completed(&mut self, tile: Tile, type_id: BuildingTypeId, level: u32) -> Tile {
        let b = completed_building(&self.registry, type_id, level);
        self.world.tile_mut(tile).expect("tile in grid").building = Some(b);
        tile
    }

    pub fn give(&mut self, tile: Tile, amounts: &[(ResourceId, f64)]) {
        let b = self.world.building_mut(tile).expect("building on tile");
        for (res, amount) in amounts {
            b.resources.add(*res, fixed(*amount));
        }
    }

    /// A completed Store holding `amounts`.
    pub fn completed_store(&mut self, tile: Tile, amounts: &[(ResourceId, f64)]) -> Tile {
        self.place_completed(tile, self.store, 1);
        self.give(tile, amounts);
        tile
    }

    /// Pretend last tick's tabulation saw `tile` holding `amount` of `res`.
    pub fn tabulate_source(&mut self, res: ResourceId, tile: Tile, amount: f64) {
        self.current.add_source(
            res,
            ResourceSource {
                tile,
                amount: fixed(amount),
                used_storage_percentage: Fixed64::ZERO,
            },
        );
    }

    pub fn reason(&self, tile: Tile) -> Option<NotProducingReason> {
        self.next.not_producing_reasons.get(&tile).copied()
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}
