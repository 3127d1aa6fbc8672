//! Headless city scenarios on the fixture content.
//!
//! Each test builds a small city through the public [`Simulation`] API,
//! runs a handful of ticks and checks what a player would see: stock in
//! buildings, research effects, market trades and price rollovers.
//!
//! Set `RUST_LOG=civtick_core=debug` to watch the tick pipeline.

use civtick_core::building::{BuildingKind, BuildingStatus};
use civtick_core::engine::Simulation;
use civtick_core::event::SimEvent;
use civtick_core::fixed::Fixed64;
use civtick_core::id::{ResourceId, TechId, Tile};
use civtick_core::io::market_buy_amount;
use civtick_core::market::{HOUR_MS, generate_pairing, market_seed, priced_resources};
use civtick_core::test_utils::*;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn complete(sim: &mut Simulation, tile: Tile, level: u32, stock: &[(ResourceId, f64)]) {
    let b = sim.building_mut(tile).unwrap();
    b.level = level;
    b.desired_level = level;
    b.status = BuildingStatus::Completed;
    for (res, amount) in stock {
        b.resources.add(*res, fixed(*amount));
    }
}

fn price_updates(events: &[SimEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|e| match e {
            SimEvent::PriceUpdated { price_id } => Some(*price_id),
            _ => None,
        })
        .collect()
}

// ===========================================================================
// Science
// ===========================================================================

/// The Lab waits a tick for workers and the Headquarter, then sends two
/// science per tick to the Headquarter while its paper stays home.
#[test]
fn science_lands_in_the_headquarter() {
    init_tracing();
    let (mut sim, c) = simulation(8, 8);
    let hq = Tile::from_xy(0, 0);
    let lab = Tile::from_xy(4, 4);
    let house = Tile::from_xy(7, 7);
    for (tile, ty) in [(hq, c.headquarter), (lab, c.lab), (house, c.house)] {
        sim.place_building(tile, ty).unwrap();
    }
    complete(&mut sim, hq, 1, &[]);
    complete(&mut sim, lab, 1, &[(c.plank, 5.0)]);
    complete(&mut sim, house, 1, &[]);

    sim.tick(0);
    assert_eq!(sim.building(hq).unwrap().resources.get(c.science), Fixed64::ZERO);
    assert_eq!(sim.tick_data().special_buildings.get(&c.headquarter), Some(&hq));

    sim.tick(0);
    sim.tick(0);
    assert_eq!(sim.building(hq).unwrap().resources.get(c.science), fixed(4.0));
    assert_eq!(sim.tick_data().science_produced.get(&lab), Some(&fixed(2.0)));

    let lab_stock = &sim.building(lab).unwrap().resources;
    assert_eq!(lab_stock.get(c.plank), fixed(3.0));
    assert_eq!(lab_stock.get(c.paper), fixed(2.0));
    assert_eq!(lab_stock.get(c.science), Fixed64::ZERO);
}

// ===========================================================================
// Research
// ===========================================================================

fn mill_city(research: bool) -> (Simulation, Tile, Content) {
    let (mut sim, c) = simulation(8, 8);
    let mill = Tile::from_xy(0, 0);
    let house = Tile::from_xy(6, 6);
    sim.place_building(mill, c.mill).unwrap();
    sim.place_building(house, c.house).unwrap();
    complete(&mut sim, mill, 1, &[(c.wood, 20.0)]);
    complete(&mut sim, house, 1, &[]);
    if research {
        sim.unlock_tech(c.sawmills).unwrap();
    }
    (sim, mill, c)
}

/// Sawmills adds one to the Mill's output multiplier. The bonus is written
/// on tick 1 and read on tick 2, the first tick the Mill is staffed.
#[test]
fn research_doubles_mill_output() {
    init_tracing();
    let (mut plain, plain_mill, c) = mill_city(false);
    let (mut researched, mill, _) = mill_city(true);

    let report = researched.tick(0);
    assert!(report
        .events
        .contains(&SimEvent::TechUnlocked { tech: c.sawmills }));
    assert!(researched.tick_data().unlocked_buildings.contains(&c.mill));
    plain.tick(0);

    researched.tick(0);
    plain.tick(0);
    let planks = researched.building(mill).unwrap().resources.get(c.plank);
    let plain_planks = plain.building(plain_mill).unwrap().resources.get(c.plank);
    assert_eq!(plain_planks, fixed(1.0));
    assert_eq!(planks, fixed(2.0));
    // Input is not scaled by an output bonus.
    assert_eq!(researched.building(mill).unwrap().resources.get(c.wood), fixed(18.0));
}

#[test]
fn unknown_tech_is_rejected() {
    let (mut sim, _) = simulation(4, 4);
    assert!(sim.unlock_tech(TechId(99)).is_err());
}

// ===========================================================================
// Market
// ===========================================================================

/// A level one Market sells trade value 20 worth of Wood (10 at price 2)
/// and receives whatever the hour's pairing offers for it.
#[test]
fn market_swaps_wood_for_its_hourly_partner() {
    init_tracing();
    let (mut sim, c) = simulation(8, 8);
    let market = Tile::from_xy(3, 3);
    sim.place_building(market, c.market).unwrap();
    complete(&mut sim, market, 1, &[(c.wood, 100.0)]);
    if let BuildingKind::Market(m) = &mut sim.building_mut(market).unwrap().kind {
        m.sell_resources.insert(c.wood);
    }

    let resources = priced_resources(sim.registry(), sim.world());
    assert!(!resources.contains(&c.gold));
    let pairing = generate_pairing(&resources, &market_seed(0, None));
    let buy = pairing[&c.wood];
    assert!(buy == c.stone || buy == c.plank);
    let expected = market_buy_amount(sim.registry(), c.wood, fixed(10.0), buy);

    let report = sim.tick(0);
    let b = sim.building(market).unwrap();
    assert_eq!(b.resources.get(c.wood), fixed(90.0));
    assert_eq!(b.resources.get(buy), expected);
    assert!(report.events.contains(&SimEvent::Floater {
        tile: market,
        resource: buy,
        amount: expected,
    }));
    match &b.kind {
        BuildingKind::Market(m) => assert_eq!(m.available_resources, pairing),
        _ => unreachable!(),
    }
}

#[test]
fn market_without_stock_trades_nothing() {
    let (mut sim, c) = simulation(8, 8);
    let market = Tile::from_xy(3, 3);
    sim.place_building(market, c.market).unwrap();
    complete(&mut sim, market, 1, &[]);
    if let BuildingKind::Market(m) = &mut sim.building_mut(market).unwrap().kind {
        m.sell_resources.insert(c.wood);
    }

    let report = sim.tick(0);
    assert!(sim.building(market).unwrap().resources.is_empty());
    assert!(!report
        .events
        .iter()
        .any(|e| matches!(e, SimEvent::ProductionComplete { tile, .. } if *tile == market)));
}

/// Pairings roll over once per hour of wall-clock time, and every market
/// regenerates from the new hour's seed.
#[test]
fn prices_roll_over_on_the_hour() {
    init_tracing();
    let (mut sim, c) = simulation(8, 8);
    let market = Tile::from_xy(0, 0);
    sim.place_building(market, c.market).unwrap();
    complete(&mut sim, market, 1, &[]);

    let report = sim.tick(1_000);
    assert_eq!(price_updates(&report.events), vec![0]);
    let report = sim.tick(HOUR_MS - 1);
    assert!(price_updates(&report.events).is_empty());

    let report = sim.tick(HOUR_MS);
    assert_eq!(price_updates(&report.events), vec![1]);
    let resources = priced_resources(sim.registry(), sim.world());
    match &sim.building(market).unwrap().kind {
        BuildingKind::Market(m) => {
            assert_eq!(m.available_resources, generate_pairing(&resources, &market_seed(1, None)));
        }
        _ => unreachable!(),
    }

    let result = sim.catch_up(3, 3 * HOUR_MS);
    assert_eq!(price_updates(&result.events), vec![3]);
}
