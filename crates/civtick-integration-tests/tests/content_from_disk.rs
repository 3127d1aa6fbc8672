//! Content loaded from data files drives the same tick as hand-built
//! registries.

use std::fs;
use std::path::{Path, PathBuf};

use civtick_core::building::BuildingStatus;
use civtick_core::engine::Simulation;
use civtick_core::event::SimEvent;
use civtick_core::fixed::Fixed64;
use civtick_core::grid::Grid;
use civtick_core::id::Tile;
use civtick_data::load_game_data;
use tracing::info;
use tracing_subscriber::EnvFilter;

const RESOURCES: &str = r#"[
    (name: "Wood", kind: Transportable, price: Some(2.0)),
    (name: "Stone", kind: Transportable, price: Some(1.0)),
    (name: "Worker", kind: Worker),
]"#;

const BUILDINGS: &str = r#"[
    (name: "Store", storage: 1000.0),
    (
        name: "Hut",
        construction_cost: {"Wood": 10.0, "Stone": 5.0},
        builder_capacity: 100.0,
        storage: 100.0,
    ),
    (name: "House", output: {"Worker": 10.0}),
]"#;

const OPTIONS: &str = r#"persist_interval = 2"#;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn content_dir(suffix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "civtick_scenario_{suffix}_{}",
        std::process::id()
    ));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("resources.ron"), RESOURCES).unwrap();
    fs::write(dir.join("buildings.ron"), BUILDINGS).unwrap();
    fs::write(dir.join("options.toml"), OPTIONS).unwrap();
    dir
}

fn cleanup(dir: &Path) {
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn loaded_hut_is_built_from_a_loaded_store() {
    init_tracing();
    let dir = content_dir("hut");
    let data = load_game_data(&dir).unwrap();
    info!(dir = %dir.display(), "content loaded");
    assert_eq!(data.options.persist_interval, 2);

    let reg = &data.registry;
    let wood = reg.resource_id("Wood").unwrap();
    let stone = reg.resource_id("Stone").unwrap();
    let store_ty = reg.building_id("Store").unwrap();
    let hut_ty = reg.building_id("Hut").unwrap();
    let house_ty = reg.building_id("House").unwrap();

    let mut sim = Simulation::new(data.registry, data.options, Grid::new(8, 8));
    let site = Tile::from_xy(0, 0);
    let store = Tile::from_xy(2, 0);
    let house = Tile::from_xy(6, 6);
    sim.place_building(site, hut_ty).unwrap();
    sim.place_building(store, store_ty).unwrap();
    sim.place_building(house, house_ty).unwrap();
    for tile in [store, house] {
        let b = sim.building_mut(tile).unwrap();
        b.level = 1;
        b.desired_level = 1;
        b.status = BuildingStatus::Completed;
    }
    {
        let b = sim.building_mut(store).unwrap();
        b.resources.add(wood, Fixed64::from_num(20));
        b.resources.add(stone, Fixed64::from_num(20));
    }

    let result = sim.catch_up(4, 0);
    assert_eq!(result.steps_run, 4);
    assert!(result.persist_due);
    assert!(result
        .events
        .contains(&SimEvent::BuildingComplete { tile: site }));

    let hut = sim.building(site).unwrap();
    assert_eq!(hut.level, 1);
    assert_eq!(hut.status, BuildingStatus::Completed);
    let stock = &sim.building(store).unwrap().resources;
    assert_eq!(stock.get(wood), Fixed64::from_num(10));
    assert_eq!(stock.get(stone), Fixed64::from_num(15));
    cleanup(&dir);
}

#[test]
fn broken_content_never_reaches_the_simulation() {
    init_tracing();
    let dir = content_dir("broken");
    fs::write(
        dir.join("buildings.ron"),
        r#"[(name: "Hut", construction_cost: {"Marble": 10.0})]"#,
    )
    .unwrap();
    let err = load_game_data(&dir).unwrap_err();
    assert!(err.to_string().contains("Marble"));
    cleanup(&dir);
}
