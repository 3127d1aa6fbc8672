//! Game state owned by the simulation: tiles, buildings and progress.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::building::Building;
use crate::fixed::Ticks;
use crate::grid::Grid;
use crate::id::{ResourceId, TechId, Tile};

/// One grid cell. Created with the map and never destroyed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TileData {
    pub building: Option<Building>,
    pub explored: bool,
    /// Natural deposits on this tile.
    pub deposit: BTreeSet<ResourceId>,
}

/// Progress flags that change transport rules.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldUpgrades {
    /// Warehouses transport with unlimited capacity within their range, and
    /// warehouse autopilot is available.
    pub warehouse_upgrade: bool,
    /// Warehouses transport with unlimited capacity at any distance.
    pub unlimited_warehouse_transport: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct World {
    pub grid: Grid,
    tiles: BTreeMap<Tile, TileData>,
    pub tick: Ticks,
    /// Hour bucket of the last market regeneration.
    pub last_price_updated: Option<u64>,
    pub unlocked: BTreeSet<TechId>,
    pub upgrades: WorldUpgrades,
    /// Id of the last transport created.
    pub transport_id: u64,
}

impl World {
    /// A world with one bare, explored tile per grid cell.
    pub fn new(grid: Grid) -> Self {
        let tiles = grid
            .tiles()
            .map(|t| {
                (
                    t,
                    TileData {
                        explored: true,
                        ..Default::default()
                    },
                )
            })
            .collect();
        Self {
            grid,
            tiles,
            tick: 0,
            last_price_updated: None,
            unlocked: BTreeSet::new(),
            upgrades: WorldUpgrades::default(),
            transport_id: 0,
        }
    }

    pub fn tile(&self, tile: Tile) -> Option<&TileData> {
        self.tiles.get(&tile)
    }

    pub fn tile_mut(&mut self, tile: Tile) -> Option<&mut TileData> {
        self.tiles.get_mut(&tile)
    }

    pub fn building(&self, tile: Tile) -> Option<&Building> {
        self.tiles.get(&tile).and_then(|t| t.building.as_ref())
    }

    pub fn building_mut(&mut self, tile: Tile) -> Option<&mut Building> {
        self.tiles.get_mut(&tile).and_then(|t| t.building.as_mut())
    }

    pub fn tiles(&self) -> impl Iterator<Item = (Tile, &TileData)> {
        self.tiles.iter().map(|(t, d)| (*t, d))
    }

    /// Tiles carrying a building, in key order.
    pub fn buildings(&self) -> impl Iterator<Item = (Tile, &Building)> {
        self.tiles
            .iter()
            .filter_map(|(t, d)| d.building.as_ref().map(|b| (*t, b)))
    }

    pub(crate) fn take_building(&mut self, tile: Tile) -> Option<Building> {
        self.tiles.get_mut(&tile).and_then(|t| t.building.take())
    }

    pub(crate) fn put_building(&mut self, tile: Tile, building: Building) {
        if let Some(t) = self.tiles.get_mut(&tile) {
            t.building = Some(building);
        }
    }

    pub(crate) fn next_transport_id(&mut self) -> u64 {
        self.transport_id += 1;
        self.transport_id
    }
}
