//! Power propagation.
//!
//! Plants power their neighbors. A powered consumer passes power on to its
//! own neighbors. The fill repeats until the powered set stops growing, so
//! consumers many hops from a plant are reached in one call regardless of
//! the order they were recorded in.
//!
//! Must run after the tile pass: it reads `power_plants` and
//! `power_buildings` as written into `next` during that pass.

use std::collections::BTreeSet;

use crate::grid::Grid;
use crate::id::Tile;
use crate::tick_data::TickData;

/// Compute `next.power_grid` from `next.power_plants` and
/// `next.power_buildings`.
pub fn tick_power(grid: &Grid, next: &mut TickData) {
    next.power_grid = powered_tiles(grid, &next.power_plants, &next.power_buildings);
}

/// Fixed-point flood fill from `plants` through `consumers`.
pub fn powered_tiles(grid: &Grid, plants: &BTreeSet<Tile>, consumers: &BTreeSet<Tile>) -> BTreeSet<Tile> {
    let mut powered: BTreeSet<Tile> = plants.iter().flat_map(|p| grid.neighbor_tiles(*p)).collect();
    loop {
        let size = powered.len();
        let reached: Vec<Tile> = consumers
            .iter()
            .filter(|c| powered.contains(c))
            .flat_map(|c| grid.neighbor_tiles(*c))
            .collect();
        powered.extend(reached);
        if powered.len() == size {
            return powered;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(tiles: &[(u16, u16)]) -> BTreeSet<Tile> {
        tiles.iter().map(|(x, y)| Tile::from_xy(*x, *y)).collect()
    }

    #[test]
    fn plant_powers_neighbors_only() {
        let grid = Grid::new(10, 10);
        let plants = set(&[(5, 5)]);
        let powered = powered_tiles(&grid, &plants, &BTreeSet::new());
        assert_eq!(powered.len(), 6);
        assert!(!powered.contains(&Tile::from_xy(5, 5)));
        assert!(powered.contains(&Tile::from_xy(6, 5)));
    }

    #[test]
    fn chain_of_consumers_reaches_fixed_point() {
        let grid = Grid::new(20, 1);
        let plants = set(&[(0, 0)]);
        let chain: Vec<(u16, u16)> = (1..12).map(|x| (x, 0)).collect();
        let consumers: BTreeSet<Tile> = chain.iter().map(|(x, y)| Tile::from_xy(*x, *y)).collect();
        let powered = powered_tiles(&grid, &plants, &consumers);
        for (x, y) in chain {
            assert!(powered.contains(&Tile::from_xy(x, y)), "({x},{y}) unpowered");
        }
        assert!(powered.contains(&Tile::from_xy(12, 0)));
        assert!(!powered.contains(&Tile::from_xy(13, 0)));
    }

    #[test]
    fn gap_breaks_the_grid() {
        let grid = Grid::new(10, 1);
        let plants = set(&[(0, 0)]);
        let consumers = set(&[(1, 0), (3, 0), (4, 0)]);
        let powered = powered_tiles(&grid, &plants, &consumers);
        assert!(powered.contains(&Tile::from_xy(2, 0)));
        assert!(!powered.contains(&Tile::from_xy(3, 0)));
        assert!(!powered.contains(&Tile::from_xy(4, 0)));
    }

    #[test]
    fn no_plants_no_power() {
        let grid = Grid::new(5, 5);
        let mut next = TickData::default();
        next.power_buildings = set(&[(1, 1), (1, 2)]);
        tick_power(&grid, &mut next);
        assert!(next.power_grid.is_empty());
    }
}
