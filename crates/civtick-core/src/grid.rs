//! Hexagonal tile grid.
//!
//! Odd-row offset layout ("odd-r"): odd rows are shoved half a tile to the
//! right. Distances are computed in cube coordinates.

use serde::{Deserialize, Serialize};

use crate::id::Tile;

/// A column/row position on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    fn to_cube(self) -> (i32, i32, i32) {
        let q = self.x - (self.y - (self.y & 1)) / 2;
        let r = self.y;
        (q, r, -q - r)
    }
}

const EVEN_ROW_NEIGHBORS: [(i32, i32); 6] = [(1, 0), (0, -1), (-1, -1), (-1, 0), (-1, 1), (0, 1)];
const ODD_ROW_NEIGHBORS: [(i32, i32); 6] = [(1, 0), (1, -1), (0, -1), (-1, 0), (0, 1), (1, 1)];

/// Bounded hex grid of `width x height` tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    width: u16,
    height: u16,
}

impl Grid {
    pub fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn contains(&self, p: Point) -> bool {
        p.x >= 0 && p.y >= 0 && p.x < self.width as i32 && p.y < self.height as i32
    }

    pub fn tile_to_point(&self, tile: Tile) -> Point {
        Point::new(tile.x() as i32, tile.y() as i32)
    }

    /// Tile key for an in-bounds point.
    pub fn point_to_tile(&self, p: Point) -> Option<Tile> {
        self.contains(p).then(|| Tile::from_xy(p.x as u16, p.y as u16))
    }

    /// All in-bounds tiles, column-major (same order as `Tile`'s `Ord`).
    pub fn tiles(&self) -> impl Iterator<Item = Tile> + '_ {
        (0..self.width).flat_map(move |x| (0..self.height).map(move |y| Tile::from_xy(x, y)))
    }

    /// In-bounds neighbors of `p` (up to six).
    pub fn neighbors(&self, p: Point) -> Vec<Point> {
        let offsets = if p.y & 1 == 0 {
            &EVEN_ROW_NEIGHBORS
        } else {
            &ODD_ROW_NEIGHBORS
        };
        offsets
            .iter()
            .map(|(dx, dy)| Point::new(p.x + dx, p.y + dy))
            .filter(|n| self.contains(*n))
            .collect()
    }

    /// Neighbor tiles of `tile`.
    pub fn neighbor_tiles(&self, tile: Tile) -> Vec<Tile> {
        self.neighbors(self.tile_to_point(tile))
            .into_iter()
            .filter_map(|p| self.point_to_tile(p))
            .collect()
    }

    /// Every in-bounds point within hex distance `radius` of `center`,
    /// center included.
    pub fn range(&self, center: Point, radius: u32) -> Vec<Point> {
        let r = radius as i32;
        let mut out = Vec::new();
        for dy in -r..=r {
            for dx in -r - 1..=r + 1 {
                let p = Point::new(center.x + dx, center.y + dy);
                if self.contains(p) && Self::point_distance(center, p) <= radius {
                    out.push(p);
                }
            }
        }
        out
    }

    /// Hex distance between two points.
    pub fn point_distance(a: Point, b: Point) -> u32 {
        let (aq, ar, as_) = a.to_cube();
        let (bq, br, bs) = b.to_cube();
        let d = (aq - bq).abs().max((ar - br).abs()).max((as_ - bs).abs());
        d as u32
    }

    /// Hex distance between two tiles.
    pub fn distance(&self, a: Tile, b: Tile) -> u32 {
        Self::point_distance(self.tile_to_point(a), self.tile_to_point(b))
    }
}
