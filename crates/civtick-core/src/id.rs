use serde::{Deserialize, Serialize};
use std::fmt;

/// Key of one grid cell: `(x << 16) | y`.
///
/// Ordering follows the packed value, which gives every map keyed by tile a
/// stable iteration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Tile(pub u32);

impl Tile {
    pub fn from_xy(x: u16, y: u16) -> Self {
        Self(((x as u32) << 16) | y as u32)
    }

    pub fn x(self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub fn y(self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x(), self.y())
    }
}

/// Identifies a resource type in the registry. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceId(pub u32);

/// Identifies a building template in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BuildingTypeId(pub u32);

/// Identifies an unlockable (tech) in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TechId(pub u32);

/// Identifies an in-flight transport. Monotonic per world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransportId(pub u64);
