use crate::id::{BuildingTypeId, TechId, Tile};

/// Errors from player-facing mutations of the world.
///
/// Nothing inside a tick returns these; tick outcomes are recorded as
/// [`NotProducingReason`](crate::tick_data::NotProducingReason)s.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    #[error("tile {0} is outside the grid")]
    OutOfGrid(Tile),
    #[error("tile {0} already has a building")]
    TileOccupied(Tile),
    #[error("tile {0} has not been explored")]
    Unexplored(Tile),
    #[error("no building on tile {0}")]
    NoBuilding(Tile),
    #[error("unknown building type: {0:?}")]
    UnknownBuilding(BuildingTypeId),
    #[error("instance limit of {max} reached for {type_id:?}")]
    InstanceLimit { type_id: BuildingTypeId, max: u32 },
    #[error("unknown tech: {0:?}")]
    UnknownTech(TechId),
    #[error("snapshot encoding failed: {0}")]
    Snapshot(String),
}
