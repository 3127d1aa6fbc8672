//! Content loading for Civtick: resources, buildings, unlockables and game
//! options from RON, JSON or TOML files.

pub mod loader;
pub mod schema;

pub use loader::{DataLoadError, GameData, load_game_data};
