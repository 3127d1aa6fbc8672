use serde::{Deserialize, Serialize};

use crate::building::InputMode;

/// Game-wide settings read by the tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameOptions {
    /// Request material for the desired level at once instead of one level
    /// at a time.
    pub greedy_transport: bool,
    /// Memoize router source lists. Always on while catching up offline.
    pub enable_transport_source_cache: bool,
    pub stacking_enabled: bool,
    /// Input mode for buildings without their own.
    pub default_input_mode: InputMode,
    /// Power buildings at or above this level need power while upgrading.
    pub high_level_power_threshold: u32,
    /// Ticks between persist requests.
    pub persist_interval: u64,
    /// Radius around an `ImmediateTransport` building.
    pub immediate_transport_radius: u32,
    /// Radius around an `UnlimitedTransport` building.
    pub unlimited_transport_radius: u32,
    /// Radius a managed import building scans for producers.
    pub managed_import_range: u32,
    /// Furthest a single downgrade order may reach below the current level.
    pub max_downgrade_levels: u32,
}

impl Default for GameOptions {
    fn default() -> Self {
        Self {
            greedy_transport: false,
            enable_transport_source_cache: true,
            stacking_enabled: true,
            default_input_mode: InputMode::Distance,
            high_level_power_threshold: 10,
            persist_interval: 5,
            immediate_transport_radius: 2,
            unlimited_transport_radius: 2,
            managed_import_range: 2,
            max_downgrade_levels: 5,
        }
    }
}
