//! Research effects. Every tick, each unlocked tech writes its unlocked
//! buildings and multipliers into the next buffer.

use tracing::warn;

use crate::registry::Registry;
use crate::tick_data::TickData;
use crate::world::World;

pub fn tick_unlockables(registry: &Registry, world: &World, next: &mut TickData) {
    for tech in &world.unlocked {
        let Some(def) = registry.unlockable(*tech) else {
            warn!(tech = tech.0, "unlocked tech has no registry entry, skipping");
            continue;
        };
        next.unlocked_buildings.extend(def.unlock_buildings.iter().copied());
        for (type_id, multiplier) in &def.building_multipliers {
            next.building_multipliers
                .entry(*type_id)
                .or_default()
                .push(multiplier.clone());
        }
        for (kind, value) in &def.global_multipliers {
            next.add_global_multiplier(*kind, *value, &def.name);
        }
    }
}
