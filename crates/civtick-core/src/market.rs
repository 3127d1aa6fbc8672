//! Market pricing: hourly, seeded sell→buy pairings.
//!
//! Every market pairs each sellable resource with one it can be swapped
//! for. The pairing is a pure function of the hour bucket (plus the tile
//! key near a price-stabilizing wonder), so every client that sees the
//! same hour computes the same offers.

use std::collections::BTreeMap;

use crate::building::{BuildingKind, BuildingStatus};
use crate::event::{EventQueue, SimEvent};
use crate::id::{ResourceId, Tile};
use crate::registry::{Registry, SpecialEffect};
use crate::rng::SimRng;
use crate::tick_data::TickData;
use crate::world::World;

pub const HOUR_MS: u64 = 60 * 60 * 1000;

/// Hour bucket of a wall-clock timestamp.
pub fn price_id(now_ms: u64) -> u64 {
    now_ms / HOUR_MS
}

/// Start of an hour bucket, in milliseconds.
pub fn price_id_to_ms(price_id: u64) -> u64 {
    price_id.saturating_mul(HOUR_MS)
}

/// Resources a market may trade: unlocked, priced and transportable.
pub fn priced_resources(registry: &Registry, world: &World) -> Vec<ResourceId> {
    registry
        .resources()
        .filter(|(_, d)| d.kind.is_transportable() && d.price.is_some())
        .filter(|(_, d)| d.unlocked_by.is_none_or(|t| world.unlocked.contains(&t)))
        .map(|(id, _)| id)
        .collect()
}

/// Seed bytes for a market. Markets next to a price stabilizer get their
/// own stream.
pub fn market_seed(price_id: u64, salt: Option<Tile>) -> Vec<u8> {
    match salt {
        Some(tile) => format!("{price_id},{}", tile.0).into_bytes(),
        None => format!("{price_id}").into_bytes(),
    }
}

/// Pair every resource in `resources` with a different one.
///
/// Buy and sell orders come from the same seed, so they start out
/// identical; the forward scan past self-pairs is what makes them differ.
/// Fewer than two resources cannot be paired.
pub fn generate_pairing(resources: &[ResourceId], seed: &[u8]) -> BTreeMap<ResourceId, ResourceId> {
    let mut pairs = BTreeMap::new();
    if resources.len() < 2 {
        return pairs;
    }
    let mut buy = resources.to_vec();
    SimRng::from_seed_bytes(seed).shuffle(&mut buy);
    let mut sell = resources.to_vec();
    SimRng::from_seed_bytes(seed).shuffle(&mut sell);

    let mut idx = 0;
    for res in sell {
        while buy[idx % buy.len()] == res {
            idx += 1;
        }
        pairs.insert(res, buy[idx % buy.len()]);
    }
    pairs
}

/// Regenerate market pairings for the hour of `now_ms`.
///
/// Markets regenerate when the hour changes or their mapping is empty.
/// Emits [`SimEvent::PriceUpdated`] on an hour change.
pub fn tick_prices(
    registry: &Registry,
    world: &mut World,
    current: &TickData,
    events: &mut EventQueue,
    now_ms: u64,
) {
    let id = price_id(now_ms);
    let force = world.last_price_updated != Some(id);
    if force {
        world.last_price_updated = Some(id);
        events.emit(SimEvent::PriceUpdated { price_id: id });
    }

    let resources = priced_resources(registry, world);
    let stabilizers: Vec<Tile> = current
        .special_buildings
        .iter()
        .filter(|(ty, _)| {
            registry
                .building(**ty)
                .is_some_and(|d| d.special == Some(SpecialEffect::PriceStabilizer))
        })
        .map(|(_, t)| *t)
        .filter(|t| {
            world
                .building(*t)
                .is_some_and(|b| b.status == BuildingStatus::Completed)
        })
        .collect();

    let grid = world.grid;
    let markets: Vec<Tile> = world
        .buildings()
        .filter(|(_, b)| matches!(b.kind, BuildingKind::Market(_)))
        .map(|(t, _)| t)
        .collect();
    for tile in markets {
        let Some(b) = world.building_mut(tile) else {
            continue;
        };
        let BuildingKind::Market(market) = &mut b.kind else {
            continue;
        };
        if !force && !market.available_resources.is_empty() {
            continue;
        }
        let salt = stabilizers
            .iter()
            .any(|s| grid.distance(*s, tile) <= 1)
            .then_some(tile);
        market.available_resources = generate_pairing(&resources, &market_seed(id, salt));
        if market.clear_after_update {
            market.sell_resources.clear();
        } else {
            let available = &market.available_resources;
            market.sell_resources.retain(|r| available.contains_key(r));
        }
    }
}
