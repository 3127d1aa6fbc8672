use crate::id::{ResourceId, Tile};
use std::collections::BTreeMap;

/// Memoized source candidate lists for the router, keyed by
/// `(target tile, resource)`.
///
/// Only the sorted tile list is stored. Amounts, status and distance limits
/// are re-checked live on every walk, so a list only goes stale when the set
/// of buildings changes. Every add/remove/move of a building must call
/// [`invalidate`](TransportSourceCache::invalidate).
///
/// A new building first shows up in tabulated data one tick after it is
/// placed, so an invalidation keeps the cache cold for the tick it happens
/// in and the one after.
#[derive(Debug, Clone, Default)]
pub struct TransportSourceCache {
    entries: BTreeMap<(Tile, ResourceId), Vec<Tile>>,
    cold_ticks: u8,
    hits: u64,
    misses: u64,
}

impl TransportSourceCache {
    const COLD_TICKS: u8 = 2;

    pub fn new() -> Self {
        Self::default()
    }

    /// Topology changed: drop everything.
    pub fn invalidate(&mut self) {
        self.entries.clear();
        self.cold_ticks = Self::COLD_TICKS;
    }

    /// Called once at the start of every tick.
    pub fn begin_tick(&mut self) {
        if self.cold_ticks > 0 {
            self.entries.clear();
            self.cold_ticks -= 1;
        }
    }

    pub fn get(&mut self, target: Tile, res: ResourceId) -> Option<&[Tile]> {
        match self.entries.get(&(target, res)) {
            Some(v) => {
                self.hits += 1;
                Some(v.as_slice())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, target: Tile, res: ResourceId, sources: Vec<Tile>) {
        self.entries.insert((target, res), sources);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}
