//! Resource amount maps.
//!
//! A [`ResourceMap`] never stores a balance at or below
//! [`AMOUNT_EPSILON`](crate::fixed::AMOUNT_EPSILON): such entries are pruned
//! on every write, so "absent" and "zero" are the same thing.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::fixed::{AMOUNT_EPSILON, Fixed64, checked_amount};
use crate::id::ResourceId;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceMap(BTreeMap<ResourceId, Fixed64>);

impl ResourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, res: ResourceId) -> Fixed64 {
        self.0.get(&res).copied().unwrap_or(Fixed64::ZERO)
    }

    pub fn contains(&self, res: ResourceId) -> bool {
        self.0.contains_key(&res)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ResourceId, Fixed64)> + '_ {
        self.0.iter().map(|(r, a)| (*r, *a))
    }

    pub fn keys(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.0.keys().copied()
    }

    /// Overwrite a balance. Near-zero and negative values remove the entry.
    pub fn set(&mut self, res: ResourceId, amount: Fixed64) {
        if amount <= AMOUNT_EPSILON {
            self.0.remove(&res);
        } else {
            self.0.insert(res, amount);
        }
    }

    /// Add (or subtract, with a negative delta) and prune.
    pub fn add(&mut self, res: ResourceId, delta: Fixed64) {
        let v = self.get(res).saturating_add(delta);
        self.set(res, v);
    }

    /// Add an amount coming from outside the fixed-point world. Non-finite
    /// values are dropped.
    pub fn add_f64(&mut self, res: ResourceId, delta: f64) {
        if let Some(d) = checked_amount(delta) {
            self.add(res, d);
        }
    }

    /// Subtract, clamping at zero. Returns the amount actually removed.
    pub fn take(&mut self, res: ResourceId, amount: Fixed64) -> Fixed64 {
        let have = self.get(res);
        let taken = amount.max(Fixed64::ZERO).min(have);
        self.set(res, have - taken);
        taken
    }

    pub fn remove(&mut self, res: ResourceId) -> Fixed64 {
        self.0.remove(&res).unwrap_or(Fixed64::ZERO)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Add every entry of `other`.
    pub fn add_all(&mut self, other: &ResourceMap) {
        for (r, a) in other.iter() {
            self.add(r, a);
        }
    }

    /// Remove every entry of `other`, clamping at zero.
    pub fn deduct_all(&mut self, other: &ResourceMap) {
        for (r, a) in other.iter() {
            self.take(r, a);
        }
    }

    /// True when every entry of `required` is held in at least that amount.
    pub fn has_all(&self, required: &ResourceMap) -> bool {
        required.iter().all(|(r, a)| self.get(r) >= a)
    }

    /// A copy with every amount multiplied by `factor`.
    pub fn scaled(&self, factor: Fixed64) -> ResourceMap {
        let mut out = ResourceMap::new();
        for (r, a) in self.iter() {
            out.set(r, a.saturating_mul(factor));
        }
        out
    }

    /// Entries whose resource satisfies `keep`.
    pub fn filtered(&self, mut keep: impl FnMut(ResourceId) -> bool) -> ResourceMap {
        ResourceMap(self.0.iter().filter(|(r, _)| keep(**r)).map(|(r, a)| (*r, *a)).collect())
    }

    /// Sum of all amounts.
    pub fn total(&self) -> Fixed64 {
        self.0.values().fold(Fixed64::ZERO, |acc, a| acc.saturating_add(*a))
    }

    /// Entry-wise `self - other`, dropping non-positive results.
    pub fn difference(&self, other: &ResourceMap) -> ResourceMap {
        let mut out = ResourceMap::new();
        for (r, a) in self.iter() {
            out.set(r, a.saturating_sub(other.get(r)));
        }
        out
    }
}

impl FromIterator<(ResourceId, Fixed64)> for ResourceMap {
    fn from_iter<I: IntoIterator<Item = (ResourceId, Fixed64)>>(iter: I) -> Self {
        let mut m = ResourceMap::new();
        for (r, a) in iter {
            m.add(r, a);
        }
        m
    }
}
