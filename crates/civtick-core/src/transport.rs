//! In-flight shipments between tiles.
//!
//! A transport is created by the router, advanced once per tick, and
//! delivered to its target building when `ticks_spent >= ticks_required`.
//! Fuel is paid every tick; a transport that cannot pay stalls in place.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::building::BuildingKind;
use crate::fixed::Fixed64;
use crate::id::{ResourceId, Tile, TransportId};
use crate::registry::Registry;
use crate::tick_data::{IntraTickCache, TickData};
use crate::world::World;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transport {
    pub id: TransportId,
    pub resource: ResourceId,
    pub amount: Fixed64,
    pub fuel_type: ResourceId,
    pub fuel_per_tick: Fixed64,
    pub from: Tile,
    pub to: Tile,
    pub ticks_spent: u32,
    pub ticks_required: u32,
    pub has_enough_fuel: bool,
}

impl Transport {
    pub fn arrived(&self) -> bool {
        self.ticks_spent >= self.ticks_required
    }
}

/// A completed delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub id: TransportId,
    pub to: Tile,
    pub resource: ResourceId,
    pub amount: Fixed64,
}

/// Every in-flight transport, in creation order.
///
/// Creation order is the fuel claim order: when workers run short, older
/// transports keep moving and newer ones stall.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransportQueue {
    transports: Vec<Transport>,
    in_transit: BTreeMap<(Tile, ResourceId), Fixed64>,
}

impl TransportQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, transport: Transport) {
        let key = (transport.to, transport.resource);
        let v = self.in_transit.entry(key).or_insert(Fixed64::ZERO);
        *v = v.saturating_add(transport.amount);
        self.transports.push(transport);
    }

    pub fn len(&self) -> usize {
        self.transports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transport> {
        self.transports.iter()
    }

    /// Amount of `res` on its way to `to`.
    pub fn amount_in_transit(&self, to: Tile, res: ResourceId) -> Fixed64 {
        self.in_transit.get(&(to, res)).copied().unwrap_or(Fixed64::ZERO)
    }

    /// Everything on its way to `to`.
    pub fn total_in_transit_to(&self, to: Tile) -> Fixed64 {
        self.in_transit
            .range((to, ResourceId(0))..=(to, ResourceId(u32::MAX)))
            .fold(Fixed64::ZERO, |acc, (_, a)| acc.saturating_add(*a))
    }

    /// Advance every transport by one tick, paying fuel from the worker
    /// pool, and deliver the ones that arrived.
    pub fn advance(
        &mut self,
        world: &mut World,
        registry: &Registry,
        current: &TickData,
        intra: &mut IntraTickCache,
    ) -> Vec<Delivery> {
        let mut deliveries = Vec::new();
        for t in &mut self.transports {
            if registry.is_transportable(t.fuel_type) {
                t.ticks_spent += 1;
            } else if intra.available_workers(current, t.fuel_type) >= t.fuel_per_tick {
                intra.use_workers(t.fuel_type, t.fuel_per_tick);
                t.ticks_spent += 1;
                t.has_enough_fuel = true;
            } else {
                t.has_enough_fuel = false;
            }
            if t.arrived() {
                deliveries.push(Delivery {
                    id: t.id,
                    to: t.to,
                    resource: t.resource,
                    amount: t.amount,
                });
            }
        }
        if deliveries.is_empty() {
            return deliveries;
        }
        self.transports.retain(|t| !t.arrived());
        for d in &deliveries {
            self.release(d.to, d.resource, d.amount);
            // A target demolished mid-flight swallows the shipment.
            if let Some(b) = world.building_mut(d.to) {
                b.resources.add(d.resource, d.amount);
                if let BuildingKind::CloneFactory(clone) = &mut b.kind {
                    clone.transported_amount = clone.transported_amount.saturating_add(d.amount);
                }
            }
        }
        deliveries
    }

    /// Drop every transport heading to `tile`. Shipments already on the
    /// road from `tile` still arrive.
    pub fn cancel_for(&mut self, tile: Tile) {
        let mut released = Vec::new();
        self.transports.retain(|t| {
            let keep = t.to != tile;
            if !keep {
                released.push((t.to, t.resource, t.amount));
            }
            keep
        });
        for (to, res, amount) in released {
            self.release(to, res, amount);
        }
    }

    fn release(&mut self, to: Tile, res: ResourceId, amount: Fixed64) {
        if let Some(v) = self.in_transit.get_mut(&(to, res)) {
            *v = v.saturating_sub(amount);
            if *v <= Fixed64::ZERO {
                self.in_transit.remove(&(to, res));
            }
        }
    }
}
