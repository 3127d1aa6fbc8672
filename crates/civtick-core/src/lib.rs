//! Civtick Core -- the per-tick economy of a hex-grid city builder.
//!
//! This crate provides the building state machine, the transport router,
//! production and market rules, power propagation and the double-buffered
//! tick aggregates that every Civtick front end drives.
//!
//! # Tick Pipeline
//!
//! Each call to [`engine::Simulation::tick`] advances the city by one tick:
//!
//! 1. **Swap** -- The last tick's `next` buffer becomes `current`; a fresh
//!    `next` starts empty. The intra-tick cache is cleared.
//! 2. **Research** -- Unlocked techs write building unlocks and multipliers.
//! 3. **Prices** -- Markets regenerate their pairings on an hour change.
//! 4. **Transport** -- In-flight shipments advance; arrivals are deposited.
//! 5. **Tiles** -- Every building, in priority order, tabulates itself and
//!    then either builds (requests material, levels up) or produces.
//! 6. **Finalize** -- Produced goods land, the power grid is propagated, the
//!    tick counter advances and the state hash is computed.
//!
//! # Buffer Pattern
//!
//! All decisions read `current`; all aggregates are written into `next`.
//! Goods produced this tick are never visible to another building until the
//! following tick:
//!
//! ```rust,ignore
//! let mut sim = Simulation::new(registry, GameOptions::default(), Grid::new(32, 32));
//! sim.place_building(Tile::from_xy(4, 4), house)?;
//! let report = sim.tick(now_ms);
//! for event in report.events { /* UI, audio */ }
//! ```
//!
//! # Key Types
//!
//! - [`engine::Simulation`] -- Owns the world and orchestrates the pipeline.
//! - [`world::World`] -- Grid tiles, buildings and world-level flags.
//! - [`building::Building`] -- One placed building and its state machine.
//! - [`router`] -- Nearest-source transport routing with a per-tick cache.
//! - [`transport::TransportQueue`] -- Shipments in flight.
//! - [`tick_data::TickData`] -- Per-tick aggregates, double-buffered.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for deterministic math.
//! - [`registry::Registry`] -- Immutable content tables (frozen at startup).
//! - [`event::SimEvent`] -- Domain events handed back with each tick.

pub mod building;
pub mod cache;
pub mod construction;
pub mod context;
pub mod engine;
pub mod error;
pub mod event;
pub mod fixed;
pub mod grid;
pub mod id;
pub mod io;
pub mod market;
pub mod options;
pub mod power;
pub mod production;
pub mod registry;
pub mod resource;
pub mod rng;
pub mod router;
pub mod sim;
pub mod tick_data;
pub mod transport;
pub mod unlockable;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
