//! Deterministic core of the gridshock scenario engine: scenario
//! materializer, tick replay computation, dependency chain walker, and the
//! seeded streams they draw from. No I/O here; the facade feeds inventories
//! in and persists what comes out.

pub mod catalog;
pub mod chain;
pub mod geo;
pub mod materializer;
pub mod stream;
pub mod tick;

pub use catalog::{lookup_scenario, ScenarioMapping, SCENARIO_CATALOG};
pub use chain::{walk_chain, ChainWalk};
pub use materializer::{clamp_prepare_bounds, materialize, MaterializeOutcome};
pub use tick::TickEngine;
