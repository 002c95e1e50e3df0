//! Run-side payloads: prepare requests and summaries, run state, per-tick
//! payloads, and timeline derivations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::events::InstanceStatus;
use crate::{Anchor, AssetCondition, HazardType, ScenarioEvent, ScenarioInstance, Sector};

/// Body of `POST /api/scenario/prepare`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrepareRequest {
    pub city: String,
    pub scenario: String,
    pub duration_hours: u32,
    pub tick_minutes: u32,
    #[serde(default)]
    pub repair_crews: u32,
    /// Pseudo-random seed carried by the instance; defaulted when absent so
    /// recovery injection stays reproducible.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default)]
    pub anchors: Vec<Anchor>,
}

/// Summary returned by a successful prepare.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrepareSummary {
    pub scenario_instance_id: String,
    pub city: String,
    pub scenario: String,
    pub template_id: String,
    pub hazard_type: HazardType,
    pub rule_count: usize,
    pub events_created: usize,
    pub recoveries_added: usize,
    pub assets_used: usize,
    pub total_ticks: u32,
    pub status: InstanceStatus,
}

/// Read model for `describe_prepared`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceDetail {
    pub instance: ScenarioInstance,
    pub total_ticks: u32,
    pub anchors: Vec<Anchor>,
    pub event_count: usize,
    pub events_by_kind: BTreeMap<String, usize>,
    pub first_event_tick: Option<u32>,
    pub last_event_tick: Option<u32>,
}

/// One aggregation window over an instance's event table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimelineBucket {
    pub bucket_start_tick: u32,
    pub impacts: usize,
    pub repairs: usize,
    pub recoveries: usize,
    /// Mean set-to performance across the bucket's events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_performance_pct: Option<u8>,
}

/// Metadata for one in-memory simulation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunState {
    pub sim_run_id: String,
    pub scenario_instance_id: String,
    pub city: String,
    pub tick_minutes: u32,
    pub total_ticks: u32,
    /// Highest tick with a published payload, `-1` before the first.
    pub computed_max_tick: i64,
    pub done: bool,
}

/// One asset whose discrete condition changed during a tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssetStateChange {
    pub id: String,
    pub status: AssetCondition,
}

/// Precomputed payload served for one tick of one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TickPayload {
    pub sim_run_id: String,
    pub tick_index: u32,
    pub total_ticks: u32,
    pub sectors: BTreeMap<Sector, u8>,
    pub assets_changed: Vec<AssetStateChange>,
    pub recommendations: Vec<String>,
}

/// Poll result for `GET /api/sim/tick`: the payload once computed, otherwise
/// a pending sentinel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TickPoll {
    Ready(TickPayload),
    Pending { computed_max_tick: i64 },
}

/// Events of one instance indexed by tick, preserving stored order.
pub fn events_by_tick(events: &[ScenarioEvent]) -> BTreeMap<u32, Vec<ScenarioEvent>> {
    let mut indexed: BTreeMap<u32, Vec<ScenarioEvent>> = BTreeMap::new();
    for event in events {
        indexed.entry(event.tick_index).or_default().push(event.clone());
    }
    indexed
}
