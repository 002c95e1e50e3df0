//! Scenario engine facade: the only surface the HTTP edge invokes. Wires
//! the SQLite store, the deterministic core, and the in-memory run registry
//! together.

pub mod config;
pub mod import;
pub mod persistence;
pub mod runner;
pub mod server;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use contracts::events::InstanceStatus;
use contracts::{
    chain::{MAX_CHAIN_DEPTH, MIN_CHAIN_DEPTH},
    ApiError, Asset, ChainResponse, DependencyEdge, Direction, GraphView, InstanceDetail,
    PrepareRequest, PrepareSummary, Rule, RunState, ScenarioEvent, ScenarioInstance, TickPoll,
    TimelineBucket,
};
use parking_lot::Mutex;
use scenario_core::{clamp_prepare_bounds, lookup_scenario, materialize, walk_chain, TickEngine};
use tracing::{error, info, warn};
use uuid::Uuid;

use import::{ImportError, ImportSummary};
use persistence::{SqliteStore, StoreError, StoreStats};
use runner::{RunHandle, RunRegistry};

pub use server::{serve, ServerError};

/// Seed applied when a prepare request does not carry one.
pub const DEFAULT_INSTANCE_SEED: u64 = 1337;

const DEFAULT_TICK_PACING: Duration = Duration::from_millis(25);

pub struct ScenarioEngine {
    store: Mutex<SqliteStore>,
    runs: RunRegistry,
    pacing: Duration,
}

impl ScenarioEngine {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Ok(Self {
            store: Mutex::new(SqliteStore::open(path)?),
            runs: RunRegistry::new(),
            pacing: DEFAULT_TICK_PACING,
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            store: Mutex::new(SqliteStore::open_in_memory()?),
            runs: RunRegistry::new(),
            pacing: DEFAULT_TICK_PACING,
        })
    }

    /// Override the precompute pacing delay; tests shrink it to keep runs
    /// fast.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    // --- inventory write-through (seeding collaborators, import, tests) ---

    pub fn put_asset(&self, asset: &Asset) -> Result<(), StoreError> {
        self.store.lock().put_asset(asset)
    }

    pub fn put_dependency(&self, edge: &DependencyEdge) -> Result<(), StoreError> {
        self.store.lock().put_dependency(edge)
    }

    pub fn import_rules(&self, path: impl AsRef<Path>) -> Result<ImportSummary, ImportError> {
        import::import_rules_csv(&mut self.store.lock(), path)
    }

    pub fn autoload_templates(&self, dir: impl AsRef<Path>) -> Result<ImportSummary, ImportError> {
        import::autoload_templates(&mut self.store.lock(), dir)
    }

    pub fn store_stats(&self) -> Result<StoreStats, StoreError> {
        self.store.lock().stats()
    }

    // --- prepare ----------------------------------------------------------

    pub fn prepare(&self, request: &PrepareRequest) -> Result<PrepareSummary, ApiError> {
        let mapping =
            lookup_scenario(&request.scenario).ok_or_else(|| ApiError::unknown_scenario(&request.scenario))?;

        if let Some(required) = mapping.required_anchor {
            let satisfied = request
                .anchors
                .iter()
                .any(|anchor| anchor.anchor_type == required);
            if !satisfied {
                return Err(ApiError::missing_anchor(required));
            }
        }

        if request.city.trim().is_empty() {
            return Err(ApiError::bad_input("city must not be empty"));
        }

        let (duration_hours, tick_minutes, repair_crews) = clamp_prepare_bounds(
            request.duration_hours,
            request.tick_minutes,
            request.repair_crews,
        );

        let mut store = self.store.lock();
        let rules = store
            .rules_for_template(mapping.template_id)
            .map_err(internal)?;
        let inventory = store.assets_in_city(&request.city).map_err(internal)?;

        let instance = ScenarioInstance {
            id: format!("inst_{}", Uuid::new_v4().simple()),
            city: request.city.clone(),
            scenario: request.scenario.clone(),
            hazard_type: mapping.hazard_type,
            template_id: mapping.template_id.to_string(),
            duration_hours,
            tick_minutes,
            repair_crews,
            seed: request.seed.unwrap_or(DEFAULT_INSTANCE_SEED),
            status: InstanceStatus::Prepared,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        let outcome = materialize(&instance, &rules, &request.anchors, &inventory);
        for rule_id in &outcome.empty_rule_ids {
            warn!(
                instance_id = %instance.id,
                rule_id = %rule_id,
                "rule matched no assets"
            );
        }

        store
            .persist_prepare(&instance, &request.anchors, &outcome.primary)
            .map_err(internal)?;

        // Recovery injection is best-effort: a failure degrades to zero
        // additions, the primary event set is already committed.
        let recoveries_added = match store.append_events(&outcome.recoveries) {
            Ok(appended) => appended,
            Err(err) => {
                warn!(
                    instance_id = %instance.id,
                    error = %err,
                    "recovery injection failed"
                );
                0
            }
        };

        let summary = PrepareSummary {
            scenario_instance_id: instance.id.clone(),
            city: instance.city.clone(),
            scenario: instance.scenario.clone(),
            template_id: instance.template_id.clone(),
            hazard_type: instance.hazard_type,
            rule_count: rules.len(),
            events_created: outcome.primary.len(),
            recoveries_added,
            assets_used: outcome.assets_used,
            total_ticks: instance.total_ticks(),
            status: instance.status,
        };
        info!(
            instance_id = %summary.scenario_instance_id,
            city = %summary.city,
            scenario = %summary.scenario,
            events_created = summary.events_created,
            recoveries_added = summary.recoveries_added,
            "scenario prepared"
        );
        Ok(summary)
    }

    // --- prepared-instance reads ------------------------------------------

    pub fn list_prepared(&self, limit: Option<usize>) -> Result<Vec<ScenarioInstance>, ApiError> {
        let limit = limit.unwrap_or(50).clamp(1, 500);
        self.store.lock().list_instances(limit).map_err(internal)
    }

    pub fn describe_prepared(&self, instance_id: &str) -> Result<InstanceDetail, ApiError> {
        let store = self.store.lock();
        let instance = require_instance(&store, instance_id)?;
        let anchors = store.anchors_for_instance(instance_id).map_err(internal)?;
        let events = store.events_for_instance(instance_id).map_err(internal)?;

        let mut events_by_kind: BTreeMap<String, usize> = BTreeMap::new();
        for event in &events {
            *events_by_kind
                .entry(event.event_kind.as_str().to_string())
                .or_default() += 1;
        }

        Ok(InstanceDetail {
            total_ticks: instance.total_ticks(),
            first_event_tick: events.first().map(|event| event.tick_index),
            last_event_tick: events.last().map(|event| event.tick_index),
            event_count: events.len(),
            events_by_kind,
            anchors,
            instance,
        })
    }

    pub fn timeline(
        &self,
        instance_id: &str,
        bucket_ticks: Option<u32>,
    ) -> Result<Vec<TimelineBucket>, ApiError> {
        let store = self.store.lock();
        let instance = require_instance(&store, instance_id)?;
        let events = store.events_for_instance(instance_id).map_err(internal)?;

        let total_ticks = instance.total_ticks();
        let bucket_ticks = bucket_ticks.unwrap_or(1).clamp(1, total_ticks);

        let mut buckets = Vec::new();
        let mut bucket_start = 0_u32;
        while bucket_start < total_ticks {
            let bucket_end = bucket_start.saturating_add(bucket_ticks);
            let mut bucket = TimelineBucket {
                bucket_start_tick: bucket_start,
                impacts: 0,
                repairs: 0,
                recoveries: 0,
                mean_performance_pct: None,
            };
            let mut performance_sum = 0_u64;
            let mut event_count = 0_u64;
            for event in events
                .iter()
                .filter(|event| event.tick_index >= bucket_start && event.tick_index < bucket_end)
            {
                match event.event_kind {
                    contracts::EventKind::Impact => bucket.impacts += 1,
                    contracts::EventKind::Repair => bucket.repairs += 1,
                    _ => bucket.recoveries += 1,
                }
                performance_sum += u64::from(event.performance_pct);
                event_count += 1;
            }
            if event_count > 0 {
                bucket.mean_performance_pct =
                    Some((performance_sum as f64 / event_count as f64).round() as u8);
            }
            buckets.push(bucket);
            bucket_start = bucket_end;
        }

        Ok(buckets)
    }

    /// Raw event table for one instance, in replay order.
    pub fn instance_events(&self, instance_id: &str) -> Result<Vec<ScenarioEvent>, ApiError> {
        let store = self.store.lock();
        require_instance(&store, instance_id)?;
        store.events_for_instance(instance_id).map_err(internal)
    }

    // --- simulation runs --------------------------------------------------

    /// Create a run shell and spawn its precompute task. Must be called from
    /// within a tokio runtime.
    pub fn start(&self, scenario_instance_id: &str) -> Result<RunState, ApiError> {
        let (instance, inventory, events) = {
            let store = self.store.lock();
            let instance = require_instance(&store, scenario_instance_id)?;
            let inventory = store.assets_in_city(&instance.city).map_err(internal)?;
            let events = store
                .events_for_instance(scenario_instance_id)
                .map_err(internal)?;
            (instance, inventory, events)
        };

        let sim_run_id = format!("sim_{}", Uuid::new_v4().simple());
        let total_ticks = instance.total_ticks();
        let engine = TickEngine::new(sim_run_id.clone(), &inventory, &events, total_ticks);
        let handle = Arc::new(RunHandle::new(
            sim_run_id.clone(),
            instance.id.clone(),
            instance.city.clone(),
            instance.tick_minutes,
            total_ticks,
        ));
        self.runs.register(handle.clone());
        runner::spawn_precompute(handle.clone(), engine, self.pacing);

        info!(
            sim_run_id = %sim_run_id,
            instance_id = %instance.id,
            total_ticks,
            "simulation run started"
        );
        Ok(handle.state())
    }

    pub fn run_state(&self, sim_run_id: &str) -> Result<RunState, ApiError> {
        let handle = self
            .runs
            .get(sim_run_id)
            .ok_or_else(|| ApiError::not_found(format!("unknown sim_run_id '{sim_run_id}'")))?;
        Ok(handle.state())
    }

    pub fn run_tick(&self, sim_run_id: &str, tick_index: u32) -> Result<TickPoll, ApiError> {
        let handle = self
            .runs
            .get(sim_run_id)
            .ok_or_else(|| ApiError::not_found(format!("unknown sim_run_id '{sim_run_id}'")))?;
        let clamped = tick_index.min(handle.total_ticks.saturating_sub(1));
        Ok(handle.poll_tick(clamped))
    }

    // --- dependency reads -------------------------------------------------

    pub fn chain(
        &self,
        asset_id: &str,
        direction: Direction,
        max_depth: u32,
    ) -> Result<ChainResponse, ApiError> {
        if !(MIN_CHAIN_DEPTH..=MAX_CHAIN_DEPTH).contains(&max_depth) {
            return Err(ApiError::bad_input(format!(
                "max_depth must be in [{MIN_CHAIN_DEPTH}, {MAX_CHAIN_DEPTH}], got {max_depth}"
            )));
        }

        let store = self.store.lock();
        let edges = store.active_dependencies().map_err(internal)?;
        let walk = walk_chain(asset_id, direction, max_depth, &edges);
        let nodes = store.assets_by_ids(&walk.node_ids).map_err(internal)?;

        if !nodes.iter().any(|node| node.id == asset_id) {
            return Err(ApiError::not_found(format!("unknown asset '{asset_id}'")));
        }

        Ok(ChainResponse {
            root_asset_id: asset_id.to_string(),
            direction,
            max_depth,
            nodes,
            edges: walk.edges,
        })
    }

    pub fn graph(&self) -> Result<GraphView, ApiError> {
        let store = self.store.lock();
        Ok(GraphView {
            nodes: store.all_assets().map_err(internal)?,
            links: store.active_dependencies().map_err(internal)?,
        })
    }

    /// Rules currently attached to a template, in materialization order.
    pub fn template_rules(&self, template_id: &str) -> Result<Vec<Rule>, ApiError> {
        self.store
            .lock()
            .rules_for_template(template_id)
            .map_err(internal)
    }
}

fn require_instance(
    store: &SqliteStore,
    instance_id: &str,
) -> Result<ScenarioInstance, ApiError> {
    store
        .get_instance(instance_id)
        .map_err(internal)?
        .ok_or_else(|| ApiError::not_found(format!("unknown scenario_instance_id '{instance_id}'")))
}

fn internal(err: StoreError) -> ApiError {
    error!(error = %err, "store operation failed");
    ApiError::internal(err.to_string())
}
