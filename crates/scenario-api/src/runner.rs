//! Ephemeral simulation runs: a keyed registry of run handles, each with an
//! append-only tick cache filled by one background task and read by many
//! pollers. Runs die with the process.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::{RunState, TickPayload, TickPoll};
use parking_lot::{Mutex, RwLock};
use scenario_core::TickEngine;
use tracing::info;

#[derive(Debug)]
pub struct RunHandle {
    pub sim_run_id: String,
    pub scenario_instance_id: String,
    pub city: String,
    pub tick_minutes: u32,
    pub total_ticks: u32,
    computed_max_tick: AtomicI64,
    done: AtomicBool,
    cache: Mutex<Vec<Option<TickPayload>>>,
}

impl RunHandle {
    pub fn new(
        sim_run_id: impl Into<String>,
        scenario_instance_id: impl Into<String>,
        city: impl Into<String>,
        tick_minutes: u32,
        total_ticks: u32,
    ) -> Self {
        Self {
            sim_run_id: sim_run_id.into(),
            scenario_instance_id: scenario_instance_id.into(),
            city: city.into(),
            tick_minutes,
            total_ticks,
            computed_max_tick: AtomicI64::new(-1),
            done: AtomicBool::new(false),
            cache: Mutex::new(vec![None; total_ticks as usize]),
        }
    }

    pub fn state(&self) -> RunState {
        RunState {
            sim_run_id: self.sim_run_id.clone(),
            scenario_instance_id: self.scenario_instance_id.clone(),
            city: self.city.clone(),
            tick_minutes: self.tick_minutes,
            total_ticks: self.total_ticks,
            computed_max_tick: self.computed_max_tick.load(Ordering::Acquire),
            done: self.done.load(Ordering::Acquire),
        }
    }

    /// Read one tick. The index must already be clamped into
    /// `[0, total_ticks - 1]` by the caller.
    pub fn poll_tick(&self, tick_index: u32) -> TickPoll {
        let computed_max_tick = self.computed_max_tick.load(Ordering::Acquire);
        if i64::from(tick_index) > computed_max_tick {
            return TickPoll::Pending { computed_max_tick };
        }

        let cache = self.cache.lock();
        match cache.get(tick_index as usize).and_then(Clone::clone) {
            Some(payload) => TickPoll::Ready(payload),
            // Unreachable once published, but pending is the honest answer.
            None => TickPoll::Pending { computed_max_tick },
        }
    }

    /// Published payloads are never mutated; the slot write happens before
    /// the `computed_max_tick` release so readers only see complete ticks.
    fn publish(&self, tick_index: u32, payload: TickPayload) {
        {
            let mut cache = self.cache.lock();
            if let Some(slot) = cache.get_mut(tick_index as usize) {
                *slot = Some(payload);
            }
        }
        self.computed_max_tick
            .store(i64::from(tick_index), Ordering::Release);
    }

    fn mark_done(&self) {
        self.done.store(true, Ordering::Release);
    }
}

#[derive(Debug, Default)]
pub struct RunRegistry {
    runs: RwLock<BTreeMap<String, Arc<RunHandle>>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handle: Arc<RunHandle>) {
        self.runs
            .write()
            .insert(handle.sim_run_id.clone(), handle);
    }

    pub fn get(&self, sim_run_id: &str) -> Option<Arc<RunHandle>> {
        self.runs.read().get(sim_run_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.runs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.read().is_empty()
    }
}

/// One background task per run. Ticks are computed strictly in order (each
/// diff depends on the previous tick's condition map) and paced so pollers
/// can observe progressive availability.
pub fn spawn_precompute(handle: Arc<RunHandle>, mut engine: TickEngine, pacing: Duration) {
    tokio::spawn(async move {
        for tick_index in 0..handle.total_ticks {
            let payload = engine.compute_tick(tick_index);
            handle.publish(tick_index, payload);
            if pacing > Duration::ZERO && tick_index + 1 < handle.total_ticks {
                tokio::time::sleep(pacing).await;
            }
        }
        handle.mark_done();
        info!(
            sim_run_id = %handle.sim_run_id,
            total_ticks = handle.total_ticks,
            "tick precomputation complete"
        );
    });
}
