//! Tick replay computation for the simulation runner. One engine instance
//! replays one run; ticks must be computed in order because each tick's
//! transition diff depends on the previous tick's condition map.

use std::collections::BTreeMap;

use contracts::sim::events_by_tick;
use contracts::{
    Asset, AssetCondition, AssetStateChange, ScenarioEvent, Sector, TickPayload,
};

#[derive(Debug)]
pub struct TickEngine {
    sim_run_id: String,
    total_ticks: u32,
    sector_weight: BTreeMap<String, (Sector, u8)>,
    events_by_tick: BTreeMap<u32, Vec<ScenarioEvent>>,
    performance: BTreeMap<String, u8>,
    condition: BTreeMap<String, AssetCondition>,
}

impl TickEngine {
    /// Every asset starts at full performance; events are indexed by tick in
    /// stored order.
    pub fn new(
        sim_run_id: impl Into<String>,
        assets: &[Asset],
        events: &[ScenarioEvent],
        total_ticks: u32,
    ) -> Self {
        let mut sector_weight = BTreeMap::new();
        let mut performance = BTreeMap::new();
        let mut condition = BTreeMap::new();
        for asset in assets {
            sector_weight.insert(
                asset.id.clone(),
                (asset.sector, asset.criticality.max(1)),
            );
            performance.insert(asset.id.clone(), 100_u8);
            condition.insert(asset.id.clone(), AssetCondition::Recovered);
        }

        Self {
            sim_run_id: sim_run_id.into(),
            total_ticks,
            sector_weight,
            events_by_tick: events_by_tick(events),
            performance,
            condition,
        }
    }

    pub fn total_ticks(&self) -> u32 {
        self.total_ticks
    }

    /// Apply the tick's events (set-to semantics, later events overwrite
    /// earlier ones), diff discrete conditions against the previous tick,
    /// and derive sector health.
    pub fn compute_tick(&mut self, tick_index: u32) -> TickPayload {
        if let Some(events) = self.events_by_tick.get(&tick_index) {
            for event in events {
                // Events referencing assets outside the inventory are
                // skipped rather than invented into existence.
                if let Some(slot) = self.performance.get_mut(&event.asset_id) {
                    *slot = event.performance_pct.min(100);
                }
            }
        }

        let mut assets_changed = Vec::new();
        for (asset_id, performance) in &self.performance {
            let next = AssetCondition::from_performance(*performance);
            let previous = self
                .condition
                .get(asset_id)
                .copied()
                .unwrap_or(AssetCondition::Recovered);
            if next != previous {
                assets_changed.push(AssetStateChange {
                    id: asset_id.clone(),
                    status: next,
                });
            }
        }
        for change in &assets_changed {
            self.condition.insert(change.id.clone(), change.status);
        }

        let sectors = self.sector_health();

        let mut recommendations = Vec::new();
        if !assets_changed.is_empty() {
            recommendations.push(format!(
                "{} asset(s) changed operational state at tick {tick_index}; review affected sectors and dispatch repair crews",
                assets_changed.len(),
            ));
        }

        TickPayload {
            sim_run_id: self.sim_run_id.clone(),
            tick_index,
            total_ticks: self.total_ticks,
            sectors,
            assets_changed,
            recommendations,
        }
    }

    /// Criticality-weighted mean performance per sector, integer percent.
    /// Sectors with no assets in the city are omitted.
    fn sector_health(&self) -> BTreeMap<Sector, u8> {
        let mut sums: BTreeMap<Sector, (u64, u64)> = BTreeMap::new();
        for (asset_id, (sector, weight)) in &self.sector_weight {
            let performance = self.performance.get(asset_id).copied().unwrap_or(100);
            let entry = sums.entry(*sector).or_insert((0, 0));
            entry.0 += u64::from(performance) * u64::from(*weight);
            entry.1 += u64::from(*weight);
        }

        sums.into_iter()
            .map(|(sector, (weighted, weight))| {
                let health = (weighted as f64 / weight as f64).round() as u8;
                (sector, health.min(100))
            })
            .collect()
    }
}
