//! Scenario materializer: expands a template's rule set against a city
//! inventory and operator anchors into the instance's ordered event table,
//! then injects paired recovery events for every damage event.
//!
//! Given identical rules, inventory, anchors, and seed, the output is
//! byte-identical: rule order is total, candidate ordering never depends on
//! hash iteration, and every random delta comes from the instance seed.

use std::collections::BTreeSet;

use contracts::events::{
    MAX_DURATION_HOURS, MAX_REPAIR_CREWS, MAX_TICK_MINUTES, MIN_DURATION_HOURS, MIN_TICK_MINUTES,
};
use contracts::{Anchor, Asset, EventKind, Rule, ScenarioEvent, ScenarioInstance, SelectionScope, TargetMode};

use crate::geo;
use crate::stream::{derive_stream, stream_range, stream_range_signed};

const CHANNEL_JITTER: u64 = 0x4a49_5454;
const CHANNEL_PARTIAL_TICK: u64 = 0x1;
const CHANNEL_FULL_TICK: u64 = 0x2;
const CHANNEL_PARTIAL_PERF: u64 = 0x3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializeOutcome {
    /// Events emitted by rule expansion, in emission order.
    pub primary: Vec<ScenarioEvent>,
    /// Injected recovery events, sequenced after the primary set.
    pub recoveries: Vec<ScenarioEvent>,
    /// Distinct assets referenced by primary events.
    pub assets_used: usize,
    /// Rules whose candidate pool was empty; surfaced as warnings, never
    /// errors.
    pub empty_rule_ids: Vec<String>,
}

impl MaterializeOutcome {
    pub fn all_events(&self) -> Vec<ScenarioEvent> {
        let mut events = self.primary.clone();
        events.extend(self.recoveries.iter().cloned());
        events
    }
}

/// Default policy for out-of-bounds prepare parameters: clamp and continue.
pub fn clamp_prepare_bounds(
    duration_hours: u32,
    tick_minutes: u32,
    repair_crews: u32,
) -> (u32, u32, u32) {
    (
        duration_hours.clamp(MIN_DURATION_HOURS, MAX_DURATION_HOURS),
        tick_minutes.clamp(MIN_TICK_MINUTES, MAX_TICK_MINUTES),
        repair_crews.min(MAX_REPAIR_CREWS),
    )
}

/// Expand `rules` for `instance` over `inventory`, then inject recoveries.
pub fn materialize(
    instance: &ScenarioInstance,
    rules: &[Rule],
    anchors: &[Anchor],
    inventory: &[Asset],
) -> MaterializeOutcome {
    let total_ticks = instance.total_ticks();

    let mut ordered: Vec<&Rule> = rules.iter().filter(|rule| rule.enabled).collect();
    ordered.sort_by(|a, b| {
        a.time_pct
            .total_cmp(&b.time_pct)
            .then_with(|| b.priority.cmp(&a.priority))
            .then_with(|| a.rule_id.cmp(&b.rule_id))
    });

    let mut used: BTreeSet<String> = BTreeSet::new();
    let mut primary = Vec::new();
    let mut empty_rule_ids = Vec::new();
    let mut sequence = 0_u64;

    for rule in ordered {
        let pool = candidate_pool(rule, anchors, inventory);
        if pool.is_empty() {
            empty_rule_ids.push(rule.rule_id.clone());
            continue;
        }

        let take = target_count(rule, pool.len());
        for asset in pool.into_iter().take(take) {
            if !rule.allow_reuse_asset && used.contains(&asset.id) {
                continue;
            }

            primary.push(ScenarioEvent {
                instance_id: instance.id.clone(),
                sequence,
                tick_index: event_tick(instance, rule, &asset.id, total_ticks),
                event_kind: rule.event_kind,
                asset_id: asset.id.clone(),
                performance_pct: rule.performance_pct.min(100),
                repair_time_minutes: rule.repair_time_minutes(),
                source_rule_id: Some(rule.rule_id.clone()),
            });
            used.insert(asset.id.clone());
            sequence += 1;
        }
    }

    let recoveries = inject_recoveries(instance, &primary, total_ticks, &mut sequence);

    MaterializeOutcome {
        primary,
        recoveries,
        assets_used: used.len(),
        empty_rule_ids,
    }
}

/// City inventory filtered to the rule's sector/subtype target, narrowed by
/// selection scope, in the scope's deterministic order.
fn candidate_pool<'a>(rule: &Rule, anchors: &[Anchor], inventory: &'a [Asset]) -> Vec<&'a Asset> {
    let mut pool: Vec<&Asset> = inventory
        .iter()
        .filter(|asset| {
            rule.sector.map_or(true, |sector| sector == asset.sector)
                && rule
                    .subtype
                    .as_deref()
                    .map_or(true, |subtype| subtype == asset.subtype)
        })
        .collect();

    match rule.selection_scope {
        SelectionScope::GeoRadius => {
            let anchor = rule
                .geo_anchor
                .as_deref()
                .and_then(|tag| anchors.iter().find(|anchor| anchor.anchor_type == tag));
            let radius_km = rule.geo_param_1_km.unwrap_or(0.0);
            if let Some(anchor) = anchor {
                if radius_km > 0.0 {
                    pool.retain(|asset| {
                        geo::haversine_km(anchor.lat, anchor.lng, asset.lat, asset.lng)
                            <= radius_km
                    });
                }
            }
            pool.sort_by(|a, b| a.id.cmp(&b.id));
        }
        SelectionScope::GraphCentrality => {
            // Criticality proxy; not a true centrality measure.
            pool.sort_by(|a, b| b.criticality.cmp(&a.criticality).then_with(|| a.id.cmp(&b.id)));
        }
        SelectionScope::GeoScatter | SelectionScope::Other => {
            pool.sort_by(|a, b| a.id.cmp(&b.id));
        }
    }

    pool
}

fn target_count(rule: &Rule, pool_size: usize) -> usize {
    match rule.target_mode {
        TargetMode::Count => (rule.target_value.max(0.0) as usize).min(pool_size),
        TargetMode::Pct => {
            let requested = (rule.target_value.max(0.0) / 100.0 * pool_size as f64).ceil();
            (requested as usize).min(pool_size)
        }
    }
}

/// An impact "between ticks" becomes visible on the next tick: ceil, then
/// clamp into `[0, total_ticks - 1]`.
fn event_tick(instance: &ScenarioInstance, rule: &Rule, asset_id: &str, total_ticks: u32) -> u32 {
    let mut effective_pct = rule.time_pct;
    if rule.time_jitter_pct > 0.0 {
        let bound = (rule.time_jitter_pct * 100.0).round().max(0.0) as u64;
        let stream = derive_stream(instance.seed, 0, &rule.rule_id, asset_id);
        effective_pct += stream_range_signed(stream, CHANNEL_JITTER, bound) as f64 / 100.0;
    }
    let effective_pct = effective_pct.clamp(0.0, 100.0);

    let tick = (effective_pct / 100.0 * f64::from(total_ticks)).ceil() as i64;
    tick.clamp(0, i64::from(total_ticks) - 1) as u32
}

/// Schedule a partial and a full recovery for every damage event. Injected
/// ticks clamp to the timeline end; an event that would not land strictly
/// after its origin, or would not improve the asset, is dropped. Dedup key
/// is `(asset, tick, performance)` within the instance.
fn inject_recoveries(
    instance: &ScenarioInstance,
    primary: &[ScenarioEvent],
    total_ticks: u32,
    sequence: &mut u64,
) -> Vec<ScenarioEvent> {
    let mut seen: BTreeSet<(String, u32, u8)> = primary
        .iter()
        .map(|event| (event.asset_id.clone(), event.tick_index, event.performance_pct))
        .collect();

    let mut recoveries = Vec::new();

    for event in primary.iter().filter(|event| event.performance_pct < 100) {
        let stream = derive_stream(
            instance.seed,
            u64::from(event.tick_index),
            &event.asset_id,
            "recovery",
        );
        let delta_partial = stream_range(stream, CHANNEL_PARTIAL_TICK, 2, 10) as u32;
        let delta_full = stream_range(stream, CHANNEL_FULL_TICK, 8, 40) as u32;
        let delta_perf = stream_range(stream, CHANNEL_PARTIAL_PERF, 20, 45) as u8;

        let partial_tick = (event.tick_index + delta_partial).min(total_ticks - 1);
        let partial_perf = event
            .performance_pct
            .saturating_add(delta_perf)
            .min(95)
            .max(50);
        if partial_tick > event.tick_index
            && partial_perf > event.performance_pct
            && seen.insert((event.asset_id.clone(), partial_tick, partial_perf))
        {
            recoveries.push(recovery_event(
                instance,
                *sequence,
                partial_tick,
                EventKind::RepairPartial,
                &event.asset_id,
                partial_perf,
            ));
            *sequence += 1;
        }

        let full_tick = (event.tick_index + delta_full).min(total_ticks - 1);
        if full_tick > event.tick_index
            && seen.insert((event.asset_id.clone(), full_tick, 100))
        {
            recoveries.push(recovery_event(
                instance,
                *sequence,
                full_tick,
                EventKind::RepairFull,
                &event.asset_id,
                100,
            ));
            *sequence += 1;
        }
    }

    recoveries
}

fn recovery_event(
    instance: &ScenarioInstance,
    sequence: u64,
    tick_index: u32,
    event_kind: EventKind,
    asset_id: &str,
    performance_pct: u8,
) -> ScenarioEvent {
    ScenarioEvent {
        instance_id: instance.id.clone(),
        sequence,
        tick_index,
        event_kind,
        asset_id: asset_id.to_string(),
        performance_pct,
        repair_time_minutes: None,
        source_rule_id: None,
    }
}
