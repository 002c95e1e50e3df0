//! Invariant properties of the scenario materializer and tick replay.

use contracts::events::InstanceStatus;
use contracts::{
    Anchor, Asset, EventKind, HazardType, Rule, ScenarioInstance, Sector, SelectionScope,
    TargetMode,
};
use proptest::prelude::*;
use scenario_core::{materialize, walk_chain, TickEngine};

fn instance(seed: u64, duration_hours: u32, tick_minutes: u32) -> ScenarioInstance {
    ScenarioInstance {
        id: "inst_prop".to_string(),
        city: "Jerusalem".to_string(),
        scenario: "earthquake".to_string(),
        hazard_type: HazardType::Earthquake,
        template_id: "EQ_030".to_string(),
        duration_hours,
        tick_minutes,
        repair_crews: 2,
        seed,
        status: InstanceStatus::Prepared,
        created_at: "2026-01-01T00:00:00Z".to_string(),
    }
}

fn inventory(count: usize) -> Vec<Asset> {
    (0..count)
        .map(|index| Asset {
            id: format!("asset_{index:03}"),
            name: format!("Asset {index}"),
            sector: match index % 3 {
                0 => Sector::Electricity,
                1 => Sector::Water,
                _ => Sector::Communication,
            },
            subtype: if index % 2 == 0 { "primary" } else { "backup" }.to_string(),
            city: "Jerusalem".to_string(),
            lat: 31.7 + index as f64 * 0.01,
            lng: 35.2 + index as f64 * 0.01,
            criticality: (index % 5 + 1) as u8,
            metadata: None,
        })
        .collect()
}

fn impact_rule(rule_id: &str, time_pct: f64, target_value: f64, performance_pct: u8) -> Rule {
    Rule {
        rule_id: rule_id.to_string(),
        template_id: "EQ_030".to_string(),
        event_kind: EventKind::Impact,
        time_pct,
        time_jitter_pct: 0.0,
        selection_scope: SelectionScope::GeoScatter,
        sector: None,
        subtype: None,
        target_mode: TargetMode::Pct,
        target_value,
        allow_reuse_asset: false,
        performance_pct,
        repair_time_min: None,
        repair_time_max: None,
        geo_anchor: None,
        geo_param_1_km: None,
        priority: 0,
        enabled: true,
        notes: None,
    }
}

proptest! {
    #[test]
    fn events_stay_inside_timeline_and_performance_bounds(
        seed in any::<u64>(),
        duration_hours in 1_u32..168,
        tick_minutes in 1_u32..60,
        time_pct in 0.0_f64..100.0,
        jitter in 0.0_f64..25.0,
        performance in 0_u8..100,
    ) {
        let instance = instance(seed, duration_hours, tick_minutes);
        let mut rule = impact_rule("R1", time_pct, 100.0, performance);
        rule.time_jitter_pct = jitter;

        let outcome = materialize(&instance, &[rule], &[], &inventory(12));
        let total_ticks = instance.total_ticks();

        for event in outcome.all_events() {
            prop_assert!(event.tick_index < total_ticks);
            prop_assert!(event.performance_pct <= 100);
        }
    }

    #[test]
    fn no_reuse_means_no_duplicate_assets(
        seed in any::<u64>(),
        first_pct in 1.0_f64..100.0,
        second_pct in 1.0_f64..100.0,
    ) {
        let instance = instance(seed, 24, 60);
        let rules = vec![
            impact_rule("R1", 20.0, first_pct, 10),
            impact_rule("R2", 60.0, second_pct, 30),
        ];

        let outcome = materialize(&instance, &rules, &[], &inventory(10));

        let mut seen = std::collections::BTreeSet::new();
        for event in &outcome.primary {
            prop_assert!(seen.insert(event.asset_id.clone()),
                "asset {} referenced twice without allow_reuse", event.asset_id);
        }
    }

    #[test]
    fn identical_seed_means_identical_event_table(
        seed in any::<u64>(),
        duration_hours in 1_u32..96,
    ) {
        let instance = instance(seed, duration_hours, 30);
        let rules = vec![
            impact_rule("R1", 10.0, 60.0, 0),
            impact_rule("R2", 50.0, 40.0, 35),
        ];
        let assets = inventory(9);

        let first = materialize(&instance, &rules, &[], &assets);
        let second = materialize(&instance, &rules, &[], &assets);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn recoveries_strictly_follow_their_damage(
        seed in any::<u64>(),
    ) {
        let instance = instance(seed, 48, 60);
        let outcome = materialize(
            &instance,
            &[impact_rule("R1", 25.0, 100.0, 0)],
            &[],
            &inventory(8),
        );

        for recovery in &outcome.recoveries {
            prop_assert!(recovery.event_kind.is_recovery());
            let origin = outcome
                .primary
                .iter()
                .find(|event| event.asset_id == recovery.asset_id)
                .expect("recovery has an origin");
            prop_assert!(recovery.tick_index > origin.tick_index);
            prop_assert!(recovery.performance_pct > origin.performance_pct);
        }
    }

    #[test]
    fn sector_health_stays_in_bounds_across_replay(
        seed in any::<u64>(),
        performance in 0_u8..=100,
    ) {
        let instance = instance(seed, 12, 60);
        let assets = inventory(9);
        let outcome = materialize(
            &instance,
            &[impact_rule("R1", 40.0, 80.0, performance)],
            &[],
            &assets,
        );

        let events = outcome.all_events();
        let mut engine = TickEngine::new("run_prop", &assets, &events, instance.total_ticks());
        for tick in 0..instance.total_ticks() {
            let payload = engine.compute_tick(tick);
            prop_assert_eq!(payload.tick_index, tick);
            for health in payload.sectors.values() {
                prop_assert!(*health <= 100);
            }
        }
    }

    #[test]
    fn chain_walk_always_contains_the_root(
        depth in 1_u32..12,
        edge_count in 0_usize..24,
    ) {
        let edges: Vec<contracts::DependencyEdge> = (0..edge_count)
            .map(|index| contracts::DependencyEdge {
                provider_asset_id: format!("asset_{:03}", index % 7),
                consumer_asset_id: format!("asset_{:03}", (index + 3) % 7),
                dependency_type: "power".to_string(),
                priority: 1,
                is_active: index % 4 != 0,
            })
            .collect();

        let walk = walk_chain("asset_000", contracts::Direction::Upstream, depth, &edges);
        prop_assert_eq!(walk.node_ids.first().map(String::as_str), Some("asset_000"));
    }
}
