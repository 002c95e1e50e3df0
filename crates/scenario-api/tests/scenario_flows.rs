//! End-to-end facade flows: prepare, replay, and dependency walks against a
//! seeded city inventory.

use std::time::Duration;

use contracts::{
    Anchor, ApiError, Asset, AssetCondition, DependencyEdge, Direction, ErrorKind, EventKind,
    PrepareRequest, Sector, TickPoll,
};
use scenario_api::ScenarioEngine;

const EARTHQUAKE_CSV: &str = "\
template_id,template_name,hazard_type,rule_id,event_kind,time_pct,time_jitter_pct,selection_scope,sector,subtype,target_mode,target_value,allow_reuse_asset,performance_pct,repair_time_min,repair_time_max,geo_anchor,geo_param_1_km,priority,notes
EQ_030,Earthquake M6.5,EARTHQUAKE,EQ_030_R1,IMPACT,50,,GEO_RADIUS,electricity,substation,PCT,100,0,0,,,EPICENTER,5,10,
CY_020,Coordinated cyber attack,CYBER,CY_020_R1,IMPACT,25,,GEO_SCATTER,electricity,substation,PCT,40,0,20,,,,,5,
";

fn temp_path(name: &str, extension: &str) -> std::path::PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock moves forward")
        .as_nanos();
    std::env::temp_dir().join(format!("gridshock_{name}_{nanos}.{extension}"))
}

fn substation(id: &str, lat: f64, lng: f64) -> Asset {
    Asset {
        id: id.to_string(),
        name: format!("Substation {id}"),
        sector: Sector::Electricity,
        subtype: "substation".to_string(),
        city: "Jerusalem".to_string(),
        lat,
        lng,
        criticality: 3,
        metadata: None,
    }
}

/// Three substations within 5 km of the epicenter, two far outside, plus one
/// water asset so the sector map carries more than one key.
fn seed_city(engine: &ScenarioEngine) {
    for asset in [
        substation("sub_center_1", 31.775, 35.221),
        substation("sub_center_2", 31.760, 35.230),
        substation("sub_center_3", 31.780, 35.210),
        substation("sub_remote_1", 32.200, 35.600),
        substation("sub_remote_2", 31.300, 34.800),
        Asset {
            id: "pump_main".to_string(),
            name: "Main pump station".to_string(),
            sector: Sector::Water,
            subtype: "pump_station".to_string(),
            city: "Jerusalem".to_string(),
            lat: 31.79,
            lng: 35.20,
            criticality: 4,
            metadata: None,
        },
    ] {
        engine.put_asset(&asset).expect("asset stored");
    }
}

fn engine_with_templates() -> ScenarioEngine {
    let engine = ScenarioEngine::open_in_memory()
        .expect("engine opens")
        .with_pacing(Duration::from_millis(1));
    seed_city(&engine);

    let csv_path = temp_path("rules", "csv");
    std::fs::write(&csv_path, EARTHQUAKE_CSV).expect("csv written");
    engine.import_rules(&csv_path).expect("rules imported");
    let _ = std::fs::remove_file(&csv_path);

    engine
}

fn earthquake_request() -> PrepareRequest {
    PrepareRequest {
        city: "Jerusalem".to_string(),
        scenario: "earthquake".to_string(),
        duration_hours: 24,
        tick_minutes: 60,
        repair_crews: 0,
        seed: None,
        anchors: vec![Anchor {
            anchor_type: "EPICENTER".to_string(),
            lat: 31.77,
            lng: 35.22,
        }],
    }
}

#[test]
fn prepare_earthquake_materializes_radius_hits_at_midpoint_tick() {
    let engine = engine_with_templates();
    let summary = engine.prepare(&earthquake_request()).expect("prepare works");

    assert_eq!(summary.template_id, "EQ_030");
    assert_eq!(summary.rule_count, 1);
    assert_eq!(summary.events_created, 3);
    assert_eq!(summary.recoveries_added, 6);
    assert_eq!(summary.assets_used, 3);
    assert_eq!(summary.total_ticks, 24);

    let events = engine
        .instance_events(&summary.scenario_instance_id)
        .expect("events load");

    let impacts: Vec<_> = events
        .iter()
        .filter(|event| event.event_kind == EventKind::Impact)
        .collect();
    assert_eq!(impacts.len(), 3);
    for impact in &impacts {
        assert_eq!(impact.tick_index, 12);
        assert_eq!(impact.performance_pct, 0);
        assert!(impact.asset_id.starts_with("sub_center_"));
    }

    let recoveries: Vec<_> = events
        .iter()
        .filter(|event| event.event_kind.is_recovery())
        .collect();
    assert_eq!(recoveries.len(), 6);
    for recovery in &recoveries {
        assert!(recovery.tick_index > 12);
        assert!(recovery.tick_index < 24);
    }

    let detail = engine
        .describe_prepared(&summary.scenario_instance_id)
        .expect("describe works");
    assert_eq!(detail.event_count, 9);
    assert_eq!(detail.anchors.len(), 1);
    assert_eq!(detail.events_by_kind["IMPACT"], 3);
    assert_eq!(detail.events_by_kind["REPAIR_FULL"], 3);

    let buckets = engine
        .timeline(&summary.scenario_instance_id, Some(1))
        .expect("timeline works");
    assert_eq!(buckets.len(), 24);
    assert_eq!(buckets[12].impacts, 3);
    assert_eq!(buckets[11].impacts, 0);
}

#[test]
fn prepare_without_anchor_reports_missing_anchor() {
    let engine = engine_with_templates();
    let mut request = earthquake_request();
    request.anchors.clear();

    let error: ApiError = engine.prepare(&request).expect_err("must fail");
    assert_eq!(error.error, ErrorKind::MissingAnchor);
    assert_eq!(error.required_anchor.as_deref(), Some("EPICENTER"));
}

#[test]
fn prepare_cyber_attack_needs_no_anchor_and_skips_geo_filter() {
    let engine = engine_with_templates();
    let request = PrepareRequest {
        city: "Jerusalem".to_string(),
        scenario: "cyber_attack".to_string(),
        duration_hours: 24,
        tick_minutes: 60,
        repair_crews: 1,
        seed: None,
        anchors: Vec::new(),
    };

    let summary = engine.prepare(&request).expect("prepare works");
    assert_eq!(summary.template_id, "CY_020");
    // 40% of the five substations, remote ones included: no geo filter.
    assert_eq!(summary.events_created, 2);
}

#[test]
fn upstream_chain_reverses_provider_consumer_edges() {
    let engine = ScenarioEngine::open_in_memory().expect("engine opens");
    for id in ["X", "Y", "Z", "W"] {
        engine
            .put_asset(&substation(id, 31.77, 35.22))
            .expect("asset stored");
    }
    for (provider, consumer) in [("X", "Y"), ("Y", "Z"), ("Z", "W")] {
        engine
            .put_dependency(&DependencyEdge {
                provider_asset_id: provider.to_string(),
                consumer_asset_id: consumer.to_string(),
                dependency_type: "power".to_string(),
                priority: 1,
                is_active: true,
            })
            .expect("dependency stored");
    }

    let response = engine
        .chain("W", Direction::Upstream, 2)
        .expect("chain works");

    let node_ids: Vec<&str> = response.nodes.iter().map(|node| node.id.as_str()).collect();
    assert_eq!(node_ids, vec!["W", "Y", "Z"]); // batch load is id-ordered
    assert_eq!(response.edges.len(), 2);
    assert_eq!(
        (response.edges[0].from.as_str(), response.edges[0].to.as_str(), response.edges[0].level),
        ("W", "Z", 1)
    );
    assert_eq!(
        (response.edges[1].from.as_str(), response.edges[1].to.as_str(), response.edges[1].level),
        ("Z", "Y", 2)
    );

    // A node with no dependencies at depth 1 returns just itself.
    let lonely = engine
        .chain("X", Direction::Upstream, 1)
        .expect("chain works");
    assert_eq!(lonely.nodes.len(), 1);
    assert!(lonely.edges.is_empty());
}

#[test]
fn graph_view_lists_assets_and_active_links() {
    let engine = engine_with_templates();
    engine
        .put_dependency(&DependencyEdge {
            provider_asset_id: "sub_center_1".to_string(),
            consumer_asset_id: "pump_main".to_string(),
            dependency_type: "power".to_string(),
            priority: 1,
            is_active: true,
        })
        .expect("dependency stored");
    engine
        .put_dependency(&DependencyEdge {
            provider_asset_id: "sub_center_2".to_string(),
            consumer_asset_id: "pump_main".to_string(),
            dependency_type: "power".to_string(),
            priority: 2,
            is_active: false,
        })
        .expect("dependency stored");

    let graph = engine.graph().expect("graph works");
    assert_eq!(graph.nodes.len(), 6);
    assert_eq!(graph.links.len(), 1);
}

#[tokio::test]
async fn run_replay_surfaces_failures_exactly_at_the_impact_tick() {
    let engine = engine_with_templates();
    let summary = engine.prepare(&earthquake_request()).expect("prepare works");

    let run = engine
        .start(&summary.scenario_instance_id)
        .expect("run starts");
    assert_eq!(run.total_ticks, 24);
    assert!(!run.done);

    let mut state = engine.run_state(&run.sim_run_id).expect("state reads");
    for _ in 0..1_000 {
        if state.done {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        state = engine.run_state(&run.sim_run_id).expect("state reads");
    }
    assert!(state.done, "precompute should finish");
    assert_eq!(state.computed_max_tick, 23);

    let impact_tick = match engine
        .run_tick(&run.sim_run_id, 12)
        .expect("tick reads")
    {
        TickPoll::Ready(payload) => payload,
        TickPoll::Pending { .. } => panic!("tick 12 must be computed"),
    };
    assert_eq!(impact_tick.assets_changed.len(), 3);
    for change in &impact_tick.assets_changed {
        assert!(change.id.starts_with("sub_center_"));
        assert_eq!(change.status, AssetCondition::Failed);
    }
    assert!(impact_tick.sectors[&Sector::Electricity] < 100);
    assert_eq!(impact_tick.sectors[&Sector::Water], 100);
    assert_eq!(impact_tick.recommendations.len(), 1);

    let quiet_tick = match engine
        .run_tick(&run.sim_run_id, 11)
        .expect("tick reads")
    {
        TickPoll::Ready(payload) => payload,
        TickPoll::Pending { .. } => panic!("tick 11 must be computed"),
    };
    assert!(quiet_tick.assets_changed.is_empty());
    assert_eq!(quiet_tick.sectors[&Sector::Electricity], 100);

    // Reads are stable and out-of-range indexes clamp to the last tick.
    assert_eq!(
        engine.run_tick(&run.sim_run_id, 12).expect("tick reads"),
        engine.run_tick(&run.sim_run_id, 12).expect("tick reads"),
    );
    match engine
        .run_tick(&run.sim_run_id, 9_999)
        .expect("tick reads")
    {
        TickPoll::Ready(payload) => assert_eq!(payload.tick_index, 23),
        TickPoll::Pending { .. } => panic!("clamped tick must be computed"),
    }
}

#[tokio::test]
async fn recovery_injection_lifts_sector_health_after_the_impact() {
    let engine = engine_with_templates();
    let summary = engine.prepare(&earthquake_request()).expect("prepare works");
    let run = engine
        .start(&summary.scenario_instance_id)
        .expect("run starts");

    for _ in 0..1_000 {
        if engine.run_state(&run.sim_run_id).expect("state reads").done {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let health_at = |tick_index: u32| -> u8 {
        match engine.run_tick(&run.sim_run_id, tick_index).expect("tick reads") {
            TickPoll::Ready(payload) => payload.sectors[&Sector::Electricity],
            TickPoll::Pending { .. } => panic!("tick {tick_index} must be computed"),
        }
    };

    // Full recovery lands by the final tick for every damaged substation;
    // a trailing partial can only pull one back to the [50, 95] band.
    let impact_health = health_at(12);
    let final_health = health_at(23);
    assert!(final_health > impact_health);
    assert!(final_health >= 70);
}

#[test]
fn prepare_is_deterministic_for_a_fixed_seed() {
    let engine = engine_with_templates();
    let mut request = earthquake_request();
    request.seed = Some(42);

    let first = engine.prepare(&request).expect("first prepare");
    let second = engine.prepare(&request).expect("second prepare");
    assert_ne!(first.scenario_instance_id, second.scenario_instance_id);

    let shape = |instance_id: &str| -> Vec<(u32, EventKind, String, u8)> {
        engine
            .instance_events(instance_id)
            .expect("events load")
            .into_iter()
            .map(|event| {
                (
                    event.tick_index,
                    event.event_kind,
                    event.asset_id,
                    event.performance_pct,
                )
            })
            .collect()
    };
    assert_eq!(
        shape(&first.scenario_instance_id),
        shape(&second.scenario_instance_id)
    );
}

#[test]
fn csv_reimport_is_idempotent_on_a_file_backed_store() {
    let db_path = temp_path("store", "sqlite");
    let csv_path = temp_path("rules", "csv");
    std::fs::write(&csv_path, EARTHQUAKE_CSV).expect("csv written");

    {
        let engine = ScenarioEngine::open(&db_path).expect("engine opens");
        let first = engine.import_rules(&csv_path).expect("first import");
        assert_eq!(first.templates, 2);
        assert_eq!(first.rules, 2);
        let before = engine.template_rules("EQ_030").expect("rules load");

        engine.import_rules(&csv_path).expect("second import");
        let after = engine.template_rules("EQ_030").expect("rules load");
        assert_eq!(before, after);
    }

    let _ = std::fs::remove_file(&csv_path);
    let _ = std::fs::remove_file(&db_path);
    let _ = std::fs::remove_file(db_path.with_extension("sqlite-wal"));
    let _ = std::fs::remove_file(db_path.with_extension("sqlite-shm"));
}

#[test]
fn start_on_unknown_instance_is_not_found() {
    let engine = ScenarioEngine::open_in_memory().expect("engine opens");
    let error = engine.start("inst_missing").expect_err("must fail");
    assert_eq!(error.error, ErrorKind::NotFound);
}

#[test]
fn out_of_bounds_prepare_parameters_clamp_and_continue() {
    let engine = engine_with_templates();
    let mut request = earthquake_request();
    request.duration_hours = 9_000;
    request.tick_minutes = 600;
    request.repair_crews = 40_000;

    let summary = engine.prepare(&request).expect("prepare works");
    // 168h at 60-minute ticks.
    assert_eq!(summary.total_ticks, 168);
}
