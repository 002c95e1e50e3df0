//! Hard-coded UI scenario → template mapping. This table is data versioned
//! with the code, not a code path per hazard.

use contracts::HazardType;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioMapping {
    pub scenario: &'static str,
    pub template_id: &'static str,
    pub hazard_type: HazardType,
    pub required_anchor: Option<&'static str>,
}

pub const SCENARIO_CATALOG: [ScenarioMapping; 6] = [
    ScenarioMapping {
        scenario: "earthquake",
        template_id: "EQ_030",
        hazard_type: HazardType::Earthquake,
        required_anchor: Some("EPICENTER"),
    },
    ScenarioMapping {
        scenario: "cyber_attack",
        template_id: "CY_020",
        hazard_type: HazardType::Cyber,
        required_anchor: None,
    },
    ScenarioMapping {
        scenario: "tsunami",
        template_id: "TS_025",
        hazard_type: HazardType::Tsunami,
        required_anchor: Some("IMPACT_CENTER"),
    },
    ScenarioMapping {
        scenario: "pandemic",
        template_id: "PD_040",
        hazard_type: HazardType::Pandemic,
        required_anchor: None,
    },
    ScenarioMapping {
        scenario: "severe_storm",
        template_id: "SS_020",
        hazard_type: HazardType::SevereStorm,
        required_anchor: Some("FLOOD_POCKET"),
    },
    ScenarioMapping {
        scenario: "wildfire",
        template_id: "WF_020",
        hazard_type: HazardType::Wildfire,
        required_anchor: Some("FIRE_ORIGIN"),
    },
];

pub fn lookup_scenario(scenario: &str) -> Option<&'static ScenarioMapping> {
    SCENARIO_CATALOG
        .iter()
        .find(|mapping| mapping.scenario == scenario)
}
