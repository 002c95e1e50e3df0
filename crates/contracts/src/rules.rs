//! Hazard templates and the parametric rules they bundle.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Sector;

/// Hazard families a template can describe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HazardType {
    Earthquake,
    Cyber,
    Tsunami,
    Pandemic,
    SevereStorm,
    Wildfire,
}

impl HazardType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Earthquake => "EARTHQUAKE",
            Self::Cyber => "CYBER",
            Self::Tsunami => "TSUNAMI",
            Self::Pandemic => "PANDEMIC",
            Self::SevereStorm => "SEVERE_STORM",
            Self::Wildfire => "WILDFIRE",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "EARTHQUAKE" => Some(Self::Earthquake),
            "CYBER" => Some(Self::Cyber),
            "TSUNAMI" => Some(Self::Tsunami),
            "PANDEMIC" => Some(Self::Pandemic),
            "SEVERE_STORM" => Some(Self::SevereStorm),
            "WILDFIRE" => Some(Self::Wildfire),
            _ => None,
        }
    }
}

impl fmt::Display for HazardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named bundle of rules characterizing one hazard type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Template {
    pub template_id: String,
    pub name: String,
    pub hazard_type: HazardType,
    pub version: u32,
    pub is_active: bool,
}

/// How a rule narrows its candidate pool.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectionScope {
    GeoRadius,
    GeoScatter,
    GraphCentrality,
    /// Unrecognized scope strings degrade to stable id ordering.
    Other,
}

impl SelectionScope {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "GEO_RADIUS" => Self::GeoRadius,
            "GEO_SCATTER" => Self::GeoScatter,
            "GRAPH_CENTRALITY" => Self::GraphCentrality,
            _ => Self::Other,
        }
    }
}

/// Whether `target_value` is a percentage of the pool or an absolute count.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TargetMode {
    Pct,
    Count,
}

impl TargetMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "PCT" => Some(Self::Pct),
            "COUNT" => Some(Self::Count),
            _ => None,
        }
    }
}

/// Parametric impact or repair specification inside a template. Rules are
/// append-only and versioned with their template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Rule {
    pub rule_id: String,
    pub template_id: String,
    pub event_kind: crate::EventKind,
    pub time_pct: f64,
    #[serde(default)]
    pub time_jitter_pct: f64,
    pub selection_scope: SelectionScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<Sector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    pub target_mode: TargetMode,
    pub target_value: f64,
    #[serde(default)]
    pub allow_reuse_asset: bool,
    pub performance_pct: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repair_time_min: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repair_time_max: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_anchor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_param_1_km: Option<f64>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl Rule {
    /// Mean repair time when both bounds are present, the single bound when
    /// only one is, otherwise none.
    pub fn repair_time_minutes(&self) -> Option<u32> {
        match (self.repair_time_min, self.repair_time_max) {
            (Some(min), Some(max)) => Some((min + max) / 2),
            (Some(min), None) => Some(min),
            (None, Some(max)) => Some(max),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hazard_round_trips_wire_names() {
        for hazard in [
            HazardType::Earthquake,
            HazardType::Cyber,
            HazardType::Tsunami,
            HazardType::Pandemic,
            HazardType::SevereStorm,
            HazardType::Wildfire,
        ] {
            assert_eq!(HazardType::parse(hazard.as_str()), Some(hazard));
        }
        assert_eq!(HazardType::parse("volcano"), None);
    }

    #[test]
    fn unknown_selection_scope_degrades() {
        assert_eq!(SelectionScope::parse("GEO_RADIUS"), SelectionScope::GeoRadius);
        assert_eq!(SelectionScope::parse("ring_buffer"), SelectionScope::Other);
    }

    #[test]
    fn repair_time_prefers_mean_of_bounds() {
        let mut rule = sample_rule();
        rule.repair_time_min = Some(30);
        rule.repair_time_max = Some(91);
        assert_eq!(rule.repair_time_minutes(), Some(60));

        rule.repair_time_max = None;
        assert_eq!(rule.repair_time_minutes(), Some(30));

        rule.repair_time_min = None;
        assert_eq!(rule.repair_time_minutes(), None);
    }

    fn sample_rule() -> Rule {
        Rule {
            rule_id: "EQ_030_R1".to_string(),
            template_id: "EQ_030".to_string(),
            event_kind: crate::EventKind::Impact,
            time_pct: 50.0,
            time_jitter_pct: 0.0,
            selection_scope: SelectionScope::GeoRadius,
            sector: Some(Sector::Electricity),
            subtype: Some("substation".to_string()),
            target_mode: TargetMode::Pct,
            target_value: 100.0,
            allow_reuse_asset: false,
            performance_pct: 0,
            repair_time_min: None,
            repair_time_max: None,
            geo_anchor: Some("EPICENTER".to_string()),
            geo_param_1_km: Some(5.0),
            priority: 0,
            enabled: true,
            notes: None,
        }
    }
}
