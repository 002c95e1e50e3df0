//! Cross-boundary contracts for the gridshock scenario engine: assets,
//! dependencies, templates and rules, instances, events, run payloads, and
//! the API error envelope.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod chain;
pub mod events;
pub mod rules;
pub mod serde_u64_string;
pub mod sim;

pub use chain::{ChainEdge, ChainResponse, Direction, GraphView};
pub use events::{EventKind, InstanceStatus, ScenarioEvent, ScenarioInstance};
pub use rules::{HazardType, Rule, SelectionScope, TargetMode, Template};
pub use sim::{
    AssetStateChange, InstanceDetail, PrepareRequest, PrepareSummary, RunState, TickPayload,
    TickPoll, TimelineBucket,
};

pub const DEFAULT_CRITICALITY: u8 = 3;

/// Infrastructure sectors tracked by the asset inventory.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
    Electricity,
    Water,
    Gas,
    Communication,
    FirstResponders,
}

impl Sector {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Electricity => "electricity",
            Self::Water => "water",
            Self::Gas => "gas",
            Self::Communication => "communication",
            Self::FirstResponders => "first_responders",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "electricity" => Some(Self::Electricity),
            "water" => Some(Self::Water),
            "gas" => Some(Self::Gas),
            "communication" => Some(Self::Communication),
            "first_responders" => Some(Self::FirstResponders),
            _ => None,
        }
    }
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A geo-located infrastructure asset. Identity is immutable; the core never
/// mutates asset rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Asset {
    pub id: String,
    pub name: String,
    pub sector: Sector,
    pub subtype: String,
    pub city: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default = "default_criticality")]
    pub criticality: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

fn default_criticality() -> u8 {
    DEFAULT_CRITICALITY
}

/// Directed provider → consumer dependency. The edge set is a multigraph:
/// several edges of different types may connect the same pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DependencyEdge {
    pub provider_asset_id: String,
    pub consumer_asset_id: String,
    pub dependency_type: String,
    pub priority: u8,
    pub is_active: bool,
}

/// Stored per-asset operational state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationalStatus {
    Active,
    Partial,
    Inactive,
}

impl OperationalStatus {
    pub fn from_performance(performance_pct: u8) -> Self {
        AssetCondition::from_performance(performance_pct).status()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Partial => "partial",
            Self::Inactive => "inactive",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(Self::Active),
            "partial" => Some(Self::Partial),
            "inactive" => Some(Self::Inactive),
            _ => None,
        }
    }
}

/// Discrete condition derived from performance percentage, as reported in
/// tick payloads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetCondition {
    Recovered,
    Degraded,
    Failed,
}

impl AssetCondition {
    /// `>= 100` recovered, `[50, 99]` degraded, `< 50` failed.
    pub fn from_performance(performance_pct: u8) -> Self {
        if performance_pct >= 100 {
            Self::Recovered
        } else if performance_pct >= 50 {
            Self::Degraded
        } else {
            Self::Failed
        }
    }

    pub fn status(self) -> OperationalStatus {
        match self {
            Self::Recovered => OperationalStatus::Active,
            Self::Degraded => OperationalStatus::Partial,
            Self::Failed => OperationalStatus::Inactive,
        }
    }
}

/// Operator-placed geographic point scoping rule selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Anchor {
    #[serde(rename = "type")]
    pub anchor_type: String,
    pub lat: f64,
    pub lng: f64,
}

/// Error kinds surfaced by the scenario engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    BadInput,
    UnknownScenario,
    MissingAnchor,
    NotFound,
    Conflict,
    Internal,
}

/// Failure envelope returned by every failing facade call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ApiError {
    pub error: ErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_anchor: Option<String>,
}

impl ApiError {
    pub fn new(error: ErrorKind, details: impl Into<String>) -> Self {
        Self {
            error,
            details: Some(details.into()),
            required_anchor: None,
        }
    }

    pub fn bad_input(details: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadInput, details)
    }

    pub fn unknown_scenario(scenario: &str) -> Self {
        Self::new(
            ErrorKind::UnknownScenario,
            format!("no template mapping for scenario '{scenario}'"),
        )
    }

    pub fn missing_anchor(required_anchor: &str) -> Self {
        Self {
            error: ErrorKind::MissingAnchor,
            details: Some(format!(
                "scenario requires an anchor of type {required_anchor}"
            )),
            required_anchor: Some(required_anchor.to_string()),
        }
    }

    pub fn not_found(details: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, details)
    }

    pub fn internal(details: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, details)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.error)?;
        if let Some(details) = &self.details {
            write!(f, ": {details}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_thresholds_match_contract() {
        assert_eq!(
            AssetCondition::from_performance(100),
            AssetCondition::Recovered
        );
        assert_eq!(
            AssetCondition::from_performance(99),
            AssetCondition::Degraded
        );
        assert_eq!(
            AssetCondition::from_performance(50),
            AssetCondition::Degraded
        );
        assert_eq!(AssetCondition::from_performance(49), AssetCondition::Failed);
        assert_eq!(AssetCondition::from_performance(0), AssetCondition::Failed);
    }

    #[test]
    fn error_envelope_omits_absent_fields() {
        let error = ApiError::not_found("asset missing");
        let encoded = serde_json::to_value(&error).expect("serialize");
        assert_eq!(encoded["error"], "NOT_FOUND");
        assert!(encoded.get("required_anchor").is_none());
    }

    #[test]
    fn missing_anchor_names_required_type() {
        let error = ApiError::missing_anchor("EPICENTER");
        let encoded = serde_json::to_value(&error).expect("serialize");
        assert_eq!(encoded["error"], "MISSING_ANCHOR");
        assert_eq!(encoded["required_anchor"], "EPICENTER");
    }

    #[test]
    fn anchor_uses_wire_name_type() {
        let anchor: Anchor =
            serde_json::from_str(r#"{"type":"EPICENTER","lat":31.77,"lng":35.22}"#)
                .expect("anchor parses");
        assert_eq!(anchor.anchor_type, "EPICENTER");
    }

    #[test]
    fn asset_criticality_defaults_to_three() {
        let asset: Asset = serde_json::from_str(
            r#"{"id":"a1","name":"North Substation","sector":"electricity",
                "subtype":"substation","city":"Jerusalem","lat":31.8,"lng":35.2}"#,
        )
        .expect("asset parses");
        assert_eq!(asset.criticality, DEFAULT_CRITICALITY);
    }
}
