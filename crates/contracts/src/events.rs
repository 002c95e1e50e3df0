//! Prepared scenario instances and their materialized event rows.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{serde_u64_string, HazardType};

pub const MIN_DURATION_HOURS: u32 = 1;
pub const MAX_DURATION_HOURS: u32 = 168;
pub const MIN_TICK_MINUTES: u32 = 1;
pub const MAX_TICK_MINUTES: u32 = 60;
pub const MAX_REPAIR_CREWS: u32 = 999;

/// Kinds of materialized events. `REPAIR_PARTIAL` and `REPAIR_FULL` are only
/// produced by recovery injection, never by rules.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Impact,
    Repair,
    RepairPartial,
    RepairFull,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Impact => "IMPACT",
            Self::Repair => "REPAIR",
            Self::RepairPartial => "REPAIR_PARTIAL",
            Self::RepairFull => "REPAIR_FULL",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_uppercase().as_str() {
            "IMPACT" => Some(Self::Impact),
            "REPAIR" => Some(Self::Repair),
            "REPAIR_PARTIAL" => Some(Self::RepairPartial),
            "REPAIR_FULL" => Some(Self::RepairFull),
            _ => None,
        }
    }

    pub fn is_recovery(self) -> bool {
        matches!(self, Self::RepairPartial | Self::RepairFull)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Instance lifecycle status. Only `PREPARED` is assigned by the core.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    Prepared,
}

impl InstanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prepared => "PREPARED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "PREPARED" => Some(Self::Prepared),
            _ => None,
        }
    }
}

/// A concrete, city-bound materialization of a template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioInstance {
    pub id: String,
    pub city: String,
    pub scenario: String,
    pub hazard_type: HazardType,
    pub template_id: String,
    pub duration_hours: u32,
    pub tick_minutes: u32,
    pub repair_crews: u32,
    #[serde(with = "serde_u64_string")]
    pub seed: u64,
    pub status: InstanceStatus,
    pub created_at: String,
}

impl ScenarioInstance {
    pub fn total_ticks(&self) -> u32 {
        ((self.duration_hours * 60) / self.tick_minutes).max(1)
    }
}

/// One scheduled `(tick, asset, performance)` triple inside an instance.
/// `sequence` preserves insertion order within a tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScenarioEvent {
    pub instance_id: String,
    pub sequence: u64,
    pub tick_index: u32,
    pub event_kind: EventKind,
    pub asset_id: String,
    pub performance_pct: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repair_time_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_rule_id: Option<String>,
}
