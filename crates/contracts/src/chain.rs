//! Dependency chain and graph read models.

use serde::{Deserialize, Serialize};

use crate::{Asset, DependencyEdge};

pub const MIN_CHAIN_DEPTH: u32 = 1;
pub const MAX_CHAIN_DEPTH: u32 = 12;

/// Traversal direction over provider → consumer edges. Upstream reverses
/// them, walking from a consumer toward its providers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Upstream,
    Downstream,
}

impl Direction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "upstream" => Some(Self::Upstream),
            "downstream" => Some(Self::Downstream),
            _ => None,
        }
    }
}

/// One traversed edge, oriented in walk direction and annotated with the
/// BFS level at which it was discovered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainEdge {
    pub from: String,
    pub to: String,
    pub dependency_type: String,
    pub priority: u8,
    pub level: u32,
}

/// Reachable subgraph rooted at one asset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainResponse {
    pub root_asset_id: String,
    pub direction: Direction,
    pub max_depth: u32,
    pub nodes: Vec<Asset>,
    pub edges: Vec<ChainEdge>,
}

/// Full structural view over the inventory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphView {
    pub nodes: Vec<Asset>,
    pub links: Vec<DependencyEdge>,
}
