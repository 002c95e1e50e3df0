//! Bounded directed BFS over the active dependency edge set.

use std::collections::{BTreeSet, VecDeque};

use contracts::{ChainEdge, DependencyEdge, Direction};

/// Traversal result: discovered node ids in BFS order (root first) and the
/// edges that reached them, oriented in walk direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainWalk {
    pub node_ids: Vec<String>,
    pub edges: Vec<ChainEdge>,
}

/// Walk from `root_asset_id` up to `max_depth` levels. Downstream follows
/// edges as stored (provider → consumer); upstream reverses them. Edges are
/// deduplicated on `(from, to, type, priority)`; the edge snapshot is
/// whatever the caller loaded at entry.
pub fn walk_chain(
    root_asset_id: &str,
    direction: Direction,
    max_depth: u32,
    edges: &[DependencyEdge],
) -> ChainWalk {
    let mut node_ids = vec![root_asset_id.to_string()];
    let mut visited: BTreeSet<String> = BTreeSet::new();
    visited.insert(root_asset_id.to_string());

    let mut emitted: BTreeSet<(String, String, String, u8)> = BTreeSet::new();
    let mut walk_edges = Vec::new();

    let mut queue = VecDeque::new();
    queue.push_back((root_asset_id.to_string(), 0_u32));

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }

        for edge in edges.iter().filter(|edge| edge.is_active) {
            let far = match direction {
                Direction::Downstream if edge.provider_asset_id == current => {
                    &edge.consumer_asset_id
                }
                Direction::Upstream if edge.consumer_asset_id == current => {
                    &edge.provider_asset_id
                }
                _ => continue,
            };

            let key = (
                current.clone(),
                far.clone(),
                edge.dependency_type.clone(),
                edge.priority,
            );
            if emitted.insert(key) {
                walk_edges.push(ChainEdge {
                    from: current.clone(),
                    to: far.clone(),
                    dependency_type: edge.dependency_type.clone(),
                    priority: edge.priority,
                    level: depth + 1,
                });
            }

            if visited.insert(far.clone()) {
                node_ids.push(far.clone());
                queue.push_back((far.clone(), depth + 1));
            }
        }
    }

    ChainWalk {
        node_ids,
        edges: walk_edges,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(provider: &str, consumer: &str) -> DependencyEdge {
        typed_edge(provider, consumer, "power", 1)
    }

    fn typed_edge(
        provider: &str,
        consumer: &str,
        dependency_type: &str,
        priority: u8,
    ) -> DependencyEdge {
        DependencyEdge {
            provider_asset_id: provider.to_string(),
            consumer_asset_id: consumer.to_string(),
            dependency_type: dependency_type.to_string(),
            priority,
            is_active: true,
        }
    }

    /// X→Y→Z→W as providers; upstream from W with depth 2 reaches Z then Y.
    #[test]
    fn upstream_walk_reverses_edges() {
        let edges = vec![edge("X", "Y"), edge("Y", "Z"), edge("Z", "W")];
        let walk = walk_chain("W", Direction::Upstream, 2, &edges);

        assert_eq!(walk.node_ids, vec!["W", "Z", "Y"]);
        assert_eq!(walk.edges.len(), 2);
        assert_eq!(walk.edges[0].from, "W");
        assert_eq!(walk.edges[0].to, "Z");
        assert_eq!(walk.edges[0].level, 1);
        assert_eq!(walk.edges[1].from, "Z");
        assert_eq!(walk.edges[1].to, "Y");
        assert_eq!(walk.edges[1].level, 2);
    }

    #[test]
    fn downstream_walk_follows_stored_orientation() {
        let edges = vec![edge("X", "Y"), edge("Y", "Z")];
        let walk = walk_chain("X", Direction::Downstream, 12, &edges);
        assert_eq!(walk.node_ids, vec!["X", "Y", "Z"]);
    }

    #[test]
    fn isolated_root_yields_just_the_root() {
        let walk = walk_chain("lonely", Direction::Downstream, 1, &[]);
        assert_eq!(walk.node_ids, vec!["lonely"]);
        assert!(walk.edges.is_empty());
    }

    #[test]
    fn depth_bound_stops_expansion() {
        let edges = vec![edge("X", "Y"), edge("Y", "Z"), edge("Z", "W")];
        let walk = walk_chain("X", Direction::Downstream, 1, &edges);
        assert_eq!(walk.node_ids, vec!["X", "Y"]);
        assert_eq!(walk.edges.len(), 1);
    }

    #[test]
    fn inactive_edges_are_invisible() {
        let mut broken = edge("X", "Y");
        broken.is_active = false;
        let walk = walk_chain("X", Direction::Downstream, 3, &[broken]);
        assert_eq!(walk.node_ids, vec!["X"]);
    }

    #[test]
    fn multigraph_edges_are_kept_but_deduplicated() {
        let edges = vec![
            typed_edge("X", "Y", "power", 1),
            typed_edge("X", "Y", "comms", 1),
            typed_edge("X", "Y", "power", 1),
        ];
        let walk = walk_chain("X", Direction::Downstream, 2, &edges);
        assert_eq!(walk.node_ids, vec!["X", "Y"]);
        assert_eq!(walk.edges.len(), 2);
    }

    #[test]
    fn cycles_terminate() {
        let edges = vec![edge("X", "Y"), edge("Y", "X")];
        let walk = walk_chain("X", Direction::Downstream, 12, &edges);
        assert_eq!(walk.node_ids, vec!["X", "Y"]);
        // The back edge is still reported at its discovery level.
        assert_eq!(walk.edges.len(), 2);
    }
}
