use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::{Graph, NodeId};

/// Summary of lineage graph structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageGraphSummary {
    pub nodes: usize,
    pub edges: usize,
}

/// Report for upstream-first ordering of a lineage graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineageOrderReport {
    pub summary: LineageGraphSummary,
    pub topo_order: Option<Vec<NodeId>>,
    /// Nodes left on or downstream of a cycle when ordering fails.
    pub cycle: Option<Vec<NodeId>>,
}

/// Build a deterministic upstream-first ordering report for a lineage graph.
pub fn build_lineage_order_report(graph: &Graph) -> LineageOrderReport {
    let adjacency = build_adjacency(graph);
    let summary = LineageGraphSummary {
        nodes: adjacency.len(),
        edges: graph.edges.len(),
    };

    match toposort(&adjacency) {
        Ok(order) => LineageOrderReport {
            summary,
            topo_order: Some(order),
            cycle: None,
        },
        Err(cycle) => LineageOrderReport {
            summary,
            topo_order: None,
            cycle: Some(cycle),
        },
    }
}

/// Outgoing neighbours per node, indexed by node id. Edges pointing at
/// unknown nodes are ignored.
pub fn build_adjacency(graph: &Graph) -> Vec<Vec<NodeId>> {
    let mut adjacency = vec![Vec::new(); graph.nodes.len()];
    let len = adjacency.len() as u64;

    for edge in &graph.edges {
        if edge.source_id < len && edge.target_id < len {
            adjacency[edge.source_id as usize].push(edge.target_id);
        }
    }

    adjacency
}

fn toposort(adjacency: &[Vec<NodeId>]) -> Result<Vec<NodeId>, Vec<NodeId>> {
    let mut indegree = vec![0usize; adjacency.len()];
    for targets in adjacency {
        for target in targets {
            indegree[*target as usize] += 1;
        }
    }

    let mut ready: BTreeSet<NodeId> = indegree
        .iter()
        .enumerate()
        .filter_map(|(node, count)| {
            if *count == 0 {
                Some(node as NodeId)
            } else {
                None
            }
        })
        .collect();

    let mut order = Vec::with_capacity(adjacency.len());

    while let Some(node) = ready.pop_first() {
        order.push(node);

        for target in &adjacency[node as usize] {
            let count = &mut indegree[*target as usize];
            *count = count.saturating_sub(1);
            if *count == 0 {
                ready.insert(*target);
            }
        }
    }

    if order.len() == adjacency.len() {
        Ok(order)
    } else {
        let cycle_nodes: Vec<NodeId> = indegree
            .into_iter()
            .enumerate()
            .filter_map(|(node, count)| if count > 0 { Some(node as NodeId) } else { None })
            .collect();
        Err(cycle_nodes)
    }
}
