use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use lineagen_core::{GRAPH_FORMAT_VERSION, Graph, NodeId, build_lineage_order_report};

/// Summary statistics for a generated lineage graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStats {
    pub format_version: String,
    pub seed: u64,
    pub total_nodes: usize,
    pub total_edges: usize,
    pub field_level_edges: usize,
    pub node_types: BTreeMap<String, usize>,
    pub edge_types: BTreeMap<String, usize>,
    pub team_nodes: BTreeMap<String, usize>,
    pub data_source_nodes: BTreeMap<String, usize>,
    pub platform_nodes: BTreeMap<String, usize>,
    pub orphaned_nodes: usize,
    pub subgraph_nodes: usize,
    pub usage: UsageRanges,
    pub degree: DegreeStats,
    pub connectivity: ConnectivityStats,
    pub has_cycle: bool,
}

/// Node counts per `usage_score` band.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRanges {
    /// 70-100
    pub heavy: usize,
    /// 40-69
    pub moderate: usize,
    /// 1-39
    pub light: usize,
    /// -1, or no score at all
    pub unused: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DegreeStats {
    pub max_in: usize,
    pub max_out: usize,
    pub max_total: usize,
    pub min_total: usize,
    pub mean_total: f64,
}

/// Weakly connected structure of the graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityStats {
    pub components: usize,
    pub largest_component: usize,
    pub isolated_nodes: usize,
    /// Share of nodes outside the largest component, in percent.
    pub disconnected_pct: f64,
}

impl GraphStats {
    /// Flatten into dotted keys, e.g. `node_types.table` or `degree.max_in`.
    pub fn as_map(&self) -> BTreeMap<String, f64> {
        let mut map = BTreeMap::new();
        map.insert("total_nodes".to_string(), self.total_nodes as f64);
        map.insert("total_edges".to_string(), self.total_edges as f64);
        map.insert("field_level_edges".to_string(), self.field_level_edges as f64);
        map.insert("orphaned_nodes".to_string(), self.orphaned_nodes as f64);
        map.insert("subgraph_nodes".to_string(), self.subgraph_nodes as f64);

        let groups = [
            ("node_types", &self.node_types),
            ("edge_types", &self.edge_types),
            ("team_nodes", &self.team_nodes),
            ("data_source_nodes", &self.data_source_nodes),
            ("platform_nodes", &self.platform_nodes),
        ];
        for (prefix, counts) in groups {
            for (key, count) in counts {
                map.insert(format!("{prefix}.{key}"), *count as f64);
            }
        }

        map.insert("usage.heavy".to_string(), self.usage.heavy as f64);
        map.insert("usage.moderate".to_string(), self.usage.moderate as f64);
        map.insert("usage.light".to_string(), self.usage.light as f64);
        map.insert("usage.unused".to_string(), self.usage.unused as f64);

        map.insert("degree.max_in".to_string(), self.degree.max_in as f64);
        map.insert("degree.max_out".to_string(), self.degree.max_out as f64);
        map.insert("degree.max_total".to_string(), self.degree.max_total as f64);
        map.insert("degree.min_total".to_string(), self.degree.min_total as f64);
        map.insert("degree.mean_total".to_string(), self.degree.mean_total);

        map.insert(
            "connectivity.components".to_string(),
            self.connectivity.components as f64,
        );
        map.insert(
            "connectivity.largest_component".to_string(),
            self.connectivity.largest_component as f64,
        );
        map.insert(
            "connectivity.isolated_nodes".to_string(),
            self.connectivity.isolated_nodes as f64,
        );
        map.insert(
            "connectivity.disconnected_pct".to_string(),
            self.connectivity.disconnected_pct,
        );

        map.insert("has_cycle".to_string(), if self.has_cycle { 1.0 } else { 0.0 });
        map
    }
}

/// Collect statistics for a graph. Edges pointing at unknown nodes are
/// counted in the totals but ignored by the degree and connectivity passes.
pub fn collect_graph_stats(graph: &Graph) -> GraphStats {
    let mut node_types = BTreeMap::new();
    let mut team_nodes = BTreeMap::new();
    let mut data_source_nodes = BTreeMap::new();
    let mut platform_nodes = BTreeMap::new();
    let mut usage = UsageRanges::default();
    let mut orphaned_nodes = 0usize;
    let mut subgraph_nodes = 0usize;

    let mut position: HashMap<NodeId, usize> = HashMap::with_capacity(graph.nodes.len());
    for (index, node) in graph.nodes.iter().enumerate() {
        position.insert(node.id, index);
        *node_types.entry(node.asset_type.to_string()).or_insert(0) += 1;
        *team_nodes.entry(node.team.clone()).or_insert(0) += 1;
        *data_source_nodes
            .entry(node.source_kind.to_string())
            .or_insert(0) += 1;
        if let Some(platform) = node
            .properties
            .get("data_source")
            .and_then(|value| value.as_str())
        {
            *platform_nodes.entry(platform.to_string()).or_insert(0) += 1;
        }
        if flag(node, "orphaned") {
            orphaned_nodes += 1;
        }
        if flag(node, "disconnected_subgraph") {
            subgraph_nodes += 1;
        }

        match node.properties.get("usage_score").and_then(|value| value.as_i64()) {
            Some(score) if score >= 70 => usage.heavy += 1,
            Some(score) if score >= 40 => usage.moderate += 1,
            Some(score) if score >= 1 => usage.light += 1,
            _ => usage.unused += 1,
        }
    }

    let mut edge_types = BTreeMap::new();
    let mut field_level_edges = 0usize;
    let mut in_degree = vec![0usize; graph.nodes.len()];
    let mut out_degree = vec![0usize; graph.nodes.len()];
    let mut components = DisjointSet::new(graph.nodes.len());

    for edge in &graph.edges {
        *edge_types
            .entry(edge.relationship_type.to_string())
            .or_insert(0) += 1;
        let (Some(&source), Some(&target)) =
            (position.get(&edge.source_id), position.get(&edge.target_id))
        else {
            continue;
        };
        if graph.nodes[source].asset_type.is_field_level()
            && graph.nodes[target].asset_type.is_field_level()
        {
            field_level_edges += 1;
        }
        out_degree[source] += 1;
        in_degree[target] += 1;
        components.union(source, target);
    }

    GraphStats {
        format_version: GRAPH_FORMAT_VERSION.to_string(),
        seed: graph.seed,
        total_nodes: graph.nodes.len(),
        total_edges: graph.edges.len(),
        field_level_edges,
        node_types,
        edge_types,
        team_nodes,
        data_source_nodes,
        platform_nodes,
        orphaned_nodes,
        subgraph_nodes,
        usage,
        degree: degree_stats(&in_degree, &out_degree),
        connectivity: connectivity_stats(&mut components, &in_degree, &out_degree),
        has_cycle: build_lineage_order_report(graph).cycle.is_some(),
    }
}

fn flag(node: &lineagen_core::Node, key: &str) -> bool {
    node.properties
        .get(key)
        .and_then(|value| value.as_bool())
        .unwrap_or(false)
}

fn degree_stats(in_degree: &[usize], out_degree: &[usize]) -> DegreeStats {
    if in_degree.is_empty() {
        return DegreeStats::default();
    }
    let totals: Vec<usize> = in_degree
        .iter()
        .zip(out_degree)
        .map(|(inbound, outbound)| inbound + outbound)
        .collect();
    DegreeStats {
        max_in: in_degree.iter().copied().max().unwrap_or(0),
        max_out: out_degree.iter().copied().max().unwrap_or(0),
        max_total: totals.iter().copied().max().unwrap_or(0),
        min_total: totals.iter().copied().min().unwrap_or(0),
        mean_total: totals.iter().sum::<usize>() as f64 / totals.len() as f64,
    }
}

fn connectivity_stats(
    components: &mut DisjointSet,
    in_degree: &[usize],
    out_degree: &[usize],
) -> ConnectivityStats {
    let total = in_degree.len();
    if total == 0 {
        return ConnectivityStats::default();
    }

    let mut sizes: HashMap<usize, usize> = HashMap::new();
    for node in 0..total {
        *sizes.entry(components.find(node)).or_insert(0) += 1;
    }
    let largest_component = sizes.values().copied().max().unwrap_or(0);
    let isolated_nodes = in_degree
        .iter()
        .zip(out_degree)
        .filter(|(inbound, outbound)| **inbound == 0 && **outbound == 0)
        .count();

    ConnectivityStats {
        components: sizes.len(),
        largest_component,
        isolated_nodes,
        disconnected_pct: 100.0 - largest_component as f64 * 100.0 / total as f64,
    }
}

/// Union-find over node positions with path halving and union by size.
struct DisjointSet {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl DisjointSet {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
            size: vec![1; len],
        }
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    fn union(&mut self, a: usize, b: usize) {
        let (mut a, mut b) = (self.find(a), self.find(b));
        if a == b {
            return;
        }
        if self.size[a] < self.size[b] {
            std::mem::swap(&mut a, &mut b);
        }
        self.parent[b] = a;
        self.size[a] += self.size[b];
    }
}
