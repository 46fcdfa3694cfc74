use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::taxonomy::{AssetType, DataSourceKind, RelationshipType, Taxonomy};

/// Dense node identifier; equals the node's index in [`Graph::nodes`].
pub type NodeId = u64;
/// Dense edge identifier; equals the edge's index in [`Graph::edges`].
pub type EdgeId = u64;

/// Closed set of scalar values carried in property maps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

/// Value kind of a [`PropertyValue`], used when declaring export attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyKind {
    Text,
    Int,
    Float,
    Bool,
    Timestamp,
}

impl PropertyValue {
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::Text(_) => PropertyKind::Text,
            PropertyValue::Int(_) => PropertyKind::Int,
            PropertyValue::Float(_) => PropertyKind::Float,
            PropertyValue::Bool(_) => PropertyKind::Bool,
            PropertyValue::Timestamp(_) => PropertyKind::Timestamp,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Int(value) => Some(*value as f64),
            PropertyValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Plain-text rendering used by attribute-based formats.
    pub fn render(&self) -> String {
        match self {
            PropertyValue::Text(value) => value.clone(),
            PropertyValue::Int(value) => value.to_string(),
            PropertyValue::Float(value) => value.to_string(),
            PropertyValue::Bool(value) => value.to_string(),
            PropertyValue::Timestamp(value) => value.to_rfc3339(),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Float(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(value: DateTime<Utc>) -> Self {
        PropertyValue::Timestamp(value)
    }
}

/// Open property mapping with deterministic key order.
pub type Properties = BTreeMap<String, PropertyValue>;

/// Owning team. Outlives every node that references it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub department: String,
}

/// A lineage asset. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub source_kind: DataSourceKind,
    pub asset_type: AssetType,
    /// Id of the owning [`Team`].
    pub team: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub properties: Properties,
}

/// Identity of an edge for duplicate detection.
pub type EdgeKey = (NodeId, NodeId, RelationshipType);

/// A directed lineage relationship: `target` derives from `source`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Edge {
    pub id: EdgeId,
    pub source_id: NodeId,
    pub target_id: NodeId,
    pub relationship_type: RelationshipType,
    #[serde(default)]
    pub properties: Properties,
}

impl Edge {
    pub fn key(&self) -> EdgeKey {
        (self.source_id, self.target_id, self.relationship_type)
    }
}

/// Finished lineage graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Graph {
    /// Seed of the random stream that produced this graph.
    pub seed: u64,
    pub generated_at: DateTime<Utc>,
    pub teams: Vec<Team>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Structural problem found by [`Graph::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphViolation {
    pub code: String,
    pub path: String,
    pub message: String,
}

impl GraphViolation {
    fn new(code: &str, path: String, message: String) -> Self {
        Self {
            code: code.to_string(),
            path,
            message,
        }
    }
}

impl Graph {
    pub fn empty(seed: u64, generated_at: DateTime<Utc>) -> Self {
        Self {
            seed,
            generated_at,
            teams: Vec::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        let node = self.nodes.get(usize::try_from(id).ok()?)?;
        (node.id == id).then_some(node)
    }

    pub fn team(&self, id: &str) -> Option<&Team> {
        self.teams.iter().find(|team| team.id == id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Re-check every structural invariant against `taxonomy`.
    pub fn validate(&self, taxonomy: &Taxonomy) -> Vec<GraphViolation> {
        let mut violations = Vec::new();
        let team_ids: HashSet<&str> = self.teams.iter().map(|team| team.id.as_str()).collect();
        let mut names: HashMap<(DataSourceKind, AssetType, &str), NodeId> = HashMap::new();

        for (index, node) in self.nodes.iter().enumerate() {
            let path = format!("/nodes/{index}");
            if node.id != index as NodeId {
                violations.push(GraphViolation::new(
                    "node_id_mismatch",
                    path.clone(),
                    format!("node id {} stored at index {index}", node.id),
                ));
            }
            if !taxonomy.is_valid_asset(node.source_kind, node.asset_type) {
                violations.push(GraphViolation::new(
                    "asset_not_allowed",
                    path.clone(),
                    format!(
                        "asset type '{}' is not allowed for data source kind '{}'",
                        node.asset_type, node.source_kind
                    ),
                ));
            }
            if !team_ids.contains(node.team.as_str()) {
                violations.push(GraphViolation::new(
                    "unknown_team",
                    path.clone(),
                    format!("node references unknown team '{}'", node.team),
                ));
            }
            if let Some(previous) =
                names.insert((node.source_kind, node.asset_type, node.name.as_str()), node.id)
            {
                violations.push(GraphViolation::new(
                    "duplicate_name",
                    path,
                    format!("name '{}' already used by node {previous}", node.name),
                ));
            }
        }

        let mut keys = HashSet::with_capacity(self.edges.len());
        for (index, edge) in self.edges.iter().enumerate() {
            let path = format!("/edges/{index}");
            if edge.id != index as EdgeId {
                violations.push(GraphViolation::new(
                    "edge_id_mismatch",
                    path.clone(),
                    format!("edge id {} stored at index {index}", edge.id),
                ));
            }
            if edge.source_id == edge.target_id {
                violations.push(GraphViolation::new(
                    "self_loop",
                    path.clone(),
                    format!("edge connects node {} to itself", edge.source_id),
                ));
            }
            match (self.node(edge.source_id), self.node(edge.target_id)) {
                (Some(source), Some(target)) => {
                    if !taxonomy.is_valid_relationship(
                        source.asset_type,
                        target.asset_type,
                        edge.relationship_type,
                    ) {
                        violations.push(GraphViolation::new(
                            "relationship_not_allowed",
                            path.clone(),
                            format!(
                                "'{}' is not allowed from {} to {}",
                                edge.relationship_type, source.asset_type, target.asset_type
                            ),
                        ));
                    }
                }
                _ => violations.push(GraphViolation::new(
                    "dangling_edge",
                    path.clone(),
                    format!(
                        "edge references missing node ({} -> {})",
                        edge.source_id, edge.target_id
                    ),
                )),
            }
            if !keys.insert(edge.key()) {
                violations.push(GraphViolation::new(
                    "duplicate_edge",
                    path,
                    format!(
                        "edge {} -> {} ({}) repeats",
                        edge.source_id, edge.target_id, edge.relationship_type
                    ),
                ));
            }
        }

        violations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn node(id: NodeId, kind: DataSourceKind, asset: AssetType, name: &str) -> Node {
        Node {
            id,
            name: name.to_string(),
            source_kind: kind,
            asset_type: asset,
            team: "team_0".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            properties: Properties::new(),
        }
    }

    fn graph() -> Graph {
        let mut graph = Graph::empty(7, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        graph.teams.push(Team {
            id: "team_0".to_string(),
            name: "Team 0".to_string(),
            department: "Analytics".to_string(),
        });
        graph.nodes.push(node(0, DataSourceKind::Warehouse, AssetType::Table, "table_1"));
        graph.nodes.push(node(1, DataSourceKind::Warehouse, AssetType::Column, "column_1"));
        graph.edges.push(Edge {
            id: 0,
            source_id: 0,
            target_id: 1,
            relationship_type: RelationshipType::ParentChild,
            properties: Properties::new(),
        });
        graph
    }

    #[test]
    fn valid_graph_has_no_violations() {
        assert!(graph().validate(&Taxonomy::builtin()).is_empty());
    }

    #[test]
    fn validate_reports_structural_defects() {
        let mut graph = graph();
        graph.nodes[1].asset_type = AssetType::Dashboard;
        graph.edges.push(Edge {
            id: 1,
            source_id: 0,
            target_id: 0,
            relationship_type: RelationshipType::Joins,
            properties: Properties::new(),
        });
        graph.edges.push(graph.edges[0].clone());
        graph.edges[2].id = 2;

        let codes: Vec<String> = graph
            .validate(&Taxonomy::builtin())
            .into_iter()
            .map(|violation| violation.code)
            .collect();
        assert!(codes.contains(&"asset_not_allowed".to_string()));
        assert!(codes.contains(&"self_loop".to_string()));
        assert!(codes.contains(&"relationship_not_allowed".to_string()));
        assert!(codes.contains(&"duplicate_edge".to_string()));
    }

    #[test]
    fn node_lookup_uses_dense_ids() {
        let graph = graph();
        assert_eq!(graph.node(1).map(|node| node.name.as_str()), Some("column_1"));
        assert!(graph.node(5).is_none());
        assert_eq!(graph.team("team_0").map(|team| team.name.as_str()), Some("Team 0"));
    }

    #[test]
    fn property_values_render_plainly() {
        assert_eq!(PropertyValue::from(42_i64).render(), "42");
        assert_eq!(PropertyValue::from(true).render(), "true");
        assert_eq!(PropertyValue::from("x").as_str(), Some("x"));
        assert_eq!(PropertyValue::from(2_i64).as_f64(), Some(2.0));
    }
}
