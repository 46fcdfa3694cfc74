//! Core contracts for lineagen.
//!
//! This crate defines the type taxonomy, the constraint tables that decide
//! which assets and relationships may exist, and the graph data model shared
//! by the synthesis engine, the statistics pass and the CLI.

pub mod error;
pub mod graph;
pub mod model;
pub mod taxonomy;

pub use error::{Error, Result};
pub use graph::{
    LineageGraphSummary, LineageOrderReport, build_adjacency, build_lineage_order_report,
};
pub use model::{
    Edge, EdgeId, EdgeKey, Graph, GraphViolation, Node, NodeId, Properties, PropertyKind,
    PropertyValue, Team,
};
pub use taxonomy::{
    AssetType, DataSourceKind, Platform, RelationshipRule, RelationshipType, Taxonomy,
    TaxonomySpec,
};

/// Current contract version for exported graph documents.
pub const GRAPH_FORMAT_VERSION: &str = "0.1";

/// JSON Schema of the serialized [`Graph`] document.
pub fn graph_json_schema() -> schemars::schema::RootSchema {
    schemars::schema_for!(Graph)
}
