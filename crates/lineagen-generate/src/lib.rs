//! Constrained synthesis engine for lineagen.
//!
//! Builds a team pool, a taxonomy-valid node population and a duplicate-free
//! edge set from a single seed, then exports the result as JSON, GEXF or
//! GraphML.

pub mod config;
pub mod edges;
pub mod engine;
pub mod errors;
pub mod nodes;
pub mod output;
pub mod sampling;
pub mod subgraphs;
pub mod teams;

pub use config::{GeneratorConfig, PairWeight, ResolvedConfig, SourceWeight, TeamAssignment};
pub use edges::{EdgeSettings, EdgeSynthesizer, NodeIndex, SynthesisOutcome};
pub use engine::LineageGenerator;
pub use errors::GenerationError;
pub use nodes::NodeFactory;
pub use output::json::read_graph_json;
pub use output::{ExportFormat, SavedGraph};
pub use sampling::WeightedTable;
pub use teams::TeamRegistry;
