//! Structural statistics for generated lineage graphs.

pub mod graph_metrics;

pub use graph_metrics::{
    ConnectivityStats, DegreeStats, GraphStats, UsageRanges, collect_graph_stats,
};
