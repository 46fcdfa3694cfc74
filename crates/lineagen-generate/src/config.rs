use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use lineagen_core::{AssetType, DataSourceKind, Taxonomy, TaxonomySpec};

use crate::errors::GenerationError;
use crate::sampling::WeightedTable;

/// How nodes are stamped with an owning team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamAssignment {
    /// `node_index % num_teams`.
    #[default]
    RoundRobin,
    /// Each team gets a random weight at construction; the first
    /// `num_teams` nodes still cover every team once.
    Weighted,
}

/// Relative frequency of a data-source kind in the node population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SourceWeight {
    pub kind: DataSourceKind,
    pub weight: f64,
}

/// Relative frequency of an ordered asset-type pair among edge draws.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PairWeight {
    pub source: AssetType,
    pub target: AssetType,
    pub weight: f64,
}

/// Constructor configuration for [`crate::LineageGenerator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Lower bound on the generated node count.
    pub min_nodes: usize,
    /// Target edges ≈ `edge_multiplier × node_count`.
    pub edge_multiplier: f64,
    /// Size of the team pool.
    pub num_teams: usize,
    /// Directory used by `save_graph`.
    pub output_dir: PathBuf,
    /// Fixed seed for reproducible output.
    pub seed: Option<u64>,
    /// Share of the edge target reserved for field-level lineage.
    pub field_lineage_fraction: f64,
    /// Probability that an edge target is drawn from the source's team.
    pub intra_team_bias: f64,
    /// Sampling attempts per edge draw before the draw is skipped.
    pub max_attempts_edge: u32,
    /// Independent workers for node and edge synthesis.
    pub shards: usize,
    /// Share of main nodes kept out of edge sampling.
    pub orphaned_node_percent: f64,
    /// Number of isolated clusters added next to the main graph.
    pub disconnected_subgraphs: usize,
    pub team_assignment: TeamAssignment,
    pub source_weights: Vec<SourceWeight>,
    pub pair_weights: Vec<PairWeight>,
    /// Replaces the built-in taxonomy when present.
    pub taxonomy: Option<TaxonomySpec>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            min_nodes: 100_000,
            edge_multiplier: 5.0,
            num_teams: 10,
            output_dir: PathBuf::from("output"),
            seed: None,
            field_lineage_fraction: 0.25,
            intra_team_bias: 0.6,
            max_attempts_edge: 8,
            shards: 1,
            orphaned_node_percent: 0.0,
            disconnected_subgraphs: 0,
            team_assignment: TeamAssignment::RoundRobin,
            source_weights: default_source_weights(),
            pair_weights: default_pair_weights(),
            taxonomy: None,
        }
    }
}

impl GeneratorConfig {
    pub fn new(min_nodes: usize, edge_multiplier: f64, num_teams: usize) -> Self {
        Self {
            min_nodes,
            edge_multiplier,
            num_teams,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Check every parameter and resolve the taxonomy and weight tables.
    pub fn resolve(&self) -> Result<ResolvedConfig, GenerationError> {
        if self.min_nodes == 0 {
            return Err(invalid("min_nodes must be > 0"));
        }
        if !self.edge_multiplier.is_finite() || self.edge_multiplier <= 0.0 {
            return Err(invalid("edge_multiplier must be a finite number > 0"));
        }
        if self.num_teams == 0 {
            return Err(invalid("num_teams must be > 0"));
        }
        if !unit_interval(self.field_lineage_fraction) {
            return Err(invalid("field_lineage_fraction must be within [0, 1]"));
        }
        if !unit_interval(self.intra_team_bias) {
            return Err(invalid("intra_team_bias must be within [0, 1]"));
        }
        if !unit_interval(self.orphaned_node_percent) || self.orphaned_node_percent >= 1.0 {
            return Err(invalid("orphaned_node_percent must be within [0, 1)"));
        }
        if self.max_attempts_edge == 0 {
            return Err(invalid("max_attempts_edge must be > 0"));
        }
        if self.shards == 0 {
            return Err(invalid("shards must be > 0"));
        }

        let taxonomy = match &self.taxonomy {
            Some(spec) => Taxonomy::from_spec(spec)?,
            None => Taxonomy::builtin(),
        };

        for entry in &self.source_weights {
            taxonomy.allowed_asset_types(entry.kind)?;
        }
        let sources = WeightedTable::new(
            self.source_weights
                .iter()
                .map(|entry| (entry.kind, entry.weight)),
            "source_weights",
        )?;

        for entry in &self.pair_weights {
            if !entry.weight.is_finite() || entry.weight <= 0.0 {
                return Err(invalid(&format!(
                    "pair weight {} -> {} must be finite and > 0",
                    entry.source, entry.target
                )));
            }
            if taxonomy
                .allowed_relationships(entry.source, entry.target)
                .is_empty()
            {
                return Err(invalid(&format!(
                    "pair weight {} -> {} names an incompatible pair",
                    entry.source, entry.target
                )));
            }
        }

        let pair_total: f64 = taxonomy
            .compatible_pairs()
            .map(|(source, target, _)| {
                self.pair_weights
                    .iter()
                    .find(|entry| entry.source == source && entry.target == target)
                    .map_or(1.0, |entry| entry.weight)
            })
            .sum();
        if !pair_total.is_finite() {
            return Err(invalid("pair_weights: total weight overflows"));
        }

        Ok(ResolvedConfig {
            taxonomy,
            sources,
            pair_weights: self.pair_weights.clone(),
        })
    }
}

/// Validated configuration artifacts shared by the synthesis phases.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub taxonomy: Taxonomy,
    pub sources: WeightedTable<DataSourceKind>,
    pub pair_weights: Vec<PairWeight>,
}

impl ResolvedConfig {
    /// Configured weight of a compatible pair; 1.0 when not listed.
    pub fn pair_weight(&self, source: AssetType, target: AssetType) -> f64 {
        self.pair_weights
            .iter()
            .find(|entry| entry.source == source && entry.target == target)
            .map(|entry| entry.weight)
            .unwrap_or(1.0)
    }
}

/// Kind weights proportional to the number of platforms per kind.
pub fn default_source_weights() -> Vec<SourceWeight> {
    DataSourceKind::ALL
        .into_iter()
        .map(|kind| SourceWeight {
            kind,
            weight: kind.platforms().count().max(1) as f64,
        })
        .collect()
}

/// Pairs seen most often in real lineage get a heavier share of draws.
pub fn default_pair_weights() -> Vec<PairWeight> {
    use AssetType as A;
    [
        (A::Table, A::Column, 4.0),
        (A::Column, A::Column, 3.0),
        (A::Table, A::View, 3.0),
        (A::Model, A::Report, 3.0),
        (A::Table, A::Model, 2.0),
        (A::Model, A::Model, 2.0),
        (A::Model, A::Column, 2.0),
        (A::Job, A::Table, 2.0),
        (A::Dashboard, A::Report, 2.0),
        (A::Report, A::Metric, 2.0),
    ]
    .into_iter()
    .map(|(source, target, weight)| PairWeight {
        source,
        target,
        weight,
    })
    .collect()
}

fn unit_interval(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

fn invalid(message: &str) -> GenerationError {
    GenerationError::Configuration(message.to_string())
}
