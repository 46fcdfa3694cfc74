use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, TimeZone, Utc};
use rand::Rng;
use tracing::{info, warn};

use lineagen_core::{Graph, NodeId, PropertyValue, Taxonomy};
use lineagen_eval::{GraphStats, collect_graph_stats};

use crate::config::{GeneratorConfig, ResolvedConfig};
use crate::edges::{EdgeSettings, EdgeSynthesizer, NodeIndex};
use crate::errors::GenerationError;
use crate::nodes::{NodeFactory, assign_usage_scores};
use crate::output::gexf::write_graph_gexf;
use crate::output::graphml::write_graph_graphml;
use crate::output::json::write_graph_json;
use crate::output::{ExportFormat, SavedGraph, export_file_name};
use crate::sampling::stream_rng;
use crate::subgraphs::build_clusters;
use crate::teams::TeamRegistry;

/// Share of the edge target that may be missed before a warning is logged.
const EDGE_TOLERANCE: f64 = 0.05;
/// Smallest cluster size; bounds the cluster edge budget from below.
const MIN_CLUSTER_NODES: usize = 5;

/// Entry point for synthesizing lineage graphs.
#[derive(Debug, Clone)]
pub struct LineageGenerator {
    config: GeneratorConfig,
    resolved: ResolvedConfig,
    graph: Option<Graph>,
}

impl LineageGenerator {
    /// Validate `config` up front; nothing is generated yet.
    pub fn new(config: GeneratorConfig) -> Result<Self, GenerationError> {
        let resolved = config.resolve()?;
        Ok(Self {
            config,
            resolved,
            graph: None,
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.resolved.taxonomy
    }

    /// The most recently generated graph.
    pub fn graph(&self) -> Option<&Graph> {
        self.graph.as_ref()
    }

    /// Generate a fresh graph, replacing any previous one.
    pub fn generate_graph(&mut self) -> Result<&Graph, GenerationError> {
        let start = Instant::now();
        let config = &self.config;
        let seed = config.seed.unwrap_or_else(|| rand::rng().random());
        let generated_at = Utc::now();
        let anchor = if config.seed.is_some() {
            base_anchor()?
        } else {
            generated_at
        };

        info!(
            seed,
            min_nodes = config.min_nodes,
            edge_multiplier = config.edge_multiplier,
            num_teams = config.num_teams,
            shards = config.shards,
            "generation started"
        );

        let teams = TeamRegistry::create(
            config.num_teams,
            config.team_assignment,
            &mut stream_rng(seed, "teams"),
        )?;

        let mut nodes = NodeFactory::new(
            &self.resolved.taxonomy,
            &self.resolved.sources,
            &teams,
            anchor,
        )
        .produce(config.min_nodes, seed, config.shards)?;
        info!(nodes = nodes.len(), teams = teams.len(), "nodes generated");

        let main_nodes = nodes.len();
        let cluster_budget = round_target(
            config.edge_multiplier,
            main_nodes + config.disconnected_subgraphs * MIN_CLUSTER_NODES,
        );
        let clusters = build_clusters(
            config.disconnected_subgraphs,
            main_nodes as NodeId,
            &self.resolved.taxonomy,
            &teams,
            anchor,
            cluster_budget,
            &mut stream_rng(seed, "subgraphs"),
        );
        if config.disconnected_subgraphs > 0 {
            info!(
                requested = config.disconnected_subgraphs,
                built = clusters.built,
                nodes = clusters.nodes.len(),
                edges = clusters.edges.len(),
                "disconnected subgraphs built"
            );
        }
        if clusters.built < config.disconnected_subgraphs {
            warn!(
                requested = config.disconnected_subgraphs,
                built = clusters.built,
                "taxonomy cannot host every requested subgraph"
            );
        }

        let orphans = pick_orphans(main_nodes, config.orphaned_node_percent, seed);
        for index in &orphans {
            nodes[*index]
                .properties
                .insert("orphaned".to_string(), PropertyValue::Bool(true));
        }
        if !orphans.is_empty() {
            info!(orphans = orphans.len(), "orphaned nodes selected");
        }

        nodes.extend(clusters.nodes);
        assign_usage_scores(&mut nodes, &mut stream_rng(seed, "scores"));

        let target = round_target(config.edge_multiplier, nodes.len());
        let cluster_edges = clusters.edges.len().min(target);
        let team_index: HashMap<String, usize> = teams
            .teams()
            .iter()
            .enumerate()
            .map(|(index, team)| (team.id.clone(), index))
            .collect();
        let index = NodeIndex::build(&nodes, &team_index, |node| {
            (node.id as usize) < main_nodes && !orphans.contains(&(node.id as usize))
        });
        let synthesizer = EdgeSynthesizer::new(
            &self.resolved,
            &index,
            EdgeSettings {
                field_fraction: config.field_lineage_fraction,
                intra_team_bias: config.intra_team_bias,
                max_attempts: config.max_attempts_edge,
                shards: config.shards,
            },
        )?;
        let (mut edges, outcome) =
            synthesizer.synthesize(target - cluster_edges, seed, 0, &nodes);

        for mut edge in clusters.edges.into_iter().take(cluster_edges) {
            edge.id = edges.len() as u64;
            edges.push(edge);
        }

        let produced = edges.len();
        info!(
            edge_target = target,
            produced,
            field_level = outcome.field_level,
            skipped_draws = outcome.skipped_draws,
            merged_duplicates = outcome.merged_duplicates,
            viable_pairs = synthesizer.viable_pair_count(),
            "edges synthesized"
        );
        if (produced as f64) < target as f64 * (1.0 - EDGE_TOLERANCE) {
            warn!(
                edge_target = target,
                produced,
                "edge target missed by more than {}%",
                EDGE_TOLERANCE * 100.0
            );
        }

        let graph = Graph {
            seed,
            generated_at,
            teams: teams.teams().to_vec(),
            nodes,
            edges,
        };
        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            duration_ms = start.elapsed().as_millis() as u64,
            "generation completed"
        );

        let graph: &Graph = self.graph.insert(graph);
        Ok(graph)
    }

    /// Statistics for the current graph.
    pub fn get_graph_stats(&self) -> Result<GraphStats, GenerationError> {
        Ok(collect_graph_stats(self.require_graph()?))
    }

    /// Save the current graph under the configured output directory.
    ///
    /// The format is checked before the graph, so an unknown format fails with
    /// `UnsupportedFormat` even before generation.
    pub fn save_graph(&self, format: &str) -> Result<PathBuf, GenerationError> {
        let format: ExportFormat = format.parse()?;
        let saved = self.save_graph_to(&self.config.output_dir, format)?;
        Ok(saved.path)
    }

    /// Save the current graph into `dir`, creating it when missing.
    pub fn save_graph_to(
        &self,
        dir: &Path,
        format: ExportFormat,
    ) -> Result<SavedGraph, GenerationError> {
        let graph = self.require_graph()?;
        std::fs::create_dir_all(dir)?;
        let path = dir.join(export_file_name(format, Utc::now()));

        let start = Instant::now();
        let bytes_written = match format {
            ExportFormat::Json => write_graph_json(&path, graph)?,
            ExportFormat::Gexf => write_graph_gexf(&path, graph)?,
            ExportFormat::Graphml => write_graph_graphml(&path, graph)?,
        };
        info!(
            format = %format,
            path = %path.display(),
            bytes_written,
            duration_ms = start.elapsed().as_millis() as u64,
            "graph saved"
        );

        Ok(SavedGraph {
            path,
            format,
            bytes_written,
        })
    }

    fn require_graph(&self) -> Result<&Graph, GenerationError> {
        self.graph.as_ref().ok_or_else(|| {
            GenerationError::State("no graph generated yet; call generate_graph first".to_string())
        })
    }
}

fn base_anchor() -> Result<DateTime<Utc>, GenerationError> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| GenerationError::State("invalid base date".to_string()))
}

fn round_target(multiplier: f64, nodes: usize) -> usize {
    (multiplier * nodes as f64).round() as usize
}

/// Positions of the main nodes kept out of edge sampling.
fn pick_orphans(main_nodes: usize, percent: f64, seed: u64) -> HashSet<usize> {
    let count = ((main_nodes as f64 * percent) as usize).min(main_nodes);
    if count == 0 {
        return HashSet::new();
    }
    let mut rng = stream_rng(seed, "orphans");
    rand::seq::index::sample(&mut rng, main_nodes, count)
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orphan_count_follows_percent() {
        assert_eq!(pick_orphans(1_000, 0.1, 3).len(), 100);
        assert!(pick_orphans(1_000, 0.0, 3).is_empty());
        assert!(pick_orphans(1_000, 0.1, 3).iter().all(|index| *index < 1_000));
    }

    #[test]
    fn targets_round_to_nearest() {
        assert_eq!(round_target(2.0, 100), 200);
        assert_eq!(round_target(0.25, 10), 3);
        assert_eq!(round_target(1.5, 0), 0);
    }

    #[test]
    fn state_is_checked_before_saving() {
        let generator = LineageGenerator::new(GeneratorConfig::new(10, 1.0, 2)).unwrap();
        assert!(matches!(
            generator.get_graph_stats(),
            Err(GenerationError::State(_))
        ));
        assert!(matches!(
            generator.save_graph("json"),
            Err(GenerationError::State(_))
        ));
        assert!(matches!(
            generator.save_graph("xml"),
            Err(GenerationError::UnsupportedFormat(_))
        ));
    }
}
