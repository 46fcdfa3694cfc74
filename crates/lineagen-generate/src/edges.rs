//! Constrained edge synthesis.
//!
//! Nodes are bucketed by asset type (and by asset type + team) once, and the
//! taxonomy is reduced to the ordered pairs that are both compatible and
//! populated. A draw then costs a weighted pair pick plus two bucket picks,
//! so synthesis is linear in the edge target rather than quadratic in the
//! node count.

use std::collections::{HashMap, HashSet};

use rand::Rng;
use rayon::prelude::*;
use tracing::{debug, warn};

use lineagen_core::{AssetType, Edge, EdgeKey, Node, NodeId, Properties, RelationshipType, Taxonomy};

use crate::config::ResolvedConfig;
use crate::errors::GenerationError;
use crate::sampling::{WeightedTable, split_evenly, stream_rng};

/// Knobs for a synthesis pass.
#[derive(Debug, Clone, Copy)]
pub struct EdgeSettings {
    pub field_fraction: f64,
    pub intra_team_bias: f64,
    pub max_attempts: u32,
    pub shards: usize,
}

/// Nodes grouped for O(1) "pick a node of type T" lookups.
#[derive(Debug, Default)]
pub struct NodeIndex {
    by_type: HashMap<AssetType, Vec<NodeId>>,
    by_type_team: HashMap<(AssetType, usize), Vec<NodeId>>,
    team_of: HashMap<NodeId, usize>,
}

impl NodeIndex {
    /// Index the nodes accepted by `eligible`; `team_index` maps team ids to
    /// dense indices.
    pub fn build(
        nodes: &[Node],
        team_index: &HashMap<String, usize>,
        eligible: impl Fn(&Node) -> bool,
    ) -> Self {
        let mut index = Self::default();
        for node in nodes.iter().filter(|node| eligible(node)) {
            let team = team_index.get(&node.team).copied().unwrap_or(0);
            index.by_type.entry(node.asset_type).or_default().push(node.id);
            index
                .by_type_team
                .entry((node.asset_type, team))
                .or_default()
                .push(node.id);
            index.team_of.insert(node.id, team);
        }
        index
    }

    pub fn count(&self, asset: AssetType) -> usize {
        self.by_type.get(&asset).map_or(0, Vec::len)
    }

    pub fn len(&self) -> usize {
        self.team_of.len()
    }

    pub fn is_empty(&self) -> bool {
        self.team_of.is_empty()
    }

    fn pick(&self, asset: AssetType, rng: &mut impl Rng) -> Option<NodeId> {
        pick_from(self.by_type.get(&asset)?, rng)
    }

    fn pick_in_team(&self, asset: AssetType, team: usize, rng: &mut impl Rng) -> Option<NodeId> {
        pick_from(self.by_type_team.get(&(asset, team))?, rng)
    }

    fn team_of(&self, node: NodeId) -> usize {
        self.team_of.get(&node).copied().unwrap_or(0)
    }
}

fn pick_from(bucket: &[NodeId], rng: &mut impl Rng) -> Option<NodeId> {
    if bucket.is_empty() {
        None
    } else {
        Some(bucket[rng.random_range(0..bucket.len())])
    }
}

#[derive(Debug, Clone)]
struct PairPlan {
    source: AssetType,
    target: AssetType,
    relationships: Vec<RelationshipType>,
    field_level: bool,
}

#[derive(Debug, Clone, Copy)]
struct EdgeDraft {
    source: NodeId,
    target: NodeId,
    relationship: RelationshipType,
    field_level: bool,
}

/// Counters reported by a synthesis pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SynthesisOutcome {
    pub requested: usize,
    pub produced: usize,
    pub field_level: usize,
    /// Draws abandoned after exhausting their attempts.
    pub skipped_draws: usize,
    /// Cross-shard duplicates removed during the merge.
    pub merged_duplicates: usize,
}

/// Produces taxonomy-valid, duplicate-free edges over an indexed population.
pub struct EdgeSynthesizer<'a> {
    index: &'a NodeIndex,
    pairs: Vec<PairPlan>,
    all_pairs: Option<WeightedTable<usize>>,
    field_pairs: Option<WeightedTable<usize>>,
    settings: EdgeSettings,
}

impl<'a> EdgeSynthesizer<'a> {
    pub fn new(
        resolved: &ResolvedConfig,
        index: &'a NodeIndex,
        settings: EdgeSettings,
    ) -> Result<Self, GenerationError> {
        let pairs = viable_pairs(&resolved.taxonomy, index);
        let weighted = |filter: &dyn Fn(&PairPlan) -> bool, ctx: &str| {
            let entries: Vec<(usize, f64)> = pairs
                .iter()
                .enumerate()
                .filter(|(_, pair)| filter(*pair))
                .map(|(idx, pair)| (idx, resolved.pair_weight(pair.source, pair.target)))
                .collect();
            if entries.is_empty() {
                Ok(None)
            } else {
                WeightedTable::new(entries, ctx).map(Some)
            }
        };

        let all_pairs = weighted(&|_: &PairPlan| true, "compatible pairs")?;
        let field_pairs = weighted(&|pair: &PairPlan| pair.field_level, "field-level pairs")?;

        Ok(Self {
            index,
            pairs,
            all_pairs,
            field_pairs,
            settings,
        })
    }

    /// Number of compatible pairs with populated buckets.
    pub fn viable_pair_count(&self) -> usize {
        self.pairs.len()
    }

    /// Synthesize up to `target` edges with ids starting at `first_id`.
    ///
    /// A draw that keeps hitting self-loops or duplicates is skipped after
    /// `max_attempts`, so the result never exceeds `target` and the pass
    /// always terminates.
    pub fn synthesize(
        &self,
        target: usize,
        seed: u64,
        first_id: u64,
        nodes: &[Node],
    ) -> (Vec<Edge>, SynthesisOutcome) {
        let mut outcome = SynthesisOutcome {
            requested: target,
            ..SynthesisOutcome::default()
        };
        let Some(all_pairs) = &self.all_pairs else {
            if target > 0 {
                warn!(edge_target = target, "no compatible pairs available; no edges synthesized");
            }
            outcome.skipped_draws = target;
            return (Vec::new(), outcome);
        };

        let field_target = match &self.field_pairs {
            Some(_) => (target as f64 * self.settings.field_fraction).round() as usize,
            None => {
                if self.settings.field_fraction > 0.0 && target > 0 {
                    warn!("no field-level pairs available; field share folded into general draws");
                }
                0
            }
        }
        .min(target);
        let general_target = target - field_target;

        let shards = self.settings.shards.max(1);
        let field_shares = split_evenly(field_target, shards);
        let general_shares = split_evenly(general_target, shards);
        let work: Vec<(usize, usize, usize)> = (0..shards)
            .map(|shard| (shard, field_shares[shard], general_shares[shard]))
            .filter(|(_, field, general)| field + general > 0)
            .collect();

        let run_shard = |(shard, field, general): (usize, usize, usize)| {
            let mut rng = stream_rng(seed, &format!("edges/{shard}"));
            let mut used = HashSet::with_capacity(field + general);
            let mut drafts = Vec::with_capacity(field + general);
            let mut skipped = 0usize;
            let plan = self
                .field_pairs
                .iter()
                .map(|table| (table, field))
                .chain(std::iter::once((all_pairs, general)));
            for (table, draws) in plan {
                for _ in 0..draws {
                    match self.draw(table, &mut used, &mut rng) {
                        Some(draft) => drafts.push(draft),
                        None => skipped += 1,
                    }
                }
            }
            debug!(shard, produced = drafts.len(), skipped, "edge shard finished");
            (drafts, skipped)
        };

        let shard_results: Vec<(Vec<EdgeDraft>, usize)> = if work.len() > 1 {
            work.into_par_iter().map(run_shard).collect()
        } else {
            work.into_iter().map(run_shard).collect()
        };

        let mut seen: HashSet<EdgeKey> = HashSet::with_capacity(target);
        let mut edges = Vec::with_capacity(target);
        for (drafts, skipped) in shard_results {
            outcome.skipped_draws += skipped;
            for draft in drafts {
                if !seen.insert((draft.source, draft.target, draft.relationship)) {
                    outcome.merged_duplicates += 1;
                    continue;
                }
                if draft.field_level {
                    outcome.field_level += 1;
                }
                let id = first_id + edges.len() as u64;
                edges.push(build_edge(id, draft, nodes));
            }
        }

        outcome.produced = edges.len();
        (edges, outcome)
    }

    fn draw(
        &self,
        table: &WeightedTable<usize>,
        used: &mut HashSet<EdgeKey>,
        rng: &mut impl Rng,
    ) -> Option<EdgeDraft> {
        for _ in 0..self.settings.max_attempts {
            let pair = &self.pairs[table.sample(rng)];
            let Some(source) = self.index.pick(pair.source, rng) else {
                continue;
            };
            let same_team = self.settings.intra_team_bias > 0.0
                && rng.random_bool(self.settings.intra_team_bias);
            let target = if same_team {
                self.index
                    .pick_in_team(pair.target, self.index.team_of(source), rng)
                    .or_else(|| self.index.pick(pair.target, rng))
            } else {
                self.index.pick(pair.target, rng)
            };
            let Some(target) = target else {
                continue;
            };
            if source == target {
                continue;
            }
            let relationship = pair.relationships[rng.random_range(0..pair.relationships.len())];
            if used.insert((source, target, relationship)) {
                return Some(EdgeDraft {
                    source,
                    target,
                    relationship,
                    field_level: pair.field_level,
                });
            }
        }
        None
    }
}

fn viable_pairs(taxonomy: &Taxonomy, index: &NodeIndex) -> Vec<PairPlan> {
    taxonomy
        .compatible_pairs()
        .filter(|(source, target, _)| {
            let sources = index.count(*source);
            let targets = index.count(*target);
            if source == target {
                sources >= 2
            } else {
                sources > 0 && targets > 0
            }
        })
        .map(|(source, target, relationships)| PairPlan {
            source,
            target,
            relationships: relationships.to_vec(),
            field_level: source.is_field_level() && target.is_field_level(),
        })
        .collect()
}

fn build_edge(id: u64, draft: EdgeDraft, nodes: &[Node]) -> Edge {
    let team = |node: NodeId| nodes.get(node as usize).map(|node| node.team.as_str());
    Edge {
        id,
        source_id: draft.source,
        target_id: draft.target,
        relationship_type: draft.relationship,
        properties: lineage_properties(draft.field_level, team(draft.source) != team(draft.target)),
    }
}

/// `lineage_level` and `cross_team` properties shared by every edge.
pub fn lineage_properties(field_level: bool, cross_team: bool) -> Properties {
    let mut properties = Properties::new();
    properties.insert(
        "lineage_level".to_string(),
        if field_level { "field" } else { "asset" }.into(),
    );
    properties.insert("cross_team".to_string(), cross_team.into());
    properties
}
