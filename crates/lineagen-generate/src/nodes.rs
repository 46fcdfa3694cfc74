use std::collections::{BTreeMap, HashMap};
use std::ops::Range;

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use tracing::debug;

use lineagen_core::{AssetType, DataSourceKind, Node, NodeId, Platform, Properties, Taxonomy};

use crate::errors::GenerationError;
use crate::sampling::{WeightedTable, shard_ranges, stream_rng};
use crate::teams::TeamRegistry;

const FIELD_PREFIXES: &[&str] = &[
    "id", "name", "value", "count", "date", "timestamp", "amount", "price", "quantity", "status",
];
const FIELD_SUFFIXES: &[&str] = &[
    "", "_id", "_name", "_value", "_count", "_date", "_ts", "_amt", "_price", "_qty", "_status",
];
const DATA_TYPES: &[&str] = &[
    "INTEGER",
    "BIGINT",
    "FLOAT",
    "DOUBLE",
    "DECIMAL(10,2)",
    "VARCHAR(255)",
    "STRING",
    "TEXT",
    "CHAR(10)",
    "TIMESTAMP",
    "DATE",
    "DATETIME",
    "BOOLEAN",
];
const MAX_AGE_SECS: i64 = 365 * 24 * 60 * 60;

/// Per-(kind, type) monotonic counters used to build readable names.
#[derive(Debug, Default)]
pub struct NameCounters {
    counters: HashMap<(DataSourceKind, AssetType), u64>,
}

impl NameCounters {
    pub fn next(&mut self, kind: DataSourceKind, asset: AssetType) -> u64 {
        let counter = self.counters.entry((kind, asset)).or_insert(0);
        *counter += 1;
        *counter
    }
}

#[derive(Debug, Clone)]
struct NodeDraft {
    source_kind: DataSourceKind,
    platform: Platform,
    asset_type: AssetType,
    team: usize,
    stem: Option<String>,
    data_type: Option<&'static str>,
    age_secs: i64,
}

/// Produces nodes whose asset type is always permitted for their source kind.
pub struct NodeFactory<'a> {
    taxonomy: &'a Taxonomy,
    sources: &'a WeightedTable<DataSourceKind>,
    teams: &'a TeamRegistry,
    platforms: BTreeMap<DataSourceKind, Vec<Platform>>,
    anchor: DateTime<Utc>,
}

impl<'a> NodeFactory<'a> {
    pub fn new(
        taxonomy: &'a Taxonomy,
        sources: &'a WeightedTable<DataSourceKind>,
        teams: &'a TeamRegistry,
        anchor: DateTime<Utc>,
    ) -> Self {
        let platforms = DataSourceKind::ALL
            .into_iter()
            .map(|kind| (kind, kind.platforms().collect()))
            .collect();
        Self {
            taxonomy,
            sources,
            teams,
            platforms,
            anchor,
        }
    }

    /// Produce `target_count` nodes with ids `0..target_count`.
    ///
    /// Draws run per shard on independent random streams; names and ids are
    /// stamped afterwards in index order so they stay dense and unique.
    pub fn produce(
        &self,
        target_count: usize,
        seed: u64,
        shards: usize,
    ) -> Result<Vec<Node>, GenerationError> {
        let ranges = shard_ranges(target_count, shards);
        let drafts: Vec<Vec<NodeDraft>> = if ranges.len() > 1 {
            ranges
                .into_par_iter()
                .enumerate()
                .map(|(shard, range)| self.draft_range(seed, shard, range))
                .collect::<Result<_, _>>()?
        } else {
            ranges
                .into_iter()
                .enumerate()
                .map(|(shard, range)| self.draft_range(seed, shard, range))
                .collect::<Result<_, _>>()?
        };

        let mut names = NameCounters::default();
        Ok(drafts
            .into_iter()
            .flatten()
            .enumerate()
            .map(|(index, draft)| self.finish(index as NodeId, draft, &mut names))
            .collect())
    }

    fn draft_range(
        &self,
        seed: u64,
        shard: usize,
        range: Range<usize>,
    ) -> Result<Vec<NodeDraft>, GenerationError> {
        let mut rng = stream_rng(seed, &format!("nodes/{shard}"));
        let mut drafts = Vec::with_capacity(range.len());
        debug!(shard, start = range.start, end = range.end, "drafting nodes");

        for index in range {
            let source_kind = self.sources.sample(&mut rng);
            let assets = self.taxonomy.allowed_asset_types(source_kind)?;
            let asset_type = assets[rng.random_range(0..assets.len())];
            let team = self.teams.assign(index, &mut rng);
            let platform = self.pick_platform(source_kind, team, &mut rng)?;
            let stem = matches!(
                asset_type,
                AssetType::Column | AssetType::Dimension | AssetType::Measure
            )
            .then(|| field_stem(&mut rng));
            let data_type = (asset_type == AssetType::Column).then(|| column_data_type(&mut rng));
            let age_secs = rng.random_range(0..MAX_AGE_SECS);

            drafts.push(NodeDraft {
                source_kind,
                platform,
                asset_type,
                team,
                stem,
                data_type,
                age_secs,
            });
        }

        Ok(drafts)
    }

    /// Prefer the owning team's platforms of `kind`, else any platform of it.
    fn pick_platform(
        &self,
        kind: DataSourceKind,
        team: usize,
        rng: &mut impl Rng,
    ) -> Result<Platform, GenerationError> {
        let owned = self.teams.platforms_of(team, kind);
        if !owned.is_empty() {
            return Ok(owned[rng.random_range(0..owned.len())]);
        }
        let platforms = self
            .platforms
            .get(&kind)
            .filter(|platforms| !platforms.is_empty())
            .ok_or_else(|| {
                GenerationError::Configuration(format!(
                    "no platform hosts data source kind '{kind}'"
                ))
            })?;
        Ok(platforms[rng.random_range(0..platforms.len())])
    }

    fn finish(&self, id: NodeId, draft: NodeDraft, names: &mut NameCounters) -> Node {
        let counter = names.next(draft.source_kind, draft.asset_type);
        let name = match &draft.stem {
            Some(stem) => format!("{stem}_{counter:05}"),
            None => format!("{}_{counter:05}", draft.asset_type),
        };
        let team = self.teams.team(draft.team);

        let mut properties = Properties::new();
        properties.insert("data_source".to_string(), draft.platform.as_str().into());
        properties.insert(
            "full_name".to_string(),
            format!("{}.{name}", draft.platform.as_str()).into(),
        );
        properties.insert("department".to_string(), team.department.as_str().into());
        if let Some(data_type) = draft.data_type {
            properties.insert("data_type".to_string(), data_type.into());
        }

        Node {
            id,
            name,
            source_kind: draft.source_kind,
            asset_type: draft.asset_type,
            team: team.id.clone(),
            created_at: self.anchor - Duration::seconds(draft.age_secs),
            properties,
        }
    }
}

/// Realistic column stem such as `amount_qty`.
pub fn field_stem(rng: &mut impl Rng) -> String {
    let prefix = FIELD_PREFIXES[rng.random_range(0..FIELD_PREFIXES.len())];
    let suffix = FIELD_SUFFIXES[rng.random_range(0..FIELD_SUFFIXES.len())];
    format!("{prefix}{suffix}")
}

/// SQL type name for a column node.
pub fn column_data_type(rng: &mut impl Rng) -> &'static str {
    DATA_TYPES[rng.random_range(0..DATA_TYPES.len())]
}

/// Stamp a `usage_score` on every node: 20% heavy (70-100), 10% moderate
/// (40-69), 20% light (1-39), the rest unused (-1).
pub fn assign_usage_scores(nodes: &mut [Node], rng: &mut impl Rng) {
    let total = nodes.len();
    let heavy = total * 20 / 100;
    let moderate = heavy + total * 10 / 100;
    let light = moderate + total * 20 / 100;

    let mut order: Vec<usize> = (0..total).collect();
    order.shuffle(rng);

    for (rank, index) in order.into_iter().enumerate() {
        let score: i64 = if rank < heavy {
            rng.random_range(70..=100)
        } else if rank < moderate {
            rng.random_range(40..=69)
        } else if rank < light {
            rng.random_range(1..=39)
        } else {
            -1
        };
        nodes[index]
            .properties
            .insert("usage_score".to_string(), score.into());
    }
}
