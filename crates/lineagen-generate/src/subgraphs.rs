use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::seq::IndexedRandom;

use lineagen_core::{
    AssetType, DataSourceKind, Edge, EdgeKey, Node, NodeId, Platform, Properties, Taxonomy, Team,
};

use crate::edges::lineage_properties;
use crate::nodes::{column_data_type, field_stem};
use crate::teams::TeamRegistry;

const CENTRAL_TYPES: [AssetType; 4] = [
    AssetType::Table,
    AssetType::Model,
    AssetType::Dashboard,
    AssetType::Workflow,
];
const MIN_SIZE: usize = 5;
const MAX_SIZE: usize = 15;
const EXTRA_LINKS: usize = 5;

/// Isolated clusters appended after the main population.
#[derive(Debug, Default)]
pub struct Clusters {
    pub nodes: Vec<Node>,
    /// Edge ids are provisional; the engine renumbers them.
    pub edges: Vec<Edge>,
    pub built: usize,
}

/// Build `count` clusters of 5-15 nodes around a central asset.
///
/// Every cluster lives on one platform and one team, and only links its own
/// members. Edges stop once `edge_budget` is spent; nodes are still added.
pub fn build_clusters(
    count: usize,
    first_id: NodeId,
    taxonomy: &Taxonomy,
    teams: &TeamRegistry,
    anchor: DateTime<Utc>,
    edge_budget: usize,
    rng: &mut impl Rng,
) -> Clusters {
    let centrals: Vec<(AssetType, Vec<DataSourceKind>)> = CENTRAL_TYPES
        .into_iter()
        .map(|asset| (asset, taxonomy.kinds_for_asset(asset)))
        .filter(|(asset, kinds)| {
            kinds
                .iter()
                .any(|kind| !child_types(taxonomy, *kind, *asset).is_empty())
        })
        .collect();

    let mut clusters = Clusters::default();
    if centrals.is_empty() {
        return clusters;
    }

    let mut keys: HashSet<EdgeKey> = HashSet::new();
    for cluster in 0..count {
        let Some((central_type, kinds)) = centrals.choose(rng) else {
            break;
        };
        let central_type = *central_type;
        let hosts: Vec<DataSourceKind> = kinds
            .iter()
            .copied()
            .filter(|kind| !child_types(taxonomy, *kind, central_type).is_empty())
            .collect();
        let Some(kind) = hosts.choose(rng).copied() else {
            continue;
        };
        let team = rng.random_range(0..teams.len());
        let mut platforms = teams.platforms_of(team, kind);
        if platforms.is_empty() {
            platforms = kind.platforms().collect();
        }
        let Some(platform) = platforms.choose(rng).copied() else {
            continue;
        };
        let children = child_types(taxonomy, kind, central_type);
        let seat = Seat {
            cluster,
            kind,
            platform,
            team: teams.team(team),
            first_id,
            anchor,
        };
        let size = rng.random_range(MIN_SIZE..=MAX_SIZE);

        let mut members = vec![seat.push(&mut clusters.nodes, central_type, 0, rng)];
        for position in 1..size {
            let Some(child) = children.choose(rng).copied() else {
                break;
            };
            members.push(seat.push(&mut clusters.nodes, child, position, rng));
        }

        let mut links = Linker {
            taxonomy,
            budget: edge_budget,
            keys: &mut keys,
            edges: &mut clusters.edges,
        };
        let central = members[0];
        for position in 1..members.len() {
            let child = members[position];
            let parent = if position <= 3 || rng.random_bool(0.7) {
                central
            } else {
                members[rng.random_range(0..position)]
            };
            if !links.link(parent, child, rng) && parent.0 != central.0 {
                links.link(central, child, rng);
            }
        }
        for _ in 0..EXTRA_LINKS.min(members.len()) {
            let source = members[rng.random_range(0..members.len())];
            let target = members[rng.random_range(0..members.len())];
            links.link(source, target, rng);
        }

        clusters.built += 1;
    }

    clusters
}

/// Shared placement of one cluster's members.
struct Seat<'a> {
    cluster: usize,
    kind: DataSourceKind,
    platform: Platform,
    team: &'a Team,
    first_id: NodeId,
    anchor: DateTime<Utc>,
}

impl Seat<'_> {
    fn push(
        &self,
        nodes: &mut Vec<Node>,
        asset: AssetType,
        position: usize,
        rng: &mut impl Rng,
    ) -> (NodeId, AssetType) {
        let id = self.first_id + nodes.len() as NodeId;
        let stem = if matches!(
            asset,
            AssetType::Column | AssetType::Dimension | AssetType::Measure
        ) {
            field_stem(rng)
        } else {
            asset.to_string()
        };
        let name = format!("disconnected_{}_{stem}_{position:02}", self.cluster);
        let platform = self.platform.as_str();

        let mut properties = Properties::new();
        properties.insert("data_source".to_string(), platform.into());
        properties.insert("full_name".to_string(), format!("{platform}.{name}").into());
        properties.insert("department".to_string(), self.team.department.as_str().into());
        if asset == AssetType::Column {
            properties.insert("data_type".to_string(), column_data_type(rng).into());
        }
        properties.insert("disconnected_subgraph".to_string(), true.into());
        properties.insert("subgraph".to_string(), (self.cluster as i64).into());

        nodes.push(Node {
            id,
            name,
            source_kind: self.kind,
            asset_type: asset,
            team: self.team.id.clone(),
            created_at: self.anchor,
            properties,
        });
        (id, asset)
    }
}

struct Linker<'a> {
    taxonomy: &'a Taxonomy,
    budget: usize,
    keys: &'a mut HashSet<EdgeKey>,
    edges: &'a mut Vec<Edge>,
}

impl Linker<'_> {
    fn link(
        &mut self,
        source: (NodeId, AssetType),
        target: (NodeId, AssetType),
        rng: &mut impl Rng,
    ) -> bool {
        if self.edges.len() >= self.budget || source.0 == target.0 {
            return false;
        }
        let Some(relationship) = self
            .taxonomy
            .allowed_relationships(source.1, target.1)
            .choose(rng)
            .copied()
        else {
            return false;
        };
        if !self.keys.insert((source.0, target.0, relationship)) {
            return false;
        }
        self.edges.push(Edge {
            id: self.edges.len() as u64,
            source_id: source.0,
            target_id: target.0,
            relationship_type: relationship,
            properties: lineage_properties(
                source.1.is_field_level() && target.1.is_field_level(),
                false,
            ),
        });
        true
    }
}

fn child_types(taxonomy: &Taxonomy, kind: DataSourceKind, central: AssetType) -> Vec<AssetType> {
    taxonomy
        .allowed_asset_types(kind)
        .map(|assets| {
            assets
                .iter()
                .copied()
                .filter(|child| !taxonomy.allowed_relationships(central, *child).is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TeamAssignment;
    use crate::sampling::stream_rng;
    use chrono::TimeZone;

    fn build(count: usize, budget: usize, seed: u64) -> Clusters {
        let taxonomy = Taxonomy::builtin();
        let mut rng = stream_rng(seed, "teams");
        let teams = TeamRegistry::create(4, TeamAssignment::RoundRobin, &mut rng).unwrap();
        let anchor = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut rng = stream_rng(seed, "subgraphs");
        build_clusters(count, 1_000, &taxonomy, &teams, anchor, budget, &mut rng)
    }

    #[test]
    fn clusters_are_sized_and_flagged() {
        let clusters = build(6, usize::MAX, 31);
        assert_eq!(clusters.built, 6);
        assert!((30..=90).contains(&clusters.nodes.len()), "{}", clusters.nodes.len());
        for (offset, node) in clusters.nodes.iter().enumerate() {
            assert_eq!(node.id, 1_000 + offset as NodeId);
            assert_eq!(node.properties["disconnected_subgraph"].as_bool(), Some(true));
            assert!(Taxonomy::builtin().is_valid_asset(node.source_kind, node.asset_type));
        }
    }

    #[test]
    fn edges_stay_inside_their_cluster() {
        let clusters = build(5, usize::MAX, 32);
        let taxonomy = Taxonomy::builtin();
        let node = |id: NodeId| &clusters.nodes[(id - 1_000) as usize];
        assert!(!clusters.edges.is_empty());
        for edge in &clusters.edges {
            let (source, target) = (node(edge.source_id), node(edge.target_id));
            assert_eq!(source.properties["subgraph"], target.properties["subgraph"]);
            assert_eq!(source.team, target.team);
            assert!(taxonomy.is_valid_relationship(
                source.asset_type,
                target.asset_type,
                edge.relationship_type
            ));
        }
    }

    #[test]
    fn edge_budget_is_respected() {
        let clusters = build(4, 3, 33);
        assert!(clusters.edges.len() <= 3);
        assert!(clusters.nodes.len() >= 20);
    }
}
