use std::collections::{BTreeMap, HashSet};

use lineagen_core::{AssetType, DataSourceKind, NodeId, RelationshipRule, TaxonomySpec};
use lineagen_generate::{
    GenerationError, GeneratorConfig, LineageGenerator, SourceWeight, TeamAssignment,
};

fn generate(config: GeneratorConfig) -> LineageGenerator {
    let mut generator = LineageGenerator::new(config).expect("valid config");
    generator.generate_graph().expect("generate graph");
    generator
}

fn field_edges(generator: &LineageGenerator) -> usize {
    generator
        .graph()
        .expect("graph")
        .edges
        .iter()
        .filter(|edge| edge.properties["lineage_level"].as_str() == Some("field"))
        .count()
}

#[test]
fn small_graph_meets_structural_invariants() {
    let generator = generate(GeneratorConfig::new(100, 2.0, 3).with_seed(42));
    let graph = generator.graph().expect("graph");

    assert!(graph.nodes.len() >= 100);
    assert!(graph.edges.len() <= 200);
    assert!(!graph.edges.is_empty());
    assert_eq!(graph.teams.len(), 3);

    let team_ids: HashSet<&str> = graph.teams.iter().map(|team| team.id.as_str()).collect();
    assert!(graph.nodes.iter().all(|node| team_ids.contains(node.team.as_str())));
    for team in &graph.teams {
        assert!(graph.nodes.iter().any(|node| node.team == team.id), "{} owns nothing", team.id);
    }

    let violations = graph.validate(generator.taxonomy());
    assert!(violations.is_empty(), "violations: {violations:?}");
}

#[test]
fn seeded_runs_are_reproducible() {
    for shards in [1, 4] {
        let config = GeneratorConfig {
            shards,
            ..GeneratorConfig::new(600, 3.0, 4).with_seed(7)
        };
        let a = generate(config.clone());
        let b = generate(config);
        let (a, b) = (a.graph().expect("graph a"), b.graph().expect("graph b"));
        assert_eq!(a.seed, b.seed);
        assert_eq!(a.teams, b.teams);
        assert_eq!(a.nodes, b.nodes, "nodes differ with {shards} shards");
        assert_eq!(a.edges, b.edges, "edges differ with {shards} shards");
    }
}

#[test]
fn different_seeds_diverge() {
    let a = generate(GeneratorConfig::new(300, 2.0, 3).with_seed(1));
    let b = generate(GeneratorConfig::new(300, 2.0, 3).with_seed(2));
    assert_ne!(a.graph().expect("a").edges, b.graph().expect("b").edges);
}

#[test]
fn unseeded_runs_record_their_seed() {
    let mut generator = LineageGenerator::new(GeneratorConfig::new(50, 1.0, 2)).expect("config");
    let seed = generator.generate_graph().expect("graph").seed;
    let replay = generate(GeneratorConfig::new(50, 1.0, 2).with_seed(seed));
    let first = generator.graph().expect("graph");
    let replayed = replay.graph().expect("replay");
    assert_eq!(
        first.nodes.iter().map(|node| &node.name).collect::<Vec<_>>(),
        replayed.nodes.iter().map(|node| &node.name).collect::<Vec<_>>()
    );
    assert_eq!(first.edges.len(), replayed.edges.len());
}

#[test]
fn edge_count_lands_near_target() {
    for shards in [1, 3] {
        let generator = generate(GeneratorConfig {
            shards,
            ..GeneratorConfig::new(5_000, 3.0, 8).with_seed(11)
        });
        let graph = generator.graph().expect("graph");
        let target = 15_000;
        assert!(graph.edges.len() <= target);
        assert!(
            graph.edges.len() as f64 >= target as f64 * 0.95,
            "{} edges with {shards} shards",
            graph.edges.len()
        );
        assert!(graph.validate(generator.taxonomy()).is_empty());
    }
}

#[test]
fn field_lineage_share_is_reserved() {
    let generator = generate(GeneratorConfig::new(2_000, 2.0, 4).with_seed(5));
    let total = generator.graph().expect("graph").edges.len();
    let field = field_edges(&generator);
    assert!(field as f64 >= total as f64 * 0.2, "{field} of {total}");

    let none = generate(GeneratorConfig {
        field_lineage_fraction: 0.0,
        ..GeneratorConfig::new(2_000, 2.0, 4).with_seed(5)
    });
    assert!(field_edges(&none) < field);
}

#[test]
fn intra_team_bias_keeps_lineage_local() {
    let cross_share = |bias: f64| {
        let generator = generate(GeneratorConfig {
            intra_team_bias: bias,
            ..GeneratorConfig::new(2_000, 2.0, 5).with_seed(17)
        });
        let graph = generator.graph().expect("graph");
        let cross = graph
            .edges
            .iter()
            .filter(|edge| edge.properties["cross_team"].as_bool() == Some(true))
            .count();
        cross as f64 / graph.edges.len() as f64
    };
    assert!(cross_share(0.9) < cross_share(0.0));
}

#[test]
fn weighted_teams_still_cover_every_team() {
    let generator = generate(GeneratorConfig {
        team_assignment: TeamAssignment::Weighted,
        ..GeneratorConfig::new(500, 1.0, 6).with_seed(3)
    });
    let stats = generator.get_graph_stats().expect("stats");
    assert_eq!(stats.team_nodes.len(), 6);
}

#[test]
fn orphans_and_subgraphs_stay_apart() {
    let generator = generate(GeneratorConfig {
        orphaned_node_percent: 0.1,
        disconnected_subgraphs: 3,
        ..GeneratorConfig::new(500, 2.0, 3).with_seed(9)
    });
    let graph = generator.graph().expect("graph");
    assert!(graph.validate(generator.taxonomy()).is_empty());

    let flagged = |key: &str| -> HashSet<NodeId> {
        graph
            .nodes
            .iter()
            .filter(|node| node.properties.get(key).and_then(|value| value.as_bool()) == Some(true))
            .map(|node| node.id)
            .collect()
    };
    let orphans = flagged("orphaned");
    let clustered = flagged("disconnected_subgraph");
    assert_eq!(orphans.len(), 50);
    assert!((15..=45).contains(&clustered.len()), "{}", clustered.len());
    assert!(clustered.iter().all(|id| *id >= 500));

    for edge in &graph.edges {
        assert!(!orphans.contains(&edge.source_id) && !orphans.contains(&edge.target_id));
        assert_eq!(
            clustered.contains(&edge.source_id),
            clustered.contains(&edge.target_id),
            "edge {} crosses a subgraph boundary",
            edge.id
        );
    }
    assert!(graph.edges.len() <= (2.0 * graph.nodes.len() as f64).round() as usize);

    let stats = generator.get_graph_stats().expect("stats");
    assert_eq!(stats.orphaned_nodes, 50);
    assert_eq!(stats.subgraph_nodes, clustered.len());
    assert!(stats.connectivity.components >= 4);
    assert!(stats.connectivity.isolated_nodes >= 50);
}

#[test]
fn stats_match_the_graph() {
    let generator = generate(GeneratorConfig::new(400, 2.0, 3).with_seed(21));
    let graph = generator.graph().expect("graph");
    let stats = generator.get_graph_stats().expect("stats");
    assert_eq!(stats.total_nodes, graph.nodes.len());
    assert_eq!(stats.total_edges, graph.edges.len());
    assert_eq!(stats.field_level_edges, field_edges(&generator));
    assert_eq!(stats.node_types.values().sum::<usize>(), graph.nodes.len());
    assert_eq!(stats.edge_types.values().sum::<usize>(), graph.edges.len());
    assert_eq!(
        stats.usage.heavy + stats.usage.moderate + stats.usage.light + stats.usage.unused,
        graph.nodes.len()
    );
    assert_eq!(stats.usage.heavy, 80);
}

#[test]
fn regenerating_replaces_the_graph() {
    let mut generator =
        LineageGenerator::new(GeneratorConfig::new(80, 1.0, 2).with_seed(4)).expect("config");
    let first = generator.generate_graph().expect("first").clone();
    let second = generator.generate_graph().expect("second").clone();
    assert_eq!(first.nodes, second.nodes);
    assert_eq!(generator.graph().expect("graph").edges, second.edges);
}

#[test]
fn invalid_configuration_fails_fast() {
    for config in [
        GeneratorConfig::new(0, 2.0, 3),
        GeneratorConfig::new(10, -1.0, 3),
        GeneratorConfig::new(10, 2.0, 0),
        GeneratorConfig {
            source_weights: vec![
                SourceWeight {
                    kind: DataSourceKind::Warehouse,
                    weight: f64::MAX,
                },
                SourceWeight {
                    kind: DataSourceKind::Bi,
                    weight: f64::MAX,
                },
            ],
            ..GeneratorConfig::new(10, 2.0, 3)
        },
    ] {
        assert!(matches!(
            LineageGenerator::new(config),
            Err(GenerationError::Configuration(_))
        ));
    }
}

#[test]
fn custom_taxonomy_restricts_output() {
    let spec = TaxonomySpec {
        source_assets: BTreeMap::from([(
            "warehouse".to_string(),
            vec!["table".to_string(), "view".to_string()],
        )]),
        relationships: vec![RelationshipRule {
            source: "table".to_string(),
            target: "view".to_string(),
            relationships: vec!["source_to_target".to_string()],
        }],
    };
    let generator = generate(GeneratorConfig {
        taxonomy: Some(spec),
        source_weights: vec![SourceWeight {
            kind: DataSourceKind::Warehouse,
            weight: 1.0,
        }],
        pair_weights: Vec::new(),
        ..GeneratorConfig::new(200, 1.0, 2).with_seed(8)
    });
    let graph = generator.graph().expect("graph");
    assert!(
        graph
            .nodes
            .iter()
            .all(|node| matches!(node.asset_type, AssetType::Table | AssetType::View))
    );
    assert!(!graph.edges.is_empty());
    assert!(graph.edges.iter().all(|edge| {
        graph.nodes[edge.source_id as usize].asset_type == AssetType::Table
            && graph.nodes[edge.target_id as usize].asset_type == AssetType::View
    }));
    assert_eq!(field_edges(&generator), 0);
    assert!(graph.validate(generator.taxonomy()).is_empty());
}
