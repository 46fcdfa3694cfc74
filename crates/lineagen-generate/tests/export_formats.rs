use std::fs;
use std::path::{Path, PathBuf};

use jsonschema::JSONSchema;
use quick_xml::Reader;
use quick_xml::events::Event;

use lineagen_generate::{
    ExportFormat, GenerationError, GeneratorConfig, LineageGenerator, read_graph_json,
};

fn temp_out_dir(label: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!("lineagen_export_{label}_{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).expect("create temp out dir");
    dir
}

fn generated(label: &str) -> (LineageGenerator, PathBuf) {
    let dir = temp_out_dir(label);
    let config = GeneratorConfig {
        disconnected_subgraphs: 1,
        ..GeneratorConfig::new(120, 2.0, 3)
            .with_seed(99)
            .with_output_dir(&dir)
    };
    let mut generator = LineageGenerator::new(config).expect("config");
    generator.generate_graph().expect("generate");
    (generator, dir)
}

/// Count start/empty elements named `name`, failing on malformed XML.
fn count_elements(path: &Path, name: &[u8]) -> usize {
    let content = fs::read_to_string(path).expect("read xml");
    let mut reader = Reader::from_str(&content);
    let mut count = 0;
    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) | Ok(Event::Empty(element)) => {
                if element.name().as_ref() == name {
                    count += 1;
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => panic!("malformed xml in {}: {err}", path.display()),
        }
    }
    count
}

#[test]
fn json_round_trips() {
    let (generator, dir) = generated("json");
    let path = generator.save_graph("json").expect("save json");
    assert!(path.starts_with(&dir));
    let name = path.file_name().and_then(|name| name.to_str()).expect("file name");
    assert!(name.starts_with("lineage_graph_") && name.ends_with(".json"), "{name}");

    let loaded = read_graph_json(&path).expect("read json");
    assert_eq!(&loaded, generator.graph().expect("graph"));
}

#[test]
fn json_export_matches_schema() {
    let (generator, dir) = generated("schema");
    let saved = generator
        .save_graph_to(&dir, ExportFormat::Json)
        .expect("save json");
    assert!(saved.bytes_written > 0);

    let document: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&saved.path).expect("read json"))
            .expect("parse json");
    let schema = serde_json::to_value(lineagen_core::graph_json_schema()).expect("schema json");
    let compiled = JSONSchema::compile(&schema).expect("compile schema");
    if let Err(errors) = compiled.validate(&document) {
        let messages: Vec<String> = errors.map(|err| err.to_string()).collect();
        panic!("schema violations: {messages:?}");
    }
}

#[test]
fn gexf_is_well_formed() {
    let (generator, dir) = generated("gexf");
    let saved = generator
        .save_graph_to(&dir, ExportFormat::Gexf)
        .expect("save gexf");
    let graph = generator.graph().expect("graph");
    assert_eq!(saved.path.extension().and_then(|ext| ext.to_str()), Some("gexf"));
    assert_eq!(count_elements(&saved.path, b"node"), graph.nodes.len());
    assert_eq!(count_elements(&saved.path, b"edge"), graph.edges.len());
    assert_eq!(count_elements(&saved.path, b"attributes"), 2);

    let content = fs::read_to_string(&saved.path).expect("read gexf");
    assert!(content.contains(r#"title="usage_score" type="long""#));
    assert!(content.contains(r#"title="cross_team" type="boolean""#));
}

#[test]
fn graphml_is_well_formed() {
    let (generator, dir) = generated("graphml");
    let saved = generator
        .save_graph_to(&dir, ExportFormat::Graphml)
        .expect("save graphml");
    let graph = generator.graph().expect("graph");
    assert_eq!(count_elements(&saved.path, b"node"), graph.nodes.len());
    assert_eq!(count_elements(&saved.path, b"edge"), graph.edges.len());

    let content = fs::read_to_string(&saved.path).expect("read graphml");
    assert!(content.contains(
        r#"id="n_usage_score" for="node" attr.name="usage_score" attr.type="long""#
    ));
    assert!(content.contains(r#"id="e_lineage_level" for="edge""#));
    assert!(content.contains(r#"edgedefault="directed""#));
}

#[test]
fn saving_requires_a_graph() {
    let dir = temp_out_dir("state");
    let generator = LineageGenerator::new(GeneratorConfig::new(10, 1.0, 2).with_output_dir(&dir))
        .expect("config");
    for format in ExportFormat::ALL {
        assert!(matches!(
            generator.save_graph(format.as_str()),
            Err(GenerationError::State(_))
        ));
    }
    assert!(fs::read_dir(&dir).expect("read dir").next().is_none());
}

#[test]
fn unknown_formats_are_rejected() {
    let (generator, _dir) = generated("unsupported");
    for format in ["xml", "csv", ""] {
        assert!(matches!(
            generator.save_graph(format),
            Err(GenerationError::UnsupportedFormat(_))
        ));
    }
}

#[test]
fn output_dir_is_created_on_save() {
    let (generator, dir) = generated("nested");
    let nested = dir.join("a").join("b");
    let saved = generator
        .save_graph_to(&nested, ExportFormat::Json)
        .expect("save into nested dir");
    assert!(saved.path.starts_with(&nested));
    assert!(saved.path.exists());
}
