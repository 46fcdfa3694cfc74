use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use lineagen_core::{Graph, Properties, PropertyKind};

use crate::errors::GenerationError;
use crate::output::{emit, property_columns, write_file};

const SCHEMA_LOCATION: &str = concat!(
    "http://graphml.graphdrawing.org/xmlns ",
    "http://graphml.graphdrawing.org/xmlns/1.0/graphml.xsd"
);

/// Write `graph` as a GraphML document.
pub fn write_graph_graphml(path: &Path, graph: &Graph) -> Result<u64, GenerationError> {
    write_file(path, |inner| {
        let mut writer = Writer::new_with_indent(inner, b' ', 2);
        write_document(&mut writer, graph)
    })
}

fn write_document<W: Write>(writer: &mut Writer<W>, graph: &Graph) -> Result<(), GenerationError> {
    let node_props = property_columns(graph.nodes.iter().map(|node| &node.properties));
    let edge_props = property_columns(graph.edges.iter().map(|edge| &edge.properties));

    emit(writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    emit(
        writer,
        Event::Start(BytesStart::new("graphml").with_attributes([
            ("xmlns", "http://graphml.graphdrawing.org/xmlns"),
            ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
            ("xsi:schemaLocation", SCHEMA_LOCATION),
        ])),
    )?;

    for field in ["name", "source_kind", "asset_type", "team", "created_at"] {
        declare_key(writer, "node", field, "string")?;
    }
    for (key, kind) in &node_props {
        declare_key(writer, "node", key, graphml_type(*kind))?;
    }
    declare_key(writer, "edge", "relationship_type", "string")?;
    for (key, kind) in &edge_props {
        declare_key(writer, "edge", key, graphml_type(*kind))?;
    }

    emit(
        writer,
        Event::Start(BytesStart::new("graph").with_attributes([
            ("id", "lineage"),
            ("edgedefault", "directed"),
        ])),
    )?;

    for node in &graph.nodes {
        let id = format!("n{}", node.id);
        emit(
            writer,
            Event::Start(BytesStart::new("node").with_attributes([("id", id.as_str())])),
        )?;
        data(writer, "node", "name", &node.name)?;
        data(writer, "node", "source_kind", node.source_kind.as_str())?;
        data(writer, "node", "asset_type", node.asset_type.as_str())?;
        data(writer, "node", "team", &node.team)?;
        data(writer, "node", "created_at", &node.created_at.to_rfc3339())?;
        property_data(writer, "node", &node_props, &node.properties)?;
        emit(writer, Event::End(BytesEnd::new("node")))?;
    }

    for edge in &graph.edges {
        let id = format!("e{}", edge.id);
        let source = format!("n{}", edge.source_id);
        let target = format!("n{}", edge.target_id);
        emit(
            writer,
            Event::Start(BytesStart::new("edge").with_attributes([
                ("id", id.as_str()),
                ("source", source.as_str()),
                ("target", target.as_str()),
            ])),
        )?;
        data(writer, "edge", "relationship_type", edge.relationship_type.as_str())?;
        property_data(writer, "edge", &edge_props, &edge.properties)?;
        emit(writer, Event::End(BytesEnd::new("edge")))?;
    }

    emit(writer, Event::End(BytesEnd::new("graph")))?;
    emit(writer, Event::End(BytesEnd::new("graphml")))
}

/// Key ids are namespaced by element class so node and edge properties
/// sharing a name do not collide.
fn key_id(class: &str, name: &str) -> String {
    format!("{}_{name}", &class[..1])
}

fn declare_key<W: Write>(
    writer: &mut Writer<W>,
    class: &str,
    name: &str,
    kind: &str,
) -> Result<(), GenerationError> {
    let id = key_id(class, name);
    emit(
        writer,
        Event::Empty(BytesStart::new("key").with_attributes([
            ("id", id.as_str()),
            ("for", class),
            ("attr.name", name),
            ("attr.type", kind),
        ])),
    )
}

fn data<W: Write>(
    writer: &mut Writer<W>,
    class: &str,
    name: &str,
    value: &str,
) -> Result<(), GenerationError> {
    let key = key_id(class, name);
    emit(
        writer,
        Event::Start(BytesStart::new("data").with_attributes([("key", key.as_str())])),
    )?;
    emit(writer, Event::Text(BytesText::new(value)))?;
    emit(writer, Event::End(BytesEnd::new("data")))
}

fn property_data<W: Write>(
    writer: &mut Writer<W>,
    class: &str,
    columns: &BTreeMap<String, PropertyKind>,
    properties: &Properties,
) -> Result<(), GenerationError> {
    for key in columns.keys() {
        if let Some(value) = properties.get(key) {
            data(writer, class, key, &value.render())?;
        }
    }
    Ok(())
}

fn graphml_type(kind: PropertyKind) -> &'static str {
    match kind {
        PropertyKind::Int => "long",
        PropertyKind::Float => "double",
        PropertyKind::Bool => "boolean",
        PropertyKind::Text | PropertyKind::Timestamp => "string",
    }
}
