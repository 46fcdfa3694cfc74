use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use lineagen_core::{Graph, Properties, PropertyKind};

use crate::errors::GenerationError;
use crate::output::{emit, property_columns, write_file};

const NODE_FIELDS: [&str; 4] = ["source_kind", "asset_type", "team", "created_at"];
const EDGE_FIELDS: [&str; 1] = ["relationship_type"];

/// Write `graph` as a GEXF 1.3 document.
pub fn write_graph_gexf(path: &Path, graph: &Graph) -> Result<u64, GenerationError> {
    write_file(path, |inner| write_document(Writer::new_with_indent(inner, b' ', 2), graph))
}

fn write_document<W: Write>(mut writer: Writer<W>, graph: &Graph) -> Result<(), GenerationError> {
    let node_props = property_columns(graph.nodes.iter().map(|node| &node.properties));
    let edge_props = property_columns(graph.edges.iter().map(|edge| &edge.properties));
    let node_attrs = Attributes::new(&NODE_FIELDS, &node_props);
    let edge_attrs = Attributes::new(&EDGE_FIELDS, &edge_props);

    emit(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    emit(
        &mut writer,
        Event::Start(BytesStart::new("gexf").with_attributes([
            ("xmlns", "http://gexf.net/1.3"),
            ("version", "1.3"),
        ])),
    )?;

    let modified = graph.generated_at.format("%Y-%m-%d").to_string();
    emit(
        &mut writer,
        Event::Start(
            BytesStart::new("meta").with_attributes([("lastmodifieddate", modified.as_str())]),
        ),
    )?;
    text_element(&mut writer, "creator", "lineagen")?;
    text_element(
        &mut writer,
        "description",
        &format!("Synthetic data lineage graph (seed {})", graph.seed),
    )?;
    emit(&mut writer, Event::End(BytesEnd::new("meta")))?;

    emit(
        &mut writer,
        Event::Start(BytesStart::new("graph").with_attributes([
            ("mode", "static"),
            ("defaultedgetype", "directed"),
        ])),
    )?;
    node_attrs.declare(&mut writer, "node")?;
    edge_attrs.declare(&mut writer, "edge")?;

    emit(&mut writer, Event::Start(BytesStart::new("nodes")))?;
    for node in &graph.nodes {
        let id = node.id.to_string();
        emit(
            &mut writer,
            Event::Start(BytesStart::new("node").with_attributes([
                ("id", id.as_str()),
                ("label", node.name.as_str()),
            ])),
        )?;
        let created_at = node.created_at.to_rfc3339();
        node_attrs.values(
            &mut writer,
            &[
                node.source_kind.as_str(),
                node.asset_type.as_str(),
                node.team.as_str(),
                created_at.as_str(),
            ],
            &node.properties,
        )?;
        emit(&mut writer, Event::End(BytesEnd::new("node")))?;
    }
    emit(&mut writer, Event::End(BytesEnd::new("nodes")))?;

    emit(&mut writer, Event::Start(BytesStart::new("edges")))?;
    for edge in &graph.edges {
        let id = edge.id.to_string();
        let source = edge.source_id.to_string();
        let target = edge.target_id.to_string();
        emit(
            &mut writer,
            Event::Start(BytesStart::new("edge").with_attributes([
                ("id", id.as_str()),
                ("source", source.as_str()),
                ("target", target.as_str()),
                ("label", edge.relationship_type.as_str()),
            ])),
        )?;
        edge_attrs.values(&mut writer, &[edge.relationship_type.as_str()], &edge.properties)?;
        emit(&mut writer, Event::End(BytesEnd::new("edge")))?;
    }
    emit(&mut writer, Event::End(BytesEnd::new("edges")))?;

    emit(&mut writer, Event::End(BytesEnd::new("graph")))?;
    emit(&mut writer, Event::End(BytesEnd::new("gexf")))?;
    Ok(())
}

/// Attribute declarations for one element class: core fields first, then
/// property keys, numbered in that order.
struct Attributes<'a> {
    fields: &'a [&'a str],
    properties: &'a BTreeMap<String, PropertyKind>,
}

impl<'a> Attributes<'a> {
    fn new(fields: &'a [&'a str], properties: &'a BTreeMap<String, PropertyKind>) -> Self {
        Self { fields, properties }
    }

    fn declare<W: Write>(
        &self,
        writer: &mut Writer<W>,
        class: &str,
    ) -> Result<(), GenerationError> {
        emit(
            writer,
            Event::Start(
                BytesStart::new("attributes")
                    .with_attributes([("class", class), ("mode", "static")]),
            ),
        )?;
        let columns = self
            .fields
            .iter()
            .map(|field| (*field, "string"))
            .chain(self.properties.iter().map(|(key, kind)| (key.as_str(), gexf_type(*kind))));
        for (index, (title, kind)) in columns.enumerate() {
            let id = index.to_string();
            emit(
                writer,
                Event::Empty(BytesStart::new("attribute").with_attributes([
                    ("id", id.as_str()),
                    ("title", title),
                    ("type", kind),
                ])),
            )?;
        }
        emit(writer, Event::End(BytesEnd::new("attributes")))
    }

    fn values<W: Write>(
        &self,
        writer: &mut Writer<W>,
        fields: &[&str],
        properties: &Properties,
    ) -> Result<(), GenerationError> {
        emit(writer, Event::Start(BytesStart::new("attvalues")))?;
        for (index, value) in fields.iter().enumerate() {
            attvalue(writer, index, value)?;
        }
        for (offset, key) in self.properties.keys().enumerate() {
            if let Some(value) = properties.get(key) {
                attvalue(writer, self.fields.len() + offset, &value.render())?;
            }
        }
        emit(writer, Event::End(BytesEnd::new("attvalues")))
    }
}

fn attvalue<W: Write>(
    writer: &mut Writer<W>,
    index: usize,
    value: &str,
) -> Result<(), GenerationError> {
    let id = index.to_string();
    emit(
        writer,
        Event::Empty(
            BytesStart::new("attvalue").with_attributes([("for", id.as_str()), ("value", value)]),
        ),
    )
}

fn gexf_type(kind: PropertyKind) -> &'static str {
    match kind {
        PropertyKind::Int => "long",
        PropertyKind::Float => "double",
        PropertyKind::Bool => "boolean",
        PropertyKind::Text | PropertyKind::Timestamp => "string",
    }
}

fn text_element<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
) -> Result<(), GenerationError> {
    emit(writer, Event::Start(BytesStart::new(name)))?;
    emit(writer, Event::Text(BytesText::new(text)))?;
    emit(writer, Event::End(BytesEnd::new(name)))
}
