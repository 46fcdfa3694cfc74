pub mod gexf;
pub mod graphml;
pub mod json;

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::Event;

use lineagen_core::{Properties, PropertyKind};

use crate::errors::GenerationError;

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportFormat {
    Json,
    Gexf,
    Graphml,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [
        ExportFormat::Json,
        ExportFormat::Gexf,
        ExportFormat::Graphml,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Gexf => "gexf",
            ExportFormat::Graphml => "graphml",
        }
    }

    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = GenerationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "gexf" => Ok(ExportFormat::Gexf),
            "graphml" => Ok(ExportFormat::Graphml),
            other => Err(GenerationError::UnsupportedFormat(format!(
                "'{other}' (expected json, gexf or graphml)"
            ))),
        }
    }
}

/// A written export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedGraph {
    pub path: PathBuf,
    pub format: ExportFormat,
    pub bytes_written: u64,
}

/// `lineage_graph_<YYYYmmdd_HHMMSS>.<ext>`
pub fn export_file_name(format: ExportFormat, at: DateTime<Utc>) -> String {
    format!(
        "lineage_graph_{}.{}",
        at.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

/// Create `path` and hand a buffered, byte-counting writer to `write`.
pub(crate) fn write_file(
    path: &Path,
    write: impl FnOnce(&mut CountingWriter<BufWriter<File>>) -> Result<(), GenerationError>,
) -> Result<u64, GenerationError> {
    let mut writer = CountingWriter::new(BufWriter::new(File::create(path)?));
    write(&mut writer)?;
    writer.flush()?;
    Ok(writer.bytes_written())
}

pub(crate) struct CountingWriter<W: Write> {
    inner: W,
    bytes: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self {
        Self { inner, bytes: 0 }
    }

    fn bytes_written(&self) -> u64 {
        self.bytes
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.bytes += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

/// Property keys found across `sets`, typed by value kind. Keys whose values
/// disagree on kind fall back to text.
pub(crate) fn property_columns<'a>(
    sets: impl Iterator<Item = &'a Properties>,
) -> BTreeMap<String, PropertyKind> {
    let mut columns: BTreeMap<String, PropertyKind> = BTreeMap::new();
    for properties in sets {
        for (key, value) in properties {
            let kind = value.kind();
            columns
                .entry(key.clone())
                .and_modify(|known| {
                    if *known != kind {
                        *known = PropertyKind::Text;
                    }
                })
                .or_insert(kind);
        }
    }
    columns
}

pub(crate) fn emit<W: Write>(
    writer: &mut Writer<W>,
    event: Event<'_>,
) -> Result<(), GenerationError> {
    writer
        .write_event(event)
        .map_err(|err| GenerationError::Xml(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use lineagen_core::PropertyValue;

    #[test]
    fn parses_known_formats() {
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!(" GEXF ".parse::<ExportFormat>().unwrap(), ExportFormat::Gexf);
        assert_eq!("graphml".parse::<ExportFormat>().unwrap(), ExportFormat::Graphml);
        assert!(matches!(
            "xml".parse::<ExportFormat>(),
            Err(GenerationError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn file_names_carry_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(
            export_file_name(ExportFormat::Graphml, at),
            "lineage_graph_20240309_070501.graphml"
        );
    }

    #[test]
    fn mixed_kinds_fall_back_to_text() {
        let mut a = Properties::new();
        a.insert("score".to_string(), PropertyValue::Int(3));
        a.insert("flag".to_string(), PropertyValue::Bool(true));
        let mut b = Properties::new();
        b.insert("score".to_string(), PropertyValue::Text("high".to_string()));
        let columns = property_columns([&a, &b].into_iter());
        assert_eq!(columns["score"], PropertyKind::Text);
        assert_eq!(columns["flag"], PropertyKind::Bool);
    }
}
