use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use lineagen_core::Graph;

use crate::errors::GenerationError;
use crate::output::write_file;

/// Stream the serde form of `graph` to `path`.
pub fn write_graph_json(path: &Path, graph: &Graph) -> Result<u64, GenerationError> {
    write_file(path, |writer| {
        serde_json::to_writer_pretty(writer, graph)?;
        Ok(())
    })
}

/// Load a graph written by [`write_graph_json`].
pub fn read_graph_json(path: &Path) -> Result<Graph, GenerationError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}
