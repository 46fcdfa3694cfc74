mod registry;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use lineagen_core::graph_json_schema;
use lineagen_generate::{ExportFormat, GenerationError, GeneratorConfig, LineageGenerator};
use registry::{RunContext, init_run_logging, start_run, write_stats};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration file {path}: {message}")]
    ConfigFile { path: PathBuf, message: String },
    #[error("graph check failed with {0} violation(s)")]
    Check(usize),
}

#[derive(Parser, Debug)]
#[command(name = "lineagen", version, about = "Synthetic data lineage graph generator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a lineage graph into a new run directory.
    Generate(GenerateArgs),
    /// Print the JSON Schema of the exported graph document.
    Schema,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// TOML file with generator settings; flags override it.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Minimum number of nodes.
    #[arg(long)]
    min_nodes: Option<usize>,
    /// Target edges per node.
    #[arg(long)]
    edge_multiplier: Option<f64>,
    /// Number of owning teams.
    #[arg(long)]
    num_teams: Option<usize>,
    /// Root directory for run directories.
    #[arg(long)]
    output_dir: Option<PathBuf>,
    /// Seed for reproducible output.
    #[arg(long)]
    seed: Option<u64>,
    /// Parallel synthesis shards.
    #[arg(long)]
    shards: Option<usize>,
    /// Export format(s): json, gexf, graphml.
    #[arg(long = "format", value_name = "FORMAT", default_values_t = vec!["json".to_string()])]
    formats: Vec<String>,
    /// Print graph statistics to stdout.
    #[arg(long, default_value_t = false)]
    stats: bool,
    /// Re-validate the graph and fail on any violation.
    #[arg(long, default_value_t = false)]
    check: bool,
    /// Default log filter when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Generate(args) => run_generate(args),
        Command::Schema => {
            println!("{}", serde_json::to_string_pretty(&graph_json_schema())?);
            Ok(())
        }
    }
}

fn run_generate(args: GenerateArgs) -> Result<(), CliError> {
    let config = resolve_config(&args)?;
    let formats = args
        .formats
        .iter()
        .map(|format| format.parse::<ExportFormat>())
        .collect::<Result<Vec<_>, _>>()?;
    let mut generator = LineageGenerator::new(config.clone())?;

    let run_ctx = RunContext {
        run_id: Uuid::new_v4().to_string(),
        started_at: chrono::Utc::now(),
        output_dir: config.output_dir.clone(),
        formats: formats.iter().map(|format| format.to_string()).collect(),
        config,
    };
    let run_paths = start_run(&run_ctx)?;
    init_run_logging(&run_paths.logs_path, &args.log_level)?;

    tracing::info!(
        event = "run_started",
        run_id = %run_ctx.run_id,
        run_dir = %run_paths.root.display()
    );
    let timer = Instant::now();

    generator.generate_graph()?;

    for format in formats {
        let saved = generator.save_graph_to(&run_paths.root, format)?;
        tracing::info!(
            event = "graph_written",
            format = %format,
            path = %saved.path.display(),
            bytes = saved.bytes_written
        );
    }

    let stats = generator.get_graph_stats()?;
    write_stats(&run_paths, &stats)?;
    tracing::info!(event = "stats_written", path = %run_paths.stats_path.display());
    if args.stats {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }

    if args.check {
        let graph = generator.graph().ok_or_else(|| {
            GenerationError::State("graph missing after generation".to_string())
        })?;
        let violations = graph.validate(generator.taxonomy());
        for violation in &violations {
            tracing::error!(
                code = %violation.code,
                path = %violation.path,
                "{}",
                violation.message
            );
        }
        if !violations.is_empty() {
            return Err(CliError::Check(violations.len()));
        }
        tracing::info!(
            event = "graph_checked",
            nodes = stats.total_nodes,
            edges = stats.total_edges
        );
    }

    tracing::info!(
        event = "run_finished",
        status = "success",
        duration_ms = timer.elapsed().as_millis() as u64
    );
    println!("{}", run_paths.root.display());
    Ok(())
}

/// File settings first, then flag overrides.
fn resolve_config(args: &GenerateArgs) -> Result<GeneratorConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str(&contents).map_err(|err| CliError::ConfigFile {
                path: path.clone(),
                message: err.to_string(),
            })?
        }
        None => GeneratorConfig::default(),
    };

    if let Some(min_nodes) = args.min_nodes {
        config.min_nodes = min_nodes;
    }
    if let Some(edge_multiplier) = args.edge_multiplier {
        config.edge_multiplier = edge_multiplier;
    }
    if let Some(num_teams) = args.num_teams {
        config.num_teams = num_teams;
    }
    if let Some(output_dir) = &args.output_dir {
        config.output_dir = output_dir.clone();
    }
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(shards) = args.shards {
        config.shards = shards;
    }

    Ok(config)
}
