use std::fs::{OpenOptions, create_dir_all};
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::Serialize;

use lineagen_core::GRAPH_FORMAT_VERSION;
use lineagen_eval::GraphStats;
use lineagen_generate::GeneratorConfig;

use super::{RegistryError, RegistryResult};

/// Metadata captured at run start.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub output_dir: PathBuf,
    pub formats: Vec<String>,
    pub config: GeneratorConfig,
}

/// JSON config written to each run directory.
#[derive(Debug, Serialize)]
pub struct RunConfig {
    pub run_id: String,
    pub started_at: String,
    pub graph_format_version: String,
    pub formats: Vec<String>,
    pub generator: GeneratorConfig,
    pub git: GitInfo,
}

/// Git metadata for reproducibility.
#[derive(Debug, Serialize)]
pub struct GitInfo {
    pub commit: Option<String>,
    pub dirty: Option<bool>,
}

/// Paths for run artifacts.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub logs_path: PathBuf,
    pub stats_path: PathBuf,
}

/// Create `<output_dir>/<timestamp>__run_<id>/` with `config.json` and an
/// empty `logs.ndjson`.
pub fn start_run(ctx: &RunContext) -> RegistryResult<RunPaths> {
    let timestamp = ctx.started_at.format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let root = ctx
        .output_dir
        .join(format!("{timestamp}__run_{}", ctx.run_id));

    create_dir_all(&root)?;

    let config_path = root.join("config.json");
    let logs_path = root.join("logs.ndjson");
    let stats_path = root.join("stats.json");

    let config = RunConfig {
        run_id: ctx.run_id.clone(),
        started_at: ctx.started_at.to_rfc3339(),
        graph_format_version: GRAPH_FORMAT_VERSION.to_string(),
        formats: ctx.formats.clone(),
        generator: ctx.config.clone(),
        git: collect_git_info(),
    };

    write_json(&config_path, &config)?;

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(&logs_path)?;

    Ok(RunPaths {
        root,
        config_path,
        logs_path,
        stats_path,
    })
}

pub fn write_stats(paths: &RunPaths, stats: &GraphStats) -> RegistryResult<()> {
    write_json(&paths.stats_path, stats)
}

pub fn collect_git_info() -> GitInfo {
    let commit = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            } else {
                None
            }
        })
        .filter(|value| !value.is_empty());

    let dirty = Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| !output.stdout.is_empty());

    GitInfo { commit, dirty }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> RegistryResult<()> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)?;
    serde_json::to_writer_pretty(file, value).map_err(RegistryError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_run_lays_out_artifacts() {
        let output_dir =
            std::env::temp_dir().join(format!("lineagen_cli_{}", uuid::Uuid::new_v4()));
        let ctx = RunContext {
            run_id: "abc".to_string(),
            started_at: Utc::now(),
            output_dir: output_dir.clone(),
            formats: vec!["json".to_string()],
            config: GeneratorConfig::new(10, 1.0, 2).with_seed(5),
        };
        let paths = start_run(&ctx).expect("start run");

        assert!(paths.root.starts_with(&output_dir));
        let dir_name = paths.root.file_name().and_then(|name| name.to_str()).expect("dir name");
        assert!(dir_name.ends_with("__run_abc"), "{dir_name}");
        assert!(paths.logs_path.exists());

        let config: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&paths.config_path).expect("read config"))
                .expect("parse config");
        assert_eq!(config["run_id"], "abc");
        assert_eq!(config["generator"]["min_nodes"], 10);
        assert_eq!(config["generator"]["seed"], 5);
        assert_eq!(config["formats"][0], "json");
    }
}
