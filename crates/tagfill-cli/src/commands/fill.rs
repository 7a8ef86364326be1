//! Filling fillers into concrete test vectors

use std::path::{Path, PathBuf};

use clap::Args;
use serde_json::{json, Map, Value};
use tagfill_filler::{fill_file, FillOptions, SystemTools, FORKS};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::{config::Config, output::Output, CliError};

const FILLER_SUFFIXES: [&str; 3] = ["Filler.json", "Filler.yml", "Filler.yaml"];

/// Resolve fillers into concrete test vectors
#[derive(Debug, Args)]
pub struct FillCommand {
    /// Filler file, or directory searched for fillers
    pub path: PathBuf,

    /// Only fill this fork
    #[arg(long)]
    pub fork: Option<String>,

    /// Directory receiving one JSON file per filler; vectors go to stdout otherwise
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// YUL compiler binary
    #[arg(long)]
    pub solc: Option<PathBuf>,

    /// LLL compiler binary
    #[arg(long)]
    pub lllc: Option<PathBuf>,
}

/// Filler files under `path`, sorted
fn filler_files(path: &Path) -> Result<Vec<PathBuf>, CliError> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(path) {
        let entry = entry?;
        let is_filler = entry
            .file_name()
            .to_str()
            .map_or(false, |name| FILLER_SUFFIXES.iter().any(|s| name.ends_with(s)));
        if entry.file_type().is_file() && is_filler {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Per-run counters
#[derive(Debug, Default)]
struct FillSummary {
    files: usize,
    filled: usize,
    failed: Vec<(String, String)>,
    skipped: usize,
}

impl FillCommand {
    pub fn execute(self, config: &Config, json: bool) -> Result<(), CliError> {
        let tools = SystemTools {
            solc: self.solc.unwrap_or_else(|| config.solc.clone()),
            lllc: self.lllc.unwrap_or_else(|| config.lllc.clone()),
        };
        let options = FillOptions {
            fork: self.fork.or_else(|| config.default_fork.clone()),
        };

        if let Some(fork) = &options.fork {
            if !FORKS.contains(&fork.as_str()) {
                return Err(CliError::InvalidInput(format!("unknown fork {}", fork)));
            }
        }

        let files = filler_files(&self.path)?;
        if files.is_empty() {
            return Err(CliError::InvalidInput(format!(
                "no fillers found at {}",
                self.path.display()
            )));
        }
        if let Some(out) = &self.out {
            std::fs::create_dir_all(out)?;
        }

        let mut summary = FillSummary::default();
        let mut vectors = Map::new();
        for file in &files {
            summary.files += 1;
            let results = match fill_file(file, &options, &tools) {
                Ok(results) => results,
                Err(e) => {
                    warn!(path = %file.display(), error = %e, "Failed to load filler");
                    summary.failed.push((file.display().to_string(), e.to_string()));
                    continue;
                }
            };
            info!(
                path = %file.display(),
                filled = results.filled.len(),
                failed = results.failed.len(),
                "Filled file"
            );

            summary.filled += results.filled.len();
            summary.skipped += results.skipped.len();
            summary.failed.extend(results.failed);

            let mut file_vectors = Map::new();
            for vector in &results.filled {
                file_vectors.insert(vector.id.clone(), serde_json::to_value(vector)?);
            }
            match &self.out {
                Some(out) => write_vectors(out, file, &file_vectors)?,
                None => vectors.extend(file_vectors),
            }
        }

        match &self.out {
            Some(out) => summary_output(&summary, out, json).print(),
            None => println!("{}", serde_json::to_string_pretty(&Value::Object(vectors))?),
        }

        if summary.failed.is_empty() {
            Ok(())
        } else {
            Err(CliError::FillFailed {
                failed: summary.failed.len(),
                total: summary.filled + summary.failed.len(),
            })
        }
    }
}

fn write_vectors(out: &Path, file: &Path, vectors: &Map<String, Value>) -> Result<(), CliError> {
    let stem = file
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| CliError::InvalidInput(format!("bad file name: {}", file.display())))?;
    let target = out.join(format!("{}.json", stem));
    std::fs::write(&target, serde_json::to_string_pretty(vectors)?)?;
    Ok(())
}

fn summary_output(summary: &FillSummary, out: &Path, json: bool) -> Output {
    let failed: Vec<Value> = summary
        .failed
        .iter()
        .map(|(id, error)| json!({ "id": id, "error": error }))
        .collect();
    let mut output = Output::new(json)
        .field_usize("files", summary.files)
        .field_usize("filled", summary.filled)
        .field_usize("skipped", summary.skipped)
        .field_value("failed", Value::Array(failed))
        .field("out", &out.display().to_string());
    for (id, error) in &summary.failed {
        output = output.line(format!("FAILED {}: {}", id, error));
    }
    output.line(format!(
        "Filled {} vectors from {} files into {} ({} failed, {} skipped)",
        summary.filled,
        summary.files,
        out.display(),
        summary.failed.len(),
        summary.skipped
    ))
}
