//! Converting a tree of fillers

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::convert::{convert_file, FileOutcome, FillerFormat};
use crate::error::{TaggerError, TaggerResult};
use crate::mapping::TaggerOptions;

/// Fillers that do not survive conversion
pub const INCOMPATIBLE_FILLERS: [&str; 7] = [
    "suicideNonConstFiller.yml",
    "createNonConstFiller.yml",
    "CrashingTransactionFiller.json",
    "invalidAddrFiller.yml",
    "measureGasFiller.yml",
    "operationDiffGasFiller.yml",
    "undefinedOpcodeFirstByteFiller.yml",
];

fn is_incompatible(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map_or(false, |name| INCOMPATIBLE_FILLERS.contains(&name))
}

/// Filler files found under a path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillerFiles {
    /// `*Filler.yml`, sorted
    pub yaml: Vec<PathBuf>,
    /// `*Filler.json`, sorted
    pub json: Vec<PathBuf>,
}

impl FillerFiles {
    fn push(&mut self, path: PathBuf) {
        if is_incompatible(&path) {
            debug!(path = %path.display(), "Skipping incompatible filler");
            return;
        }
        match FillerFormat::of(&path) {
            Some(FillerFormat::Yaml) => self.yaml.push(path),
            Some(FillerFormat::Json) => self.json.push(path),
            None => {}
        }
    }
}

/// Find fillers: `path` itself if it is a file, else every filler below it
pub fn find_fillers(path: &Path) -> TaggerResult<FillerFiles> {
    let mut files = FillerFiles::default();
    if path.is_file() {
        files.push(path.to_path_buf());
        return Ok(files);
    }

    files.collect(path, WalkDir::new(path))?;
    files.yaml.sort();
    files.json.sort();
    Ok(files)
}

impl FillerFiles {
    /// Push the files of a traversal of `root`
    ///
    /// Only a failure on the root itself is fatal; unreadable entries
    /// below it are logged and skipped.
    fn collect<I>(&mut self, root: &Path, entries: I) -> TaggerResult<()>
    where
        I: IntoIterator<Item = walkdir::Result<DirEntry>>,
    {
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) if source.depth() == 0 => {
                    return Err(TaggerError::Walk {
                        path: root.to_path_buf(),
                        source,
                    })
                }
                Err(err) => {
                    let at = err.path().unwrap_or(root).display().to_string();
                    warn!(path = %at, error = %err, "Skipping unreadable entry");
                    continue;
                }
            };
            if entry.file_type().is_file() {
                self.push(entry.into_path());
            }
        }
        Ok(())
    }
}

/// Outcome of a batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// YAML fillers found
    pub yaml_found: usize,
    /// JSON fillers found
    pub json_found: usize,
    /// YAML fillers converted (or planned)
    pub converted_yaml: Vec<PathBuf>,
    /// JSON fillers converted (or planned)
    pub converted_json: Vec<PathBuf>,
    /// Dry run mappings per file
    pub planned: Vec<(PathBuf, Vec<(String, String)>)>,
    /// Files that failed, with the reason
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchReport {
    fn record(&mut self, path: &Path, format: FillerFormat, outcome: FileOutcome) {
        if !outcome.is_converted() {
            return;
        }
        match format {
            FillerFormat::Yaml => self.converted_yaml.push(path.to_path_buf()),
            FillerFormat::Json => self.converted_json.push(path.to_path_buf()),
        }
        if let FileOutcome::Planned(mapping) = outcome {
            self.planned.push((path.to_path_buf(), mapping));
        }
    }
}

/// Convert every filler under `path`
///
/// A failing file is recorded and the batch carries on.
pub fn convert_path(path: &Path, options: &TaggerOptions) -> TaggerResult<BatchReport> {
    let files = find_fillers(path)?;
    let mut report = BatchReport {
        yaml_found: files.yaml.len(),
        json_found: files.json.len(),
        ..BatchReport::default()
    };

    let all = files
        .yaml
        .iter()
        .map(|p| (p, FillerFormat::Yaml))
        .chain(files.json.iter().map(|p| (p, FillerFormat::Json)));
    for (file, format) in all {
        match convert_file(file, options) {
            Ok(outcome) => report.record(file, format, outcome),
            Err(e) => {
                warn!(path = %file.display(), error = %e, "Failed to convert filler");
                report.failed.push((file.clone(), e.to_string()));
            }
        }
    }
    Ok(report)
}
