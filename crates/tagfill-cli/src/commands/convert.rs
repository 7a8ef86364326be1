//! Legacy filler conversion

use std::path::PathBuf;

use clap::Args;
use serde_json::{json, Map, Value};
use tagfill_tagger::{convert_path, BatchReport, TaggerOptions};

use crate::{config::Config, output::Output, CliError};

/// Rewrite literal addresses in legacy fillers into tags
#[derive(Debug, Args)]
pub struct ConvertCommand {
    /// Filler file, or directory searched for `*Filler.yml` / `*Filler.json`
    #[arg(default_value = "tests/static")]
    pub path: PathBuf,

    /// Show the planned mappings without modifying files
    #[arg(long)]
    pub dry_run: bool,

    /// Also tag the block proposer (`currentCoinbase`)
    #[arg(long)]
    pub convert_coinbase: bool,
}

impl ConvertCommand {
    pub fn execute(self, config: &Config, json: bool) -> Result<(), CliError> {
        let options = TaggerOptions {
            convert_coinbase: self.convert_coinbase || config.convert_coinbase,
            dry_run: self.dry_run,
        };
        let report = convert_path(&self.path, &options)?;
        report_output(&report, options.dry_run, json).print();
        Ok(())
    }
}

fn paths(paths: &[PathBuf]) -> Value {
    Value::Array(
        paths
            .iter()
            .map(|p| Value::String(p.display().to_string()))
            .collect(),
    )
}

fn report_output(report: &BatchReport, dry_run: bool, json: bool) -> Output {
    let planned: Map<String, Value> = report
        .planned
        .iter()
        .map(|(path, mapping)| {
            let mapping: Map<String, Value> = mapping
                .iter()
                .map(|(address, tag)| (address.clone(), Value::String(tag.clone())))
                .collect();
            (path.display().to_string(), Value::Object(mapping))
        })
        .collect();
    let failed: Vec<Value> = report
        .failed
        .iter()
        .map(|(path, error)| json!({ "path": path.display().to_string(), "error": error }))
        .collect();

    let mut output = Output::new(json)
        .field_usize("yaml_found", report.yaml_found)
        .field_usize("json_found", report.json_found)
        .field_value("converted_yaml", paths(&report.converted_yaml))
        .field_value("converted_json", paths(&report.converted_json))
        .field_value("failed", Value::Array(failed))
        .line(format!("Found {} YAML filler files", report.yaml_found))
        .line(format!("Found {} JSON filler files", report.json_found));

    if dry_run {
        output = output.field_value("planned", Value::Object(planned));
        for (path, mapping) in &report.planned {
            output = output
                .line("")
                .line(format!("File: {}", path.display()))
                .line("Address mappings:");
            for (address, tag) in mapping {
                output = output.line(format!("  {} -> {}", address, tag));
            }
        }
    } else {
        for path in &report.converted_yaml {
            output = output.line(format!("Converted YAML: {}", path.display()));
        }
        for path in &report.converted_json {
            output = output.line(format!("Converted JSON: {}", path.display()));
        }
    }

    for (path, error) in &report.failed {
        output = output.line(format!("Error converting {}: {}", path.display(), error));
    }

    output.line("").line(format!(
        "Summary: Converted {} YAML files and {} JSON files",
        report.converted_yaml.len(),
        report.converted_json.len()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> BatchReport {
        BatchReport {
            yaml_found: 2,
            json_found: 0,
            converted_yaml: vec![PathBuf::from("aFiller.yml")],
            planned: vec![(
                PathBuf::from("aFiller.yml"),
                vec![("aa".repeat(20), format!("<eoa:0x{}>", "aa".repeat(20)))],
            )],
            failed: vec![(PathBuf::from("bFiller.yml"), "bad".to_string())],
            ..BatchReport::default()
        }
    }

    #[test]
    fn test_dry_run_text() {
        let text = report_output(&report(), true, false).render();
        assert!(text.starts_with("Found 2 YAML filler files\nFound 0 JSON filler files"));
        assert!(text.contains("File: aFiller.yml\nAddress mappings:\n  aaaa"));
        assert!(text.contains("Error converting bFiller.yml: bad"));
        assert!(text.ends_with("Summary: Converted 1 YAML files and 0 JSON files"));
    }

    #[test]
    fn test_json_fields() {
        let value: Value = serde_json::from_str(&report_output(&report(), true, true).render()).unwrap();
        assert_eq!(value["yaml_found"], 2);
        assert_eq!(value["converted_yaml"][0], "aFiller.yml");
        assert_eq!(value["failed"][0]["error"], "bad");
        assert!(value["planned"]["aFiller.yml"].is_object());
    }
}
