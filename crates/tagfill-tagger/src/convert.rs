//! Converting one document

use std::path::Path;

use tracing::{debug, info};

use crate::collect::{collect_json, collect_yaml};
use crate::error::{TaggerError, TaggerResult};
use crate::mapping::{AddressMapping, TaggerOptions};

/// Legacy filler flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillerFormat {
    /// `*Filler.yml`
    Yaml,
    /// `*Filler.json`
    Json,
}

impl FillerFormat {
    /// Format of a filler file, judged by its name
    pub fn of(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        if name.ends_with("Filler.yml") {
            Some(FillerFormat::Yaml)
        } else if name.ends_with("Filler.json") {
            Some(FillerFormat::Json)
        } else {
            None
        }
    }
}

/// Result of converting a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    /// `(address, tag)` pairs sorted by address
    pub mapping: Vec<(String, String)>,
    /// Rewritten document
    pub text: String,
}

/// Tag the addresses of a document
///
/// Returns `None` when the document declares nothing to tag.
pub fn convert_text(text: &str, format: FillerFormat, options: &TaggerOptions) -> Option<Conversion> {
    let lines: Vec<&str> = text.lines().collect();
    let collected = match format {
        FillerFormat::Yaml => collect_yaml(&lines, options.convert_coinbase),
        FillerFormat::Json => collect_json(&lines, options.convert_coinbase),
    };
    let mapping = AddressMapping::build(&collected, options);
    if mapping.is_empty() {
        return None;
    }

    Some(Conversion {
        mapping: mapping.sorted(),
        text: mapping.convert_text(text),
    })
}

/// What happened to one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Nothing to tag
    Unchanged,
    /// Dry run: the mapping that would be applied
    Planned(Vec<(String, String)>),
    /// Rewritten in place with this many tagged addresses
    Converted(usize),
}

impl FileOutcome {
    /// Whether the file counts as converted
    pub fn is_converted(&self) -> bool {
        !matches!(self, FileOutcome::Unchanged)
    }
}

/// Convert a filler file in place (or only plan it on a dry run)
pub fn convert_file(path: &Path, options: &TaggerOptions) -> TaggerResult<FileOutcome> {
    let format = FillerFormat::of(path).ok_or_else(|| TaggerError::NotAFiller(path.to_path_buf()))?;
    let text = std::fs::read_to_string(path).map_err(|e| TaggerError::io(path, e))?;

    let conversion = match convert_text(&text, format, options) {
        Some(conversion) => conversion,
        None => {
            debug!(path = %path.display(), "No addresses to tag");
            return Ok(FileOutcome::Unchanged);
        }
    };

    if options.dry_run {
        return Ok(FileOutcome::Planned(conversion.mapping));
    }

    std::fs::write(path, &conversion.text).map_err(|e| TaggerError::io(path, e))?;
    info!(path = %path.display(), tags = conversion.mapping.len(), "Converted filler");
    Ok(FileOutcome::Converted(conversion.mapping.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const YAML: &str = "\
test:
  env:
    currentCoinbase: 2adc25665018aa1fe0e6bc666dac8fc2697ff9ba
  pre:
    a94f5374fce5edbc8e2a8697c15331677e6ebf0b:
      balance: 100
      code: ''
    095e7baea6a6c7c4c2dfeb977efac326af552d87:
      code: ':raw 0x00'
  transaction:
    to: 095e7baea6a6c7c4c2dfeb977efac326af552d87
    secretKey: 45a915e4d060149eb4365960e6a7a45f334393093061116b197e3240065ff2d8
";

    #[test]
    fn test_format_of() {
        assert_eq!(FillerFormat::of(Path::new("a/addFiller.yml")), Some(FillerFormat::Yaml));
        assert_eq!(FillerFormat::of(Path::new("addFiller.json")), Some(FillerFormat::Json));
        assert_eq!(FillerFormat::of(Path::new("add.yml")), None);
        assert_eq!(FillerFormat::of(&PathBuf::from("/")), None);
    }

    #[test]
    fn test_convert_text() {
        let conversion = convert_text(YAML, FillerFormat::Yaml, &TaggerOptions::default()).unwrap();
        assert_eq!(conversion.mapping.len(), 2);
        assert!(conversion
            .text
            .contains("    <eoa:sender:0xa94f5374fce5edbc8e2a8697c15331677e6ebf0b>:\n"));
        assert!(conversion
            .text
            .contains("    to: <contract:target:0x095e7baea6a6c7c4c2dfeb977efac326af552d87>\n"));
        assert!(conversion.text.contains(
            "    secretKey: \"<eoa:sender:0x45a915e4d060149eb4365960e6a7a45f334393093061116b197e3240065ff2d8>\"\n"
        ));
        // proposer stays literal by default
        assert!(conversion
            .text
            .contains("currentCoinbase: 2adc25665018aa1fe0e6bc666dac8fc2697ff9ba\n"));
    }

    #[test]
    fn test_convert_text_is_idempotent() {
        let options = TaggerOptions::default();
        let once = convert_text(YAML, FillerFormat::Yaml, &options).unwrap();
        let twice = convert_text(&once.text, FillerFormat::Yaml, &options).unwrap();
        assert_eq!(once.text, twice.text);
    }

    #[test]
    fn test_nothing_to_tag() {
        let text = "test:\n  pre:\n    0000000000000000000000000000000000000001:\n      balance: 1\n";
        assert!(convert_text(text, FillerFormat::Yaml, &TaggerOptions::default()).is_none());
    }

    #[test]
    fn test_convert_file_dry_run_leaves_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sampleFiller.yml");
        std::fs::write(&path, YAML).unwrap();

        let options = TaggerOptions {
            dry_run: true,
            ..TaggerOptions::default()
        };
        let outcome = convert_file(&path, &options).unwrap();
        match outcome {
            FileOutcome::Planned(mapping) => {
                assert_eq!(mapping[0].0, "095e7baea6a6c7c4c2dfeb977efac326af552d87");
                assert_eq!(mapping[1].0, "a94f5374fce5edbc8e2a8697c15331677e6ebf0b");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(std::fs::read_to_string(&path).unwrap(), YAML);
    }

    #[test]
    fn test_convert_file_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sampleFiller.yml");
        std::fs::write(&path, YAML).unwrap();

        let outcome = convert_file(&path, &TaggerOptions::default()).unwrap();
        assert_eq!(outcome, FileOutcome::Converted(2));
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("<contract:target:0x095e7baea6a6c7c4c2dfeb977efac326af552d87>"));
    }

    #[test]
    fn test_convert_file_rejects_other_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "").unwrap();
        assert!(matches!(
            convert_file(&path, &TaggerOptions::default()),
            Err(TaggerError::NotAFiller(_))
        ));
    }
}
