//! Filler documents and vector generation
//!
//! A document maps test names to [`StateTestFiller`]s. Filling a test
//! produces one [`StateTestVector`] per transaction variant and fork, each
//! resolved against a fresh allocator.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tagfill_primitives::Address;
use tracing::{info, warn};

use crate::alloc::{Account, Alloc};
use crate::code::CompilerTools;
use crate::env::{Environment, EnvironmentSection};
use crate::error::{FillerError, FillerResult};
use crate::expect::ExpectSection;
use crate::forks::fork_index;
use crate::pre::PreState;
use crate::result::PostState;
use crate::table::TagTable;
use crate::transaction::{GeneralTransaction, Transaction};
use crate::types::{quote_wide_integers, OrderedMap};

/// Serialization of a filler document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// `.json`
    Json,
    /// `.yml` / `.yaml`
    Yaml,
}

impl DocumentFormat {
    /// Pick the format from a file extension
    pub fn from_path(path: &Path) -> FillerResult<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(DocumentFormat::Json),
            Some("yml") | Some("yaml") => Ok(DocumentFormat::Yaml),
            _ => Err(FillerError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// `_info` block
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Info {
    /// Free-form description
    #[serde(default)]
    pub comment: Option<String>,
    /// Markers for the surrounding test harness
    #[serde(default)]
    pub pytest_marks: Vec<String>,
}

/// One state test as written
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StateTestFiller {
    /// Metadata
    #[serde(rename = "_info", default)]
    pub info: Option<Info>,
    /// Block environment
    pub env: EnvironmentSection,
    /// Pre-state
    pub pre: PreState,
    /// Transaction family
    pub transaction: GeneralTransaction,
    /// Expectations
    pub expect: Vec<ExpectSection>,
}

/// Indexes of a transaction variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VectorIndexes {
    /// Data index
    pub data: usize,
    /// Gas index
    pub gas: usize,
    /// Value index
    pub value: usize,
}

/// Fully concrete test vector
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateTestVector {
    /// Unique id: test name, fork and indexes
    pub id: String,
    /// Test name
    pub test: String,
    /// Fork
    pub fork: String,
    /// Selected transaction variant
    pub indexes: VectorIndexes,
    /// Block environment
    pub env: Environment,
    /// Pre-state accounts
    pub pre: BTreeMap<Address, Account>,
    /// Transaction
    pub transaction: Transaction,
    /// Expected post-state
    pub post: PostState,
    /// Tag table the vector was resolved with
    pub tags: TagTable,
}

fn vector_id(test: &str, fork: &str, (d, g, v): (usize, usize, usize)) -> String {
    format!("{}[fork_{}-d{}g{}v{}]", test, fork, d, g, v)
}

impl StateTestFiller {
    /// Check the sections that carry cross-field constraints
    pub fn validate(&self) -> FillerResult<()> {
        self.transaction.validate()?;
        if self.expect.is_empty() {
            return Err(FillerError::InvalidExpect("no expect sections".to_string()));
        }
        Ok(())
    }

    /// Forks named by any expect section, in first-seen order
    pub fn valid_forks(&self) -> Vec<String> {
        let mut forks: Vec<String> = Vec::new();
        for expect in &self.expect {
            for fork in &expect.network {
                if !forks.contains(fork) {
                    forks.push(fork.clone());
                }
            }
        }
        forks
    }

    /// Every `(d, g, v)` combination of the transaction lists
    pub fn variants(&self) -> Vec<(usize, usize, usize)> {
        let tx = &self.transaction;
        let mut variants = Vec::with_capacity(tx.data.len() * tx.gas_limit.len() * tx.value.len());
        for d in 0..tx.data.len() {
            for g in 0..tx.gas_limit.len() {
                for v in 0..tx.value.len() {
                    variants.push((d, g, v));
                }
            }
        }
        variants
    }

    /// First expect section covering a variant on a fork
    pub fn find_expect(&self, dgv: (usize, usize, usize), fork: &str) -> Option<&ExpectSection> {
        let label = self.transaction.data_label(dgv.0);
        self.expect
            .iter()
            .find(|expect| expect.has_index(dgv, label) && expect.has_fork(fork))
    }

    /// Resolve one vector
    pub fn fill_vector(
        &self,
        test: &str,
        dgv: (usize, usize, usize),
        fork: &str,
        tools: &dyn CompilerTools,
    ) -> FillerResult<StateTestVector> {
        let id = vector_id(test, fork, dgv);
        let expect = self
            .find_expect(dgv, fork)
            .ok_or_else(|| FillerError::MissingExpectation(id.clone()))?;

        let mut dependencies = self.transaction.dependencies();
        dependencies.extend(self.env.dependencies());
        dependencies.extend(expect.result.dependencies());

        let mut alloc = Alloc::new();
        let tags = self.pre.resolve(&mut alloc, &dependencies, tools)?;
        let env = self.env.resolve(&tags)?;
        let exception = expect.exception_for(fork).map(str::to_string);
        let transaction = self.transaction.resolve(&tags, dgv, exception, tools)?;
        let post = expect.result.resolve(&tags, tools)?;

        let (d, g, v) = dgv;
        Ok(StateTestVector {
            id,
            test: test.to_string(),
            fork: fork.to_string(),
            indexes: VectorIndexes {
                data: d,
                gas: g,
                value: v,
            },
            env,
            pre: alloc.into_accounts(),
            transaction,
            post,
            tags,
        })
    }
}

/// The tests of one filler file, in document order
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct FillerDocument(OrderedMap<String, StateTestFiller>);

impl FillerDocument {
    /// Parse document text
    pub fn parse(text: &str, format: DocumentFormat) -> FillerResult<Self> {
        let document: FillerDocument = match format {
            DocumentFormat::Json => serde_json::from_str(text)?,
            DocumentFormat::Yaml => serde_yaml::from_str(&quote_wide_integers(text))?,
        };
        for (_, test) in document.tests() {
            test.validate()?;
        }
        Ok(document)
    }

    /// Read and parse a file, choosing the format by extension
    pub fn load(path: &Path) -> FillerResult<Self> {
        let format = DocumentFormat::from_path(path)?;
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, format)
    }

    /// Tests in document order
    pub fn tests(&self) -> &[(String, StateTestFiller)] {
        &self.0 .0
    }
}

/// Options for filling
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FillOptions {
    /// Only fill this fork
    pub fork: Option<String>,
}

/// Outcome of filling one file
#[derive(Debug, Default, Serialize)]
pub struct FillResults {
    /// File path
    pub file: String,
    /// Generated vectors
    pub filled: Vec<StateTestVector>,
    /// Cases that could not be resolved (id, reason)
    pub failed: Vec<(String, String)>,
    /// Tests not applicable to the selected fork (name, reason)
    pub skipped: Vec<(String, String)>,
}

impl FillResults {
    /// Create empty results
    pub fn new(file: String) -> Self {
        Self {
            file,
            ..Self::default()
        }
    }

    /// Cases attempted
    pub fn attempted(&self) -> usize {
        self.filled.len() + self.failed.len()
    }

    /// Whether every attempted case produced a vector
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Fill every test of a parsed document into `results`
pub fn fill_document(
    document: &FillerDocument,
    options: &FillOptions,
    tools: &dyn CompilerTools,
    results: &mut FillResults,
) -> FillerResult<()> {
    if let Some(fork) = &options.fork {
        if fork_index(fork).is_none() {
            return Err(FillerError::UnsupportedFork(fork.clone()));
        }
    }

    for (name, test) in document.tests() {
        let forks: Vec<String> = match &options.fork {
            Some(fork) if test.valid_forks().contains(fork) => vec![fork.clone()],
            Some(fork) => {
                results
                    .skipped
                    .push((name.clone(), format!("fork {} not in test", fork)));
                continue;
            }
            None => test.valid_forks(),
        };

        for dgv in test.variants() {
            for fork in &forks {
                match test.fill_vector(name, dgv, fork, tools) {
                    Ok(vector) => {
                        info!(id = %vector.id, accounts = vector.pre.len(), "Filled vector");
                        results.filled.push(vector);
                    }
                    Err(e) => {
                        let id = vector_id(name, fork, dgv);
                        warn!(id = %id, error = %e, "Failed to fill vector");
                        results.failed.push((id, e.to_string()));
                    }
                }
            }
        }
    }
    Ok(())
}

/// Load and fill one file
pub fn fill_file(
    path: &Path,
    options: &FillOptions,
    tools: &dyn CompilerTools,
) -> FillerResult<FillResults> {
    let document = FillerDocument::load(path)?;
    let mut results = FillResults::new(path.display().to_string());
    fill_document(&document, options, tools, &mut results)?;
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::NoTools;

    const DOC: &str = r#"
simpleTest:
  _info:
    comment: stores the caller
  env:
    currentCoinbase: <coinbase:miner:0x2adc25665018aa1fe0e6bc666dac8fc2697ff9ba>
    currentGasLimit: 10000000
    currentNumber: 1
    currentTimestamp: 1000
    currentBaseFee: 10
  pre:
    <eoa:sender:0xa94f5374fce5edbc8e2a8697c15331677e6ebf0b>:
      balance: 1000000000000
    <contract:target:0x0000000000000000000000000000000000001000>:
      code: ':raw 0x3360005500'
  transaction:
    data: [':raw 0x', ':label two :raw 0x01']
    gasLimit: [100000]
    gasPrice: 10
    nonce: 0
    to: <contract:target:0x0000000000000000000000000000000000001000>
    value: [0]
    secretKey: <eoa:sender:0xa94f5374fce5edbc8e2a8697c15331677e6ebf0b>
  expect:
    - indexes:
        data: 0
      network: ['>=Cancun']
      result:
        <contract:target:0x0000000000000000000000000000000000001000>:
          storage:
            0x00: <eoa:sender:0xa94f5374fce5edbc8e2a8697c15331677e6ebf0b>
"#;

    fn document() -> FillerDocument {
        FillerDocument::parse(DOC, DocumentFormat::Yaml).unwrap()
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("aFiller.yml")).unwrap(),
            DocumentFormat::Yaml
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("aFiller.json")).unwrap(),
            DocumentFormat::Json
        );
        assert!(DocumentFormat::from_path(Path::new("a.txt")).is_err());
    }

    #[test]
    fn test_valid_forks_and_variants() {
        let doc = document();
        let (name, test) = &doc.tests()[0];
        assert_eq!(name, "simpleTest");
        assert_eq!(test.valid_forks(), vec!["Cancun", "Prague", "Osaka"]);
        assert_eq!(test.variants(), vec![(0, 0, 0), (1, 0, 0)]);
        assert_eq!(
            test.info.as_ref().unwrap().comment.as_deref(),
            Some("stores the caller")
        );
    }

    #[test]
    fn test_fill_vector() {
        let doc = document();
        let (name, test) = &doc.tests()[0];
        let vector = test.fill_vector(name, (0, 0, 0), "Cancun", &NoTools).unwrap();

        let sender = vector.tags.resolve_eoa("sender").unwrap();
        let target = vector.tags.resolve_address("target").unwrap();
        assert_eq!(vector.transaction.sender, sender.address);
        assert_eq!(vector.transaction.to, Some(target));
        assert!(vector.tags.resolve_eoa("miner").is_ok());
        assert_eq!(vector.env.coinbase, vector.tags.resolve_address("miner").unwrap());
        assert_eq!(vector.pre[&target].code, vec![0x33, 0x60, 0x00, 0x55, 0x00]);
        assert_eq!(vector.id, "simpleTest[fork_Cancun-d0g0v0]");
    }

    #[test]
    fn test_wide_balance_keeps_its_digits() {
        let wide = "1000000000000000000000000000000000000000";
        let doc = DOC.replace("balance: 1000000000000", &format!("balance: {}", wide));
        let doc = FillerDocument::parse(&doc, DocumentFormat::Yaml).unwrap();
        let (name, test) = &doc.tests()[0];
        let vector = test.fill_vector(name, (0, 0, 0), "Cancun", &NoTools).unwrap();
        let sender = vector.tags.resolve_eoa("sender").unwrap();
        assert_eq!(
            vector.pre[&sender.address].balance,
            primitive_types::U256::from_dec_str(wide).unwrap()
        );
    }

    #[test]
    fn test_missing_expectation() {
        let doc = document();
        let (name, test) = &doc.tests()[0];
        assert!(matches!(
            test.fill_vector(name, (1, 0, 0), "Cancun", &NoTools),
            Err(FillerError::MissingExpectation(_))
        ));
    }

    #[test]
    fn test_fill_document_collects_failures() {
        let doc = document();
        let mut results = FillResults::new("doc".into());
        fill_document(&doc, &FillOptions::default(), &NoTools, &mut results).unwrap();
        assert_eq!(results.filled.len(), 3);
        assert_eq!(results.failed.len(), 3);
        assert_eq!(results.attempted(), 6);
        assert!(!results.is_success());
    }

    #[test]
    fn test_fork_filter() {
        let doc = document();
        let mut results = FillResults::new("doc".into());
        let options = FillOptions {
            fork: Some("Prague".into()),
        };
        fill_document(&doc, &options, &NoTools, &mut results).unwrap();
        assert_eq!(results.filled.len(), 1);
        assert_eq!(results.filled[0].fork, "Prague");

        let mut results = FillResults::new("doc".into());
        let options = FillOptions {
            fork: Some("Berlin".into()),
        };
        fill_document(&doc, &options, &NoTools, &mut results).unwrap();
        assert!(results.filled.is_empty());
        assert_eq!(results.skipped.len(), 1);
    }

    #[test]
    fn test_unknown_fork_filter() {
        let doc = document();
        let mut results = FillResults::new("doc".into());
        let options = FillOptions {
            fork: Some("Nope".into()),
        };
        assert!(matches!(
            fill_document(&doc, &options, &NoTools, &mut results),
            Err(FillerError::UnsupportedFork(_))
        ));
    }

    #[test]
    fn test_invalid_transaction_rejected_on_parse() {
        let doc = DOC.replace("    gasPrice: 10\n", "");
        assert!(matches!(
            FillerDocument::parse(&doc, DocumentFormat::Yaml),
            Err(FillerError::InvalidTransaction(_))
        ));
    }
}
