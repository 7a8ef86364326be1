//! Expect sections
//!
//! Each section selects transaction variants by index, names the forks it
//! applies to and lists the expected accounts.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::code::parse_label;
use crate::error::{FillerError, FillerResult};
use crate::forks::expand_network;
use crate::result::ResultSection;

/// One entry of an index list
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum IndexItem {
    /// Numeric index
    Index(i64),
    /// `:label NAME`, matched against the label of the data entry
    Label(String),
}

/// Index selector for one of data, gas or value
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum IndexSelector {
    /// Single index; `-1` matches everything
    Single(i64),
    /// Any of the listed entries
    List(Vec<IndexItem>),
    /// A single label
    Label(String),
}

impl Default for IndexSelector {
    fn default() -> Self {
        IndexSelector::Single(-1)
    }
}

fn label_matches(item: &str, label: Option<&str>) -> bool {
    match (parse_label(item), label) {
        (Some(wanted), Some(label)) => wanted == label,
        _ => false,
    }
}

impl IndexSelector {
    /// Whether `index` (with its optional label) is selected
    pub fn matches(&self, index: usize, label: Option<&str>) -> bool {
        let index = index as i64;
        match self {
            IndexSelector::Single(selected) => *selected == -1 || *selected == index,
            IndexSelector::List(items) => items.iter().any(|item| match item {
                IndexItem::Index(selected) => *selected == index,
                IndexItem::Label(text) => label_matches(text, label),
            }),
            IndexSelector::Label(text) => label_matches(text, label),
        }
    }
}

/// `indexes` of an expect section
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Indexes {
    /// Data selector
    #[serde(default)]
    pub data: IndexSelector,
    /// Gas selector
    #[serde(default)]
    pub gas: IndexSelector,
    /// Value selector
    #[serde(default)]
    pub value: IndexSelector,
}

/// Exception name, or several alternatives
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum ExceptionSpec {
    One(String),
    Many(Vec<String>),
}

impl ExceptionSpec {
    fn into_string(self) -> String {
        match self {
            ExceptionSpec::One(name) => name,
            ExceptionSpec::Many(names) => names.join("|"),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawExpectSection {
    #[serde(default)]
    indexes: Indexes,
    network: Vec<String>,
    result: ResultSection,
    #[serde(default)]
    expect_exception: Option<BTreeMap<String, ExceptionSpec>>,
}

/// Expect section with networks expanded into fork names
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawExpectSection")]
pub struct ExpectSection {
    /// Index selectors
    pub indexes: Indexes,
    /// Fork names, in declaration order without duplicates
    pub network: Vec<String>,
    /// Expected accounts
    pub result: ResultSection,
    /// Expected exception per fork
    pub expect_exception: Option<BTreeMap<String, String>>,
}

impl TryFrom<RawExpectSection> for ExpectSection {
    type Error = FillerError;

    fn try_from(raw: RawExpectSection) -> FillerResult<Self> {
        let mut network = Vec::new();
        for spec in &raw.network {
            for fork in expand_network(spec)? {
                if !network.contains(&fork) {
                    network.push(fork);
                }
            }
        }

        let expect_exception = match raw.expect_exception {
            Some(specs) => {
                let mut by_fork = BTreeMap::new();
                for (spec, exception) in specs {
                    let exception = exception.into_string();
                    for fork in expand_network(&spec)? {
                        if by_fork.insert(fork.clone(), exception.clone()).is_some() {
                            return Err(FillerError::InvalidExpect(format!(
                                "fork {} has more than one expected exception",
                                fork
                            )));
                        }
                    }
                }
                Some(by_fork)
            }
            None => None,
        };

        Ok(ExpectSection {
            indexes: raw.indexes,
            network,
            result: raw.result,
            expect_exception,
        })
    }
}

impl ExpectSection {
    /// Whether this section covers the `(d, g, v)` variant
    pub fn has_index(&self, (d, g, v): (usize, usize, usize), data_label: Option<&str>) -> bool {
        self.indexes.data.matches(d, data_label)
            && self.indexes.gas.matches(g, None)
            && self.indexes.value.matches(v, None)
    }

    /// Whether this section applies to a fork
    pub fn has_fork(&self, fork: &str) -> bool {
        self.network.iter().any(|f| f == fork)
    }

    /// Exception expected on a fork, if any
    pub fn exception_for(&self, fork: &str) -> Option<&str> {
        self.expect_exception
            .as_ref()
            .and_then(|by_fork| by_fork.get(fork))
            .map(String::as_str)
    }
}
