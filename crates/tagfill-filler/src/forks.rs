//! Fork names and network specifiers

use crate::error::{FillerError, FillerResult};

/// Known forks, oldest first
pub const FORKS: &[&str] = &[
    "Frontier",
    "Homestead",
    "Byzantium",
    "Constantinople",
    "ConstantinopleFix",
    "Istanbul",
    "MuirGlacier",
    "Berlin",
    "London",
    "ArrowGlacier",
    "GrayGlacier",
    "Paris",
    "Shanghai",
    "Cancun",
    "Prague",
    "Osaka",
];

/// Historical names accepted in documents
const ALIASES: &[(&str, &str)] = &[("EIP158", "Byzantium")];

/// Position of a fork in [`FORKS`]
pub fn fork_index(name: &str) -> Option<usize> {
    FORKS.iter().position(|fork| *fork == name)
}

fn canonical(name: &str) -> &str {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map_or(name, |(_, fork)| *fork)
}

/// Expand a specifier such as `>=Cancun` into fork names
///
/// Supported prefixes are `<`, `<=`, `>` and `>=`; without one the
/// specifier names a single fork.
pub fn expand_network(spec: &str) -> FillerResult<Vec<String>> {
    let spec = spec.trim();
    let (operator, name) = ["<=", ">=", "<", ">"]
        .iter()
        .find_map(|op| spec.strip_prefix(op).map(|rest| (*op, rest)))
        .unwrap_or(("", spec));
    let name = canonical(name.trim());
    let index = fork_index(name).ok_or_else(|| FillerError::UnsupportedFork(name.to_string()))?;

    let selected = match operator {
        ">=" => &FORKS[index..],
        ">" => &FORKS[index + 1..],
        "<=" => &FORKS[..=index],
        "<" => &FORKS[..index],
        _ => &FORKS[index..=index],
    };
    Ok(selected.iter().map(|fork| fork.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact() {
        assert_eq!(expand_network("Cancun").unwrap(), vec!["Cancun"]);
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(expand_network(">=Prague").unwrap(), vec!["Prague", "Osaka"]);
        assert_eq!(expand_network(">Prague").unwrap(), vec!["Osaka"]);
        assert_eq!(
            expand_network("<=Homestead").unwrap(),
            vec!["Frontier", "Homestead"]
        );
        assert_eq!(expand_network("<Homestead").unwrap(), vec!["Frontier"]);
    }

    #[test]
    fn test_alias() {
        assert_eq!(expand_network("EIP158").unwrap(), vec!["Byzantium"]);
        assert_eq!(expand_network(">=EIP158").unwrap().len(), FORKS.len() - 2);
    }

    #[test]
    fn test_unknown_fork() {
        assert!(matches!(
            expand_network(">=Merge"),
            Err(FillerError::UnsupportedFork(name)) if name == "Merge"
        ));
    }

    #[test]
    fn test_fork_order() {
        assert!(fork_index("Berlin").unwrap() < fork_index("London").unwrap());
        assert_eq!(fork_index("Nope"), None);
    }
}
