//! # tagfill-tagger
//!
//! Rewrites the literal addresses of legacy state test fillers into tags,
//! so the fillers can be resolved against freshly allocated accounts.
//!
//! Conversion is two-pass and file-local:
//!
//! 1. [`collect`] scans the `pre`, `env` and `transaction` sections for
//!    addresses and notes which pre-state accounts carry code
//! 2. [`AddressMapping`] assigns tags and rewrites every occurrence
//!
//! Inside `:raw` payloads an address is only rewritten when its shape
//! suggests a reference rather than a crafted number (see [`entropy`]).

#![warn(missing_docs)]
#![warn(clippy::all)]

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static PATTERN: OnceLock<Regex> = OnceLock::new();
            PATTERN.get_or_init(|| Regex::new($pattern).expect("valid regex"))
        }
    };
}

pub mod batch;
pub mod collect;
pub mod convert;
pub mod entropy;
pub mod error;
pub mod mapping;

pub use batch::{convert_path, find_fillers, BatchReport, FillerFiles, INCOMPATIBLE_FILLERS};
pub use collect::Collected;
pub use convert::{convert_file, convert_text, Conversion, FileOutcome, FillerFormat};
pub use entropy::{replaceable_in_raw, AddressShape};
pub use error::{TaggerError, TaggerResult};
pub use mapping::{AddressMapping, TaggerOptions, KNOWN_SECRET_KEY, KNOWN_SENDER_ADDRESS};
