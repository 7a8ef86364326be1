//! # tagfill-filler
//!
//! Turns symbolic state test fillers into concrete test vectors.
//!
//! A filler names accounts with tags (`<contract:target>`, `<eoa:sender:0x..>`)
//! instead of fixed addresses and writes code in several dialects. Filling
//! a test:
//!
//! 1. resolves the pre-state in dependency order through an [`Allocator`],
//!    producing a [`TagTable`]
//! 2. substitutes every tag in the environment, transaction and expected
//!    post-state
//! 3. compiles code strings with [`SymbolicCode`], calling out to external
//!    compilers through [`CompilerTools`] when needed
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use tagfill_filler::{fill_file, FillOptions, SystemTools};
//!
//! let results = fill_file(
//!     Path::new("stExample/exampleFiller.yml"),
//!     &FillOptions::default(),
//!     &SystemTools::default(),
//! )?;
//! println!("{} vectors, {} failed", results.filled.len(), results.failed.len());
//! # Ok::<(), tagfill_filler::FillerError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod account;
pub mod alloc;
pub mod code;
pub mod env;
pub mod error;
pub mod expect;
pub mod filler;
pub mod forks;
pub mod pre;
pub mod result;
pub mod table;
pub mod tag;
pub mod transaction;
pub mod types;

pub use account::{AccountDeclaration, ExpectedAccount, PostAccount};
pub use alloc::{Account, AccountProperties, Alloc, AllocConfig, Allocator};
pub use code::{CompilerTools, NoTools, SymbolicCode, SystemTools, YulOptions};
pub use env::{Environment, EnvironmentSection};
pub use error::{FillerError, FillerResult};
pub use expect::ExpectSection;
pub use filler::{
    fill_document, fill_file, DocumentFormat, FillOptions, FillResults, FillerDocument,
    StateTestFiller, StateTestVector,
};
pub use forks::{expand_network, FORKS};
pub use pre::PreState;
pub use result::{PostState, ResultSection};
pub use table::{Eoa, Identity, TagTable};
pub use tag::{AddressOrTag, Tag, TagKind};
pub use transaction::{GeneralTransaction, Transaction};
