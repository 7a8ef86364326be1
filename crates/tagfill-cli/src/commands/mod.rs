//! Subcommands

pub mod convert;
pub mod fill;
