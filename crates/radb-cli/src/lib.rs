//! radb CLI library
//!
//! Argument handling, terminal input and output formatting for the `radb`
//! binary. The protocol work lives in `radb-core`.

pub mod commands;
pub mod input;
pub mod output;
