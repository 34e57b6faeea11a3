//! # icgate
//!
//! Command-line surface over `icgate-core`. The binary in `main.rs` only
//! installs logging and dispatches to [`cli::execute`].

pub mod cli;
