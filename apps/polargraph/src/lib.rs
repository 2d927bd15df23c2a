//! # polargraph
//!
//! Command-line front end for `polargraph-core`: loads object lists and
//! track layouts from JSON, runs the engine on them and prints the result
//! as text or JSON.

pub mod cli;
pub mod config;
pub mod dump;
