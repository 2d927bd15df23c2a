//! # Polargraph CLI Module
//!
//! This module implements the CLI interface for polargraph.
//!
//! ## Available Commands
//!
//! - `order` - Print the evaluation order of an object list
//! - `check` - Validate an object list or a track layout
//! - `dependents` - List the objects downstream of one object
//! - `routes` - List every route between two points of a layout
//! - `trace` - Follow the current switch positions from a point
//! - `dump` - Print the structure of a loaded graph as JSON

mod commands;

use crate::config::Config;
use clap::{Parser, Subcommand};
use polargraph_core::GraphError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Polargraph - two-sided topology graphs
///
/// Orders object re-evaluation, detects dependency cycles and enumerates
/// routes through track layouts.
#[derive(Parser, Debug)]
#[command(name = "polargraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the evaluation order of an object list
    Order {
        /// Path to the object list (JSON)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Validate an object list or a track layout
    Check {
        /// Path to the input file (JSON)
        #[arg(short, long)]
        file: PathBuf,

        /// Input kind (objects, layout)
        #[arg(short = 't', long, default_value = "objects")]
        kind: String,
    },

    /// List the objects that depend on one object
    Dependents {
        /// Path to the object list (JSON)
        #[arg(short, long)]
        file: PathBuf,

        /// Object name
        #[arg(short, long)]
        object: String,
    },

    /// List every route between two points of a layout
    Routes {
        /// Path to the track layout (JSON)
        #[arg(short, long)]
        file: PathBuf,

        /// Start point
        #[arg(long)]
        from: String,

        /// End point
        #[arg(long)]
        to: String,
    },

    /// Follow the current switch positions from a point
    Trace {
        /// Path to the track layout (JSON)
        #[arg(short, long)]
        file: PathBuf,

        /// Start point
        #[arg(long)]
        from: String,

        /// Side to leave the start point through (neg, pos)
        #[arg(short, long, default_value = "pos")]
        end: String,
    },

    /// Print the structure of a loaded graph as JSON
    Dump {
        /// Path to the input file (JSON)
        #[arg(short, long)]
        file: PathBuf,

        /// Input kind (objects, layout)
        #[arg(short = 't', long, default_value = "objects")]
        kind: String,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli, config: &Config) -> Result<(), GraphError> {
    let json_mode = cli.json_mode;
    let limits = &config.limits;

    match cli.command {
        Commands::Order { file } => cmd_order(&file, limits, json_mode),
        Commands::Check { file, kind } => cmd_check(&file, &kind, limits, json_mode),
        Commands::Dependents { file, object } => {
            cmd_dependents(&file, &object, limits, json_mode)
        }
        Commands::Routes { file, from, to } => cmd_routes(&file, &from, &to, limits, json_mode),
        Commands::Trace { file, from, end } => cmd_trace(&file, &from, &end, limits, json_mode),
        Commands::Dump { file, kind } => cmd_dump(&file, &kind, limits),
    }
}
