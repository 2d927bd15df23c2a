//! # Polargraph
//!
//! The command-line binary for the polar-graph engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │              apps/polargraph (THE BINARY)            │
//! │                                                      │
//! │  ┌─────────────┐   ┌─────────────┐   ┌───────────┐   │
//! │  │    CLI      │   │   Config    │   │   Dump    │   │
//! │  │   (clap)    │   │   (toml)    │   │  (json)   │   │
//! │  └──────┬──────┘   └──────┬──────┘   └─────┬─────┘   │
//! │         └─────────────────┼────────────────┘         │
//! │                           ▼                          │
//! │                 ┌──────────────────┐                 │
//! │                 │ polargraph-core  │                 │
//! │                 │   (THE ENGINE)   │                 │
//! │                 └──────────────────┘                 │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! polargraph order -f objects.json
//! polargraph check -f layout.json -t layout
//! polargraph routes -f layout.json --from A --to E
//! polargraph trace -f layout.json --from A --end pos
//! ```

use clap::Parser;
use polargraph::cli::{self, Cli, Commands};
use polargraph::config::{Config, LOG_FORMAT_ENV, LogFormat};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };
    let config =
        config.with_format_override(std::env::var(LOG_FORMAT_ENV).ok().as_deref());

    // RUST_LOG wins over the configured filter.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter(cli.verbose)));

    match config.log.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    // Display startup banner; dump output is always JSON
    if !cli.quiet && !cli.json_mode && !matches!(cli.command, Commands::Dump { .. }) {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli, &config) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the polargraph startup banner.
fn print_banner() {
    println!(
        r#"
  ┌─┐┌─┐┬  ┌─┐┬─┐┌─┐┬─┐┌─┐┌─┐┬ ┬
  ├─┘│ ││  ├─┤├┬┘│ ┬├┬┘├─┤├─┘├─┤
  ┴  └─┘┴─┘┴ ┴┴└─└─┘┴└─┴ ┴┴  ┴ ┴

  Polar Graph Engine v{}

  Deterministic • Cycle-safe • Transactional
"#,
        env!("CARGO_PKG_VERSION")
    );
}
