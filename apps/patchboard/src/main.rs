//! # Patchboard - Graph Document Tool
//!
//! The main binary for the Patchboard graph engine.
//!
//! This application provides the document-file workflows around
//! `patchboard-core`: creating empty documents, validating and
//! normalizing existing ones, inspecting stats and node types, and
//! converting between the canonical JSON document and the compact
//! binary snapshot format.
//!
//! ## Usage
//!
//! ```bash
//! patchboard new patch.json
//! patchboard validate patch.json
//! patchboard stats patch.json --json-mode
//! patchboard normalize patch.json
//! patchboard compact patch.json -o patch.ptch
//! ```

mod cli;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // Initialize tracing — PATCHBOARD_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("PATCHBOARD_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "patchboard=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if let Err(e) = cli::execute(cli) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}
