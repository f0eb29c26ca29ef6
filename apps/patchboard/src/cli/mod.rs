//! # Patchboard CLI Module
//!
//! This module implements the CLI interface for Patchboard.
//!
//! ## Available Commands
//!
//! - `new` - Write an empty canonical document
//! - `validate` - Decode a document and report every violation
//! - `stats` - Load a document and print node/edge counts
//! - `normalize` - Rewrite a document in canonical form
//! - `types` - List the registered node types
//! - `compact` - Convert between canonical JSON and binary snapshot

mod commands;

use clap::{Parser, Subcommand};
use patchboard_core::GraphError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Patchboard - Graph Document Tool
///
/// Create, validate, and convert canonical node-graph documents.
/// Every command runs the same validation the interactive engine
/// enforces; a document this tool accepts will load cleanly.
#[derive(Parser, Debug)]
#[command(name = "patchboard")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write an empty canonical document
    New {
        /// Output file path
        file: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a document, reporting every violation
    Validate {
        /// Document file path
        file: PathBuf,
    },

    /// Show node and edge counts for a document
    Stats {
        /// Document file path
        file: PathBuf,
    },

    /// Rewrite a document in canonical form
    Normalize {
        /// Document file path
        file: PathBuf,

        /// Output file path (defaults to rewriting in place)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List the registered node types
    Types,

    /// Convert between canonical JSON and binary snapshot
    Compact {
        /// Input file path
        file: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Convert binary snapshot back to canonical JSON
        #[arg(long)]
        restore: bool,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), GraphError> {
    if cli.verbose {
        tracing::info!(command = ?cli.command, "executing");
    }
    let json_mode = cli.json_mode;

    match cli.command {
        Commands::New { file, force } => cmd_new(&file, force),
        Commands::Validate { file } => cmd_validate(&file, json_mode),
        Commands::Stats { file } => cmd_stats(&file, json_mode),
        Commands::Normalize { file, output } => cmd_normalize(&file, output.as_deref()),
        Commands::Types => cmd_types(json_mode),
        Commands::Compact {
            file,
            output,
            restore,
        } => cmd_compact(&file, &output, restore),
    }
}
