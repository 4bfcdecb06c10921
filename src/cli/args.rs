//! CLI argument parsing using clap.
//!
//! `indexctl`: a thin manual driver over [`crate::index::PartialIndex`] and
//! [`crate::registry::QueryRegistry`] — load a folder of `.scip` files, then
//! run one query and print the result. Not an LSP/JSON-RPC transport.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "indexctl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Manual driver for the partial lazily-loaded code index")]
pub struct Cli {
    /// Workspace root; index files are discovered under `<root>/<index-folder>`
    #[arg(short, long, global = true, default_value = ".")]
    pub workspace: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load every `.scip` file under the configured index folder
    Load {
        /// Scan files concurrently instead of sequentially
        #[arg(long)]
        parallel: bool,
    },

    /// Go to the definition of the symbol at a position
    Definition {
        /// File URI, e.g. file:///workspace/src/main.rs
        uri: String,
        line: u32,
        column: u32,
    },

    /// List references to the symbol at a position
    References {
        uri: String,
        line: u32,
        column: u32,
    },

    /// Show hover documentation for the symbol at a position
    Hover {
        uri: String,
        line: u32,
        column: u32,
    },

    /// List definitions in a document
    DocumentSymbols {
        uri: String,
    },

    /// List implementations of the symbol at a position
    Implementation {
        uri: String,
        line: u32,
        column: u32,
    },

    /// Prune stale prefix-tree nodes left by superseded document loads
    Tidy,
}
