//! Command dispatch for `indexctl`.
//!
//! Each subcommand builds (or reuses) a [`PartialIndex`] / [`QueryRegistry`]
//! pair and prints one query's result; this is a manual driver, not a
//! JSON-RPC server loop.

use crate::cli::args::{Cli, Commands};
use crate::config::Settings;
use crate::error::{IndexError, IndexResult};
use crate::index::PartialIndex;
use crate::logging;
use crate::registry::QueryRegistry;
use crate::types::Position;
use std::sync::Arc;
use tracing::info;

pub fn run(cli: Cli) -> IndexResult<()> {
    let settings = Settings::load().unwrap_or_else(|e| {
        eprintln!("configuration error: {e}, using defaults");
        Settings::default()
    });
    logging::init_with_config(&settings.logging);

    let index_folder = cli.workspace.join(&settings.index_folder);
    let index = Arc::new(PartialIndex::with_scanner_config(
        index_folder,
        settings.scanner.start_bucket_size,
        settings.scanner.bucket_count,
        settings.scanner.max_concurrency,
    ));
    let registry = QueryRegistry::new(Arc::clone(&index), cli.workspace.clone());

    match cli.command {
        Commands::Load { parallel } => load(&index, parallel),
        Commands::Definition { uri, line, column } => definition(&registry, &uri, line, column),
        Commands::References { uri, line, column } => references(&registry, &uri, line, column),
        Commands::Hover { uri, line, column } => hover(&registry, &uri, line, column),
        Commands::DocumentSymbols { uri } => document_symbols(&registry, &uri),
        Commands::Implementation { uri, line, column } => {
            implementation(&registry, &uri, line, column)
        }
        Commands::Tidy => tidy(&index),
    }
}

fn pos(line: u32, column: u32) -> Position {
    Position {
        line,
        character: column,
    }
}

fn load(index: &PartialIndex, parallel: bool) -> IndexResult<()> {
    info!(target: "cli", parallel, folder = %index.index_folder().display(), "loading index folder");
    match index.load_index_folder(parallel) {
        Ok(()) => {
            println!("loaded index folder: {}", index.index_folder().display());
            Ok(())
        }
        Err(e @ IndexError::Aggregate(ref errors)) => {
            eprintln!("{} file(s) failed to load:", errors.len());
            for err in errors {
                eprintln!("  - {err}");
            }
            Err(e)
        }
        Err(e) => Err(e),
    }
}

fn definition(registry: &QueryRegistry, uri: &str, line: u32, column: u32) -> IndexResult<()> {
    match registry.definition(uri, pos(line, column))? {
        Some((source, Some(def))) => {
            println!("source: {:?}", source.location);
            println!("definition: {:?}", def.location);
        }
        Some((source, None)) => {
            println!("source: {:?}", source.location);
            println!("definition: not found");
        }
        None => println!("no symbol at position"),
    }
    Ok(())
}

fn references(registry: &QueryRegistry, uri: &str, line: u32, column: u32) -> IndexResult<()> {
    let locations = registry.references(uri, pos(line, column))?;
    if locations.is_empty() {
        println!("no references found");
    } else {
        println!("{} reference(s):", locations.len());
        for loc in locations {
            println!("  {} {:?}", loc.uri, loc.range);
        }
    }
    Ok(())
}

fn hover(registry: &QueryRegistry, uri: &str, line: u32, column: u32) -> IndexResult<()> {
    match registry.hover(uri, pos(line, column))? {
        Some((docs, occ)) if !docs.is_empty() => println!("{docs}\n  at {:?}", occ.range),
        Some((_, occ)) => println!("(no documentation)\n  at {:?}", occ.range),
        None => println!("no symbol at position"),
    }
    Ok(())
}

fn document_symbols(registry: &QueryRegistry, uri: &str) -> IndexResult<()> {
    let symbols = registry.document_symbols(uri)?;
    if symbols.is_empty() {
        println!("no symbols found");
    } else {
        for sym in symbols {
            let name = sym
                .symbol_information
                .map(|i| i.display_name)
                .unwrap_or_default();
            println!("  {name} {:?}", sym.location.range);
        }
    }
    Ok(())
}

fn implementation(registry: &QueryRegistry, uri: &str, line: u32, column: u32) -> IndexResult<()> {
    let locations = registry.implementation(uri, pos(line, column))?;
    if locations.is_empty() {
        println!("no implementations found");
    } else {
        println!("{} implementation(s):", locations.len());
        for loc in locations {
            println!("  {} {:?}", loc.uri, loc.range);
        }
    }
    Ok(())
}

fn tidy(index: &PartialIndex) -> IndexResult<()> {
    index.tidy()?;
    println!("tidy complete");
    Ok(())
}
