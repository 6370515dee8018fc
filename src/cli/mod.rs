//! Thin CLI binary wiring: parse arguments, load configuration, drive
//! the public façade, print results.

use anyhow::Result;
use clap::Parser;

mod args;
mod format;

pub use args::{Cli, Commands, SearchArgs, StorageArg};

use crate::config::{EngineConfig, StorageKind};
use crate::facade::SearchEngine;

/// Entry point for the CLI binary.
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let mut config = match &cli.config_path {
        Some(path) => EngineConfig::load_from_file(path)?,
        None => {
            let default_path = cli.root.join("codesearch.toml");
            EngineConfig::load_from_file(&default_path)?
        }
    };
    if let Some(storage) = cli.storage {
        config.storage = match storage {
            StorageArg::Persistent => StorageKind::Persistent,
            StorageArg::Memory => StorageKind::Memory,
        };
    }
    config.debug = config.debug || cli.debug;

    let engine = SearchEngine::open(cli.root.clone(), cli.index_path.clone(), config)?;

    match cli.command {
        Commands::Index => {
            engine.initialize()?;
            let stats = engine.stats()?;
            println!(
                "index ready: {} items, {} trigrams, {} tokens",
                stats.items, stats.distinct_trigrams, stats.distinct_tokens
            );
        }
        Commands::Refresh => {
            engine.refresh()?;
            let stats = engine.stats()?;
            println!(
                "refreshed: {} items, {} trigrams, {} tokens",
                stats.items, stats.distinct_trigrams, stats.distinct_tokens
            );
        }
        Commands::Search(search_args) => {
            engine.initialize()?;
            let results = engine.search(&search_args.query, search_args.limit)?;
            if search_args.json {
                serde_json::to_writer_pretty(std::io::stdout(), &results_as_json(&results))?;
                println!();
            } else {
                format::print_results(&results);
            }
        }
        Commands::Stats => {
            engine.initialize()?;
            let stats = engine.stats()?;
            format::print_stats(&stats);
        }
    }

    engine.shutdown()?;
    Ok(())
}

fn results_as_json(results: &[crate::query::RankedItem]) -> Vec<serde_json::Value> {
    results
        .iter()
        .map(|r| {
            serde_json::json!({
                "path": r.item.path,
                "name": r.item.name,
                "kind": r.item.kind.as_str(),
                "score": r.score,
            })
        })
        .collect()
}
