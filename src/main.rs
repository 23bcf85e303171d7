//! item-graph command line
//!
//! Tracks tasks and epics linked by blocking dependencies in an embedded
//! SQLite store.

use anyhow::Result;
use clap::Parser;
use item_graph::cli::{self, Cli, Context, DEFAULT_PROJECT};
use item_graph::config::Config;
use item_graph::db::Database;
use item_graph::format::{OutputFormat, to_json};
use item_graph::logging;
use item_graph::types::Actor;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};

/// Actor attached to history entries written by this process.
fn actor_from_env() -> Actor {
    Actor {
        id: std::env::var("ITEM_GRAPH_ACTOR_ID").ok().filter(|s| !s.is_empty()),
        kind: std::env::var("ITEM_GRAPH_ACTOR_TYPE")
            .ok()
            .filter(|s| !s.is_empty()),
    }
}

fn build_context(cli: &Cli) -> Result<Context> {
    let config_path = Config::resolve_path(cli.config.as_deref().map(Path::new));
    let mut config = Config::load_from(&config_path)?;

    // Override paths from CLI arguments
    if let Some(db_path) = &cli.database {
        config.store.db_path = PathBuf::from(db_path);
    }

    config.ensure_db_dir()?;
    let db = Database::open(&config.store.db_path)?;

    info!("Database: {:?}", config.store.db_path);
    debug!("Config: {:?}", config_path);

    let project = cli
        .project
        .clone()
        .or_else(|| std::env::var("ITEM_GRAPH_PROJECT").ok())
        .filter(|p| !p.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PROJECT.to_string());

    Ok(Context {
        db,
        config,
        config_path,
        project,
        actor: actor_from_env(),
        format: cli.format,
    })
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    logging::init(&cli.log, cli.verbose)?;

    let format = cli.format;
    let outcome = build_context(&cli).and_then(|mut ctx| Ok(cli::run(cli.command, &mut ctx)?));

    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            match e.downcast::<item_graph::error::ItemError>() {
                Ok(err) => match format {
                    OutputFormat::Json => println!("{}", to_json(&err)?),
                    OutputFormat::Markdown => {
                        eprintln!("error [{}]: {}", err.code, err.message);
                        if let Some(details) = err.details {
                            eprintln!("  {}", details);
                        }
                    }
                },
                Err(other) => eprintln!("error: {:#}", other),
            }
            Ok(ExitCode::FAILURE)
        }
    }
}
