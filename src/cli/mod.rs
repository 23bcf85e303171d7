//! CLI command definitions for item-graph
//!
//! This module defines the CLI structure using clap's derive macros.
//! The main entry point is the `Cli` struct which contains subcommands;
//! each command group lives in its own module with an `Args` struct and a
//! `run_*` function operating on a [`Context`].

pub mod graph;
pub mod history;
pub mod items;
pub mod settings;

use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::format::{OutputFormat, to_json};
use crate::types::Actor;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

/// Project used when neither `--project` nor `ITEM_GRAPH_PROJECT` is set.
pub const DEFAULT_PROJECT: &str = "default";

/// Item dependency graph and lifecycle tracker
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Path to database file (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<String>,

    /// Project to operate on (default: $ITEM_GRAPH_PROJECT or "default")
    #[arg(short, long, global = true)]
    pub project: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    /// Output format: json or markdown
    #[arg(short, long, default_value = "markdown", global = true)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a task or epic
    Create(items::CreateArgs),

    /// Show one item with its dependencies
    Show(items::ShowArgs),

    /// List items with filters
    List(items::ListArgs),

    /// Update descriptive fields of an item
    Update(items::UpdateArgs),

    /// Move an item to another status
    Status(items::StatusArgs),

    /// Mark an item done
    Complete(items::CompleteArgs),

    /// Cancel an item
    Cancel(items::CancelArgs),

    /// Return a closed or blocked item to open
    Reopen(items::ReopenArgs),

    /// Delete an item with its edges, logs and history
    Delete(items::DeleteArgs),

    /// Add or remove dependency edges
    #[command(subcommand)]
    Dep(graph::DepCommand),

    /// List items ready to start
    Ready,

    /// Aggregate project status
    Report,

    /// Query the history audit log
    History(history::HistoryArgs),

    /// Delete history past its retention window
    CleanupHistory(history::CleanupArgs),

    /// Fold one item into another
    Merge(graph::MergeArgs),

    /// Add or list freeform log entries
    #[command(subcommand)]
    Log(items::LogCommand),

    /// Read or change configuration values
    #[command(subcommand)]
    Config(settings::ConfigCommand),
}

/// Everything a command needs to run.
pub struct Context {
    pub db: Database,
    pub config: Config,
    /// File `config set` writes to.
    pub config_path: PathBuf,
    pub project: String,
    pub actor: Actor,
    pub format: OutputFormat,
}

impl Context {
    /// Print `value` as JSON, or through `markdown` otherwise.
    pub fn emit<T, F>(&self, value: &T, markdown: F) -> Result<()>
    where
        T: Serialize + ?Sized,
        F: FnOnce(&T) -> String,
    {
        match self.format {
            OutputFormat::Json => println!("{}", to_json(value)?),
            OutputFormat::Markdown => print!("{}", markdown(value)),
        }
        Ok(())
    }
}

/// Dispatch a parsed command.
pub fn run(command: Command, ctx: &mut Context) -> Result<()> {
    match command {
        Command::Create(args) => items::run_create(&args, ctx),
        Command::Show(args) => items::run_show(&args, ctx),
        Command::List(args) => items::run_list(&args, ctx),
        Command::Update(args) => items::run_update(&args, ctx),
        Command::Status(args) => items::run_status(&args, ctx),
        Command::Complete(args) => items::run_complete(&args, ctx),
        Command::Cancel(args) => items::run_cancel(&args, ctx),
        Command::Reopen(args) => items::run_reopen(&args, ctx),
        Command::Delete(args) => items::run_delete(&args, ctx),
        Command::Dep(cmd) => graph::run_dep(&cmd, ctx),
        Command::Ready => graph::run_ready(ctx),
        Command::Report => graph::run_report(ctx),
        Command::History(args) => history::run_history(&args, ctx),
        Command::CleanupHistory(args) => history::run_cleanup(&args, ctx),
        Command::Merge(args) => graph::run_merge(&args, ctx),
        Command::Log(cmd) => items::run_log(&cmd, ctx),
        Command::Config(cmd) => settings::run_config(&cmd, ctx),
    }
}
