//! Dependency, readiness, report and merge commands.

use super::Context;
use crate::error::Result;
use crate::format::{format_items_markdown, format_merge_markdown, format_report_markdown};
use clap::{Args, Subcommand};

/// `dep` subcommands.
#[derive(Subcommand, Debug)]
pub enum DepCommand {
    /// Make ITEM depend on DEPENDS_ON
    Add { item: String, depends_on: String },
    /// Remove the edge ITEM -> DEPENDS_ON
    Remove { item: String, depends_on: String },
}

/// Arguments for `merge`.
#[derive(Args, Debug)]
pub struct MergeArgs {
    /// Item folded away
    pub source: String,

    /// Item that survives
    pub target: String,

    /// Report what would happen without changing anything
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run_dep(cmd: &DepCommand, ctx: &mut Context) -> Result<()> {
    let (item, depends_on, added) = match cmd {
        DepCommand::Add { item, depends_on } => {
            ctx.db.add_dependency(item, depends_on, &ctx.actor)?;
            (item, depends_on, true)
        }
        DepCommand::Remove { item, depends_on } => {
            ctx.db.remove_dependency(item, depends_on, &ctx.actor)?;
            (item, depends_on, false)
        }
    };

    let value = serde_json::json!({
        "item_id": item,
        "depends_on_id": depends_on,
        "present": added,
    });
    ctx.emit(&value, |_| {
        let arrow = if added { "->" } else { "-/->" };
        format!("`{}` {} `{}`\n", item, arrow, depends_on)
    })
}

pub fn run_ready(ctx: &mut Context) -> Result<()> {
    let items = ctx.db.ready_items(&ctx.project)?;
    ctx.emit(&items, |items| format_items_markdown(items))
}

pub fn run_report(ctx: &mut Context) -> Result<()> {
    let report = ctx.db.status_report(&ctx.project, &ctx.config.report)?;
    ctx.emit(&report, format_report_markdown)
}

pub fn run_merge(args: &MergeArgs, ctx: &mut Context) -> Result<()> {
    let report = ctx
        .db
        .merge_items(&args.source, &args.target, &ctx.actor, args.dry_run)?;
    ctx.emit(&report, format_merge_markdown)
}
