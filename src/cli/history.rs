//! History query and retention commands.

use super::Context;
use crate::db::history::RetentionPolicy;
use crate::error::{ItemError, Result};
use crate::format::{format_cleanup_markdown, format_history_markdown};
use crate::types::{EventType, HistoryQuery};
use chrono::DateTime;
use clap::Args;

/// Arguments for `history`.
#[derive(Args, Debug)]
pub struct HistoryArgs {
    /// Only events for this item
    pub id: Option<String>,

    /// Only events by this actor
    #[arg(long)]
    pub actor: Option<String>,

    /// Only events at or after this time (RFC 3339 or epoch milliseconds)
    #[arg(long, value_parser = parse_since)]
    pub since: Option<i64>,

    /// Only these event types (repeatable)
    #[arg(long = "event")]
    pub events: Vec<EventType>,

    /// Maximum number of entries (default: history.page_size)
    #[arg(long)]
    pub limit: Option<i64>,
}

/// Arguments for `cleanup-history`.
#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// Count what would be deleted without deleting
    #[arg(long)]
    pub dry_run: bool,
}

fn parse_since(s: &str) -> Result<i64> {
    if let Ok(ms) = s.parse::<i64>() {
        return Ok(ms);
    }
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.timestamp_millis())
        .map_err(|e| ItemError::invalid("since", format!("invalid timestamp '{}': {}", s, e)))
}

pub fn run_history(args: &HistoryArgs, ctx: &mut Context) -> Result<()> {
    let query = HistoryQuery {
        item_id: args.id.clone(),
        actor_id: args.actor.clone(),
        since: args.since,
        event_types: args.events.clone(),
        limit: Some(args.limit.unwrap_or(ctx.config.history.page_size)),
    };
    let entries = ctx.db.query_history(&query)?;
    ctx.emit(&entries, |entries| format_history_markdown(entries))
}

pub fn run_cleanup(args: &CleanupArgs, ctx: &mut Context) -> Result<()> {
    let policy = RetentionPolicy::from_config(&ctx.config.history);
    let report = ctx.db.cleanup_history(&policy, args.dry_run)?;
    ctx.emit(&report, format_cleanup_markdown)
}
