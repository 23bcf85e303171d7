//! Item commands: CRUD, status changes and logs.

use super::Context;
use crate::error::Result;
use crate::format::{format_item_markdown, format_items_markdown, format_logs_markdown};
use crate::types::{
    Item, ItemFilter, ItemStatus, ItemType, ItemUpdate, NewItem, Priority, parse_priority,
};
use clap::{Args, Subcommand};
use serde::Serialize;

/// Arguments for `create`.
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Item title
    pub title: String,

    /// Item type: task or epic
    #[arg(short = 't', long = "type", default_value = "task")]
    pub item_type: ItemType,

    /// Longer description
    #[arg(long)]
    pub description: Option<String>,

    /// Parent item ID
    #[arg(long)]
    pub parent: Option<String>,

    /// Priority: high, medium, low or an integer (higher first)
    #[arg(long, value_parser = parse_priority)]
    pub priority: Option<Priority>,

    /// Initial status (default: open)
    #[arg(long)]
    pub status: Option<ItemStatus>,

    /// Assigned agent
    #[arg(long)]
    pub assign: Option<String>,

    /// Label (repeatable)
    #[arg(long = "label")]
    pub labels: Vec<String>,
}

/// Arguments for `show`.
#[derive(Args, Debug)]
pub struct ShowArgs {
    pub id: String,
}

/// Arguments for `list`.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only items with this status (repeatable)
    #[arg(long = "status")]
    pub statuses: Vec<ItemStatus>,

    /// Only items of this type
    #[arg(short = 't', long = "type")]
    pub item_type: Option<ItemType>,

    /// Only children of this item
    #[arg(long, conflicts_with = "roots")]
    pub parent: Option<String>,

    /// Only items without a parent
    #[arg(long)]
    pub roots: bool,

    /// Only items carrying this label (repeatable, all must match)
    #[arg(long = "label")]
    pub labels: Vec<String>,

    /// Only items that depend on this item
    #[arg(long)]
    pub blocked_by: Option<String>,

    /// Only items this item depends on
    #[arg(long)]
    pub blocking: Option<String>,

    /// List across every project
    #[arg(long)]
    pub all_projects: bool,

    /// Maximum number of items
    #[arg(long)]
    pub limit: Option<i64>,
}

/// Arguments for `update`.
#[derive(Args, Debug)]
pub struct UpdateArgs {
    pub id: String,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long, value_parser = parse_priority)]
    pub priority: Option<Priority>,

    /// New parent item ID
    #[arg(long, conflicts_with = "clear_parent")]
    pub parent: Option<String>,

    /// Detach from the current parent
    #[arg(long)]
    pub clear_parent: bool,

    #[arg(long, conflicts_with = "unassign")]
    pub assign: Option<String>,

    #[arg(long)]
    pub unassign: bool,

    /// Replace labels (repeatable)
    #[arg(long = "label", conflicts_with = "clear_labels")]
    pub labels: Vec<String>,

    /// Remove all labels
    #[arg(long)]
    pub clear_labels: bool,
}

/// Arguments for `status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    pub id: String,

    /// open, in_progress, blocked, done or canceled
    pub status: ItemStatus,

    /// Cancel even when dependents still wait on this item
    #[arg(long)]
    pub force: bool,
}

/// Arguments for `complete`.
#[derive(Args, Debug)]
pub struct CompleteArgs {
    pub id: String,

    /// Outcome summary stored on the item
    #[arg(long)]
    pub results: Option<String>,
}

/// Arguments for `cancel`.
#[derive(Args, Debug)]
pub struct CancelArgs {
    pub id: String,

    /// Cancel even when dependents still wait on this item
    #[arg(long)]
    pub force: bool,
}

/// Arguments for `reopen`.
#[derive(Args, Debug)]
pub struct ReopenArgs {
    pub id: String,
}

/// Arguments for `delete`.
#[derive(Args, Debug)]
pub struct DeleteArgs {
    pub id: String,
}

/// `log` subcommands.
#[derive(Subcommand, Debug)]
pub enum LogCommand {
    /// Append a note to an item
    Add { id: String, message: String },
    /// Show an item's notes, oldest first
    List { id: String },
}

/// An item with its graph neighbourhood.
#[derive(Debug, Serialize)]
pub struct ItemDetail {
    #[serde(flatten)]
    pub item: Item,
    pub depends_on: Vec<String>,
    pub dependents: Vec<String>,
    pub unmet: Vec<String>,
    pub ready: bool,
}

fn emit_item(ctx: &Context, item: &Item) -> Result<()> {
    ctx.emit(item, |item| format_item_markdown(item, &[]))
}

pub fn run_create(args: &CreateArgs, ctx: &mut Context) -> Result<()> {
    let mut new = NewItem::new(&ctx.project, args.item_type, &args.title)
        .with_labels(args.labels.iter().cloned());
    if let Some(ref description) = args.description {
        new = new.with_description(description);
    }
    if let Some(ref parent) = args.parent {
        new = new.with_parent(parent);
    }
    if let Some(priority) = args.priority {
        new = new.with_priority(priority);
    }
    new.status = args.status;
    new.assigned_agent = args.assign.clone();

    let ids = ctx.config.ids_for(&ctx.project).clone();
    let item = ctx.db.create_item(new, &ids, &ctx.actor)?;
    emit_item(ctx, &item)
}

pub fn run_show(args: &ShowArgs, ctx: &mut Context) -> Result<()> {
    let item = ctx.db.require_item(&args.id)?;
    let detail = ItemDetail {
        depends_on: ctx.db.dependencies_of(&item.id)?,
        dependents: ctx.db.dependents_of(&item.id)?,
        unmet: ctx.db.unmet_dependencies(&item.id)?,
        ready: ctx.db.is_ready(&item.id)?,
        item,
    };
    ctx.emit(&detail, |d| {
        let mut md = format_item_markdown(&d.item, &d.unmet);
        if !d.dependents.is_empty() {
            md.push_str(&format!("\n**Dependents**: {}\n", d.dependents.join(", ")));
        }
        md
    })
}

pub fn run_list(args: &ListArgs, ctx: &mut Context) -> Result<()> {
    let parent_id = if args.roots {
        Some(None)
    } else {
        args.parent.clone().map(Some)
    };
    let filter = ItemFilter {
        project: (!args.all_projects).then(|| ctx.project.clone()),
        statuses: args.statuses.clone(),
        item_type: args.item_type,
        parent_id,
        labels: args.labels.clone(),
        blocked_by: args.blocked_by.clone(),
        blocking: args.blocking.clone(),
        limit: args.limit,
    };
    let items = ctx.db.list_items(&filter)?;
    ctx.emit(&items, |items| format_items_markdown(items))
}

pub fn run_update(args: &UpdateArgs, ctx: &mut Context) -> Result<()> {
    let update = ItemUpdate {
        title: args.title.clone(),
        description: args.description.clone(),
        priority: args.priority,
        parent_id: if args.clear_parent {
            Some(None)
        } else {
            args.parent.clone().map(Some)
        },
        assigned_agent: if args.unassign {
            Some(None)
        } else {
            args.assign.clone().map(Some)
        },
        labels: if args.clear_labels {
            Some(Vec::new())
        } else if args.labels.is_empty() {
            None
        } else {
            Some(args.labels.clone())
        },
    };
    let item = ctx.db.update_item(&args.id, update, &ctx.actor)?;
    emit_item(ctx, &item)
}

pub fn run_status(args: &StatusArgs, ctx: &mut Context) -> Result<()> {
    let item = ctx.db.transition(&args.id, args.status, args.force, &ctx.actor)?;
    emit_item(ctx, &item)
}

pub fn run_complete(args: &CompleteArgs, ctx: &mut Context) -> Result<()> {
    let item = ctx.db.complete_item(&args.id, args.results.clone(), &ctx.actor)?;
    emit_item(ctx, &item)
}

pub fn run_cancel(args: &CancelArgs, ctx: &mut Context) -> Result<()> {
    let item = ctx.db.cancel_item(&args.id, args.force, &ctx.actor)?;
    emit_item(ctx, &item)
}

pub fn run_reopen(args: &ReopenArgs, ctx: &mut Context) -> Result<()> {
    let item = ctx.db.reopen_item(&args.id, &ctx.actor)?;
    emit_item(ctx, &item)
}

pub fn run_delete(args: &DeleteArgs, ctx: &mut Context) -> Result<()> {
    ctx.db.delete_item(&args.id)?;
    ctx.emit(&serde_json::json!({ "deleted": &args.id }), |_| {
        format!("Deleted `{}`\n", args.id)
    })
}

pub fn run_log(cmd: &LogCommand, ctx: &mut Context) -> Result<()> {
    match cmd {
        LogCommand::Add { id, message } => {
            let entry = ctx.db.add_log(id, message)?;
            ctx.emit(&entry, |e| format!("Logged on `{}`: {}\n", e.item_id, e.message))
        }
        LogCommand::List { id } => {
            let logs = ctx.db.list_logs(id)?;
            ctx.emit(&logs, |logs| format_logs_markdown(id, logs))
        }
    }
}
