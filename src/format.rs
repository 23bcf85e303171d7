//! Output formatting utilities for markdown and JSON.

use crate::error::{ItemError, Result};
use crate::types::{
    CleanupReport, HistoryEntry, Item, ItemStatus, LogEntry, MergeReport, PRIORITY_DEFAULT,
    StatusReport,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::str::FromStr;

/// Output format for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    Json,
    #[default]
    Markdown,
}

impl FromStr for OutputFormat {
    type Err = ItemError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(ItemError::invalid(
                "format",
                format!("unknown format '{}', expected json or markdown", other),
            )),
        }
    }
}

/// Pretty JSON for any serializable value.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Render epoch milliseconds as a UTC date-time.
pub fn format_timestamp(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| ms.to_string())
}

/// Format a state name for display (capitalize, replace underscores with spaces).
fn format_state_name(state: &str) -> String {
    state
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => first.to_uppercase().chain(chars).collect(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Format a single item as markdown.
pub fn format_item_markdown(item: &Item, unmet: &[String]) -> String {
    let mut md = String::new();

    md.push_str(&format!("## {}: {}\n", format_state_name(item.item_type.as_str()), item.title));
    md.push_str(&format!("- **id**: `{}`\n", item.id));
    md.push_str(&format!("- **project**: {}\n", item.project));
    md.push_str(&format!("- **status**: {}\n", item.status));
    md.push_str(&format!("- **priority**: {}\n", item.priority));

    if let Some(ref agent) = item.assigned_agent {
        md.push_str(&format!("- **assigned**: {}\n", agent));
    }

    if let Some(ref parent_id) = item.parent_id {
        md.push_str(&format!("- **parent_id**: `{}`\n", parent_id));
    }

    if !item.labels.is_empty() {
        md.push_str(&format!("- **labels**: {}\n", item.labels.join(", ")));
    }

    if !unmet.is_empty() {
        let blockers: Vec<String> = unmet.iter().map(|id| format!("`{}`", id)).collect();
        md.push_str(&format!("- **waiting on**: {}\n", blockers.join(", ")));
    }

    md.push_str(&format!("- **created**: {}\n", format_timestamp(item.created_at)));
    if let Some(closed_at) = item.closed_at {
        md.push_str(&format!("- **closed**: {}\n", format_timestamp(closed_at)));
    }

    if !item.description.is_empty() {
        md.push_str("\n### Description\n");
        md.push_str(&item.description);
        md.push('\n');
    }

    if let Some(ref results) = item.results {
        md.push_str("\n### Results\n");
        md.push_str(results);
        md.push('\n');
    }

    md
}

/// Format an item in short form for lists.
fn format_item_short(item: &Item) -> String {
    let priority_marker = if item.priority > PRIORITY_DEFAULT {
        "!!! "
    } else {
        ""
    };

    let agent = item
        .assigned_agent
        .as_ref()
        .map(|a| format!(" @{}", a))
        .unwrap_or_default();

    let labels = if item.labels.is_empty() {
        String::new()
    } else {
        format!(" [{}]", item.labels.join(", "))
    };

    format!("- {}{} `{}`{}{}\n", priority_marker, item.title, item.id, agent, labels)
}

/// Format a list of items as markdown, grouped by status.
pub fn format_items_markdown(items: &[Item]) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Items ({})\n\n", items.len()));

    for status in ItemStatus::ALL {
        let group: Vec<&Item> = items.iter().filter(|i| i.status == status).collect();
        if group.is_empty() {
            continue;
        }
        md.push_str(&format!("## {}\n\n", format_state_name(status.as_str())));
        for item in group {
            md.push_str(&format_item_short(item));
        }
        md.push('\n');
    }

    md
}

fn push_section(md: &mut String, title: &str, items: &[Item]) {
    md.push_str(&format!("## {} ({})\n\n", title, items.len()));
    for item in items {
        md.push_str(&format_item_short(item));
    }
    md.push('\n');
}

/// Format a project status report as markdown.
pub fn format_report_markdown(report: &StatusReport) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Status: {} ({} items)\n\n", report.project, report.total));

    md.push_str("| status | count |\n|---|---|\n");
    for (status, count) in &report.counts {
        md.push_str(&format!("| {} | {} |\n", status, count));
    }
    md.push('\n');

    push_section(&mut md, "Ready", &report.ready);
    push_section(&mut md, "In Progress", &report.in_progress);
    push_section(&mut md, "Blocked", &report.blocked);
    push_section(&mut md, "Recently Done", &report.recently_done);
    if !report.stale.is_empty() {
        push_section(&mut md, "Stale", &report.stale);
    }

    md
}

/// Format history entries as markdown, newest first as given.
pub fn format_history_markdown(entries: &[HistoryEntry]) -> String {
    let mut md = String::new();

    md.push_str(&format!("# History ({})\n\n", entries.len()));

    for entry in entries {
        let actor = entry
            .actor
            .id
            .as_ref()
            .map(|id| format!(" by {}", id))
            .unwrap_or_default();
        let change = entry
            .changes
            .as_ref()
            .map(|c| format!(": {} -> {}", c.old, c.new))
            .unwrap_or_default();
        md.push_str(&format!(
            "- {} `{}` {}{}{}\n",
            format_timestamp(entry.created_at),
            entry.item_id,
            entry.event_type,
            actor,
            change
        ));
    }

    md
}

/// Format log entries as markdown.
pub fn format_logs_markdown(item_id: &str, logs: &[LogEntry]) -> String {
    let mut md = String::new();

    md.push_str(&format!("# Log: `{}` ({})\n\n", item_id, logs.len()));
    for entry in logs {
        md.push_str(&format!("- {} {}\n", format_timestamp(entry.created_at), entry.message));
    }

    md
}

/// Format a history cleanup outcome.
pub fn format_cleanup_markdown(report: &CleanupReport) -> String {
    let verb = if report.dry_run { "Would delete" } else { "Deleted" };
    format!(
        "{} {} history entries ({} status, {} other)\n",
        verb, report.deleted_count, report.status_events, report.other_events
    )
}

/// Format a merge outcome.
pub fn format_merge_markdown(report: &MergeReport) -> String {
    let prefix = if report.dry_run { "[dry run] " } else { "" };
    format!(
        "{}Merged `{}` into `{}`: {} edges rewired, {} skipped, {} logs moved\n",
        prefix,
        report.source_id,
        report.target_id,
        report.edges_rewired,
        report.edges_skipped,
        report.logs_transferred
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemType;

    fn item(id: &str, status: ItemStatus) -> Item {
        Item {
            id: id.to_string(),
            project: "demo".to_string(),
            item_type: ItemType::Task,
            title: format!("Item {}", id),
            description: String::new(),
            status,
            priority: PRIORITY_DEFAULT,
            parent_id: None,
            assigned_agent: None,
            template_id: None,
            results: None,
            labels: vec![],
            created_at: 0,
            updated_at: 0,
            closed_at: None,
        }
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_state_name() {
        assert_eq!(format_state_name("in_progress"), "In Progress");
        assert_eq!(format_state_name("open"), "Open");
    }

    #[test]
    fn test_items_grouped_by_status() {
        let items = vec![item("a", ItemStatus::Done), item("b", ItemStatus::Open)];
        let md = format_items_markdown(&items);
        let open = md.find("## Open").unwrap();
        let done = md.find("## Done").unwrap();
        assert!(open < done);
        assert!(!md.contains("## Blocked"));
    }

    #[test]
    fn test_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
    }
}
