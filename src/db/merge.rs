//! Folding one item into another.

use super::deps::has_path_internal;
use super::history::record_event_best_effort;
use super::items::require_item;
use super::logs::insert_log;
use super::{Database, begin_write, now_ms};
use crate::error::{ItemError, Result};
use crate::types::{Actor, Change, EventType, MergeReport};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashSet;

fn edge_exists(conn: &Connection, item_id: &str, depends_on_id: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM item_dependencies WHERE item_id = ?1 AND depends_on_id = ?2)",
        params![item_id, depends_on_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// IDs on the parent chain above `item_id`.
fn ancestors(conn: &Connection, item_id: &str) -> Result<HashSet<String>> {
    let mut seen = HashSet::new();
    let mut current: Option<String> = conn
        .query_row(
            "SELECT parent_id FROM items WHERE id = ?1",
            params![item_id],
            |row| row.get(0),
        )
        .optional()?
        .flatten();

    while let Some(id) = current {
        if !seen.insert(id.clone()) {
            break;
        }
        current = conn
            .query_row(
                "SELECT parent_id FROM items WHERE id = ?1",
                params![&id],
                |row| row.get(0),
            )
            .optional()?
            .flatten();
    }
    Ok(seen)
}

/// Move every edge touching `source` onto `target`, skipping duplicates.
///
/// Returns `(rewired, skipped)`.
fn rewire_edges(conn: &Connection, source: &str, target: &str, now: i64) -> Result<(i64, i64)> {
    let mut rewired = 0;
    let mut skipped = 0;

    let outgoing: Vec<String> = conn
        .prepare("SELECT depends_on_id FROM item_dependencies WHERE item_id = ?1")?
        .query_map(params![source], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;

    for dep in outgoing {
        if edge_exists(conn, target, &dep)? {
            skipped += 1;
        } else {
            conn.execute(
                "INSERT INTO item_dependencies (item_id, depends_on_id, created_at)
                 VALUES (?1, ?2, ?3)",
                params![target, &dep, now],
            )?;
            rewired += 1;
        }
    }

    let incoming: Vec<String> = conn
        .prepare("SELECT item_id FROM item_dependencies WHERE depends_on_id = ?1")?
        .query_map(params![source], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;

    for dependent in incoming {
        if edge_exists(conn, &dependent, target)? {
            skipped += 1;
        } else {
            conn.execute(
                "INSERT INTO item_dependencies (item_id, depends_on_id, created_at)
                 VALUES (?1, ?2, ?3)",
                params![&dependent, target, now],
            )?;
            rewired += 1;
        }
    }

    conn.execute(
        "DELETE FROM item_dependencies WHERE item_id = ?1 OR depends_on_id = ?1",
        params![source],
    )?;

    Ok((rewired, skipped))
}

fn merged_description(target: &str, source_id: &str, source: &str) -> String {
    if source.trim().is_empty() {
        return target.to_string();
    }
    if target.trim().is_empty() {
        return format!("Merged from {}:\n{}", source_id, source);
    }
    format!("{}\n\n---\nMerged from {}:\n{}", target, source_id, source)
}

impl Database {
    /// Fold `source_id` into `target_id` and delete the source.
    ///
    /// Rejected before any mutation when the ids are equal or a dependency
    /// path links the two in either direction. A dry run performs the same
    /// work in a transaction that is rolled back.
    pub fn merge_items(
        &self,
        source_id: &str,
        target_id: &str,
        actor: &Actor,
        dry_run: bool,
    ) -> Result<MergeReport> {
        if source_id == target_id {
            return Err(ItemError::invalid("target_id", "cannot merge an item into itself"));
        }

        self.with_conn_mut(|conn| {
            let tx = begin_write(conn)?;

            let source = require_item(&tx, source_id)?;
            let target = require_item(&tx, target_id)?;

            if has_path_internal(&tx, source_id, target_id)?
                || has_path_internal(&tx, target_id, source_id)?
            {
                return Err(ItemError::cycle(source_id, target_id).with_details(
                    "the items are linked by a dependency path; remove it before merging",
                ));
            }

            let now = now_ms();

            let (edges_rewired, edges_skipped) = rewire_edges(&tx, source_id, target_id, now)?;

            let logs_transferred = tx.execute(
                "UPDATE item_logs SET item_id = ?1 WHERE item_id = ?2",
                params![target_id, source_id],
            )? as i64;

            insert_log(
                &tx,
                target_id,
                &format!("Merged {} ({}) into {}", source_id, source.title, target_id),
            )?;

            tx.execute(
                "INSERT OR IGNORE INTO item_labels (item_id, label)
                 SELECT ?1, label FROM item_labels WHERE item_id = ?2",
                params![target_id, source_id],
            )?;

            // Children of the source move under the target unless that would loop
            let above_target = ancestors(&tx, target_id)?;
            let children: Vec<String> = tx
                .prepare("SELECT id FROM items WHERE parent_id = ?1 AND id != ?2")?
                .query_map(params![source_id, target_id], |row| row.get(0))?
                .collect::<rusqlite::Result<_>>()?;
            for child in children.iter().filter(|c| !above_target.contains(*c)) {
                tx.execute(
                    "UPDATE items SET parent_id = ?1, updated_at = ?2 WHERE id = ?3",
                    params![target_id, now, child],
                )?;
            }

            let description =
                merged_description(&target.description, source_id, &source.description);
            tx.execute(
                "UPDATE items SET description = ?1, updated_at = ?2 WHERE id = ?3",
                params![&description, now, target_id],
            )?;

            record_event_best_effort(
                &tx,
                target_id,
                EventType::Merged,
                actor,
                Some(Change::new(serde_json::Value::Null, source_id)),
            );

            tx.execute("DELETE FROM items WHERE id = ?1", params![source_id])?;

            if !dry_run {
                tx.commit()?;
            }

            tracing::info!(
                source_id = %source_id,
                target_id = %target_id,
                edges_rewired,
                edges_skipped,
                logs_transferred,
                dry_run,
                "Merged items"
            );

            Ok(MergeReport {
                source_id: source_id.to_string(),
                target_id: target_id.to_string(),
                edges_rewired,
                edges_skipped,
                logs_transferred,
                dry_run,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merged_description_preserves_target() {
        assert_eq!(
            merged_description("keep me", "task-abc", "extra"),
            "keep me\n\n---\nMerged from task-abc:\nextra"
        );
        assert_eq!(merged_description("keep me", "task-abc", "  "), "keep me");
        assert_eq!(merged_description("", "task-abc", "extra"), "Merged from task-abc:\nextra");
    }
}
