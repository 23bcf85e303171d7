//! Append-only history of item events and tiered retention cleanup.

use super::{Database, begin_write, now_ms};
use crate::config::HistoryConfig;
use crate::error::{ItemError, Result};
use crate::types::{Actor, Change, CleanupReport, EventType, HistoryEntry, HistoryQuery};
use rusqlite::{Connection, params};

/// Page size used when a history query carries no limit.
pub const DEFAULT_HISTORY_PAGE_SIZE: i64 = 50;

const HOUR_MS: i64 = 60 * 60 * 1000;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Entries younger than this are never deleted, whatever their type.
pub const MIN_RETENTION_MS: i64 = DAY_MS;

/// Record an event. Callers inside a larger mutation should prefer
/// [`record_event_best_effort`].
pub(crate) fn record_event(
    conn: &Connection,
    item_id: &str,
    event: EventType,
    actor: &Actor,
    change: Option<&Change>,
) -> Result<i64> {
    let changes_json = change.map(serde_json::to_string).transpose()?;

    conn.execute(
        "INSERT INTO item_history (item_id, event_type, actor_id, actor_type, changes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            item_id,
            event.as_str(),
            &actor.id,
            &actor.kind,
            changes_json,
            now_ms(),
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

/// Record an event without letting a failure escape.
///
/// History is an audit trail, not part of the mutation: a failed insert is
/// logged and the surrounding transaction carries on.
pub(crate) fn record_event_best_effort(
    conn: &Connection,
    item_id: &str,
    event: EventType,
    actor: &Actor,
    change: Option<Change>,
) {
    if let Err(e) = record_event(conn, item_id, event, actor, change.as_ref()) {
        tracing::warn!(
            item_id = %item_id,
            event = %event,
            error = %e,
            "Failed to record history entry"
        );
    }
}

/// Decode a stored change payload, degrading to `None` when it is corrupt.
fn decode_changes(entry_id: i64, raw: Option<String>) -> Option<Change> {
    let raw = raw?;
    match serde_json::from_str::<Change>(&raw) {
        Ok(change) => Some(change),
        Err(e) => {
            tracing::debug!(entry_id, error = %e, "Ignoring undecodable history payload");
            None
        }
    }
}

/// Age thresholds for history cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Status-class events older than this are eligible.
    pub status_retention_ms: i64,
    /// All other events older than this are eligible.
    pub other_retention_ms: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::from_config(&HistoryConfig::default())
    }
}

impl RetentionPolicy {
    pub fn from_config(config: &HistoryConfig) -> Self {
        Self {
            status_retention_ms: config.status_retention_days.saturating_mul(DAY_MS),
            other_retention_ms: config.other_retention_days.saturating_mul(DAY_MS),
        }
    }

    /// Cutoff timestamps `(status, other)`: entries created strictly before
    /// a cutoff are eligible. Both honor the 24h floor.
    fn cutoffs(&self, now: i64) -> (i64, i64) {
        let floor = now - MIN_RETENTION_MS + 1;
        let status = now.saturating_sub(self.status_retention_ms).min(floor);
        let other = now.saturating_sub(self.other_retention_ms).min(floor);
        (status, other)
    }
}

fn status_class_list() -> String {
    EventType::STATUS_CLASS
        .iter()
        .map(|e| format!("'{}'", e.as_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Database {
    /// Record an event for an item. Failures are logged, never returned.
    pub fn append_history(
        &self,
        item_id: &str,
        event: EventType,
        actor: &Actor,
        change: Option<Change>,
    ) {
        let result = self.with_conn(|conn| {
            record_event_best_effort(conn, item_id, event, actor, change);
            Ok(())
        });
        if let Err(e) = result {
            tracing::warn!(item_id = %item_id, error = %e, "Failed to record history entry");
        }
    }

    /// Query history, newest first.
    pub fn query_history(&self, query: &HistoryQuery) -> Result<Vec<HistoryEntry>> {
        let limit = query.limit.unwrap_or(DEFAULT_HISTORY_PAGE_SIZE);
        if limit <= 0 {
            return Err(ItemError::invalid("limit", "limit must be positive"));
        }

        self.with_conn(|conn| {
            let mut sql = String::from(
                "SELECT id, item_id, event_type, actor_id, actor_type, changes, created_at
                 FROM item_history WHERE 1=1",
            );
            let mut param_values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(ref item_id) = query.item_id {
                sql.push_str(&format!(" AND item_id = ?{}", param_values.len() + 1));
                param_values.push(Box::new(item_id.clone()));
            }

            if let Some(ref actor_id) = query.actor_id {
                sql.push_str(&format!(" AND actor_id = ?{}", param_values.len() + 1));
                param_values.push(Box::new(actor_id.clone()));
            }

            if let Some(since) = query.since {
                sql.push_str(&format!(" AND created_at >= ?{}", param_values.len() + 1));
                param_values.push(Box::new(since));
            }

            if !query.event_types.is_empty() {
                let placeholders: Vec<String> = query
                    .event_types
                    .iter()
                    .enumerate()
                    .map(|(i, _)| format!("?{}", param_values.len() + i + 1))
                    .collect();
                sql.push_str(&format!(" AND event_type IN ({})", placeholders.join(", ")));
                for event in &query.event_types {
                    param_values.push(Box::new(event.as_str()));
                }
            }

            sql.push_str(" ORDER BY created_at DESC, id DESC");

            sql.push_str(&format!(" LIMIT ?{}", param_values.len() + 1));
            param_values.push(Box::new(limit));

            let mut stmt = conn.prepare(&sql)?;
            let param_refs: Vec<&dyn rusqlite::ToSql> =
                param_values.iter().map(|b| b.as_ref()).collect();

            let rows = stmt
                .query_map(param_refs.as_slice(), |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, i64>(6)?,
                    ))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            let mut entries = Vec::with_capacity(rows.len());
            for (id, item_id, event_type, actor_id, actor_type, changes, created_at) in rows {
                let event_type = match event_type.parse::<EventType>() {
                    Ok(event) => event,
                    Err(_) => {
                        tracing::warn!(entry_id = id, event_type = %event_type, "Skipping history entry with unknown event type");
                        continue;
                    }
                };
                entries.push(HistoryEntry {
                    id,
                    item_id,
                    event_type,
                    actor: Actor {
                        id: actor_id,
                        kind: actor_type,
                    },
                    changes: decode_changes(id, changes),
                    created_at,
                });
            }

            Ok(entries)
        })
    }

    /// Apply the retention policy against the current time.
    pub fn cleanup_history(&self, policy: &RetentionPolicy, dry_run: bool) -> Result<CleanupReport> {
        self.cleanup_history_at(now_ms(), policy, dry_run)
    }

    /// Apply the retention policy as of `now` (epoch ms).
    ///
    /// A dry run counts exactly what a real run would delete.
    pub fn cleanup_history_at(
        &self,
        now: i64,
        policy: &RetentionPolicy,
        dry_run: bool,
    ) -> Result<CleanupReport> {
        let (status_cutoff, other_cutoff) = policy.cutoffs(now);
        let class = status_class_list();
        let status_where = format!("event_type IN ({}) AND created_at < ?1", class);
        let other_where = format!("event_type NOT IN ({}) AND created_at < ?1", class);

        self.with_conn_mut(|conn| {
            let tx = begin_write(conn)?;

            let (status_events, other_events) = if dry_run {
                let count = |predicate: &str, cutoff: i64| -> Result<i64> {
                    let sql = format!("SELECT COUNT(*) FROM item_history WHERE {}", predicate);
                    Ok(tx.query_row(&sql, params![cutoff], |row| row.get(0))?)
                };
                (count(&status_where, status_cutoff)?, count(&other_where, other_cutoff)?)
            } else {
                let delete = |predicate: &str, cutoff: i64| -> Result<i64> {
                    let sql = format!("DELETE FROM item_history WHERE {}", predicate);
                    Ok(tx.execute(&sql, params![cutoff])? as i64)
                };
                (delete(&status_where, status_cutoff)?, delete(&other_where, other_cutoff)?)
            };

            if !dry_run {
                tx.commit()?;
            }

            let report = CleanupReport {
                deleted_count: status_events + other_events,
                status_events,
                other_events,
                dry_run,
            };

            tracing::info!(
                deleted = report.deleted_count,
                status_events,
                other_events,
                dry_run,
                "History cleanup"
            );

            Ok(report)
        })
    }
}
