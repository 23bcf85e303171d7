//! Aggregate project status.

use super::deps::{blocked_items_internal, ready_items_internal};
use super::items::{ITEM_COLUMNS, query_items};
use super::{Database, now_ms};
use crate::config::ReportConfig;
use crate::error::{ItemError, Result};
use crate::types::{ItemStatus, StatusReport};
use rusqlite::params;
use std::collections::BTreeMap;

impl Database {
    /// Status report for a project as of now.
    pub fn status_report(&self, project: &str, config: &ReportConfig) -> Result<StatusReport> {
        self.status_report_at(now_ms(), project, config)
    }

    /// Status report for a project as of `now` (epoch ms).
    pub fn status_report_at(
        &self,
        now: i64,
        project: &str,
        config: &ReportConfig,
    ) -> Result<StatusReport> {
        if config.recent_done_limit < 0 {
            return Err(ItemError::invalid(
                "recent_done_limit",
                "recent_done_limit cannot be negative",
            ));
        }
        let stale_cutoff = now.saturating_sub(config.stale_threshold_secs.saturating_mul(1000));

        self.with_conn(|conn| {
            let mut counts: BTreeMap<ItemStatus, i64> =
                ItemStatus::ALL.iter().map(|s| (*s, 0)).collect();

            let mut stmt = conn.prepare(
                "SELECT status, COUNT(*) FROM items WHERE project = ?1 GROUP BY status",
            )?;
            let rows = stmt
                .query_map(params![project], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            for (status, count) in rows {
                let status: ItemStatus = status.parse()?;
                counts.insert(status, count);
            }
            let total = counts.values().sum();

            let in_progress = query_items(
                conn,
                &format!(
                    "SELECT {} FROM items i WHERE i.project = ?1 AND i.status = 'in_progress'
                     ORDER BY i.priority DESC, i.created_at ASC, i.id ASC",
                    ITEM_COLUMNS
                ),
                &[&project],
            )?;

            let stale = in_progress
                .iter()
                .filter(|item| item.updated_at < stale_cutoff)
                .cloned()
                .collect();

            let recently_done = query_items(
                conn,
                &format!(
                    "SELECT {} FROM items i WHERE i.project = ?1 AND i.status = 'done'
                     ORDER BY i.closed_at DESC, i.id ASC LIMIT ?2",
                    ITEM_COLUMNS
                ),
                &[&project, &config.recent_done_limit],
            )?;

            Ok(StatusReport {
                project: project.to_string(),
                counts,
                total,
                ready: ready_items_internal(conn, project)?,
                in_progress,
                blocked: blocked_items_internal(conn, project)?,
                recently_done,
                stale,
            })
        })
    }
}
