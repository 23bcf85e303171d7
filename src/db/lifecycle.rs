//! Status transitions and their side effects.

use super::deps::{dependents_internal, unmet_dependencies_internal};
use super::history::record_event_best_effort;
use super::items::require_item;
use super::{Database, begin_write, now_ms};
use crate::error::{ItemError, Result};
use crate::types::{Actor, Change, EventType, Item, ItemStatus};
use rusqlite::{Connection, params};
use serde_json::{Value, json};

/// Dependents of `item` that are still open for work and would wait on
/// something once it is canceled. A done item satisfies its dependents, so
/// canceling it leaves every open dependent with an unmet dependency.
fn dependents_with_unmet(conn: &Connection, item: &Item) -> Result<Vec<String>> {
    let was_done = item.status == ItemStatus::Done;
    let mut waiting = Vec::new();
    for dependent in dependents_internal(conn, &item.id)? {
        let dep_item = require_item(conn, &dependent)?;
        if dep_item.status.is_closed() {
            continue;
        }
        if was_done || !unmet_dependencies_internal(conn, &dependent)?.is_empty() {
            waiting.push(dependent);
        }
    }
    Ok(waiting)
}

/// Apply a status change inside an open transaction.
///
/// `results` is only written when `Some`; completion passes it through.
fn apply_transition(
    conn: &Connection,
    item: Item,
    status: ItemStatus,
    force: bool,
    results: Option<String>,
    actor: &Actor,
) -> Result<Item> {
    let old_status = item.status;

    if old_status == status {
        let Some(results) = results.filter(|r| item.results.as_deref() != Some(r.as_str())) else {
            return Ok(item);
        };
        let now = now_ms();
        conn.execute(
            "UPDATE items SET results = ?1, updated_at = ?2 WHERE id = ?3",
            params![&results, now, &item.id],
        )?;
        return Ok(Item {
            results: Some(results),
            updated_at: now,
            ..item
        });
    }

    if status == ItemStatus::Canceled {
        let waiting = dependents_with_unmet(conn, &item)?;
        if !waiting.is_empty() {
            if !force {
                return Err(ItemError::conflict(format!(
                    "Cannot cancel {}: dependents with unmet dependencies: {}",
                    item.id,
                    waiting.join(", ")
                ))
                .with_details("pass force to cancel anyway; dependents stay blocked"));
            }
            tracing::info!(
                item_id = %item.id,
                dependents = waiting.len(),
                "Force-canceling item with waiting dependents"
            );
        }
    }

    let now = now_ms();
    let closed_at = if status.is_closed() {
        item.closed_at.or(Some(now))
    } else {
        None
    };
    let results = results.or(item.results.clone());

    conn.execute(
        "UPDATE items SET status = ?1, closed_at = ?2, results = ?3, updated_at = ?4
         WHERE id = ?5",
        params![status.as_str(), closed_at, &results, now, &item.id],
    )?;

    record_event_best_effort(
        conn,
        &item.id,
        EventType::StatusChanged,
        actor,
        Some(Change::new(old_status, status)),
    );

    match status {
        ItemStatus::Canceled => record_event_best_effort(
            conn,
            &item.id,
            EventType::Canceled,
            actor,
            Some(Change::new(Value::Null, json!({ "force": force }))),
        ),
        _ if old_status.is_closed() && !status.is_closed() => record_event_best_effort(
            conn,
            &item.id,
            EventType::Reopened,
            actor,
            Some(Change::new(old_status, status)),
        ),
        _ => {}
    }

    tracing::debug!(item_id = %item.id, from = %old_status, to = %status, "Status changed");

    Ok(Item {
        status,
        closed_at,
        results,
        updated_at: now,
        ..item
    })
}

impl Database {
    /// Move an item to `status`.
    ///
    /// Canceling an item whose dependents still wait on unmet dependencies
    /// is rejected unless `force` is set. Setting the current status again
    /// writes nothing.
    pub fn transition(
        &self,
        item_id: &str,
        status: ItemStatus,
        force: bool,
        actor: &Actor,
    ) -> Result<Item> {
        self.with_conn_mut(|conn| {
            let tx = begin_write(conn)?;
            let item = require_item(&tx, item_id)?;
            let item = apply_transition(&tx, item, status, force, None, actor)?;
            tx.commit()?;
            Ok(item)
        })
    }

    /// Mark an item done, storing optional results.
    pub fn complete_item(
        &self,
        item_id: &str,
        results: Option<String>,
        actor: &Actor,
    ) -> Result<Item> {
        self.with_conn_mut(|conn| {
            let tx = begin_write(conn)?;
            let item = require_item(&tx, item_id)?;
            let was_done = item.status == ItemStatus::Done;
            let item = apply_transition(&tx, item, ItemStatus::Done, false, results, actor)?;

            if !was_done {
                record_event_best_effort(
                    &tx,
                    item_id,
                    EventType::Completed,
                    actor,
                    Some(Change::new(Value::Null, &item.results)),
                );
            }

            tx.commit()?;
            Ok(item)
        })
    }

    /// Cancel an item. See [`Database::transition`] for the guard.
    pub fn cancel_item(&self, item_id: &str, force: bool, actor: &Actor) -> Result<Item> {
        self.transition(item_id, ItemStatus::Canceled, force, actor)
    }

    /// Return an item to `open`.
    pub fn reopen_item(&self, item_id: &str, actor: &Actor) -> Result<Item> {
        self.transition(item_id, ItemStatus::Open, false, actor)
    }
}
