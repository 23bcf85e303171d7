//! Dependency edges, readiness and reachability.

use super::history::record_event_best_effort;
use super::items::{ITEM_COLUMNS, item_exists, query_items, require_item};
use super::{Database, begin_write, now_ms};
use crate::error::{ItemError, Result};
use crate::types::{Actor, Change, Dependency, EventType, Item, ItemStatus};
use rusqlite::{Connection, params};
use std::collections::{HashSet, VecDeque};

/// Whether `to` is reachable from `from` by following depends-on edges.
///
/// Breadth-first over the edge table; O(V+E) per query.
pub(crate) fn has_path_internal(conn: &Connection, from: &str, to: &str) -> Result<bool> {
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<String> = VecDeque::new();
    queue.push_back(from.to_string());

    let mut stmt =
        conn.prepare_cached("SELECT depends_on_id FROM item_dependencies WHERE item_id = ?1")?;

    while let Some(current) = queue.pop_front() {
        if current == to {
            return Ok(true);
        }

        if !visited.insert(current.clone()) {
            continue;
        }

        let next: Vec<String> = stmt
            .query_map(params![&current], |row| row.get(0))?
            .collect::<rusqlite::Result<_>>()?;

        for dep in next {
            if !visited.contains(&dep) {
                queue.push_back(dep);
            }
        }
    }

    tracing::trace!(from = %from, to = %to, visited = visited.len(), "No dependency path");
    Ok(false)
}

/// Dependencies of `item_id` whose target is not done.
pub(crate) fn unmet_dependencies_internal(conn: &Connection, item_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT d.depends_on_id FROM item_dependencies d
         INNER JOIN items blocker ON d.depends_on_id = blocker.id
         WHERE d.item_id = ?1 AND blocker.status != 'done'
         ORDER BY d.depends_on_id",
    )?;
    let ids = stmt
        .query_map(params![item_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(ids)
}

/// Items that depend on `item_id`.
pub(crate) fn dependents_internal(conn: &Connection, item_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT item_id FROM item_dependencies WHERE depends_on_id = ?1 ORDER BY item_id",
    )?;
    let ids = stmt
        .query_map(params![item_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(ids)
}

/// Items that `item_id` depends on.
pub(crate) fn dependencies_internal(conn: &Connection, item_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare_cached(
        "SELECT depends_on_id FROM item_dependencies WHERE item_id = ?1 ORDER BY depends_on_id",
    )?;
    let ids = stmt
        .query_map(params![item_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(ids)
}

/// SQL fragment: the item aliased `i` has no dependency on a non-done item.
const NO_UNMET_DEPS: &str = "NOT EXISTS (
        SELECT 1 FROM item_dependencies d
        INNER JOIN items blocker ON d.depends_on_id = blocker.id
        WHERE d.item_id = i.id AND blocker.status != 'done'
    )";

impl Database {
    /// Make `item_id` depend on `depends_on_id`.
    ///
    /// Adding an existing edge is a no-op. Self-edges and edges that would
    /// close a cycle are rejected.
    pub fn add_dependency(&self, item_id: &str, depends_on_id: &str, actor: &Actor) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = begin_write(conn)?;

            for id in [item_id, depends_on_id] {
                if !item_exists(&tx, id)? {
                    return Err(ItemError::item_not_found(id));
                }
            }

            if item_id == depends_on_id {
                return Err(ItemError::cycle(item_id, depends_on_id)
                    .with_details("an item cannot depend on itself"));
            }

            // The new edge closes a cycle iff the target already reaches the source
            if has_path_internal(&tx, depends_on_id, item_id)? {
                return Err(ItemError::cycle(item_id, depends_on_id));
            }

            let inserted = tx.execute(
                "INSERT OR IGNORE INTO item_dependencies (item_id, depends_on_id, created_at)
                 VALUES (?1, ?2, ?3)",
                params![item_id, depends_on_id, now_ms()],
            )?;

            if inserted > 0 {
                record_event_best_effort(
                    &tx,
                    item_id,
                    EventType::DependencyAdded,
                    actor,
                    Some(Change::new(serde_json::Value::Null, depends_on_id)),
                );
            }

            tx.commit()?;
            Ok(())
        })
    }

    /// Remove the edge if present.
    pub fn remove_dependency(
        &self,
        item_id: &str,
        depends_on_id: &str,
        actor: &Actor,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = begin_write(conn)?;

            let removed = tx.execute(
                "DELETE FROM item_dependencies WHERE item_id = ?1 AND depends_on_id = ?2",
                params![item_id, depends_on_id],
            )?;

            if removed > 0 {
                record_event_best_effort(
                    &tx,
                    item_id,
                    EventType::DependencyRemoved,
                    actor,
                    Some(Change::new(depends_on_id, serde_json::Value::Null)),
                );
            }

            tx.commit()?;
            Ok(())
        })
    }

    /// Get all edges.
    pub fn all_dependencies(&self) -> Result<Vec<Dependency>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT item_id, depends_on_id FROM item_dependencies
                 ORDER BY item_id, depends_on_id",
            )?;

            let deps = stmt
                .query_map([], |row| {
                    Ok(Dependency {
                        item_id: row.get(0)?,
                        depends_on_id: row.get(1)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(deps)
        })
    }

    /// IDs the item depends on.
    pub fn dependencies_of(&self, item_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            require_item(conn, item_id)?;
            dependencies_internal(conn, item_id)
        })
    }

    /// IDs of items that depend on this item.
    pub fn dependents_of(&self, item_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            require_item(conn, item_id)?;
            dependents_internal(conn, item_id)
        })
    }

    /// IDs the item depends on that are not done yet.
    pub fn unmet_dependencies(&self, item_id: &str) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            require_item(conn, item_id)?;
            unmet_dependencies_internal(conn, item_id)
        })
    }

    /// An item is ready when it is open and everything it depends on is done.
    pub fn is_ready(&self, item_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let item = require_item(conn, item_id)?;
            if item.status != ItemStatus::Open {
                return Ok(false);
            }
            Ok(unmet_dependencies_internal(conn, item_id)?.is_empty())
        })
    }

    /// Whether `to` is reachable from `from` along depends-on edges.
    pub fn has_path(&self, from: &str, to: &str) -> Result<bool> {
        self.with_conn(|conn| {
            for id in [from, to] {
                if !item_exists(conn, id)? {
                    return Err(ItemError::item_not_found(id));
                }
            }
            has_path_internal(conn, from, to)
        })
    }

    /// Ready items in a project, highest priority first.
    pub fn ready_items(&self, project: &str) -> Result<Vec<Item>> {
        self.with_conn(|conn| ready_items_internal(conn, project))
    }

    /// Unclosed items that are marked blocked or wait on an unfinished dependency.
    pub fn blocked_items(&self, project: &str) -> Result<Vec<Item>> {
        self.with_conn(|conn| blocked_items_internal(conn, project))
    }
}

pub(crate) fn ready_items_internal(conn: &Connection, project: &str) -> Result<Vec<Item>> {
    let sql = format!(
        "SELECT {} FROM items i
         WHERE i.project = ?1 AND i.status = 'open' AND {}
         ORDER BY i.priority DESC, i.created_at ASC, i.id ASC",
        ITEM_COLUMNS, NO_UNMET_DEPS
    );
    query_items(conn, &sql, &[&project])
}

pub(crate) fn blocked_items_internal(conn: &Connection, project: &str) -> Result<Vec<Item>> {
    let sql = format!(
        "SELECT {} FROM items i
         WHERE i.project = ?1 AND i.status NOT IN ('done', 'canceled')
         AND (i.status = 'blocked' OR NOT {})
         ORDER BY i.priority DESC, i.created_at ASC, i.id ASC",
        ITEM_COLUMNS, NO_UNMET_DEPS
    );
    query_items(conn, &sql, &[&project])
}
