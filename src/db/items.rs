//! Item CRUD and filtered listing.

use super::history::record_event_best_effort;
use super::{Database, begin_write, now_ms};
use crate::config::IdsConfig;
use crate::error::{ItemError, Result};
use crate::id::generate_unique_id;
use crate::types::{
    Actor, Change, EventType, Item, ItemFilter, ItemStatus, ItemUpdate, NewItem, PRIORITY_DEFAULT,
};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::str::FromStr;

pub(crate) const ITEM_COLUMNS: &str = "i.id, i.project, i.item_type, i.title, i.description, i.status, \
     i.priority, i.parent_id, i.assigned_agent, i.template_id, i.results, \
     i.created_at, i.updated_at, i.closed_at";

/// Read a TEXT column into a domain enum.
fn parse_text_column<T>(row: &Row, column: &str) -> rusqlite::Result<T>
where
    T: FromStr<Err = ItemError>,
{
    let raw: String = row.get(column)?;
    raw.parse()
        .map_err(|e: ItemError| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
}

/// Parse an item row selected with [`ITEM_COLUMNS`]. Labels are loaded separately.
pub fn parse_item_row(row: &Row) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get("id")?,
        project: row.get("project")?,
        item_type: parse_text_column(row, "item_type")?,
        title: row.get("title")?,
        description: row.get("description")?,
        status: parse_text_column(row, "status")?,
        priority: row.get("priority")?,
        parent_id: row.get("parent_id")?,
        assigned_agent: row.get("assigned_agent")?,
        template_id: row.get("template_id")?,
        results: row.get("results")?,
        labels: Vec::new(),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
        closed_at: row.get("closed_at")?,
    })
}

fn load_labels(conn: &Connection, item_id: &str) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare_cached("SELECT label FROM item_labels WHERE item_id = ?1 ORDER BY label")?;
    let labels = stmt
        .query_map(params![item_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(labels)
}

/// Run an item query and attach labels to every row.
pub(crate) fn query_items(
    conn: &Connection,
    sql: &str,
    params: &[&dyn rusqlite::ToSql],
) -> Result<Vec<Item>> {
    let mut stmt = conn.prepare(sql)?;
    let mut items = stmt
        .query_map(params, parse_item_row)?
        .collect::<rusqlite::Result<Vec<Item>>>()?;
    for item in &mut items {
        item.labels = load_labels(conn, &item.id)?;
    }
    Ok(items)
}

/// Internal helper to get an item using an existing connection (avoids deadlock).
pub(crate) fn get_item_internal(conn: &Connection, item_id: &str) -> Result<Option<Item>> {
    let sql = format!("SELECT {} FROM items i WHERE i.id = ?1", ITEM_COLUMNS);
    let item = conn
        .query_row(&sql, params![item_id], parse_item_row)
        .optional()?;

    match item {
        Some(mut item) => {
            item.labels = load_labels(conn, &item.id)?;
            Ok(Some(item))
        }
        None => Ok(None),
    }
}

/// Like [`get_item_internal`] but absent items are `NotFound`.
pub(crate) fn require_item(conn: &Connection, item_id: &str) -> Result<Item> {
    get_item_internal(conn, item_id)?.ok_or_else(|| ItemError::item_not_found(item_id))
}

pub(crate) fn item_exists(conn: &Connection, item_id: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM items WHERE id = ?1)",
        params![item_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Trim, drop empties, sort and dedup labels.
fn normalize_labels(labels: &[String]) -> Vec<String> {
    let mut labels: Vec<String> = labels
        .iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();
    labels.sort();
    labels.dedup();
    labels
}

/// Replace all labels for the item.
fn sync_labels(conn: &Connection, item_id: &str, labels: &[String]) -> Result<()> {
    conn.execute("DELETE FROM item_labels WHERE item_id = ?1", params![item_id])?;
    for label in labels {
        conn.execute(
            "INSERT INTO item_labels (item_id, label) VALUES (?1, ?2)",
            params![item_id, label],
        )?;
    }
    Ok(())
}

fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ItemError::invalid("title", "title is required"));
    }
    Ok(title.to_string())
}

/// Reject a parent assignment that would make `item_id` its own ancestor.
fn check_parent(conn: &Connection, item_id: &str, parent_id: &str) -> Result<()> {
    if parent_id == item_id {
        return Err(ItemError::invalid("parent_id", "an item cannot be its own parent"));
    }
    if !item_exists(conn, parent_id)? {
        return Err(ItemError::not_found("Parent item", parent_id).with_field("parent_id"));
    }

    let mut current = Some(parent_id.to_string());
    while let Some(id) = current {
        if id == item_id {
            return Err(ItemError::invalid(
                "parent_id",
                format!("{} is a descendant of {}", parent_id, item_id),
            ));
        }
        current = conn
            .query_row(
                "SELECT parent_id FROM items WHERE id = ?1",
                params![id],
                |row| row.get::<_, Option<String>>(0),
            )
            .optional()?
            .flatten();
    }
    Ok(())
}

impl Database {
    /// Create a new item with a generated, collision-checked ID.
    pub fn create_item(&self, new: NewItem, ids: &IdsConfig, actor: &Actor) -> Result<Item> {
        let title = validate_title(&new.title)?;
        let project = new.project.trim().to_string();
        if project.is_empty() {
            return Err(ItemError::invalid("project", "project is required"));
        }
        let now = now_ms();
        let status = new.status.unwrap_or(ItemStatus::Open);
        let closed_at = status.is_closed().then_some(now);
        let priority = new.priority.unwrap_or(PRIORITY_DEFAULT);
        let labels = normalize_labels(&new.labels);

        self.with_conn_mut(|conn| {
            let tx = begin_write(conn)?;

            if let Some(ref pid) = new.parent_id
                && !item_exists(&tx, pid)?
            {
                return Err(ItemError::not_found("Parent item", pid).with_field("parent_id"));
            }

            let id = generate_unique_id(ids.prefix_for(new.item_type), ids.length, |candidate| {
                item_exists(&tx, candidate)
            })?;

            tx.execute(
                "INSERT INTO items (
                    id, project, item_type, title, description, status, priority,
                    parent_id, assigned_agent, template_id, created_at, updated_at, closed_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    &id,
                    &project,
                    new.item_type.as_str(),
                    &title,
                    &new.description,
                    status.as_str(),
                    priority,
                    &new.parent_id,
                    &new.assigned_agent,
                    &new.template_id,
                    now,
                    now,
                    closed_at,
                ],
            )?;

            sync_labels(&tx, &id, &labels)?;

            record_event_best_effort(
                &tx,
                &id,
                EventType::Created,
                actor,
                Some(Change::new(
                    serde_json::Value::Null,
                    serde_json::json!({ "title": &title, "status": status }),
                )),
            );

            tx.commit()?;

            tracing::debug!(item_id = %id, project = %project, "Created item");

            Ok(Item {
                id,
                project,
                item_type: new.item_type,
                title,
                description: new.description,
                status,
                priority,
                parent_id: new.parent_id,
                assigned_agent: new.assigned_agent,
                template_id: new.template_id,
                results: None,
                labels,
                created_at: now,
                updated_at: now,
                closed_at,
            })
        })
    }

    /// Get an item by ID.
    pub fn get_item(&self, item_id: &str) -> Result<Option<Item>> {
        self.with_conn(|conn| get_item_internal(conn, item_id))
    }

    /// Get an item by ID, failing with `NotFound` if absent.
    pub fn require_item(&self, item_id: &str) -> Result<Item> {
        self.with_conn(|conn| require_item(conn, item_id))
    }

    /// Update descriptive fields. Each changed field records its own event.
    pub fn update_item(&self, item_id: &str, update: ItemUpdate, actor: &Actor) -> Result<Item> {
        let now = now_ms();

        self.with_conn_mut(|conn| {
            let tx = begin_write(conn)?;
            let item = require_item(&tx, item_id)?;
            let mut events: Vec<(EventType, Change)> = Vec::new();

            let new_title = match update.title {
                Some(ref title) => validate_title(title)?,
                None => item.title.clone(),
            };
            if new_title != item.title {
                events.push((EventType::TitleChanged, Change::new(&item.title, &new_title)));
            }

            let new_description = update.description.unwrap_or_else(|| item.description.clone());
            if new_description != item.description {
                events.push((
                    EventType::DescriptionChanged,
                    Change::new(&item.description, &new_description),
                ));
            }

            let new_priority = update.priority.unwrap_or(item.priority);
            if new_priority != item.priority {
                events.push((EventType::PriorityChanged, Change::new(item.priority, new_priority)));
            }

            let new_parent = update.parent_id.unwrap_or_else(|| item.parent_id.clone());
            if new_parent != item.parent_id {
                if let Some(ref pid) = new_parent {
                    check_parent(&tx, item_id, pid)?;
                }
                events.push((EventType::ParentChanged, Change::new(&item.parent_id, &new_parent)));
            }

            let new_agent = update
                .assigned_agent
                .unwrap_or_else(|| item.assigned_agent.clone());
            if new_agent != item.assigned_agent {
                events.push((
                    EventType::AssigneeChanged,
                    Change::new(&item.assigned_agent, &new_agent),
                ));
            }

            let new_labels = match update.labels {
                Some(ref labels) => normalize_labels(labels),
                None => item.labels.clone(),
            };
            let labels_changed = new_labels != item.labels;
            if labels_changed {
                events.push((EventType::LabelsChanged, Change::new(&item.labels, &new_labels)));
            }

            if events.is_empty() {
                return Ok(item);
            }

            tx.execute(
                "UPDATE items SET
                    title = ?1, description = ?2, priority = ?3, parent_id = ?4,
                    assigned_agent = ?5, updated_at = ?6
                WHERE id = ?7",
                params![
                    &new_title,
                    &new_description,
                    new_priority,
                    &new_parent,
                    &new_agent,
                    now,
                    item_id,
                ],
            )?;

            if labels_changed {
                sync_labels(&tx, item_id, &new_labels)?;
            }

            for (event, change) in events {
                record_event_best_effort(&tx, item_id, event, actor, Some(change));
            }

            tx.commit()?;

            Ok(Item {
                title: new_title,
                description: new_description,
                priority: new_priority,
                parent_id: new_parent,
                assigned_agent: new_agent,
                labels: new_labels,
                updated_at: now,
                ..item
            })
        })
    }

    /// Delete an item. Its edges, logs, labels and history go with it;
    /// children are detached.
    pub fn delete_item(&self, item_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = begin_write(conn)?;
            let deleted = tx.execute("DELETE FROM items WHERE id = ?1", params![item_id])?;
            if deleted == 0 {
                return Err(ItemError::item_not_found(item_id));
            }
            tx.commit()?;
            tracing::info!(item_id = %item_id, "Deleted item");
            Ok(())
        })
    }

    /// List items with optional filters, highest priority first.
    pub fn list_items(&self, filter: &ItemFilter) -> Result<Vec<Item>> {
        self.with_conn(|conn| {
            let mut sql = format!("SELECT {} FROM items i WHERE 1=1", ITEM_COLUMNS);
            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(ref project) = filter.project {
                sql.push_str(" AND i.project = ?");
                params_vec.push(Box::new(project.clone()));
            }

            if !filter.statuses.is_empty() {
                let placeholders: Vec<&str> = filter.statuses.iter().map(|_| "?").collect();
                sql.push_str(&format!(" AND i.status IN ({})", placeholders.join(", ")));
                for status in &filter.statuses {
                    params_vec.push(Box::new(status.as_str()));
                }
            }

            if let Some(item_type) = filter.item_type {
                sql.push_str(" AND i.item_type = ?");
                params_vec.push(Box::new(item_type.as_str()));
            }

            match filter.parent_id {
                Some(Some(ref pid)) => {
                    sql.push_str(" AND i.parent_id = ?");
                    params_vec.push(Box::new(pid.clone()));
                }
                Some(None) => sql.push_str(" AND i.parent_id IS NULL"),
                None => {}
            }

            for label in normalize_labels(&filter.labels) {
                sql.push_str(
                    " AND EXISTS (SELECT 1 FROM item_labels l WHERE l.item_id = i.id AND l.label = ?)",
                );
                params_vec.push(Box::new(label));
            }

            if let Some(ref blocker) = filter.blocked_by {
                sql.push_str(
                    " AND i.id IN (SELECT item_id FROM item_dependencies WHERE depends_on_id = ?)",
                );
                params_vec.push(Box::new(blocker.clone()));
            }

            if let Some(ref dependent) = filter.blocking {
                sql.push_str(
                    " AND i.id IN (SELECT depends_on_id FROM item_dependencies WHERE item_id = ?)",
                );
                params_vec.push(Box::new(dependent.clone()));
            }

            sql.push_str(" ORDER BY i.priority DESC, i.created_at ASC, i.id ASC");

            if let Some(limit) = filter.limit {
                if limit <= 0 {
                    return Err(ItemError::invalid("limit", "limit must be positive"));
                }
                sql.push_str(" LIMIT ?");
                params_vec.push(Box::new(limit));
            }

            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|b| b.as_ref()).collect();

            query_items(conn, &sql, &params_refs)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_labels() {
        let labels = vec![
            " backend".to_string(),
            "api".to_string(),
            "".to_string(),
            "backend ".to_string(),
        ];
        assert_eq!(normalize_labels(&labels), vec!["api", "backend"]);
    }

    #[test]
    fn test_validate_title() {
        assert_eq!(validate_title("  Ship it ").unwrap(), "Ship it");
        assert!(validate_title("   ").is_err());
    }
}
