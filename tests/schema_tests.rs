//! Tests for schema migrations and on-disk stores.

use item_graph::config::IdsConfig;
use item_graph::db::Database;
use item_graph::types::{Actor, NewItem};

/// Helper to create a fresh in-memory database for testing.
fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

#[test]
fn fresh_store_is_at_latest_version() {
    let db = setup_db();
    assert_eq!(db.schema_version().unwrap(), 1);
}

#[test]
fn reopening_applies_nothing_and_keeps_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("items.db");

    let id = {
        let db = Database::open(&path).unwrap();
        let item = db
            .create_item(
                NewItem::task("demo", "Persisted"),
                &IdsConfig::default(),
                &Actor::anonymous(),
            )
            .unwrap();
        item.id
    };

    let db = Database::open(&path).unwrap();
    assert_eq!(db.schema_version().unwrap(), 1);
    assert_eq!(db.require_item(&id).unwrap().title, "Persisted");

    let applied: i64 = db
        .with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM refinery_schema_history",
                [],
                |row| row.get(0),
            )?)
        })
        .unwrap();
    assert_eq!(applied, 1);
}

#[test]
fn closed_at_constraint_is_enforced() {
    let db = setup_db();
    let item = db
        .create_item(
            NewItem::task("demo", "Guarded"),
            &IdsConfig::default(),
            &Actor::anonymous(),
        )
        .unwrap();

    let result = db.with_conn(|conn| {
        conn.execute(
            "UPDATE items SET status = 'done' WHERE id = ?1",
            [&item.id],
        )?;
        Ok(())
    });

    assert!(result.is_err());
}

#[test]
fn self_edge_constraint_is_enforced() {
    let db = setup_db();
    let item = db
        .create_item(
            NewItem::task("demo", "Loop"),
            &IdsConfig::default(),
            &Actor::anonymous(),
        )
        .unwrap();

    let result = db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO item_dependencies (item_id, depends_on_id, created_at) VALUES (?1, ?1, 0)",
            [&item.id],
        )?;
        Ok(())
    });

    assert!(result.is_err());
}
