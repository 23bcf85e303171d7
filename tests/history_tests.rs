//! History audit log: queries, payload decoding and retention cleanup.

use item_graph::config::{Config, ConfigKey, IdsConfig};
use item_graph::error::ErrorCode;
use item_graph::db::history::RetentionPolicy;
use item_graph::db::{Database, now_ms};
use item_graph::types::{Actor, Change, EventType, HistoryQuery, Item, NewItem};

const HOUR: i64 = 60 * 60 * 1000;
const DAY: i64 = 24 * HOUR;

/// Helper to create a fresh in-memory database for testing.
fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn create(db: &Database, title: &str) -> Item {
    db.create_item(
        NewItem::task("demo", title),
        &IdsConfig::default(),
        &Actor::new("alice", "human"),
    )
    .expect("Failed to create item")
}

/// Append an event and return its row id.
fn append(db: &Database, item_id: &str, event: EventType, actor: &Actor) -> i64 {
    db.append_history(item_id, event, actor, None);
    db.with_conn(|conn| {
        Ok(conn.query_row("SELECT MAX(id) FROM item_history", [], |row| row.get(0))?)
    })
    .unwrap()
}

fn set_created_at(db: &Database, entry_id: i64, created_at: i64) {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE item_history SET created_at = ?1 WHERE id = ?2",
            rusqlite::params![created_at, entry_id],
        )?;
        Ok(())
    })
    .unwrap();
}

fn history_count(db: &Database) -> i64 {
    db.with_conn(|conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM item_history", [], |row| row.get(0))?)
    })
    .unwrap()
}

mod query_tests {
    use super::*;

    #[test]
    fn query_is_newest_first() {
        let db = setup_db();
        let item = create(&db, "A");
        let actor = Actor::new("bob", "agent");
        let old = append(&db, &item.id, EventType::TitleChanged, &actor);
        set_created_at(&db, old, now_ms() - HOUR);
        let new = append(&db, &item.id, EventType::PriorityChanged, &actor);

        let entries = db
            .query_history(&HistoryQuery {
                item_id: Some(item.id.clone()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(entries.first().map(|e| e.id), Some(new));
        assert_eq!(entries.last().map(|e| e.id), Some(old));
    }

    #[test]
    fn query_filters_by_actor_since_and_type() {
        let db = setup_db();
        let item = create(&db, "A");
        let bob = Actor::new("bob", "agent");
        let carol = Actor::new("carol", "agent");

        let stale = append(&db, &item.id, EventType::StatusChanged, &bob);
        set_created_at(&db, stale, now_ms() - 2 * DAY);
        append(&db, &item.id, EventType::StatusChanged, &bob);
        append(&db, &item.id, EventType::TitleChanged, &bob);
        append(&db, &item.id, EventType::StatusChanged, &carol);

        let entries = db
            .query_history(&HistoryQuery {
                actor_id: Some("bob".to_string()),
                since: Some(now_ms() - DAY),
                event_types: vec![EventType::StatusChanged],
                ..Default::default()
            })
            .unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].actor.id.as_deref(), Some("bob"));
        assert_eq!(entries[0].event_type, EventType::StatusChanged);
    }

    #[test]
    fn query_defaults_to_page_of_fifty() {
        let db = setup_db();
        let item = create(&db, "A");
        let actor = Actor::anonymous();
        for _ in 0..60 {
            db.append_history(&item.id, EventType::LabelsChanged, &actor, None);
        }

        let page = db.query_history(&HistoryQuery::default()).unwrap();
        assert_eq!(page.len(), 50);

        let all = db
            .query_history(&HistoryQuery {
                limit: Some(100),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(all.len(), 61);
    }

    #[test]
    fn stored_change_is_returned() {
        let db = setup_db();
        let item = create(&db, "A");
        db.append_history(
            &item.id,
            EventType::AssigneeChanged,
            &Actor::anonymous(),
            Some(Change::new(serde_json::Value::Null, "dave")),
        );

        let entries = db
            .query_history(&HistoryQuery {
                event_types: vec![EventType::AssigneeChanged],
                ..Default::default()
            })
            .unwrap();
        let change = entries[0].changes.as_ref().unwrap();
        assert_eq!(change.old, serde_json::Value::Null);
        assert_eq!(change.new, serde_json::json!("dave"));
    }

    #[test]
    fn corrupt_payload_degrades_to_none() {
        let db = setup_db();
        let item = create(&db, "A");
        db.with_conn(|conn| {
            conn.execute("UPDATE item_history SET changes = '{broken'", [])?;
            Ok(())
        })
        .unwrap();

        let entries = db
            .query_history(&HistoryQuery {
                item_id: Some(item.id.clone()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].changes.is_none());
    }

    #[test]
    fn unknown_event_types_are_skipped() {
        let db = setup_db();
        let item = create(&db, "A");
        let entry = append(&db, &item.id, EventType::TitleChanged, &Actor::anonymous());
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE item_history SET event_type = 'renamed_twice' WHERE id = ?1",
                [entry],
            )?;
            Ok(())
        })
        .unwrap();

        let entries = db.query_history(&HistoryQuery::default()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event_type, EventType::Created);
    }

    #[test]
    fn non_positive_limit_is_rejected() {
        let db = setup_db();
        create(&db, "A");

        for limit in [0, -1] {
            let err = db
                .query_history(&HistoryQuery {
                    limit: Some(limit),
                    ..Default::default()
                })
                .unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidArgument);
        }
    }

    #[test]
    fn append_for_missing_item_is_swallowed() {
        let db = setup_db();
        db.append_history("task-nobody", EventType::Merged, &Actor::anonymous(), None);
        assert_eq!(history_count(&db), 0);
    }
}

mod cleanup_tests {
    use super::*;

    /// One item with entries at fixed ages, returned with the reference time.
    fn seeded(ages: &[(EventType, i64)]) -> (Database, i64) {
        let db = setup_db();
        let item = create(&db, "A");
        let now = now_ms();
        db.with_conn(|conn| {
            conn.execute("DELETE FROM item_history", [])?;
            Ok(())
        })
        .unwrap();
        for (event, age) in ages {
            let id = append(&db, &item.id, *event, &Actor::anonymous());
            set_created_at(&db, id, now - age);
        }
        (db, now)
    }

    #[test]
    fn tiers_apply_per_event_class() {
        let (db, now) = seeded(&[
            (EventType::StatusChanged, 31 * DAY),
            (EventType::Completed, 10 * DAY),
            (EventType::TitleChanged, 8 * DAY),
            (EventType::LabelsChanged, 2 * DAY),
            (EventType::Reopened, HOUR),
        ]);

        let report = db
            .cleanup_history_at(now, &RetentionPolicy::default(), false)
            .unwrap();

        assert_eq!(report.status_events, 1);
        assert_eq!(report.other_events, 1);
        assert_eq!(report.deleted_count, 2);
        assert!(!report.dry_run);
        assert_eq!(history_count(&db), 3);
    }

    #[test]
    fn dry_run_matches_real_run() {
        let (db, now) = seeded(&[
            (EventType::Canceled, 40 * DAY),
            (EventType::StatusChanged, 35 * DAY),
            (EventType::DependencyAdded, 9 * DAY),
            (EventType::Merged, 3 * DAY),
        ]);
        let policy = RetentionPolicy::default();

        let preview = db.cleanup_history_at(now, &policy, true).unwrap();
        assert!(preview.dry_run);
        assert_eq!(history_count(&db), 4);

        let real = db.cleanup_history_at(now, &policy, false).unwrap();
        assert_eq!(preview.deleted_count, real.deleted_count);
        assert_eq!(preview.status_events, real.status_events);
        assert_eq!(preview.other_events, real.other_events);
        assert_eq!(real.deleted_count, 3);
        assert_eq!(history_count(&db), 1);
    }

    #[test]
    fn young_entries_survive_zero_retention() {
        let (db, now) = seeded(&[
            (EventType::StatusChanged, 23 * HOUR),
            (EventType::TitleChanged, 23 * HOUR),
            (EventType::TitleChanged, 25 * HOUR),
        ]);
        let policy = RetentionPolicy {
            status_retention_ms: 0,
            other_retention_ms: 0,
        };

        let report = db.cleanup_history_at(now, &policy, false).unwrap();

        assert_eq!(report.deleted_count, 1);
        assert_eq!(report.other_events, 1);
        assert_eq!(history_count(&db), 2);
    }

    #[test]
    fn huge_configured_retention_keeps_everything() {
        let (db, now) = seeded(&[
            (EventType::StatusChanged, 2 * DAY),
            (EventType::Completed, 400 * DAY),
            (EventType::TitleChanged, 3 * DAY),
        ]);
        let mut config = Config::default();
        ConfigKey::HistoryStatusRetentionDays
            .set(&mut config, "200000000000000")
            .unwrap();
        ConfigKey::HistoryOtherRetentionDays
            .set(&mut config, &i64::MAX.to_string())
            .unwrap();
        let policy = RetentionPolicy::from_config(&config.history);

        let report = db.cleanup_history_at(now, &policy, false).unwrap();

        assert_eq!(report.deleted_count, 0);
        assert_eq!(history_count(&db), 3);
    }

    #[test]
    fn cleanup_on_empty_history() {
        let db = setup_db();
        let report = db
            .cleanup_history(&RetentionPolicy::default(), false)
            .unwrap();
        assert_eq!(report.deleted_count, 0);
    }
}
