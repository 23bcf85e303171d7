//! Merge engine: rewiring, provenance and rejection without mutation.

use item_graph::config::IdsConfig;
use item_graph::db::Database;
use item_graph::error::ErrorCode;
use item_graph::types::{Actor, Dependency, EventType, HistoryQuery, Item, NewItem};

/// Helper to create a fresh in-memory database for testing.
fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn actor() -> Actor {
    Actor::new("merger", "human")
}

fn create(db: &Database, title: &str) -> Item {
    db.create_item(NewItem::task("demo", title), &IdsConfig::default(), &actor())
        .expect("Failed to create item")
}

fn create_with(db: &Database, new: NewItem) -> Item {
    db.create_item(new, &IdsConfig::default(), &actor())
        .expect("Failed to create item")
}

fn edges(db: &Database) -> Vec<Dependency> {
    db.all_dependencies().unwrap()
}

mod rewire_tests {
    use super::*;

    #[test]
    fn edges_move_to_target() {
        let db = setup_db();
        let source = create(&db, "Source");
        let target = create(&db, "Target");
        let upstream = create(&db, "Upstream");
        let downstream = create(&db, "Downstream");
        db.add_dependency(&source.id, &upstream.id, &actor()).unwrap();
        db.add_dependency(&downstream.id, &source.id, &actor()).unwrap();

        let report = db
            .merge_items(&source.id, &target.id, &actor(), false)
            .unwrap();

        assert_eq!(report.edges_rewired, 2);
        assert_eq!(report.edges_skipped, 0);
        assert!(db.get_item(&source.id).unwrap().is_none());
        assert_eq!(db.dependencies_of(&target.id).unwrap(), vec![upstream.id.clone()]);
        assert_eq!(db.dependents_of(&target.id).unwrap(), vec![downstream.id.clone()]);
        assert_eq!(edges(&db).len(), 2);
    }

    #[test]
    fn shared_dependency_is_not_duplicated() {
        let db = setup_db();
        let source = create(&db, "Source");
        let target = create(&db, "Target");
        let shared = create(&db, "Shared");
        db.add_dependency(&source.id, &shared.id, &actor()).unwrap();
        db.add_dependency(&target.id, &shared.id, &actor()).unwrap();

        let report = db
            .merge_items(&source.id, &target.id, &actor(), false)
            .unwrap();

        assert_eq!(report.edges_skipped, 1);
        assert_eq!(db.dependencies_of(&target.id).unwrap(), vec![shared.id.clone()]);
        assert_eq!(edges(&db).len(), 1);
    }

    #[test]
    fn shared_dependent_is_not_duplicated() {
        let db = setup_db();
        let source = create(&db, "Source");
        let target = create(&db, "Target");
        let waiter = create(&db, "Waiter");
        db.add_dependency(&waiter.id, &source.id, &actor()).unwrap();
        db.add_dependency(&waiter.id, &target.id, &actor()).unwrap();

        db.merge_items(&source.id, &target.id, &actor(), false)
            .unwrap();

        assert_eq!(db.dependencies_of(&waiter.id).unwrap(), vec![target.id.clone()]);
    }
}

mod content_tests {
    use super::*;

    #[test]
    fn logs_transfer_with_provenance_entry() {
        let db = setup_db();
        let source = create(&db, "Source");
        let target = create(&db, "Target");
        db.add_log(&target.id, "target note").unwrap();
        db.add_log(&source.id, "source note 1").unwrap();
        db.add_log(&source.id, "source note 2").unwrap();

        let report = db
            .merge_items(&source.id, &target.id, &actor(), false)
            .unwrap();

        assert_eq!(report.logs_transferred, 2);
        let messages: Vec<String> = db
            .list_logs(&target.id)
            .unwrap()
            .into_iter()
            .map(|l| l.message)
            .collect();
        assert_eq!(messages.len(), 4);
        assert!(messages.contains(&"source note 1".to_string()));
        assert!(messages.last().unwrap().starts_with("Merged"));
    }

    #[test]
    fn description_is_appended() {
        let db = setup_db();
        let source = create_with(
            &db,
            NewItem::task("demo", "Source").with_description("extra context"),
        );
        let target = create_with(
            &db,
            NewItem::task("demo", "Target").with_description("original plan"),
        );

        db.merge_items(&source.id, &target.id, &actor(), false)
            .unwrap();

        let merged = db.require_item(&target.id).unwrap();
        assert!(merged.description.starts_with("original plan"));
        assert!(merged.description.contains("extra context"));
        assert_eq!(merged.title, "Target");
    }

    #[test]
    fn labels_are_combined() {
        let db = setup_db();
        let source = create_with(&db, NewItem::task("demo", "Source").with_labels(["ui", "bug"]));
        let target = create_with(&db, NewItem::task("demo", "Target").with_labels(["bug"]));

        db.merge_items(&source.id, &target.id, &actor(), false)
            .unwrap();

        assert_eq!(db.require_item(&target.id).unwrap().labels, vec!["bug", "ui"]);
    }

    #[test]
    fn children_move_under_target() {
        let db = setup_db();
        let source = create_with(&db, NewItem::epic("demo", "Source"));
        let target = create_with(&db, NewItem::epic("demo", "Target"));
        let child = create_with(&db, NewItem::task("demo", "Child").with_parent(&source.id));

        db.merge_items(&source.id, &target.id, &actor(), false)
            .unwrap();

        assert_eq!(
            db.require_item(&child.id).unwrap().parent_id.as_deref(),
            Some(target.id.as_str())
        );
    }

    #[test]
    fn merged_event_names_source() {
        let db = setup_db();
        let source = create(&db, "Source");
        let target = create(&db, "Target");

        db.merge_items(&source.id, &target.id, &actor(), false)
            .unwrap();

        let history = db
            .query_history(&HistoryQuery {
                item_id: Some(target.id.clone()),
                event_types: vec![EventType::Merged],
                ..Default::default()
            })
            .unwrap();
        assert_eq!(history.len(), 1);
        let change = history[0].changes.as_ref().unwrap();
        assert_eq!(change.old, serde_json::Value::Null);
        assert_eq!(change.new, serde_json::json!(source.id));
        assert_eq!(history[0].actor.id.as_deref(), Some("merger"));

        let source_history = db
            .query_history(&HistoryQuery {
                item_id: Some(source.id.clone()),
                ..Default::default()
            })
            .unwrap();
        assert!(source_history.is_empty());
    }
}

mod rejection_tests {
    use super::*;

    #[test]
    fn self_merge_is_invalid() {
        let db = setup_db();
        let a = create(&db, "A");

        let err = db.merge_items(&a.id, &a.id, &actor(), false).unwrap_err();

        assert_eq!(err.code, ErrorCode::InvalidArgument);
        assert_eq!(db.require_item(&a.id).unwrap(), a);
    }

    #[test]
    fn path_in_either_direction_is_rejected() {
        let db = setup_db();
        let a = create(&db, "A");
        let b = create(&db, "B");
        let c = create(&db, "C");
        db.add_dependency(&a.id, &b.id, &actor()).unwrap();
        db.add_dependency(&b.id, &c.id, &actor()).unwrap();
        db.add_log(&a.id, "keep").unwrap();
        let before = edges(&db);

        for (source, target) in [(&a, &c), (&c, &a), (&a, &b), (&b, &a)] {
            let err = db
                .merge_items(&source.id, &target.id, &actor(), false)
                .unwrap_err();
            assert_eq!(err.code, ErrorCode::CycleRejected);
        }

        assert_eq!(edges(&db), before);
        assert_eq!(db.require_item(&a.id).unwrap(), a);
        assert_eq!(db.require_item(&c.id).unwrap(), c);
        assert_eq!(db.list_logs(&a.id).unwrap().len(), 1);
    }

    #[test]
    fn missing_item_is_not_found() {
        let db = setup_db();
        let a = create(&db, "A");

        let err = db
            .merge_items(&a.id, "task-absent", &actor(), false)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
        let err = db
            .merge_items("task-absent", &a.id, &actor(), true)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn dry_run_rejects_the_same_way() {
        let db = setup_db();
        let a = create(&db, "A");
        let b = create(&db, "B");
        db.add_dependency(&a.id, &b.id, &actor()).unwrap();

        let err = db.merge_items(&a.id, &b.id, &actor(), true).unwrap_err();
        assert_eq!(err.code, ErrorCode::CycleRejected);
    }
}

mod dry_run_tests {
    use super::*;

    #[test]
    fn dry_run_reports_without_mutating() {
        let db = setup_db();
        let source = create_with(&db, NewItem::task("demo", "Source").with_description("more"));
        let target = create(&db, "Target");
        let shared = create(&db, "Shared");
        let other = create(&db, "Other");
        db.add_dependency(&source.id, &shared.id, &actor()).unwrap();
        db.add_dependency(&target.id, &shared.id, &actor()).unwrap();
        db.add_dependency(&source.id, &other.id, &actor()).unwrap();
        db.add_log(&source.id, "note").unwrap();
        let before = edges(&db);

        let preview = db
            .merge_items(&source.id, &target.id, &actor(), true)
            .unwrap();

        assert!(preview.dry_run);
        assert_eq!(edges(&db), before);
        assert_eq!(db.require_item(&source.id).unwrap(), source);
        assert_eq!(db.require_item(&target.id).unwrap(), target);
        assert_eq!(db.list_logs(&source.id).unwrap().len(), 1);

        let real = db
            .merge_items(&source.id, &target.id, &actor(), false)
            .unwrap();
        assert!(!real.dry_run);
        assert_eq!(preview.edges_rewired, real.edges_rewired);
        assert_eq!(preview.edges_skipped, real.edges_skipped);
        assert_eq!(preview.logs_transferred, real.logs_transferred);
    }
}
