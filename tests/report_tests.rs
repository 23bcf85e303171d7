//! Aggregate status report.

use item_graph::config::{IdsConfig, ReportConfig};
use item_graph::db::{Database, now_ms};
use item_graph::types::{Actor, Item, ItemStatus, NewItem};

/// Helper to create a fresh in-memory database for testing.
fn setup_db() -> Database {
    Database::open_in_memory().expect("Failed to create in-memory database")
}

fn create(db: &Database, project: &str, title: &str) -> Item {
    db.create_item(
        NewItem::task(project, title),
        &IdsConfig::default(),
        &Actor::anonymous(),
    )
    .expect("Failed to create item")
}

fn ids(items: &[Item]) -> Vec<&str> {
    items.iter().map(|i| i.id.as_str()).collect()
}

#[test]
fn counts_cover_every_status() {
    let db = setup_db();
    let a = create(&db, "demo", "A");
    create(&db, "demo", "B");
    create(&db, "elsewhere", "C");
    db.complete_item(&a.id, None, &Actor::anonymous()).unwrap();

    let report = db.status_report("demo", &ReportConfig::default()).unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.counts.len(), ItemStatus::ALL.len());
    assert_eq!(report.counts[&ItemStatus::Open], 1);
    assert_eq!(report.counts[&ItemStatus::Done], 1);
    assert_eq!(report.counts[&ItemStatus::Canceled], 0);
}

#[test]
fn lists_ready_in_progress_and_blocked() {
    let db = setup_db();
    let actor = Actor::anonymous();
    let a = create(&db, "demo", "A");
    let b = create(&db, "demo", "B");
    let c = create(&db, "demo", "C");
    db.add_dependency(&b.id, &a.id, &actor).unwrap();
    db.transition(&c.id, ItemStatus::InProgress, false, &actor)
        .unwrap();

    let report = db.status_report("demo", &ReportConfig::default()).unwrap();

    assert_eq!(ids(&report.ready), vec![a.id.as_str()]);
    assert_eq!(ids(&report.in_progress), vec![c.id.as_str()]);
    assert_eq!(ids(&report.blocked), vec![b.id.as_str()]);
    assert!(report.stale.is_empty());
}

#[test]
fn stale_items_exceed_threshold() {
    let db = setup_db();
    let a = create(&db, "demo", "A");
    db.transition(&a.id, ItemStatus::InProgress, false, &Actor::anonymous())
        .unwrap();
    let config = ReportConfig::default();

    let fresh = db.status_report_at(now_ms(), "demo", &config).unwrap();
    assert!(fresh.stale.is_empty());

    let later = now_ms() + (config.stale_threshold_secs + 1) * 1000;
    let report = db.status_report_at(later, "demo", &config).unwrap();
    assert_eq!(ids(&report.stale), vec![a.id.as_str()]);
}

#[test]
fn huge_stale_threshold_marks_nothing_stale() {
    let db = setup_db();
    let a = create(&db, "demo", "A");
    db.transition(&a.id, ItemStatus::InProgress, false, &Actor::anonymous())
        .unwrap();
    let config = ReportConfig {
        stale_threshold_secs: i64::MAX,
        ..ReportConfig::default()
    };

    let report = db.status_report_at(now_ms(), "demo", &config).unwrap();

    assert_eq!(ids(&report.in_progress), vec![a.id.as_str()]);
    assert!(report.stale.is_empty());
}

#[test]
fn recently_done_is_limited() {
    let db = setup_db();
    for n in 0..4 {
        let item = create(&db, "demo", &format!("Item {}", n));
        db.complete_item(&item.id, None, &Actor::anonymous()).unwrap();
    }
    let config = ReportConfig {
        recent_done_limit: 3,
        ..ReportConfig::default()
    };

    let report = db.status_report("demo", &config).unwrap();

    assert_eq!(report.recently_done.len(), 3);
    assert!(
        report
            .recently_done
            .iter()
            .all(|i| i.status == ItemStatus::Done)
    );
}

#[test]
fn empty_project_reports_zeroes() {
    let db = setup_db();
    let report = db.status_report("nothing", &ReportConfig::default()).unwrap();
    assert_eq!(report.total, 0);
    assert!(report.counts.values().all(|c| *c == 0));
    assert!(report.ready.is_empty());
}
