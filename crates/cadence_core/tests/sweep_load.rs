use cadence_core::db::open_db_in_memory;
use cadence_core::{
    BatchStatus, EntityStatus, ErrorKind, Family, FixedClock, LifecycleEntity, LifecycleService,
    NewEntity, SqliteEntityRepository, SweepReason,
};
use chrono::NaiveDate;
use rusqlite::Connection;

fn day(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

fn service_at<'a>(conn: &'a Connection, today: &str) -> LifecycleService<SqliteEntityRepository<'a>, FixedClock> {
    LifecycleService::new(
        SqliteEntityRepository::try_new(conn).unwrap(),
        FixedClock::at_date(day(today)),
    )
}

fn create(conn: &Connection, family: Family, name: &str, start: &str, end: &str) -> LifecycleEntity {
    service_at(conn, "2024-12-01")
        .create(&NewEntity::new(family, name, day(start), day(end)))
        .unwrap()
}

#[test]
fn batch_lifecycle_follows_the_calendar() {
    let conn = open_db_in_memory().unwrap();
    let batch = create(&conn, Family::DataBatch, "A", "2025-01-10", "2025-01-20");

    let before = service_at(&conn, "2025-01-09").load(None).unwrap();
    assert!(before.applied.is_empty());
    assert_eq!(before.entities[0].status, EntityStatus::Batch(BatchStatus::Draft));

    let opened = service_at(&conn, "2025-01-10").load(Some(Family::DataBatch)).unwrap();
    assert_eq!(opened.applied.len(), 1);
    assert_eq!(opened.entities[0].status, EntityStatus::Batch(BatchStatus::Active));

    let last_day = service_at(&conn, "2025-01-20").load(None).unwrap();
    assert!(last_day.applied.is_empty(), "end date is inclusive");

    let elapsed = service_at(&conn, "2025-01-21").load(None).unwrap();
    assert_eq!(elapsed.applied.len(), 1);
    let closed = &elapsed.entities[0];
    assert_eq!(closed.status, EntityStatus::Batch(BatchStatus::Closed));
    assert_eq!(closed.end_date, day("2025-01-20"), "sweep never rewrites dates");

    let history = service_at(&conn, "2025-01-21").history(batch.id).unwrap();
    let trail: Vec<_> = history
        .iter()
        .map(|record| (record.action.as_str(), record.reason.as_deref()))
        .collect();
    assert_eq!(
        trail,
        vec![
            ("sweep_activate", Some("window_opened")),
            ("sweep_close", Some("window_elapsed")),
        ]
    );
}

#[test]
fn load_is_idempotent_for_the_same_day() {
    let conn = open_db_in_memory().unwrap();
    create(&conn, Family::DataBatch, "A", "2025-01-01", "2025-01-20");
    create(&conn, Family::DataBatch, "B", "2025-01-20", "2025-02-10");
    create(&conn, Family::GovernanceTerm, "T", "2025-01-01", "2025-12-31");

    let first = service_at(&conn, "2025-01-05").load(None).unwrap();
    assert_eq!(first.applied.len(), 2);
    let second = service_at(&conn, "2025-01-05").load(None).unwrap();
    assert!(second.applied.is_empty());
    assert!(second.skipped.is_empty());
    assert_eq!(first.entities, second.entities);
}

#[test]
fn elapsed_batch_closes_before_successor_activates() {
    let conn = open_db_in_memory().unwrap();
    let a = create(&conn, Family::DataBatch, "A", "2025-01-01", "2025-01-20");
    let b = create(&conn, Family::DataBatch, "B", "2025-01-20", "2025-02-10");
    service_at(&conn, "2025-01-05").load(None).unwrap();

    let report = service_at(&conn, "2025-01-21").load(None).unwrap();
    let ids: Vec<_> = report.applied.iter().map(|entity| entity.id).collect();
    assert_eq!(ids, vec![a.id, b.id]);
    assert!(report.applied[0].status.is_finished());
    assert!(report.applied[1].status.is_active());
}

#[test]
fn never_activated_entity_is_closed_directly() {
    let conn = open_db_in_memory().unwrap();
    let term = create(&conn, Family::GovernanceTerm, "Missed", "2024-12-01", "2024-12-31");

    let proposals = service_at(&conn, "2025-01-02").preview_sweep(None).unwrap();
    assert_eq!(proposals.len(), 1);
    assert_eq!(proposals[0].reason, SweepReason::ElapsedBeforeActivation);

    let report = service_at(&conn, "2025-01-02").load(None).unwrap();
    assert_eq!(report.applied.len(), 1);
    let closed = &report.applied[0];
    assert_eq!(closed.id, term.id);
    assert!(closed.status.is_finished());
    assert_eq!(closed.activated_at, None);
}

#[test]
fn preview_does_not_write() {
    let conn = open_db_in_memory().unwrap();
    let batch = create(&conn, Family::DataBatch, "A", "2025-01-10", "2025-01-20");
    let service = service_at(&conn, "2025-01-12");

    assert_eq!(service.preview_sweep(None).unwrap().len(), 1);
    assert_eq!(service.get(batch.id).unwrap(), batch);
}

#[test]
fn stale_proposals_are_skipped_not_retried() {
    let conn = open_db_in_memory().unwrap();
    let batch = create(&conn, Family::DataBatch, "A", "2025-01-10", "2025-01-20");
    let service = service_at(&conn, "2025-01-12");

    let proposals = service.preview_sweep(None).unwrap();
    service.activate(batch.id).unwrap();

    let outcome = service.apply_proposals(&proposals);
    assert!(outcome.applied.is_empty());
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].error_kind, ErrorKind::StaleState.as_str());
    assert_eq!(service.history(batch.id).unwrap().len(), 1);
}

#[test]
fn sweep_report_serializes_for_cli_output() {
    let conn = open_db_in_memory().unwrap();
    create(&conn, Family::DataBatch, "A", "2025-01-10", "2025-01-20");
    let report = service_at(&conn, "2025-01-10").load(None).unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["applied"][0]["status"], "active");
    assert_eq!(json["applied"][0]["family"], "data_batch");
    assert_eq!(json["entities"][0]["start_date"], "2025-01-10");
}
