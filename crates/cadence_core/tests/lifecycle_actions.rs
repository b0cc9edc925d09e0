use cadence_core::db::open_db_in_memory;
use cadence_core::{
    BatchStatus, DateField, EntityStatus, ErrorKind, Family, FixedClock, LifecycleEntity,
    LifecycleService, NewEntity, RequestedChange, SqliteEntityRepository, TermStatus,
    TransitionRequest,
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
fn create_starts_pending_at_version_one() {
    let conn = open_db_in_memory().unwrap();
    let batch = create(&conn, Family::DataBatch, "Wave 1", "2025-01-10", "2025-01-20");
    let term = create(&conn, Family::GovernanceTerm, "Board", "2025-01-01", "2025-12-31");

    assert_eq!(batch.status, EntityStatus::Batch(BatchStatus::Draft));
    assert_eq!(term.status, EntityStatus::Term(TermStatus::Upcoming));
    assert_eq!(batch.version, 1);
    assert_eq!(service_at(&conn, "2025-01-01").get(batch.id).unwrap(), batch);
}

#[test]
fn create_rejects_overlap_but_allows_touching_windows_and_other_families() {
    let conn = open_db_in_memory().unwrap();
    let service = service_at(&conn, "2024-12-01");
    let june = service
        .create(&NewEntity::new(Family::DataBatch, "June", day("2025-06-01"), day("2025-06-30")))
        .unwrap();

    let err = service
        .create(&NewEntity::new(Family::DataBatch, "Late June", day("2025-06-20"), day("2025-07-10")))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DateOverlap);
    assert!(err.to_string().contains(&june.id.to_string()));

    service
        .create(&NewEntity::new(Family::DataBatch, "July", day("2025-06-30"), day("2025-07-31")))
        .expect("touching windows do not overlap");
    service
        .create(&NewEntity::new(Family::GovernanceTerm, "Board", day("2025-06-10"), day("2025-06-20")))
        .expect("other family is independent");
    assert_eq!(service.list(Some(Family::DataBatch)).unwrap().len(), 2);
}

#[test]
fn create_ignores_closed_siblings() {
    let conn = open_db_in_memory().unwrap();
    let old = create(&conn, Family::DataBatch, "Old", "2025-01-01", "2025-01-31");
    service_at(&conn, "2025-01-05").activate(old.id).unwrap();
    service_at(&conn, "2025-01-10").close(old.id).unwrap();

    service_at(&conn, "2025-01-10")
        .create(&NewEntity::new(Family::DataBatch, "Redo", day("2025-01-05"), day("2025-02-10")))
        .expect("closed windows do not block creation");
}

#[test]
fn create_validates_name_and_window_before_storage() {
    let conn = open_db_in_memory().unwrap();
    let service = service_at(&conn, "2024-12-01");

    let blank = service
        .create(&NewEntity::new(Family::DataBatch, "  ", day("2025-01-01"), day("2025-01-02")))
        .unwrap_err();
    assert_eq!((blank.kind(), blank.field()), (ErrorKind::Validation, Some("display_name")));

    let same_day = service
        .create(&NewEntity::new(Family::DataBatch, "x", day("2025-01-02"), day("2025-01-02")))
        .unwrap_err();
    assert_eq!((same_day.kind(), same_day.field()), (ErrorKind::Validation, Some("end_date")));
    assert!(service.list(None).unwrap().is_empty());
}

#[test]
fn plain_activate_before_start_is_denied_and_force_rewrites_start() {
    let conn = open_db_in_memory().unwrap();
    let batch = create(&conn, Family::DataBatch, "B", "2025-02-01", "2025-02-20");
    let service = service_at(&conn, "2025-01-15");

    let denied = service.activate(batch.id).unwrap_err();
    assert_eq!(denied.kind(), ErrorKind::GuardDenied);
    assert!(denied.is_forceable());
    assert_eq!(service.get(batch.id).unwrap(), batch, "denied action changes nothing");

    let missing_reason = service.force_activate(batch.id, " ").unwrap_err();
    assert_eq!(missing_reason.kind(), ErrorKind::Validation);

    let active = service.force_activate(batch.id, "sponsor moved kickoff").unwrap();
    assert!(active.status.is_active());
    assert_eq!(active.start_date, day("2025-01-15"));
    assert_eq!(active.end_date, day("2025-02-20"));
    assert_eq!(active.version, 2);
    assert!(active.activated_at.is_some());

    let history = service.history(batch.id).unwrap();
    assert_eq!(history.len(), 1);
    let record = &history[0];
    assert_eq!(record.action, "force_activate");
    assert_eq!(record.reason.as_deref(), Some("sponsor moved kickoff"));
    assert_eq!(record.rewritten_field, Some(DateField::StartDate));
    assert_eq!(record.previous_date, Some(day("2025-02-01")));
    assert_eq!(record.new_date, Some(day("2025-01-15")));
    assert_eq!(record.from_status, EntityStatus::Batch(BatchStatus::Draft));
    assert_eq!(record.to_status, EntityStatus::Batch(BatchStatus::Active));
}

#[test]
fn activation_with_active_sibling_is_a_conflict() {
    let conn = open_db_in_memory().unwrap();
    let first = create(&conn, Family::GovernanceTerm, "T1", "2025-01-01", "2025-06-30");
    let second = create(&conn, Family::GovernanceTerm, "T2", "2025-07-01", "2025-12-31");
    service_at(&conn, "2025-01-02").activate(first.id).unwrap();

    let err = service_at(&conn, "2025-06-01")
        .force_activate(second.id, "early handover")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ActiveConflict);
    assert!(err.to_string().contains(&first.id.to_string()));

    let again = service_at(&conn, "2025-01-03").activate(first.id).unwrap_err();
    assert_eq!(again.kind(), ErrorKind::ActiveConflict);
}

#[test]
fn activation_after_window_is_denied_even_with_force() {
    let conn = open_db_in_memory().unwrap();
    let batch = create(&conn, Family::DataBatch, "B", "2025-01-01", "2025-01-10");
    let err = service_at(&conn, "2025-01-11")
        .force_activate(batch.id, "late")
        .unwrap_err();
    assert_eq!((err.kind(), err.field()), (ErrorKind::GuardDenied, Some("end_date")));
    assert!(!err.is_forceable());
}

#[test]
fn close_now_rewrites_end_date_to_today() {
    let conn = open_db_in_memory().unwrap();
    let batch = create(&conn, Family::DataBatch, "A", "2025-01-10", "2025-01-20");
    service_at(&conn, "2025-01-10").activate(batch.id).unwrap();

    let closed = service_at(&conn, "2025-01-15").close(batch.id).unwrap();
    assert_eq!(closed.status, EntityStatus::Batch(BatchStatus::Closed));
    assert_eq!(closed.end_date, day("2025-01-15"));

    let history = service_at(&conn, "2025-01-15").history(batch.id).unwrap();
    let actions: Vec<_> = history.iter().map(|r| r.action.as_str()).collect();
    assert_eq!(actions, vec!["activate", "close"]);
    assert_eq!(history[1].rewritten_field, Some(DateField::EndDate));
    assert_eq!(history[1].previous_date, Some(day("2025-01-20")));

    let twice = service_at(&conn, "2025-01-16").close(batch.id).unwrap_err();
    assert_eq!(twice.kind(), ErrorKind::InvalidTransition);
}

#[test]
fn closing_on_last_day_records_no_date_rewrite() {
    let conn = open_db_in_memory().unwrap();
    let batch = create(&conn, Family::DataBatch, "A", "2025-01-10", "2025-01-20");
    service_at(&conn, "2025-01-10").activate(batch.id).unwrap();

    let closed = service_at(&conn, "2025-01-20").close(batch.id).unwrap();
    assert_eq!(closed.end_date, day("2025-01-20"));

    let history = service_at(&conn, "2025-01-20").history(batch.id).unwrap();
    assert_eq!(history[1].action, "close");
    assert_eq!(history[1].rewritten_field, None);
    assert_eq!(history[1].previous_date, None);
    assert_eq!(history[1].new_date, None);
}

#[test]
fn never_activated_entity_needs_force_to_close() {
    let conn = open_db_in_memory().unwrap();
    let term = create(&conn, Family::GovernanceTerm, "Lapsed", "2024-01-01", "2024-06-30");
    let service = service_at(&conn, "2024-07-15");

    let manual = service.close(term.id).unwrap_err();
    assert_eq!(manual.kind(), ErrorKind::GuardDenied);
    assert!(manual.is_forceable());

    let closed = service.force_close(term.id, "term never convened").unwrap();
    assert_eq!(closed.status, EntityStatus::Term(TermStatus::Completed));
    assert_eq!(closed.end_date, day("2024-06-30"));
    assert_eq!(closed.activated_at, None);

    let history = service.history(term.id).unwrap();
    assert_eq!(history[0].action, "force_close");
    assert_eq!(history[0].rewritten_field, None);
}

#[test]
fn reopen_requires_extension_first() {
    let conn = open_db_in_memory().unwrap();
    let batch = create(&conn, Family::DataBatch, "A", "2025-01-10", "2025-01-20");
    service_at(&conn, "2025-01-10").activate(batch.id).unwrap();
    let closed = service_at(&conn, "2025-01-21").close(batch.id).unwrap();
    assert_eq!(closed.end_date, day("2025-01-20"), "natural close keeps end date");

    let service = service_at(&conn, "2025-01-25");
    assert_eq!(service.reopen(batch.id).unwrap_err().kind(), ErrorKind::GuardDenied);

    let extended = service.extend(batch.id, day("2025-01-31")).unwrap();
    assert!(extended.status.is_finished());
    let reopened = service.reopen(batch.id).unwrap();
    assert!(reopened.status.is_active());
    assert_eq!(reopened.activated_at, closed.activated_at);

    let actions: Vec<_> = service
        .history(batch.id)
        .unwrap()
        .into_iter()
        .map(|record| record.action)
        .collect();
    assert_eq!(actions, vec!["activate", "close", "extend", "reopen"]);

    let not_finished = service.reopen(batch.id).unwrap_err();
    assert_eq!(not_finished.kind(), ErrorKind::InvalidTransition);
}

#[test]
fn stale_expected_version_is_rejected_without_writing() {
    let conn = open_db_in_memory().unwrap();
    let batch = create(&conn, Family::DataBatch, "A", "2025-01-10", "2025-01-20");
    let service = service_at(&conn, "2025-01-12");

    let request = TransitionRequest::manual(batch.id, RequestedChange::Activate)
        .with_expected_version(batch.version + 1);
    let err = service.apply(&request).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StaleState);
    assert_eq!(service.get(batch.id).unwrap().version, batch.version);
    assert!(service.history(batch.id).unwrap().is_empty());
}

#[test]
fn unknown_ids_are_not_found() {
    let conn = open_db_in_memory().unwrap();
    let service = service_at(&conn, "2025-01-12");
    let id = uuid::Uuid::new_v4();

    assert_eq!(service.get(id).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(service.activate(id).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(service.history(id).unwrap_err().kind(), ErrorKind::NotFound);
    assert_eq!(
        service.extend(id, day("2025-02-01")).unwrap_err().kind(),
        ErrorKind::NotFound
    );
}
