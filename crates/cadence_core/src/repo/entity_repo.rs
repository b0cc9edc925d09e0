//! Lifecycle entity repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist batches, governance terms and their transition audit trail.
//! - Expose version compare-and-swap so concurrent writers cannot silently
//!   overwrite each other.
//! - Provide an exclusive write scope in which read-check-write sequences
//!   run atomically.
//!
//! # Invariants
//! - Write paths call `LifecycleEntity::validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - A successful swap bumps `version` by exactly one.
//! - The storage-level single-active index surfaces as `ActiveSlotTaken`.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::audit::{DateField, TransitionAuditRecord};
use crate::model::entity::{EntityId, EntityValidationError, LifecycleEntity};
use crate::model::family::{EntityStatus, Family};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const DATE_FORMAT: &str = "%Y-%m-%d";

const ENTITY_SELECT_SQL: &str = "SELECT
    id,
    family,
    display_name,
    start_date,
    end_date,
    status,
    paused_at,
    pause_reason,
    activated_at,
    version,
    created_at,
    updated_at
FROM lifecycle_entities";

const AUDIT_SELECT_SQL: &str = "SELECT
    entity_id,
    family,
    action,
    from_status,
    to_status,
    reason,
    rewritten_field,
    previous_date,
    new_date,
    recorded_at
FROM lifecycle_audit";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for lifecycle persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(EntityValidationError),
    Db(DbError),
    NotFound(EntityId),
    /// Persisted data cannot be converted to a valid entity or audit record.
    InvalidData(String),
    /// Stored version differs from the caller's expectation.
    VersionConflict {
        id: EntityId,
        expected: i64,
        actual: Option<i64>,
    },
    /// Storage refused a second active entity in `family`.
    ActiveSlotTaken { id: EntityId, family: Family },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "lifecycle entity not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted lifecycle data: {message}"),
            Self::VersionConflict {
                id,
                expected,
                actual,
            } => match actual {
                Some(actual) => write!(
                    f,
                    "entity {id} is at version {actual}, expected {expected}"
                ),
                None => write!(f, "entity {id} vanished while expecting version {expected}"),
            },
            Self::ActiveSlotTaken { id, family } => write!(
                f,
                "cannot activate {id}: family `{family}` already has an active entity"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "lifecycle repository requires schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EntityValidationError> for RepoError {
    fn from(value: EntityValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Repository interface for lifecycle entities and their audit trail.
pub trait EntityRepository {
    fn insert_entity(&self, entity: &LifecycleEntity) -> RepoResult<()>;
    fn get_entity(&self, id: EntityId) -> RepoResult<Option<LifecycleEntity>>;
    /// Entities of one family ordered by `(start_date, id)`.
    fn list_family(&self, family: Family) -> RepoResult<Vec<LifecycleEntity>>;
    /// All entities ordered by `(family, start_date, id)`.
    fn list_all(&self) -> RepoResult<Vec<LifecycleEntity>>;
    /// Persists `updated` only if the stored version is still
    /// `expected_version`; returns the stored entity with its new version.
    fn compare_and_swap(
        &self,
        updated: &LifecycleEntity,
        expected_version: i64,
    ) -> RepoResult<LifecycleEntity>;
    fn append_audit(&self, record: &TransitionAuditRecord) -> RepoResult<()>;
    /// Audit records of one entity, oldest first.
    fn list_audit(&self, entity_id: EntityId) -> RepoResult<Vec<TransitionAuditRecord>>;
    /// Runs `work` while holding the store's write lock.
    ///
    /// Everything written inside `work` commits together when it returns
    /// `Ok`, and is rolled back when it returns `Err`.
    fn write_scope<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<RepoError>;
}

/// SQLite-backed lifecycle repository.
pub struct SqliteEntityRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEntityRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        let expected_version = latest_version();
        let actual_version: u32 =
            conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
        if actual_version != expected_version {
            return Err(RepoError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }

    fn query_entities(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> RepoResult<Vec<LifecycleEntity>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params)?;
        let mut entities = Vec::new();
        while let Some(row) = rows.next()? {
            entities.push(parse_entity_row(row)?);
        }
        Ok(entities)
    }

    fn stored_version(&self, id: EntityId) -> RepoResult<Option<i64>> {
        let version = self
            .conn
            .query_row(
                "SELECT version FROM lifecycle_entities WHERE id = ?1;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version)
    }
}

impl EntityRepository for SqliteEntityRepository<'_> {
    fn insert_entity(&self, entity: &LifecycleEntity) -> RepoResult<()> {
        entity.validate()?;

        self.conn
            .execute(
                "INSERT INTO lifecycle_entities (
                    id,
                    family,
                    display_name,
                    start_date,
                    end_date,
                    status,
                    paused_at,
                    pause_reason,
                    activated_at,
                    version,
                    created_at,
                    updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
                params![
                    entity.id.to_string(),
                    entity.family.as_str(),
                    entity.display_name.as_str(),
                    date_to_db(entity.start_date),
                    date_to_db(entity.end_date),
                    entity.status.as_str(),
                    entity.paused_at,
                    entity.pause_reason.as_deref(),
                    entity.activated_at,
                    entity.version,
                    entity.created_at,
                    entity.updated_at,
                ],
            )
            .map_err(|err| map_active_slot(err, entity))?;

        Ok(())
    }

    fn get_entity(&self, id: EntityId) -> RepoResult<Option<LifecycleEntity>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ENTITY_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_entity_row(row)?));
        }
        Ok(None)
    }

    fn list_family(&self, family: Family) -> RepoResult<Vec<LifecycleEntity>> {
        self.query_entities(
            &format!("{ENTITY_SELECT_SQL} WHERE family = ?1 ORDER BY start_date ASC, id ASC;"),
            [family.as_str()],
        )
    }

    fn list_all(&self) -> RepoResult<Vec<LifecycleEntity>> {
        self.query_entities(
            &format!("{ENTITY_SELECT_SQL} ORDER BY family ASC, start_date ASC, id ASC;"),
            [],
        )
    }

    fn compare_and_swap(
        &self,
        updated: &LifecycleEntity,
        expected_version: i64,
    ) -> RepoResult<LifecycleEntity> {
        updated.validate()?;
        let next_version = expected_version + 1;

        let changed = self
            .conn
            .execute(
                "UPDATE lifecycle_entities
                 SET
                    display_name = ?3,
                    start_date = ?4,
                    end_date = ?5,
                    status = ?6,
                    paused_at = ?7,
                    pause_reason = ?8,
                    activated_at = ?9,
                    version = ?10,
                    updated_at = ?11
                 WHERE id = ?1
                   AND version = ?2;",
                params![
                    updated.id.to_string(),
                    expected_version,
                    updated.display_name.as_str(),
                    date_to_db(updated.start_date),
                    date_to_db(updated.end_date),
                    updated.status.as_str(),
                    updated.paused_at,
                    updated.pause_reason.as_deref(),
                    updated.activated_at,
                    next_version,
                    updated.updated_at,
                ],
            )
            .map_err(|err| map_active_slot(err, updated))?;

        if changed == 0 {
            return match self.stored_version(updated.id)? {
                None => Err(RepoError::NotFound(updated.id)),
                actual => Err(RepoError::VersionConflict {
                    id: updated.id,
                    expected: expected_version,
                    actual,
                }),
            };
        }

        let mut stored = updated.clone();
        stored.version = next_version;
        Ok(stored)
    }

    fn append_audit(&self, record: &TransitionAuditRecord) -> RepoResult<()> {
        self.conn.execute(
            "INSERT INTO lifecycle_audit (
                entity_id,
                family,
                action,
                from_status,
                to_status,
                reason,
                rewritten_field,
                previous_date,
                new_date,
                recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
            params![
                record.entity_id.to_string(),
                record.family.as_str(),
                record.action.as_str(),
                record.from_status.as_str(),
                record.to_status.as_str(),
                record.reason.as_deref(),
                record.rewritten_field.map(DateField::as_str),
                record.previous_date.map(date_to_db),
                record.new_date.map(date_to_db),
                record.recorded_at,
            ],
        )?;
        Ok(())
    }

    fn list_audit(&self, entity_id: EntityId) -> RepoResult<Vec<TransitionAuditRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "{AUDIT_SELECT_SQL} WHERE entity_id = ?1 ORDER BY seq ASC;"
        ))?;
        let mut rows = stmt.query([entity_id.to_string()])?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_audit_row(row)?);
        }
        Ok(records)
    }

    fn write_scope<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<RepoError>,
    {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)
            .map_err(RepoError::from)?;
        let value = work(self)?;
        tx.commit().map_err(RepoError::from)?;
        Ok(value)
    }
}

fn map_active_slot(err: rusqlite::Error, entity: &LifecycleEntity) -> RepoError {
    if let rusqlite::Error::SqliteFailure(failure, _) = &err {
        if failure.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            && entity.status.is_active()
        {
            return RepoError::ActiveSlotTaken {
                id: entity.id,
                family: entity.family,
            };
        }
    }
    RepoError::from(err)
}

fn parse_entity_row(row: &Row<'_>) -> RepoResult<LifecycleEntity> {
    let id = parse_uuid(row.get("id")?, "lifecycle_entities.id")?;
    let family = parse_family(row.get("family")?, "lifecycle_entities.family")?;
    let status = parse_status(family, row.get("status")?, "lifecycle_entities.status")?;

    let entity = LifecycleEntity {
        id,
        family,
        display_name: row.get("display_name")?,
        start_date: parse_date(row.get("start_date")?, "lifecycle_entities.start_date")?,
        end_date: parse_date(row.get("end_date")?, "lifecycle_entities.end_date")?,
        status,
        paused_at: row.get("paused_at")?,
        pause_reason: row.get("pause_reason")?,
        activated_at: row.get("activated_at")?,
        version: row.get("version")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    };
    entity.validate()?;
    Ok(entity)
}

fn parse_audit_row(row: &Row<'_>) -> RepoResult<TransitionAuditRecord> {
    let family = parse_family(row.get("family")?, "lifecycle_audit.family")?;

    let rewritten_field = match row.get::<_, Option<String>>("rewritten_field")? {
        Some(value) => Some(DateField::parse(&value).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid date field `{value}` in lifecycle_audit.rewritten_field"
            ))
        })?),
        None => None,
    };

    Ok(TransitionAuditRecord {
        entity_id: parse_uuid(row.get("entity_id")?, "lifecycle_audit.entity_id")?,
        family,
        action: row.get("action")?,
        from_status: parse_status(family, row.get("from_status")?, "lifecycle_audit.from_status")?,
        to_status: parse_status(family, row.get("to_status")?, "lifecycle_audit.to_status")?,
        reason: row.get("reason")?,
        rewritten_field,
        previous_date: parse_optional_date(
            row.get("previous_date")?,
            "lifecycle_audit.previous_date",
        )?,
        new_date: parse_optional_date(row.get("new_date")?, "lifecycle_audit.new_date")?,
        recorded_at: row.get("recorded_at")?,
    })
}

fn parse_uuid(value: String, column: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(&value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {column}")))
}

fn parse_family(value: String, column: &str) -> RepoResult<Family> {
    Family::parse(&value)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid family `{value}` in {column}")))
}

fn parse_status(family: Family, value: String, column: &str) -> RepoResult<EntityStatus> {
    EntityStatus::parse(family, &value).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid status `{value}` for family `{family}` in {column}"
        ))
    })
}

fn parse_date(value: String, column: &str) -> RepoResult<NaiveDate> {
    NaiveDate::parse_from_str(&value, DATE_FORMAT)
        .map_err(|_| RepoError::InvalidData(format!("invalid date `{value}` in {column}")))
}

fn parse_optional_date(value: Option<String>, column: &str) -> RepoResult<Option<NaiveDate>> {
    value.map(|value| parse_date(value, column)).transpose()
}

fn date_to_db(value: NaiveDate) -> String {
    value.format(DATE_FORMAT).to_string()
}
