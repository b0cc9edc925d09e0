//! Structured lifecycle errors.
//!
//! Every error carries a machine-readable [`ErrorKind`], a human message
//! (its `Display`), and the offending field when one applies.

use crate::model::entity::{EntityId, EntityValidationError};
use crate::model::family::{EntityStatus, Family};
use crate::repo::entity_repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Coarse error classification for callers deciding how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Requested edge is not in the status model. Never retried.
    InvalidTransition,
    /// The family's active slot is taken. Surfaced, never auto-resolved.
    ActiveConflict,
    /// A date window collides with a sibling window.
    DateOverlap,
    /// Entity changed between read and write. Re-fetch, retry at most once.
    StaleState,
    /// Request rejected before any guard ran.
    Validation,
    /// A date guard refused an otherwise valid edge.
    GuardDenied,
    NotFound,
    Storage,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InvalidTransition => "invalid_transition",
            Self::ActiveConflict => "active_conflict",
            Self::DateOverlap => "date_overlap",
            Self::StaleState => "stale_state",
            Self::Validation => "validation",
            Self::GuardDenied => "guard_denied",
            Self::NotFound => "not_found",
            Self::Storage => "storage",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub enum LifecycleError {
    InvalidTransition {
        entity_id: EntityId,
        from: EntityStatus,
        /// Name of the requested change (`activate`, `pause`, ...).
        change: &'static str,
    },
    ActiveConflict {
        entity_id: EntityId,
        family: Family,
        /// Holder of the active slot, when known. May be `entity_id` itself.
        active_id: Option<EntityId>,
    },
    DateOverlap {
        entity_id: Option<EntityId>,
        field: &'static str,
        conflicting_id: EntityId,
    },
    StaleState {
        entity_id: EntityId,
        expected_version: i64,
        actual_version: Option<i64>,
    },
    Validation {
        field: &'static str,
        message: String,
    },
    GuardDenied {
        entity_id: EntityId,
        field: &'static str,
        message: String,
        forceable: bool,
    },
    NotFound(EntityId),
    Storage(RepoError),
}

impl LifecycleError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            Self::ActiveConflict { .. } => ErrorKind::ActiveConflict,
            Self::DateOverlap { .. } => ErrorKind::DateOverlap,
            Self::StaleState { .. } => ErrorKind::StaleState,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::GuardDenied { .. } => ErrorKind::GuardDenied,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Offending field, if the error is attributable to one.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            Self::InvalidTransition { .. } | Self::ActiveConflict { .. } => Some("status"),
            Self::DateOverlap { field, .. }
            | Self::Validation { field, .. }
            | Self::GuardDenied { field, .. } => Some(*field),
            Self::StaleState { .. } => Some("version"),
            Self::NotFound(_) => Some("id"),
            Self::Storage(_) => None,
        }
    }

    /// Whether retrying the same request with force could succeed.
    pub fn is_forceable(&self) -> bool {
        matches!(self, Self::GuardDenied { forceable: true, .. })
    }
}

impl Display for LifecycleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTransition {
                entity_id,
                from,
                change,
            } => write!(
                f,
                "transition `{change}` is not allowed from status `{from}` for {entity_id}"
            ),
            Self::ActiveConflict {
                entity_id,
                family,
                active_id,
            } => match active_id {
                Some(active_id) if active_id == entity_id => {
                    write!(f, "{family} {entity_id} is already active")
                }
                Some(active_id) => write!(
                    f,
                    "cannot activate {entity_id}: {family} {active_id} is already active"
                ),
                None => write!(
                    f,
                    "cannot activate {entity_id}: another {family} is already active"
                ),
            },
            Self::DateOverlap {
                entity_id,
                field,
                conflicting_id,
            } => match entity_id {
                Some(entity_id) => write!(
                    f,
                    "{field} of {entity_id} would overlap the window of {conflicting_id}"
                ),
                None => write!(f, "{field} would overlap the window of {conflicting_id}"),
            },
            Self::StaleState {
                entity_id,
                expected_version,
                actual_version,
            } => match actual_version {
                Some(actual) => write!(
                    f,
                    "{entity_id} changed concurrently: expected version {expected_version}, found {actual}"
                ),
                None => write!(
                    f,
                    "{entity_id} changed concurrently: expected version {expected_version}"
                ),
            },
            Self::Validation { field, message } => write!(f, "invalid {field}: {message}"),
            Self::GuardDenied { message, .. } => write!(f, "{message}"),
            Self::NotFound(id) => write!(f, "entity not found: {id}"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for LifecycleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for LifecycleError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::VersionConflict {
                id,
                expected,
                actual,
            } => Self::StaleState {
                entity_id: id,
                expected_version: expected,
                actual_version: actual,
            },
            RepoError::ActiveSlotTaken { id, family } => Self::ActiveConflict {
                entity_id: id,
                family,
                active_id: None,
            },
            RepoError::Validation(err) => err.into(),
            other => Self::Storage(other),
        }
    }
}

impl From<EntityValidationError> for LifecycleError {
    fn from(value: EntityValidationError) -> Self {
        Self::Validation {
            field: value.field(),
            message: value.to_string(),
        }
    }
}
