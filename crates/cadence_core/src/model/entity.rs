//! Lifecycle entity model.
//!
//! # Responsibility
//! - Define the canonical record shared by batches and governance terms.
//! - Provide the inclusive date window and its overlap predicate.
//!
//! # Invariants
//! - `id` is stable and never reused for another entity.
//! - `status` always belongs to the vocabulary of `family`.
//! - `start_date <= end_date` for every persisted entity.
//! - `paused_at` is only set on an active data batch.

use crate::model::family::{EntityStatus, Family};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for lifecycle entities.
pub type EntityId = Uuid;

/// Inclusive `[start, end]` calendar window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Whether `day` falls inside the window, bounds included.
    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }

    /// Two windows overlap when each starts before the other ends.
    ///
    /// Windows that only touch on a boundary day do not overlap.
    pub fn overlaps(&self, other: &DateWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Validation failures for entity records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityValidationError {
    BlankDisplayName,
    InvertedWindow {
        start_date: NaiveDate,
        end_date: NaiveDate,
    },
    StatusFamilyMismatch {
        family: Family,
        status: EntityStatus,
    },
    PausedWhileNotActive(EntityStatus),
    PauseUnsupported(Family),
}

impl EntityValidationError {
    /// Offending field name.
    pub fn field(&self) -> &'static str {
        match self {
            Self::BlankDisplayName => "display_name",
            Self::InvertedWindow { .. } => "end_date",
            Self::StatusFamilyMismatch { .. } => "status",
            Self::PausedWhileNotActive(_) | Self::PauseUnsupported(_) => "paused_at",
        }
    }
}

impl Display for EntityValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankDisplayName => write!(f, "display name must not be blank"),
            Self::InvertedWindow {
                start_date,
                end_date,
            } => write!(
                f,
                "end date {end_date} must not be earlier than start date {start_date}"
            ),
            Self::StatusFamilyMismatch { family, status } => {
                write!(f, "status `{status}` does not belong to family `{family}`")
            }
            Self::PausedWhileNotActive(status) => {
                write!(f, "paused_at may only be set while active, status is `{status}`")
            }
            Self::PauseUnsupported(family) => {
                write!(f, "family `{family}` does not support pause")
            }
        }
    }
}

impl Error for EntityValidationError {}

/// One batch or governance term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleEntity {
    pub id: EntityId,
    pub family: Family,
    pub display_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub status: EntityStatus,
    /// Epoch ms. Data batches only, only while active.
    pub paused_at: Option<i64>,
    pub pause_reason: Option<String>,
    /// Epoch ms of the first activation. `None` means never activated.
    pub activated_at: Option<i64>,
    /// Compare-and-swap counter, bumped on every persisted mutation.
    pub version: i64,
    /// Epoch ms.
    pub created_at: i64,
    /// Epoch ms.
    pub updated_at: i64,
}

impl LifecycleEntity {
    /// Builds a pending entity from a creation request.
    ///
    /// Does not validate; callers run [`NewEntity::validate`] first.
    pub fn pending(request: &NewEntity, now_ms: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            family: request.family,
            display_name: request.display_name.trim().to_string(),
            start_date: request.start_date,
            end_date: request.end_date,
            status: request.family.initial_status(),
            paused_at: None,
            pause_reason: None,
            activated_at: None,
            version: 1,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    pub fn window(&self) -> DateWindow {
        DateWindow::new(self.start_date, self.end_date)
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn was_activated(&self) -> bool {
        self.activated_at.is_some()
    }

    /// Checks record-level invariants that do not depend on siblings.
    pub fn validate(&self) -> Result<(), EntityValidationError> {
        if self.display_name.trim().is_empty() {
            return Err(EntityValidationError::BlankDisplayName);
        }
        if self.start_date > self.end_date {
            return Err(EntityValidationError::InvertedWindow {
                start_date: self.start_date,
                end_date: self.end_date,
            });
        }
        if self.status.family() != self.family {
            return Err(EntityValidationError::StatusFamilyMismatch {
                family: self.family,
                status: self.status,
            });
        }
        if self.paused_at.is_some() {
            if !self.family.supports_pause() {
                return Err(EntityValidationError::PauseUnsupported(self.family));
            }
            if !self.status.is_active() {
                return Err(EntityValidationError::PausedWhileNotActive(self.status));
            }
        }
        Ok(())
    }
}

/// Creation request for a new draft batch or upcoming term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntity {
    pub family: Family,
    pub display_name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl NewEntity {
    pub fn new(
        family: Family,
        display_name: impl Into<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Self {
        Self {
            family,
            display_name: display_name.into(),
            start_date,
            end_date,
        }
    }

    pub fn window(&self) -> DateWindow {
        DateWindow::new(self.start_date, self.end_date)
    }

    /// Creation requires a non-blank name and `start_date < end_date`.
    pub fn validate(&self) -> Result<(), EntityValidationError> {
        if self.display_name.trim().is_empty() {
            return Err(EntityValidationError::BlankDisplayName);
        }
        if self.start_date >= self.end_date {
            return Err(EntityValidationError::InvertedWindow {
                start_date: self.start_date,
                end_date: self.end_date,
            });
        }
        Ok(())
    }
}
