//! Entity families and their per-family status enums.
//!
//! # Responsibility
//! - Name the two entity families handled by the lifecycle engine.
//! - Map each family's status vocabulary onto one shared `Phase`.
//!
//! # Invariants
//! - A status value always belongs to exactly one family.
//! - Storage and wire names are lowercase and stable.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Entity family. Both families share the same lifecycle shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    /// Data-collection batch (`draft -> active -> closed`).
    DataBatch,
    /// Governance term (`upcoming -> active -> completed`).
    GovernanceTerm,
}

impl Family {
    pub const ALL: [Family; 2] = [Family::DataBatch, Family::GovernanceTerm];

    /// Stable storage/wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::DataBatch => "data_batch",
            Self::GovernanceTerm => "governance_term",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "data_batch" => Some(Self::DataBatch),
            "governance_term" => Some(Self::GovernanceTerm),
            _ => None,
        }
    }

    /// Whether the pause/resume lateral edge exists for this family.
    pub fn supports_pause(self) -> bool {
        matches!(self, Self::DataBatch)
    }

    /// Status assigned to newly created entities.
    pub fn initial_status(self) -> EntityStatus {
        EntityStatus::from_phase(self, Phase::Pending)
    }
}

impl Display for Family {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Family-neutral lifecycle position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// `draft` / `upcoming`.
    Pending,
    Active,
    /// `closed` / `completed`.
    Finished,
}

/// Data batch status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Draft,
    Active,
    Closed,
}

/// Governance term status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermStatus {
    Upcoming,
    Active,
    Completed,
}

/// Status of one entity, tagged by family.
///
/// Serialized as the bare status string (`"draft"`, `"completed"`, ...).
/// `"active"` deserializes as the batch variant; callers that need the term
/// variant rebuild it with [`EntityStatus::parse`] and the known family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityStatus {
    Batch(BatchStatus),
    Term(TermStatus),
}

impl EntityStatus {
    pub fn family(self) -> Family {
        match self {
            Self::Batch(_) => Family::DataBatch,
            Self::Term(_) => Family::GovernanceTerm,
        }
    }

    pub fn phase(self) -> Phase {
        match self {
            Self::Batch(BatchStatus::Draft) | Self::Term(TermStatus::Upcoming) => Phase::Pending,
            Self::Batch(BatchStatus::Active) | Self::Term(TermStatus::Active) => Phase::Active,
            Self::Batch(BatchStatus::Closed) | Self::Term(TermStatus::Completed) => {
                Phase::Finished
            }
        }
    }

    /// Builds the status naming `phase` in `family`'s vocabulary.
    pub fn from_phase(family: Family, phase: Phase) -> Self {
        match (family, phase) {
            (Family::DataBatch, Phase::Pending) => Self::Batch(BatchStatus::Draft),
            (Family::DataBatch, Phase::Active) => Self::Batch(BatchStatus::Active),
            (Family::DataBatch, Phase::Finished) => Self::Batch(BatchStatus::Closed),
            (Family::GovernanceTerm, Phase::Pending) => Self::Term(TermStatus::Upcoming),
            (Family::GovernanceTerm, Phase::Active) => Self::Term(TermStatus::Active),
            (Family::GovernanceTerm, Phase::Finished) => Self::Term(TermStatus::Completed),
        }
    }

    pub fn is_active(self) -> bool {
        self.phase() == Phase::Active
    }

    pub fn is_finished(self) -> bool {
        self.phase() == Phase::Finished
    }

    /// Stable storage/wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Batch(BatchStatus::Draft) => "draft",
            Self::Batch(BatchStatus::Active) | Self::Term(TermStatus::Active) => "active",
            Self::Batch(BatchStatus::Closed) => "closed",
            Self::Term(TermStatus::Upcoming) => "upcoming",
            Self::Term(TermStatus::Completed) => "completed",
        }
    }

    /// Parses a status name within the vocabulary of `family`.
    pub fn parse(family: Family, value: &str) -> Option<Self> {
        match (family, value) {
            (Family::DataBatch, "draft") => Some(Self::Batch(BatchStatus::Draft)),
            (Family::DataBatch, "active") => Some(Self::Batch(BatchStatus::Active)),
            (Family::DataBatch, "closed") => Some(Self::Batch(BatchStatus::Closed)),
            (Family::GovernanceTerm, "upcoming") => Some(Self::Term(TermStatus::Upcoming)),
            (Family::GovernanceTerm, "active") => Some(Self::Term(TermStatus::Active)),
            (Family::GovernanceTerm, "completed") => Some(Self::Term(TermStatus::Completed)),
            _ => None,
        }
    }
}

impl Display for EntityStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
