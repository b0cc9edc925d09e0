//! Transition audit trail records.
//!
//! One record is written per applied transition, in the same storage
//! transaction as the entity mutation.

use crate::model::entity::EntityId;
use crate::model::family::{EntityStatus, Family};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Date field rewritten as part of a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateField {
    StartDate,
    EndDate,
}

impl DateField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StartDate => "start_date",
            Self::EndDate => "end_date",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "start_date" => Some(Self::StartDate),
            "end_date" => Some(Self::EndDate),
            _ => None,
        }
    }
}

/// Persisted trace of one applied transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionAuditRecord {
    pub entity_id: EntityId,
    pub family: Family,
    /// Action name, e.g. `activate`, `force_close`, `sweep_close`, `extend`.
    pub action: String,
    pub from_status: EntityStatus,
    pub to_status: EntityStatus,
    /// Opaque annotation supplied with forced actions, pauses and sweeps.
    pub reason: Option<String>,
    pub rewritten_field: Option<DateField>,
    pub previous_date: Option<NaiveDate>,
    pub new_date: Option<NaiveDate>,
    /// Epoch ms.
    pub recorded_at: i64,
}
