//! End-date extension planning.
//!
//! # Responsibility
//! - Check an extension against the current snapshot without writing.
//! - Hand an accepted plan to the executor, pinned to the planned version.
//!
//! # Invariants
//! - Extension moves `end_date` forward only and never changes status.
//! - The extended window never reaches into the chronologically next
//!   sibling's window.

use crate::clock::Clock;
use crate::lifecycle::error::{LifecycleError, LifecycleResult};
use crate::lifecycle::guard::{check_extension, RequestedChange};
use crate::model::entity::{EntityId, LifecycleEntity};
use crate::repo::entity_repo::EntityRepository;
use crate::service::executor::{TransitionExecutor, TransitionRequest};
use chrono::NaiveDate;
use serde::Serialize;

/// Accepted extension, ready to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtensionPlan {
    pub entity_id: EntityId,
    pub expected_version: i64,
    pub previous_end_date: NaiveDate,
    pub new_end_date: NaiveDate,
}

impl ExtensionPlan {
    pub fn into_request(self) -> TransitionRequest {
        TransitionRequest::manual(
            self.entity_id,
            RequestedChange::Extend {
                new_end_date: self.new_end_date,
            },
        )
        .with_expected_version(self.expected_version)
    }
}

/// Pure planning step over a snapshot; `siblings` may include `entity`.
pub fn plan(
    entity: &LifecycleEntity,
    new_end_date: NaiveDate,
    siblings: &[LifecycleEntity],
) -> LifecycleResult<ExtensionPlan> {
    let rewrite = check_extension(entity, new_end_date, siblings)?;
    Ok(ExtensionPlan {
        entity_id: entity.id,
        expected_version: entity.version,
        previous_end_date: rewrite.previous,
        new_end_date: rewrite.new,
    })
}

pub struct ExtensionPlanner<'a, R: EntityRepository, C: Clock> {
    repo: &'a R,
    clock: &'a C,
}

impl<'a, R: EntityRepository, C: Clock> ExtensionPlanner<'a, R, C> {
    pub fn new(repo: &'a R, clock: &'a C) -> Self {
        Self { repo, clock }
    }

    /// Plans against the stored snapshot, then executes the plan.
    ///
    /// A concurrent change between planning and execution surfaces as
    /// `StaleState`.
    pub fn extend(&self, id: EntityId, new_end_date: NaiveDate) -> LifecycleResult<LifecycleEntity> {
        let entity = self
            .repo
            .get_entity(id)?
            .ok_or(LifecycleError::NotFound(id))?;
        let siblings = self.repo.list_family(entity.family)?;
        let accepted = plan(&entity, new_end_date, &siblings)?;
        TransitionExecutor::new(self.repo, self.clock).execute(&accepted.into_request())
    }
}
