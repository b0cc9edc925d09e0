//! Pause and resume for active data batches.
//!
//! Pausing records `paused_at` and a reason; resuming clears both. Neither
//! touches dates or status.

use crate::clock::Clock;
use crate::lifecycle::error::LifecycleResult;
use crate::lifecycle::guard::RequestedChange;
use crate::model::entity::{EntityId, LifecycleEntity};
use crate::repo::entity_repo::EntityRepository;
use crate::service::executor::{TransitionExecutor, TransitionRequest};

pub struct PauseResumeController<'a, R: EntityRepository, C: Clock> {
    executor: TransitionExecutor<'a, R, C>,
}

impl<'a, R: EntityRepository, C: Clock> PauseResumeController<'a, R, C> {
    pub fn new(repo: &'a R, clock: &'a C) -> Self {
        Self {
            executor: TransitionExecutor::new(repo, clock),
        }
    }

    /// Pauses an active, unpaused batch. `reason` must not be blank.
    pub fn pause(&self, id: EntityId, reason: &str) -> LifecycleResult<LifecycleEntity> {
        self.executor
            .execute(&TransitionRequest::manual(id, RequestedChange::Pause).with_reason(reason))
    }

    /// Resumes a paused batch.
    pub fn resume(&self, id: EntityId) -> LifecycleResult<LifecycleEntity> {
        self.executor
            .execute(&TransitionRequest::manual(id, RequestedChange::Resume))
    }
}
