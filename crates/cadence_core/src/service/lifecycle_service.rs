//! Lifecycle use-case service.
//!
//! # Responsibility
//! - Provide the entry points callers use: creation, queries, manual
//!   transitions, sweep preview and sweep application.
//! - Route every status or date change through `TransitionExecutor`.
//!
//! # Invariants
//! - Creation rejects windows overlapping any non-closed same-family sibling.
//! - Sweep application runs each proposal independently; one failure never
//!   aborts or retries the others.

use crate::clock::Clock;
use crate::lifecycle::error::{LifecycleError, LifecycleResult};
use crate::lifecycle::guard::{find_overlap, Authority, RequestedChange};
use crate::lifecycle::sweep::{sweep, SweepProposal};
use crate::model::audit::TransitionAuditRecord;
use crate::model::entity::{EntityId, LifecycleEntity, NewEntity};
use crate::model::family::Family;
use crate::repo::entity_repo::EntityRepository;
use crate::service::executor::{TransitionExecutor, TransitionRequest};
use crate::service::extension::ExtensionPlanner;
use crate::service::pause::PauseResumeController;
use chrono::NaiveDate;
use log::{info, warn};
use serde::Serialize;
use std::time::Instant;

/// Proposal that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedProposal {
    pub proposal: SweepProposal,
    pub error_kind: &'static str,
    pub message: String,
}

/// Result of applying a batch of sweep proposals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepOutcome {
    pub applied: Vec<LifecycleEntity>,
    pub skipped: Vec<SkippedProposal>,
}

/// Result of `load`: what the sweep changed plus the refreshed list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub applied: Vec<LifecycleEntity>,
    pub skipped: Vec<SkippedProposal>,
    pub entities: Vec<LifecycleEntity>,
}

/// Use-case service for batches and governance terms.
pub struct LifecycleService<R: EntityRepository, C: Clock> {
    repo: R,
    clock: C,
}

impl<R: EntityRepository, C: Clock> LifecycleService<R, C> {
    pub fn new(repo: R, clock: C) -> Self {
        Self { repo, clock }
    }

    /// Creates a draft batch or upcoming term.
    ///
    /// # Errors
    /// - `Validation` for a blank name or `start_date >= end_date`.
    /// - `DateOverlap` when the window overlaps a non-closed sibling.
    pub fn create(&self, request: &NewEntity) -> LifecycleResult<LifecycleEntity> {
        let started_at = Instant::now();
        let result = request.validate().map_err(LifecycleError::from).and_then(|()| {
            self.repo.write_scope(|repo| {
                let siblings = repo.list_family(request.family)?;
                let open = siblings.iter().filter(|sibling| !sibling.status.is_finished());
                if let Some(conflict) = find_overlap(request.window(), open) {
                    return Err(LifecycleError::DateOverlap {
                        entity_id: None,
                        field: "start_date",
                        conflicting_id: conflict.id,
                    });
                }
                let entity = LifecycleEntity::pending(request, self.clock.now_ms());
                repo.insert_entity(&entity)?;
                Ok(entity)
            })
        });

        match &result {
            Ok(entity) => info!(
                "event=entity_create module=service status=ok entity_id={} family={} duration_ms={}",
                entity.id,
                entity.family,
                started_at.elapsed().as_millis()
            ),
            Err(err) => warn!(
                "event=entity_create module=service status=rejected family={} error_kind={} duration_ms={}",
                request.family,
                err.kind().as_str(),
                started_at.elapsed().as_millis()
            ),
        }
        result
    }

    pub fn get(&self, id: EntityId) -> LifecycleResult<LifecycleEntity> {
        self.repo.get_entity(id)?.ok_or(LifecycleError::NotFound(id))
    }

    /// All entities of `family`, or of every family, ordered by start date.
    pub fn list(&self, family: Option<Family>) -> LifecycleResult<Vec<LifecycleEntity>> {
        let entities = match family {
            Some(family) => self.repo.list_family(family)?,
            None => self.repo.list_all()?,
        };
        Ok(entities)
    }

    /// Proposals the sweep would apply today, without writing.
    pub fn preview_sweep(&self, family: Option<Family>) -> LifecycleResult<Vec<SweepProposal>> {
        let entities = self.list(family)?;
        Ok(sweep(&entities, self.clock.today()))
    }

    /// Executes proposals in order, each pinned to its snapshot version.
    pub fn apply_proposals(&self, proposals: &[SweepProposal]) -> SweepOutcome {
        let executor = self.executor();
        let mut outcome = SweepOutcome::default();
        for proposal in proposals {
            match executor.execute(&proposal_request(proposal)) {
                Ok(entity) => outcome.applied.push(entity),
                Err(err) => {
                    warn!(
                        "event=sweep_apply module=service status=skipped entity_id={} reason={} error_kind={}",
                        proposal.entity_id,
                        proposal.reason,
                        err.kind().as_str()
                    );
                    outcome.skipped.push(SkippedProposal {
                        proposal: proposal.clone(),
                        error_kind: err.kind().as_str(),
                        message: err.to_string(),
                    });
                }
            }
        }
        outcome
    }

    /// Sweeps, applies the proposals, and returns the refreshed list.
    pub fn load(&self, family: Option<Family>) -> LifecycleResult<SweepReport> {
        let started_at = Instant::now();
        let proposals = self.preview_sweep(family)?;
        let outcome = self.apply_proposals(&proposals);
        let entities = self.list(family)?;
        info!(
            "event=sweep_apply module=service status=ok family={} proposed={} applied={} skipped={} duration_ms={}",
            family.map_or("all", Family::as_str),
            proposals.len(),
            outcome.applied.len(),
            outcome.skipped.len(),
            started_at.elapsed().as_millis()
        );
        Ok(SweepReport {
            applied: outcome.applied,
            skipped: outcome.skipped,
            entities,
        })
    }

    pub fn activate(&self, id: EntityId) -> LifecycleResult<LifecycleEntity> {
        self.apply(&TransitionRequest::manual(id, RequestedChange::Activate))
    }

    /// Activates before `start_date` by rewriting it to today.
    pub fn force_activate(&self, id: EntityId, reason: &str) -> LifecycleResult<LifecycleEntity> {
        self.apply(&TransitionRequest::forced(
            id,
            RequestedChange::Activate,
            reason,
        ))
    }

    /// Closes an active entity; before its end date this rewrites
    /// `end_date` to today.
    pub fn close(&self, id: EntityId) -> LifecycleResult<LifecycleEntity> {
        self.apply(&TransitionRequest::manual(id, RequestedChange::Close))
    }

    /// Closes, including a never-activated entity whose window has passed.
    pub fn force_close(&self, id: EntityId, reason: &str) -> LifecycleResult<LifecycleEntity> {
        self.apply(&TransitionRequest::forced(id, RequestedChange::Close, reason))
    }

    /// Returns a closed or completed entity to active.
    ///
    /// Only possible once an extension has put today back inside its window.
    pub fn reopen(&self, id: EntityId) -> LifecycleResult<LifecycleEntity> {
        let entity = self.get(id)?;
        if !entity.status.is_finished() {
            return Err(LifecycleError::InvalidTransition {
                entity_id: id,
                from: entity.status,
                change: "reopen",
            });
        }
        self.apply(
            &TransitionRequest::manual(id, RequestedChange::Activate)
                .with_expected_version(entity.version),
        )
    }

    pub fn extend(&self, id: EntityId, new_end_date: NaiveDate) -> LifecycleResult<LifecycleEntity> {
        ExtensionPlanner::new(&self.repo, &self.clock).extend(id, new_end_date)
    }

    pub fn pause(&self, id: EntityId, reason: &str) -> LifecycleResult<LifecycleEntity> {
        PauseResumeController::new(&self.repo, &self.clock).pause(id, reason)
    }

    pub fn resume(&self, id: EntityId) -> LifecycleResult<LifecycleEntity> {
        PauseResumeController::new(&self.repo, &self.clock).resume(id)
    }

    /// Executes an arbitrary request.
    pub fn apply(&self, request: &TransitionRequest) -> LifecycleResult<LifecycleEntity> {
        self.executor().execute(request)
    }

    /// Transition audit trail, oldest first.
    pub fn history(&self, id: EntityId) -> LifecycleResult<Vec<TransitionAuditRecord>> {
        self.get(id)?;
        Ok(self.repo.list_audit(id)?)
    }

    fn executor(&self) -> TransitionExecutor<'_, R, C> {
        TransitionExecutor::new(&self.repo, &self.clock)
    }
}

fn proposal_request(proposal: &SweepProposal) -> TransitionRequest {
    TransitionRequest {
        entity_id: proposal.entity_id,
        change: proposal.change,
        authority: Authority::Sweep,
        reason: Some(proposal.reason.as_str().to_string()),
        expected_version: Some(proposal.expected_version),
    }
}
