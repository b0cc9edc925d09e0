//! Transition executor: the single write path for lifecycle changes.
//!
//! # Responsibility
//! - Validate requests, re-run guards against fresh state, persist the
//!   result and append one audit record, all inside one write scope.
//!
//! # Invariants
//! - Exactly one entity mutation per call; siblings are never touched.
//! - A write happens only if the stored version still matches the version
//!   the guard evaluated against.
//! - Failures are returned to the caller, never retried.

use crate::clock::Clock;
use crate::lifecycle::error::{LifecycleError, LifecycleResult};
use crate::lifecycle::guard::{evaluate, Authority, GuardContext, RequestedChange, TransitionEffects};
use crate::model::audit::TransitionAuditRecord;
use crate::model::entity::{EntityId, LifecycleEntity};
use crate::repo::entity_repo::EntityRepository;
use log::{error, info, warn};
use std::time::Instant;

/// One requested transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    pub entity_id: EntityId,
    pub change: RequestedChange,
    pub authority: Authority,
    /// Required for forced requests and pauses; recorded in the audit trail.
    pub reason: Option<String>,
    /// When set, the request fails with `StaleState` unless storage still
    /// holds this version.
    pub expected_version: Option<i64>,
}

impl TransitionRequest {
    /// Plain manual request.
    pub fn manual(entity_id: EntityId, change: RequestedChange) -> Self {
        Self {
            entity_id,
            change,
            authority: Authority::Manual,
            reason: None,
            expected_version: None,
        }
    }

    /// Manual request that may bypass forceable date guards.
    pub fn forced(entity_id: EntityId, change: RequestedChange, reason: impl Into<String>) -> Self {
        Self {
            authority: Authority::Forced,
            reason: Some(reason.into()),
            ..Self::manual(entity_id, change)
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_expected_version(mut self, version: i64) -> Self {
        self.expected_version = Some(version);
        self
    }

    /// Presence checks that run before any guard.
    pub fn validate(&self) -> LifecycleResult<()> {
        let has_reason = self
            .reason
            .as_deref()
            .is_some_and(|reason| !reason.trim().is_empty());
        if self.authority == Authority::Forced && !has_reason {
            return Err(LifecycleError::validation(
                "reason",
                "forced actions require a non-empty reason",
            ));
        }
        if self.change == RequestedChange::Pause && !has_reason {
            return Err(LifecycleError::validation(
                "reason",
                "pausing requires a non-empty reason",
            ));
        }
        Ok(())
    }
}

/// Applies transition requests against a repository.
pub struct TransitionExecutor<'a, R: EntityRepository, C: Clock> {
    repo: &'a R,
    clock: &'a C,
}

impl<'a, R: EntityRepository, C: Clock> TransitionExecutor<'a, R, C> {
    pub fn new(repo: &'a R, clock: &'a C) -> Self {
        Self { repo, clock }
    }

    /// Executes one request and returns the stored entity.
    ///
    /// # Errors
    /// - `Validation` when the request itself is incomplete.
    /// - `NotFound` for unknown ids.
    /// - `StaleState` when `expected_version` or the swap no longer matches.
    /// - Any guard denial, unchanged.
    pub fn execute(&self, request: &TransitionRequest) -> LifecycleResult<LifecycleEntity> {
        let started_at = Instant::now();
        let result = request
            .validate()
            .and_then(|()| self.repo.write_scope(|repo| self.apply_in_scope(repo, request)));

        match &result {
            Ok((entity, record)) => info!(
                "event=transition_apply module=lifecycle status=ok entity_id={} family={} action={} from={} to={} version={} duration_ms={}",
                entity.id,
                entity.family,
                record.action,
                record.from_status,
                record.to_status,
                entity.version,
                started_at.elapsed().as_millis()
            ),
            Err(err @ LifecycleError::Storage(_)) => error!(
                "event=transition_apply module=lifecycle status=error entity_id={} change={} error_kind={} duration_ms={} error={}",
                request.entity_id,
                request.change.name(),
                err.kind().as_str(),
                started_at.elapsed().as_millis(),
                err
            ),
            Err(err) => warn!(
                "event=transition_apply module=lifecycle status=rejected entity_id={} change={} error_kind={} duration_ms={}",
                request.entity_id,
                request.change.name(),
                err.kind().as_str(),
                started_at.elapsed().as_millis()
            ),
        }

        result.map(|(entity, _)| entity)
    }

    fn apply_in_scope(
        &self,
        repo: &R,
        request: &TransitionRequest,
    ) -> LifecycleResult<(LifecycleEntity, TransitionAuditRecord)> {
        let current = repo
            .get_entity(request.entity_id)?
            .ok_or(LifecycleError::NotFound(request.entity_id))?;

        if let Some(expected) = request.expected_version {
            if expected != current.version {
                return Err(LifecycleError::StaleState {
                    entity_id: current.id,
                    expected_version: expected,
                    actual_version: Some(current.version),
                });
            }
        }

        let siblings = repo.list_family(current.family)?;
        let ctx = GuardContext {
            today: self.clock.today(),
            siblings: &siblings,
            authority: request.authority,
        };
        let effects = evaluate(&current, &request.change, &ctx).into_result()?;

        let now_ms = self.clock.now_ms();
        let updated = effects.apply(&current, now_ms, request.reason.as_deref());
        let stored = repo.compare_and_swap(&updated, current.version)?;

        let record = audit_record(&current, &stored, &effects, request, now_ms);
        repo.append_audit(&record)?;
        Ok((stored, record))
    }
}

/// Audit action name for a request applied to an entity in `before` state.
pub fn action_name(request: &TransitionRequest, before: &LifecycleEntity) -> &'static str {
    match (request.change, request.authority) {
        (RequestedChange::Activate, Authority::Sweep) => "sweep_activate",
        (RequestedChange::Activate, _) if before.status.is_finished() => "reopen",
        (RequestedChange::Activate, Authority::Forced) => "force_activate",
        (RequestedChange::Activate, Authority::Manual) => "activate",
        (RequestedChange::Close, Authority::Sweep) => "sweep_close",
        (RequestedChange::Close, Authority::Forced) => "force_close",
        (RequestedChange::Close, Authority::Manual) => "close",
        (RequestedChange::Extend { .. }, _) => "extend",
        (RequestedChange::Pause, _) => "pause",
        (RequestedChange::Resume, _) => "resume",
    }
}

fn audit_record(
    before: &LifecycleEntity,
    after: &LifecycleEntity,
    effects: &TransitionEffects,
    request: &TransitionRequest,
    now_ms: i64,
) -> TransitionAuditRecord {
    let rewrite = effects.date_rewrite;
    TransitionAuditRecord {
        entity_id: after.id,
        family: after.family,
        action: action_name(request, before).to_string(),
        from_status: before.status,
        to_status: after.status,
        reason: request
            .reason
            .as_deref()
            .map(str::trim)
            .filter(|reason| !reason.is_empty())
            .map(str::to_string),
        rewritten_field: rewrite.map(|rewrite| rewrite.field),
        previous_date: rewrite.map(|rewrite| rewrite.previous),
        new_date: rewrite.map(|rewrite| rewrite.new),
        recorded_at: now_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::{action_name, TransitionRequest};
    use crate::lifecycle::error::ErrorKind;
    use crate::lifecycle::guard::{Authority, RequestedChange};
    use crate::model::entity::{LifecycleEntity, NewEntity};
    use crate::model::family::{EntityStatus, Family, Phase};
    use chrono::NaiveDate;
    use uuid::Uuid;

    fn batch(phase: Phase) -> LifecycleEntity {
        let start = NaiveDate::from_ymd_opt(2025, 1, 10).expect("valid date");
        let end = NaiveDate::from_ymd_opt(2025, 1, 20).expect("valid date");
        let mut entity =
            LifecycleEntity::pending(&NewEntity::new(Family::DataBatch, "b", start, end), 0);
        entity.status = EntityStatus::from_phase(Family::DataBatch, phase);
        entity
    }

    #[test]
    fn forced_request_without_reason_is_rejected() {
        let mut request = TransitionRequest::forced(Uuid::new_v4(), RequestedChange::Close, "  ");
        let err = request.validate().expect_err("blank reason rejected");
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.field(), Some("reason"));

        request.reason = Some("sponsor request".to_string());
        request.validate().expect("reason present");
    }

    #[test]
    fn pause_requires_reason_even_when_manual() {
        let request = TransitionRequest::manual(Uuid::new_v4(), RequestedChange::Pause);
        assert_eq!(
            request.validate().map_err(|err| err.kind()),
            Err(ErrorKind::Validation)
        );
        request
            .with_reason("vendor outage")
            .validate()
            .expect("reason present");
    }

    #[test]
    fn sweep_requests_need_no_reason() {
        let mut request = TransitionRequest::manual(Uuid::new_v4(), RequestedChange::Activate);
        request.authority = Authority::Sweep;
        request.validate().expect("sweep request valid");
    }

    #[test]
    fn action_names_distinguish_authority_and_reopen() {
        let id = Uuid::new_v4();
        let pending = batch(Phase::Pending);
        let finished = batch(Phase::Finished);

        let activate = TransitionRequest::manual(id, RequestedChange::Activate);
        assert_eq!(action_name(&activate, &pending), "activate");
        assert_eq!(action_name(&activate, &finished), "reopen");

        let forced = TransitionRequest::forced(id, RequestedChange::Activate, "early start");
        assert_eq!(action_name(&forced, &pending), "force_activate");

        let mut swept = TransitionRequest::manual(id, RequestedChange::Close);
        swept.authority = Authority::Sweep;
        assert_eq!(action_name(&swept, &pending), "sweep_close");
    }
}
