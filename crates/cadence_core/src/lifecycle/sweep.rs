//! Date-driven automatic transition proposals.
//!
//! # Responsibility
//! - Scan a snapshot and propose the transitions implied by "today" alone.
//!
//! # Invariants
//! - Pure: the input snapshot is never mutated and storage is never read.
//! - Idempotent: sweeping a snapshot that already reflects the previous
//!   proposals yields no proposals.
//! - At most one activation is proposed per family per pass.
//! - Closes are listed before activations so they can be applied in order.

use crate::lifecycle::guard::{evaluate, Authority, GuardContext, GuardVerdict, RequestedChange};
use crate::model::entity::{EntityId, LifecycleEntity};
use crate::model::family::{EntityStatus, Family, Phase};
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Why the sweep proposes a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepReason {
    /// Pending entity whose window contains today.
    WindowOpened,
    /// Active entity whose window has passed.
    WindowElapsed,
    /// Pending entity whose whole window passed without activation.
    ElapsedBeforeActivation,
}

impl SweepReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WindowOpened => "window_opened",
            Self::WindowElapsed => "window_elapsed",
            Self::ElapsedBeforeActivation => "elapsed_before_activation",
        }
    }
}

impl Display for SweepReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One automatic transition to be applied by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepProposal {
    pub entity_id: EntityId,
    pub family: Family,
    /// Version observed in the swept snapshot; the executor rejects the
    /// proposal as stale if storage moved on.
    pub expected_version: i64,
    pub from: EntityStatus,
    pub to: EntityStatus,
    #[serde(skip)]
    pub change: RequestedChange,
    pub reason: SweepReason,
}

/// Proposes automatic transitions for every family present in `entities`.
pub fn sweep(entities: &[LifecycleEntity], today: NaiveDate) -> Vec<SweepProposal> {
    let mut proposals = Vec::new();
    for family in Family::ALL {
        let mut projection: Vec<LifecycleEntity> = entities
            .iter()
            .filter(|entity| entity.family == family)
            .cloned()
            .collect();
        if projection.is_empty() {
            continue;
        }
        projection.sort_by(|a, b| a.start_date.cmp(&b.start_date).then(a.id.cmp(&b.id)));
        sweep_family(&mut projection, today, &mut proposals);
    }
    proposals
}

fn sweep_family(
    projection: &mut [LifecycleEntity],
    today: NaiveDate,
    proposals: &mut Vec<SweepProposal>,
) {
    for index in 0..projection.len() {
        let candidate = &projection[index];
        if today <= candidate.end_date {
            continue;
        }
        let reason = match candidate.status.phase() {
            Phase::Active => SweepReason::WindowElapsed,
            Phase::Pending if !candidate.was_activated() => SweepReason::ElapsedBeforeActivation,
            _ => continue,
        };
        if let Some(proposal) = propose(projection, index, RequestedChange::Close, today, reason) {
            projection[index].status = proposal.to;
            proposals.push(proposal);
        }
    }

    for index in 0..projection.len() {
        let candidate = &projection[index];
        if candidate.status.phase() != Phase::Pending || !candidate.window().contains(today) {
            continue;
        }
        if let Some(proposal) = propose(
            projection,
            index,
            RequestedChange::Activate,
            today,
            SweepReason::WindowOpened,
        ) {
            projection[index].status = proposal.to;
            proposals.push(proposal);
        }
    }
}

fn propose(
    projection: &[LifecycleEntity],
    index: usize,
    change: RequestedChange,
    today: NaiveDate,
    reason: SweepReason,
) -> Option<SweepProposal> {
    let entity = &projection[index];
    let ctx = GuardContext {
        today,
        siblings: projection,
        authority: Authority::Sweep,
    };
    match evaluate(entity, &change, &ctx) {
        GuardVerdict::Allow(effects) => {
            let status = effects.status?;
            Some(SweepProposal {
                entity_id: entity.id,
                family: entity.family,
                expected_version: entity.version,
                from: status.from,
                to: status.to,
                change,
                reason,
            })
        }
        GuardVerdict::Deny(_) | GuardVerdict::DenyForceable(_) => None,
    }
}
