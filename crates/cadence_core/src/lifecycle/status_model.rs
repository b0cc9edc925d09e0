//! Allowed status transitions per family.
//!
//! # Invariants
//! - A status edge absent from the family table is never applied.
//! - Pause/resume are lateral edges on a data batch's `active` status; they
//!   are not statuses of their own.
//! - Extension changes dates only and is not a table edge.

use crate::model::family::{BatchStatus, EntityStatus, Family, TermStatus};

/// Lateral toggle on top of an active status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LateralEdge {
    Pause,
    Resume,
}

const BATCH_TRANSITIONS: &[(EntityStatus, EntityStatus)] = &[
    (
        EntityStatus::Batch(BatchStatus::Draft),
        EntityStatus::Batch(BatchStatus::Active),
    ),
    (
        EntityStatus::Batch(BatchStatus::Active),
        EntityStatus::Batch(BatchStatus::Closed),
    ),
    (
        EntityStatus::Batch(BatchStatus::Draft),
        EntityStatus::Batch(BatchStatus::Closed),
    ),
    (
        EntityStatus::Batch(BatchStatus::Closed),
        EntityStatus::Batch(BatchStatus::Active),
    ),
];

const TERM_TRANSITIONS: &[(EntityStatus, EntityStatus)] = &[
    (
        EntityStatus::Term(TermStatus::Upcoming),
        EntityStatus::Term(TermStatus::Active),
    ),
    (
        EntityStatus::Term(TermStatus::Active),
        EntityStatus::Term(TermStatus::Completed),
    ),
    (
        EntityStatus::Term(TermStatus::Upcoming),
        EntityStatus::Term(TermStatus::Completed),
    ),
    (
        EntityStatus::Term(TermStatus::Completed),
        EntityStatus::Term(TermStatus::Active),
    ),
];

const BATCH_LATERAL: &[LateralEdge] = &[LateralEdge::Pause, LateralEdge::Resume];

/// Static transition table lookup.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusModel;

impl StatusModel {
    /// Ordered `(from, to)` table for one family: activation, natural close,
    /// direct close of a never-activated entity, reopen.
    pub fn transitions(family: Family) -> &'static [(EntityStatus, EntityStatus)] {
        match family {
            Family::DataBatch => BATCH_TRANSITIONS,
            Family::GovernanceTerm => TERM_TRANSITIONS,
        }
    }

    pub fn is_allowed(from: EntityStatus, to: EntityStatus) -> bool {
        from.family() == to.family()
            && Self::transitions(from.family())
                .iter()
                .any(|&(edge_from, edge_to)| edge_from == from && edge_to == to)
    }

    /// Lateral edges declared for a family's active status.
    pub fn lateral_edges(family: Family) -> &'static [LateralEdge] {
        match family {
            Family::DataBatch => BATCH_LATERAL,
            Family::GovernanceTerm => &[],
        }
    }

    /// Lateral edges only hang off `active`.
    pub fn allows_lateral(status: EntityStatus, edge: LateralEdge) -> bool {
        status.is_active() && Self::lateral_edges(status.family()).contains(&edge)
    }
}

#[cfg(test)]
mod tests {
    use super::{LateralEdge, StatusModel};
    use crate::model::family::{BatchStatus, EntityStatus, Family, Phase, TermStatus};

    #[test]
    fn both_families_share_the_same_shape() {
        for family in Family::ALL {
            let status = |phase| EntityStatus::from_phase(family, phase);
            assert!(StatusModel::is_allowed(status(Phase::Pending), status(Phase::Active)));
            assert!(StatusModel::is_allowed(status(Phase::Active), status(Phase::Finished)));
            assert!(StatusModel::is_allowed(status(Phase::Pending), status(Phase::Finished)));
            assert!(StatusModel::is_allowed(status(Phase::Finished), status(Phase::Active)));

            assert!(!StatusModel::is_allowed(status(Phase::Active), status(Phase::Pending)));
            assert!(!StatusModel::is_allowed(status(Phase::Finished), status(Phase::Pending)));
            assert!(!StatusModel::is_allowed(status(Phase::Active), status(Phase::Active)));
        }
    }

    #[test]
    fn cross_family_edges_are_rejected() {
        assert!(!StatusModel::is_allowed(
            EntityStatus::Batch(BatchStatus::Draft),
            EntityStatus::Term(TermStatus::Active)
        ));
    }

    #[test]
    fn pause_is_lateral_on_active_batches_only() {
        let active_batch = EntityStatus::Batch(BatchStatus::Active);
        assert!(StatusModel::allows_lateral(active_batch, LateralEdge::Pause));
        assert!(StatusModel::allows_lateral(active_batch, LateralEdge::Resume));
        assert!(!StatusModel::allows_lateral(
            EntityStatus::Batch(BatchStatus::Closed),
            LateralEdge::Pause
        ));
        assert!(!StatusModel::allows_lateral(
            EntityStatus::Term(TermStatus::Active),
            LateralEdge::Pause
        ));
    }
}
