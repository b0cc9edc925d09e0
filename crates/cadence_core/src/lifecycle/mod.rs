//! Pure lifecycle rules: status table, guards, and the automatic sweep.
//!
//! # Responsibility
//! - Decide transitions from dates, statuses, and sibling snapshots.
//! - Stay free of storage and clock access so rules are testable in isolation.
//!
//! # Invariants
//! - At most one entity per family may be active.
//! - Non-closed windows of one family never overlap.

pub mod error;
pub mod guard;
pub mod status_model;
pub mod sweep;
