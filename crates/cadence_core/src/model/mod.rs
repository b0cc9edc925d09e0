//! Domain model for lifecycle-managed entities.
//!
//! # Responsibility
//! - Define the two entity families and their status vocabularies.
//! - Define the shared entity record, its date window, and audit records.
//!
//! # Invariants
//! - Every entity is identified by a stable `EntityId`.
//! - Entities are never deleted; closed/completed is the terminal phase.

pub mod audit;
pub mod entity;
pub mod family;
