//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define data access contracts used by lifecycle services.
//! - Isolate SQLite query details from transition orchestration.
//!
//! # Invariants
//! - Repository writes enforce `LifecycleEntity::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `VersionConflict`,
//!   `ActiveSlotTaken`) in addition to DB transport errors.

pub mod entity_repo;
