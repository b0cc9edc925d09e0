//! Date-driven lifecycle engine for data batches and governance terms.
//!
//! Pure rules live in [`lifecycle`]; persistence in [`repo`] and [`db`];
//! [`service`] wires them into use cases.

pub mod clock;
pub mod db;
pub mod lifecycle;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use clock::{Clock, FixedClock, SystemClock};
pub use db::{open_db, open_db_in_memory, DbError};
pub use lifecycle::error::{ErrorKind, LifecycleError, LifecycleResult};
pub use lifecycle::guard::{Authority, GuardVerdict, RequestedChange, TransitionEffects};
pub use lifecycle::sweep::{sweep, SweepProposal, SweepReason};
pub use logging::{default_log_level, init_logging, logging_status, LogTarget};
pub use model::audit::{DateField, TransitionAuditRecord};
pub use model::entity::{DateWindow, EntityId, LifecycleEntity, NewEntity};
pub use model::family::{BatchStatus, EntityStatus, Family, Phase, TermStatus};
pub use repo::entity_repo::{EntityRepository, RepoError, RepoResult, SqliteEntityRepository};
pub use service::executor::{TransitionExecutor, TransitionRequest};
pub use service::extension::{plan as plan_extension, ExtensionPlan, ExtensionPlanner};
pub use service::lifecycle_service::{LifecycleService, SkippedProposal, SweepOutcome, SweepReport};
pub use service::pause::PauseResumeController;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
