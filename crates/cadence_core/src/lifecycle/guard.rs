//! Pure transition guards.
//!
//! # Responsibility
//! - Decide whether one requested change is legal for one entity, given
//!   "today", the family sibling snapshot, and who is asking.
//! - Describe the resulting mutation as explicit, separately assertable
//!   effects (status change, date rewrite, pause toggle).
//!
//! # Invariants
//! - Guards never read storage; the sibling snapshot is an argument.
//! - The snapshot may contain the entity itself and other families; both are
//!   ignored when looking for conflicts.
//! - A status change is only produced for edges present in `StatusModel`.

use crate::lifecycle::error::LifecycleError;
use crate::lifecycle::status_model::{LateralEdge, StatusModel};
use crate::model::audit::DateField;
use crate::model::entity::{DateWindow, LifecycleEntity};
use crate::model::family::{EntityStatus, Phase};
use chrono::NaiveDate;

/// Who is requesting a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Authority {
    /// Plain user action; date guards apply.
    Manual,
    /// User action carrying a reason; may bypass forceable date guards.
    Forced,
    /// Automatic sweep policy; never rewrites dates.
    Sweep,
}

/// Change requested for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestedChange {
    /// Pending -> active, or finished -> active after an extension (reopen).
    Activate,
    /// Active -> finished, or pending -> finished for a never-activated entity.
    Close,
    Extend { new_end_date: NaiveDate },
    Pause,
    Resume,
}

impl RequestedChange {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Activate => "activate",
            Self::Close => "close",
            Self::Extend { .. } => "extend",
            Self::Pause => "pause",
            Self::Resume => "resume",
        }
    }
}

/// Inputs a guard may consult besides the entity itself.
#[derive(Debug, Clone, Copy)]
pub struct GuardContext<'a> {
    /// Date-truncated evaluation day.
    pub today: NaiveDate,
    pub siblings: &'a [LifecycleEntity],
    pub authority: Authority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub from: EntityStatus,
    pub to: EntityStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRewrite {
    pub field: DateField,
    pub previous: NaiveDate,
    pub new: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseChange {
    Pause,
    Resume,
}

/// Mutation produced by an allowed transition.
///
/// Applied in order: status, then date rewrite, then pause toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransitionEffects {
    pub status: Option<StatusChange>,
    pub date_rewrite: Option<DateRewrite>,
    pub pause: Option<PauseChange>,
}

impl TransitionEffects {
    /// Returns the entity as it looks after these effects.
    ///
    /// `pause_reason` is stored only when pausing.
    pub fn apply(
        &self,
        entity: &LifecycleEntity,
        now_ms: i64,
        pause_reason: Option<&str>,
    ) -> LifecycleEntity {
        let mut next = entity.clone();
        self.apply_status(&mut next, now_ms);
        self.apply_date_rewrite(&mut next);
        self.apply_pause(&mut next, now_ms, pause_reason);
        next.updated_at = now_ms;
        next
    }

    fn apply_status(&self, entity: &mut LifecycleEntity, now_ms: i64) {
        let Some(change) = self.status else {
            return;
        };
        entity.status = change.to;
        match change.to.phase() {
            Phase::Active => {
                if entity.activated_at.is_none() {
                    entity.activated_at = Some(now_ms);
                }
            }
            Phase::Finished => {
                entity.paused_at = None;
                entity.pause_reason = None;
            }
            Phase::Pending => {}
        }
    }

    fn apply_date_rewrite(&self, entity: &mut LifecycleEntity) {
        let Some(rewrite) = self.date_rewrite else {
            return;
        };
        match rewrite.field {
            DateField::StartDate => entity.start_date = rewrite.new,
            DateField::EndDate => entity.end_date = rewrite.new,
        }
    }

    fn apply_pause(&self, entity: &mut LifecycleEntity, now_ms: i64, pause_reason: Option<&str>) {
        match self.pause {
            Some(PauseChange::Pause) => {
                entity.paused_at = Some(now_ms);
                entity.pause_reason = pause_reason.map(|reason| reason.trim().to_string());
            }
            Some(PauseChange::Resume) => {
                entity.paused_at = None;
                entity.pause_reason = None;
            }
            None => {}
        }
    }
}

/// Guard outcome.
#[derive(Debug)]
pub enum GuardVerdict {
    Allow(TransitionEffects),
    Deny(LifecycleError),
    /// Denied, but the same request with `Authority::Forced` may pass.
    DenyForceable(LifecycleError),
}

impl GuardVerdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow(_))
    }

    pub fn into_result(self) -> Result<TransitionEffects, LifecycleError> {
        match self {
            Self::Allow(effects) => Ok(effects),
            Self::Deny(err) | Self::DenyForceable(err) => Err(err),
        }
    }
}

/// Evaluates one requested change.
pub fn evaluate(
    entity: &LifecycleEntity,
    change: &RequestedChange,
    ctx: &GuardContext<'_>,
) -> GuardVerdict {
    match change {
        RequestedChange::Activate => guard_activate(entity, ctx),
        RequestedChange::Close => guard_close(entity, ctx),
        RequestedChange::Extend { new_end_date } => guard_extend(entity, *new_end_date, ctx),
        RequestedChange::Pause => guard_lateral(entity, LateralEdge::Pause, change),
        RequestedChange::Resume => guard_lateral(entity, LateralEdge::Resume, change),
    }
}

/// Same-family siblings of `entity`, excluding itself.
pub fn siblings_of<'a>(
    entity: &'a LifecycleEntity,
    siblings: &'a [LifecycleEntity],
) -> impl Iterator<Item = &'a LifecycleEntity> + 'a {
    siblings
        .iter()
        .filter(move |sibling| sibling.family == entity.family && sibling.id != entity.id)
}

/// Sibling currently holding the family's active slot.
pub fn active_holder<'a>(
    entity: &'a LifecycleEntity,
    siblings: &'a [LifecycleEntity],
) -> Option<&'a LifecycleEntity> {
    siblings_of(entity, siblings).find(|sibling| sibling.status.is_active())
}

/// First candidate whose window overlaps `window`.
///
/// Shared by creation, forced activation and reopen.
pub fn find_overlap<'a>(
    window: DateWindow,
    candidates: impl IntoIterator<Item = &'a LifecycleEntity>,
) -> Option<&'a LifecycleEntity> {
    candidates
        .into_iter()
        .find(|candidate| candidate.window().overlaps(&window))
}

/// Chronologically next sibling starting on or after `entity.end_date`,
/// when it starts before `new_end_date`.
///
/// Compares start dates directly: a one-day sibling `[s, s]` still blocks an
/// extension past `s`.
pub fn next_sibling_conflict<'a>(
    entity: &'a LifecycleEntity,
    new_end_date: NaiveDate,
    siblings: &'a [LifecycleEntity],
) -> Option<&'a LifecycleEntity> {
    siblings_of(entity, siblings)
        .filter(|sibling| sibling.start_date >= entity.end_date)
        .min_by_key(|sibling| (sibling.start_date, sibling.id))
        .filter(|next| next.start_date < new_end_date)
}

fn non_closed_siblings<'a>(
    entity: &'a LifecycleEntity,
    siblings: &'a [LifecycleEntity],
) -> impl Iterator<Item = &'a LifecycleEntity> + 'a {
    siblings_of(entity, siblings).filter(|sibling| !sibling.status.is_finished())
}

fn guard_activate(entity: &LifecycleEntity, ctx: &GuardContext<'_>) -> GuardVerdict {
    if entity.status.is_active() {
        return GuardVerdict::Deny(LifecycleError::ActiveConflict {
            entity_id: entity.id,
            family: entity.family,
            active_id: Some(entity.id),
        });
    }

    let to = EntityStatus::from_phase(entity.family, Phase::Active);
    if !StatusModel::is_allowed(entity.status, to) {
        return invalid_transition(entity, &RequestedChange::Activate);
    }

    let reopening = entity.status.is_finished();
    if ctx.today > entity.end_date {
        let message = if reopening {
            format!(
                "{} ended on {}; extend it before reopening",
                entity.id, entity.end_date
            )
        } else {
            format!("{} window already ended on {}", entity.id, entity.end_date)
        };
        return GuardVerdict::Deny(LifecycleError::GuardDenied {
            entity_id: entity.id,
            field: "end_date",
            message,
            forceable: false,
        });
    }

    if let Some(holder) = active_holder(entity, ctx.siblings) {
        return GuardVerdict::Deny(LifecycleError::ActiveConflict {
            entity_id: entity.id,
            family: entity.family,
            active_id: Some(holder.id),
        });
    }

    let mut date_rewrite = None;
    if ctx.today < entity.start_date {
        let denial = LifecycleError::GuardDenied {
            entity_id: entity.id,
            field: "start_date",
            message: format!("{} does not start until {}", entity.id, entity.start_date),
            forceable: !reopening,
        };
        if reopening {
            return GuardVerdict::Deny(denial);
        }
        if ctx.authority != Authority::Forced {
            return GuardVerdict::DenyForceable(denial);
        }
        date_rewrite = Some(DateRewrite {
            field: DateField::StartDate,
            previous: entity.start_date,
            new: ctx.today,
        });
    }

    if date_rewrite.is_some() || reopening {
        let window = DateWindow::new(
            date_rewrite.map_or(entity.start_date, |rewrite| rewrite.new),
            entity.end_date,
        );
        if let Some(conflict) = find_overlap(window, non_closed_siblings(entity, ctx.siblings)) {
            return GuardVerdict::Deny(LifecycleError::DateOverlap {
                entity_id: Some(entity.id),
                field: if reopening { "end_date" } else { "start_date" },
                conflicting_id: conflict.id,
            });
        }
    }

    GuardVerdict::Allow(TransitionEffects {
        status: Some(StatusChange {
            from: entity.status,
            to,
        }),
        date_rewrite,
        pause: None,
    })
}

fn guard_close(entity: &LifecycleEntity, ctx: &GuardContext<'_>) -> GuardVerdict {
    let to = EntityStatus::from_phase(entity.family, Phase::Finished);
    if !StatusModel::is_allowed(entity.status, to) {
        return invalid_transition(entity, &RequestedChange::Close);
    }
    let status = Some(StatusChange {
        from: entity.status,
        to,
    });

    match entity.status.phase() {
        Phase::Active => {
            if ctx.today > entity.end_date {
                return GuardVerdict::Allow(TransitionEffects {
                    status,
                    ..TransitionEffects::default()
                });
            }
            if ctx.authority == Authority::Sweep {
                return GuardVerdict::Deny(LifecycleError::GuardDenied {
                    entity_id: entity.id,
                    field: "end_date",
                    message: format!("{} window runs until {}", entity.id, entity.end_date),
                    forceable: false,
                });
            }
            if ctx.today < entity.start_date {
                return GuardVerdict::Deny(LifecycleError::GuardDenied {
                    entity_id: entity.id,
                    field: "end_date",
                    message: format!(
                        "{} cannot close before its start date {}",
                        entity.id, entity.start_date
                    ),
                    forceable: false,
                });
            }
            // Closing on the last day keeps the window as is.
            let date_rewrite = (ctx.today < entity.end_date).then_some(DateRewrite {
                field: DateField::EndDate,
                previous: entity.end_date,
                new: ctx.today,
            });
            GuardVerdict::Allow(TransitionEffects {
                status,
                date_rewrite,
                pause: None,
            })
        }
        Phase::Pending => {
            if entity.was_activated() {
                return invalid_transition(entity, &RequestedChange::Close);
            }
            if ctx.today <= entity.end_date {
                return GuardVerdict::Deny(LifecycleError::GuardDenied {
                    entity_id: entity.id,
                    field: "end_date",
                    message: format!(
                        "{} was never activated and its window runs until {}",
                        entity.id, entity.end_date
                    ),
                    forceable: false,
                });
            }
            if ctx.authority == Authority::Manual {
                return GuardVerdict::DenyForceable(LifecycleError::GuardDenied {
                    entity_id: entity.id,
                    field: "status",
                    message: format!(
                        "{} was never activated; closing it directly requires force",
                        entity.id
                    ),
                    forceable: true,
                });
            }
            GuardVerdict::Allow(TransitionEffects {
                status,
                ..TransitionEffects::default()
            })
        }
        Phase::Finished => invalid_transition(entity, &RequestedChange::Close),
    }
}

/// Extension rule: forward only, and never into the next sibling's window.
///
/// Independent of "today" and of status.
pub fn check_extension(
    entity: &LifecycleEntity,
    new_end_date: NaiveDate,
    siblings: &[LifecycleEntity],
) -> Result<DateRewrite, LifecycleError> {
    if new_end_date <= entity.end_date {
        return Err(LifecycleError::validation(
            "end_date",
            format!(
                "new end date {new_end_date} must be after current end date {}",
                entity.end_date
            ),
        ));
    }
    if let Some(next) = next_sibling_conflict(entity, new_end_date, siblings) {
        return Err(LifecycleError::DateOverlap {
            entity_id: Some(entity.id),
            field: "end_date",
            conflicting_id: next.id,
        });
    }
    Ok(DateRewrite {
        field: DateField::EndDate,
        previous: entity.end_date,
        new: new_end_date,
    })
}

fn guard_extend(
    entity: &LifecycleEntity,
    new_end_date: NaiveDate,
    ctx: &GuardContext<'_>,
) -> GuardVerdict {
    match check_extension(entity, new_end_date, ctx.siblings) {
        Ok(rewrite) => GuardVerdict::Allow(TransitionEffects {
            date_rewrite: Some(rewrite),
            ..TransitionEffects::default()
        }),
        Err(err) => GuardVerdict::Deny(err),
    }
}

fn guard_lateral(
    entity: &LifecycleEntity,
    edge: LateralEdge,
    change: &RequestedChange,
) -> GuardVerdict {
    if !StatusModel::allows_lateral(entity.status, edge) {
        return invalid_transition(entity, change);
    }
    let (ready, pause) = match edge {
        LateralEdge::Pause => (!entity.is_paused(), PauseChange::Pause),
        LateralEdge::Resume => (entity.is_paused(), PauseChange::Resume),
    };
    if !ready {
        return invalid_transition(entity, change);
    }
    GuardVerdict::Allow(TransitionEffects {
        pause: Some(pause),
        ..TransitionEffects::default()
    })
}

fn invalid_transition(entity: &LifecycleEntity, change: &RequestedChange) -> GuardVerdict {
    GuardVerdict::Deny(LifecycleError::InvalidTransition {
        entity_id: entity.id,
        from: entity.status,
        change: change.name(),
    })
}
