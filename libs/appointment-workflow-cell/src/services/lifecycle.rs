// libs/appointment-workflow-cell/src/services/lifecycle.rs
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use shared_models::{Actor, RESET_APPOINTMENT_STATUS};

use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{Appointment, AppointmentStatus};
use crate::services::access::ensure_self_or_all_access;
use crate::services::audit::AuditTrailWriter;
use crate::services::validation::ValidationPipeline;
use crate::store::AppointmentStore;

/// A legality predicate over `from -> to` for a given actor. `Err` carries the reason.
pub trait TransitionRule: Send + Sync {
    fn check(&self, from: AppointmentStatus, to: AppointmentStatus, actor: &Actor) -> Result<(), String>;
}

/// Moving back to `Scheduled` is only free from `Requested`; otherwise it needs the reset privilege.
pub struct ResetStatusRule;

impl TransitionRule for ResetStatusRule {
    fn check(&self, from: AppointmentStatus, to: AppointmentStatus, actor: &Actor) -> Result<(), String> {
        if to != AppointmentStatus::Scheduled
            || from == AppointmentStatus::Requested
            || actor.has_privilege(RESET_APPOINTMENT_STATUS)
        {
            return Ok(());
        }
        Err(format!("{} privilege required", RESET_APPOINTMENT_STATUS))
    }
}

/// Explicit from -> to table. Statuses without an entry have no outgoing transitions.
#[derive(Debug, Clone, Default)]
pub struct TransitionTable {
    transitions: HashMap<AppointmentStatus, HashSet<AppointmentStatus>>,
}

impl TransitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(mut self, from: AppointmentStatus, targets: &[AppointmentStatus]) -> Self {
        self.transitions
            .entry(from)
            .or_default()
            .extend(targets.iter().copied());
        self
    }

    /// The usual clinic flow: request, schedule, arrive, finish.
    pub fn standard() -> Self {
        use AppointmentStatus::*;

        Self::new()
            .allow(Requested, &[Scheduled, Cancelled])
            .allow(Scheduled, &[CheckedIn, Missed, Cancelled])
            .allow(CheckedIn, &[Completed, CheckedOut, Cancelled, Scheduled])
            .allow(Completed, &[CheckedOut])
            .allow(Missed, &[Scheduled])
            .allow(Cancelled, &[Scheduled])
    }

    pub fn targets(&self, from: AppointmentStatus) -> Vec<AppointmentStatus> {
        AppointmentStatus::ALL
            .into_iter()
            .filter(|to| self.is_allowed(from, *to))
            .collect()
    }

    fn is_allowed(&self, from: AppointmentStatus, to: AppointmentStatus) -> bool {
        self.transitions
            .get(&from)
            .is_some_and(|targets| targets.contains(&to))
    }
}

impl TransitionRule for TransitionTable {
    fn check(&self, from: AppointmentStatus, to: AppointmentStatus, _actor: &Actor) -> Result<(), String> {
        if self.is_allowed(from, to) {
            Ok(())
        } else {
            Err(format!("{} is not reachable from {}", to, from))
        }
    }
}

/// Transition legality. The reset rule always applies; further rules are configuration.
pub struct StatusStateMachine {
    rules: Vec<Box<dyn TransitionRule>>,
}

impl StatusStateMachine {
    pub fn new(extra_rules: Vec<Box<dyn TransitionRule>>) -> Self {
        let mut rules: Vec<Box<dyn TransitionRule>> = vec![Box::new(ResetStatusRule)];
        rules.extend(extra_rules);
        Self { rules }
    }

    pub fn check_transition(
        &self,
        from: AppointmentStatus,
        to: AppointmentStatus,
        actor: &Actor,
    ) -> WorkflowResult<()> {
        debug!("Validating status transition from {:?} to {:?}", from, to);

        for rule in &self.rules {
            if let Err(reason) = rule.check(from, to, actor) {
                warn!("Invalid status transition attempted: {:?} -> {:?} ({})", from, to, reason);
                return Err(WorkflowError::IllegalTransition { from, to, reason });
            }
        }
        Ok(())
    }

    /// Every status the actor could move an appointment to from `from`.
    pub fn allowed_targets(&self, from: AppointmentStatus, actor: &Actor) -> Vec<AppointmentStatus> {
        AppointmentStatus::ALL
            .into_iter()
            .filter(|to| self.rules.iter().all(|rule| rule.check(from, *to, actor).is_ok()))
            .collect()
    }
}

impl Default for StatusStateMachine {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

/// Applies status changes and undo: access check, transition rules, validators,
/// mutation, audit, save. Runs inside the caller's transaction.
pub struct StatusTransitionService {
    store: Arc<dyn AppointmentStore>,
    audit: AuditTrailWriter,
    validation: Arc<ValidationPipeline>,
    machine: StatusStateMachine,
}

impl StatusTransitionService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        audit: AuditTrailWriter,
        validation: Arc<ValidationPipeline>,
        machine: StatusStateMachine,
    ) -> Self {
        Self {
            store,
            audit,
            validation,
            machine,
        }
    }

    pub fn machine(&self) -> &StatusStateMachine {
        &self.machine
    }

    pub async fn change_status(
        &self,
        appointment: &mut Appointment,
        target: AppointmentStatus,
        on_date: Option<DateTime<Utc>>,
        actor: &Actor,
    ) -> WorkflowResult<()> {
        debug!(
            "Changing status of appointment {} from {} to {}",
            appointment.uuid, appointment.status, target
        );

        ensure_self_or_all_access(appointment, actor)?;
        self.machine.check_transition(appointment.status, target, actor)?;
        self.validation.validate_status_change(appointment, target)?;

        let previous = appointment.status;
        appointment.status = target;
        appointment.provenance.stamp(actor.user_id, Utc::now());
        self.store
            .save(appointment)
            .await
            .map_err(WorkflowError::Store)?;

        let notes = on_date.map(|date| date.to_rfc3339());
        self.audit.record(appointment, notes, actor).await?;

        info!(
            appointment = %appointment.uuid,
            from = ?previous,
            to = ?target,
            "Appointment status changed"
        );
        Ok(())
    }

    pub async fn undo_status_change(&self, appointment: &mut Appointment, actor: &Actor) -> WorkflowResult<()> {
        debug!("Undoing last status change of appointment {}", appointment.uuid);

        ensure_self_or_all_access(appointment, actor)?;

        let prior = self
            .audit
            .prior_status_change(appointment)
            .await?
            .ok_or_else(|| WorkflowError::ConflictState("No status change actions to undo".to_string()))?;

        let undone = appointment.status;
        appointment.status = prior.status;
        appointment.provenance.stamp(actor.user_id, Utc::now());
        self.store
            .save(appointment)
            .await
            .map_err(WorkflowError::Store)?;
        self.audit.record(appointment, prior.notes, actor).await?;

        info!(
            appointment = %appointment.uuid,
            from = ?undone,
            to = ?appointment.status,
            "Appointment status change undone"
        );
        Ok(())
    }
}
