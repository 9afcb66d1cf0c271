// libs/appointment-workflow-cell/src/services/audit.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use shared_models::Actor;

use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{Appointment, AppointmentAudit};
use crate::store::AuditStore;

/// Appends immutable status records. Records are never updated or removed.
#[derive(Clone)]
pub struct AuditTrailWriter {
    audits: Arc<dyn AuditStore>,
}

impl AuditTrailWriter {
    pub fn new(audits: Arc<dyn AuditStore>) -> Self {
        Self { audits }
    }

    /// Persist a record of the appointment's current status and add it to the loaded trail.
    #[instrument(skip(self, appointment, notes, actor), fields(appointment = %appointment.uuid))]
    pub async fn record(
        &self,
        appointment: &mut Appointment,
        notes: Option<String>,
        actor: &Actor,
    ) -> WorkflowResult<AppointmentAudit> {
        let audit = AppointmentAudit {
            uuid: Uuid::new_v4(),
            appointment_uuid: appointment.uuid,
            status: appointment.status,
            notes,
            actor_person: actor.person_id,
            date_created: Utc::now(),
        };

        self.audits
            .save_audit(&audit)
            .await
            .map_err(WorkflowError::Store)?;

        info!(
            audit = %audit.uuid,
            status = ?audit.status,
            actor = %actor.person_id,
            "AUDIT: appointment status recorded"
        );

        appointment.audits.push(audit.clone());
        Ok(audit)
    }

    pub async fn prior_status_change(&self, appointment: &Appointment) -> WorkflowResult<Option<AppointmentAudit>> {
        self.audits
            .prior_status_change(appointment)
            .await
            .map_err(WorkflowError::Store)
    }

    pub async fn trail(&self, appointment_uuid: Uuid) -> WorkflowResult<Vec<AppointmentAudit>> {
        self.audits
            .audits_for(appointment_uuid)
            .await
            .map_err(WorkflowError::Store)
    }
}
