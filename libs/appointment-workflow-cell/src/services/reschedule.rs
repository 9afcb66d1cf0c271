// libs/appointment-workflow-cell/src/services/reschedule.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info};
use uuid::Uuid;

use shared_models::Actor;

use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{Appointment, AppointmentStatus, Provenance};
use crate::services::audit::AuditTrailWriter;
use crate::services::booking::AppointmentBookingService;
use crate::services::lifecycle::StatusTransitionService;
use crate::services::snapshot::SnapshotSerializer;
use crate::store::{in_transaction, AppointmentStore};

/// Cancel-then-create. The two steps commit separately: when creating the
/// replacement fails, the original stays cancelled and nothing is retried.
pub struct RescheduleOrchestrator {
    store: Arc<dyn AppointmentStore>,
    audit: AuditTrailWriter,
    serializer: Arc<dyn SnapshotSerializer>,
    transitions: Arc<StatusTransitionService>,
    booking: Arc<AppointmentBookingService>,
    number_retention_enabled: bool,
}

impl RescheduleOrchestrator {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        audit: AuditTrailWriter,
        serializer: Arc<dyn SnapshotSerializer>,
        transitions: Arc<StatusTransitionService>,
        booking: Arc<AppointmentBookingService>,
        number_retention_enabled: bool,
    ) -> Self {
        Self {
            store,
            audit,
            serializer,
            transitions,
            booking,
            number_retention_enabled,
        }
    }

    pub async fn reschedule(
        &self,
        original_uuid: Uuid,
        draft: Appointment,
        retain_number: bool,
        actor: &Actor,
    ) -> WorkflowResult<Appointment> {
        debug!("Rescheduling appointment {}", original_uuid);

        let mut original = self
            .store
            .get_by_uuid(original_uuid)
            .await
            .map_err(WorkflowError::Store)?
            .ok_or_else(|| {
                let msg = format!(
                    "Can not identify appointment for rescheduling with {}",
                    original_uuid
                );
                error!("{}", msg);
                WorkflowError::NotFound(msg)
            })?;

        in_transaction(self.store.as_ref(), self.cancel_original(&mut original, actor)).await?;

        let replacement = self.prepare_replacement(draft, &original, retain_number);
        let created = in_transaction(
            self.store.as_ref(),
            self.booking.validate_and_save(replacement, actor),
        )
        .await
        .map_err(|err| {
            error!(
                "Replacement for cancelled appointment {} was not created: {}",
                original.uuid, err
            );
            err
        })?;

        info!(
            "Appointment {} rescheduled as {}",
            original.uuid, created.uuid
        );
        Ok(created)
    }

    async fn cancel_original(&self, original: &mut Appointment, actor: &Actor) -> WorkflowResult<()> {
        self.transitions
            .change_status(original, AppointmentStatus::Cancelled, Some(Utc::now()), actor)
            .await?;

        let snapshot = self.serializer.to_json_snapshot(original)?;
        self.audit.record(original, Some(snapshot), actor).await?;
        Ok(())
    }

    /// Turn the draft into a brand new entity scheduled in place of `original`.
    fn prepare_replacement(&self, mut draft: Appointment, original: &Appointment, retain_number: bool) -> Appointment {
        draft.uuid = Uuid::new_v4();
        draft.provenance = Provenance::default();
        draft.audits.clear();
        draft.tele_health_video_link = None;
        draft.email_sent = false;

        draft.appointment_number = if retain_number && self.number_retention_enabled {
            original.appointment_number.clone()
        } else {
            if retain_number {
                debug!("Number retention requested but disabled, assigning a fresh number");
            }
            None
        };

        draft.status = AppointmentStatus::Scheduled;
        draft
    }
}
