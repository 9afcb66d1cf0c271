// libs/appointment-workflow-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use shared_models::Actor;

use crate::error::{WorkflowError, WorkflowResult};
use crate::models::Appointment;
use crate::services::access::ensure_self_or_all_access;
use crate::services::audit::AuditTrailWriter;
use crate::services::notification::NotificationDispatcher;
use crate::services::numbering::AppointmentNumberGenerator;
use crate::services::snapshot::SnapshotSerializer;
use crate::services::telemedicine::TeleconsultationLinkGenerator;
use crate::services::validation::{ValidationPipeline, ValidatorSet};
use crate::store::AppointmentStore;

/// Create and update path shared by direct booking and rescheduling.
pub struct AppointmentBookingService {
    store: Arc<dyn AppointmentStore>,
    audit: AuditTrailWriter,
    validation: Arc<ValidationPipeline>,
    numbering: Arc<dyn AppointmentNumberGenerator>,
    link_generator: Arc<dyn TeleconsultationLinkGenerator>,
    serializer: Arc<dyn SnapshotSerializer>,
    notifications: NotificationDispatcher,
    notify_on_save: bool,
}

impl AppointmentBookingService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        audit: AuditTrailWriter,
        validation: Arc<ValidationPipeline>,
        numbering: Arc<dyn AppointmentNumberGenerator>,
        link_generator: Arc<dyn TeleconsultationLinkGenerator>,
        serializer: Arc<dyn SnapshotSerializer>,
        notifications: NotificationDispatcher,
        notify_on_save: bool,
    ) -> Self {
        Self {
            store,
            audit,
            validation,
            numbering,
            link_generator,
            serializer,
            notifications,
            notify_on_save,
        }
    }

    /// Access check against both the incoming and the stored version, then validators;
    /// edit validators too when it already exists.
    pub async fn validate(&self, appointment: &Appointment, actor: &Actor) -> WorkflowResult<Option<Appointment>> {
        ensure_self_or_all_access(appointment, actor)?;

        let previous = self
            .store
            .get_by_uuid(appointment.uuid)
            .await
            .map_err(WorkflowError::Store)?;

        if let Some(stored) = &previous {
            ensure_self_or_all_access(stored, actor)?;
        }

        self.validation.validate(appointment, ValidatorSet::General)?;
        if previous.is_some() {
            self.validation.validate(appointment, ValidatorSet::Edit)?;
        }
        Ok(previous)
    }

    pub async fn validate_and_save(&self, mut appointment: Appointment, actor: &Actor) -> WorkflowResult<Appointment> {
        info!(
            "Saving appointment {} for patient {:?}",
            appointment.uuid, appointment.patient_uuid
        );

        let previous = self.validate(&appointment, actor).await?;

        self.numbering
            .assign_number_if_absent(&mut appointment)
            .await
            .map_err(WorkflowError::Integration)?;

        self.setup_teleconsultation(&mut appointment).await?;

        if let Some(previous) = &previous {
            if appointment.provenance.is_new() {
                appointment.provenance.creator = previous.provenance.creator;
                appointment.provenance.date_created = previous.provenance.date_created;
            }
        }
        appointment.provenance.stamp(actor.user_id, Utc::now());
        let snapshot = self.serializer.to_json_snapshot(&appointment)?;
        self.audit.record(&mut appointment, Some(snapshot), actor).await?;
        self.store
            .save(&appointment)
            .await
            .map_err(WorkflowError::Store)?;

        self.notify_updates(previous.as_ref(), &mut appointment).await;

        info!(
            "Appointment {} saved ({})",
            appointment.uuid,
            if previous.is_some() { "updated" } else { "created" }
        );
        Ok(appointment)
    }

    async fn setup_teleconsultation(&self, appointment: &mut Appointment) -> WorkflowResult<()> {
        if !appointment.teleconsultation {
            return Ok(());
        }

        let link = self
            .link_generator
            .generate_link(appointment)
            .await
            .map_err(WorkflowError::Integration)?;
        appointment.tele_health_video_link = Some(link);
        Ok(())
    }

    async fn notify_updates(
        &self,
        previous: Option<&Appointment>,
        appointment: &mut Appointment,
    ) {
        if !self.notify_on_save {
            debug!("Notifications disabled, skipping appointment {}", appointment.uuid);
            return;
        }
        if let Some(previous) = previous {
            debug!(
                "Appointment {} changed from {} to {}",
                appointment.uuid, previous.start_date_time, appointment.start_date_time
            );
        }

        if self.notifications.dispatch(appointment).await {
            if let Err(err) = self.store.save(appointment).await {
                warn!(
                    "Could not record notification flag for appointment {}: {}",
                    appointment.uuid, err
                );
            }
        }
    }
}
