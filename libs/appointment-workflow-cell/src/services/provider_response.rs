// libs/appointment-workflow-cell/src/services/provider_response.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use shared_models::Actor;

use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{Appointment, AppointmentStatus, ProviderResponse, ProviderResponseUpdate};
use crate::services::audit::AuditTrailWriter;
use crate::services::lifecycle::StatusTransitionService;
use crate::store::AppointmentStore;

/// Sole writer of provider responses.
pub struct ProviderResponseCoordinator {
    store: Arc<dyn AppointmentStore>,
    audit: AuditTrailWriter,
    transitions: Arc<StatusTransitionService>,
}

impl ProviderResponseCoordinator {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        audit: AuditTrailWriter,
        transitions: Arc<StatusTransitionService>,
    ) -> Self {
        Self {
            store,
            audit,
            transitions,
        }
    }

    /// Record one provider's answer. The first acceptance of a requested appointment
    /// schedules it through the state machine.
    pub async fn record_response(
        &self,
        appointment: &mut Appointment,
        update: &ProviderResponseUpdate,
        actor: &Actor,
    ) -> WorkflowResult<()> {
        debug!(
            "Provider {} responding {} to appointment {}",
            update.provider_uuid, update.response, appointment.uuid
        );

        if appointment.providers.is_empty() {
            return Err(WorkflowError::NotFound(
                "No providers present in appointment".to_string(),
            ));
        }

        let provider = appointment
            .providers
            .iter_mut()
            .find(|p| p.provider_uuid == update.provider_uuid)
            .ok_or_else(|| WorkflowError::NotFound("Provider is not part of appointment".to_string()))?;

        if !actor.is_same_person(provider.person_uuid) {
            warn!(
                "Actor {} tried to answer for provider {}",
                actor.person_id, provider.provider_uuid
            );
            return Err(WorkflowError::Authorization(
                "Cannot change provider response for other providers".to_string(),
            ));
        }

        provider.response = update.response;

        if is_first_accept_for_requested(appointment, update) {
            info!(
                "First acceptance for requested appointment {}, scheduling it",
                appointment.uuid
            );
            self.transitions
                .change_status(appointment, AppointmentStatus::Scheduled, Some(Utc::now()), actor)
                .await?;
        } else {
            self.store
                .save(appointment)
                .await
                .map_err(WorkflowError::Store)?;
        }

        let notes = format!(
            "Changed Provider Response to {} for provider with UUID {} in appointment with UUID {}",
            update.response, update.provider_uuid, appointment.uuid
        );
        self.audit.record(appointment, Some(notes), actor).await?;
        Ok(())
    }
}

fn is_first_accept_for_requested(appointment: &Appointment, update: &ProviderResponseUpdate) -> bool {
    appointment.status == AppointmentStatus::Requested && update.response == ProviderResponse::Accepted
}
