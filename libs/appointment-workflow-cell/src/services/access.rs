// libs/appointment-workflow-cell/src/services/access.rs
use tracing::warn;

use shared_models::{Actor, MANAGE_APPOINTMENTS, MANAGE_OWN_APPOINTMENTS};

use crate::error::{WorkflowError, WorkflowResult};
use crate::models::Appointment;

/// Self-or-all-access: privileged for every appointment, the appointment has no
/// active provider, or the actor is one of its providers.
pub fn has_self_or_all_access(appointment: &Appointment, actor: &Actor) -> bool {
    actor.has_privilege(MANAGE_APPOINTMENTS)
        || appointment.is_unassigned()
        || appointment.has_provider_person(actor.person_id)
}

pub fn ensure_self_or_all_access(appointment: &Appointment, actor: &Actor) -> WorkflowResult<()> {
    if has_self_or_all_access(appointment, actor) {
        return Ok(());
    }

    warn!(
        "Actor {} denied access to appointment {}",
        actor.person_id, appointment.uuid
    );
    Err(WorkflowError::Authorization(format!(
        "{} or {}",
        MANAGE_APPOINTMENTS, MANAGE_OWN_APPOINTMENTS
    )))
}
