use appointment_workflow_cell::test_utils::{TestActor, WorkflowHarness};
use appointment_workflow_cell::*;

mod booking_test;
mod conflict_test;
mod provider_response_test;

/// Book `appointment` as a fully privileged front desk user.
pub async fn book(harness: &WorkflowHarness, appointment: Appointment) -> Appointment {
    harness
        .service
        .create_or_update(appointment, &TestActor::admin())
        .await
        .expect("Failed to book appointment")
}

pub async fn stored(harness: &WorkflowHarness, appointment: &Appointment) -> Appointment {
    harness
        .service
        .get_appointment_or_fail(appointment.uuid)
        .await
        .expect("Appointment should be stored")
}
