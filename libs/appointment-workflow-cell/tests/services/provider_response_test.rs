use assert_matches::assert_matches;
use uuid::Uuid;

use appointment_workflow_cell::test_utils::{appointment_in, TestActor, TestProvider, WorkflowHarness};
use appointment_workflow_cell::*;

use super::{book, stored};

async fn requested_with(harness: &WorkflowHarness, providers: &[&TestProvider]) -> Appointment {
    let mut draft = appointment_in(6);
    draft.status = AppointmentStatus::Requested;
    for provider in providers {
        draft.add_provider(provider.awaiting());
    }
    book(harness, draft).await
}

fn respond(provider: &TestProvider, response: ProviderResponse) -> ProviderResponseUpdate {
    ProviderResponseUpdate {
        provider_uuid: provider.provider_uuid,
        response,
    }
}

#[tokio::test]
async fn test_first_acceptance_schedules_requested_appointment() {
    let harness = WorkflowHarness::new();
    let first = TestProvider::default();
    let second = TestProvider::default();
    let mut appointment = requested_with(&harness, &[&first, &second]).await;

    harness
        .service
        .record_provider_response(
            &mut appointment,
            &respond(&first, ProviderResponse::Accepted),
            &first.actor(),
        )
        .await
        .expect("Provider should be able to accept");

    assert_eq!(appointment.status, AppointmentStatus::Scheduled);
    assert_eq!(
        appointment.provider(first.provider_uuid).unwrap().response,
        ProviderResponse::Accepted
    );
    assert_eq!(
        appointment.provider(second.provider_uuid).unwrap().response,
        ProviderResponse::Awaiting
    );

    let saved = stored(&harness, &appointment).await;
    assert_eq!(saved.status, AppointmentStatus::Scheduled);
    assert_eq!(saved.providers, appointment.providers);

    let trail = harness.service.audit_trail(appointment.uuid).await.unwrap();
    let expected = format!(
        "Changed Provider Response to ACCEPTED for provider with UUID {} in appointment with UUID {}",
        first.provider_uuid, appointment.uuid
    );
    let response_audits: Vec<_> = trail
        .iter()
        .filter(|audit| audit.notes.as_deref() == Some(expected.as_str()))
        .collect();
    assert_eq!(response_audits.len(), 1);
    assert_eq!(response_audits[0].actor_person, first.person_uuid);

    // Booking snapshot, then the promotion and the response note from one acceptance.
    assert_eq!(trail.len(), 3);
    assert_eq!(trail[1].status, AppointmentStatus::Scheduled);
    assert_ne!(trail[1].notes.as_deref(), Some(expected.as_str()));
    assert_eq!(trail[2].notes.as_deref(), Some(expected.as_str()));
}

#[tokio::test]
async fn test_later_acceptance_does_not_touch_status() {
    let harness = WorkflowHarness::new();
    let first = TestProvider::default();
    let second = TestProvider::default();
    let mut appointment = requested_with(&harness, &[&first, &second]).await;

    harness
        .service
        .record_provider_response(&mut appointment, &respond(&first, ProviderResponse::Accepted), &first.actor())
        .await
        .unwrap();
    let audits_after_first = harness.service.audit_trail(appointment.uuid).await.unwrap().len();

    harness
        .service
        .record_provider_response(&mut appointment, &respond(&second, ProviderResponse::Accepted), &second.actor())
        .await
        .unwrap();

    assert_eq!(appointment.status, AppointmentStatus::Scheduled);
    assert_eq!(appointment.providers_with_response(ProviderResponse::Accepted).len(), 2);
    let trail = harness.service.audit_trail(appointment.uuid).await.unwrap();
    assert_eq!(trail.len(), audits_after_first + 1);
}

#[tokio::test]
async fn test_decline_keeps_requested_status() {
    let harness = WorkflowHarness::new();
    let provider = TestProvider::default();
    let mut appointment = requested_with(&harness, &[&provider]).await;

    harness
        .service
        .record_provider_response(&mut appointment, &respond(&provider, ProviderResponse::Declined), &provider.actor())
        .await
        .unwrap();

    assert_eq!(appointment.status, AppointmentStatus::Requested);
    let saved = stored(&harness, &appointment).await;
    assert_eq!(
        saved.provider(provider.provider_uuid).unwrap().response,
        ProviderResponse::Declined
    );
    let trail = harness.service.audit_trail(appointment.uuid).await.unwrap();
    assert_eq!(trail.last().unwrap().status, AppointmentStatus::Requested);
}

#[tokio::test]
async fn test_provider_cannot_answer_for_another_provider() {
    let harness = WorkflowHarness::new();
    let first = TestProvider::default();
    let second = TestProvider::default();
    let mut appointment = requested_with(&harness, &[&first, &second]).await;

    let result = harness
        .service
        .record_provider_response(&mut appointment, &respond(&first, ProviderResponse::Accepted), &second.actor())
        .await;

    assert_matches!(
        result,
        Err(WorkflowError::Authorization(ref message))
            if message == "Cannot change provider response for other providers"
    );
    assert_eq!(appointment.status, AppointmentStatus::Requested);
    assert_eq!(
        appointment.provider(first.provider_uuid).unwrap().response,
        ProviderResponse::Awaiting
    );
    assert_eq!(stored(&harness, &appointment).await.providers, appointment.providers);
}

#[tokio::test]
async fn test_privileged_actor_still_cannot_answer_for_a_provider() {
    let harness = WorkflowHarness::new();
    let provider = TestProvider::default();
    let mut appointment = requested_with(&harness, &[&provider]).await;

    let result = harness
        .service
        .record_provider_response(
            &mut appointment,
            &respond(&provider, ProviderResponse::Accepted),
            &TestActor::supervisor(),
        )
        .await;

    assert_matches!(result, Err(WorkflowError::Authorization(_)));
}

#[tokio::test]
async fn test_unknown_provider_is_not_found() {
    let harness = WorkflowHarness::new();
    let provider = TestProvider::default();
    let mut appointment = requested_with(&harness, &[&provider]).await;
    let stranger = TestProvider {
        provider_uuid: Uuid::new_v4(),
        person_uuid: provider.person_uuid,
    };

    let result = harness
        .service
        .record_provider_response(&mut appointment, &respond(&stranger, ProviderResponse::Accepted), &provider.actor())
        .await;

    assert_matches!(
        result,
        Err(WorkflowError::NotFound(ref message)) if message == "Provider is not part of appointment"
    );
}

#[tokio::test]
async fn test_appointment_without_providers_is_not_found() {
    let harness = WorkflowHarness::new();
    let mut appointment = requested_with(&harness, &[]).await;
    let provider = TestProvider::default();

    let result = harness
        .service
        .record_provider_response(&mut appointment, &respond(&provider, ProviderResponse::Accepted), &provider.actor())
        .await;

    assert_matches!(
        result,
        Err(WorkflowError::NotFound(ref message)) if message == "No providers present in appointment"
    );
}

#[tokio::test]
async fn test_decline_after_promotion_keeps_scheduled_status() {
    let harness = WorkflowHarness::new();
    let first = TestProvider::default();
    let second = TestProvider::default();
    let mut appointment = requested_with(&harness, &[&first, &second]).await;

    harness
        .service
        .record_provider_response(&mut appointment, &respond(&first, ProviderResponse::Accepted), &first.actor())
        .await
        .unwrap();
    let audits_after_accept = harness.service.audit_trail(appointment.uuid).await.unwrap().len();

    harness
        .service
        .record_provider_response(&mut appointment, &respond(&second, ProviderResponse::Declined), &second.actor())
        .await
        .expect("Second provider should be able to decline");

    assert_eq!(appointment.status, AppointmentStatus::Scheduled);
    let responses: Vec<_> = appointment.providers.iter().map(|p| p.response).collect();
    assert_eq!(responses, vec![ProviderResponse::Accepted, ProviderResponse::Declined]);

    let trail = harness.service.audit_trail(appointment.uuid).await.unwrap();
    assert_eq!(trail.len(), audits_after_accept + 1);
    assert_eq!(trail.last().unwrap().status, AppointmentStatus::Scheduled);
}
