use assert_matches::assert_matches;
use chrono::{Duration, Utc};

use appointment_workflow_cell::test_utils::{
    appointment_in, RecordingNotifier, TestActor, TestProvider, WorkflowHarness,
};
use appointment_workflow_cell::*;
use shared_config::AppointmentsConfig;

use super::{book, stored};

fn teleconsultation(hours_from_now: i64) -> Appointment {
    let mut appointment = appointment_in(hours_from_now);
    appointment.teleconsultation = true;
    appointment
}

#[tokio::test]
async fn test_create_assigns_number_and_records_snapshot() {
    let harness = WorkflowHarness::new();
    let admin = TestActor::admin();

    let created = harness
        .service
        .create_or_update(appointment_in(2), &admin)
        .await
        .expect("Booking should succeed");

    assert_eq!(created.appointment_number.as_deref(), Some("APT-00001"));
    assert_eq!(created.provenance.creator, Some(admin.user_id));
    assert!(created.provenance.date_created.is_some());

    let trail = harness.service.audit_trail(created.uuid).await.unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].status, AppointmentStatus::Scheduled);
    assert_eq!(trail[0].actor_person, admin.person_id);

    let snapshot: Appointment = serde_json::from_str(trail[0].notes.as_deref().unwrap()).unwrap();
    assert_eq!(snapshot.uuid, created.uuid);
    assert_eq!(snapshot.appointment_number, created.appointment_number);
    assert_eq!(harness.store.commit_count(), 1);
}

#[tokio::test]
async fn test_validation_reports_every_violation() {
    let harness = WorkflowHarness::new();
    let mut draft = appointment_in(2);
    draft.patient_uuid = None;
    draft.service = None;
    draft.end_date_time = draft.start_date_time - Duration::minutes(1);

    let result = harness.service.create_or_update(draft, &TestActor::admin()).await;

    let err = result.unwrap_err();
    assert_eq!(
        err.violations(),
        [
            "Appointment must have a patient".to_string(),
            "Appointment must have a service".to_string(),
            "Appointment start time must be before its end time".to_string(),
        ]
    );
    assert!(harness.store.is_empty().await);
    assert_eq!(harness.store.rollback_count(), 1);
}

#[tokio::test]
async fn test_update_keeps_creation_provenance_and_runs_edit_validators() {
    let harness = WorkflowHarness::new();
    let creator = TestActor::admin();
    let created = harness
        .service
        .create_or_update(appointment_in(2), &creator)
        .await
        .unwrap();

    let editor = TestActor::admin();
    let mut edit = created.clone();
    edit.provenance = Provenance::default();
    edit.comments = Some("Bring previous lab results".to_string());
    let updated = harness.service.create_or_update(edit, &editor).await.unwrap();

    assert_eq!(updated.provenance.creator, Some(creator.user_id));
    assert_eq!(updated.provenance.changed_by, Some(editor.user_id));
    assert_eq!(updated.appointment_number, created.appointment_number);

    let mut voided = updated.clone();
    voided.voided = true;
    let result = harness.service.create_or_update(voided, &editor).await;
    assert_matches!(
        result,
        Err(WorkflowError::Validation(ref errors)) if errors == &["Voided appointments cannot be edited".to_string()]
    );
    assert!(!stored(&harness, &updated).await.voided);
}

#[tokio::test]
async fn test_unassigned_outsider_cannot_book_for_a_provider() {
    let harness = WorkflowHarness::new();
    let provider = TestProvider::default();
    let mut draft = appointment_in(2);
    draft.add_provider(provider.awaiting());

    let result = harness.service.create_or_update(draft.clone(), &TestActor::outsider()).await;
    assert_matches!(result, Err(WorkflowError::Authorization(_)));

    let own = harness.service.create_or_update(draft, &provider.actor()).await;
    assert!(own.is_ok());
}

#[tokio::test]
async fn test_outsider_cannot_unassign_providers_from_stored_appointment() {
    let harness = WorkflowHarness::new();
    let provider = TestProvider::default();
    let mut draft = appointment_in(2);
    draft.add_provider(provider.awaiting());
    let booked = book(&harness, draft).await;

    let mut edit = booked.clone();
    edit.providers.clear();
    let result = harness.service.create_or_update(edit, &TestActor::outsider()).await;

    assert_matches!(result, Err(WorkflowError::Authorization(_)));
    assert_eq!(stored(&harness, &booked).await.providers, booked.providers);
}

#[tokio::test]
async fn test_provider_assigned_twice_is_rejected() {
    let harness = WorkflowHarness::new();
    let provider = TestProvider::default();
    let mut draft = appointment_in(2);
    draft.providers = vec![provider.awaiting(), provider.awaiting()];

    let result = harness.service.create_or_update(draft, &TestActor::admin()).await;

    let expected = format!("Provider {} is assigned more than once", provider.provider_uuid);
    assert_matches!(
        result,
        Err(WorkflowError::Validation(ref errors)) if errors == &[expected]
    );
    assert!(harness.store.is_empty().await);
}

#[tokio::test]
async fn test_validate_has_no_side_effects() {
    let harness = WorkflowHarness::new();
    let mut draft = appointment_in(2);
    draft.service = None;

    let result = harness
        .service
        .validate(&draft, ValidatorSet::General, &TestActor::admin());

    assert_matches!(result, Err(WorkflowError::Validation(_)));
    assert!(harness
        .service
        .validate(&appointment_in(2), ValidatorSet::General, &TestActor::admin())
        .is_ok());
    assert_eq!(harness.store.save_count(), 0);
}

#[tokio::test]
async fn test_teleconsultation_gets_link_and_notification() {
    let harness = WorkflowHarness::new();

    let created = book(&harness, teleconsultation(3)).await;

    assert_eq!(
        created.tele_health_video_link,
        Some(format!("https://teleconsultation.local/room/{}", created.uuid))
    );
    assert!(created.email_sent);
    assert!(stored(&harness, &created).await.email_sent);
    assert_eq!(harness.notifier.notified().await, vec![created.uuid]);
}

#[tokio::test]
async fn test_failed_notification_does_not_fail_the_save() {
    let harness = WorkflowHarness::with(
        RecordingNotifier::failing(),
        AppointmentsConfig::default(),
        WorkflowRegistry::standard,
    );

    let created = book(&harness, teleconsultation(3)).await;

    assert!(!created.email_sent);
    assert!(created.tele_health_video_link.is_some());
    assert!(!stored(&harness, &created).await.email_sent);
    assert_eq!(harness.store.commit_count(), 1);
}

#[tokio::test]
async fn test_notifications_can_be_disabled() {
    let config = AppointmentsConfig {
        notify_on_save: false,
        ..AppointmentsConfig::default()
    };
    let harness = WorkflowHarness::with(RecordingNotifier::succeeding(), config, WorkflowRegistry::standard);

    let created = book(&harness, teleconsultation(3)).await;

    assert!(!created.email_sent);
    assert!(harness.notifier.notified().await.is_empty());
}

#[tokio::test]
async fn test_store_failure_rolls_back_the_audit() {
    let harness = WorkflowHarness::new();
    let mut appointment = book(&harness, appointment_in(2)).await;
    harness.store.fail_saves(true);

    let result = harness
        .service
        .change_status(&mut appointment, AppointmentStatus::Cancelled, None, &TestActor::admin())
        .await;

    assert_matches!(result, Err(WorkflowError::Store(_)));
    assert_eq!(appointment.status, AppointmentStatus::Scheduled);
    assert_eq!(harness.service.audit_trail(appointment.uuid).await.unwrap().len(), 1);
}

// ==============================================================================
// QUERIES
// ==============================================================================

#[tokio::test]
async fn test_search_without_start_date_matches_nothing() {
    let harness = WorkflowHarness::new();
    let created = book(&harness, appointment_in(2)).await;

    let request = AppointmentSearchRequest {
        patient_uuid: created.patient_uuid,
        ..AppointmentSearchRequest::default()
    };
    assert!(harness.service.search(&request).await.unwrap().is_empty());

    let request = AppointmentSearchRequest {
        start_date: Some(Utc::now()),
        ..request
    };
    let found = harness.service.search(&request).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].uuid, created.uuid);
}

#[tokio::test]
async fn test_day_and_range_queries_exclude_inactive_appointments() {
    let harness = WorkflowHarness::new();
    let active = book(&harness, appointment_in(48)).await;

    let mut retired = appointment_in(48);
    let mut service = ServiceRef::new("Retired Clinic");
    service.voided = true;
    retired.service = Some(service);
    harness.store.insert(retired).await;

    let date = active.start_date_time.date_naive();
    let for_day = harness.service.appointments_for_date(date).await.unwrap();
    assert_eq!(for_day.len(), 1);
    assert_eq!(for_day[0].uuid, active.uuid);

    let in_range = harness
        .service
        .appointments_in_range(
            active.start_date_time - Duration::hours(1),
            active.end_date_time + Duration::hours(1),
        )
        .await
        .unwrap();
    assert_eq!(in_range.len(), 1);
}

#[tokio::test]
async fn test_service_queries() {
    let harness = WorkflowHarness::new();
    let upcoming = book(&harness, appointment_in(24)).await;
    let service_uuid = upcoming.service.as_ref().unwrap().uuid;

    let mut earlier = appointment_in(-24);
    earlier.service = upcoming.service.clone();
    let earlier = book(&harness, earlier).await;

    let future = harness
        .service
        .future_appointments_for_service(service_uuid)
        .await
        .unwrap();
    assert_eq!(future.len(), 1);
    assert_eq!(future[0].uuid, upcoming.uuid);

    let window = harness
        .service
        .appointments_for_service(
            service_uuid,
            earlier.start_date_time - Duration::hours(1),
            upcoming.end_date_time + Duration::hours(1),
            &[AppointmentStatus::Scheduled],
        )
        .await
        .unwrap();
    assert_eq!(window.len(), 2);

    let cancelled_only = harness
        .service
        .appointments_for_service(
            service_uuid,
            earlier.start_date_time - Duration::hours(1),
            upcoming.end_date_time + Duration::hours(1),
            &[AppointmentStatus::Cancelled],
        )
        .await
        .unwrap();
    assert!(cancelled_only.is_empty());
}
