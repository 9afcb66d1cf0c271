use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use appointment_workflow_cell::test_utils::{
    appointment_in, CountingDetector, RecordingNotifier, TestProvider, WorkflowHarness,
};
use appointment_workflow_cell::*;
use shared_config::AppointmentsConfig;

use super::book;

fn harness_with(detectors: Vec<Arc<CountingDetector>>) -> WorkflowHarness {
    WorkflowHarness::with(
        RecordingNotifier::succeeding(),
        AppointmentsConfig::default(),
        move |_store| {
            detectors
                .into_iter()
                .fold(WorkflowRegistry::empty(), |registry, detector| {
                    registry.with_conflict_detector(detector)
                })
        },
    )
}

#[tokio::test]
async fn test_empty_batch_runs_no_detector() {
    let detector = Arc::new(CountingDetector::new("ALWAYS", true));
    let harness = harness_with(vec![detector.clone()]);

    let conflicts = harness.service.appointments_conflicts(Vec::new()).await.unwrap();

    assert!(conflicts.is_empty());
    assert_eq!(detector.calls(), 0);
}

#[tokio::test]
async fn test_voided_and_past_appointments_are_filtered_before_detection() {
    let detector = Arc::new(CountingDetector::new("ALWAYS", true));
    let harness = harness_with(vec![detector.clone()]);
    let mut voided = appointment_in(3);
    voided.voided = true;
    let past = appointment_in(-72);

    let conflicts = harness
        .service
        .appointments_conflicts(vec![voided, past])
        .await
        .unwrap();

    assert!(conflicts.is_empty());
    assert_eq!(detector.calls(), 0);
}

#[tokio::test]
async fn test_single_appointment_check_skips_the_upcoming_filter() {
    let detector = Arc::new(CountingDetector::new("ALWAYS", true));
    let harness = harness_with(vec![detector.clone()]);
    let past = appointment_in(-72);

    let conflicts = harness.service.appointment_conflicts(&past).await.unwrap();

    assert_eq!(detector.calls(), 1);
    assert_eq!(
        conflicts.get(&ConflictKind::Custom("ALWAYS".to_string())),
        Some(&vec![past])
    );
}

#[tokio::test]
async fn test_kinds_without_hits_are_omitted() {
    let flagging = Arc::new(CountingDetector::new("ALWAYS", true));
    let quiet = Arc::new(CountingDetector::new("NEVER", false));
    let harness = harness_with(vec![flagging.clone(), quiet.clone()]);
    let upcoming = appointment_in(5);

    let conflicts = harness
        .service
        .appointments_conflicts(vec![upcoming.clone()])
        .await
        .unwrap();

    assert_eq!(flagging.calls(), 1);
    assert_eq!(quiet.calls(), 1);
    assert_eq!(conflicts.len(), 1);
    assert!(!conflicts.contains_key(&ConflictKind::Custom("NEVER".to_string())));
}

#[tokio::test]
async fn test_patient_double_booking_is_reported() {
    let harness = WorkflowHarness::new();
    let existing = book(&harness, appointment_in(4)).await;

    let mut candidate = appointment_in(4);
    candidate.patient_uuid = existing.patient_uuid;
    candidate.start_date_time = existing.start_date_time + Duration::minutes(10);
    candidate.end_date_time = existing.end_date_time + Duration::minutes(10);

    let conflicts = harness.service.appointment_conflicts(&candidate).await.unwrap();

    assert_eq!(
        conflicts.get(&ConflictKind::PatientDoubleBooking),
        Some(&vec![candidate])
    );
    assert!(!conflicts.contains_key(&ConflictKind::ProviderDoubleBooking));
}

#[tokio::test]
async fn test_appointment_with_voided_service_occupies_no_slot() {
    let harness = WorkflowHarness::new();
    let provider = TestProvider::default();
    let mut rival = appointment_in(4);
    rival.add_provider(provider.awaiting());
    if let Some(service) = rival.service.as_mut() {
        service.voided = true;
    }
    harness.store.insert(rival.clone()).await;

    let mut candidate = appointment_in(4);
    candidate.patient_uuid = rival.patient_uuid;
    candidate.start_date_time = rival.start_date_time;
    candidate.end_date_time = rival.end_date_time;
    candidate.add_provider(provider.awaiting());

    let conflicts = harness.service.appointment_conflicts(&candidate).await.unwrap();

    assert!(conflicts.is_empty());
}

#[tokio::test]
async fn test_provider_double_booking_ignores_declined_assignments() {
    let harness = WorkflowHarness::new();
    let provider = TestProvider::default();
    let mut draft = appointment_in(8);
    draft.add_provider(provider.awaiting());
    let existing = book(&harness, draft).await;

    let mut candidate = appointment_in(8);
    candidate.patient_uuid = Some(Uuid::new_v4());
    candidate.start_date_time = existing.start_date_time;
    candidate.end_date_time = existing.end_date_time;
    candidate.add_provider(provider.awaiting());

    let conflicts = harness
        .service
        .appointments_conflicts(vec![candidate.clone()])
        .await
        .unwrap();
    assert!(conflicts.contains_key(&ConflictKind::ProviderDoubleBooking));

    candidate.providers[0].response = ProviderResponse::Declined;
    let conflicts = harness.service.appointment_conflicts(&candidate).await.unwrap();
    assert!(conflicts.is_empty());
}

#[tokio::test]
async fn test_cancelled_appointments_do_not_hold_their_slot() {
    let harness = WorkflowHarness::new();
    let mut existing = book(&harness, appointment_in(4)).await;
    harness
        .service
        .change_status(
            &mut existing,
            AppointmentStatus::Cancelled,
            None,
            &test_utils::TestActor::admin(),
        )
        .await
        .unwrap();

    let mut candidate = appointment_in(4);
    candidate.patient_uuid = existing.patient_uuid;
    candidate.start_date_time = existing.start_date_time;
    candidate.end_date_time = existing.end_date_time;

    let conflicts = harness.service.appointment_conflicts(&candidate).await.unwrap();
    assert!(conflicts.is_empty());
}
