// libs/appointment-workflow-cell/src/services/conflict.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveTime, Utc};
use futures::future::join_all;
use tracing::{debug, warn};

use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{Appointment, AppointmentConflicts, ConflictKind, ProviderResponse};
use crate::store::AppointmentStore;

/// One conflict rule. Returns the members of the batch it considers conflicting.
///
/// Detectors must not depend on each other; the registry runs them concurrently.
#[async_trait]
pub trait ConflictDetector: Send + Sync {
    fn kind(&self) -> ConflictKind;

    async fn conflicts(&self, appointments: &[Appointment]) -> WorkflowResult<Vec<Appointment>>;
}

/// Results are advisory: nothing is reserved, so a reported conflict may already be stale.
#[derive(Clone, Default)]
pub struct ConflictDetectorRegistry {
    detectors: Vec<Arc<dyn ConflictDetector>>,
}

impl ConflictDetectorRegistry {
    pub fn new(detectors: Vec<Arc<dyn ConflictDetector>>) -> Self {
        Self { detectors }
    }

    /// Run every detector over the whole batch. Kinds with no hits are omitted.
    pub async fn detect(&self, appointments: &[Appointment]) -> WorkflowResult<AppointmentConflicts> {
        let mut conflicts = AppointmentConflicts::new();
        if appointments.is_empty() {
            return Ok(conflicts);
        }

        debug!(
            "Running {} conflict detectors over {} appointments",
            self.detectors.len(),
            appointments.len()
        );

        let results = join_all(self.detectors.iter().map(|detector| async move {
            (detector.kind(), detector.conflicts(appointments).await)
        }))
        .await;

        for (kind, result) in results {
            let found = result?;
            if !found.is_empty() {
                warn!("{} conflicting appointments of kind {}", found.len(), kind);
                conflicts.entry(kind).or_default().extend(found);
            }
        }

        Ok(conflicts)
    }

    /// Batch form: voided and wholly past appointments are dropped before any detector runs.
    pub async fn detect_upcoming(&self, appointments: Vec<Appointment>) -> WorkflowResult<AppointmentConflicts> {
        let candidates = non_voided_upcoming(appointments, Utc::now());
        self.detect(&candidates).await
    }
}

pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::default()).and_utc()
}

/// Keep appointments that are not voided and start no earlier than the start of `now`'s day.
pub fn non_voided_upcoming(appointments: Vec<Appointment>, now: DateTime<Utc>) -> Vec<Appointment> {
    let cutoff = start_of_day(now);
    appointments
        .into_iter()
        .filter(|appointment| !appointment.voided && appointment.start_date_time >= cutoff)
        .collect()
}

// ==============================================================================
// BUILT-IN DETECTORS
// ==============================================================================

/// A patient booked into overlapping appointments.
pub struct PatientDoubleBookingDetector {
    store: Arc<dyn AppointmentStore>,
}

impl PatientDoubleBookingDetector {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ConflictDetector for PatientDoubleBookingDetector {
    fn kind(&self) -> ConflictKind {
        ConflictKind::PatientDoubleBooking
    }

    async fn conflicts(&self, appointments: &[Appointment]) -> WorkflowResult<Vec<Appointment>> {
        find_overlapping(self.store.as_ref(), appointments, |candidate, other| {
            candidate.patient_uuid.is_some() && candidate.patient_uuid == other.patient_uuid
        })
        .await
    }
}

/// A provider who has not declined is booked into overlapping appointments.
pub struct ProviderDoubleBookingDetector {
    store: Arc<dyn AppointmentStore>,
}

impl ProviderDoubleBookingDetector {
    pub fn new(store: Arc<dyn AppointmentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ConflictDetector for ProviderDoubleBookingDetector {
    fn kind(&self) -> ConflictKind {
        ConflictKind::ProviderDoubleBooking
    }

    async fn conflicts(&self, appointments: &[Appointment]) -> WorkflowResult<Vec<Appointment>> {
        find_overlapping(self.store.as_ref(), appointments, |candidate, other| {
            committed_providers(candidate).any(|provider| committed_providers(other).any(|p| p == provider))
        })
        .await
    }
}

fn committed_providers(appointment: &Appointment) -> impl Iterator<Item = uuid::Uuid> + '_ {
    appointment
        .providers
        .iter()
        .filter(|p| matches!(p.response, ProviderResponse::Accepted | ProviderResponse::Awaiting))
        .map(|p| p.provider_uuid)
}

/// Members of `batch` overlapping another slot-holding appointment (stored or in the batch)
/// that shares a resource according to `shares_resource`.
async fn find_overlapping<F>(
    store: &dyn AppointmentStore,
    batch: &[Appointment],
    shares_resource: F,
) -> WorkflowResult<Vec<Appointment>>
where
    F: Fn(&Appointment, &Appointment) -> bool + Send + Sync,
{
    let mut conflicting = Vec::new();

    for candidate in batch {
        if !candidate.status.occupies_slot() {
            continue;
        }

        let stored = store
            .get_all_in_range(candidate.start_date_time, candidate.end_date_time)
            .await
            .map_err(WorkflowError::Store)?;

        let clashes = stored
            .iter()
            .chain(batch.iter())
            .filter(|other| other.uuid != candidate.uuid)
            .filter(|other| other.is_active() && other.status.occupies_slot())
            .any(|other| candidate.overlaps(other) && shares_resource(candidate, other));

        if clashes {
            conflicting.push(candidate.clone());
        }
    }

    Ok(conflicting)
}
