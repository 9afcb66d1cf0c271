// libs/appointment-workflow-cell/src/test_utils.rs
//! In-memory collaborators and fixtures for exercising the workflow without a database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use shared_config::AppointmentsConfig;
use shared_models::{Actor, MANAGE_APPOINTMENTS, RESET_APPOINTMENT_STATUS};

use crate::error::WorkflowResult;
use crate::models::{
    Appointment, AppointmentAudit, AppointmentProvider, AppointmentSearchRequest, AppointmentStatus, ConflictKind,
    NotificationResult, ServiceRef,
};
use crate::services::conflict::ConflictDetector;
use crate::services::notification::AppointmentNotifier;
use crate::services::numbering::SequentialNumberGenerator;
use crate::services::snapshot::JsonSnapshotSerializer;
use crate::services::telemedicine::RoomLinkGenerator;
use crate::services::workflow::{AppointmentWorkflowService, WorkflowCollaborators, WorkflowRegistry};
use crate::store::{AppointmentStore, AuditStore};

// ==============================================================================
// STORE
// ==============================================================================

#[derive(Clone, Default)]
struct StoreState {
    appointments: HashMap<Uuid, Appointment>,
    audits: Vec<AppointmentAudit>,
}

/// Appointment and audit storage with snapshot-based transactions.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    state: RwLock<StoreState>,
    checkpoint: Mutex<Option<StoreState>>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `appointment` directly, bypassing the workflow.
    pub async fn insert(&self, appointment: Appointment) {
        let mut state = self.state.write().await;
        let mut stored = appointment;
        stored.audits.clear();
        state.appointments.insert(stored.uuid, stored);
    }

    /// Make every subsequent `save` fail until switched off again.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn rollback_count(&self) -> usize {
        self.rollbacks.load(Ordering::SeqCst)
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.appointments.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn select<F>(&self, predicate: F) -> Vec<Appointment>
    where
        F: Fn(&Appointment) -> bool,
    {
        let state = self.state.read().await;
        let mut found: Vec<Appointment> = state
            .appointments
            .values()
            .filter(|appointment| predicate(appointment))
            .cloned()
            .collect();
        found.sort_by_key(|appointment| appointment.start_date_time);
        found
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn save(&self, appointment: &Appointment) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(anyhow!("Simulated save failure for appointment {}", appointment.uuid));
        }

        let mut stored = appointment.clone();
        stored.audits.clear();
        self.state.write().await.appointments.insert(stored.uuid, stored);
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_by_uuid(&self, uuid: Uuid) -> Result<Option<Appointment>> {
        let state = self.state.read().await;
        Ok(state.appointments.get(&uuid).map(|appointment| {
            let mut loaded = appointment.clone();
            loaded.audits = state
                .audits
                .iter()
                .filter(|audit| audit.appointment_uuid == uuid)
                .cloned()
                .collect();
            loaded
        }))
    }

    async fn search_by_example(&self, example: &Appointment) -> Result<Vec<Appointment>> {
        let service = example.service.as_ref().map(|s| s.uuid);
        let service_type = example.service_type.as_ref().map(|s| s.uuid);
        Ok(self
            .select(|appointment| {
                (example.patient_uuid.is_none() || appointment.patient_uuid == example.patient_uuid)
                    && (example.location_uuid.is_none() || appointment.location_uuid == example.location_uuid)
                    && (service.is_none() || appointment.service.as_ref().map(|s| s.uuid) == service)
                    && (service_type.is_none()
                        || appointment.service_type.as_ref().map(|s| s.uuid) == service_type)
                    && appointment.status == example.status
            })
            .await)
    }

    async fn search(&self, request: &AppointmentSearchRequest) -> Result<Vec<Appointment>> {
        let mut found = self.select(|appointment| request.matches(appointment)).await;
        if let Some(limit) = request.limit {
            found.truncate(limit);
        }
        Ok(found)
    }

    async fn get_all_for_date(&self, date: NaiveDate) -> Result<Vec<Appointment>> {
        Ok(self
            .select(|appointment| appointment.start_date_time.date_naive() == date)
            .await)
    }

    async fn get_all_in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Appointment>> {
        Ok(self
            .select(|appointment| appointment.start_date_time < end && start < appointment.end_date_time)
            .await)
    }

    async fn get_future_for_service(&self, service_uuid: Uuid) -> Result<Vec<Appointment>> {
        let now = Utc::now();
        Ok(self
            .select(|appointment| {
                !appointment.voided
                    && appointment.start_date_time >= now
                    && appointment.service.as_ref().is_some_and(|s| s.uuid == service_uuid)
            })
            .await)
    }

    async fn get_future_for_service_type(&self, service_type_uuid: Uuid) -> Result<Vec<Appointment>> {
        let now = Utc::now();
        Ok(self
            .select(|appointment| {
                !appointment.voided
                    && appointment.start_date_time >= now
                    && appointment
                        .service_type
                        .as_ref()
                        .is_some_and(|s| s.uuid == service_type_uuid)
            })
            .await)
    }

    async fn get_for_service(
        &self,
        service_uuid: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<Appointment>> {
        Ok(self
            .select(|appointment| {
                !appointment.voided
                    && appointment.service.as_ref().is_some_and(|s| s.uuid == service_uuid)
                    && appointment.start_date_time >= start
                    && appointment.end_date_time <= end
                    && (statuses.is_empty() || statuses.contains(&appointment.status))
            })
            .await)
    }

    async fn begin(&self) -> Result<()> {
        let snapshot = self.state.read().await.clone();
        *self.checkpoint.lock().await = Some(snapshot);
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        self.checkpoint.lock().await.take();
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        let snapshot = self
            .checkpoint
            .lock()
            .await
            .take()
            .ok_or_else(|| anyhow!("Rollback without an open transaction"))?;
        *self.state.write().await = snapshot;
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl AuditStore for InMemoryAppointmentStore {
    async fn save_audit(&self, audit: &AppointmentAudit) -> Result<()> {
        self.state.write().await.audits.push(audit.clone());
        Ok(())
    }

    async fn audits_for(&self, appointment_uuid: Uuid) -> Result<Vec<AppointmentAudit>> {
        Ok(self
            .state
            .read()
            .await
            .audits
            .iter()
            .filter(|audit| audit.appointment_uuid == appointment_uuid)
            .cloned()
            .collect())
    }
}

// ==============================================================================
// NOTIFIER AND DETECTOR DOUBLES
// ==============================================================================

/// Answers every notification with a fixed set of channel results and remembers who was notified.
pub struct RecordingNotifier {
    results: Vec<NotificationResult>,
    notified: Mutex<Vec<Uuid>>,
}

impl RecordingNotifier {
    pub fn new(results: Vec<NotificationResult>) -> Self {
        Self {
            results,
            notified: Mutex::new(Vec::new()),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(vec![NotificationResult::success("EMAIL")])
    }

    pub fn failing() -> Self {
        Self::new(vec![
            NotificationResult::failure("EMAIL", 1, "SMTP unavailable"),
            NotificationResult::failure("SMS", 2, "Gateway timeout"),
        ])
    }

    pub async fn notified(&self) -> Vec<Uuid> {
        self.notified.lock().await.clone()
    }
}

#[async_trait]
impl AppointmentNotifier for RecordingNotifier {
    async fn notify_all(&self, appointment: &Appointment) -> Vec<NotificationResult> {
        self.notified.lock().await.push(appointment.uuid);
        self.results.clone()
    }
}

/// Detector that counts its invocations and flags either everything or nothing.
pub struct CountingDetector {
    name: String,
    flag_all: bool,
    calls: AtomicUsize,
}

impl CountingDetector {
    pub fn new(name: &str, flag_all: bool) -> Self {
        Self {
            name: name.to_string(),
            flag_all,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConflictDetector for CountingDetector {
    fn kind(&self) -> ConflictKind {
        ConflictKind::Custom(self.name.clone())
    }

    async fn conflicts(&self, appointments: &[Appointment]) -> WorkflowResult<Vec<Appointment>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.flag_all {
            Ok(appointments.to_vec())
        } else {
            Ok(Vec::new())
        }
    }
}

// ==============================================================================
// ACTORS AND FIXTURES
// ==============================================================================

pub struct TestActor;

impl TestActor {
    /// Front desk user with access to every appointment.
    pub fn admin() -> Actor {
        Actor::new(Uuid::new_v4())
            .with_name("Front Desk")
            .with_privilege(MANAGE_APPOINTMENTS)
    }

    /// Admin who may also reset processed appointments.
    pub fn supervisor() -> Actor {
        Self::admin().with_privilege(RESET_APPOINTMENT_STATUS)
    }

    /// The person behind a provider, with no facility-wide privilege.
    pub fn provider(person_uuid: Uuid) -> Actor {
        Actor::new(person_uuid).with_name("Provider")
    }

    pub fn outsider() -> Actor {
        Actor::new(Uuid::new_v4()).with_name("Outsider")
    }
}

/// A provider assignment together with the person acting for it.
pub struct TestProvider {
    pub provider_uuid: Uuid,
    pub person_uuid: Uuid,
}

impl Default for TestProvider {
    fn default() -> Self {
        Self {
            provider_uuid: Uuid::new_v4(),
            person_uuid: Uuid::new_v4(),
        }
    }
}

impl TestProvider {
    pub fn awaiting(&self) -> AppointmentProvider {
        AppointmentProvider::awaiting(self.provider_uuid, self.person_uuid)
    }

    pub fn actor(&self) -> Actor {
        TestActor::provider(self.person_uuid)
    }
}

/// A valid, unsaved appointment starting `hours_from_now` hours from now.
pub fn appointment_in(hours_from_now: i64) -> Appointment {
    let start = Utc::now() + Duration::hours(hours_from_now);
    let mut appointment = Appointment::new(Uuid::new_v4(), start, start + Duration::minutes(30));
    appointment.service = Some(ServiceRef::new("General Medicine"));
    appointment
}

/// Fully wired service over shared in-memory collaborators.
pub struct WorkflowHarness {
    pub store: Arc<InMemoryAppointmentStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub service: AppointmentWorkflowService,
}

impl WorkflowHarness {
    pub fn new() -> Self {
        Self::with(RecordingNotifier::succeeding(), AppointmentsConfig::default(), |store| {
            WorkflowRegistry::standard(store)
        })
    }

    pub fn with<F>(notifier: RecordingNotifier, config: AppointmentsConfig, registry: F) -> Self
    where
        F: FnOnce(Arc<dyn AppointmentStore>) -> WorkflowRegistry,
    {
        let store = Arc::new(InMemoryAppointmentStore::new());
        let notifier = Arc::new(notifier);
        let collaborators = WorkflowCollaborators {
            store: store.clone(),
            audits: store.clone(),
            notifier: notifier.clone(),
            link_generator: Arc::new(RoomLinkGenerator::new(&config.teleconsultation_base_url)),
            numbering: Arc::new(SequentialNumberGenerator::new(&config.number_prefix)),
            serializer: Arc::new(JsonSnapshotSerializer),
        };
        let shared: Arc<dyn AppointmentStore> = store.clone();
        let service = AppointmentWorkflowService::new(collaborators, registry(shared), &config);

        Self {
            store,
            notifier,
            service,
        }
    }
}

impl Default for WorkflowHarness {
    fn default() -> Self {
        Self::new()
    }
}
