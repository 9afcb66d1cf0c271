// libs/appointment-workflow-cell/src/services/workflow.rs
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppointmentsConfig;
use shared_models::Actor;

use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{
    Appointment, AppointmentConflicts, AppointmentSearchRequest, AppointmentStatus, ProviderResponseUpdate,
};
use crate::services::access::ensure_self_or_all_access;
use crate::services::audit::AuditTrailWriter;
use crate::services::booking::AppointmentBookingService;
use crate::services::conflict::{
    ConflictDetector, ConflictDetectorRegistry, PatientDoubleBookingDetector, ProviderDoubleBookingDetector,
};
use crate::services::lifecycle::{StatusStateMachine, StatusTransitionService, TransitionRule};
use crate::services::notification::{AppointmentNotifier, NotificationDispatcher};
use crate::services::numbering::AppointmentNumberGenerator;
use crate::services::provider_response::ProviderResponseCoordinator;
use crate::services::reschedule::RescheduleOrchestrator;
use crate::services::snapshot::SnapshotSerializer;
use crate::services::telemedicine::TeleconsultationLinkGenerator;
use crate::services::validation::{
    AppointmentValidator, CheckInTimeValidator, PatientRequiredValidator, ServiceRequiredValidator,
    StatusChangeValidator, TerminalStatusValidator, TimeRangeValidator, UniqueProviderValidator, ValidationPipeline,
    ValidatorSet, VoidedAppointmentEditValidator,
};
use crate::store::{in_transaction, AppointmentStore, AuditStore};

// ==============================================================================
// COMPOSITION
// ==============================================================================

/// External collaborators the workflow depends on.
#[derive(Clone)]
pub struct WorkflowCollaborators {
    pub store: Arc<dyn AppointmentStore>,
    pub audits: Arc<dyn AuditStore>,
    pub notifier: Arc<dyn AppointmentNotifier>,
    pub link_generator: Arc<dyn TeleconsultationLinkGenerator>,
    pub numbering: Arc<dyn AppointmentNumberGenerator>,
    pub serializer: Arc<dyn SnapshotSerializer>,
}

/// Ordered, pluggable rule sets. Registration order is evaluation order.
#[derive(Default)]
pub struct WorkflowRegistry {
    pub validators: Vec<Box<dyn AppointmentValidator>>,
    pub edit_validators: Vec<Box<dyn AppointmentValidator>>,
    pub status_change_validators: Vec<Box<dyn StatusChangeValidator>>,
    pub conflict_detectors: Vec<Arc<dyn ConflictDetector>>,
    pub transition_rules: Vec<Box<dyn TransitionRule>>,
}

impl WorkflowRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in validators and double-booking detectors.
    pub fn standard(store: Arc<dyn AppointmentStore>) -> Self {
        Self {
            validators: vec![
                Box::new(PatientRequiredValidator),
                Box::new(ServiceRequiredValidator),
                Box::new(TimeRangeValidator),
                Box::new(UniqueProviderValidator),
            ],
            edit_validators: vec![Box::new(VoidedAppointmentEditValidator)],
            status_change_validators: vec![
                Box::new(TerminalStatusValidator),
                Box::new(CheckInTimeValidator),
            ],
            conflict_detectors: vec![
                Arc::new(PatientDoubleBookingDetector::new(Arc::clone(&store))),
                Arc::new(ProviderDoubleBookingDetector::new(store)),
            ],
            transition_rules: Vec::new(),
        }
    }

    pub fn with_validator(mut self, validator: Box<dyn AppointmentValidator>) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn with_edit_validator(mut self, validator: Box<dyn AppointmentValidator>) -> Self {
        self.edit_validators.push(validator);
        self
    }

    pub fn with_status_change_validator(mut self, validator: Box<dyn StatusChangeValidator>) -> Self {
        self.status_change_validators.push(validator);
        self
    }

    pub fn with_conflict_detector(mut self, detector: Arc<dyn ConflictDetector>) -> Self {
        self.conflict_detectors.push(detector);
        self
    }

    pub fn with_transition_rule(mut self, rule: Box<dyn TransitionRule>) -> Self {
        self.transition_rules.push(rule);
        self
    }
}

// ==============================================================================
// FACADE
// ==============================================================================

/// Public entry point. Every mutating operation runs in one store transaction and
/// leaves the caller's appointment untouched when it fails.
pub struct AppointmentWorkflowService {
    store: Arc<dyn AppointmentStore>,
    audit: AuditTrailWriter,
    validation: Arc<ValidationPipeline>,
    transitions: Arc<StatusTransitionService>,
    booking: Arc<AppointmentBookingService>,
    responses: ProviderResponseCoordinator,
    rescheduler: RescheduleOrchestrator,
    conflicts: ConflictDetectorRegistry,
}

impl AppointmentWorkflowService {
    pub fn new(
        collaborators: WorkflowCollaborators,
        registry: WorkflowRegistry,
        config: &AppointmentsConfig,
    ) -> Self {
        let WorkflowCollaborators {
            store,
            audits,
            notifier,
            link_generator,
            numbering,
            serializer,
        } = collaborators;

        if !config.is_teleconsultation_configured() {
            warn!("Teleconsultation base URL is empty, generated video links will be relative");
        }

        let audit = AuditTrailWriter::new(audits);
        let validation = Arc::new(ValidationPipeline::new(
            registry.validators,
            registry.edit_validators,
            registry.status_change_validators,
        ));
        let transitions = Arc::new(StatusTransitionService::new(
            Arc::clone(&store),
            audit.clone(),
            Arc::clone(&validation),
            StatusStateMachine::new(registry.transition_rules),
        ));
        let booking = Arc::new(AppointmentBookingService::new(
            Arc::clone(&store),
            audit.clone(),
            Arc::clone(&validation),
            numbering,
            link_generator,
            Arc::clone(&serializer),
            NotificationDispatcher::new(notifier),
            config.notify_on_save,
        ));
        let responses =
            ProviderResponseCoordinator::new(Arc::clone(&store), audit.clone(), Arc::clone(&transitions));
        let rescheduler = RescheduleOrchestrator::new(
            Arc::clone(&store),
            audit.clone(),
            serializer,
            Arc::clone(&transitions),
            Arc::clone(&booking),
            config.retain_number_on_reschedule,
        );

        Self {
            store,
            audit,
            validation,
            transitions,
            booking,
            responses,
            rescheduler,
            conflicts: ConflictDetectorRegistry::new(registry.conflict_detectors),
        }
    }

    pub fn state_machine(&self) -> &StatusStateMachine {
        self.transitions.machine()
    }

    /// Statuses `actor` may move `appointment` to, or nothing without access to it.
    pub fn allowed_transitions(&self, appointment: &Appointment, actor: &Actor) -> Vec<AppointmentStatus> {
        if ensure_self_or_all_access(appointment, actor).is_err() {
            return Vec::new();
        }
        self.state_machine().allowed_targets(appointment.status, actor)
    }

    /// Validate, number, link, audit, save and notify.
    pub async fn create_or_update(&self, appointment: Appointment, actor: &Actor) -> WorkflowResult<Appointment> {
        in_transaction(self.store.as_ref(), self.booking.validate_and_save(appointment, actor)).await
    }

    /// Access check plus one validator set, with no side effects.
    pub fn validate(&self, appointment: &Appointment, set: ValidatorSet, actor: &Actor) -> WorkflowResult<()> {
        ensure_self_or_all_access(appointment, actor)?;
        self.validation.validate(appointment, set)
    }

    pub async fn change_status(
        &self,
        appointment: &mut Appointment,
        target: AppointmentStatus,
        on_date: Option<DateTime<Utc>>,
        actor: &Actor,
    ) -> WorkflowResult<()> {
        let mut working = appointment.clone();
        in_transaction(
            self.store.as_ref(),
            self.transitions.change_status(&mut working, target, on_date, actor),
        )
        .await?;
        *appointment = working;
        Ok(())
    }

    pub async fn undo_status_change(&self, appointment: &mut Appointment, actor: &Actor) -> WorkflowResult<()> {
        let mut working = appointment.clone();
        in_transaction(
            self.store.as_ref(),
            self.transitions.undo_status_change(&mut working, actor),
        )
        .await?;
        *appointment = working;
        Ok(())
    }

    pub async fn record_provider_response(
        &self,
        appointment: &mut Appointment,
        update: &ProviderResponseUpdate,
        actor: &Actor,
    ) -> WorkflowResult<()> {
        let mut working = appointment.clone();
        in_transaction(
            self.store.as_ref(),
            self.responses.record_response(&mut working, update, actor),
        )
        .await?;
        *appointment = working;
        Ok(())
    }

    /// Not atomic and not idempotent: see [`RescheduleOrchestrator`].
    pub async fn reschedule(
        &self,
        original_uuid: Uuid,
        draft: Appointment,
        retain_number: bool,
        actor: &Actor,
    ) -> WorkflowResult<Appointment> {
        self.rescheduler
            .reschedule(original_uuid, draft, retain_number, actor)
            .await
    }

    /// Conflicts for a single appointment, without the upcoming/voided filter.
    pub async fn appointment_conflicts(&self, appointment: &Appointment) -> WorkflowResult<AppointmentConflicts> {
        self.conflicts.detect(std::slice::from_ref(appointment)).await
    }

    pub async fn appointments_conflicts(&self, appointments: Vec<Appointment>) -> WorkflowResult<AppointmentConflicts> {
        self.conflicts.detect_upcoming(appointments).await
    }

    // ==============================================================================
    // QUERIES
    // ==============================================================================

    pub async fn get_appointment(&self, uuid: Uuid) -> WorkflowResult<Option<Appointment>> {
        self.store.get_by_uuid(uuid).await.map_err(WorkflowError::Store)
    }

    pub async fn get_appointment_or_fail(&self, uuid: Uuid) -> WorkflowResult<Appointment> {
        self.get_appointment(uuid)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(format!("Appointment {} does not exist", uuid)))
    }

    pub async fn audit_trail(&self, appointment_uuid: Uuid) -> WorkflowResult<Vec<crate::models::AppointmentAudit>> {
        self.audit.trail(appointment_uuid).await
    }

    pub async fn appointments_for_date(&self, date: NaiveDate) -> WorkflowResult<Vec<Appointment>> {
        let appointments = self
            .store
            .get_all_for_date(date)
            .await
            .map_err(WorkflowError::Store)?;
        Ok(active_only(appointments))
    }

    pub async fn appointments_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> WorkflowResult<Vec<Appointment>> {
        let appointments = self
            .store
            .get_all_in_range(start, end)
            .await
            .map_err(WorkflowError::Store)?;
        Ok(active_only(appointments))
    }

    pub async fn search_by_example(&self, example: &Appointment) -> WorkflowResult<Vec<Appointment>> {
        let appointments = self
            .store
            .search_by_example(example)
            .await
            .map_err(WorkflowError::Store)?;
        Ok(active_only(appointments))
    }

    /// Structured search. A request without a start date matches nothing.
    pub async fn search(&self, request: &AppointmentSearchRequest) -> WorkflowResult<Vec<Appointment>> {
        if request.start_date.is_none() {
            debug!("Search request without start date, returning no appointments");
            return Ok(Vec::new());
        }
        self.store.search(request).await.map_err(WorkflowError::Store)
    }

    pub async fn future_appointments_for_service(&self, service_uuid: Uuid) -> WorkflowResult<Vec<Appointment>> {
        self.store
            .get_future_for_service(service_uuid)
            .await
            .map_err(WorkflowError::Store)
    }

    pub async fn future_appointments_for_service_type(
        &self,
        service_type_uuid: Uuid,
    ) -> WorkflowResult<Vec<Appointment>> {
        self.store
            .get_future_for_service_type(service_type_uuid)
            .await
            .map_err(WorkflowError::Store)
    }

    pub async fn appointments_for_service(
        &self,
        service_uuid: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        statuses: &[AppointmentStatus],
    ) -> WorkflowResult<Vec<Appointment>> {
        let appointments = self
            .store
            .get_for_service(service_uuid, start, end, statuses)
            .await
            .map_err(WorkflowError::Store)?;
        info!(
            "{} appointments for service {} between {} and {}",
            appointments.len(),
            service_uuid,
            start,
            end
        );
        Ok(appointments)
    }
}

fn active_only(appointments: Vec<Appointment>) -> Vec<Appointment> {
    appointments.into_iter().filter(Appointment::is_active).collect()
}
