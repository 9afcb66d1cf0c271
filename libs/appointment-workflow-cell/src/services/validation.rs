// libs/appointment-workflow-cell/src/services/validation.rs
use std::collections::HashSet;

use chrono::Utc;
use tracing::{debug, warn};

use crate::error::{WorkflowError, WorkflowResult};
use crate::models::{Appointment, AppointmentStatus};

/// Inspects a whole appointment and appends any violations to `errors`.
pub trait AppointmentValidator: Send + Sync {
    fn validate(&self, appointment: &Appointment, errors: &mut Vec<String>);
}

/// Inspects an appointment about to move to `target`.
pub trait StatusChangeValidator: Send + Sync {
    fn validate(&self, appointment: &Appointment, target: AppointmentStatus, errors: &mut Vec<String>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidatorSet {
    /// Runs on every create and update.
    General,
    /// Runs only when an existing appointment is modified.
    Edit,
}

/// Ordered validator sets. Every validator in a set runs; violations are reported together.
#[derive(Default)]
pub struct ValidationPipeline {
    general: Vec<Box<dyn AppointmentValidator>>,
    edit: Vec<Box<dyn AppointmentValidator>>,
    status_change: Vec<Box<dyn StatusChangeValidator>>,
}

impl ValidationPipeline {
    pub fn new(
        general: Vec<Box<dyn AppointmentValidator>>,
        edit: Vec<Box<dyn AppointmentValidator>>,
        status_change: Vec<Box<dyn StatusChangeValidator>>,
    ) -> Self {
        Self {
            general,
            edit,
            status_change,
        }
    }

    pub fn validate(&self, appointment: &Appointment, set: ValidatorSet) -> WorkflowResult<()> {
        let validators = match set {
            ValidatorSet::General => &self.general,
            ValidatorSet::Edit => &self.edit,
        };
        debug!(
            "Running {} {:?} validators for appointment {}",
            validators.len(),
            set,
            appointment.uuid
        );

        let mut errors = Vec::new();
        for validator in validators {
            validator.validate(appointment, &mut errors);
        }
        into_result(errors)
    }

    pub fn validate_status_change(
        &self,
        appointment: &Appointment,
        target: AppointmentStatus,
    ) -> WorkflowResult<()> {
        let mut errors = Vec::new();
        for validator in &self.status_change {
            validator.validate(appointment, target, &mut errors);
        }
        into_result(errors)
    }
}

fn into_result(errors: Vec<String>) -> WorkflowResult<()> {
    if errors.is_empty() {
        Ok(())
    } else {
        warn!("Validation failed with {} violation(s): {:?}", errors.len(), errors);
        Err(WorkflowError::Validation(errors))
    }
}

// ==============================================================================
// BUILT-IN VALIDATORS
// ==============================================================================

pub struct TimeRangeValidator;

impl AppointmentValidator for TimeRangeValidator {
    fn validate(&self, appointment: &Appointment, errors: &mut Vec<String>) {
        if appointment.start_date_time >= appointment.end_date_time {
            errors.push("Appointment start time must be before its end time".to_string());
        }
    }
}

pub struct PatientRequiredValidator;

impl AppointmentValidator for PatientRequiredValidator {
    fn validate(&self, appointment: &Appointment, errors: &mut Vec<String>) {
        if appointment.patient_uuid.is_none() {
            errors.push("Appointment must have a patient".to_string());
        }
    }
}

pub struct ServiceRequiredValidator;

impl AppointmentValidator for ServiceRequiredValidator {
    fn validate(&self, appointment: &Appointment, errors: &mut Vec<String>) {
        match &appointment.service {
            None => errors.push("Appointment must have a service".to_string()),
            Some(service) if service.voided => {
                errors.push(format!("Service {} is no longer offered", service.name))
            }
            Some(_) => {}
        }
    }
}

/// Each provider may appear at most once.
pub struct UniqueProviderValidator;

impl AppointmentValidator for UniqueProviderValidator {
    fn validate(&self, appointment: &Appointment, errors: &mut Vec<String>) {
        let mut seen = HashSet::new();
        let mut reported = HashSet::new();
        for provider in &appointment.providers {
            if !seen.insert(provider.provider_uuid) && reported.insert(provider.provider_uuid) {
                errors.push(format!(
                    "Provider {} is assigned more than once",
                    provider.provider_uuid
                ));
            }
        }
    }
}

pub struct VoidedAppointmentEditValidator;

impl AppointmentValidator for VoidedAppointmentEditValidator {
    fn validate(&self, appointment: &Appointment, errors: &mut Vec<String>) {
        if appointment.voided {
            errors.push("Voided appointments cannot be edited".to_string());
        }
    }
}

pub struct CheckInTimeValidator;

impl StatusChangeValidator for CheckInTimeValidator {
    fn validate(&self, appointment: &Appointment, target: AppointmentStatus, errors: &mut Vec<String>) {
        if target == AppointmentStatus::CheckedIn && Utc::now() < appointment.start_date_time {
            errors.push("Cannot check in before the appointment start time".to_string());
        }
    }
}

/// Terminal appointments only leave their status through a reset to `Scheduled`,
/// which the state machine guards separately.
pub struct TerminalStatusValidator;

impl StatusChangeValidator for TerminalStatusValidator {
    fn validate(&self, appointment: &Appointment, target: AppointmentStatus, errors: &mut Vec<String>) {
        if appointment.status.is_terminal()
            && appointment.status != target
            && target != AppointmentStatus::Scheduled
        {
            errors.push(format!(
                "Cannot change status of a {} appointment",
                appointment.status
            ));
        }
    }
}
