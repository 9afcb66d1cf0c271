// libs/appointment-workflow-cell/src/models.rs
use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub uuid: Uuid,
    pub appointment_number: Option<String>,
    pub patient_uuid: Option<Uuid>,
    pub service: Option<ServiceRef>,
    pub service_type: Option<ServiceRef>,
    pub providers: Vec<AppointmentProvider>,
    pub location_uuid: Option<Uuid>,
    pub start_date_time: DateTime<Utc>,
    pub end_date_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub appointment_kind: AppointmentKind,
    pub teleconsultation: bool,
    pub tele_health_video_link: Option<String>,
    pub email_sent: bool,
    pub comments: Option<String>,
    pub voided: bool,
    #[serde(default)]
    pub provenance: Provenance,
    /// Loaded view of the audit trail. Never part of a snapshot.
    #[serde(default, skip_serializing)]
    pub audits: Vec<AppointmentAudit>,
}

impl Appointment {
    pub fn new(
        patient_uuid: Uuid,
        start_date_time: DateTime<Utc>,
        end_date_time: DateTime<Utc>,
    ) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            appointment_number: None,
            patient_uuid: Some(patient_uuid),
            service: None,
            service_type: None,
            providers: Vec::new(),
            location_uuid: None,
            start_date_time,
            end_date_time,
            status: AppointmentStatus::Scheduled,
            appointment_kind: AppointmentKind::Scheduled,
            teleconsultation: false,
            tele_health_video_link: None,
            email_sent: false,
            comments: None,
            voided: false,
            provenance: Provenance::default(),
            audits: Vec::new(),
        }
    }

    /// Assign a provider, replacing the response of an existing entry for the same provider.
    pub fn add_provider(&mut self, provider: AppointmentProvider) {
        match self
            .providers
            .iter_mut()
            .find(|existing| existing.provider_uuid == provider.provider_uuid)
        {
            Some(existing) => existing.response = provider.response,
            None => self.providers.push(provider),
        }
    }

    pub fn provider(&self, provider_uuid: Uuid) -> Option<&AppointmentProvider> {
        self.providers.iter().find(|p| p.provider_uuid == provider_uuid)
    }

    pub fn providers_with_response(&self, response: ProviderResponse) -> Vec<&AppointmentProvider> {
        self.providers.iter().filter(|p| p.response == response).collect()
    }

    /// No provider is currently awaiting or has accepted the appointment.
    pub fn is_unassigned(&self) -> bool {
        self.providers_with_response(ProviderResponse::Accepted).is_empty()
            && self.providers_with_response(ProviderResponse::Awaiting).is_empty()
    }

    pub fn has_provider_person(&self, person_uuid: Uuid) -> bool {
        self.providers.iter().any(|p| p.person_uuid == person_uuid)
    }

    pub fn is_service_or_service_type_voided(&self) -> bool {
        self.service.as_ref().is_some_and(|s| s.voided)
            || self.service_type.as_ref().is_some_and(|s| s.voided)
    }

    /// Included in "active" query results.
    pub fn is_active(&self) -> bool {
        !self.voided && !self.is_service_or_service_type_voided()
    }

    pub fn overlaps(&self, other: &Appointment) -> bool {
        self.start_date_time < other.end_date_time && other.start_date_time < self.end_date_time
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end_date_time - self.start_date_time).num_minutes()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Provenance {
    pub creator: Option<Uuid>,
    pub date_created: Option<DateTime<Utc>>,
    pub changed_by: Option<Uuid>,
    pub date_changed: Option<DateTime<Utc>>,
}

impl Provenance {
    pub fn is_new(&self) -> bool {
        self.date_created.is_none()
    }

    pub fn stamp(&mut self, actor_user: Uuid, at: DateTime<Utc>) {
        if self.is_new() {
            self.creator = Some(actor_user);
            self.date_created = Some(at);
        } else {
            self.changed_by = Some(actor_user);
            self.date_changed = Some(at);
        }
    }
}

/// Reference to a service or service type definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceRef {
    pub uuid: Uuid,
    pub name: String,
    pub voided: bool,
}

impl ServiceRef {
    pub fn new(name: &str) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            name: name.to_string(),
            voided: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AppointmentStatus {
    Requested,
    Scheduled,
    CheckedIn,
    Missed,
    Cancelled,
    Completed,
    CheckedOut,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 7] = [
        AppointmentStatus::Requested,
        AppointmentStatus::Scheduled,
        AppointmentStatus::CheckedIn,
        AppointmentStatus::Missed,
        AppointmentStatus::Cancelled,
        AppointmentStatus::Completed,
        AppointmentStatus::CheckedOut,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed
                | AppointmentStatus::Cancelled
                | AppointmentStatus::Missed
                | AppointmentStatus::CheckedOut
        )
    }

    /// Whether an appointment in this status still holds its time slot.
    pub fn occupies_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Missed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Requested => write!(f, "Requested"),
            AppointmentStatus::Scheduled => write!(f, "Scheduled"),
            AppointmentStatus::CheckedIn => write!(f, "CheckedIn"),
            AppointmentStatus::Missed => write!(f, "Missed"),
            AppointmentStatus::Cancelled => write!(f, "Cancelled"),
            AppointmentStatus::Completed => write!(f, "Completed"),
            AppointmentStatus::CheckedOut => write!(f, "CheckedOut"),
        }
    }
}

impl std::str::FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        AppointmentStatus::ALL
            .into_iter()
            .find(|status| status.to_string() == value)
            .ok_or_else(|| format!("Unknown appointment status: {}", value))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AppointmentKind {
    Scheduled,
    WalkIn,
    Virtual,
}

// ==============================================================================
// PROVIDER MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentProvider {
    pub provider_uuid: Uuid,
    /// The natural person acting as this provider.
    pub person_uuid: Uuid,
    pub response: ProviderResponse,
}

impl AppointmentProvider {
    pub fn awaiting(provider_uuid: Uuid, person_uuid: Uuid) -> Self {
        Self {
            provider_uuid,
            person_uuid,
            response: ProviderResponse::Awaiting,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderResponse {
    Awaiting,
    Accepted,
    Declined,
    Cancelled,
}

impl fmt::Display for ProviderResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderResponse::Awaiting => write!(f, "AWAITING"),
            ProviderResponse::Accepted => write!(f, "ACCEPTED"),
            ProviderResponse::Declined => write!(f, "DECLINED"),
            ProviderResponse::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

/// A provider answering an assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponseUpdate {
    pub provider_uuid: Uuid,
    pub response: ProviderResponse,
}

// ==============================================================================
// AUDIT MODELS
// ==============================================================================

/// Immutable record of an appointment's status at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppointmentAudit {
    pub uuid: Uuid,
    pub appointment_uuid: Uuid,
    pub status: AppointmentStatus,
    pub notes: Option<String>,
    pub actor_person: Uuid,
    pub date_created: DateTime<Utc>,
}

// ==============================================================================
// CONFLICT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ConflictKind {
    PatientDoubleBooking,
    ProviderDoubleBooking,
    Custom(String),
}

impl fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConflictKind::PatientDoubleBooking => write!(f, "PATIENT_DOUBLE_BOOKING"),
            ConflictKind::ProviderDoubleBooking => write!(f, "PROVIDER_DOUBLE_BOOKING"),
            ConflictKind::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// Conflicting appointments grouped by the rule that flagged them. Kinds with no hits are absent.
pub type AppointmentConflicts = HashMap<ConflictKind, Vec<Appointment>>;

// ==============================================================================
// SEARCH MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentSearchRequest {
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub patient_uuid: Option<Uuid>,
    pub provider_uuid: Option<Uuid>,
    pub location_uuid: Option<Uuid>,
    #[serde(default)]
    pub statuses: Vec<AppointmentStatus>,
    pub limit: Option<usize>,
}

impl AppointmentSearchRequest {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        if let Some(start) = self.start_date {
            if appointment.start_date_time < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if appointment.end_date_time > end {
                return false;
            }
        }
        if let Some(patient) = self.patient_uuid {
            if appointment.patient_uuid != Some(patient) {
                return false;
            }
        }
        if let Some(provider) = self.provider_uuid {
            if appointment.provider(provider).is_none() {
                return false;
            }
        }
        if let Some(location) = self.location_uuid {
            if appointment.location_uuid != Some(location) {
                return false;
            }
        }
        self.statuses.is_empty() || self.statuses.contains(&appointment.status)
    }
}

// ==============================================================================
// NOTIFICATION MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationResult {
    pub uuid: Option<Uuid>,
    pub medium: String,
    pub status: i32,
    pub message: String,
}

impl NotificationResult {
    pub const SUCCESS_STATUS: i32 = 0;

    pub fn success(medium: &str) -> Self {
        Self {
            uuid: None,
            medium: medium.to_string(),
            status: Self::SUCCESS_STATUS,
            message: "sent".to_string(),
        }
    }

    pub fn failure(medium: &str, status: i32, message: &str) -> Self {
        Self {
            uuid: None,
            medium: medium.to_string(),
            status,
            message: message.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Self::SUCCESS_STATUS
    }
}
