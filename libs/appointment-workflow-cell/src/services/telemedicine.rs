// libs/appointment-workflow-cell/src/services/telemedicine.rs
use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::models::{Appointment, AppointmentKind};

/// Produces the opaque link patients and providers use to join a teleconsultation.
#[async_trait]
pub trait TeleconsultationLinkGenerator: Send + Sync {
    async fn generate_link(&self, appointment: &Appointment) -> Result<String>;
}

/// Room-per-appointment links under a fixed base URL.
pub struct RoomLinkGenerator {
    base_url: String,
}

impl RoomLinkGenerator {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl TeleconsultationLinkGenerator for RoomLinkGenerator {
    async fn generate_link(&self, appointment: &Appointment) -> Result<String> {
        debug!("Generating teleconsultation link for appointment {}", appointment.uuid);

        let mut link = format!("{}/room/{}", self.base_url, appointment.uuid);
        if appointment.appointment_kind == AppointmentKind::Virtual {
            link.push_str(&format!("?duration={}", appointment.duration_minutes()));
        }

        info!("Teleconsultation link generated for appointment {}", appointment.uuid);
        Ok(link)
    }
}
