// libs/appointment-workflow-cell/src/services/numbering.rs
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use async_trait::async_trait;

use crate::models::Appointment;

#[async_trait]
pub trait AppointmentNumberGenerator: Send + Sync {
    /// Give the appointment a number unless it already has one.
    async fn assign_number_if_absent(&self, appointment: &mut Appointment) -> Result<()>;
}

/// Process-local `<prefix>-<n>` numbering.
pub struct SequentialNumberGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialNumberGenerator {
    pub fn new(prefix: &str) -> Self {
        Self::starting_at(prefix, 1)
    }

    pub fn starting_at(prefix: &str, first: u64) -> Self {
        Self {
            prefix: prefix.to_string(),
            next: AtomicU64::new(first),
        }
    }
}

#[async_trait]
impl AppointmentNumberGenerator for SequentialNumberGenerator {
    async fn assign_number_if_absent(&self, appointment: &mut Appointment) -> Result<()> {
        if appointment.appointment_number.is_none() {
            let n = self.next.fetch_add(1, Ordering::SeqCst);
            appointment.appointment_number = Some(format!("{}-{:05}", self.prefix, n));
        }
        Ok(())
    }
}
