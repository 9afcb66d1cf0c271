// libs/appointment-workflow-cell/src/services/notification.rs
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use crate::models::{Appointment, NotificationResult};

/// Delivers appointment notifications over every configured channel.
#[async_trait]
pub trait AppointmentNotifier: Send + Sync {
    async fn notify_all(&self, appointment: &Appointment) -> Vec<NotificationResult>;
}

/// Best-effort dispatch. A failed channel is logged and never fails the caller.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifier: Arc<dyn AppointmentNotifier>,
}

impl NotificationDispatcher {
    pub fn new(notifier: Arc<dyn AppointmentNotifier>) -> Self {
        Self { notifier }
    }

    /// Notify teleconsultation appointments. Marks the appointment as sent when at
    /// least one channel succeeded and returns whether the flag changed.
    pub async fn dispatch(&self, appointment: &mut Appointment) -> bool {
        if !appointment.teleconsultation {
            return false;
        }

        let results = self.notifier.notify_all(appointment).await;

        for failed in results.iter().filter(|r| !r.is_success()) {
            error!(
                "Could not send notification for medium: {}, uuid: {}, status: {}, errMsg: {}",
                failed.medium, appointment.uuid, failed.status, failed.message
            );
        }

        let delivered = results.iter().any(NotificationResult::is_success);
        if delivered && !appointment.email_sent {
            appointment.email_sent = true;
            info!("Notification delivered for appointment {}", appointment.uuid);
            return true;
        }
        false
    }
}
