// libs/appointment-workflow-cell/src/store.rs
//! Persistence contracts. Storage, querying and transaction isolation live behind
//! these traits; the workflow never locks rows itself, so two concurrent status
//! changes on the same appointment are exactly as safe as the backing store's
//! isolation level makes them.

use std::future::Future;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::error;
use uuid::Uuid;

use crate::error::WorkflowError;
use crate::models::{Appointment, AppointmentAudit, AppointmentSearchRequest, AppointmentStatus};

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn save(&self, appointment: &Appointment) -> Result<()>;

    async fn get_by_uuid(&self, uuid: Uuid) -> Result<Option<Appointment>>;

    /// Appointments sharing the populated fields of `example`.
    async fn search_by_example(&self, example: &Appointment) -> Result<Vec<Appointment>>;

    async fn search(&self, request: &AppointmentSearchRequest) -> Result<Vec<Appointment>>;

    async fn get_all_for_date(&self, date: NaiveDate) -> Result<Vec<Appointment>>;

    /// Appointments overlapping the `[start, end)` window.
    async fn get_all_in_range(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Appointment>>;

    async fn get_future_for_service(&self, service_uuid: Uuid) -> Result<Vec<Appointment>>;

    async fn get_future_for_service_type(&self, service_type_uuid: Uuid) -> Result<Vec<Appointment>>;

    async fn get_for_service(
        &self,
        service_uuid: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        statuses: &[AppointmentStatus],
    ) -> Result<Vec<Appointment>>;

    async fn begin(&self) -> Result<()> {
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn save_audit(&self, audit: &AppointmentAudit) -> Result<()>;

    /// Audit records for an appointment, oldest first.
    async fn audits_for(&self, appointment_uuid: Uuid) -> Result<Vec<AppointmentAudit>>;

    /// Most recent record whose status differs from the appointment's current status.
    async fn prior_status_change(&self, appointment: &Appointment) -> Result<Option<AppointmentAudit>> {
        let audits = self.audits_for(appointment.uuid).await?;
        Ok(audits
            .into_iter()
            .rev()
            .find(|audit| audit.status != appointment.status))
    }
}

/// Run `work` inside one store transaction: commit on success, roll back on error.
pub async fn in_transaction<T, F>(store: &dyn AppointmentStore, work: F) -> Result<T, WorkflowError>
where
    F: Future<Output = Result<T, WorkflowError>>,
{
    store.begin().await.map_err(WorkflowError::Store)?;

    match work.await {
        Ok(value) => {
            store.commit().await.map_err(WorkflowError::Store)?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = store.rollback().await {
                error!("Rollback failed after {}: {}", err, rollback_err);
            }
            Err(err)
        }
    }
}
