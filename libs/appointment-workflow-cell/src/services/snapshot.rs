// libs/appointment-workflow-cell/src/services/snapshot.rs
use crate::error::WorkflowResult;
use crate::models::Appointment;

/// Renders an appointment as audit notes.
pub trait SnapshotSerializer: Send + Sync {
    fn to_json_snapshot(&self, appointment: &Appointment) -> WorkflowResult<String>;
}

pub struct JsonSnapshotSerializer;

impl SnapshotSerializer for JsonSnapshotSerializer {
    fn to_json_snapshot(&self, appointment: &Appointment) -> WorkflowResult<String> {
        Ok(serde_json::to_string(appointment)?)
    }
}
