use thiserror::Error;

use crate::models::AppointmentStatus;

#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error("Privileges required: {0}")]
    Authorization(String),

    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflicting state: {0}")]
    ConflictState(String),

    #[error("Failed to serialize appointment snapshot: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Illegal status transition from {from} to {to}: {reason}")]
    IllegalTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
        reason: String,
    },

    #[error("Persistence error: {0}")]
    Store(#[source] anyhow::Error),

    #[error("Integration error: {0}")]
    Integration(#[source] anyhow::Error),
}

impl WorkflowError {
    /// Violation messages carried by a validation failure, empty for every other kind.
    pub fn violations(&self) -> &[String] {
        match self {
            WorkflowError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
