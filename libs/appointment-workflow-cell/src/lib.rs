// libs/appointment-workflow-cell/src/lib.rs
//! # Appointment Workflow Cell
//!
//! The workflow engine behind clinical appointments: who is seeing whom, when,
//! and how an appointment is allowed to move through its lifecycle.
//!
//! ## Components
//!
//! - **Audit Trail Writer**: append-only status-change records per appointment
//! - **Conflict Detector Registry**: pluggable double-booking style checks over a batch
//! - **Validation Pipeline**: ordered validator sets that report every violation at once
//! - **Status State Machine**: transition legality and the privileges each transition needs
//! - **Provider Response Coordinator**: accept/decline handling with first-accept promotion
//! - **Reschedule Orchestrator**: cancel the original, create the replacement, keep lineage
//! - **Appointment Workflow Service**: the facade composing all of the above
//!
//! Persistence, notification delivery, teleconsultation links and appointment
//! numbering are collaborators injected through the traits in [`store`] and
//! [`services`]. The acting identity is always passed explicitly as a
//! [`shared_models::Actor`].

pub mod error;
pub mod models;
pub mod services;
pub mod store;
pub mod test_utils;

pub use error::*;
pub use models::*;
pub use services::*;
pub use store::{in_transaction, AppointmentStore, AuditStore};
