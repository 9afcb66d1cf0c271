pub mod auth;

pub use auth::{Actor, MANAGE_APPOINTMENTS, MANAGE_OWN_APPOINTMENTS, RESET_APPOINTMENT_STATUS};
