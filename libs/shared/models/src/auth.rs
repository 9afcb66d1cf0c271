use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Full access to every appointment in the facility.
pub const MANAGE_APPOINTMENTS: &str = "Manage Appointments";
/// Access restricted to appointments the actor is assigned to.
pub const MANAGE_OWN_APPOINTMENTS: &str = "Manage Own Appointments";
/// Allows moving an already processed appointment back to `Scheduled`.
pub const RESET_APPOINTMENT_STATUS: &str = "Reset Appointment Status";

/// The identity performing a workflow operation, passed explicitly into every call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    /// The natural person behind the user account; compared against provider persons.
    pub person_id: Uuid,
    pub display_name: Option<String>,
    pub privileges: HashSet<String>,
}

impl Actor {
    pub fn new(person_id: Uuid) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            person_id,
            display_name: None,
            privileges: HashSet::new(),
        }
    }

    pub fn with_privilege(mut self, privilege: &str) -> Self {
        self.privileges.insert(privilege.to_string());
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.display_name = Some(name.to_string());
        self
    }

    pub fn has_privilege(&self, privilege: &str) -> bool {
        self.privileges.contains(privilege)
    }

    pub fn is_same_person(&self, person_id: Uuid) -> bool {
        self.person_id == person_id
    }
}
