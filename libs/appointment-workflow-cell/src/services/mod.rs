pub mod access;
pub mod audit;
pub mod booking;
pub mod conflict;
pub mod lifecycle;
pub mod notification;
pub mod numbering;
pub mod provider_response;
pub mod reschedule;
pub mod snapshot;
pub mod telemedicine;
pub mod validation;
pub mod workflow;

pub use access::*;
pub use audit::*;
pub use booking::*;
pub use conflict::*;
pub use lifecycle::*;
pub use notification::*;
pub use numbering::*;
pub use provider_response::*;
pub use reschedule::*;
pub use snapshot::*;
pub use telemedicine::*;
pub use validation::*;
pub use workflow::*;
