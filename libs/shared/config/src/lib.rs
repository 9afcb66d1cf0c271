use std::env;
use tracing::warn;

pub const DEFAULT_TELECONSULTATION_BASE_URL: &str = "https://teleconsultation.local";
pub const DEFAULT_NUMBER_PREFIX: &str = "APT";

#[derive(Debug, Clone)]
pub struct AppointmentsConfig {
    /// Reuse the original appointment number when rescheduling. Off unless explicitly enabled.
    pub retain_number_on_reschedule: bool,
    pub teleconsultation_base_url: String,
    pub number_prefix: String,
    pub notify_on_save: bool,
}

impl Default for AppointmentsConfig {
    fn default() -> Self {
        Self {
            retain_number_on_reschedule: false,
            teleconsultation_base_url: DEFAULT_TELECONSULTATION_BASE_URL.to_string(),
            number_prefix: DEFAULT_NUMBER_PREFIX.to_string(),
            notify_on_save: true,
        }
    }
}

impl AppointmentsConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            retain_number_on_reschedule: env_flag(
                "APPOINTMENTS_RETAIN_NUMBER_ON_RESCHEDULE",
                defaults.retain_number_on_reschedule,
            ),
            teleconsultation_base_url: env::var("APPOINTMENTS_TELECONSULTATION_BASE_URL")
                .unwrap_or_else(|_| {
                    warn!("APPOINTMENTS_TELECONSULTATION_BASE_URL not set, using default");
                    defaults.teleconsultation_base_url
                }),
            number_prefix: env::var("APPOINTMENTS_NUMBER_PREFIX")
                .unwrap_or_else(|_| {
                    warn!("APPOINTMENTS_NUMBER_PREFIX not set, using default");
                    defaults.number_prefix
                }),
            notify_on_save: env_flag("APPOINTMENTS_NOTIFY_ON_SAVE", defaults.notify_on_save),
        }
    }

    pub fn is_teleconsultation_configured(&self) -> bool {
        !self.teleconsultation_base_url.trim().is_empty()
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    match env::var(name) {
        Ok(value) => parse_flag(&value).unwrap_or_else(|| {
            warn!("{} has unrecognised value {:?}, using default {}", name, value, default);
            default
        }),
        Err(_) => {
            warn!("{} not set, using default {}", name, default);
            default
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
