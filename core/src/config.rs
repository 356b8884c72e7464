//! Client configuration.
//!
//! Read from the environment by default. `from_lookup` takes any key lookup
//! so tests never touch process-wide state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::endpoints::Endpoints;
use crate::error::ApiError;
use crate::logging::{LogMode, Logger};

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/";

pub const ENV_BASE_URL: &str = "TUTOR_API_BASE_URL";
pub const ENV_MODE: &str = "TUTOR_ENV";
pub const ENV_DEBUG: &str = "DEBUG";
pub const ENV_TIMEOUT_SECS: &str = "TUTOR_REQUEST_TIMEOUT_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub base_url: String,
    pub log_mode: LogMode,
    pub debug_enabled: bool,
    #[serde(with = "optional_secs")]
    pub request_timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            log_mode: LogMode::default(),
            debug_enabled: false,
            request_timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let base_url = lookup(ENV_BASE_URL)
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.base_url);
        let log_mode = match lookup(ENV_MODE).as_deref().map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("production") => LogMode::Production,
            _ => LogMode::Development,
        };
        let debug_enabled = lookup(ENV_DEBUG).is_some_and(|v| v.trim() == "true");
        let request_timeout = lookup(ENV_TIMEOUT_SECS).and_then(|v| match v.trim().parse::<u64>() {
            Ok(0) => None,
            Ok(secs) => Some(Duration::from_secs(secs)),
            Err(e) => {
                tracing::warn!(value = %v, error = %e, "ignoring invalid {ENV_TIMEOUT_SECS}");
                None
            }
        });

        Self {
            base_url,
            log_mode,
            debug_enabled,
            request_timeout,
        }
    }

    pub fn logger(&self) -> Logger {
        Logger::new(self.log_mode, self.debug_enabled)
    }

    pub fn endpoints(&self) -> Result<Endpoints, ApiError> {
        Endpoints::new(&self.base_url)
    }
}

mod optional_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs))
    }
}
