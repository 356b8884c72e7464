//! Environment-gated request logging with secret redaction.
//!
//! # Design
//! Everything goes through `tracing`; the `Logger` only decides *whether* to
//! emit and scrubs credentials first. In production the request trace is
//! silent and only failing responses are reported. The logger never changes
//! the outcome of a request.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

use crate::dispatcher::{AUTHORIZATION, LOGGED_IN_USER};

const REDACTED: &str = "[REDACTED]";

/// Deployment environment, which controls log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogMode {
    #[default]
    Development,
    Production,
}

impl LogMode {
    fn base_level(self) -> &'static str {
        match self {
            LogMode::Development => "info",
            LogMode::Production => "warn",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Logger {
    mode: LogMode,
    debug_enabled: bool,
}

impl Logger {
    /// `debug_enabled` is forced on in development.
    pub fn new(mode: LogMode, debug_enabled: bool) -> Self {
        Self {
            mode,
            debug_enabled: debug_enabled || mode == LogMode::Development,
        }
    }

    pub fn mode(&self) -> LogMode {
        self.mode
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug_enabled
    }

    pub fn debug(&self, message: &str) {
        if self.debug_enabled {
            tracing::debug!("{message}");
        }
    }

    pub fn api_request(&self, endpoint: &str, method: &str, headers: &[(String, String)]) {
        if self.mode == LogMode::Development {
            let headers = sanitize_headers(headers);
            tracing::info!(endpoint, method, headers = ?headers, "API request");
        }
    }

    pub fn api_response(&self, endpoint: &str, status: u16, status_text: &str) {
        match self.mode {
            LogMode::Development => {
                tracing::info!(endpoint, status, status_text, "API response");
            }
            LogMode::Production if status >= 400 => {
                tracing::error!(endpoint, status, status_text, "API error response");
            }
            LogMode::Production => {}
        }
    }

    /// Always emitted; carries no credentials.
    pub fn api_failure(&self, endpoint: &str, error: &dyn std::error::Error) {
        tracing::error!(endpoint, error = %error, "API error");
    }
}

/// Keep only the last four characters of a token.
pub fn mask_token(token: &str) -> String {
    let count = token.chars().count();
    if count <= 4 {
        return REDACTED.to_string();
    }
    let tail: String = token.chars().skip(count - 4).collect();
    format!("...{tail}")
}

/// Replace digits with `*` and keep at most four characters.
pub fn mask_user_id(user_id: &str) -> String {
    if user_id.is_empty() {
        return REDACTED.to_string();
    }
    let masked: String = user_id
        .chars()
        .map(|c| if c.is_ascii_digit() { '*' } else { c })
        .take(4)
        .collect();
    format!("{masked}...")
}

/// Copy of `headers` with credentials masked.
pub fn sanitize_headers(headers: &[(String, String)]) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if name.eq_ignore_ascii_case(AUTHORIZATION) {
                let token = value.strip_prefix("Bearer ").unwrap_or(value);
                format!("Bearer {}", mask_token(token))
            } else if name.eq_ignore_ascii_case(LOGGED_IN_USER) {
                mask_user_id(value)
            } else {
                value.clone()
            };
            (name.clone(), value)
        })
        .collect()
}

/// Filter used when `RUST_LOG` is unset: the mode's level, with this
/// crate's debug output let through when `logger` has debug enabled.
pub fn default_directive(logger: &Logger) -> String {
    let base = logger.mode.base_level();
    if logger.debug_enabled {
        format!("{base},{}=debug", env!("CARGO_CRATE_NAME"))
    } else {
        base.to_string()
    }
}

/// Install a process-wide fmt subscriber.
///
/// `RUST_LOG` takes precedence over `default_directive`. Fails if a global
/// subscriber is already set.
pub fn init_tracing(logger: &Logger) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(logger)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
}
