use std::time::Duration;

use thiserror::Error;

use crate::flows::gemini_types::validate_model_name;
use crate::i18n::Locale;

/// Application-level constants
pub const APP_NAME: &str = "SmartCare Hub";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default Gemini model used by every flow.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_MODEL_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TWILIO_BASE_URL: &str = "https://api.twilio.com";

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "smartcare=info,warn"
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required setting {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Remote completion service settings.
#[derive(Debug, Clone)]
pub struct CompletionConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Transport timeout. `None` leaves the request unbounded.
    pub timeout: Option<Duration>,
}

/// Transactional SMS provider settings.
#[derive(Debug, Clone)]
pub struct SmsConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub base_url: String,
    pub timeout: Option<Duration>,
}

/// Everything the flow core needs from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub completion: CompletionConfig,
    /// Absent when no SMS provider is configured; SOS dispatch is then unavailable.
    pub sms: Option<SmsConfig>,
    pub default_locale: Locale,
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let timeout = match get("SMARTCARE_HTTP_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::Invalid {
                    key: "SMARTCARE_HTTP_TIMEOUT_SECS",
                    reason: format!("'{raw}' is not a whole number of seconds"),
                })?;
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        let api_key = get("GEMINI_API_KEY").ok_or(ConfigError::Missing("GEMINI_API_KEY"))?;
        let model = get("SMARTCARE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());
        validate_model_name(&model).map_err(|e| ConfigError::Invalid {
            key: "SMARTCARE_MODEL",
            reason: e.to_string(),
        })?;
        let base_url = get("SMARTCARE_MODEL_BASE_URL")
            .unwrap_or_else(|| DEFAULT_MODEL_BASE_URL.to_string());

        let completion = CompletionConfig {
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        };

        let sms = match (
            get("TWILIO_ACCOUNT_SID"),
            get("TWILIO_AUTH_TOKEN"),
            get("TWILIO_PHONE_NUMBER"),
        ) {
            (Some(account_sid), Some(auth_token), Some(from_number)) => Some(SmsConfig {
                account_sid,
                auth_token,
                from_number,
                base_url: get("TWILIO_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_TWILIO_BASE_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
                timeout,
            }),
            (None, None, None) => None,
            (None, _, _) => return Err(ConfigError::Missing("TWILIO_ACCOUNT_SID")),
            (_, None, _) => return Err(ConfigError::Missing("TWILIO_AUTH_TOKEN")),
            (_, _, None) => return Err(ConfigError::Missing("TWILIO_PHONE_NUMBER")),
        };

        let default_locale = match get("SMARTCARE_DEFAULT_LANGUAGE") {
            Some(tag) => Locale::parse(&tag).ok_or_else(|| ConfigError::Invalid {
                key: "SMARTCARE_DEFAULT_LANGUAGE",
                reason: format!("unsupported language '{tag}'"),
            })?,
            None => Locale::English,
        };

        Ok(Self {
            completion,
            sms,
            default_locale,
        })
    }
}
