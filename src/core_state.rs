//! Shared application state.
//!
//! `CoreState` owns the flow engine and the optional SMS gateway. It is
//! built once from `AppConfig` and shared behind an `Arc` by whatever
//! transport serves the app.

use std::sync::Arc;

use thiserror::Error;

use crate::config::{self, AppConfig, ConfigError};
use crate::flows::{FlowEngine, FlowError};
use crate::i18n::{LanguageConfig, Locale};
use crate::sos::{dispatch_sos, SmsError, SmsGateway, SosAlert, SosDispatchResult, TwilioGateway};

#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Could not create model client: {0}")]
    Completion(#[from] FlowError),

    #[error("Could not create SMS gateway: {0}")]
    Sms(#[from] SmsError),
}

pub struct CoreState {
    flows: FlowEngine,
    sms: Option<Arc<dyn SmsGateway>>,
    default_locale: Locale,
}

impl CoreState {
    pub fn new(flows: FlowEngine, default_locale: Locale) -> Self {
        Self {
            flows,
            sms: None,
            default_locale,
        }
    }

    /// Build the production state: Gemini client, plus Twilio when configured.
    pub fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        let flows = FlowEngine::from_config(&config.completion)?;
        let mut state = Self::new(flows, config.default_locale);
        if let Some(sms) = &config.sms {
            state.sms = Some(Arc::new(TwilioGateway::new(sms)?));
        }

        tracing::info!(
            app = config::APP_NAME,
            version = config::APP_VERSION,
            model = %config.completion.model,
            sms = state.sms.is_some(),
            default_locale = %state.default_locale,
            "Core state ready"
        );
        Ok(state)
    }

    /// Build from the process environment.
    pub fn from_env() -> Result<Self, StartupError> {
        Self::from_config(&AppConfig::from_env()?)
    }

    pub fn with_sms_gateway(mut self, gateway: Arc<dyn SmsGateway>) -> Self {
        self.sms = Some(gateway);
        self
    }

    pub fn flows(&self) -> &FlowEngine {
        &self.flows
    }

    pub fn default_locale(&self) -> Locale {
        self.default_locale
    }

    /// Language configuration for a caller-supplied tag.
    pub fn language(&self, tag: Option<&str>) -> LanguageConfig {
        LanguageConfig::from_tag(tag, self.default_locale)
    }

    /// Send an SOS alert to `recipients`. Without an SMS gateway every
    /// dispatch reports failure.
    pub async fn send_sos(
        &self,
        recipients: &[String],
        alert: &SosAlert,
        language: Option<&str>,
    ) -> SosDispatchResult {
        let language = self.language(language);
        match &self.sms {
            Some(gateway) => dispatch_sos(gateway.as_ref(), recipients, alert, &language).await,
            None => {
                tracing::error!("SOS requested but no SMS provider is configured");
                SosDispatchResult {
                    success: false,
                    message: language.text("sos.unavailable").to_string(),
                    delivered: vec![],
                    failures: vec![],
                }
            }
        }
    }
}
