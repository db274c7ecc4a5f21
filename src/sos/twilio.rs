use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Deserialize;

use super::SmsError;
use crate::config::SmsConfig;

/// Sends one SMS and returns the provider's message id.
#[async_trait]
pub trait SmsGateway: Send + Sync {
    async fn send(&self, to: &str, body: &str) -> Result<String, SmsError>;
}

/// Twilio Messages API client.
pub struct TwilioGateway {
    http: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
    endpoint: String,
}

/// Successful body of `POST .../Messages.json`.
#[derive(Deserialize)]
struct MessageResource {
    sid: String,
}

/// Error body returned with non-2xx statuses.
#[derive(Deserialize)]
struct TwilioErrorBody {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

impl TwilioGateway {
    pub fn new(config: &SmsConfig) -> Result<Self, SmsError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|e| SmsError::Transport {
            endpoint: base_url.clone(),
            source: Box::new(e),
        })?;

        Ok(Self {
            http,
            account_sid: config.account_sid.clone(),
            auth_token: config.auth_token.clone(),
            from_number: config.from_number.clone(),
            endpoint: format!(
                "{base_url}/2010-04-01/Accounts/{}/Messages.json",
                config.account_sid
            ),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SmsGateway for TwilioGateway {
    async fn send(&self, to: &str, body: &str) -> Result<String, SmsError> {
        let form = [("To", to), ("From", self.from_number.as_str()), ("Body", body)];

        let response = self
            .http
            .post(&self.endpoint)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()
            .await
            .map_err(|e| SmsError::Transport {
                endpoint: self.endpoint.clone(),
                source: Box::new(e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let parsed = serde_json::from_str::<TwilioErrorBody>(&raw).ok();
            let code = parsed.as_ref().and_then(|b| b.code);
            let message = parsed.and_then(|b| b.message).unwrap_or(raw);
            return Err(SmsError::Rejected {
                status: status.as_u16(),
                code,
                message,
            });
        }

        let resource: MessageResource = response
            .json()
            .await
            .map_err(|e| SmsError::ResponseParsing(e.to_string()))?;
        Ok(resource.sid)
    }
}

/// Mock gateway for testing: succeeds for every number except the ones
/// marked failing, and records what it sent.
#[derive(Default)]
pub struct MockSmsGateway {
    failing: HashSet<String>,
    sent: Mutex<Vec<(String, String)>>,
}

impl MockSmsGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject sends to `number` with a provider error.
    pub fn failing_for(mut self, number: &str) -> Self {
        self.failing.insert(number.to_string());
        self
    }

    /// `(to, body)` pairs successfully sent, in completion order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl SmsGateway for MockSmsGateway {
    async fn send(&self, to: &str, body: &str) -> Result<String, SmsError> {
        if self.failing.contains(to) {
            return Err(SmsError::Rejected {
                status: 400,
                code: Some(21211),
                message: format!("The 'To' number {to} is not reachable"),
            });
        }
        let mut sent = self.sent.lock().unwrap_or_else(|e| e.into_inner());
        sent.push((to.to_string(), body.to_string()));
        Ok(format!("SM{:032}", sent.len()))
    }
}
