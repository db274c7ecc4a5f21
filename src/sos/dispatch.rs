//! SOS fan-out: one SMS per emergency contact, sent concurrently, with
//! per-recipient failures collected into the result.

use std::sync::LazyLock;
use std::time::Instant;

use futures_util::future::join_all;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use super::twilio::SmsGateway;
use super::SmsError;
use crate::i18n::LanguageConfig;

static E164: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+[1-9]\d{6,14}$").expect("static regex"));

/// Check that `number` is an E.164 phone number (`+` and 7 to 15 digits).
pub fn validate_e164(number: &str) -> Result<(), SmsError> {
    if E164.is_match(number) {
        Ok(())
    } else {
        Err(SmsError::InvalidNumber(number.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SosAlert {
    pub patient_name: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub recipient: String,
    pub message_sid: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipientFailure {
    pub recipient: String,
    pub error: String,
}

/// Aggregate outcome of one SOS dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SosDispatchResult {
    /// True only when every recipient received the alert.
    pub success: bool,
    /// User-facing summary, localized.
    pub message: String,
    pub delivered: Vec<Delivery>,
    pub failures: Vec<RecipientFailure>,
}

/// Compose the SMS body for `alert`.
pub fn compose_sos_message(alert: &SosAlert, language: &LanguageConfig) -> String {
    let name = non_blank(Some(alert.patient_name.as_str()))
        .unwrap_or_else(|| language.text("sos.unknown_patient"));
    let mut lines = vec![language.format("sos.alert_body", &[("name", name)])];

    if let Some(location) = non_blank(alert.location.as_deref()) {
        lines.push(language.format("sos.location_line", &[("location", location)]));
    }
    if let Some(note) = non_blank(alert.note.as_deref()) {
        lines.push(language.format("sos.note_line", &[("note", note)]));
    }
    lines.join("\n")
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Send `alert` to every recipient concurrently. Never fails: each
/// recipient's outcome is reported in the result, in recipient order.
pub async fn dispatch_sos(
    gateway: &dyn SmsGateway,
    recipients: &[String],
    alert: &SosAlert,
    language: &LanguageConfig,
) -> SosDispatchResult {
    let dispatch_id = Uuid::new_v4();
    let span = tracing::info_span!("sos_dispatch", %dispatch_id, recipients = recipients.len());

    async move {
        if recipients.is_empty() {
            tracing::warn!("SOS requested with no emergency contacts");
            return SosDispatchResult {
                success: false,
                message: language.text("sos.no_contacts").to_string(),
                delivered: vec![],
                failures: vec![],
            };
        }

        let started = Instant::now();
        let body = compose_sos_message(alert, language);

        let sends = recipients.iter().map(|recipient| {
            let body = body.as_str();
            async move {
                let recipient = recipient.trim();
                match validate_e164(recipient) {
                    Ok(()) => gateway.send(recipient, body).await,
                    Err(e) => Err(e),
                }
            }
        });
        let outcomes = join_all(sends).await;

        let mut delivered = Vec::new();
        let mut failures = Vec::new();
        for (recipient, outcome) in recipients.iter().zip(outcomes) {
            match outcome {
                Ok(message_sid) => delivered.push(Delivery {
                    recipient: recipient.clone(),
                    message_sid,
                }),
                Err(e) => {
                    tracing::error!(recipient = %recipient, error = %e, "SOS SMS failed");
                    failures.push(RecipientFailure {
                        recipient: recipient.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let success = failures.is_empty();
        let message = if success {
            let count = delivered.len().to_string();
            language.format("sos.sent_all", &[("count", count.as_str())])
        } else {
            let failed = failures
                .iter()
                .map(|f| f.recipient.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            language.format("sos.failed_some", &[("recipients", failed.as_str())])
        };

        tracing::info!(
            delivered = delivered.len(),
            failed = failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "SOS dispatch finished"
        );

        SosDispatchResult {
            success,
            message,
            delivered,
            failures,
        }
    }
    .instrument(span)
    .await
}
