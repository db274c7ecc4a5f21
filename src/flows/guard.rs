//! Result guard and fallback policy.
//!
//! Turns whatever the invoker produced into a `FlowResult` whose payload is
//! always a value of the output type:
//!
//! - error → fallback, logged at error level as one diagnostics unit
//! - missing output → fallback, warn + raw text
//! - blank primary text → fallback, warn + raw text
//! - sentinel text (when the flow declares one) → fallback, warn + raw text
//! - otherwise → the output unchanged
//!
//! The blank check runs before the sentinel check.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::error::Error as _;

use serde::Serialize;

use super::invoker::RawCompletion;
use super::types::{FlowOutput, FlowResult};
use super::FlowError;
use crate::i18n::Locale;

/// Diagnostic fields captured from a flow failure, logged as a unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowDiagnostics {
    pub message: String,
    /// `source()` chain, outermost first, joined with ": ".
    pub cause: Option<String>,
    pub details: Option<serde_json::Value>,
    /// Backtrace of the call site that reported the failure, not of where
    /// the error was raised. Present only when `RUST_BACKTRACE` enables
    /// capture.
    pub reported_at: Option<String>,
}

impl FlowDiagnostics {
    /// Diagnostics for `err`, reported from the caller's stack.
    pub fn from_error(err: &FlowError) -> Self {
        Self::with_backtrace(err, &Backtrace::capture())
    }

    pub fn with_backtrace(err: &FlowError, backtrace: &Backtrace) -> Self {
        let mut chain = Vec::new();
        let mut source = err.source();
        while let Some(s) = source {
            chain.push(s.to_string());
            source = s.source();
        }

        Self {
            message: err.to_string(),
            cause: (!chain.is_empty()).then(|| chain.join(": ")),
            details: err.details(),
            reported_at: (backtrace.status() == BacktraceStatus::Captured)
                .then(|| backtrace.to_string()),
        }
    }

    pub fn log(&self, flow: &str) {
        tracing::error!(
            flow,
            message = %self.message,
            cause = self.cause.as_deref().unwrap_or("-"),
            details = %self.details.as_ref().map(|d| d.to_string()).unwrap_or_default(),
            reported_at = self.reported_at.as_deref().unwrap_or("-"),
            "Flow failed; returning fallback"
        );
    }
}

/// Why a successful completion was still rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingOutput,
    BlankText,
    Sentinel,
}

impl Rejection {
    fn as_str(&self) -> &'static str {
        match self {
            Self::MissingOutput => "missing_output",
            Self::BlankText => "blank_text",
            Self::Sentinel => "sentinel",
        }
    }
}

/// Per-flow guard settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuardPolicy {
    /// Text that means "nothing found" even though the call succeeded.
    pub sentinel: Option<&'static str>,
}

/// Compare model text against a sentinel: trimmed, case-insensitive, with
/// an optional trailing period on either side.
pub fn matches_sentinel(text: &str, sentinel: &str) -> bool {
    let normalize = |s: &str| s.trim().trim_end_matches('.').trim_end().to_lowercase();
    normalize(text) == normalize(sentinel)
}

/// Check a decoded output against the policy.
pub fn inspect<O: FlowOutput>(output: Option<&O>, policy: &GuardPolicy) -> Result<(), Rejection> {
    let output = output.ok_or(Rejection::MissingOutput)?;
    let text = output.primary_text();
    if text.trim().is_empty() {
        return Err(Rejection::BlankText);
    }
    if let Some(sentinel) = policy.sentinel {
        if matches_sentinel(text, sentinel) {
            return Err(Rejection::Sentinel);
        }
    }
    Ok(())
}

/// Apply the guard to one invocation outcome.
pub fn guard<O: FlowOutput>(
    flow: &str,
    locale: Locale,
    policy: &GuardPolicy,
    outcome: Result<RawCompletion<O>, FlowError>,
) -> FlowResult<O> {
    match outcome {
        Err(err) => {
            FlowDiagnostics::from_error(&err).log(flow);
            FlowResult::Degraded(O::fallback(locale))
        }
        Ok(raw) => {
            let verdict = inspect(raw.output.as_ref(), policy);
            match (verdict, raw.output) {
                (Ok(()), Some(output)) => FlowResult::Success(output),
                (Ok(()), None) => FlowResult::Degraded(O::fallback(locale)),
                (Err(rejection), _) => {
                    tracing::warn!(
                        flow,
                        reason = rejection.as_str(),
                        raw_text = %raw.text,
                        "Model output unusable; returning fallback"
                    );
                    FlowResult::Degraded(O::fallback(locale))
                }
            }
        }
    }
}
