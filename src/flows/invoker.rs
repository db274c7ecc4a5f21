//! Structured completion invoker.
//!
//! Sends one request and decodes the structured output into the flow's
//! output type. It never retries and never substitutes: a decode failure
//! becomes `output: None` and the guard decides what to do with it.

use serde::de::DeserializeOwned;

use super::types::{CompletionClient, CompletionRequest, ToolCall};
use super::FlowError;

/// Outcome of one invocation, typed by the flow's output.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCompletion<O> {
    /// Raw model text, kept for diagnostics.
    pub text: String,
    /// Decoded output; `None` when absent or not conforming.
    pub output: Option<O>,
    pub tool_calls: Vec<ToolCall>,
}

/// Invoke the completion client once and decode its output as `O`.
pub async fn invoke_structured<O: DeserializeOwned>(
    client: &dyn CompletionClient,
    request: &CompletionRequest,
) -> Result<RawCompletion<O>, FlowError> {
    let response = client.complete(request).await?;

    let candidate = response
        .output
        .clone()
        .or_else(|| parse_json_text(&response.text));

    let output = match candidate {
        Some(value) => match serde_json::from_value::<O>(value) {
            Ok(output) => Some(output),
            Err(e) => {
                tracing::warn!(error = %e, "Structured output does not match the response schema");
                None
            }
        },
        None => None,
    };

    Ok(RawCompletion {
        text: response.text,
        output,
        tool_calls: response.tool_calls,
    })
}

/// Decode model text as JSON: either the whole text, or the first fenced
/// ```` ```json ```` block inside it.
pub fn parse_json_text(text: &str) -> Option<serde_json::Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }
    extract_json_block(trimmed).and_then(|block| serde_json::from_str(block).ok())
}

/// Find the contents of the first ```` ```json ```` fence.
fn extract_json_block(text: &str) -> Option<&str> {
    let start = text.find("```json")? + "```json".len();
    let end = text[start..].find("```")?;
    Some(text[start..start + end].trim())
}
