use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::prompt::RenderedPrompt;
use super::FlowError;
use crate::i18n::Locale;

/// Outcome of one flow invocation.
///
/// Both variants carry a value of the flow's output type, so callers can
/// render the payload without a separate error branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "output", rename_all = "snake_case")]
pub enum FlowResult<O> {
    /// The model produced a usable answer.
    Success(O),
    /// The flow substituted its fallback value.
    Degraded(O),
}

impl<O> FlowResult<O> {
    pub fn output(&self) -> &O {
        match self {
            Self::Success(o) | Self::Degraded(o) => o,
        }
    }

    pub fn into_output(self) -> O {
        match self {
            Self::Success(o) | Self::Degraded(o) => o,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }
}

/// A flow output type: deserializable from the model's structured output,
/// describable as a response schema, and able to produce its own fallback.
pub trait FlowOutput: DeserializeOwned + Serialize + Send + Sized {
    /// Response schema (Gemini OpenAPI subset) used as the decoding constraint.
    fn schema() -> serde_json::Value;

    /// The field checked for blankness before the output is accepted.
    fn primary_text(&self) -> &str;

    /// Fallback value. Hindi gets a translated message; every other locale
    /// gets English.
    fn fallback(locale: Locale) -> Self;
}

/// Sampling configuration sent with each completion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sampling {
    pub temperature: f32,
}

impl Sampling {
    /// Verbatim extraction: text extraction, intent parsing, tool selection.
    pub const fn extraction() -> Self {
        Self { temperature: 0.2 }
    }

    /// Grounded factual answers: symptom checks, summaries, document Q&A.
    pub const fn factual() -> Self {
        Self { temperature: 0.3 }
    }

    /// Descriptive answers: image analysis, health information.
    pub const fn descriptive() -> Self {
        Self { temperature: 0.5 }
    }

    /// Free conversation.
    pub const fn conversational() -> Self {
        Self { temperature: 0.6 }
    }
}

/// A callable the model may invoke mid-generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDeclaration {
    pub name: String,
    pub description: String,
    /// Input schema (Gemini OpenAPI subset).
    pub parameters: serde_json::Value,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub args: serde_json::Value,
}

/// Everything the remote service needs for one completion.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub prompt: RenderedPrompt,
    pub system: Option<String>,
    pub output_schema: Option<serde_json::Value>,
    pub sampling: Sampling,
    pub tools: Vec<ToolDeclaration>,
}

/// Raw outcome of a completion, before any flow-level interpretation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionResponse {
    /// Concatenated text parts of the first candidate.
    pub text: String,
    /// Parsed structured output, when the service produced one.
    pub output: Option<serde_json::Value>,
    pub tool_calls: Vec<ToolCall>,
}

/// Remote structured-completion service.
///
/// Implementations surface exactly what the transport yields. They never
/// retry and never substitute values.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest)
        -> Result<CompletionResponse, FlowError>;
}
