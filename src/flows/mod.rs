pub mod types;
pub mod prompt;
pub mod invoker;
pub mod guard;
pub mod gemini;
pub mod gemini_types;
pub mod engine;
pub mod symptoms;
pub mod documents;
pub mod health_info;
pub mod image;
pub mod voice;
pub mod chat;
pub mod recommendations;

pub use types::*;
pub use prompt::*;
pub use invoker::*;
pub use guard::*;
pub use gemini::*;
pub use engine::*;

use thiserror::Error;

/// Boxed transport cause, kept as the error's `source()`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failures a flow can hit before its output is guarded.
///
/// None of these reach the flow's caller: the guard converts each one into
/// the flow's localized fallback.
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Model service at {endpoint} could not be reached")]
    Transport {
        endpoint: String,
        #[source]
        source: BoxError,
    },

    #[error("Model service returned an error (HTTP {status})")]
    Status { status: u16, body: String },

    #[error("Model service response could not be parsed: {0}")]
    ResponseParsing(String),

    #[error("Model returned no usable candidate: {0}")]
    NoCandidate(String),

    #[error("Invalid flow input: {0}")]
    InvalidInput(String),

    #[error("Invalid media reference: {0}")]
    InvalidMedia(String),

    #[error("Tool '{tool}' failed: {message}")]
    Tool { tool: String, message: String },
}

impl FlowError {
    /// Structured detail for diagnostics, when the variant carries any.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Transport { endpoint, .. } => Some(serde_json::json!({ "endpoint": endpoint })),
            Self::Status { status, body } => {
                Some(serde_json::json!({ "status": status, "body": body }))
            }
            Self::Tool { tool, .. } => Some(serde_json::json!({ "tool": tool })),
            Self::ResponseParsing(_)
            | Self::NoCandidate(_)
            | Self::InvalidInput(_)
            | Self::InvalidMedia(_) => None,
        }
    }
}
