//! Gemini `generateContent` wire types and validators.
//!
//! These types formalize the REST contract used by `GeminiClient`. Field
//! names follow the service's camelCase JSON.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::prompt::{MediaSource, PromptSegment};
use super::types::{CompletionRequest, ToolCall, ToolDeclaration};
use super::FlowError;

// ──────────────────────────────────────────────
// Request body
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    pub generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// One content part. Exactly one field is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_data: Option<FileData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FileData {
    pub mime_type: String,
    pub file_uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerationConfig {
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Tool {
    pub function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct FunctionDeclaration {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl From<&ToolDeclaration> for FunctionDeclaration {
    fn from(tool: &ToolDeclaration) -> Self {
        Self {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        }
    }
}

impl From<&PromptSegment> for Part {
    fn from(segment: &PromptSegment) -> Self {
        match segment {
            PromptSegment::Text { text } => Part {
                text: Some(text.clone()),
                ..Part::default()
            },
            PromptSegment::Media { media } => match &media.source {
                MediaSource::Inline { data } => Part {
                    inline_data: Some(InlineData {
                        mime_type: media.mime_type.clone(),
                        data: data.clone(),
                    }),
                    ..Part::default()
                },
                MediaSource::Remote { uri } => Part {
                    file_data: Some(FileData {
                        mime_type: media.mime_type.clone(),
                        file_uri: uri.clone(),
                    }),
                    ..Part::default()
                },
            },
        }
    }
}

impl From<&CompletionRequest> for GenerateContentRequest {
    /// The service rejects a JSON response schema combined with function
    /// calling, so tool requests are sent without one.
    fn from(request: &CompletionRequest) -> Self {
        let structured = request.tools.is_empty() && request.output_schema.is_some();

        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: request.prompt.segments().iter().map(Part::from).collect(),
            }],
            system_instruction: request.system.as_ref().map(|system| Content {
                role: None,
                parts: vec![Part {
                    text: Some(system.clone()),
                    ..Part::default()
                }],
            }),
            generation_config: GenerationConfig {
                temperature: request.sampling.temperature,
                response_mime_type: structured.then(|| "application/json".to_string()),
                response_schema: if structured {
                    request.output_schema.clone()
                } else {
                    None
                },
            },
            tools: if request.tools.is_empty() {
                vec![]
            } else {
                vec![Tool {
                    function_declarations: request.tools.iter().map(Into::into).collect(),
                }]
            },
        }
    }
}

// ──────────────────────────────────────────────
// Response body
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Text and tool calls of the first candidate.
    pub fn into_parts(self) -> Result<(String, Vec<ToolCall>), FlowError> {
        let candidate = match self.candidates.into_iter().next() {
            Some(candidate) => candidate,
            None => {
                let reason = self
                    .prompt_feedback
                    .and_then(|f| f.block_reason)
                    .unwrap_or_else(|| "no candidates".to_string());
                return Err(FlowError::NoCandidate(reason));
            }
        };

        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
        if parts.is_empty() {
            // A candidate with no content is only acceptable as a normal stop.
            return match candidate.finish_reason.as_deref() {
                None | Some("STOP") => Ok((String::new(), vec![])),
                Some(reason) => Err(FlowError::NoCandidate(reason.to_string())),
            };
        }

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for part in parts {
            if let Some(t) = part.text {
                text.push_str(&t);
            }
            if let Some(call) = part.function_call {
                tool_calls.push(ToolCall {
                    name: call.name,
                    args: call.args,
                });
            }
        }
        Ok((text, tool_calls))
    }
}

// ──────────────────────────────────────────────
// Validators
// ──────────────────────────────────────────────

static MODEL_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(models/)?[a-zA-Z0-9][a-zA-Z0-9._-]*$").expect("static regex")
});

/// Validate a model name before it is interpolated into a request path.
///
/// Accepts `gemini-2.0-flash` and `models/gemini-2.0-flash`. Rejects path
/// separators, whitespace and anything starting with punctuation.
pub fn validate_model_name(name: &str) -> Result<(), FlowError> {
    if MODEL_NAME.is_match(name) {
        Ok(())
    } else {
        Err(FlowError::InvalidInput(format!("invalid model name '{name}'")))
    }
}

/// Strip the optional `models/` prefix.
pub fn bare_model_name(name: &str) -> &str {
    name.strip_prefix("models/").unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::prompt::{MediaRef, RenderedPrompt};
    use crate::flows::types::Sampling;

    fn request(tools: Vec<ToolDeclaration>) -> CompletionRequest {
        CompletionRequest {
            prompt: RenderedPrompt::text("Describe this image.")
                .with_media(MediaRef::parse("data:image/png;base64,iVBORw0KGgo=").unwrap())
                .with_media(MediaRef::parse("https://cdn.example.com/report.pdf").unwrap()),
            system: Some("You are careful.".into()),
            output_schema: Some(serde_json::json!({ "type": "OBJECT" })),
            sampling: Sampling::descriptive(),
            tools,
        }
    }

    // ── Model name validation ──

    #[test]
    fn accepts_gemini_model_names() {
        assert!(validate_model_name("gemini-2.0-flash").is_ok());
        assert!(validate_model_name("gemini-1.5-pro-latest").is_ok());
        assert!(validate_model_name("models/gemini-2.0-flash").is_ok());
    }

    #[test]
    fn rejects_unsafe_model_names() {
        assert!(validate_model_name("").is_err());
        assert!(validate_model_name("../etc/passwd").is_err());
        assert!(validate_model_name("a/b").is_err());
        assert!(validate_model_name("gemini flash").is_err());
        assert!(validate_model_name("-flag").is_err());
        assert!(validate_model_name("gemini:generateContent?x=").is_err());
    }

    #[test]
    fn bare_model_name_strips_prefix() {
        assert_eq!(bare_model_name("models/gemini-2.0-flash"), "gemini-2.0-flash");
        assert_eq!(bare_model_name("gemini-2.0-flash"), "gemini-2.0-flash");
    }

    // ── Request mapping ──

    #[test]
    fn structured_request_serializes_schema_and_media() {
        let body = GenerateContentRequest::from(&request(vec![]));
        let json = serde_json::to_value(&body).unwrap();

        let parts = &json["contents"][0]["parts"];
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(parts[0]["text"], "Describe this image.");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], "iVBORw0KGgo=");
        assert_eq!(parts[2]["fileData"]["fileUri"], "https://cdn.example.com/report.pdf");
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "You are careful.");

        let config = &json["generationConfig"];
        assert!((config["temperature"].as_f64().unwrap() - 0.5).abs() < 0.001);
        assert_eq!(config["responseMimeType"], "application/json");
        assert_eq!(config["responseSchema"]["type"], "OBJECT");
        assert!(json.get("tools").is_none());
    }

    #[test]
    fn tool_request_omits_response_schema() {
        let tool = ToolDeclaration {
            name: "findNearbyHealthcare".into(),
            description: "Find facilities".into(),
            parameters: serde_json::json!({ "type": "OBJECT" }),
        };
        let json = serde_json::to_value(GenerateContentRequest::from(&request(vec![tool]))).unwrap();
        assert!(json["generationConfig"].get("responseSchema").is_none());
        assert!(json["generationConfig"].get("responseMimeType").is_none());
        assert_eq!(
            json["tools"][0]["functionDeclarations"][0]["name"],
            "findNearbyHealthcare"
        );
    }

    // ── Response mapping ──

    #[test]
    fn response_concatenates_text_parts() {
        let raw = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"{\"a\":"},{"text":"1}"}]},"finishReason":"STOP"}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        let (text, calls) = response.into_parts().unwrap();
        assert_eq!(text, "{\"a\":1}");
        assert!(calls.is_empty());
    }

    #[test]
    fn response_collects_function_calls() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"functionCall":{"name":"findNearbyHealthcare","args":{"location":"Pune"}}}]}}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        let (text, calls) = response.into_parts().unwrap();
        assert!(text.is_empty());
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].args["location"], "Pune");
    }

    #[test]
    fn blocked_prompt_is_no_candidate() {
        let raw = r#"{"candidates":[],"promptFeedback":{"blockReason":"SAFETY"}}"#;
        let response: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        let err = response.into_parts().unwrap_err();
        assert!(matches!(err, FlowError::NoCandidate(ref r) if r == "SAFETY"));
    }

    #[test]
    fn empty_stopped_candidate_is_empty_text() {
        let raw = r#"{"candidates":[{"finishReason":"STOP"}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.into_parts().unwrap().0, "");

        let raw = r#"{"candidates":[{"finishReason":"SAFETY"}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert!(response.into_parts().is_err());
    }
}
