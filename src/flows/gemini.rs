use std::sync::Mutex;

use async_trait::async_trait;

use super::gemini_types::{bare_model_name, validate_model_name, GenerateContentRequest, GenerateContentResponse};
use super::invoker::parse_json_text;
use super::types::{CompletionClient, CompletionRequest, CompletionResponse, ToolCall};
use super::FlowError;
use crate::config::CompletionConfig;

/// Gemini `generateContent` client.
///
/// Holds a pooled HTTP client and nothing per call, so one instance can be
/// shared by every flow.
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl GeminiClient {
    pub fn new(config: &CompletionConfig) -> Result<Self, FlowError> {
        validate_model_name(&config.model)?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let http = builder.build().map_err(|e| FlowError::Transport {
            endpoint: base_url.clone(),
            source: Box::new(e),
        })?;

        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            endpoint: format!(
                "{base_url}/v1beta/models/{}:generateContent",
                bare_model_name(&config.model)
            ),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionClient for GeminiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, FlowError> {
        let body = GenerateContentRequest::from(request);

        let response = self
            .http
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| FlowError::Transport {
                endpoint: self.endpoint.clone(),
                source: Box::new(e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FlowError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| FlowError::ResponseParsing(e.to_string()))?;
        let (text, tool_calls) = parsed.into_parts()?;

        let output = if request.output_schema.is_some() && request.tools.is_empty() {
            parse_json_text(&text)
        } else {
            None
        };

        tracing::debug!(
            chars = text.len(),
            tool_calls = tool_calls.len(),
            structured = output.is_some(),
            "Completion received"
        );

        Ok(CompletionResponse {
            text,
            output,
            tool_calls,
        })
    }
}

enum MockReply {
    Json(serde_json::Value),
    Text(String),
    ToolCall(ToolCall),
    Unreachable,
    Status(u16, String),
}

/// Mock completion client for testing: returns a fixed reply and records
/// every request it receives.
pub struct MockCompletionClient {
    reply: MockReply,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl MockCompletionClient {
    fn with_reply(reply: MockReply) -> Self {
        Self {
            reply,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Structured output `value`, with its serialization as the raw text.
    pub fn json(value: serde_json::Value) -> Self {
        Self::with_reply(MockReply::Json(value))
    }

    /// Raw text only; no structured output.
    pub fn text(text: &str) -> Self {
        Self::with_reply(MockReply::Text(text.to_string()))
    }

    /// A single call to tool `name`.
    pub fn tool_call(name: &str, args: serde_json::Value) -> Self {
        Self::with_reply(MockReply::ToolCall(ToolCall {
            name: name.to_string(),
            args,
        }))
    }

    /// Transport failure, as if the service were down.
    pub fn unreachable() -> Self {
        Self::with_reply(MockReply::Unreachable)
    }

    /// Non-success HTTP status.
    pub fn failing_status(status: u16, body: &str) -> Self {
        Self::with_reply(MockReply::Status(status, body.to_string()))
    }

    pub fn call_count(&self) -> usize {
        self.recorded().len()
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.recorded().clone()
    }

    fn recorded(&self) -> std::sync::MutexGuard<'_, Vec<CompletionRequest>> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, FlowError> {
        self.recorded().push(request.clone());

        match &self.reply {
            MockReply::Json(value) => Ok(CompletionResponse {
                text: value.to_string(),
                output: Some(value.clone()),
                tool_calls: vec![],
            }),
            MockReply::Text(text) => Ok(CompletionResponse {
                text: text.clone(),
                ..CompletionResponse::default()
            }),
            MockReply::ToolCall(call) => Ok(CompletionResponse {
                tool_calls: vec![call.clone()],
                ..CompletionResponse::default()
            }),
            MockReply::Unreachable => Err(FlowError::Transport {
                endpoint: "mock://completion".into(),
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )),
            }),
            MockReply::Status(status, body) => Err(FlowError::Status {
                status: *status,
                body: body.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use axum::extract::{Path, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use super::*;
    use crate::flows::prompt::RenderedPrompt;
    use crate::flows::types::Sampling;

    #[derive(Clone)]
    struct Upstream {
        status: StatusCode,
        reply: Value,
        seen: Arc<Mutex<Vec<(String, Option<String>, Value)>>>,
    }

    async fn generate(
        State(upstream): State<Upstream>,
        Path(target): Path<String>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        let key = headers
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        upstream.seen.lock().unwrap().push((target, key, body));
        (upstream.status, Json(upstream.reply.clone()))
    }

    async fn spawn_upstream(upstream: Upstream) -> SocketAddr {
        let app = Router::new()
            .route("/v1beta/models/:target", post(generate))
            .with_state(upstream);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn config(base_url: String) -> CompletionConfig {
        CompletionConfig {
            api_key: "test-key".into(),
            model: "gemini-2.0-flash".into(),
            base_url,
            timeout: None,
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            prompt: RenderedPrompt::text("What is a migraine?"),
            system: None,
            output_schema: Some(json!({ "type": "OBJECT" })),
            sampling: Sampling::descriptive(),
            tools: vec![],
        }
    }

    fn text_reply(text: &str) -> Value {
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }]
        })
    }

    #[test]
    fn endpoint_embeds_bare_model_name() {
        let mut cfg = config("https://example.test/".into());
        cfg.model = "models/gemini-1.5-pro".into();
        let client = GeminiClient::new(&cfg).unwrap();
        assert_eq!(
            client.endpoint(),
            "https://example.test/v1beta/models/gemini-1.5-pro:generateContent"
        );
    }

    #[test]
    fn rejects_invalid_model_name() {
        let mut cfg = config("https://example.test".into());
        cfg.model = "../../admin".into();
        assert!(matches!(GeminiClient::new(&cfg), Err(FlowError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn posts_request_and_parses_structured_text() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let addr = spawn_upstream(Upstream {
            status: StatusCode::OK,
            reply: text_reply(r#"{"answer":"A headache disorder."}"#),
            seen: seen.clone(),
        })
        .await;

        let client = GeminiClient::new(&config(format!("http://{addr}"))).unwrap();
        let response = client.complete(&request()).await.unwrap();

        assert_eq!(response.output.unwrap()["answer"], "A headache disorder.");
        let seen = seen.lock().unwrap();
        let (target, key, body) = &seen[0];
        assert_eq!(target, "gemini-2.0-flash:generateContent");
        assert_eq!(key.as_deref(), Some("test-key"));
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "What is a migraine?");
    }

    #[tokio::test]
    async fn non_json_text_has_no_output() {
        let addr = spawn_upstream(Upstream {
            status: StatusCode::OK,
            reply: text_reply("I cannot help with that."),
            seen: Arc::default(),
        })
        .await;

        let client = GeminiClient::new(&config(format!("http://{addr}"))).unwrap();
        let response = client.complete(&request()).await.unwrap();
        assert_eq!(response.text, "I cannot help with that.");
        assert!(response.output.is_none());
    }

    #[tokio::test]
    async fn error_status_surfaces_status_and_body() {
        let addr = spawn_upstream(Upstream {
            status: StatusCode::TOO_MANY_REQUESTS,
            reply: json!({ "error": { "message": "quota exceeded" } }),
            seen: Arc::default(),
        })
        .await;

        let client = GeminiClient::new(&config(format!("http://{addr}"))).unwrap();
        match client.complete(&request()).await {
            Err(FlowError::Status { status, body }) => {
                assert_eq!(status, 429);
                assert!(body.contains("quota exceeded"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_service_is_transport_error() {
        // Bind then drop to get a port with nothing listening.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = GeminiClient::new(&config(format!("http://{addr}"))).unwrap();
        let err = client.complete(&request()).await.unwrap_err();
        assert!(matches!(err, FlowError::Transport { .. }));
    }

    #[tokio::test]
    async fn mock_records_requests() {
        let mock = MockCompletionClient::text("hi");
        mock.complete(&request()).await.unwrap();
        mock.complete(&request()).await.unwrap();
        assert_eq!(mock.call_count(), 2);
        assert_eq!(mock.requests()[0].prompt.plain_text(), "What is a migraine?");
    }

    #[tokio::test]
    async fn mock_failing_status() {
        let mock = MockCompletionClient::failing_status(503, "unavailable");
        let err = mock.complete(&request()).await.unwrap_err();
        assert!(matches!(err, FlowError::Status { status: 503, .. }));
    }
}
