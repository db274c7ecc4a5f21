//! Patient assistant chat.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::engine::Flow;
use super::prompt::{delimited, require_text, RenderedPrompt};
use super::types::{FlowOutput, Sampling};
use super::FlowError;
use crate::i18n::{response_language, Locale};

/// Non-blank turns of history included in the prompt; older turns are dropped.
pub const MAX_HISTORY_TURNS: usize = 20;

pub const CHAT_SYSTEM_PROMPT: &str = r#"
You are SmartCare Hub's friendly health assistant. You help patients with
general health questions, appointments and using the app.

RULES:
1. Keep answers short and in plain language.
2. Never diagnose or prescribe. Suggest consulting a doctor when relevant.
3. For emergencies, tell the user to use the SOS button or call emergency
   services immediately.
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatInput {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatOutput {
    pub response: String,
}

impl FlowOutput for ChatOutput {
    fn schema() -> serde_json::Value {
        json!({
            "type": "OBJECT",
            "properties": { "response": { "type": "STRING" } },
            "required": ["response"]
        })
    }

    fn primary_text(&self) -> &str {
        &self.response
    }

    fn fallback(locale: Locale) -> Self {
        let response = match locale {
            Locale::Hindi => "क्षमा करें, मुझे अभी उत्तर देने में समस्या हो रही है। कृपया कुछ देर बाद पुनः प्रयास करें।",
            _ => "I'm sorry, I'm having trouble responding right now. Please try again in a moment.",
        };
        Self {
            response: response.to_string(),
        }
    }
}

pub struct Chat;

impl Flow for Chat {
    const NAME: &'static str = "chat";
    type Input = ChatInput;
    type Output = ChatOutput;

    fn sampling() -> Sampling {
        Sampling::conversational()
    }

    fn system() -> Option<String> {
        Some(CHAT_SYSTEM_PROMPT.trim().to_string())
    }

    fn language(input: &ChatInput) -> Option<&str> {
        input.language.as_deref()
    }

    fn render(input: &ChatInput) -> Result<RenderedPrompt, FlowError> {
        let message = require_text("message", &input.message)?;

        let turns: Vec<&ChatTurn> = input
            .history
            .iter()
            .filter(|turn| !turn.content.trim().is_empty())
            .collect();
        let skip = turns.len().saturating_sub(MAX_HISTORY_TURNS);
        let transcript = turns
            .iter()
            .skip(skip)
            .map(|turn| {
                let speaker = match turn.role {
                    ChatRole::User => "User",
                    ChatRole::Assistant => "Assistant",
                };
                format!("{speaker}: {}", turn.content.trim())
            })
            .collect::<Vec<_>>()
            .join("\n");

        let mut prompt = String::new();
        if !transcript.is_empty() {
            prompt.push_str(&delimited("history", &transcript));
            prompt.push_str("\n\n");
        }
        prompt.push_str(&delimited("message", message));
        prompt.push_str(&format!(
            "\n\nReply to the user's latest message. Respond in {}.",
            response_language(input.language.as_deref())
        ));
        Ok(RenderedPrompt::text(prompt))
    }
}
