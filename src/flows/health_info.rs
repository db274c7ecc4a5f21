//! General health information Q&A.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::engine::Flow;
use super::prompt::{delimited, require_text, RenderedPrompt};
use super::types::{FlowOutput, Sampling};
use super::FlowError;
use crate::i18n::{response_language, Locale};

/// Disclaimer attached to every health answer, including fallbacks.
pub const HEALTH_DISCLAIMER: &str = "This information is for general educational purposes only and is not a substitute for professional medical advice, diagnosis, or treatment. Always consult a qualified healthcare provider with any questions about a medical condition.";

pub const HEALTH_DISCLAIMER_HI: &str = "यह जानकारी केवल सामान्य शैक्षिक उद्देश्यों के लिए है और पेशेवर चिकित्सा सलाह, निदान या उपचार का विकल्प नहीं है। किसी भी चिकित्सीय स्थिति के बारे में प्रश्नों के लिए हमेशा योग्य स्वास्थ्य सेवा प्रदाता से परामर्श करें।";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthInfoInput {
    pub user_query: String,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthInfoAnswer {
    pub answer: String,
    pub disclaimer: String,
}

impl FlowOutput for HealthInfoAnswer {
    fn schema() -> serde_json::Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "answer": { "type": "STRING" },
                "disclaimer": { "type": "STRING" }
            },
            "required": ["answer", "disclaimer"]
        })
    }

    fn primary_text(&self) -> &str {
        &self.answer
    }

    fn fallback(locale: Locale) -> Self {
        let (answer, disclaimer) = match locale {
            Locale::Hindi => (
                "क्षमा करें, आपके स्वास्थ्य प्रश्न का उत्तर देते समय एक तकनीकी त्रुटि हुई।",
                HEALTH_DISCLAIMER_HI,
            ),
            _ => (
                "I'm sorry, a technical error occurred while answering your health query.",
                HEALTH_DISCLAIMER,
            ),
        };
        Self {
            answer: answer.to_string(),
            disclaimer: disclaimer.to_string(),
        }
    }
}

pub struct QueryHealthInformation;

impl Flow for QueryHealthInformation {
    const NAME: &'static str = "query_health_information";
    type Input = HealthInfoInput;
    type Output = HealthInfoAnswer;

    fn sampling() -> Sampling {
        Sampling::descriptive()
    }

    fn language(input: &HealthInfoInput) -> Option<&str> {
        input.language.as_deref()
    }

    fn render(input: &HealthInfoInput) -> Result<RenderedPrompt, FlowError> {
        let query = require_text("user_query", &input.user_query)?;
        Ok(RenderedPrompt::text(format!(
            "You are a health information assistant. Answer the question below clearly \
             and accurately for a general audience. Do not diagnose and do not prescribe.\n\n\
             {}\n\n\
             Also return a short disclaimer reminding the user to consult a healthcare \
             professional.\nRespond in {}.",
            delimited("question", query),
            response_language(input.language.as_deref())
        )))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::flows::engine::run;
    use crate::flows::gemini::MockCompletionClient;
    use crate::flows::types::FlowResult;

    fn migraine() -> HealthInfoInput {
        HealthInfoInput {
            user_query: "What is a migraine?".into(),
            language: Some("English".into()),
        }
    }

    #[tokio::test]
    async fn erroring_model_returns_fixed_answer_and_disclaimer() {
        let client = MockCompletionClient::unreachable();
        let result = run::<QueryHealthInformation>(&client, &migraine()).await;
        assert_eq!(
            result,
            FlowResult::Degraded(HealthInfoAnswer {
                answer: "I'm sorry, a technical error occurred while answering your health query."
                    .into(),
                disclaimer: HEALTH_DISCLAIMER.into(),
            })
        );
    }

    #[tokio::test]
    async fn successful_answer_passes_through() {
        let client = MockCompletionClient::json(json!({
            "answer": "A migraine is a recurring headache disorder.",
            "disclaimer": "Consult a doctor."
        }));
        let result = run::<QueryHealthInformation>(&client, &migraine()).await;
        assert_eq!(result.output().disclaimer, "Consult a doctor.");
        assert_eq!(client.requests()[0].sampling, Sampling::descriptive());
    }

    #[tokio::test]
    async fn missing_disclaimer_is_schema_failure() {
        let client = MockCompletionClient::json(json!({ "answer": "Partial" }));
        let result = run::<QueryHealthInformation>(&client, &migraine()).await;
        assert!(result.is_degraded());
    }

    #[test]
    fn prompt_requests_language() {
        let prompt = QueryHealthInformation::render(&HealthInfoInput {
            user_query: "माइग्रेन क्या है?".into(),
            language: Some("hi".into()),
        })
        .unwrap();
        let text = prompt.plain_text();
        assert!(text.contains("<question>\nमाइग्रेन क्या है?\n</question>"));
        assert!(text.ends_with("Respond in Hindi."));
    }
}
