//! Symptom checker flow.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::engine::Flow;
use super::prompt::{delimited, require_text, RenderedPrompt};
use super::types::{FlowOutput, Sampling};
use super::FlowError;
use crate::i18n::{response_language, Locale};

pub const SYMPTOM_SYSTEM_PROMPT: &str = r#"
You are a medical triage assistant inside a telehealth app. You help patients
understand what their symptoms might indicate. You are NOT a doctor.

RULES:
1. List the most likely conditions first, at most five.
2. Give one confidence level between 0.0 and 1.0 per condition, same order.
3. Never prescribe medication or dosages.
4. Always recommend seeing a doctor for persistent or severe symptoms.
5. Recommend emergency care immediately for chest pain, difficulty breathing,
   sudden weakness or heavy bleeding.
"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomCheckInput {
    pub symptoms: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymptomCheckOutput {
    pub possible_conditions: Vec<String>,
    pub confidence_levels: Vec<f32>,
    pub explanation: String,
}

impl FlowOutput for SymptomCheckOutput {
    fn schema() -> serde_json::Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "possible_conditions": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" },
                    "description": "Possible conditions, most likely first."
                },
                "confidence_levels": {
                    "type": "ARRAY",
                    "items": { "type": "NUMBER" },
                    "description": "Confidence between 0 and 1 for each condition, same order."
                },
                "explanation": { "type": "STRING" }
            },
            "required": ["possible_conditions", "confidence_levels", "explanation"]
        })
    }

    fn primary_text(&self) -> &str {
        &self.explanation
    }

    fn fallback(locale: Locale) -> Self {
        let explanation = match locale {
            Locale::Hindi => {
                "क्षमा करें, अभी आपके लक्षणों का विश्लेषण करते समय एक तकनीकी त्रुटि हुई। कृपया पुनः प्रयास करें या डॉक्टर से परामर्श करें।"
            }
            _ => {
                "I'm sorry, a technical error occurred while analyzing your symptoms. Please try again or consult a doctor."
            }
        };
        Self {
            possible_conditions: vec![],
            confidence_levels: vec![],
            explanation: explanation.to_string(),
        }
    }
}

pub struct CheckSymptoms;

impl Flow for CheckSymptoms {
    const NAME: &'static str = "check_symptoms";
    type Input = SymptomCheckInput;
    type Output = SymptomCheckOutput;

    fn sampling() -> Sampling {
        Sampling::factual()
    }

    fn system() -> Option<String> {
        Some(SYMPTOM_SYSTEM_PROMPT.trim().to_string())
    }

    fn language(input: &SymptomCheckInput) -> Option<&str> {
        input.language.as_deref()
    }

    fn render(input: &SymptomCheckInput) -> Result<RenderedPrompt, FlowError> {
        Ok(RenderedPrompt::text(build_symptom_prompt(input)?))
    }
}

pub fn build_symptom_prompt(input: &SymptomCheckInput) -> Result<String, FlowError> {
    let symptoms = require_text("symptoms", &input.symptoms)?;

    let mut profile = Vec::new();
    if let Some(age) = input.age {
        profile.push(format!("Age: {age}"));
    }
    if let Some(sex) = input.sex.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        profile.push(format!("Sex: {sex}"));
    }
    let profile = if profile.is_empty() {
        String::new()
    } else {
        format!("Patient profile:\n{}\n\n", profile.join("\n"))
    };

    Ok(format!(
        "{profile}{}\n\nBased on the symptoms above, list the possible conditions with a \
         confidence level for each, and explain your reasoning in plain language.\n\
         Respond in {}.",
        delimited("symptoms", symptoms),
        response_language(input.language.as_deref()),
    ))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::flows::engine::run;
    use crate::flows::gemini::MockCompletionClient;
    use crate::flows::types::FlowResult;

    fn input(symptoms: &str, language: Option<&str>) -> SymptomCheckInput {
        SymptomCheckInput {
            symptoms: symptoms.into(),
            age: Some(34),
            sex: Some("female".into()),
            language: language.map(str::to_string),
        }
    }

    #[test]
    fn prompt_includes_profile_and_language() {
        let prompt = build_symptom_prompt(&input("fever and cough", Some("hi"))).unwrap();
        assert!(prompt.contains("Age: 34"));
        assert!(prompt.contains("Sex: female"));
        assert!(prompt.contains("<symptoms>\nfever and cough\n</symptoms>"));
        assert!(prompt.ends_with("Respond in Hindi."));
    }

    #[test]
    fn prompt_omits_empty_profile() {
        let prompt = build_symptom_prompt(&SymptomCheckInput {
            symptoms: "headache".into(),
            age: None,
            sex: Some("  ".into()),
            language: None,
        })
        .unwrap();
        assert!(!prompt.contains("Patient profile"));
        assert!(prompt.ends_with("Respond in English."));
    }

    #[test]
    fn blank_symptoms_are_invalid() {
        assert!(matches!(
            build_symptom_prompt(&input("  ", None)),
            Err(FlowError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn returns_model_conditions() {
        let client = MockCompletionClient::json(json!({
            "possible_conditions": ["Common cold", "Influenza"],
            "confidence_levels": [0.7, 0.3],
            "explanation": "Fever with cough is typical of viral infections."
        }));
        let result = run::<CheckSymptoms>(&client, &input("fever and cough", None)).await;
        let output = match result {
            FlowResult::Success(output) => output,
            other => panic!("expected success, got {other:?}"),
        };
        assert_eq!(output.possible_conditions, vec!["Common cold", "Influenza"]);
        assert_eq!(client.requests()[0].sampling, Sampling::factual());
    }

    #[tokio::test]
    async fn error_yields_hindi_fallback() {
        let client = MockCompletionClient::unreachable();
        let result = run::<CheckSymptoms>(&client, &input("बुखार", Some("hi"))).await;
        assert_eq!(
            result,
            FlowResult::Degraded(SymptomCheckOutput::fallback(Locale::Hindi))
        );
        assert!(result.output().possible_conditions.is_empty());
    }

    #[tokio::test]
    async fn blank_explanation_matches_error_fallback() {
        let blank = MockCompletionClient::json(json!({
            "possible_conditions": [],
            "confidence_levels": [],
            "explanation": "   "
        }));
        let failing = MockCompletionClient::unreachable();
        let a = run::<CheckSymptoms>(&blank, &input("rash", None)).await;
        let b = run::<CheckSymptoms>(&failing, &input("rash", None)).await;
        assert_eq!(a, b);
    }
}
