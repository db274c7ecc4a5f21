//! Medical image analysis.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::engine::Flow;
use super::prompt::{delimited, require_text, MediaRef, RenderedPrompt};
use super::types::{FlowOutput, Sampling};
use super::FlowError;
use crate::i18n::{response_language, Locale};

pub const DEFAULT_IMAGE_QUERY: &str = "Describe this image.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAnalysisInput {
    pub image_uri: String,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub description: String,
}

impl FlowOutput for ImageAnalysis {
    fn schema() -> serde_json::Value {
        json!({
            "type": "OBJECT",
            "properties": { "description": { "type": "STRING" } },
            "required": ["description"]
        })
    }

    fn primary_text(&self) -> &str {
        &self.description
    }

    fn fallback(locale: Locale) -> Self {
        let description = match locale {
            Locale::Hindi => "क्षमा करें, छवि का विश्लेषण करते समय एक तकनीकी त्रुटि हुई।",
            _ => "I'm sorry, a technical error occurred while analyzing the image.",
        };
        Self {
            description: description.to_string(),
        }
    }
}

pub struct AnalyzeImage;

impl Flow for AnalyzeImage {
    const NAME: &'static str = "analyze_image";
    type Input = ImageAnalysisInput;
    type Output = ImageAnalysis;

    fn sampling() -> Sampling {
        Sampling::descriptive()
    }

    fn language(input: &ImageAnalysisInput) -> Option<&str> {
        input.language.as_deref()
    }

    fn render(input: &ImageAnalysisInput) -> Result<RenderedPrompt, FlowError> {
        let media = MediaRef::parse(require_text("image_uri", &input.image_uri)?)?;
        if !media.is_image() {
            return Err(FlowError::InvalidMedia(format!(
                "expected an image, got {}",
                media.mime_type
            )));
        }

        let query = input
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .unwrap_or(DEFAULT_IMAGE_QUERY);

        Ok(RenderedPrompt::text(format!(
            "You are a medical imaging assistant. Look at the attached image and answer \
             the request below. Describe what is visible; do not give a diagnosis.\n\n\
             {}\n\nRespond in {}.",
            delimited("request", query),
            response_language(input.language.as_deref())
        ))
        .with_media(media))
    }
}
