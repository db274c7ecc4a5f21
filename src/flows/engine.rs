//! The generic flow runner and the `FlowEngine` facade.
//!
//! Every flow follows the same path: render → invoke → guard. A flow type
//! only supplies its prompt, sampling preset and guard policy.

use std::sync::Arc;
use std::time::Instant;

use tracing::Instrument;
use uuid::Uuid;

use super::chat::{Chat, ChatInput, ChatOutput};
use super::documents::{
    AnswerDocumentQuestion, DocumentAnswer, DocumentInput, DocumentQuestionInput, DocumentSummary,
    ExtractDocumentText, ExtractedText, SummarizeDocument,
};
use super::gemini::GeminiClient;
use super::guard::{guard, GuardPolicy};
use super::health_info::{HealthInfoAnswer, HealthInfoInput, QueryHealthInformation};
use super::image::{AnalyzeImage, ImageAnalysis, ImageAnalysisInput};
use super::invoker::invoke_structured;
use super::prompt::RenderedPrompt;
use super::recommendations::{
    self, FacilityDirectory, FacilityRecommendation, RecommendationInput, SimulatedDirectory,
};
use super::symptoms::{CheckSymptoms, SymptomCheckInput, SymptomCheckOutput};
use super::types::{CompletionClient, CompletionRequest, FlowOutput, FlowResult, Sampling};
use super::voice::{ParseVoiceCommand, VoiceCommand, VoiceCommandInput};
use super::FlowError;
use crate::config::CompletionConfig;
use crate::i18n::Locale;

/// A prompt-templated flow with a typed input and output.
pub trait Flow {
    /// Name used in logs.
    const NAME: &'static str;

    type Input: Sync;
    type Output: FlowOutput;

    fn sampling() -> Sampling;

    fn policy() -> GuardPolicy {
        GuardPolicy::default()
    }

    fn system() -> Option<String> {
        None
    }

    /// The caller's language tag, used for fallback selection.
    fn language(input: &Self::Input) -> Option<&str>;

    fn render(input: &Self::Input) -> Result<RenderedPrompt, FlowError>;
}

/// Run one flow invocation. Never fails: every error path ends in the
/// flow's fallback.
pub async fn run<F: Flow>(client: &dyn CompletionClient, input: &F::Input) -> FlowResult<F::Output> {
    let invocation = Uuid::new_v4();
    let locale = Locale::for_fallback(F::language(input));
    let span = tracing::info_span!("flow", flow = F::NAME, %invocation, %locale);

    async move {
        let started = Instant::now();

        let outcome = match F::render(input) {
            Ok(prompt) => {
                let request = CompletionRequest {
                    prompt,
                    system: F::system(),
                    output_schema: Some(F::Output::schema()),
                    sampling: F::sampling(),
                    tools: vec![],
                };
                invoke_structured::<F::Output>(client, &request).await
            }
            Err(e) => Err(e),
        };

        let result = guard(F::NAME, locale, &F::policy(), outcome);
        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            degraded = result.is_degraded(),
            "Flow finished"
        );
        result
    }
    .instrument(span)
    .await
}

/// Entry point for every flow. Cheap to clone; holds no per-call state.
#[derive(Clone)]
pub struct FlowEngine {
    client: Arc<dyn CompletionClient>,
    directory: Arc<dyn FacilityDirectory>,
}

impl FlowEngine {
    /// Engine over `client`, using the simulated facility directory.
    pub fn new(client: Arc<dyn CompletionClient>) -> Self {
        Self {
            client,
            directory: Arc::new(SimulatedDirectory),
        }
    }

    /// Engine backed by a Gemini client built from `config`.
    pub fn from_config(config: &CompletionConfig) -> Result<Self, FlowError> {
        Ok(Self::new(Arc::new(GeminiClient::new(config)?)))
    }

    pub fn with_directory(mut self, directory: Arc<dyn FacilityDirectory>) -> Self {
        self.directory = directory;
        self
    }

    pub async fn check_symptoms(&self, input: &SymptomCheckInput) -> FlowResult<SymptomCheckOutput> {
        run::<CheckSymptoms>(self.client.as_ref(), input).await
    }

    pub async fn summarize_document(&self, input: &DocumentInput) -> FlowResult<DocumentSummary> {
        run::<SummarizeDocument>(self.client.as_ref(), input).await
    }

    pub async fn extract_document_text(&self, input: &DocumentInput) -> FlowResult<ExtractedText> {
        run::<ExtractDocumentText>(self.client.as_ref(), input).await
    }

    pub async fn answer_document_question(
        &self,
        input: &DocumentQuestionInput,
    ) -> FlowResult<DocumentAnswer> {
        run::<AnswerDocumentQuestion>(self.client.as_ref(), input).await
    }

    pub async fn query_health_information(
        &self,
        input: &HealthInfoInput,
    ) -> FlowResult<HealthInfoAnswer> {
        run::<QueryHealthInformation>(self.client.as_ref(), input).await
    }

    pub async fn analyze_image(&self, input: &ImageAnalysisInput) -> FlowResult<ImageAnalysis> {
        run::<AnalyzeImage>(self.client.as_ref(), input).await
    }

    pub async fn parse_voice_command(&self, input: &VoiceCommandInput) -> FlowResult<VoiceCommand> {
        run::<ParseVoiceCommand>(self.client.as_ref(), input).await
    }

    pub async fn chat(&self, input: &ChatInput) -> FlowResult<ChatOutput> {
        run::<Chat>(self.client.as_ref(), input).await
    }

    pub async fn recommend_facilities(
        &self,
        input: &RecommendationInput,
    ) -> FlowResult<Vec<FacilityRecommendation>> {
        recommendations::recommend(self.client.as_ref(), self.directory.as_ref(), input).await
    }
}
