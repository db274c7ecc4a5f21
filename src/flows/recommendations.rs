//! Nearby healthcare facility recommendations.
//!
//! Unlike the other flows the model is expected to call a tool,
//! `findNearbyHealthcare`, and the tool's list is the answer. Degradation is
//! an empty list, never a message.

use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::Instrument;
use uuid::Uuid;

use super::guard::FlowDiagnostics;
use super::invoker::invoke_structured;
use super::prompt::{delimited, require_text, RenderedPrompt};
use super::types::{CompletionClient, CompletionRequest, FlowResult, Sampling, ToolCall, ToolDeclaration};
use super::FlowError;

pub const FLOW_NAME: &str = "recommend_facilities";
pub const TOOL_NAME: &str = "findNearbyHealthcare";
pub const DEFAULT_FACILITY_TYPE: &str = "hospital";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationInput {
    pub location: String,
    #[serde(default)]
    pub facility_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilityRecommendation {
    pub name: String,
    pub address: String,
    pub distance: String,
    pub contact: String,
}

/// Source of nearby facility listings behind the tool.
#[async_trait]
pub trait FacilityDirectory: Send + Sync {
    async fn find_nearby(
        &self,
        location: &str,
        facility_type: &str,
    ) -> Result<Vec<FacilityRecommendation>, FlowError>;
}

/// Deterministic listings derived from the query, for demos and tests.
pub struct SimulatedDirectory;

#[async_trait]
impl FacilityDirectory for SimulatedDirectory {
    async fn find_nearby(
        &self,
        location: &str,
        facility_type: &str,
    ) -> Result<Vec<FacilityRecommendation>, FlowError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(FlowError::Tool {
                tool: TOOL_NAME.into(),
                message: "location is empty".into(),
            });
        }
        let kind = title_case(facility_type.trim());

        let listings = [
            ("City General", "12 Main Road", "1.2 km", "+91 20 2612 0001"),
            ("Community", "45 Station Street", "2.8 km", "+91 20 2612 0002"),
            ("Sunrise", "7 Lake View Colony", "4.5 km", "+91 20 2612 0003"),
        ];
        Ok(listings
            .iter()
            .map(|(prefix, street, distance, contact)| FacilityRecommendation {
                name: format!("{prefix} {kind}"),
                address: format!("{street}, {location}"),
                distance: distance.to_string(),
                contact: contact.to_string(),
            })
            .collect())
    }
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn tool_declaration() -> ToolDeclaration {
    ToolDeclaration {
        name: TOOL_NAME.into(),
        description: "Find healthcare facilities near a location. Returns name, address, \
                      distance and contact number for each facility."
            .into(),
        parameters: json!({
            "type": "OBJECT",
            "properties": {
                "location": { "type": "STRING", "description": "City, area or address." },
                "facilityType": {
                    "type": "STRING",
                    "description": "Kind of facility, e.g. hospital, clinic, pharmacy."
                }
            },
            "required": ["location"]
        }),
    }
}

pub fn list_schema() -> serde_json::Value {
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "name": { "type": "STRING" },
                "address": { "type": "STRING" },
                "distance": { "type": "STRING" },
                "contact": { "type": "STRING" }
            },
            "required": ["name", "address", "distance", "contact"]
        }
    })
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ToolArgs {
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    facility_type: Option<String>,
}

pub fn build_recommendation_prompt(input: &RecommendationInput) -> Result<RenderedPrompt, FlowError> {
    let location = require_text("location", &input.location)?;
    let facility_type = facility_type(input);
    Ok(RenderedPrompt::text(format!(
        "Find {facility_type} facilities near the location below. Call the \
         {TOOL_NAME} tool with the location and facility type; do not invent \
         facilities.\n\n{}",
        delimited("location", location)
    )))
}

fn facility_type(input: &RecommendationInput) -> &str {
    input
        .facility_type
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_FACILITY_TYPE)
}

/// Run the recommendation flow. Never fails: any failure is `Degraded(vec![])`.
pub async fn recommend(
    client: &dyn CompletionClient,
    directory: &dyn FacilityDirectory,
    input: &RecommendationInput,
) -> FlowResult<Vec<FacilityRecommendation>> {
    let invocation = Uuid::new_v4();
    let span = tracing::info_span!("flow", flow = FLOW_NAME, %invocation);

    async move {
        let started = Instant::now();
        let result = match resolve(client, directory, input).await {
            Ok(Some(list)) => FlowResult::Success(list),
            Ok(None) => FlowResult::Degraded(vec![]),
            Err(e) => {
                FlowDiagnostics::from_error(&e).log(FLOW_NAME);
                FlowResult::Degraded(vec![])
            }
        };
        tracing::info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            degraded = result.is_degraded(),
            count = result.output().len(),
            "Flow finished"
        );
        result
    }
    .instrument(span)
    .await
}

async fn resolve(
    client: &dyn CompletionClient,
    directory: &dyn FacilityDirectory,
    input: &RecommendationInput,
) -> Result<Option<Vec<FacilityRecommendation>>, FlowError> {
    let request = CompletionRequest {
        prompt: build_recommendation_prompt(input)?,
        system: None,
        output_schema: Some(list_schema()),
        sampling: Sampling::extraction(),
        tools: vec![tool_declaration()],
    };
    let raw = invoke_structured::<Vec<FacilityRecommendation>>(client, &request).await?;

    if let Some(call) = raw.tool_calls.iter().find(|c| c.name == TOOL_NAME) {
        return call_tool(directory, input, call).await.map(Some);
    }

    match raw.output {
        Some(list) if !list.is_empty() => Ok(Some(list)),
        _ => {
            tracing::warn!(
                flow = FLOW_NAME,
                raw_text = %raw.text,
                "Model did not call the facility tool; returning empty list"
            );
            Ok(None)
        }
    }
}

/// Execute the tool. Arguments the model omitted come from the input.
async fn call_tool(
    directory: &dyn FacilityDirectory,
    input: &RecommendationInput,
    call: &ToolCall,
) -> Result<Vec<FacilityRecommendation>, FlowError> {
    // `args` is optional on the wire and arrives as null when omitted.
    let args: ToolArgs = if call.args.is_null() {
        ToolArgs::default()
    } else {
        serde_json::from_value(call.args.clone()).map_err(|e| FlowError::Tool {
            tool: TOOL_NAME.into(),
            message: format!("invalid arguments: {e}"),
        })?
    };

    let location = args
        .location
        .filter(|l| !l.trim().is_empty())
        .unwrap_or_else(|| input.location.clone());
    let facility_type = args
        .facility_type
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| facility_type(input).to_string());

    tracing::debug!(tool = TOOL_NAME, %location, %facility_type, "Calling tool");
    directory.find_nearby(&location, &facility_type).await
}
