//! Normalized model-provider interface.
//!
//! Vendor adapters live outside this crate; the core consumes an
//! already-normalized stream of [`ProviderStreamPart`]s and a normalized
//! non-streaming [`ProviderResponse`]. Implement [`ModelProvider`] to plug a
//! model in.

use async_trait::async_trait;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::error::{NauvooError, Result};
use crate::types::{
    FinishReason, GenerationSettings, ModelMessage, ProviderStreamPart, RawToolCall,
    RawToolResult, ResponseMetadata, Source, Usage,
};

/// A request sent to a model provider.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub system: Option<String>,
    pub messages: Vec<ModelMessage>,
    pub settings: GenerationSettings,
    pub tools: Option<Vec<ToolDefinition>>,
    /// Cooperative abort signal; a fired signal should reject the in-flight
    /// provider call.
    pub abort: CancellationToken,
}

impl ProviderRequest {
    pub fn new(messages: Vec<ModelMessage>) -> Self {
        Self {
            system: None,
            messages,
            settings: GenerationSettings::default(),
            tools: None,
            abort: CancellationToken::new(),
        }
    }
}

/// Tool definition sent to the provider API.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// One content item of a non-streaming provider response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseContent {
    Text { text: String },
    Reasoning { text: String },
    ToolCall(RawToolCall),
    ToolResult(RawToolResult),
    File { data: Vec<u8>, media_type: String },
    Source(Source),
}

/// Response from a provider.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub content: Vec<ResponseContent>,
    pub usage: Usage,
    pub finish_reason: FinishReason,
    pub response: ResponseMetadata,
    pub warnings: Vec<String>,
}

impl ProviderResponse {
    /// Concatenated text content.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                ResponseContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Raw tool calls requested by this response.
    pub fn tool_calls(&self) -> Vec<&RawToolCall> {
        self.content
            .iter()
            .filter_map(|part| match part {
                ResponseContent::ToolCall(tc) => Some(tc),
                _ => None,
            })
            .collect()
    }

    /// Provider-executed tool results carried in this response.
    pub fn tool_results(&self) -> Vec<&RawToolResult> {
        self.content
            .iter()
            .filter_map(|part| match part {
                ResponseContent::ToolResult(tr) => Some(tr),
                _ => None,
            })
            .collect()
    }
}

/// Core trait implemented by all model providers.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "openai", "google").
    fn provider_name(&self) -> &str;

    /// The model ID this provider instance serves.
    fn model_id(&self) -> &str;

    /// Generate a response (non-streaming).
    async fn generate(&self, request: &ProviderRequest) -> Result<ProviderResponse>;

    /// Generate a response as a stream of normalized parts.
    async fn stream(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, std::result::Result<ProviderStreamPart, NauvooError>>>;
}
