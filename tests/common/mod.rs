//! Shared test helpers and mock provider.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;

use nauvoo::error::{NauvooError, Result};
use nauvoo::provider::{ModelProvider, ProviderRequest, ProviderResponse, ResponseContent};
use nauvoo::types::*;

/// A mock provider that returns canned responses.
pub struct MockProvider {
    model_id: String,
    responses: Mutex<VecDeque<ProviderResponse>>,
    parts: Mutex<VecDeque<Vec<ProviderStreamPart>>>,
    /// Requests observed, for asserting what each step sent.
    pub requests: Mutex<Vec<ProviderRequest>>,
}

impl MockProvider {
    pub fn new(model_id: &str) -> Self {
        Self {
            model_id: model_id.to_string(),
            responses: Mutex::new(VecDeque::new()),
            parts: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a plain text response.
    pub fn queue_text(&self, text: &str) {
        self.queue_response(ProviderResponse {
            content: vec![ResponseContent::Text {
                text: text.to_string(),
            }],
            usage: test_usage(),
            finish_reason: FinishReason::Stop,
            response: ResponseMetadata::default(),
            warnings: Vec::new(),
        });
    }

    /// Queue a response containing one raw tool call.
    pub fn queue_tool_call(&self, id: &str, name: &str, input: &str) {
        self.queue_response(ProviderResponse {
            content: vec![ResponseContent::ToolCall(RawToolCall {
                tool_call_id: id.to_string(),
                tool_name: name.to_string(),
                input: input.to_string(),
                provider_executed: false,
                dynamic: false,
            })],
            usage: test_usage(),
            finish_reason: FinishReason::ToolCalls,
            response: ResponseMetadata::default(),
            warnings: Vec::new(),
        });
    }

    /// Queue a full response.
    pub fn queue_response(&self, response: ProviderResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Queue a scripted part stream for the next `stream` call.
    pub fn queue_parts(&self, parts: Vec<ProviderStreamPart>) {
        self.parts.lock().unwrap().push_back(parts);
    }

    /// Messages sent with the n-th request (0-based).
    pub fn request_messages(&self, n: usize) -> Vec<ModelMessage> {
        self.requests.lock().unwrap()[n].messages.clone()
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    fn provider_name(&self) -> &str {
        "mock"
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn generate(&self, request: &ProviderRequest) -> Result<ProviderResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| NauvooError::Model("no queued response".to_string()))
    }

    async fn stream(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<ProviderStreamPart>>> {
        self.requests.lock().unwrap().push(request.clone());
        let parts = self
            .parts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| NauvooError::Model("no queued parts".to_string()))?;
        Ok(futures::stream::iter(parts.into_iter().map(Ok)).boxed())
    }
}

pub fn test_usage() -> Usage {
    Usage {
        input_tokens: 10,
        output_tokens: 20,
        total_tokens: 30,
        ..Default::default()
    }
}

/// A raw tool call with default flags.
pub fn raw_call(id: &str, name: &str, input: &str) -> RawToolCall {
    RawToolCall {
        tool_call_id: id.to_string(),
        tool_name: name.to_string(),
        input: input.to_string(),
        provider_executed: false,
        dynamic: false,
    }
}
