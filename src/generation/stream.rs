//! Streaming text generation.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::{NauvooError, Result};
use crate::provider::{ModelProvider, ProviderRequest};
use crate::stream::run_tools::{run_tools_transformation, RunToolsOptions};
use crate::tools::execute::ToolCallbacks;
use crate::tools::parse::ToolCallRepairFn;
use crate::tools::tool::ToolSet;
use crate::types::{
    FinishReason, GenerationSettings, ModelMessage, StreamPart, ToolApprovalRequest, ToolCall,
    ToolOutput, Usage,
};

/// Options for [`stream_text`].
#[derive(Clone, Default)]
pub struct StreamTextOptions {
    pub system: Option<String>,
    pub settings: GenerationSettings,
    pub tools: Option<ToolSet>,
    pub repair_tool_call: Option<Arc<ToolCallRepairFn>>,
    pub callbacks: ToolCallbacks,
    pub abort: CancellationToken,
}

/// Stream one generation step, with tool calls parsed and executed as the
/// provider stream is consumed.
pub async fn stream_text(
    model: &dyn ModelProvider,
    messages: Vec<ModelMessage>,
    options: StreamTextOptions,
) -> Result<TextStream> {
    let request = ProviderRequest {
        system: options.system.clone(),
        messages: messages.clone(),
        settings: options.settings.clone(),
        tools: options
            .tools
            .as_ref()
            .filter(|t| !t.is_empty())
            .map(|t| t.to_definitions()),
        abort: options.abort.clone(),
    };

    let inner = model.stream(&request).await?;

    let parts = run_tools_transformation(
        inner,
        RunToolsOptions {
            tools: options.tools,
            repair_tool_call: options.repair_tool_call,
            messages,
            abort: options.abort,
            callbacks: options.callbacks,
            step: 0,
            model_id: model.model_id().to_string(),
        },
    );

    Ok(TextStream { inner: parts })
}

/// The resolved output part stream of one generation step.
pub struct TextStream {
    inner: BoxStream<'static, Result<StreamPart>>,
}

impl TextStream {
    pub fn into_inner(self) -> BoxStream<'static, Result<StreamPart>> {
        self.inner
    }

    /// Drain the stream into a final result.
    pub async fn collect(mut self) -> Result<StreamTextResult> {
        let mut text = String::new();
        let mut tool_calls = Vec::new();
        let mut tool_outputs = Vec::new();
        let mut approval_requests = Vec::new();
        let mut errors = Vec::new();
        let mut usage = Usage::default();
        let mut finish_reason = None;

        while let Some(part) = self.inner.next().await {
            match part? {
                StreamPart::TextDelta { delta, .. } => text.push_str(&delta),
                StreamPart::ToolCall(call) => tool_calls.push(call),
                StreamPart::ToolResult(result) => {
                    if !result.preliminary {
                        tool_outputs.push(ToolOutput::Result(result));
                    }
                }
                StreamPart::ToolError(error) => tool_outputs.push(ToolOutput::Error(error)),
                StreamPart::ToolApprovalRequest(request) => approval_requests.push(request),
                StreamPart::Error { error } => errors.push(error),
                StreamPart::Finish {
                    finish_reason: reason,
                    usage: step_usage,
                } => {
                    finish_reason = Some(reason);
                    usage = step_usage;
                }
                _ => {}
            }
        }

        Ok(StreamTextResult {
            text,
            tool_calls,
            tool_outputs,
            approval_requests,
            usage,
            finish_reason,
            errors,
        })
    }
}

impl Stream for TextStream {
    type Item = Result<StreamPart>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

/// Final result after consuming a text stream.
#[derive(Debug, Clone)]
pub struct StreamTextResult {
    /// Full accumulated text.
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    /// Terminal outcomes only; preliminary results are not retained.
    pub tool_outputs: Vec<ToolOutput>,
    pub approval_requests: Vec<ToolApprovalRequest>,
    pub usage: Usage,
    pub finish_reason: Option<FinishReason>,
    /// In-band error parts observed on the stream.
    pub errors: Vec<Arc<NauvooError>>,
}
