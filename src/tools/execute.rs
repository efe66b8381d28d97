//! Execute a single tool call.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{NauvooError, Result};
use crate::types::{ModelMessage, ToolCall, ToolError, ToolOutput, ToolResult};

use super::tool::{ToolCallContext, ToolExecuteResponse, ToolSet};

/// Payload of the asynchronous "start" notification emitted before a tool's
/// execute function runs.
#[derive(Debug, Clone)]
pub struct ToolCallStartInfo {
    pub step: usize,
    pub model_id: String,
    pub tool_call: ToolCall,
    pub messages: Vec<ModelMessage>,
}

/// Payload of the "finish" notification emitted once execution settles.
#[derive(Debug, Clone)]
pub struct ToolCallFinishInfo {
    pub step: usize,
    pub model_id: String,
    pub tool_call: ToolCall,
    pub success: bool,
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
    pub duration: Duration,
}

type CallbackFn<T> = dyn Fn(T) -> BoxFuture<'static, Result<()>> + Send + Sync;

/// Lifecycle callbacks around tool execution. Each is optional and
/// fault-isolated: a failing callback is logged and never breaks the call.
#[derive(Clone, Default)]
pub struct ToolCallbacks {
    pub on_tool_call_start: Option<Arc<CallbackFn<ToolCallStartInfo>>>,
    pub on_tool_call_finish: Option<Arc<CallbackFn<ToolCallFinishInfo>>>,
}

impl ToolCallbacks {
    pub fn on_start<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(ToolCallStartInfo) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        self.on_tool_call_start = Some(Arc::new(move |info| Box::pin(callback(info))));
        self
    }

    pub fn on_finish<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(ToolCallFinishInfo) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        self.on_tool_call_finish = Some(Arc::new(move |info| Box::pin(callback(info))));
        self
    }
}

impl std::fmt::Debug for ToolCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCallbacks")
            .field("on_tool_call_start", &self.on_tool_call_start.is_some())
            .field("on_tool_call_finish", &self.on_tool_call_finish.is_some())
            .finish()
    }
}

/// Options for [`execute_tool_call`].
#[derive(Clone, Default)]
pub struct ExecuteToolCallOptions {
    pub step: usize,
    pub model_id: String,
    pub messages: Vec<ModelMessage>,
    pub abort: CancellationToken,
    pub callbacks: ToolCallbacks,
    /// Invoked for each intermediate value a streaming tool yields.
    pub on_preliminary: Option<Arc<dyn Fn(ToolResult) + Send + Sync>>,
}

/// Execute one tool call if (and only if) the tool exposes an execute
/// function; returns `None` otherwise.
///
/// Success and failure both settle into a [`ToolOutput`]: execution errors
/// become [`ToolOutput::Error`] carrying the raised error verbatim, never a
/// propagated `Err`.
pub async fn execute_tool_call(
    tool_call: &ToolCall,
    tools: &ToolSet,
    opts: ExecuteToolCallOptions,
) -> Option<ToolOutput> {
    let tool = tools.get(&tool_call.tool_name)?;
    let execute = tool.execute_fn()?.clone();
    let dynamic = tool.is_dynamic();

    if let Some(callback) = &opts.callbacks.on_tool_call_start {
        let info = ToolCallStartInfo {
            step: opts.step,
            model_id: opts.model_id.clone(),
            tool_call: tool_call.clone(),
            messages: opts.messages.clone(),
        };
        if let Err(e) = callback(info).await {
            warn!(tool = %tool_call.tool_name, error = %e, "on_tool_call_start callback failed");
        }
    }

    let ctx = ToolCallContext {
        tool_call_id: tool_call.tool_call_id.clone(),
        tool_name: tool_call.tool_name.clone(),
        messages: opts.messages.clone(),
        abort: opts.abort.clone(),
        metadata: serde_json::Value::Null,
    };

    let started = Instant::now();
    let outcome = run_execute(execute(tool_call.input.clone(), ctx), tool_call, dynamic, &opts);
    let outcome = outcome.await;
    let duration = started.elapsed();

    match outcome {
        Ok(output) => {
            // Output telemetry is best-effort: skip the field if the value
            // cannot be serialized.
            match serde_json::to_string(&output) {
                Ok(serialized) => debug!(
                    tool = %tool_call.tool_name,
                    tool_call_id = %tool_call.tool_call_id,
                    duration_ms = duration.as_millis() as u64,
                    output = %serialized,
                    "tool executed"
                ),
                Err(_) => debug!(
                    tool = %tool_call.tool_name,
                    tool_call_id = %tool_call.tool_call_id,
                    duration_ms = duration.as_millis() as u64,
                    "tool executed"
                ),
            }

            emit_finish(
                &opts,
                tool_call,
                true,
                Some(output.clone()),
                None,
                duration,
            )
            .await;

            Some(ToolOutput::Result(ToolResult {
                tool_call_id: tool_call.tool_call_id.clone(),
                tool_name: tool_call.tool_name.clone(),
                input: tool_call.input.clone(),
                output,
                provider_executed: false,
                dynamic,
                preliminary: false,
            }))
        }
        Err(error) => {
            warn!(
                tool = %tool_call.tool_name,
                tool_call_id = %tool_call.tool_call_id,
                duration_ms = duration.as_millis() as u64,
                error = %error,
                "tool execution failed"
            );

            emit_finish(&opts, tool_call, false, None, Some(error.to_string()), duration).await;

            Some(ToolOutput::Error(ToolError {
                tool_call_id: tool_call.tool_call_id.clone(),
                tool_name: tool_call.tool_name.clone(),
                input: tool_call.input.clone(),
                error: Arc::new(error),
                provider_executed: false,
                dynamic,
            }))
        }
    }
}

async fn run_execute(
    response: ToolExecuteResponse,
    tool_call: &ToolCall,
    dynamic: bool,
    opts: &ExecuteToolCallOptions,
) -> Result<serde_json::Value> {
    match response {
        ToolExecuteResponse::Value(future) => future.await,
        ToolExecuteResponse::Stream(mut stream) => {
            let mut last = None;
            while let Some(item) = stream.next().await {
                let value = item?;
                if let Some(on_preliminary) = &opts.on_preliminary {
                    on_preliminary(ToolResult {
                        tool_call_id: tool_call.tool_call_id.clone(),
                        tool_name: tool_call.tool_name.clone(),
                        input: tool_call.input.clone(),
                        output: value.clone(),
                        provider_executed: false,
                        dynamic,
                        preliminary: true,
                    });
                }
                last = Some(value);
            }
            last.ok_or_else(|| NauvooError::ToolExecution {
                tool_name: tool_call.tool_name.clone(),
                message: "streaming tool produced no result".to_string(),
            })
        }
    }
}

async fn emit_finish(
    opts: &ExecuteToolCallOptions,
    tool_call: &ToolCall,
    success: bool,
    output: Option<serde_json::Value>,
    error: Option<String>,
    duration: Duration,
) {
    if let Some(callback) = &opts.callbacks.on_tool_call_finish {
        let info = ToolCallFinishInfo {
            step: opts.step,
            model_id: opts.model_id.clone(),
            tool_call: tool_call.clone(),
            success,
            output,
            error,
            duration,
        };
        if let Err(e) = callback(info).await {
            warn!(tool = %tool_call.tool_name, error = %e, "on_tool_call_finish callback failed");
        }
    }
}
