//! Tool-run stream transformation.
//!
//! Consumes the provider's normalized part stream, forwards text and
//! reasoning immediately, parses and executes tool calls without blocking the
//! stream, and merges asynchronous tool results back in. The `finish` part is
//! withheld until every outstanding execution has settled, so a consumer
//! never observes `finish` before a tool result it should see.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::sync::Notify;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{NauvooError, Result};
use crate::tools::execute::{execute_tool_call, ExecuteToolCallOptions, ToolCallbacks};
use crate::tools::parse::{parse_tool_call, ToolCallRepairFn};
use crate::tools::tool::{ToolCallContext, ToolSet};
use crate::types::{
    GeneratedFile, ModelMessage, ProviderStreamPart, StreamPart, ToolApprovalRequest, ToolCall,
    ToolError, ToolOutput, ToolResult,
};
use crate::util::id::generate_id;

use super::merge::merge_streams;

/// Tool executions still in flight for one generation run.
///
/// The output stream must not close, and the buffered `finish` part must not
/// be emitted, while this set is non-empty.
struct OutstandingWork {
    ids: Mutex<HashSet<String>>,
    notify: Notify,
}

impl OutstandingWork {
    fn new() -> Self {
        Self {
            ids: Mutex::new(HashSet::new()),
            notify: Notify::new(),
        }
    }

    fn begin(&self, id: &str) {
        self.ids.lock().unwrap().insert(id.to_string());
    }

    fn finish(&self, id: &str) {
        let mut ids = self.ids.lock().unwrap();
        ids.remove(id);
        if ids.is_empty() {
            self.notify.notify_waiters();
        }
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.notify.notified();
            if self.ids.lock().unwrap().is_empty() {
                return;
            }
            notified.await;
        }
    }
}

/// Options for [`run_tools_transformation`].
#[derive(Clone, Default)]
pub struct RunToolsOptions {
    pub tools: Option<ToolSet>,
    pub repair_tool_call: Option<Arc<ToolCallRepairFn>>,
    pub messages: Vec<ModelMessage>,
    pub abort: CancellationToken,
    pub callbacks: ToolCallbacks,
    pub step: usize,
    pub model_id: String,
}

/// Transform a provider part stream into a resolved output part stream.
///
/// Text, reasoning, and tool-input fragments are forwarded unchanged and
/// immediately. Completed tool calls are parsed and, when the tool has an
/// execute function, run concurrently with continued stream consumption;
/// their results arrive on a secondary channel that is fairly merged with
/// the forwarded stream.
pub fn run_tools_transformation(
    input: BoxStream<'static, Result<ProviderStreamPart>>,
    options: RunToolsOptions,
) -> BoxStream<'static, Result<StreamPart>> {
    let (results_tx, results_rx) = mpsc::unbounded_channel::<Result<StreamPart>>();
    let outstanding = Arc::new(OutstandingWork::new());

    let forward_outstanding = Arc::clone(&outstanding);
    let forwarded = async_stream::stream! {
        // raw inputs by call id, to enrich provider-executed results that
        // arrive without one
        let mut tool_inputs: HashMap<String, serde_json::Value> = HashMap::new();
        // parsed calls by id, to resolve provider-emitted approval requests
        let mut parsed_calls: HashMap<String, ToolCall> = HashMap::new();
        // the finish part is held until stream teardown
        let mut finish: Option<StreamPart> = None;

        let mut input = std::pin::pin!(input);
        while let Some(item) = input.next().await {
            let part = match item {
                Ok(part) => part,
                Err(e) => {
                    yield Err(e);
                    break;
                }
            };

            match part {
                ProviderStreamPart::StreamStart { warnings } => {
                    yield Ok(StreamPart::StreamStart { warnings });
                }
                ProviderStreamPart::TextStart { id } => {
                    yield Ok(StreamPart::TextStart { id });
                }
                ProviderStreamPart::TextDelta { id, delta } => {
                    yield Ok(StreamPart::TextDelta { id, delta });
                }
                ProviderStreamPart::TextEnd { id } => {
                    yield Ok(StreamPart::TextEnd { id });
                }
                ProviderStreamPart::ReasoningStart { id } => {
                    yield Ok(StreamPart::ReasoningStart { id });
                }
                ProviderStreamPart::ReasoningDelta { id, delta } => {
                    yield Ok(StreamPart::ReasoningDelta { id, delta });
                }
                ProviderStreamPart::ReasoningEnd { id } => {
                    yield Ok(StreamPart::ReasoningEnd { id });
                }
                ProviderStreamPart::ToolInputStart { id, tool_name, dynamic } => {
                    yield Ok(StreamPart::ToolInputStart { id, tool_name, dynamic });
                }
                ProviderStreamPart::ToolInputDelta { id, delta } => {
                    yield Ok(StreamPart::ToolInputDelta { id, delta });
                }
                ProviderStreamPart::ToolInputEnd { id } => {
                    yield Ok(StreamPart::ToolInputEnd { id });
                }
                ProviderStreamPart::Source(source) => {
                    yield Ok(StreamPart::Source(source));
                }
                ProviderStreamPart::ResponseMetadata(metadata) => {
                    yield Ok(StreamPart::ResponseMetadata(metadata));
                }
                ProviderStreamPart::Raw { raw } => {
                    yield Ok(StreamPart::Raw(raw));
                }
                ProviderStreamPart::Error { message } => {
                    yield Ok(StreamPart::Error {
                        error: Arc::new(NauvooError::Model(message)),
                    });
                }
                ProviderStreamPart::File { data, media_type } => {
                    yield Ok(StreamPart::File(GeneratedFile::new(data, media_type)));
                }
                ProviderStreamPart::Finish { finish_reason, usage } => {
                    finish = Some(StreamPart::Finish { finish_reason, usage });
                }
                ProviderStreamPart::ToolApprovalRequest { approval_id, tool_call_id } => {
                    match parsed_calls.get(&tool_call_id) {
                        Some(tool_call) => {
                            yield Ok(StreamPart::ToolApprovalRequest(ToolApprovalRequest {
                                approval_id,
                                tool_call: tool_call.clone(),
                            }));
                        }
                        None => {
                            // fail loudly, but keep the pipeline alive
                            let _ = results_tx.send(Ok(StreamPart::Error {
                                error: Arc::new(NauvooError::ToolCallNotFoundForApproval {
                                    tool_call_id,
                                    approval_id,
                                }),
                            }));
                        }
                    }
                }
                ProviderStreamPart::ToolCall(raw) => {
                    let call = parse_tool_call(
                        &raw,
                        options.tools.as_ref(),
                        options.repair_tool_call.as_ref(),
                    )
                    .await;

                    parsed_calls.insert(call.tool_call_id.clone(), call.clone());
                    yield Ok(StreamPart::ToolCall(call.clone()));

                    if call.invalid {
                        // every call attempt gets a terminal outcome downstream
                        let message = call
                            .error
                            .clone()
                            .unwrap_or_else(|| "invalid tool call".to_string());
                        let _ = results_tx.send(Ok(StreamPart::ToolError(ToolError {
                            tool_call_id: call.tool_call_id.clone(),
                            tool_name: call.tool_name.clone(),
                            input: call.input.clone(),
                            error: Arc::new(NauvooError::InvalidToolCall {
                                tool_name: call.tool_name.clone(),
                                message,
                            }),
                            provider_executed: call.provider_executed,
                            dynamic: true,
                        })));
                        continue;
                    }

                    // unknown tools (e.g. provider-executed dynamic calls)
                    // have nothing to run locally
                    let Some(tool) = options.tools.as_ref().and_then(|t| t.get(&call.tool_name))
                    else {
                        continue;
                    };

                    let ctx = ToolCallContext {
                        tool_call_id: call.tool_call_id.clone(),
                        tool_name: call.tool_name.clone(),
                        messages: options.messages.clone(),
                        abort: options.abort.clone(),
                        metadata: serde_json::Value::Null,
                    };

                    if let Some(hook) = tool.on_input_available_fn() {
                        if let Err(e) = hook(call.input.clone(), ctx.clone()).await {
                            warn!(tool = %call.tool_name, error = %e, "on_input_available hook failed");
                        }
                    }

                    if tool.needs_approval(&call.input, &ctx).await {
                        let _ = results_tx.send(Ok(StreamPart::ToolApprovalRequest(
                            ToolApprovalRequest {
                                approval_id: generate_id(),
                                tool_call: call.clone(),
                            },
                        )));
                        continue;
                    }

                    tool_inputs.insert(call.tool_call_id.clone(), call.input.clone());

                    if tool.has_execute() && !call.provider_executed {
                        // own execution id to guarantee uniqueness within the run
                        let execution_id = generate_id();
                        forward_outstanding.begin(&execution_id);

                        let exec_tools = options.tools.clone().unwrap_or_default();
                        let exec_call = call.clone();
                        let exec_tx = results_tx.clone();
                        let preliminary_tx = results_tx.clone();
                        let exec_outstanding = Arc::clone(&forward_outstanding);
                        let exec_opts = ExecuteToolCallOptions {
                            step: options.step,
                            model_id: options.model_id.clone(),
                            messages: options.messages.clone(),
                            abort: options.abort.clone(),
                            callbacks: options.callbacks.clone(),
                            on_preliminary: Some(Arc::new(move |result: ToolResult| {
                                let _ = preliminary_tx.send(Ok(StreamPart::ToolResult(result)));
                            })),
                        };

                        // execution is not awaited: the next input chunk is
                        // processed while the tool runs
                        tokio::spawn(async move {
                            match execute_tool_call(&exec_call, &exec_tools, exec_opts).await {
                                Some(ToolOutput::Result(result)) => {
                                    let _ = exec_tx.send(Ok(StreamPart::ToolResult(result)));
                                }
                                Some(ToolOutput::Error(error)) => {
                                    let _ = exec_tx.send(Ok(StreamPart::ToolError(error)));
                                }
                                None => {}
                            }
                            exec_outstanding.finish(&execution_id);
                        });
                    }
                }
                ProviderStreamPart::ToolResult(raw) => {
                    let input = tool_inputs
                        .get(&raw.tool_call_id)
                        .cloned()
                        .unwrap_or(serde_json::Value::Null);

                    if raw.is_error {
                        let _ = results_tx.send(Ok(StreamPart::ToolError(ToolError {
                            tool_call_id: raw.tool_call_id,
                            tool_name: raw.tool_name.clone(),
                            input,
                            error: Arc::new(NauvooError::ProviderTool {
                                tool_name: raw.tool_name,
                                payload: raw.result,
                            }),
                            provider_executed: true,
                            dynamic: raw.dynamic,
                        })));
                    } else {
                        yield Ok(StreamPart::ToolResult(ToolResult {
                            tool_call_id: raw.tool_call_id,
                            tool_name: raw.tool_name,
                            input,
                            output: raw.result,
                            provider_executed: true,
                            dynamic: raw.dynamic,
                            preliminary: false,
                        }));
                    }
                }
            }
        }

        // upstream is flushed; the buffered finish part trails every tool
        // result, including ones that settle after the provider stream ended
        forward_outstanding.wait_idle().await;
        if let Some(finish) = finish.take() {
            let _ = results_tx.send(Ok(finish));
        }
        drop(results_tx);
    };

    merge_streams(
        forwarded.boxed(),
        UnboundedReceiverStream::new(results_rx).boxed(),
    )
}
