//! Non-streaming text generation with the multi-step tool loop.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, BoxFuture};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{NauvooError, Result};
use crate::provider::{ModelProvider, ProviderRequest, ResponseContent};
use crate::stop::{is_stop_condition_met, step_count_is, StopCondition};
use crate::tools::execute::{execute_tool_call, ExecuteToolCallOptions, ToolCallbacks};
use crate::tools::parse::{parse_tool_call, ToolCallRepairFn};
use crate::tools::tool::{ToolCallContext, ToolSet};
use crate::types::{
    ContentPart, FinishReason, GenerateTextResult, GenerationSettings, MessageToolResult,
    ModelMessage, StepResult, ToolApprovalRequest, ToolCall, ToolError, ToolOutput, ToolResult,
};
use crate::util::id::generate_id;
use crate::util::timeout::AbortAfter;

/// Maximum loop iterations, a backstop on top of stop conditions.
const MAX_TOOL_ITERATIONS: usize = 20;

type LifecycleFn<T> = dyn Fn(T) -> BoxFuture<'static, Result<()>> + Send + Sync;

/// Lifecycle callbacks for a generation run. All optional, all
/// fault-isolated: a throwing callback never aborts the run.
#[derive(Clone, Default)]
pub struct GenerationCallbacks {
    pub tool: ToolCallbacks,
    pub on_step_finish: Option<Arc<LifecycleFn<StepResult>>>,
    pub on_finish: Option<Arc<LifecycleFn<GenerateTextResult>>>,
}

impl GenerationCallbacks {
    pub fn on_step_finish<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(StepResult) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        self.on_step_finish = Some(Arc::new(move |step| Box::pin(callback(step))));
        self
    }

    pub fn on_finish<F, Fut>(mut self, callback: F) -> Self
    where
        F: Fn(GenerateTextResult) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        self.on_finish = Some(Arc::new(move |result| Box::pin(callback(result))));
        self
    }
}

/// Input to the per-step override hook.
#[derive(Debug, Clone)]
pub struct PrepareStepContext {
    pub step: usize,
    pub messages: Vec<ModelMessage>,
}

/// Overrides applied to a single step. `None` fields keep the run's values.
#[derive(Default)]
pub struct StepOverrides {
    pub model: Option<Arc<dyn ModelProvider>>,
    pub system: Option<String>,
    pub settings: Option<GenerationSettings>,
    pub tools: Option<ToolSet>,
}

/// Hook allowing model/system/tool rotation across steps.
pub type PrepareStepFn =
    dyn Fn(PrepareStepContext) -> BoxFuture<'static, Result<StepOverrides>> + Send + Sync;

/// Options for [`generate_text`].
#[derive(Clone, Default)]
pub struct GenerateTextOptions {
    pub system: Option<String>,
    pub settings: GenerationSettings,
    pub tools: ToolSet,
    /// OR'd stop conditions; empty means stop after exactly one step.
    pub stop_when: Vec<Arc<dyn StopCondition>>,
    pub repair_tool_call: Option<Arc<ToolCallRepairFn>>,
    pub prepare_step: Option<Arc<PrepareStepFn>>,
    pub callbacks: GenerationCallbacks,
    pub abort: CancellationToken,
    pub total_timeout: Option<Duration>,
    pub step_timeout: Option<Duration>,
}

/// Generate text, driving repeated model calls when tools are used.
///
/// After each model response, client-side tool calls are executed
/// concurrently and their results appended as a new tool message; the loop
/// repeats while tool work keeps resolving (or deferred provider results are
/// outstanding) and no stop condition is met.
pub async fn generate_text(
    model: Arc<dyn ModelProvider>,
    messages: Vec<ModelMessage>,
    options: GenerateTextOptions,
) -> Result<GenerateTextResult> {
    let mut messages = messages;

    let stop_conditions: Vec<Arc<dyn StopCondition>> = if options.stop_when.is_empty() {
        vec![step_count_is(1)]
    } else {
        options.stop_when.clone()
    };

    // total-run timeout as a derived abort signal, cleared on drop
    let total_guard = options
        .total_timeout
        .map(|duration| AbortAfter::new(&options.abort, duration));
    let run_abort = match &total_guard {
        Some(guard) => guard.token(),
        None => options.abort.clone(),
    };

    let mut steps: Vec<StepResult> = Vec::new();
    let mut total_usage = crate::types::Usage::default();
    // all parsed calls this run, for matching provider results and approvals
    let mut calls_by_id: HashMap<String, ToolCall> = HashMap::new();
    // provider-executed calls whose result has not arrived yet
    let mut pending_deferred: HashMap<String, ToolCall> = HashMap::new();
    let mut processed_approvals: HashSet<String> = HashSet::new();
    let mut capped = false;

    for iteration in 0.. {
        if run_abort.is_cancelled() {
            return Err(abort_error(&options));
        }
        if iteration >= MAX_TOOL_ITERATIONS {
            warn!("generate_text: tool loop hit the iteration backstop");
            capped = true;
            break;
        }

        // 1-2. resolve pending approval responses from the conversation
        let approvals = collect_pending_approvals(&messages, &mut processed_approvals);
        let mut step_outputs: Vec<ToolOutput> = Vec::new();
        let mut approval_result_content: Vec<ContentPart> = Vec::new();

        for approval in approvals {
            let call = &approval.request.tool_call;
            if approval.approved {
                // provider-executed approvals are forwarded to the provider
                // verbatim through the message history
                if call.provider_executed {
                    continue;
                }
                let output = execute_tool_call(
                    call,
                    &options.tools,
                    ExecuteToolCallOptions {
                        step: iteration,
                        model_id: model.model_id().to_string(),
                        messages: messages.clone(),
                        abort: run_abort.clone(),
                        callbacks: options.callbacks.tool.clone(),
                        on_preliminary: None,
                    },
                )
                .await;
                if let Some(output) = output {
                    approval_result_content.push(ContentPart::ToolResult(MessageToolResult {
                        tool_call_id: call.tool_call_id.clone(),
                        tool_name: call.tool_name.clone(),
                        result: output.to_message_payload(),
                        is_error: output.is_error(),
                    }));
                    step_outputs.push(output);
                }
            } else {
                let error = NauvooError::ToolExecutionDenied {
                    tool_name: call.tool_name.clone(),
                };
                approval_result_content.push(ContentPart::ToolResult(MessageToolResult {
                    tool_call_id: call.tool_call_id.clone(),
                    tool_name: call.tool_name.clone(),
                    result: serde_json::json!({ "error": error.to_string() }),
                    is_error: true,
                }));
                step_outputs.push(ToolOutput::Error(ToolError {
                    tool_call_id: call.tool_call_id.clone(),
                    tool_name: call.tool_name.clone(),
                    input: call.input.clone(),
                    error: Arc::new(error),
                    provider_executed: call.provider_executed,
                    dynamic: call.dynamic,
                }));
            }
        }
        if !approval_result_content.is_empty() {
            messages.push(ModelMessage::tool_with_content(approval_result_content));
        }

        // 3. per-step overrides
        let mut step_model = Arc::clone(&model);
        let mut step_system = options.system.clone();
        let mut step_settings = options.settings.clone();
        let mut step_tools = options.tools.clone();
        if let Some(prepare) = &options.prepare_step {
            let overrides = prepare(PrepareStepContext {
                step: iteration,
                messages: messages.clone(),
            })
            .await?;
            if let Some(model) = overrides.model {
                step_model = model;
            }
            if let Some(system) = overrides.system {
                step_system = Some(system);
            }
            if let Some(settings) = overrides.settings {
                step_settings = settings;
            }
            if let Some(tools) = overrides.tools {
                step_tools = tools;
            }
        }

        // per-step timeout as a derived abort signal
        let step_guard = options
            .step_timeout
            .map(|duration| AbortAfter::new(&run_abort, duration));
        let step_abort = match &step_guard {
            Some(guard) => guard.token(),
            None => run_abort.clone(),
        };

        let request = ProviderRequest {
            system: step_system,
            messages: messages.clone(),
            settings: step_settings,
            tools: if step_tools.is_empty() {
                None
            } else {
                Some(step_tools.to_definitions())
            },
            abort: step_abort.clone(),
        };

        debug!(step = iteration, model = step_model.model_id(), "generate_text: calling model");
        let response = tokio::select! {
            biased;
            _ = step_abort.cancelled() => return Err(abort_error(&options)),
            result = step_model.generate(&request) => result?,
        };
        drop(step_guard);

        // 4. parse tool calls out of the response
        let mut step_tool_calls: Vec<ToolCall> = Vec::new();
        for raw in response.tool_calls() {
            let call = parse_tool_call(
                raw,
                Some(&step_tools),
                options.repair_tool_call.as_ref(),
            )
            .await;
            calls_by_id.insert(call.tool_call_id.clone(), call.clone());
            step_tool_calls.push(call);
        }

        // provider-executed results carried in this response
        for raw in response.tool_results() {
            match calls_by_id.get(&raw.tool_call_id) {
                Some(call) => {
                    pending_deferred.remove(&raw.tool_call_id);
                    step_outputs.push(provider_output(raw, call.input.clone()));
                }
                None => {
                    let supports_deferred = step_tools
                        .get(&raw.tool_name)
                        .map(|t| t.supports_deferred_results())
                        .unwrap_or(false);
                    if !supports_deferred {
                        return Err(NauvooError::ToolCallNotFoundForResult {
                            tool_call_id: raw.tool_call_id.clone(),
                        });
                    }
                    step_outputs.push(provider_output(raw, serde_json::Value::Null));
                }
            }
        }

        // 5. hooks, approval gating, and selection of executable calls
        let mut approval_requests: Vec<ToolApprovalRequest> = Vec::new();
        let mut executable: Vec<ToolCall> = Vec::new();
        let mut tool_message_content: Vec<ContentPart> = Vec::new();

        for call in &step_tool_calls {
            if call.invalid {
                let message = call
                    .error
                    .clone()
                    .unwrap_or_else(|| "invalid tool call".to_string());
                let error = NauvooError::InvalidToolCall {
                    tool_name: call.tool_name.clone(),
                    message,
                };
                tool_message_content.push(ContentPart::ToolResult(MessageToolResult {
                    tool_call_id: call.tool_call_id.clone(),
                    tool_name: call.tool_name.clone(),
                    result: serde_json::json!({ "error": error.to_string() }),
                    is_error: true,
                }));
                step_outputs.push(ToolOutput::Error(ToolError {
                    tool_call_id: call.tool_call_id.clone(),
                    tool_name: call.tool_name.clone(),
                    input: call.input.clone(),
                    error: Arc::new(error),
                    provider_executed: call.provider_executed,
                    dynamic: true,
                }));
                continue;
            }

            let Some(tool) = step_tools.get(&call.tool_name) else {
                continue;
            };

            let ctx = ToolCallContext {
                tool_call_id: call.tool_call_id.clone(),
                tool_name: call.tool_name.clone(),
                messages: messages.clone(),
                abort: run_abort.clone(),
                metadata: serde_json::Value::Null,
            };

            if let Some(hook) = tool.on_input_available_fn() {
                if let Err(e) = hook(call.input.clone(), ctx.clone()).await {
                    warn!(tool = %call.tool_name, error = %e, "on_input_available hook failed");
                }
            }

            if call.provider_executed {
                let has_result = step_outputs
                    .iter()
                    .any(|o| o.tool_call_id() == call.tool_call_id);
                if tool.supports_deferred_results() && !has_result {
                    pending_deferred.insert(call.tool_call_id.clone(), call.clone());
                }
                continue;
            }

            if tool.needs_approval(&call.input, &ctx).await {
                approval_requests.push(ToolApprovalRequest {
                    approval_id: generate_id(),
                    tool_call: call.clone(),
                });
                continue;
            }

            if tool.has_execute() {
                executable.push(call.clone());
            }
        }

        // 6. execute client-side calls concurrently
        let executed = join_all(executable.iter().map(|call| {
            execute_tool_call(
                call,
                &step_tools,
                ExecuteToolCallOptions {
                    step: iteration,
                    model_id: step_model.model_id().to_string(),
                    messages: messages.clone(),
                    abort: run_abort.clone(),
                    callbacks: options.callbacks.tool.clone(),
                    on_preliminary: None,
                },
            )
        }))
        .await;
        for output in executed.into_iter().flatten() {
            tool_message_content.push(ContentPart::ToolResult(MessageToolResult {
                tool_call_id: output.tool_call_id().to_string(),
                tool_name: output.tool_name().to_string(),
                result: output.to_message_payload(),
                is_error: output.is_error(),
            }));
            step_outputs.push(output);
        }

        // 8. append the step's content as response messages
        let text = response.text();
        let reasoning: String = response
            .content
            .iter()
            .filter_map(|part| match part {
                ResponseContent::Reasoning { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("");

        let mut assistant_content: Vec<ContentPart> = Vec::new();
        if !text.is_empty() {
            assistant_content.push(ContentPart::Text { text: text.clone() });
        }
        if !reasoning.is_empty() {
            assistant_content.push(ContentPart::Reasoning {
                text: reasoning.clone(),
            });
        }
        for call in &step_tool_calls {
            assistant_content.push(ContentPart::ToolCall(call.clone()));
        }
        for request in &approval_requests {
            assistant_content.push(ContentPart::ToolApprovalRequest(request.clone()));
        }
        if !assistant_content.is_empty() {
            messages.push(ModelMessage::assistant_with_content(assistant_content));
        }
        if !tool_message_content.is_empty() {
            messages.push(ModelMessage::tool_with_content(tool_message_content));
        }

        let step = StepResult {
            text,
            reasoning,
            tool_calls: step_tool_calls,
            tool_outputs: step_outputs,
            approval_requests,
            finish_reason: response.finish_reason,
            usage: response.usage.clone(),
            response: response.response.clone(),
            warnings: response.warnings.clone(),
        };
        total_usage.merge(&step.usage);

        if let Some(callback) = &options.callbacks.on_step_finish {
            if let Err(e) = callback(step.clone()).await {
                warn!(error = %e, "on_step_finish callback failed");
            }
        }
        steps.push(step);

        // 9. decide whether to run another step
        let stop = is_stop_condition_met(&stop_conditions, &steps).await;
        if !pending_deferred.is_empty() {
            debug!(
                pending = pending_deferred.len(),
                "generate_text: deferred tool results outstanding, continuing"
            );
            continue;
        }
        if stop {
            break;
        }
        let step = steps.last().expect("at least one step recorded");
        let client_calls = step.client_tool_calls();
        let all_resolved = !client_calls.is_empty()
            && client_calls
                .iter()
                .all(|c| step.tool_output(&c.tool_call_id).is_some());
        if !all_resolved {
            break;
        }
    }

    let finish_reason = if capped {
        FinishReason::Length
    } else {
        steps
            .last()
            .map(|s| s.finish_reason)
            .unwrap_or(FinishReason::Unknown)
    };
    let text = steps.last().map(|s| s.text.clone()).unwrap_or_default();

    let result = GenerateTextResult {
        text,
        steps,
        messages,
        usage: total_usage,
        finish_reason,
    };

    if let Some(callback) = &options.callbacks.on_finish {
        if let Err(e) = callback(result.clone()).await {
            warn!(error = %e, "on_finish callback failed");
        }
    }

    Ok(result)
}

fn abort_error(options: &GenerateTextOptions) -> NauvooError {
    if options.abort.is_cancelled() {
        NauvooError::Aborted
    } else {
        let duration = options
            .step_timeout
            .or(options.total_timeout)
            .unwrap_or_default();
        NauvooError::Timeout(duration.as_millis() as u64)
    }
}

fn provider_output(raw: &crate::types::RawToolResult, input: serde_json::Value) -> ToolOutput {
    if raw.is_error {
        ToolOutput::Error(ToolError {
            tool_call_id: raw.tool_call_id.clone(),
            tool_name: raw.tool_name.clone(),
            input,
            error: Arc::new(NauvooError::ProviderTool {
                tool_name: raw.tool_name.clone(),
                payload: raw.result.clone(),
            }),
            provider_executed: true,
            dynamic: raw.dynamic,
        })
    } else {
        ToolOutput::Result(ToolResult {
            tool_call_id: raw.tool_call_id.clone(),
            tool_name: raw.tool_name.clone(),
            input,
            output: raw.result.clone(),
            provider_executed: true,
            dynamic: raw.dynamic,
            preliminary: false,
        })
    }
}

struct ResolvedApproval {
    request: ToolApprovalRequest,
    approved: bool,
}

/// Find approval requests whose response has arrived but whose tool call has
/// not produced a result yet.
fn collect_pending_approvals(
    messages: &[ModelMessage],
    processed: &mut HashSet<String>,
) -> Vec<ResolvedApproval> {
    let mut requests: HashMap<&str, &ToolApprovalRequest> = HashMap::new();
    let mut responses: Vec<&crate::types::ToolApprovalResponse> = Vec::new();
    let mut resulted: HashSet<&str> = HashSet::new();

    for message in messages {
        for part in &message.content {
            match part {
                ContentPart::ToolApprovalRequest(request) => {
                    requests.insert(request.approval_id.as_str(), request);
                }
                ContentPart::ToolApprovalResponse(response) => {
                    responses.push(response);
                }
                ContentPart::ToolResult(result) => {
                    resulted.insert(result.tool_call_id.as_str());
                }
                _ => {}
            }
        }
    }

    let mut pending = Vec::new();
    for response in responses {
        let Some(request) = requests.get(response.approval_id.as_str()) else {
            warn!(
                approval_id = %response.approval_id,
                "approval response does not match any request"
            );
            continue;
        };
        if resulted.contains(request.tool_call.tool_call_id.as_str()) {
            continue;
        }
        if !processed.insert(response.approval_id.clone()) {
            continue;
        }
        pending.push(ResolvedApproval {
            request: (*request).clone(),
            approved: response.approved,
        });
    }
    pending
}
