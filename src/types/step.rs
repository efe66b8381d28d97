//! Step and final results for the multi-step generation loop.

use super::generation::{FinishReason, ResponseMetadata};
use super::message::{ModelMessage, ToolApprovalRequest};
use super::part::{ToolCall, ToolOutput};
use super::usage::Usage;

/// One model round-trip: content, tool activity, and metadata.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub text: String,
    pub reasoning: String,
    pub tool_calls: Vec<ToolCall>,
    pub tool_outputs: Vec<ToolOutput>,
    pub approval_requests: Vec<ToolApprovalRequest>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
    pub response: ResponseMetadata,
    pub warnings: Vec<String>,
}

impl StepResult {
    /// Tool calls that are executed locally (valid, not provider-executed).
    pub fn client_tool_calls(&self) -> Vec<&ToolCall> {
        self.tool_calls
            .iter()
            .filter(|tc| !tc.provider_executed && !tc.invalid)
            .collect()
    }

    /// Whether this step requested any tool calls.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Look up the terminal output for a tool call, if one was produced.
    pub fn tool_output(&self, tool_call_id: &str) -> Option<&ToolOutput> {
        self.tool_outputs
            .iter()
            .find(|out| out.tool_call_id() == tool_call_id)
    }
}

/// Final result after the orchestration loop completes.
#[derive(Debug, Clone)]
pub struct GenerateTextResult {
    /// Text of the final step.
    pub text: String,
    /// All steps in order.
    pub steps: Vec<StepResult>,
    /// Full conversation including generated response messages.
    pub messages: Vec<ModelMessage>,
    /// Accumulated usage across all steps.
    pub usage: Usage,
    pub finish_reason: FinishReason,
}

impl GenerateTextResult {
    /// Tool calls across all steps.
    pub fn tool_calls(&self) -> Vec<&ToolCall> {
        self.steps.iter().flat_map(|s| s.tool_calls.iter()).collect()
    }

    /// Tool outputs across all steps.
    pub fn tool_outputs(&self) -> Vec<&ToolOutput> {
        self.steps.iter().flat_map(|s| s.tool_outputs.iter()).collect()
    }
}
