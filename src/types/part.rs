//! Stream part protocol.
//!
//! Providers emit [`ProviderStreamPart`] values: a normalized union of text,
//! reasoning, incremental tool-input, tool-call, and lifecycle events. The
//! tool-run transformation resolves these into [`StreamPart`] values, where
//! tool calls are parsed and every call eventually has a terminal result or
//! error before `Finish`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::NauvooError;

use super::generation::{FinishReason, ResponseMetadata};
use super::usage::Usage;

/// A tool invocation as the provider reports it: the input is still a
/// JSON-encoded string and may be malformed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawToolCall {
    pub tool_call_id: String,
    pub tool_name: String,
    /// JSON-encoded input text. May be empty for no-argument tools.
    pub input: String,
    #[serde(default)]
    pub provider_executed: bool,
    #[serde(default)]
    pub dynamic: bool,
}

/// A provider-executed tool result arriving natively in the stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawToolResult {
    pub tool_call_id: String,
    pub tool_name: String,
    pub result: serde_json::Value,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub dynamic: bool,
}

/// A citation or grounding source surfaced by the provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Source {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// A file generated by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedFile {
    pub data: Vec<u8>,
    pub media_type: String,
}

impl GeneratedFile {
    pub fn new(data: Vec<u8>, media_type: impl Into<String>) -> Self {
        Self {
            data,
            media_type: media_type.into(),
        }
    }
}

/// Normalized part emitted by a model provider during streaming.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderStreamPart {
    StreamStart {
        #[serde(default)]
        warnings: Vec<String>,
    },
    TextStart {
        id: String,
    },
    TextDelta {
        id: String,
        delta: String,
    },
    TextEnd {
        id: String,
    },
    ReasoningStart {
        id: String,
    },
    ReasoningDelta {
        id: String,
        delta: String,
    },
    ReasoningEnd {
        id: String,
    },
    ToolInputStart {
        id: String,
        tool_name: String,
        #[serde(default)]
        dynamic: bool,
    },
    ToolInputDelta {
        id: String,
        delta: String,
    },
    ToolInputEnd {
        id: String,
    },
    ToolCall(RawToolCall),
    ToolResult(RawToolResult),
    ToolApprovalRequest {
        approval_id: String,
        tool_call_id: String,
    },
    Source(Source),
    File {
        data: Vec<u8>,
        media_type: String,
    },
    ResponseMetadata(ResponseMetadata),
    Finish {
        finish_reason: FinishReason,
        usage: Usage,
    },
    Error {
        message: String,
    },
    Raw {
        raw: serde_json::Value,
    },
}

/// A fully parsed tool call.
///
/// `invalid` calls are kept in-stream on purpose: downstream consumers see
/// the failure instead of a hard stream error.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub tool_call_id: String,
    pub tool_name: String,
    pub input: serde_json::Value,
    #[serde(default)]
    pub provider_executed: bool,
    /// Tool was not statically declared in the tool set.
    #[serde(default)]
    pub dynamic: bool,
    /// Parsing or validation failed even after repair.
    #[serde(default)]
    pub invalid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A successful tool execution outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub tool_name: String,
    pub input: serde_json::Value,
    pub output: serde_json::Value,
    #[serde(default)]
    pub provider_executed: bool,
    #[serde(default)]
    pub dynamic: bool,
    /// Intermediate result from a streaming tool; a final result follows.
    #[serde(default)]
    pub preliminary: bool,
}

/// A failed tool execution outcome. The raised error is preserved verbatim.
#[derive(Debug, Clone)]
pub struct ToolError {
    pub tool_call_id: String,
    pub tool_name: String,
    pub input: serde_json::Value,
    pub error: Arc<NauvooError>,
    pub provider_executed: bool,
    pub dynamic: bool,
}

/// Terminal outcome of one tool call attempt.
#[derive(Debug, Clone)]
pub enum ToolOutput {
    Result(ToolResult),
    Error(ToolError),
}

impl ToolOutput {
    pub fn tool_call_id(&self) -> &str {
        match self {
            Self::Result(r) => &r.tool_call_id,
            Self::Error(e) => &e.tool_call_id,
        }
    }

    pub fn tool_name(&self) -> &str {
        match self {
            Self::Result(r) => &r.tool_name,
            Self::Error(e) => &e.tool_name,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Serialize the outcome into a message-history payload.
    pub fn to_message_payload(&self) -> serde_json::Value {
        match self {
            Self::Result(r) => r.output.clone(),
            Self::Error(e) => match e.error.as_ref() {
                NauvooError::ProviderTool { payload, .. } => payload.clone(),
                other => serde_json::json!({ "error": other.to_string() }),
            },
        }
    }
}

/// Resolved part flowing out of the tool-run transformation.
#[derive(Debug, Clone)]
pub enum StreamPart {
    StreamStart {
        warnings: Vec<String>,
    },
    TextStart {
        id: String,
    },
    TextDelta {
        id: String,
        delta: String,
    },
    TextEnd {
        id: String,
    },
    ReasoningStart {
        id: String,
    },
    ReasoningDelta {
        id: String,
        delta: String,
    },
    ReasoningEnd {
        id: String,
    },
    ToolInputStart {
        id: String,
        tool_name: String,
        dynamic: bool,
    },
    ToolInputDelta {
        id: String,
        delta: String,
    },
    ToolInputEnd {
        id: String,
    },
    ToolCall(ToolCall),
    ToolResult(ToolResult),
    ToolError(ToolError),
    ToolApprovalRequest(super::message::ToolApprovalRequest),
    Source(Source),
    File(GeneratedFile),
    ResponseMetadata(ResponseMetadata),
    Finish {
        finish_reason: FinishReason,
        usage: Usage,
    },
    Error {
        error: Arc<NauvooError>,
    },
    Raw(serde_json::Value),
}

impl StreamPart {
    /// Text delta content, if this is a text part.
    pub fn as_text_delta(&self) -> Option<&str> {
        match self {
            Self::TextDelta { delta, .. } => Some(delta),
            _ => None,
        }
    }

    pub fn is_finish(&self) -> bool {
        matches!(self, Self::Finish { .. })
    }
}
