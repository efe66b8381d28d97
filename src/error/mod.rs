//! Error types for Nauvoo.

use thiserror::Error;

/// Primary error type for all Nauvoo operations.
#[derive(Error, Debug)]
pub enum NauvooError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Model error: {0}")]
    Model(String),

    #[error("No such tool: '{tool_name}'. Available tools: {}", .available_tools.join(", "))]
    NoSuchTool {
        tool_name: String,
        available_tools: Vec<String>,
    },

    #[error("Invalid input for tool '{tool_name}': {message}. Input: {input}")]
    InvalidToolInput {
        tool_name: String,
        input: String,
        message: String,
    },

    #[error("Tool call repair failed for '{tool_name}': {message}")]
    ToolCallRepair {
        tool_name: String,
        message: String,
        /// The parse failure that triggered the repair attempt.
        #[source]
        original: Box<NauvooError>,
    },

    #[error("No tool call found for approval request (tool_call_id: {tool_call_id}, approval_id: {approval_id})")]
    ToolCallNotFoundForApproval {
        tool_call_id: String,
        approval_id: String,
    },

    #[error("No tool call found for tool result (tool_call_id: {tool_call_id})")]
    ToolCallNotFoundForResult { tool_call_id: String },

    #[error("Tool execution error: {tool_name} — {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Invalid tool call '{tool_name}': {message}")]
    InvalidToolCall { tool_name: String, message: String },

    /// Error payload reported by a provider-executed tool, preserved verbatim.
    #[error("Provider-executed tool '{tool_name}' failed")]
    ProviderTool {
        tool_name: String,
        payload: serde_json::Value,
    },

    #[error("Tool execution denied: {tool_name}")]
    ToolExecutionDenied { tool_name: String },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Operation aborted")]
    Aborted,

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Coarse classification used for logging and retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Serialization,
    Model,
    ToolCall,
    ToolExecution,
    RateLimit,
    Timeout,
    Aborted,
    Stream,
    Unknown,
}

impl NauvooError {
    /// Create a "no such tool" error listing the registered tool names.
    pub fn no_such_tool(
        tool_name: impl Into<String>,
        available_tools: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self::NoSuchTool {
            tool_name: tool_name.into(),
            available_tools: available_tools.into_iter().map(Into::into).collect(),
        }
    }

    /// Create an "invalid tool input" error.
    pub fn invalid_tool_input(
        tool_name: impl Into<String>,
        input: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidToolInput {
            tool_name: tool_name.into(),
            input: input.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Model(_) => ErrorCategory::Model,
            Self::NoSuchTool { .. }
            | Self::InvalidToolInput { .. }
            | Self::ToolCallRepair { .. }
            | Self::ToolCallNotFoundForApproval { .. }
            | Self::ToolCallNotFoundForResult { .. } => ErrorCategory::ToolCall,
            Self::ToolExecution { .. }
            | Self::InvalidToolCall { .. }
            | Self::ProviderTool { .. }
            | Self::ToolExecutionDenied { .. } => ErrorCategory::ToolExecution,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Aborted => ErrorCategory::Aborted,
            Self::Stream(_) => ErrorCategory::Stream,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit | ErrorCategory::Timeout
        )
    }

    /// Whether a repair hook may attempt to recover from this parse failure.
    ///
    /// Only unknown-tool and invalid-input failures are repairable.
    pub fn is_repairable_parse_error(&self) -> bool {
        matches!(
            self,
            Self::NoSuchTool { .. } | Self::InvalidToolInput { .. }
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, NauvooError>;
