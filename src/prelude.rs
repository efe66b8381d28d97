//! Convenience re-exports for common use.

pub use crate::error::{NauvooError, Result};
pub use crate::generation::{
    generate_text, stream_text, GenerateTextOptions, GenerationCallbacks, StreamTextOptions,
};
pub use crate::provider::{ModelProvider, ProviderRequest, ProviderResponse};
pub use crate::stop::{has_tool_call, step_count_is, StopCondition};
pub use crate::stream::{merge_streams, run_tools_transformation, RunToolsOptions};
pub use crate::tools::{Tool, ToolCallbacks, ToolSchema, ToolSet};
pub use crate::types::{
    ContentPart, FinishReason, GenerateTextResult, GenerationSettings, ModelMessage,
    ProviderStreamPart, Role, StepResult, StreamPart, ToolCall, ToolOutput, ToolResult, Usage,
};
