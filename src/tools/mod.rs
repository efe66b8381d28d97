//! Tool system for function calling.

pub mod execute;
pub mod parse;
pub mod schema;
pub mod tool;

pub use execute::{
    execute_tool_call, ExecuteToolCallOptions, ToolCallFinishInfo, ToolCallStartInfo,
    ToolCallbacks,
};
pub use parse::{parse_tool_call, ToolCallRepairFn};
pub use schema::ToolSchema;
pub use tool::{
    ApprovalPolicy, Tool, ToolCallContext, ToolExecuteResponse, ToolKind, ToolSet,
};
