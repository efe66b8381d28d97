//! Parse raw tool calls into validated, typed calls.

use futures::future::BoxFuture;
use tracing::debug;

use crate::error::{NauvooError, Result};
use crate::types::{RawToolCall, ToolCall};

use super::tool::ToolSet;

/// Caller-supplied hook that attempts to fix an unparseable or unknown tool
/// call. It receives the offending call, the tool set, and the parse error,
/// and may return a corrected raw call to re-attempt parsing, or `None` to
/// give up.
pub type ToolCallRepairFn = dyn for<'a> Fn(
        &'a RawToolCall,
        &'a ToolSet,
        &'a NauvooError,
    ) -> BoxFuture<'a, Result<Option<RawToolCall>>>
    + Send
    + Sync;

/// Parse a raw tool call against the registered tool set.
///
/// Never fails: when parsing is unrecoverable (no repair hook, the hook gave
/// up, or the repaired call also failed), the call is returned marked
/// `invalid: true, dynamic: true` and carries the error, so the failure stays
/// visible downstream instead of aborting the stream.
pub async fn parse_tool_call(
    raw: &RawToolCall,
    tools: Option<&ToolSet>,
    repair: Option<&std::sync::Arc<ToolCallRepairFn>>,
) -> ToolCall {
    let error = match try_parse(raw, tools) {
        Ok(call) => return call,
        Err(error) => error,
    };

    // Repair is attempted only for the two recoverable failure kinds.
    if !error.is_repairable_parse_error() {
        return invalid_call(raw, &error);
    }
    let Some(repair) = repair else {
        return invalid_call(raw, &error);
    };

    let tool_set = tools.cloned().unwrap_or_default();
    match repair(raw, &tool_set, &error).await {
        Ok(Some(repaired)) => match try_parse(&repaired, tools) {
            Ok(call) => call,
            Err(reparse_error) => {
                debug!(
                    tool = %repaired.tool_name,
                    error = %reparse_error,
                    "repaired tool call failed to parse"
                );
                invalid_call(&repaired, &reparse_error)
            }
        },
        Ok(None) => invalid_call(raw, &error),
        Err(repair_error) => invalid_call(
            raw,
            &NauvooError::ToolCallRepair {
                tool_name: raw.tool_name.clone(),
                message: repair_error.to_string(),
                original: Box::new(error),
            },
        ),
    }
}

fn try_parse(raw: &RawToolCall, tools: Option<&ToolSet>) -> Result<ToolCall> {
    // Provider-executed dynamic tools are not required to be statically
    // declared and never need an input schema.
    if raw.provider_executed && raw.dynamic {
        let input = parse_input(raw)?;
        return Ok(ToolCall {
            tool_call_id: raw.tool_call_id.clone(),
            tool_name: raw.tool_name.clone(),
            input,
            provider_executed: true,
            dynamic: true,
            invalid: false,
            error: None,
        });
    }

    let Some(tools) = tools else {
        return Err(NauvooError::no_such_tool(
            &raw.tool_name,
            Vec::<String>::new(),
        ));
    };

    let Some(tool) = tools.get(&raw.tool_name) else {
        return Err(NauvooError::no_such_tool(&raw.tool_name, tools.names()));
    };

    let input = parse_input(raw)?;
    tool.input_schema()
        .validate(&input)
        .map_err(|message| NauvooError::invalid_tool_input(&raw.tool_name, &raw.input, message))?;

    Ok(ToolCall {
        tool_call_id: raw.tool_call_id.clone(),
        tool_name: raw.tool_name.clone(),
        input,
        provider_executed: raw.provider_executed,
        dynamic: tool.is_dynamic(),
        invalid: false,
        error: None,
    })
}

/// Some providers emit empty argument strings for no-argument tools.
fn parse_input(raw: &RawToolCall) -> Result<serde_json::Value> {
    let trimmed = raw.input.trim();
    if trimmed.is_empty() {
        return Ok(serde_json::json!({}));
    }
    serde_json::from_str(trimmed).map_err(|e| {
        NauvooError::invalid_tool_input(&raw.tool_name, &raw.input, e.to_string())
    })
}

fn invalid_call(raw: &RawToolCall, error: &NauvooError) -> ToolCall {
    ToolCall {
        tool_call_id: raw.tool_call_id.clone(),
        tool_name: raw.tool_name.clone(),
        input: best_effort_input(&raw.input),
        provider_executed: raw.provider_executed,
        dynamic: true,
        invalid: true,
        error: Some(error.to_string()),
    }
}

fn best_effort_input(raw_input: &str) -> serde_json::Value {
    let trimmed = raw_input.trim();
    if trimmed.is_empty() {
        return serde_json::json!({});
    }
    serde_json::from_str(trimmed)
        .unwrap_or_else(|_| serde_json::Value::String(raw_input.to_string()))
}
