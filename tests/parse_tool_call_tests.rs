//! Tests for tool-call parsing and repair.

mod common;

use std::sync::Arc;

use nauvoo::error::NauvooError;
use nauvoo::tools::parse::{parse_tool_call, ToolCallRepairFn};
use nauvoo::tools::{Tool, ToolSchema, ToolSet};
use nauvoo::types::RawToolCall;
use pretty_assertions::assert_eq;

use common::raw_call;

fn test_tools() -> ToolSet {
    ToolSet::new().with(Tool::function(
        "test_tool",
        "A test tool",
        ToolSchema::object()
            .string("param1", "First parameter", true)
            .integer("param2", "Second parameter", true)
            .build(),
        |input, _ctx| async move { Ok(input) },
    ))
}

#[tokio::test]
async fn parses_valid_tool_call() {
    let raw = raw_call("123", "test_tool", r#"{"param1": "test", "param2": 42}"#);

    let call = parse_tool_call(&raw, Some(&test_tools()), None).await;

    assert_eq!(call.tool_call_id, "123");
    assert_eq!(call.tool_name, "test_tool");
    assert_eq!(call.input, serde_json::json!({"param1": "test", "param2": 42}));
    assert!(!call.invalid);
    assert!(!call.dynamic);
    assert!(call.error.is_none());
}

#[tokio::test]
async fn empty_input_parses_as_empty_object() {
    let tools = ToolSet::new().with(Tool::function(
        "no_args",
        "Takes no arguments",
        ToolSchema::empty(),
        |input, _ctx| async move { Ok(input) },
    ));
    let raw = raw_call("1", "no_args", "");

    let call = parse_tool_call(&raw, Some(&tools), None).await;

    assert!(!call.invalid);
    assert_eq!(call.input, serde_json::json!({}));
}

#[tokio::test]
async fn unknown_tool_becomes_invalid_dynamic_call() {
    let raw = raw_call("1", "nonexistent", "{}");

    let call = parse_tool_call(&raw, Some(&test_tools()), None).await;

    assert!(call.invalid);
    assert!(call.dynamic);
    assert!(call.error.as_deref().unwrap().contains("No such tool"));
    assert_eq!(call.tool_name, "nonexistent");
}

#[tokio::test]
async fn schema_violation_becomes_invalid_call() {
    let raw = raw_call("1", "test_tool", r#"{"param1": "test"}"#);

    let call = parse_tool_call(&raw, Some(&test_tools()), None).await;

    assert!(call.invalid);
    assert!(call
        .error
        .as_deref()
        .unwrap()
        .contains("missing required field 'param2'"));
    // best-effort parsed input is preserved
    assert_eq!(call.input, serde_json::json!({"param1": "test"}));
}

#[tokio::test]
async fn malformed_json_falls_back_to_raw_text_input() {
    let raw = raw_call("1", "test_tool", "{not json");

    let call = parse_tool_call(&raw, Some(&test_tools()), None).await;

    assert!(call.invalid);
    assert_eq!(call.input, serde_json::json!("{not json"));
}

#[tokio::test]
async fn no_tool_set_accepts_provider_executed_dynamic_calls() {
    let raw = RawToolCall {
        tool_call_id: "1".to_string(),
        tool_name: "vendor_search".to_string(),
        input: String::new(),
        provider_executed: true,
        dynamic: true,
    };

    let call = parse_tool_call(&raw, None, None).await;

    assert!(!call.invalid);
    assert!(call.dynamic);
    assert!(call.provider_executed);
    assert_eq!(call.input, serde_json::json!({}));
}

#[tokio::test]
async fn no_tool_set_rejects_ordinary_calls() {
    let raw = raw_call("1", "anything", "{}");

    let call = parse_tool_call(&raw, None, None).await;

    assert!(call.invalid);
    assert!(call.error.as_deref().unwrap().contains("No such tool"));
}

#[tokio::test]
async fn provider_executed_dynamic_call_skips_schema_validation() {
    // registered tool requires params, but the call is exempt
    let raw = RawToolCall {
        tool_call_id: "1".to_string(),
        tool_name: "test_tool".to_string(),
        input: r#"{"unrelated": true}"#.to_string(),
        provider_executed: true,
        dynamic: true,
    };

    let call = parse_tool_call(&raw, Some(&test_tools()), None).await;

    assert!(!call.invalid);
    assert_eq!(call.input, serde_json::json!({"unrelated": true}));
}

fn repair_to(name: &'static str) -> Arc<ToolCallRepairFn> {
    Arc::new(move |raw, _tools, _error| {
        let mut repaired = raw.clone();
        Box::pin(async move {
            repaired.tool_name = name.to_string();
            Ok(Some(repaired))
        })
    })
}

#[tokio::test]
async fn repair_rewrites_unknown_tool_name() {
    let raw = raw_call("1", "unknown_tool", r#"{"param1": "a", "param2": 1}"#);
    let repair = repair_to("test_tool");

    let call = parse_tool_call(&raw, Some(&test_tools()), Some(&repair)).await;

    assert!(!call.invalid);
    assert_eq!(call.tool_name, "test_tool");
}

#[tokio::test]
async fn repair_returning_none_surfaces_original_error() {
    let raw = raw_call("1", "unknown_tool", "{}");
    let repair: Arc<ToolCallRepairFn> =
        Arc::new(|_raw, _tools, _error| Box::pin(async { Ok(None) }));

    let call = parse_tool_call(&raw, Some(&test_tools()), Some(&repair)).await;

    assert!(call.invalid);
    assert!(call.dynamic);
    assert!(call.error.as_deref().unwrap().contains("No such tool"));
}

#[tokio::test]
async fn failing_repair_is_wrapped_with_original_error() {
    let raw = raw_call("1", "unknown_tool", "{}");
    let repair: Arc<ToolCallRepairFn> = Arc::new(|_raw, _tools, _error| {
        Box::pin(async { Err(NauvooError::InvalidState("repair crashed".to_string())) })
    });

    let call = parse_tool_call(&raw, Some(&test_tools()), Some(&repair)).await;

    assert!(call.invalid);
    let error = call.error.as_deref().unwrap();
    assert!(error.contains("Tool call repair failed"));
    assert!(error.contains("repair crashed"));
}

#[tokio::test]
async fn repaired_call_that_still_fails_is_marked_invalid() {
    // repair points at a registered tool but the input stays invalid
    let raw = raw_call("1", "unknown_tool", r#"{"param1": "only"}"#);
    let repair = repair_to("test_tool");

    let call = parse_tool_call(&raw, Some(&test_tools()), Some(&repair)).await;

    assert!(call.invalid);
    assert_eq!(call.tool_name, "test_tool");
    assert!(call
        .error
        .as_deref()
        .unwrap()
        .contains("missing required field 'param2'"));
}

#[tokio::test]
async fn repair_receives_the_parse_error() {
    let raw = raw_call("1", "unknown_tool", "{}");
    let seen = Arc::new(std::sync::Mutex::new(None::<String>));
    let seen_clone = Arc::clone(&seen);
    let repair: Arc<ToolCallRepairFn> = Arc::new(move |_raw, _tools, error| {
        *seen_clone.lock().unwrap() = Some(error.to_string());
        Box::pin(async { Ok(None) })
    });

    let _ = parse_tool_call(&raw, Some(&test_tools()), Some(&repair)).await;

    assert!(seen.lock().unwrap().as_deref().unwrap().contains("No such tool"));
}
