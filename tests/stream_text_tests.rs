//! Tests for the streaming generation entry point.

mod common;

use futures::StreamExt;
use nauvoo::generation::{stream_text, StreamTextOptions};
use nauvoo::tools::{Tool, ToolSchema, ToolSet};
use nauvoo::types::*;
use pretty_assertions::assert_eq;

use common::{test_usage, MockProvider};

fn scripted_parts() -> Vec<ProviderStreamPart> {
    vec![
        ProviderStreamPart::TextStart {
            id: "t1".to_string(),
        },
        ProviderStreamPart::TextDelta {
            id: "t1".to_string(),
            delta: "Let me check. ".to_string(),
        },
        ProviderStreamPart::TextEnd {
            id: "t1".to_string(),
        },
        ProviderStreamPart::ToolCall(RawToolCall {
            tool_call_id: "call-1".to_string(),
            tool_name: "lookup".to_string(),
            input: r#"{"key": "answer"}"#.to_string(),
            provider_executed: false,
            dynamic: false,
        }),
        ProviderStreamPart::Finish {
            finish_reason: FinishReason::ToolCalls,
            usage: test_usage(),
        },
    ]
}

fn lookup_tools() -> ToolSet {
    ToolSet::new().with(Tool::function(
        "lookup",
        "Look up a value",
        ToolSchema::object().string("key", "Key", true).build(),
        |_input, _ctx| async move { Ok(serde_json::json!(42)) },
    ))
}

#[tokio::test]
async fn collect_resolves_text_and_tool_activity() {
    let provider = MockProvider::new("mock-model");
    provider.queue_parts(scripted_parts());

    let stream = stream_text(
        &provider,
        vec![ModelMessage::user("What is the answer?")],
        StreamTextOptions {
            tools: Some(lookup_tools()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let result = stream.collect().await.unwrap();

    assert_eq!(result.text, "Let me check. ");
    assert_eq!(result.tool_calls.len(), 1);
    assert_eq!(result.tool_calls[0].tool_name, "lookup");
    assert_eq!(result.tool_outputs.len(), 1);
    assert!(!result.tool_outputs[0].is_error());
    assert_eq!(result.finish_reason, Some(FinishReason::ToolCalls));
    assert_eq!(result.usage, test_usage());
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn streaming_parts_end_with_finish_after_tool_result() {
    let provider = MockProvider::new("mock-model");
    provider.queue_parts(scripted_parts());

    let stream = stream_text(
        &provider,
        vec![ModelMessage::user("What is the answer?")],
        StreamTextOptions {
            tools: Some(lookup_tools()),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let parts: Vec<StreamPart> = stream.map(|p| p.unwrap()).collect().await;

    let result_pos = parts
        .iter()
        .position(|p| matches!(p, StreamPart::ToolResult(_)))
        .unwrap();
    let finish_pos = parts.iter().position(|p| p.is_finish()).unwrap();
    assert!(result_pos < finish_pos);
    assert_eq!(finish_pos, parts.len() - 1);
}

#[tokio::test]
async fn tool_definitions_are_sent_to_the_provider() {
    let provider = MockProvider::new("mock-model");
    provider.queue_parts(vec![ProviderStreamPart::Finish {
        finish_reason: FinishReason::Stop,
        usage: test_usage(),
    }]);

    let stream = stream_text(
        &provider,
        vec![ModelMessage::user("hi")],
        StreamTextOptions {
            tools: Some(lookup_tools()),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let _ = stream.collect().await.unwrap();

    let requests = provider.requests.lock().unwrap();
    let defs = requests[0].tools.as_ref().unwrap();
    assert_eq!(defs.len(), 1);
    assert_eq!(defs[0].name, "lookup");
}
