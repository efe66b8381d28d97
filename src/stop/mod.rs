//! Stop conditions for the multi-step generation loop.
//!
//! Conditions are predicates over the accumulated step list; multiple
//! conditions are OR'd. The loop's default is [`step_count_is`]`(1)`:
//! no tool loop unless the caller opts in.

use std::sync::Arc;

use async_trait::async_trait;

use crate::types::StepResult;

/// Trait for conditions that end the generation loop.
#[async_trait]
pub trait StopCondition: Send + Sync {
    /// Check whether generation should stop given the steps so far.
    async fn should_stop(&self, steps: &[StepResult]) -> bool;
}

/// Evaluate conditions against the step list; any match stops the loop.
pub async fn is_stop_condition_met(
    conditions: &[Arc<dyn StopCondition>],
    steps: &[StepResult],
) -> bool {
    for condition in conditions {
        if condition.should_stop(steps).await {
            return true;
        }
    }
    false
}

/// Stop after a fixed number of steps.
pub struct StepCountIs {
    count: usize,
}

pub fn step_count_is(count: usize) -> Arc<dyn StopCondition> {
    Arc::new(StepCountIs { count })
}

#[async_trait]
impl StopCondition for StepCountIs {
    async fn should_stop(&self, steps: &[StepResult]) -> bool {
        steps.len() >= self.count
    }
}

/// Stop once any step has called the named tool.
pub struct HasToolCall {
    tool_name: String,
}

pub fn has_tool_call(tool_name: impl Into<String>) -> Arc<dyn StopCondition> {
    Arc::new(HasToolCall {
        tool_name: tool_name.into(),
    })
}

#[async_trait]
impl StopCondition for HasToolCall {
    async fn should_stop(&self, steps: &[StepResult]) -> bool {
        steps
            .iter()
            .flat_map(|s| s.tool_calls.iter())
            .any(|tc| tc.tool_name == self.tool_name)
    }
}

/// Stop when a specific string appears in the accumulated text.
pub struct StringStop {
    pattern: String,
}

pub fn text_contains(pattern: impl Into<String>) -> Arc<dyn StopCondition> {
    Arc::new(StringStop {
        pattern: pattern.into(),
    })
}

#[async_trait]
impl StopCondition for StringStop {
    async fn should_stop(&self, steps: &[StepResult]) -> bool {
        steps.iter().any(|s| s.text.contains(&self.pattern))
    }
}

/// Stop when a regex matches the accumulated text.
pub struct RegexStop {
    regex: regex::Regex,
}

pub fn text_matches(pattern: &str) -> Result<Arc<dyn StopCondition>, regex::Error> {
    Ok(Arc::new(RegexStop {
        regex: regex::Regex::new(pattern)?,
    }))
}

#[async_trait]
impl StopCondition for RegexStop {
    async fn should_stop(&self, steps: &[StepResult]) -> bool {
        steps.iter().any(|s| self.regex.is_match(&s.text))
    }
}

/// Stop when a custom predicate over the step list returns true.
pub struct PredicateStop<F: Fn(&[StepResult]) -> bool + Send + Sync> {
    predicate: F,
}

pub fn stop_when<F: Fn(&[StepResult]) -> bool + Send + Sync + 'static>(
    predicate: F,
) -> Arc<dyn StopCondition> {
    Arc::new(PredicateStop { predicate })
}

#[async_trait]
impl<F: Fn(&[StepResult]) -> bool + Send + Sync> StopCondition for PredicateStop<F> {
    async fn should_stop(&self, steps: &[StepResult]) -> bool {
        (self.predicate)(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FinishReason, ResponseMetadata, ToolCall, Usage};

    fn step(text: &str, tool_names: &[&str]) -> StepResult {
        StepResult {
            text: text.to_string(),
            reasoning: String::new(),
            tool_calls: tool_names
                .iter()
                .map(|name| ToolCall {
                    tool_call_id: format!("call-{name}"),
                    tool_name: name.to_string(),
                    input: serde_json::json!({}),
                    provider_executed: false,
                    dynamic: false,
                    invalid: false,
                    error: None,
                })
                .collect(),
            tool_outputs: Vec::new(),
            approval_requests: Vec::new(),
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
            response: ResponseMetadata::default(),
            warnings: Vec::new(),
        }
    }

    #[tokio::test]
    async fn step_count_stops_at_count() {
        let stop = step_count_is(2);
        assert!(!stop.should_stop(&[step("a", &[])]).await);
        assert!(stop.should_stop(&[step("a", &[]), step("b", &[])]).await);
    }

    #[tokio::test]
    async fn has_tool_call_matches_any_step() {
        let stop = has_tool_call("finalize");
        assert!(!stop.should_stop(&[step("a", &["search"])]).await);
        assert!(
            stop.should_stop(&[step("a", &["search"]), step("b", &["finalize"])])
                .await
        );
    }

    #[tokio::test]
    async fn text_contains_matches() {
        let stop = text_contains("DONE");
        assert!(!stop.should_stop(&[step("working", &[])]).await);
        assert!(stop.should_stop(&[step("all DONE here", &[])]).await);
    }

    #[tokio::test]
    async fn text_matches_regex() {
        let stop = text_matches(r"\d{3}").unwrap();
        assert!(!stop.should_stop(&[step("abc", &[])]).await);
        assert!(stop.should_stop(&[step("abc123", &[])]).await);
    }

    #[tokio::test]
    async fn conditions_are_ored() {
        let conditions = vec![step_count_is(5), text_contains("STOP")];
        assert!(!is_stop_condition_met(&conditions, &[step("a", &[])]).await);
        assert!(is_stop_condition_met(&conditions, &[step("STOP", &[])]).await);
    }
}
