//! Tool descriptors and tool sets.
//!
//! A [`Tool`] is data, not a trait object: optional capabilities (`execute`,
//! `on_input_available`, approval policy) are checked at the call site. This
//! keeps dynamic, statically-declared, and provider-executed tools in one
//! closed representation.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::provider::ToolDefinition;
use crate::types::ModelMessage;

use super::schema::ToolSchema;

/// Context available to a tool while it executes.
#[derive(Debug, Clone)]
pub struct ToolCallContext {
    pub tool_call_id: String,
    pub tool_name: String,
    /// Conversation up to the step that produced this call.
    pub messages: Vec<ModelMessage>,
    /// Cooperative abort signal for in-flight work.
    pub abort: CancellationToken,
    /// Additional caller-supplied metadata.
    pub metadata: serde_json::Value,
}

impl Default for ToolCallContext {
    fn default() -> Self {
        Self {
            tool_call_id: String::new(),
            tool_name: String::new(),
            messages: Vec::new(),
            abort: CancellationToken::new(),
            metadata: serde_json::Value::Null,
        }
    }
}

/// What a tool's execute function produces.
pub enum ToolExecuteResponse {
    /// A single final value.
    Value(BoxFuture<'static, Result<serde_json::Value>>),
    /// Progressive values. Every yielded value is surfaced as a preliminary
    /// result; the last one is also the final result.
    Stream(BoxStream<'static, Result<serde_json::Value>>),
}

type ExecuteFn =
    dyn Fn(serde_json::Value, ToolCallContext) -> ToolExecuteResponse + Send + Sync;

type InputAvailableFn =
    dyn Fn(serde_json::Value, ToolCallContext) -> BoxFuture<'static, Result<()>> + Send + Sync;

type ApprovalPredicateFn =
    dyn Fn(serde_json::Value, ToolCallContext) -> BoxFuture<'static, bool> + Send + Sync;

/// How a tool relates to the static tool set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// Statically declared with a typed input schema.
    Function,
    /// Not known ahead of time; input handled generically.
    Dynamic,
    /// Executed on the model vendor's infrastructure.
    Provider {
        /// The result may arrive in a later model turn.
        supports_deferred_results: bool,
    },
}

/// Whether a tool call must be approved before execution.
#[derive(Clone)]
pub enum ApprovalPolicy {
    Never,
    Always,
    /// Evaluated against the parsed input and call context.
    When(Arc<ApprovalPredicateFn>),
}

impl std::fmt::Debug for ApprovalPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Never => f.write_str("Never"),
            Self::Always => f.write_str("Always"),
            Self::When(_) => f.write_str("When(..)"),
        }
    }
}

/// A tool the model can invoke.
#[derive(Clone)]
pub struct Tool {
    name: String,
    description: String,
    input_schema: ToolSchema,
    kind: ToolKind,
    execute: Option<Arc<ExecuteFn>>,
    on_input_available: Option<Arc<InputAvailableFn>>,
    needs_approval: ApprovalPolicy,
}

impl Tool {
    /// Create a statically-declared tool with an async execute function.
    pub fn function<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: ToolSchema,
        execute: F,
    ) -> Self
    where
        F: Fn(serde_json::Value, ToolCallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            kind: ToolKind::Function,
            execute: Some(Arc::new(move |input, ctx| {
                ToolExecuteResponse::Value(Box::pin(execute(input, ctx)))
            })),
            on_input_available: None,
            needs_approval: ApprovalPolicy::Never,
        }
    }

    /// Create a statically-declared tool whose execute function streams
    /// progressive values before its final result.
    pub fn streaming<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: ToolSchema,
        execute: F,
    ) -> Self
    where
        F: Fn(serde_json::Value, ToolCallContext) -> BoxStream<'static, Result<serde_json::Value>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            kind: ToolKind::Function,
            execute: Some(Arc::new(move |input, ctx| {
                ToolExecuteResponse::Stream(execute(input, ctx))
            })),
            on_input_available: None,
            needs_approval: ApprovalPolicy::Never,
        }
    }

    /// Create a runtime-discovered tool. Input is handled generically.
    pub fn dynamic(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: ToolSchema::empty(),
            kind: ToolKind::Dynamic,
            execute: None,
            on_input_available: None,
            needs_approval: ApprovalPolicy::Never,
        }
    }

    /// Create a provider-executed tool. The core only observes its calls
    /// and results.
    pub fn provider(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: ToolSchema::empty(),
            kind: ToolKind::Provider {
                supports_deferred_results: false,
            },
            execute: None,
            on_input_available: None,
            needs_approval: ApprovalPolicy::Never,
        }
    }

    /// Attach an execute function (e.g. for a dynamic tool).
    pub fn with_execute<F, Fut>(mut self, execute: F) -> Self
    where
        F: Fn(serde_json::Value, ToolCallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<serde_json::Value>> + Send + 'static,
    {
        self.execute = Some(Arc::new(move |input, ctx| {
            ToolExecuteResponse::Value(Box::pin(execute(input, ctx)))
        }));
        self
    }

    /// Replace the input schema.
    pub fn with_input_schema(mut self, input_schema: ToolSchema) -> Self {
        self.input_schema = input_schema;
        self
    }

    /// Require approval before every execution of this tool.
    pub fn with_needs_approval(mut self, needs_approval: bool) -> Self {
        self.needs_approval = if needs_approval {
            ApprovalPolicy::Always
        } else {
            ApprovalPolicy::Never
        };
        self
    }

    /// Require approval when the predicate returns true for a call.
    pub fn with_approval_predicate<F, Fut>(mut self, predicate: F) -> Self
    where
        F: Fn(serde_json::Value, ToolCallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        self.needs_approval =
            ApprovalPolicy::When(Arc::new(move |input, ctx| Box::pin(predicate(input, ctx))));
        self
    }

    /// Hook invoked once the call's full input is known, before execution.
    pub fn with_on_input_available<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(serde_json::Value, ToolCallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.on_input_available = Some(Arc::new(move |input, ctx| Box::pin(hook(input, ctx))));
        self
    }

    /// Mark a provider tool as not guaranteeing same-turn results.
    pub fn with_deferred_results(mut self) -> Self {
        if let ToolKind::Provider { .. } = self.kind {
            self.kind = ToolKind::Provider {
                supports_deferred_results: true,
            };
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn input_schema(&self) -> &ToolSchema {
        &self.input_schema
    }

    pub fn kind(&self) -> ToolKind {
        self.kind
    }

    pub fn is_dynamic(&self) -> bool {
        self.kind == ToolKind::Dynamic
    }

    pub fn is_provider_executed(&self) -> bool {
        matches!(self.kind, ToolKind::Provider { .. })
    }

    pub fn supports_deferred_results(&self) -> bool {
        matches!(
            self.kind,
            ToolKind::Provider {
                supports_deferred_results: true
            }
        )
    }

    pub fn has_execute(&self) -> bool {
        self.execute.is_some()
    }

    pub(crate) fn execute_fn(&self) -> Option<&Arc<ExecuteFn>> {
        self.execute.as_ref()
    }

    pub(crate) fn on_input_available_fn(&self) -> Option<&Arc<InputAvailableFn>> {
        self.on_input_available.as_ref()
    }

    /// Evaluate this tool's approval policy for a call.
    pub async fn needs_approval(&self, input: &serde_json::Value, ctx: &ToolCallContext) -> bool {
        match &self.needs_approval {
            ApprovalPolicy::Never => false,
            ApprovalPolicy::Always => true,
            ApprovalPolicy::When(predicate) => predicate(input.clone(), ctx.clone()).await,
        }
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("kind", &self.kind)
            .field("has_execute", &self.execute.is_some())
            .field("needs_approval", &self.needs_approval)
            .finish()
    }
}

/// Name-keyed set of tools known for a generation run.
#[derive(Debug, Clone, Default)]
pub struct ToolSet {
    tools: HashMap<String, Arc<Tool>>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, tool: Tool) -> Self {
        self.insert(tool);
        self
    }

    pub fn insert(&mut self, tool: Tool) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Tool>> {
        self.tools.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Registered tool names, sorted for stable error messages.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Tool>> {
        self.tools.values()
    }

    /// Definitions sent to the provider API.
    pub fn to_definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.input_schema().schema.clone(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }
}

impl FromIterator<Tool> for ToolSet {
    fn from_iter<I: IntoIterator<Item = Tool>>(iter: I) -> Self {
        let mut set = Self::new();
        for tool in iter {
            set.insert(tool);
        }
        set
    }
}
