//! Nauvoo — Rust AI SDK kernel.
//!
//! Provider-agnostic streaming tool orchestration for language models:
//! incremental tool-call parsing, concurrent tool execution merged back into
//! the output stream in a deterministic order, and a multi-step generation
//! loop with approval gating and pluggable stop conditions.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use nauvoo::prelude::*;
//!
//! # async fn example(model: Arc<dyn nauvoo::provider::ModelProvider>) -> nauvoo::error::Result<()> {
//! let tools = ToolSet::new().with(Tool::function(
//!     "echo",
//!     "Echo the input back",
//!     ToolSchema::object().string("value", "Value to echo", true).build(),
//!     |input, _ctx| async move { Ok(input) },
//! ));
//!
//! let result = nauvoo::generation::generate_text(
//!     model,
//!     vec![ModelMessage::user("Hello!")],
//!     GenerateTextOptions {
//!         tools,
//!         stop_when: vec![nauvoo::stop::step_count_is(3)],
//!         ..Default::default()
//!     },
//! )
//! .await?;
//! println!("{}", result.text);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod generation;
pub mod prelude;
pub mod provider;
pub mod stop;
pub mod stream;
pub mod tools;
pub mod types;
pub mod util;
