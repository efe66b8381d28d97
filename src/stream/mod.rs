//! Stream primitives: fair merging and the tool-run transformation.

pub mod merge;
pub mod run_tools;

pub use merge::merge_streams;
pub use run_tools::{run_tools_transformation, RunToolsOptions};
