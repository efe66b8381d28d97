//! Text generation: the multi-step orchestration loop and streaming entry.

pub mod stream;
pub mod text;

pub use stream::{stream_text, StreamTextOptions, StreamTextResult, TextStream};
pub use text::{
    generate_text, GenerateTextOptions, GenerationCallbacks, PrepareStepContext, PrepareStepFn,
    StepOverrides,
};
