//! Core types for Nauvoo.

pub mod generation;
pub mod message;
pub mod part;
pub mod step;
pub mod usage;

pub use generation::*;
pub use message::*;
pub use part::*;
pub use step::*;
pub use usage::*;
