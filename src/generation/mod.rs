//! Content generation: per-type capabilities composed by the dispatcher.

pub mod capability;
pub mod dispatcher;

pub use capability::{default_capabilities, ContentCapability, GenerationContext};
pub use dispatcher::{DispatchHandle, DispatchOutcome, GenerationDispatcher};
