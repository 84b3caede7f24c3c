pub mod config;
pub mod error;
pub mod generation;
pub mod kernel;
pub mod outputs;
pub mod services;

// Re-export the entry points most callers need
pub use config::EngineConfig;
pub use kernel::reactor::{Collaborators, OrchestrationEngine, TickOutcome, TripLoop};
