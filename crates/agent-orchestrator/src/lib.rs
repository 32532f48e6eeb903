//! Composes the context assembler, provider registry and settings store
//! behind one façade. See [`Orchestrator`].

pub mod error;
pub mod orchestrator;

pub use error::{OrchestratorError, Result};
pub use orchestrator::{AppliedSettings, Orchestrator, ProviderInfo};
