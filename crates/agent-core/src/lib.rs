//! agent-core - data model and context assembly for the coding assistant
//!
//! - `types` - the response contract and the per-request project snapshot
//! - `history` - bounded session history
//! - `listing` - deterministic project file listings
//! - `context` - the context assembler that ties the above together

pub mod context;
pub mod history;
pub mod listing;
pub mod types;

pub use context::{ContextAssembler, ContextOptions};
pub use history::ConversationHistory;
pub use listing::ListingMode;
pub use types::{
    ActiveFile, Change, ChangeAction, Command, ConversationTurn, ProjectSnapshot, Role,
    StructuredResponse,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
