//! Offline provider that answers deterministically without any I/O.

use agent_core::{Change, ChangeAction, ProjectSnapshot, StructuredResponse};
use async_trait::async_trait;

use crate::provider::{AIProvider, Result};

pub const MOCK_ID: &str = "mock-ai";

/// Target of the proposed change when no file is open.
pub const PLACEHOLDER_PATH: &str = "new-file.txt";

/// Line appended to the active file content.
pub const MOCK_MARKER: &str = "// Added by Mock AI";

#[derive(Debug, Default)]
pub struct MockAIProvider;

impl MockAIProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AIProvider for MockAIProvider {
    fn id(&self) -> &str {
        MOCK_ID
    }

    fn name(&self) -> &str {
        "Mock AI"
    }

    async fn generate_response(
        &self,
        prompt: &str,
        context: &ProjectSnapshot,
    ) -> Result<StructuredResponse> {
        let (path, content) = match &context.active_file {
            Some(file) => (file.path.clone(), file.content.as_str()),
            None => (PLACEHOLDER_PATH.to_string(), ""),
        };

        Ok(StructuredResponse {
            summary: format!(
                "I've analyzed your request: \"{}\". In this mock mode, I'll propose a small change.",
                prompt
            ),
            changes: vec![Change {
                path,
                action: ChangeAction::Modify,
                content: format!("{}\n\n{}", content, MOCK_MARKER),
            }],
            commands: None,
        })
    }
}
