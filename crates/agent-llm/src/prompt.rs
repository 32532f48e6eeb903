//! Prompt assembly shared by the network-backed providers.
//!
//! The request is a sequence of labeled text blocks, always in the same order:
//! system instruction, recent history, project files, active file, metadata,
//! user instruction.

use agent_core::{ConversationTurn, ProjectSnapshot};

/// Establishes the response contract with the model.
pub const SYSTEM_INSTRUCTION: &str = r#"You are a production-grade coding assistant embedded in a desktop editor.
You propose complete file contents and shell commands; a human reviews every proposal before it is applied.
Follow this strict JSON format for your response:
{
  "summary": "Short step-by-step explanation of the plan.",
  "changes": [
    {
      "path": "src/file.ts",
      "action": "modify",
      "content": "Full file content here..."
    }
  ],
  "commands": [
    {
      "command": "npm install framer-motion",
      "description": "Install animation library"
    }
  ]
}
"action" is one of "create", "modify" or "delete". "content" is always the full file content.
Respond ONLY with the JSON object. No commentary outside the JSON. No markdown backticks."#;

pub fn history_block(turns: &[ConversationTurn]) -> String {
    if turns.is_empty() {
        return "Recent History:\n(none)".to_string();
    }
    let lines = turns
        .iter()
        .map(|turn| format!("{}: {}", turn.role.label(), turn.content))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Recent History:\n{}", lines)
}

pub fn project_files_block(files: &[String]) -> String {
    format!("Project Files: {}", files.join(", "))
}

pub fn active_file_block(context: &ProjectSnapshot) -> String {
    match &context.active_file {
        Some(file) => format!("Active File: {}\nContent:\n{}", file.path, file.content),
        None => "No active file.".to_string(),
    }
}

pub fn metadata_block(context: &ProjectSnapshot) -> Option<String> {
    context
        .metadata
        .as_ref()
        .map(|metadata| format!("Project Metadata: {}", metadata))
}

pub fn instruction_block(prompt: &str) -> String {
    format!("User Instruction: {}", prompt)
}

/// Context blocks and the instruction, without system text or history.
///
/// Used as the final user turn by chat-style backends that carry history as
/// separate messages.
pub fn build_user_content(prompt: &str, context: &ProjectSnapshot) -> String {
    let mut blocks = vec![
        project_files_block(&context.project_files),
        active_file_block(context),
    ];
    blocks.extend(metadata_block(context));
    blocks.push(instruction_block(prompt));
    blocks.join("\n\n")
}

/// The whole request as one self-describing document.
pub fn build_full_prompt(prompt: &str, context: &ProjectSnapshot) -> String {
    let mut blocks = vec![
        SYSTEM_INSTRUCTION.to_string(),
        history_block(&context.recent_history),
        project_files_block(&context.project_files),
        active_file_block(context),
    ];
    blocks.extend(metadata_block(context));
    blocks.push(instruction_block(prompt));
    blocks.join("\n\n")
}
