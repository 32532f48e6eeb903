use super::*;
use serde_json::json;

#[test]
fn test_response_contract_parses_with_commands() {
    let raw = json!({
        "summary": "Add a route",
        "changes": [
            { "path": "src/app.ts", "action": "modify", "content": "export {}" },
            { "path": "src/new.ts", "action": "create", "content": "" }
        ],
        "commands": [
            { "command": "npm install express", "description": "Install express" }
        ]
    });

    let response: StructuredResponse = serde_json::from_value(raw).unwrap();
    assert_eq!(response.summary, "Add a route");
    assert_eq!(response.changes.len(), 2);
    assert_eq!(response.changes[0].action, ChangeAction::Modify);
    assert_eq!(response.changes[1].action, ChangeAction::Create);
    assert_eq!(response.commands().len(), 1);
    assert_eq!(response.commands()[0].command, "npm install express");
}

#[test]
fn test_commands_are_optional() {
    let response: StructuredResponse =
        serde_json::from_str(r#"{"summary":"nothing","changes":[]}"#).unwrap();
    assert!(response.commands.is_none());
    assert!(response.commands().is_empty());
}

#[test]
fn test_delete_change_may_omit_content() {
    let change: Change =
        serde_json::from_str(r#"{"path":"old.ts","action":"delete"}"#).unwrap();
    assert_eq!(change.action, ChangeAction::Delete);
    assert!(change.content.is_empty());
}

#[test]
fn test_contract_rejects_missing_changes() {
    let result = serde_json::from_str::<StructuredResponse>(r#"{"summary":"oops"}"#);
    assert!(result.is_err());
}

#[test]
fn test_contract_rejects_unknown_action() {
    let result = serde_json::from_str::<StructuredResponse>(
        r#"{"summary":"s","changes":[{"path":"a","action":"rename","content":""}]}"#,
    );
    assert!(result.is_err());
}

#[test]
fn test_snapshot_serializes_camel_case() {
    let snapshot = ProjectSnapshot {
        active_file: Some(ActiveFile {
            path: "a.txt".to_string(),
            content: "hi".to_string(),
        }),
        project_files: vec!["a.txt".to_string()],
        recent_history: vec![ConversationTurn::user("hello")],
        metadata: None,
    };

    let value = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(value["activeFile"]["path"], "a.txt");
    assert_eq!(value["projectFiles"][0], "a.txt");
    assert_eq!(value["recentHistory"][0]["role"], "user");
    assert!(value.get("metadata").is_none());
}
