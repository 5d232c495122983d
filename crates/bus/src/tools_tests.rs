// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn requests_decode_from_tagged_json() {
    let req: ToolRequest =
        serde_json::from_str(r#"{"tool":"send_message","to":"archie","content":"hi"}"#).unwrap();
    assert_eq!(req, ToolRequest::SendMessage { to: "archie".to_string(), content: "hi".to_string() });
    assert_eq!(req.name(), "send_message");
}

#[test]
fn optional_fields_default() {
    let req: ToolRequest = serde_json::from_str(r#"{"tool":"get_messages"}"#).unwrap();
    assert_eq!(req, ToolRequest::GetMessages { since: None });

    let req: ToolRequest = serde_json::from_str(
        r#"{"tool":"spawn_agent","role":"frontend","assignment":"build the login page"}"#,
    )
    .unwrap();
    match req {
        ToolRequest::SpawnAgent { role, context, skip_permissions, .. } => {
            assert_eq!(role, "frontend");
            assert!(context.is_none());
            assert!(skip_permissions.is_none());
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn unknown_tool_fails_to_decode() {
    assert!(serde_json::from_str::<ToolRequest>(r#"{"tool":"rm_rf","path":"/"}"#).is_err());
}

#[yare::parameterized(
    send_message      = { r#"{"tool":"send_message","to":"x","content":"y"}"#, false },
    get_messages      = { r#"{"tool":"get_messages"}"#, false },
    update_status     = { r#"{"tool":"update_status","task":"t","status":"working"}"#, false },
    report_completion = { r#"{"tool":"report_completion","summary":"s","artifacts":[]}"#, false },
    spawn_agent       = { r#"{"tool":"spawn_agent","role":"r","assignment":"a"}"#, true },
    teardown_agent    = { r#"{"tool":"teardown_agent","agent_id":"x"}"#, true },
    list_agents       = { r#"{"tool":"list_agents"}"#, true },
    escalate          = { r#"{"tool":"escalate_to_user","question":"q"}"#, true },
    close_project     = { r#"{"tool":"close_project","summary":"s"}"#, true },
    gh_list_issues    = { r#"{"tool":"gh_list_issues"}"#, true },
)]
fn authority_split(raw: &str, lead_only: bool) {
    let req: ToolRequest = serde_json::from_str(raw).unwrap();
    assert_eq!(req.lead_only(), lead_only);
}

#[test]
fn error_envelope_shape() {
    let err = ToolError::CapExceeded("frontend is at max_instances (1)".to_string());
    let json = err.to_json();
    assert_eq!(json["error"]["kind"], "cap_exceeded");
    assert!(json["error"]["message"].as_str().unwrap().contains("frontend"));
}

#[test]
fn brief_sections_decode_snake_case() {
    let req: ToolRequest = serde_json::from_str(
        r#"{"tool":"update_brief","section":"decisions_log","content":"chose cookie sessions"}"#,
    )
    .unwrap();
    match req {
        ToolRequest::UpdateBrief { section, .. } => assert_eq!(section, BriefSection::DecisionsLog),
        other => panic!("unexpected: {other:?}"),
    }
}
