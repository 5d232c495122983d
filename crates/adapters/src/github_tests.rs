// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn issue_list_json_parses() {
    let raw = r#"[
        {"number": 12, "title": "Build login page", "labels": [{"name": "agent-task"}], "state": "OPEN", "url": "https://github.com/acme/shop/issues/12"},
        {"number": 13, "title": "Fix CI", "labels": [], "state": "CLOSED", "url": "https://github.com/acme/shop/issues/13"}
    ]"#;
    let issues: Vec<Issue> = serde_json::from_str(raw).unwrap();
    assert_eq!(issues.len(), 2);
    assert_eq!(issues[0].number, 12);
    assert_eq!(issues[0].labels[0].name, "agent-task");
}

#[test]
fn milestone_json_parses_with_missing_fields() {
    let raw = r#"{"number": 3, "title": "Sprint 1", "open_issues": 4, "closed_issues": 1}"#;
    let milestone: Milestone = serde_json::from_str(raw).unwrap();
    assert_eq!(milestone.number, 3);
    assert_eq!(milestone.title, "Sprint 1");
    assert!(milestone.due_on.is_none());
    assert_eq!(milestone.html_url, "");
}

#[test]
fn client_keeps_repo() {
    let client = GithubClient::new("acme/shop");
    assert_eq!(client.repo(), "acme/shop");
}
