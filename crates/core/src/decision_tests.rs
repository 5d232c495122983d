// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn decision_serde_roundtrip() {
    let decision = Decision {
        id: DecisionId::from_string("dcn-merge01"),
        question: "Merge frontend-1 into main?".to_string(),
        options: vec!["y".to_string(), "n".to_string()],
        asked_at: "2026-08-02T10:00:00Z".to_string(),
        answered_at: None,
        answer: None,
    };
    let json = serde_json::to_string(&decision).unwrap();
    let parsed: Decision = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, decision);
    assert!(!parsed.is_resolved());
}

#[test]
fn unanswered_fields_are_omitted() {
    let decision = Decision {
        id: DecisionId::generate(),
        question: "Proceed?".to_string(),
        options: vec![],
        asked_at: "2026-08-02T10:00:00Z".to_string(),
        answered_at: None,
        answer: None,
    };
    let json = serde_json::to_string(&decision).unwrap();
    assert!(!json.contains("answered_at"));
    assert!(!json.contains("\"answer\""));
}

#[test]
fn answered_decision_is_resolved() {
    let mut decision = Decision {
        id: DecisionId::generate(),
        question: "Proceed?".to_string(),
        options: vec![],
        asked_at: "2026-08-02T10:00:00Z".to_string(),
        answered_at: None,
        answer: None,
    };
    decision.answer = Some("y".to_string());
    decision.answered_at = Some("2026-08-02T10:01:00Z".to_string());
    assert!(decision.is_resolved());
}
