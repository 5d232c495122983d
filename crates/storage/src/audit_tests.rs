// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn append_writes_one_line_per_event() {
    let dir = tempfile::tempdir().unwrap();
    let log = AuditLog::new(dir.path());

    log.append(AuditEvent::StartupApproval, "security-1", "security", "user");
    log.append(AuditEvent::SkipPermissions, "security-1", "security", "user");

    let contents = log.read().unwrap();
    let lines: Vec<_> = contents.lines().collect();
    assert_eq!(lines.len(), 2);

    assert!(lines[0].contains("STARTUP_APPROVAL"));
    assert!(lines[1].contains("SKIP_PERMISSIONS"));
    for line in &lines {
        assert!(line.contains("agent_id=security-1"));
        assert!(line.contains("role=security"));
        assert!(line.contains("approved_by=user"));
        // ISO-8601 UTC instant leads the line.
        assert!(line[..20].ends_with("Z"));
    }
}

#[test]
fn log_is_append_only_across_handles() {
    let dir = tempfile::tempdir().unwrap();

    AuditLog::new(dir.path()).append(AuditEvent::SkipPermissions, "a-1", "a", "user");
    AuditLog::new(dir.path()).append(AuditEvent::SkipPermissions, "a-2", "a", "user");

    let contents = AuditLog::new(dir.path()).read().unwrap();
    assert_eq!(contents.lines().count(), 2);
}
