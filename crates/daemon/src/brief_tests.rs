// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const BRIEF: &str = "\
# shop

## Goal

Rebuild the storefront.

## Current Status

Not started.

## Decisions Log

| Date | Decision |
|---|---|
| 2026-08-01 | use the existing API |
";

#[test]
fn replace_current_status_keeps_surrounding_sections() {
    let updated = replace_current_status(BRIEF, "Login page in review.").unwrap();

    assert!(updated.contains("## Current Status\nLogin page in review.\n"));
    assert!(!updated.contains("Not started."));
    // Neighbors untouched.
    assert!(updated.contains("Rebuild the storefront."));
    assert!(updated.contains("| 2026-08-01 | use the existing API |"));
}

#[test]
fn replace_current_status_at_end_of_file() {
    let brief = "# x\n\n## Current Status\n\nold\n";
    let updated = replace_current_status(brief, "new").unwrap();
    assert!(updated.contains("## Current Status\nnew\n"));
    assert!(!updated.contains("old"));
}

#[test]
fn replace_missing_section_is_an_error() {
    let err = replace_current_status("# empty\n", "x").unwrap_err();
    assert!(matches!(err, BriefError::MissingSection("Current Status")));
}

#[test]
fn decision_rows_append_after_the_separator() {
    let updated = append_decision_row(BRIEF, "2026-08-02", "spawn a QA agent").unwrap();

    let sep = updated.find("|---|").unwrap();
    let new_row = updated.find("| 2026-08-02 | spawn a QA agent |").unwrap();
    let old_row = updated.find("| 2026-08-01 |").unwrap();
    assert!(sep < new_row);
    assert!(new_row < old_row);
}

#[test]
fn decision_append_creates_table_when_absent() {
    let brief = "# x\n\n## Decisions Log\n";
    let updated = append_decision_row(brief, "2026-08-02", "first decision").unwrap();
    assert!(updated.contains("| Date | Decision |"));
    assert!(updated.contains("| 2026-08-02 | first decision |"));
}

#[test]
fn file_roundtrip_through_handle() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("BRIEF.md"), BRIEF).unwrap();
    let brief = BriefFile::new(dir.path());

    brief.update_current_status("QA in progress.").unwrap();
    brief.append_decision("2026-08-02", "merge via PRs").unwrap();

    let contents = brief.read().unwrap();
    assert!(contents.contains("QA in progress."));
    assert!(contents.contains("| 2026-08-02 | merge via PRs |"));
}

#[test]
fn missing_file_reads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let brief = BriefFile::new(dir.path());
    assert!(matches!(brief.read(), Err(BriefError::NotFound(_))));
    assert_eq!(brief.read_or_empty(), "");
}

#[test]
fn scaffold_contains_all_sections() {
    let text = scaffold("shop");
    for section in ["## Goal", "## Done When", "## Constraints", "## Current Status", "## Decisions Log"] {
        assert!(text.contains(section), "missing {section}");
    }
    // Scaffolded brief is immediately editable by the kernel.
    replace_current_status(&text, "x").unwrap();
    append_decision_row(&text, "2026-08-02", "x").unwrap();
}
