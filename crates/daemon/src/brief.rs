// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! BRIEF.md editing.
//!
//! The brief is human-owned markdown; the kernel rewrites only the
//! *Current Status* section (full replacement) and appends rows to the
//! *Decisions Log* table.

use std::path::{Path, PathBuf};
use thiserror::Error;

const CURRENT_STATUS_HEADER: &str = "## Current Status";
const DECISIONS_LOG_HEADER: &str = "## Decisions Log";

#[derive(Debug, Error)]
pub enum BriefError {
    #[error("BRIEF.md not found at {0}")]
    NotFound(PathBuf),

    #[error("BRIEF.md has no '{0}' section")]
    MissingSection(&'static str),

    #[error("brief I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Handle on the project brief file.
#[derive(Debug, Clone)]
pub struct BriefFile {
    path: PathBuf,
}

impl BriefFile {
    pub fn new(repo_root: &Path) -> Self {
        Self { path: repo_root.join("BRIEF.md") }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<String, BriefError> {
        if !self.path.exists() {
            return Err(BriefError::NotFound(self.path.clone()));
        }
        Ok(std::fs::read_to_string(&self.path)?)
    }

    /// Contents if present; empty string otherwise (startup tolerates a
    /// missing brief).
    pub fn read_or_empty(&self) -> String {
        self.read().unwrap_or_default()
    }

    /// Replace the Current Status section wholesale.
    pub fn update_current_status(&self, content: &str) -> Result<(), BriefError> {
        let brief = self.read()?;
        let updated = replace_current_status(&brief, content)?;
        std::fs::write(&self.path, updated)?;
        Ok(())
    }

    /// Append one `| date | content |` row to the Decisions Log table.
    pub fn append_decision(&self, date: &str, content: &str) -> Result<(), BriefError> {
        let brief = self.read()?;
        let updated = append_decision_row(&brief, date, content)?;
        std::fs::write(&self.path, updated)?;
        Ok(())
    }
}

/// Replace everything between the Current Status header and the next
/// `## ` header (or EOF).
pub fn replace_current_status(brief: &str, content: &str) -> Result<String, BriefError> {
    let Some(start) = brief.find(CURRENT_STATUS_HEADER) else {
        return Err(BriefError::MissingSection("Current Status"));
    };
    let body_start = start + CURRENT_STATUS_HEADER.len();
    let rest = &brief[body_start..];
    let body_end = rest.find("\n## ").map(|i| body_start + i + 1).unwrap_or(brief.len());

    let mut updated = String::with_capacity(brief.len() + content.len());
    updated.push_str(&brief[..body_start]);
    updated.push('\n');
    updated.push_str(content.trim_end());
    updated.push('\n');
    if body_end < brief.len() {
        updated.push('\n');
        updated.push_str(&brief[body_end..]);
    }
    Ok(updated)
}

/// Insert a table row after the Decisions Log header's separator line.
pub fn append_decision_row(brief: &str, date: &str, content: &str) -> Result<String, BriefError> {
    if !brief.contains(DECISIONS_LOG_HEADER) {
        return Err(BriefError::MissingSection("Decisions Log"));
    }

    let row = format!("| {date} | {content} |");
    let mut lines: Vec<&str> = brief.lines().collect();
    let mut in_section = false;
    let mut insert_at = None;
    for (i, line) in lines.iter().enumerate() {
        if line.starts_with(DECISIONS_LOG_HEADER) {
            in_section = true;
        } else if in_section && line.starts_with('|') && line.contains("---") {
            insert_at = Some(i + 1);
            break;
        }
    }

    match insert_at {
        Some(i) => {
            lines.insert(i, &row);
            let mut out = lines.join("\n");
            if brief.ends_with('\n') {
                out.push('\n');
            }
            Ok(out)
        }
        // Header exists but no table yet: start one.
        None => {
            let table = format!("{DECISIONS_LOG_HEADER}\n| Date | Decision |\n|---|---|\n{row}");
            Ok(brief.replacen(DECISIONS_LOG_HEADER, &table, 1))
        }
    }
}

/// Template written by `arch init`.
pub fn scaffold(project_name: &str) -> String {
    format!(
        "# {project_name}\n\n\
         ## Goal\n\n(what are we building?)\n\n\
         ## Done When\n\n(how do we know we're finished?)\n\n\
         ## Constraints\n\n(stack, style, boundaries)\n\n\
         ## Current Status\n\nNot started.\n\n\
         ## Decisions Log\n\n| Date | Decision |\n|---|---|\n"
    )
}

#[cfg(test)]
#[path = "brief_tests.rs"]
mod tests;
