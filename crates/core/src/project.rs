// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project context: one per harness run, immutable after startup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Project metadata recorded at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectContext {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub repo: PathBuf,
    #[serde(default)]
    pub started_at: String,
}
