// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod down;
pub mod init;
pub mod status;
pub mod up;

use std::path::{Path, PathBuf};

/// Resolve the state directory from the config file, falling back to
/// `./state` when the config is absent or unreadable.
pub fn state_dir_for(config_path: &Path) -> PathBuf {
    let state_dir = arch_config::ArchConfig::load(config_path)
        .map(|c| c.settings.state_dir)
        .unwrap_or_else(|_| PathBuf::from("./state"));
    if state_dir.is_absolute() {
        state_dir
    } else {
        config_path.parent().unwrap_or(Path::new(".")).join(state_dir)
    }
}

pub fn pid_file(state_dir: &Path) -> PathBuf {
    state_dir.join("arch.pid")
}

pub fn read_pid(state_dir: &Path) -> Option<i32> {
    std::fs::read_to_string(pid_file(state_dir)).ok()?.trim().parse().ok()
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
