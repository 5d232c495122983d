// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `arch up` / `arch resume`: run the orchestrator to completion.

use super::{pid_file, state_dir_for};
use arch_daemon::{Orchestrator, OrchestratorOptions};
use std::io::Write;
use std::path::Path;

pub async fn run(config: &Path, keep_worktrees: bool, resume: bool) -> anyhow::Result<i32> {
    let options = OrchestratorOptions {
        config_path: config.to_path_buf(),
        keep_worktrees,
        resume,
    };

    let mut orchestrator = match Orchestrator::start(options).await {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            // Startup-gate failures are fatal with a non-zero exit and
            // no side effects.
            eprintln!("startup failed: {e}");
            return Ok(1);
        }
    };

    let state_dir = state_dir_for(config);
    write_pid(&state_dir)?;

    println!("ARCH is running (bus on {}). Press Ctrl+C to stop.", orchestrator.bus_addr());
    let code = orchestrator.run().await;

    let _ = std::fs::remove_file(pid_file(&state_dir));
    Ok(code)
}

fn write_pid(state_dir: &Path) -> anyhow::Result<()> {
    std::fs::create_dir_all(state_dir)?;
    let mut f = std::fs::File::create(pid_file(state_dir))?;
    writeln!(f, "{}", std::process::id())?;
    Ok(())
}
