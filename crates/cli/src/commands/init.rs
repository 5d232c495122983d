// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `arch init`: scaffold arch.yaml, personas/, and BRIEF.md.

use std::io::Write;
use std::path::Path;

const ARCHIE_PERSONA: &str = "\
# Archie — Lead Agent

You are Archie, the lead agent. You decompose the project brief into
tasks, spawn specialist agents from the pool, route their questions,
review their work, and merge completed branches. Escalate decisions you
cannot make yourself to the user.
";

const WORKER_PERSONA: &str = "\
# Engineer

You are a specialist engineer. Work only inside your worktree, keep
your status current with update_status, save progress with
save_progress before long operations, and report completion when your
assignment is done.
";

pub fn run(name: Option<&str>, github: Option<&str>) -> anyhow::Result<i32> {
    let cwd = std::env::current_dir()?;
    let name = name.unwrap_or("my-project");

    if cwd.join("arch.yaml").exists() {
        eprintln!("arch.yaml already exists; refusing to overwrite.");
        return Ok(1);
    }

    let mut config = format!(
        "project:\n  name: {name}\n  description: \"\"\n  repo: .\n\n\
         archie:\n  persona: personas/archie.md\n  model: claude-opus-4-5\n\n\
         agent_pool:\n  - id: engineer\n    persona: personas/engineer.md\n    model: claude-sonnet-4-6\n    max_instances: 2\n\n"
    );
    if let Some(repo) = github {
        config.push_str(&format!(
            "github:\n  repo: {repo}\n  default_branch: main\n  labels:\n    - name: agent-task\n      color: 1d76db\n\n"
        ));
    }
    config.push_str(
        "settings:\n  max_concurrent_agents: 5\n  state_dir: ./state\n  mcp_port: 3999\n",
    );
    std::fs::write(cwd.join("arch.yaml"), config)?;

    std::fs::create_dir_all(cwd.join("personas"))?;
    write_if_absent(&cwd.join("personas/archie.md"), ARCHIE_PERSONA)?;
    write_if_absent(&cwd.join("personas/engineer.md"), WORKER_PERSONA)?;
    write_if_absent(&cwd.join("BRIEF.md"), &arch_daemon::brief::scaffold(name))?;

    // State and worktrees never belong in history.
    let mut gitignore = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(cwd.join(".gitignore"))?;
    writeln!(gitignore, "state/")?;
    writeln!(gitignore, ".worktrees/")?;

    println!("Scaffolded arch.yaml, personas/, and BRIEF.md.");
    println!("Edit BRIEF.md, then run: arch up");
    Ok(0)
}

fn write_if_absent(path: &Path, contents: &str) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::write(path, contents)?;
    }
    Ok(())
}
