// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `arch` entrypoint: agent runtime & coordination harness.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "arch", about = "Agent runtime & coordination harness", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the harness and launch the lead agent.
    Up {
        #[arg(long, default_value = "arch.yaml")]
        config: PathBuf,
        /// Leave agent worktrees in place on shutdown.
        #[arg(long)]
        keep_worktrees: bool,
    },
    /// Gracefully shut down a running harness.
    Down {
        #[arg(long, default_value = "arch.yaml")]
        config: PathBuf,
    },
    /// Show the state of the current or last run.
    Status {
        #[arg(long, default_value = "arch.yaml")]
        config: PathBuf,
    },
    /// Start the harness, resuming the lead's previous conversation.
    Resume {
        #[arg(long, default_value = "arch.yaml")]
        config: PathBuf,
        #[arg(long)]
        keep_worktrees: bool,
    },
    /// Scaffold arch.yaml, personas/, and BRIEF.md in this directory.
    Init {
        #[arg(long)]
        name: Option<String>,
        /// GitHub repository as owner/name; enables the provider tools.
        #[arg(long)]
        github: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let runtime = tokio::runtime::Runtime::new()?;

    let code = match cli.command {
        Command::Up { config, keep_worktrees } => {
            runtime.block_on(commands::up::run(&config, keep_worktrees, false))?
        }
        Command::Resume { config, keep_worktrees } => {
            runtime.block_on(commands::up::run(&config, keep_worktrees, true))?
        }
        Command::Down { config } => commands::down::run(&config)?,
        Command::Status { config } => commands::status::run(&config)?,
        Command::Init { name, github } => commands::init::run(name.as_deref(), github.as_deref())?,
    };

    std::process::exit(code);
}
