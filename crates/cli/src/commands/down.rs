// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `arch down`: signal a running harness and wait for it to exit.

use super::{read_pid, state_dir_for};
use std::path::Path;
use std::time::{Duration, Instant};

/// A little past the harness's own 30s per-session grace.
const DOWN_TIMEOUT: Duration = Duration::from_secs(40);

pub fn run(config: &Path) -> anyhow::Result<i32> {
    let state_dir = state_dir_for(config);
    let Some(pid) = read_pid(&state_dir) else {
        println!("No running instance found (no PID file in {}).", state_dir.display());
        return Ok(1);
    };

    if !process_alive(pid) {
        println!("Stale PID file (process {pid} is gone); cleaning up.");
        let _ = std::fs::remove_file(super::pid_file(&state_dir));
        return Ok(0);
    }

    println!("Stopping ARCH (pid {pid})...");
    unsafe {
        libc::kill(pid, libc::SIGTERM);
    }

    let deadline = Instant::now() + DOWN_TIMEOUT;
    while Instant::now() < deadline {
        if !process_alive(pid) {
            println!("Stopped.");
            return Ok(0);
        }
        std::thread::sleep(Duration::from_millis(200));
    }

    eprintln!("Harness did not exit within {}s.", DOWN_TIMEOUT.as_secs());
    Ok(1)
}

fn process_alive(pid: i32) -> bool {
    unsafe { libc::kill(pid, 0) == 0 }
}
