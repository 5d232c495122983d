// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `arch status`: read the state directory directly and print a
//! summary. Works whether or not the harness is running.

use super::{read_pid, state_dir_for};
use serde_json::Value;
use std::path::Path;

pub fn run(config: &Path) -> anyhow::Result<i32> {
    let state_dir = state_dir_for(config);
    if !state_dir.exists() {
        println!("No state directory at {}; nothing has run here yet.", state_dir.display());
        return Ok(1);
    }

    match read_pid(&state_dir) {
        Some(pid) => println!("ARCH is running (pid {pid})"),
        None => println!("ARCH is not running"),
    }
    println!();

    let agents = load(&state_dir.join("agents.json"));
    if let Some(agents) = agents.as_ref().and_then(Value::as_object) {
        println!("AGENTS");
        for (id, agent) in agents {
            let status = agent["status"].as_str().unwrap_or("?");
            let task = agent["task"].as_str().unwrap_or("");
            let cost = agent["usage"]["cost_usd"].as_f64().unwrap_or(0.0);
            println!("  {id:<16} {status:<16} ${cost:<8.4} {task}");
        }
    } else {
        println!("AGENTS\n  (none)");
    }
    println!();

    if let Some(usage) = load(&state_dir.join("usage.json")).as_ref().and_then(Value::as_object) {
        let total: f64 = usage.values().filter_map(|u| u["cost_usd"].as_f64()).sum();
        println!("TOTAL COST  ${total:.4}");
        println!();
    }

    let decisions = load(&state_dir.join("decisions.json"));
    let pending: Vec<&Value> = decisions
        .as_ref()
        .and_then(Value::as_array)
        .map(|ds| ds.iter().filter(|d| d["answer"].is_null()).collect())
        .unwrap_or_default();
    if pending.is_empty() {
        println!("PENDING DECISIONS\n  (none)");
    } else {
        println!("PENDING DECISIONS");
        for decision in pending {
            println!(
                "  [{}] {}",
                decision["id"].as_str().unwrap_or("?"),
                decision["question"].as_str().unwrap_or("")
            );
        }
    }

    Ok(0)
}

fn load(path: &Path) -> Option<Value> {
    serde_json::from_str(&std::fs::read_to_string(path).ok()?).ok()
}
