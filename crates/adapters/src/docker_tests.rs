// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn spec() -> ContainerSpec {
    ContainerSpec {
        agent_id: "qa-1".to_string(),
        image: "arch-agent:latest".to_string(),
        worktree: PathBuf::from("/repo/.worktrees/qa-1"),
        bus_config: PathBuf::from("/state/qa-1-mcp.json"),
        network: Network::Bridge,
        memory_limit: None,
        cpus: None,
        extra_mounts: vec![],
        api_key: None,
    }
}

#[test]
fn run_args_include_mounts_and_auto_remove() {
    let args = spec().run_args();

    assert_eq!(args[0], "run");
    assert!(args.contains(&"--rm".to_string()));
    assert!(args.contains(&"arch-qa-1".to_string()));
    assert!(args.contains(&format!("/repo/.worktrees/qa-1:{WORKSPACE_MOUNT}")));
    assert!(args.contains(&format!("/state/qa-1-mcp.json:{BUS_CONFIG_MOUNT}:ro")));
    assert_eq!(args.last().unwrap(), "arch-agent:latest");
}

#[cfg(target_os = "linux")]
#[test]
fn linux_wires_host_gateway() {
    let args = spec().run_args();
    let pos = args.iter().position(|a| a == "--add-host").unwrap();
    assert_eq!(args[pos + 1], format!("{HOST_GATEWAY}:host-gateway"));
}

#[test]
fn resource_limits_and_network_are_applied() {
    let mut spec = spec();
    spec.memory_limit = Some("2g".to_string());
    spec.cpus = Some(1.5);
    spec.network = Network::None;
    spec.extra_mounts = vec!["/opt/cache".to_string()];
    let args = spec.run_args();

    let mem = args.iter().position(|a| a == "--memory").unwrap();
    assert_eq!(args[mem + 1], "2g");
    let cpus = args.iter().position(|a| a == "--cpus").unwrap();
    assert_eq!(args[cpus + 1], "1.5");
    let net = args.iter().position(|a| a == "--network").unwrap();
    assert_eq!(args[net + 1], "none");
    assert!(args.contains(&"/opt/cache:/opt/cache:ro".to_string()));
}

#[test]
fn bridge_network_adds_no_flag() {
    let args = spec().run_args();
    assert!(!args.contains(&"--network".to_string()));
}

#[test]
fn api_key_is_passed_through_env() {
    let mut spec = spec();
    spec.api_key = Some("sk-test".to_string());
    let args = spec.run_args();
    assert!(args.contains(&"ANTHROPIC_API_KEY=sk-test".to_string()));
}

#[test]
fn cleanup_set_registers_and_drains() {
    let cleanup = ContainerCleanup::new();
    cleanup.register("arch-qa-1");
    cleanup.register("arch-qa-2");
    cleanup.unregister("arch-qa-1");
    assert_eq!(cleanup.registered(), vec!["arch-qa-2".to_string()]);
}

#[test]
fn container_names_carry_prefix() {
    assert_eq!(container_name("frontend-2"), "arch-frontend-2");
}
