// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn state_dir_defaults_when_config_is_absent() {
    let dir = state_dir_for(Path::new("/nonexistent/arch.yaml"));
    assert_eq!(dir, PathBuf::from("./state"));
}

#[test]
fn state_dir_resolves_relative_to_the_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("arch.yaml");
    std::fs::write(&config, "project:\n  name: x\nsettings:\n  state_dir: ./run-state\n").unwrap();

    assert_eq!(state_dir_for(&config), dir.path().join("./run-state"));
}

#[test]
fn pid_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    assert!(read_pid(dir.path()).is_none());

    std::fs::write(pid_file(dir.path()), "4242\n").unwrap();
    assert_eq!(read_pid(dir.path()), Some(4242));

    std::fs::write(pid_file(dir.path()), "not a pid\n").unwrap();
    assert!(read_pid(dir.path()).is_none());
}
