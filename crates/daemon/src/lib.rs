// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator: startup gates, lifecycle callbacks, supervision loop,
//! and graceful shutdown of the whole harness.

pub mod brief;
pub mod dashboard;
pub mod gates;
pub mod orchestrator;

pub use brief::BriefFile;
pub use dashboard::{DashboardHandle, DashboardSnapshot, POLL_INTERVAL};
pub use orchestrator::{Orchestrator, OrchestratorOptions, StartupError};
