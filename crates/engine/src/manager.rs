// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session manager: one supervisor per live agent, with concurrent
//! shutdown fan-out.

use crate::container::ContainerSession;
use crate::session::LocalSession;
use arch_core::AgentId;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Contract shared by the local and containerized execution variants.
#[async_trait]
pub trait AgentSession: Send + Sync {
    fn agent_id(&self) -> &AgentId;
    fn is_running(&self) -> bool;
    fn resume_token(&self) -> Option<String>;
    async fn stop(&self, grace: Duration) -> bool;
}

#[async_trait]
impl AgentSession for LocalSession {
    fn agent_id(&self) -> &AgentId {
        LocalSession::agent_id(self)
    }

    fn is_running(&self) -> bool {
        LocalSession::is_running(self)
    }

    fn resume_token(&self) -> Option<String> {
        LocalSession::resume_token(self)
    }

    async fn stop(&self, grace: Duration) -> bool {
        LocalSession::stop(self, grace).await
    }
}

#[async_trait]
impl AgentSession for ContainerSession {
    fn agent_id(&self) -> &AgentId {
        ContainerSession::agent_id(self)
    }

    fn is_running(&self) -> bool {
        ContainerSession::is_running(self)
    }

    fn resume_token(&self) -> Option<String> {
        ContainerSession::resume_token(self)
    }

    async fn stop(&self, grace: Duration) -> bool {
        ContainerSession::stop(self, grace).await
    }
}

/// Tracks every live session by agent id.
#[derive(Default)]
pub struct SessionManager {
    sessions: Mutex<HashMap<String, Arc<dyn AgentSession>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Arc<dyn AgentSession>) {
        let id = session.agent_id().as_str().to_string();
        self.sessions.lock().insert(id, session);
    }

    pub fn get(&self, agent_id: &str) -> Option<Arc<dyn AgentSession>> {
        self.sessions.lock().get(agent_id).cloned()
    }

    pub fn remove(&self, agent_id: &str) -> Option<Arc<dyn AgentSession>> {
        self.sessions.lock().remove(agent_id)
    }

    pub fn running(&self) -> Vec<Arc<dyn AgentSession>> {
        self.sessions.lock().values().filter(|s| s.is_running()).cloned().collect()
    }

    pub fn resume_token(&self, agent_id: &str) -> Option<String> {
        self.get(agent_id).and_then(|s| s.resume_token())
    }

    /// Stop one session. Returns false for an unknown agent.
    pub async fn stop(&self, agent_id: &str, grace: Duration) -> bool {
        match self.get(agent_id) {
            Some(session) => session.stop(grace).await,
            None => false,
        }
    }

    /// Stop every running session concurrently; returns how many
    /// confirmed stopping within their grace period.
    pub async fn stop_all(&self, grace: Duration) -> usize {
        let mut set = tokio::task::JoinSet::new();
        for session in self.running() {
            set.spawn(async move { session.stop(grace).await });
        }
        let mut stopped = 0;
        while let Some(result) = set.join_next().await {
            if matches!(result, Ok(true)) {
                stopped += 1;
            }
        }
        stopped
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
