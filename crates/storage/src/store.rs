// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The state store: agents, messages, decisions, tasks, cursors.
//!
//! All mutations serialize behind one writer lock; readers receive cloned
//! snapshots and never hold the lock across I/O. Every mutating call
//! rewrites the affected partition's JSON mirror via a temp-file-plus-
//! rename sequence before returning, so a reader can never observe a
//! partial write.

use arch_core::{
    utc_now, AgentId, AgentRecord, AgentStatus, Decision, DecisionId, ExecHandle, Message,
    MessageId, ProjectContext, SessionContext, Task, TaskId, TaskStatus, UsageTotals, LEAD_AGENT,
};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("agent '{0}' is already registered")]
    DuplicateAgent(String),

    #[error("unknown agent '{0}'")]
    UnknownAgent(String),

    #[error("unknown task '{0}'")]
    UnknownTask(String),

    #[error("state I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("state serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Typed field patch for `update_agent`. Absent fields are untouched.
#[derive(Debug, Default, Clone)]
pub struct AgentPatch {
    pub status: Option<AgentStatus>,
    pub task: Option<String>,
    pub resume_token: Option<String>,
    pub exec: Option<ExecHandle>,
}

/// Deep snapshot of the whole aggregate, for the dashboard and tests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub project: ProjectContext,
    pub agents: Vec<AgentRecord>,
    pub messages: Vec<Message>,
    pub decisions: Vec<Decision>,
    pub tasks: Vec<Task>,
}

#[derive(Default)]
struct Partitions {
    project: ProjectContext,
    agents: HashMap<String, AgentRecord>,
    messages: Vec<Message>,
    next_message_id: MessageId,
    decisions: Vec<Decision>,
    tasks: Vec<Task>,
    /// Per-agent read cursors. Only the lead's survives restarts.
    cursors: HashMap<String, MessageId>,
}

/// Single-writer state store mirrored to `{state_dir}/*.json`.
pub struct StateStore {
    state_dir: PathBuf,
    inner: Mutex<Partitions>,
}

#[derive(Serialize, Deserialize)]
struct CursorFile {
    cursor: MessageId,
}

impl StateStore {
    /// Open the store, loading any prior run's state from `state_dir`.
    ///
    /// Corrupt partition files are logged and reinitialized empty; the
    /// run is recoverable, not fatal.
    pub fn open(state_dir: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(state_dir)?;
        let mut parts = Partitions::default();

        if let Some(project) = load_partition::<ProjectContext>(state_dir, "project") {
            parts.project = project;
        }
        if let Some(agents) = load_partition::<HashMap<String, AgentRecord>>(state_dir, "agents") {
            parts.agents = agents;
        }
        if let Some(messages) = load_partition::<Vec<Message>>(state_dir, "messages") {
            parts.next_message_id = messages.iter().map(|m| m.id).max().map_or(1, |id| id + 1);
            parts.messages = messages;
        } else {
            parts.next_message_id = 1;
        }
        if let Some(decisions) = load_partition::<Vec<Decision>>(state_dir, "decisions") {
            parts.decisions = decisions;
        }
        if let Some(tasks) = load_partition::<Vec<Task>>(state_dir, "tasks") {
            parts.tasks = tasks;
        }
        if let Some(cursor) = load_named::<CursorFile>(&state_dir.join("archie-cursor.json")) {
            parts.cursors.insert(LEAD_AGENT.to_string(), cursor.cursor);
        }

        Ok(Self { state_dir: state_dir.to_path_buf(), inner: Mutex::new(parts) })
    }

    // --- Project ---

    pub fn init_project(&self, name: &str, description: &str, repo: &Path) {
        let mut inner = self.inner.lock();
        inner.project = ProjectContext {
            name: name.to_string(),
            description: description.to_string(),
            repo: repo.to_path_buf(),
            started_at: utc_now(),
        };
        self.write_partition("project", &inner.project);
    }

    pub fn project(&self) -> ProjectContext {
        self.inner.lock().project.clone()
    }

    // --- Agents ---

    /// Register a new agent. Ids are unique for the life of the run.
    pub fn register_agent(&self, record: AgentRecord) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let key = record.id.as_str().to_string();
        if inner.agents.contains_key(&key) {
            return Err(StoreError::DuplicateAgent(key));
        }
        inner.agents.insert(key, record);
        self.write_partition("agents", &inner.agents);
        Ok(())
    }

    pub fn agent(&self, agent_id: &str) -> Option<AgentRecord> {
        self.inner.lock().agents.get(agent_id).cloned()
    }

    /// Snapshot of every agent record.
    pub fn agents(&self) -> Vec<AgentRecord> {
        let inner = self.inner.lock();
        let mut agents: Vec<_> = inner.agents.values().cloned().collect();
        agents.sort_by(|a, b| a.spawned_at.cmp(&b.spawned_at).then(a.id.as_str().cmp(b.id.as_str())));
        agents
    }

    /// Agents whose status is not terminal.
    pub fn active_agents(&self) -> Vec<AgentRecord> {
        self.agents().into_iter().filter(|a| a.is_active()).collect()
    }

    pub fn update_agent(&self, agent_id: &str, patch: AgentPatch) -> Result<AgentRecord, StoreError> {
        let mut inner = self.inner.lock();
        let record = inner
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| StoreError::UnknownAgent(agent_id.to_string()))?;

        if let Some(status) = patch.status {
            record.status = status;
        }
        if let Some(task) = patch.task {
            record.task = task;
        }
        if let Some(token) = patch.resume_token {
            record.resume_token = Some(token);
        }
        if let Some(exec) = patch.exec {
            record.exec = Some(exec);
        }

        let updated = record.clone();
        self.write_partition("agents", &inner.agents);
        Ok(updated)
    }

    /// Replace an agent's usage totals (written by its session supervisor).
    pub fn update_usage(&self, agent_id: &str, usage: UsageTotals) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let record = inner
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| StoreError::UnknownAgent(agent_id.to_string()))?;
        record.usage = usage;
        self.write_partition("agents", &inner.agents);
        Ok(())
    }

    /// Replace an agent's structured session context (`save_progress`).
    pub fn update_context(
        &self,
        agent_id: &str,
        context: SessionContext,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let record = inner
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| StoreError::UnknownAgent(agent_id.to_string()))?;
        record.context = Some(context);
        self.write_partition("agents", &inner.agents);
        Ok(())
    }

    pub fn remove_agent(&self, agent_id: &str) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.agents.remove(agent_id).is_some();
        if removed {
            self.write_partition("agents", &inner.agents);
        }
        removed
    }

    // --- Messages ---

    /// Append a message; the id is the next value of a monotone counter.
    pub fn append_message(&self, from: &str, to: &str, content: &str) -> Message {
        let mut inner = self.inner.lock();
        let id = inner.next_message_id;
        inner.next_message_id += 1;
        let message = Message {
            id,
            from: from.to_string(),
            to: to.to_string(),
            content: content.to_string(),
            timestamp: utc_now(),
            read: false,
        };
        inner.messages.push(message.clone());
        self.write_partition("messages", &inner.messages);
        message
    }

    /// Messages addressed to `for_agent` (or broadcast) with id strictly
    /// greater than the cursor. When `since` is absent the agent's stored
    /// cursor is used. Returned messages are marked read; the new cursor
    /// is the last returned id. The lead's cursor is persisted before the
    /// call returns.
    pub fn messages_since(
        &self,
        for_agent: &str,
        since: Option<MessageId>,
    ) -> (Vec<Message>, MessageId) {
        let mut inner = self.inner.lock();
        let cursor = since.or_else(|| inner.cursors.get(for_agent).copied()).unwrap_or(0);

        let mut delivered = Vec::new();
        let mut marked = false;
        for msg in inner.messages.iter_mut() {
            if msg.id > cursor && msg.is_for(for_agent) {
                if !msg.read {
                    msg.read = true;
                    marked = true;
                }
                delivered.push(msg.clone());
            }
        }

        let new_cursor = delivered.last().map_or(cursor, |m| m.id);
        inner.cursors.insert(for_agent.to_string(), new_cursor);

        if marked {
            self.write_partition("messages", &inner.messages);
        }
        if for_agent == LEAD_AGENT {
            self.write_named("archie-cursor.json", &CursorFile { cursor: new_cursor });
        }

        (delivered, new_cursor)
    }

    pub fn all_messages(&self) -> Vec<Message> {
        self.inner.lock().messages.clone()
    }

    /// The lead's persisted read cursor.
    pub fn lead_cursor(&self) -> MessageId {
        self.inner.lock().cursors.get(LEAD_AGENT).copied().unwrap_or(0)
    }

    // --- Decisions ---

    pub fn queue_decision(&self, question: &str, options: &[String]) -> Decision {
        let mut inner = self.inner.lock();
        let decision = Decision {
            id: DecisionId::generate(),
            question: question.to_string(),
            options: options.to_vec(),
            asked_at: utc_now(),
            answered_at: None,
            answer: None,
        };
        inner.decisions.push(decision.clone());
        self.write_partition("decisions", &inner.decisions);
        decision
    }

    pub fn pending_decisions(&self) -> Vec<Decision> {
        self.inner
            .lock()
            .decisions
            .iter()
            .filter(|d| !d.is_resolved())
            .cloned()
            .collect()
    }

    pub fn decision(&self, id: &str) -> Option<Decision> {
        self.inner.lock().decisions.iter().find(|d| d.id == id).cloned()
    }

    /// Record the answer to a decision. Idempotent: answering an already
    /// resolved decision is a no-op that returns the original answer.
    /// Returns `None` for an unknown id.
    pub fn answer_decision(&self, id: &str, answer: &str) -> Option<String> {
        let mut inner = self.inner.lock();
        let decision = inner.decisions.iter_mut().find(|d| d.id == id)?;
        if let Some(existing) = &decision.answer {
            return Some(existing.clone());
        }
        decision.answer = Some(answer.to_string());
        decision.answered_at = Some(utc_now());
        let recorded = decision.answer.clone();
        self.write_partition("decisions", &inner.decisions);
        recorded
    }

    // --- Tasks ---

    pub fn add_task(&self, assigned_to: &AgentId, description: &str) -> Task {
        let mut inner = self.inner.lock();
        let task = Task {
            id: TaskId::generate(),
            assigned_to: assigned_to.as_str().to_string(),
            description: description.to_string(),
            status: TaskStatus::Pending,
            created_at: utc_now(),
            completed_at: None,
        };
        inner.tasks.push(task.clone());
        self.write_partition("tasks", &inner.tasks);
        task
    }

    /// Update a task's status; `completed_at` is stamped when the task
    /// first transitions to done.
    pub fn update_task(&self, id: &str, status: TaskStatus) -> Result<Task, StoreError> {
        let mut inner = self.inner.lock();
        let task = inner
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::UnknownTask(id.to_string()))?;
        task.status = status;
        if status == TaskStatus::Done && task.completed_at.is_none() {
            task.completed_at = Some(utc_now());
        }
        let updated = task.clone();
        self.write_partition("tasks", &inner.tasks);
        Ok(updated)
    }

    pub fn tasks(&self, assigned_to: Option<&str>) -> Vec<Task> {
        self.inner
            .lock()
            .tasks
            .iter()
            .filter(|t| assigned_to.map_or(true, |a| t.assigned_to == a))
            .cloned()
            .collect()
    }

    // --- Snapshot ---

    pub fn snapshot(&self) -> StoreSnapshot {
        let inner = self.inner.lock();
        let mut agents: Vec<_> = inner.agents.values().cloned().collect();
        agents.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
        StoreSnapshot {
            project: inner.project.clone(),
            agents,
            messages: inner.messages.clone(),
            decisions: inner.decisions.clone(),
            tasks: inner.tasks.clone(),
        }
    }

    // --- Persistence ---

    fn write_partition<T: Serialize>(&self, name: &str, data: &T) {
        self.write_named(&format!("{name}.json"), data);
    }

    /// Atomic replace: serialize to a temp file in the same directory,
    /// then rename over the target.
    fn write_named<T: Serialize>(&self, file_name: &str, data: &T) {
        let path = self.state_dir.join(file_name);
        let tmp = self.state_dir.join(format!(".{file_name}.tmp"));
        let result = serde_json::to_vec_pretty(data)
            .map_err(std::io::Error::other)
            .and_then(|bytes| std::fs::write(&tmp, bytes))
            .and_then(|()| std::fs::rename(&tmp, &path));
        if let Err(e) = result {
            tracing::error!(file = file_name, error = %e, "failed to persist state partition");
        }
    }
}

fn load_partition<T: DeserializeOwned>(state_dir: &Path, name: &str) -> Option<T> {
    load_named(&state_dir.join(format!("{name}.json")))
}

/// Decode a partition file. Missing files are silently skipped; corrupt
/// files log a warning and the partition starts empty.
fn load_named<T: DeserializeOwned>(path: &Path) -> Option<T> {
    if !path.exists() {
        return None;
    }
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to read state file, resetting partition");
            return None;
        }
    };
    match serde_json::from_slice(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "corrupt state file, resetting partition");
            None
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
