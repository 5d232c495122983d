// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool dispatch: authority check, then one match arm per tool.

use crate::escalation::EscalationRegistry;
use crate::hooks::{LifecycleHooks, PrRequest, SpawnRequest};
use crate::tools::{ToolError, ToolRequest};
use arch_adapters::{GithubClient, GithubError};
use arch_core::{AgentStatus, LEAD_AGENT};
use arch_storage::{AgentPatch, StateStore};
use serde_json::{json, Value};
use std::sync::Arc;

/// Hosting-provider state decided at the startup gate.
pub enum GithubState {
    /// No `github:` section in config.
    Disabled,
    /// Configured but the CLI was missing or unauthenticated; the reason
    /// is echoed to callers.
    Unavailable(String),
    Ready(GithubClient),
}

/// Everything tool dispatch needs.
pub struct BusContext {
    pub store: Arc<StateStore>,
    pub escalations: EscalationRegistry,
    pub hooks: Arc<dyn LifecycleHooks>,
    pub github: GithubState,
    /// Default merge target when a request omits one.
    pub default_branch: String,
}

impl BusContext {
    fn github(&self) -> Result<&GithubClient, ToolError> {
        match &self.github {
            GithubState::Ready(client) => Ok(client),
            GithubState::Disabled => Err(ToolError::ProviderDisabled),
            GithubState::Unavailable(reason) => {
                Err(ToolError::ProviderUnavailable(reason.clone()))
            }
        }
    }
}

/// Dispatch one tool call attributed to `caller`.
pub async fn dispatch(
    ctx: &BusContext,
    caller: &str,
    req: ToolRequest,
) -> Result<Value, ToolError> {
    if req.lead_only() && caller != LEAD_AGENT {
        return Err(ToolError::AccessDenied(format!(
            "{} is not available to {caller}",
            req.name()
        )));
    }

    match req {
        ToolRequest::SendMessage { to, content } => {
            let message = ctx.store.append_message(caller, &to, &content);
            Ok(json!({"id": message.id, "timestamp": message.timestamp}))
        }

        ToolRequest::GetMessages { since } => {
            let (messages, cursor) = ctx.store.messages_since(caller, since);
            Ok(json!({"messages": messages, "cursor": cursor}))
        }

        ToolRequest::UpdateStatus { task, status } => {
            let status: AgentStatus =
                status.parse().map_err(|e: arch_core::InvalidStatusError| {
                    ToolError::InvalidStatus(e.to_string())
                })?;
            let patch = AgentPatch { status: Some(status), task: Some(task), ..Default::default() };
            ctx.store
                .update_agent(caller, patch)
                .map_err(|_| ToolError::UnknownAgent(caller.to_string()))?;
            Ok(json!({"ok": true}))
        }

        ToolRequest::ReportCompletion { summary, artifacts } => {
            let patch = AgentPatch {
                status: Some(AgentStatus::Done),
                task: Some(summary.clone()),
                ..Default::default()
            };
            ctx.store
                .update_agent(caller, patch)
                .map_err(|_| ToolError::UnknownAgent(caller.to_string()))?;
            ctx.store.append_message(
                caller,
                LEAD_AGENT,
                &format!("Work complete: {summary}\nArtifacts: {}", artifacts.join(", ")),
            );
            Ok(json!({"ok": true}))
        }

        ToolRequest::SaveProgress { files_modified, progress, next_steps, blockers, decisions } => {
            let context = arch_core::SessionContext {
                files_modified,
                progress,
                next_steps,
                blockers,
                decisions: decisions.unwrap_or_default(),
            };
            ctx.store
                .update_context(caller, context)
                .map_err(|_| ToolError::UnknownAgent(caller.to_string()))?;
            Ok(json!({"ok": true}))
        }

        ToolRequest::SpawnAgent { role, assignment, context, skip_permissions } => {
            let outcome = ctx
                .hooks
                .spawn_agent(SpawnRequest {
                    role,
                    assignment,
                    context,
                    skip_permissions: skip_permissions.unwrap_or(false),
                })
                .await?;
            Ok(json!({
                "agent_id": outcome.agent_id,
                "worktree": outcome.worktree,
                "sandboxed": outcome.sandboxed,
                "skip_permissions": outcome.skip_permissions,
                "status": "spawning",
            }))
        }

        ToolRequest::TeardownAgent { agent_id, reason } => {
            if agent_id == LEAD_AGENT {
                return Err(ToolError::AccessDenied(
                    "the lead agent cannot be torn down".to_string(),
                ));
            }
            if let Some(reason) = &reason {
                ctx.store.append_message(caller, &agent_id, &format!("Shutting down: {reason}"));
            }
            ctx.hooks.teardown_agent(&agent_id, reason.as_deref()).await?;
            Ok(json!({"ok": true}))
        }

        ToolRequest::ListAgents => {
            let agents: Vec<Value> = ctx
                .store
                .agents()
                .into_iter()
                .map(|a| {
                    json!({
                        "id": a.id,
                        "role": a.role,
                        "status": a.status,
                        "task": a.task,
                        "tokens_used": a.usage.total_tokens(),
                        "cost_usd": a.usage.cost_usd,
                    })
                })
                .collect();
            Ok(json!({"agents": agents}))
        }

        ToolRequest::EscalateToUser { question, options } => {
            let decision = ctx.store.queue_decision(&question, &options.unwrap_or_default());
            let rx = ctx.escalations.register(decision.id.as_str());
            tracing::info!(decision_id = %decision.id, "escalation queued, blocking on answer");

            match rx.await {
                Ok(answer) => Ok(json!({"answer": answer})),
                Err(_) => {
                    ctx.escalations.discard(decision.id.as_str());
                    Err(ToolError::Internal("escalation abandoned without an answer".to_string()))
                }
            }
        }

        ToolRequest::RequestMerge { agent_id, target_branch, pr_title, pr_body } => {
            let target = target_branch.unwrap_or_else(|| ctx.default_branch.clone());
            let pr = pr_title
                .map(|title| PrRequest { title, body: pr_body.unwrap_or_default() });
            ctx.hooks.request_merge(&agent_id, &target, pr).await
        }

        ToolRequest::GetProjectContext => ctx.hooks.project_context().await,

        ToolRequest::UpdateBrief { section, content } => {
            ctx.hooks.update_brief(section, &content).await?;
            Ok(json!({"ok": true}))
        }

        ToolRequest::CloseProject { summary } => {
            ctx.hooks.close_project(&summary).await?;
            Ok(json!({"ok": true}))
        }

        ToolRequest::GhCreateIssue { title, body, labels, milestone, assignee } => {
            let client = ctx.github()?;
            let (number, url) = client
                .create_issue(
                    &title,
                    &body,
                    &labels.unwrap_or_default(),
                    milestone.as_deref(),
                    assignee.as_deref(),
                )
                .await
                .map_err(provider_error)?;
            Ok(json!({"issue_number": number, "url": url}))
        }

        ToolRequest::GhListIssues { labels, milestone, state, limit } => {
            let client = ctx.github()?;
            let issues = client
                .list_issues(
                    &labels.unwrap_or_default(),
                    milestone.as_deref(),
                    state.as_deref().unwrap_or("open"),
                    limit.unwrap_or(30),
                )
                .await
                .map_err(provider_error)?;
            let issues: Vec<Value> = issues
                .into_iter()
                .map(|i| {
                    json!({
                        "number": i.number,
                        "title": i.title,
                        "labels": i.labels.iter().map(|l| l.name.clone()).collect::<Vec<_>>(),
                        "state": i.state,
                        "url": i.url,
                    })
                })
                .collect();
            Ok(json!({"issues": issues}))
        }

        ToolRequest::GhCloseIssue { issue_number, comment } => {
            let client = ctx.github()?;
            client.close_issue(issue_number, comment.as_deref()).await.map_err(provider_error)?;
            Ok(json!({"ok": true}))
        }

        ToolRequest::GhUpdateIssue { issue_number, add_labels, remove_labels, milestone, assignee } => {
            let client = ctx.github()?;
            client
                .update_issue(
                    issue_number,
                    &add_labels.unwrap_or_default(),
                    &remove_labels.unwrap_or_default(),
                    milestone.as_deref(),
                    assignee.as_deref(),
                )
                .await
                .map_err(provider_error)?;
            Ok(json!({"ok": true}))
        }

        ToolRequest::GhAddComment { issue_number, body } => {
            let client = ctx.github()?;
            client.add_comment(issue_number, &body).await.map_err(provider_error)?;
            Ok(json!({"ok": true}))
        }

        ToolRequest::GhCreateMilestone { title, description, due_date } => {
            let client = ctx.github()?;
            let milestone = client
                .create_milestone(&title, description.as_deref(), due_date.as_deref())
                .await
                .map_err(provider_error)?;
            Ok(json!({"milestone_number": milestone.number, "url": milestone.html_url}))
        }

        ToolRequest::GhListMilestones => {
            let client = ctx.github()?;
            let milestones = client.list_milestones().await.map_err(provider_error)?;
            let milestones: Vec<Value> = milestones
                .into_iter()
                .map(|m| {
                    json!({
                        "number": m.number,
                        "title": m.title,
                        "open_issues": m.open_issues,
                        "closed_issues": m.closed_issues,
                        "due_date": m.due_on,
                        "url": m.html_url,
                    })
                })
                .collect();
            Ok(json!({"milestones": milestones}))
        }
    }
}

fn provider_error(e: GithubError) -> ToolError {
    match e {
        GithubError::CliMissing | GithubError::Unauthenticated(_) => {
            ToolError::ProviderUnavailable(e.to_string())
        }
        other => ToolError::ProviderCallFailed(other.to_string()),
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
