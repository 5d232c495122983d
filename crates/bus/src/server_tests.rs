// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::dispatch::GithubState;
use crate::escalation::EscalationRegistry;
use crate::hooks::{LifecycleHooks, PrRequest, SpawnOutcome, SpawnRequest};
use crate::tools::BriefSection;
use arch_storage::StateStore;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::json;

struct NoopHooks;

#[async_trait]
impl LifecycleHooks for NoopHooks {
    async fn spawn_agent(&self, req: SpawnRequest) -> Result<SpawnOutcome, ToolError> {
        Ok(SpawnOutcome {
            agent_id: format!("{}-1", req.role),
            worktree: "/tmp/wt".to_string(),
            sandboxed: false,
            skip_permissions: false,
        })
    }

    async fn teardown_agent(&self, _: &str, _: Option<&str>) -> Result<(), ToolError> {
        Ok(())
    }

    async fn request_merge(
        &self,
        _: &str,
        _: &str,
        _: Option<PrRequest>,
    ) -> Result<serde_json::Value, ToolError> {
        Ok(json!({"merged": true}))
    }

    async fn close_project(&self, _: &str) -> Result<(), ToolError> {
        Ok(())
    }

    async fn project_context(&self) -> Result<serde_json::Value, ToolError> {
        Ok(json!({}))
    }

    async fn update_brief(&self, _: BriefSection, _: &str) -> Result<(), ToolError> {
        Ok(())
    }
}

async fn start_bus() -> (std::net::SocketAddr, CancellationToken, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(StateStore::open(dir.path()).unwrap());
    let ctx = Arc::new(BusContext {
        store,
        escalations: EscalationRegistry::new(),
        hooks: Arc::new(NoopHooks),
        github: GithubState::Disabled,
        default_branch: "main".to_string(),
    });

    let handle = bind(ctx, 0).await.unwrap();
    let addr = handle.addr;
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    tokio::spawn(async move {
        let _ = serve_on(handle, token).await;
    });
    (addr, shutdown, dir)
}

#[tokio::test]
async fn post_dispatches_and_returns_json_result() {
    let (addr, shutdown, _dir) = start_bus().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/messages/archie"))
        .json(&json!({"tool": "send_message", "to": "qa-1", "content": "hello"}))
        .send()
        .await
        .unwrap();
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["id"], 1);
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));

    shutdown.cancel();
}

#[tokio::test]
async fn caller_identity_comes_from_the_url_path() {
    let (addr, shutdown, _dir) = start_bus().await;
    let client = reqwest::Client::new();

    // A worker path id cannot reach lead-only tools.
    let body: serde_json::Value = client
        .post(format!("http://{addr}/messages/qa-1"))
        .json(&json!({"tool": "list_agents"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["error"]["kind"], "access_denied");

    // The same payload from the lead path succeeds.
    let body: serde_json::Value = client
        .post(format!("http://{addr}/messages/archie"))
        .json(&json!({"tool": "list_agents"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(body["agents"].is_array());

    shutdown.cancel();
}

#[tokio::test]
async fn malformed_tool_calls_return_structured_errors() {
    let (addr, shutdown, _dir) = start_bus().await;
    let client = reqwest::Client::new();

    let body: serde_json::Value = client
        .post(format!("http://{addr}/messages/archie"))
        .json(&json!({"tool": "rm_rf"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["error"]["kind"], "invalid_request");

    shutdown.cancel();
}

#[tokio::test]
async fn sse_stream_announces_the_message_endpoint() {
    let (addr, shutdown, _dir) = start_bus().await;
    let client = reqwest::Client::new();

    let response =
        client.get(format!("http://{addr}/sse/frontend-1")).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let mut stream = response.bytes_stream();
    let first = stream.next().await.unwrap().unwrap();
    let text = String::from_utf8_lossy(&first);
    assert!(text.contains("event: endpoint"));
    assert!(text.contains("data: /messages/frontend-1"));

    shutdown.cancel();
}

#[tokio::test]
async fn concurrent_sends_never_share_an_id() {
    let (addr, shutdown, _dir) = start_bus().await;
    let client = reqwest::Client::new();

    let mut handles = Vec::new();
    for i in 0..20 {
        let client = client.clone();
        handles.push(tokio::spawn(async move {
            let body: serde_json::Value = client
                .post(format!("http://{addr}/messages/archie"))
                .json(&json!({"tool": "send_message", "to": "broadcast", "content": format!("m{i}")}))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            body["id"].as_u64().unwrap()
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap());
    }
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 20);

    shutdown.cancel();
}
