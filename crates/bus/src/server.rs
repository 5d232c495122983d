// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The axum server binding the bus to a loopback port.
//!
//! `GET /sse/{agent_id}` opens the agent's event stream (first event
//! announces the message-post endpoint); `POST /messages/{agent_id}`
//! carries tool calls. The path id attributes every request; there is
//! no separate authentication step, the loopback binding is the trust
//! boundary.

use crate::dispatch::{dispatch, BusContext};
use crate::tools::{ToolError, ToolRequest};
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// A bound but not yet serving bus.
pub struct BusHandle {
    pub addr: SocketAddr,
    listener: TcpListener,
    ctx: Arc<BusContext>,
}

/// Bind the bus to `127.0.0.1:{port}`. Pass port 0 to let the OS pick
/// (used by tests).
pub async fn bind(ctx: Arc<BusContext>, port: u16) -> std::io::Result<BusHandle> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "bus server bound");
    Ok(BusHandle { addr, listener, ctx })
}

/// Serve until the shutdown token fires.
pub async fn serve_on(handle: BusHandle, shutdown: CancellationToken) -> std::io::Result<()> {
    let app = router(handle.ctx);
    axum::serve(handle.listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

fn router(ctx: Arc<BusContext>) -> Router {
    Router::new()
        .route("/sse/:agent_id", get(sse_handler))
        .route("/messages/:agent_id", post(messages_handler))
        .with_state(ctx)
}

/// Event stream for one agent: an `endpoint` event announcing where to
/// POST tool calls, then keepalives for the life of the connection.
async fn sse_handler(
    Path(agent_id): Path<String>,
    State(_ctx): State<Arc<BusContext>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::info!(agent_id, "agent connected to event stream");
    let endpoint =
        Event::default().event("endpoint").data(format!("/messages/{agent_id}"));
    let stream = stream::once(async move { Ok(endpoint) }).chain(stream::pending());
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

/// Decode, attribute, dispatch, and answer one tool call.
async fn messages_handler(
    Path(agent_id): Path<String>,
    State(ctx): State<Arc<BusContext>>,
    body: Json<serde_json::Value>,
) -> impl IntoResponse {
    let request = match serde_json::from_value::<ToolRequest>(body.0) {
        Ok(request) => request,
        Err(e) => {
            return Json(ToolError::InvalidRequest(e.to_string()).to_json());
        }
    };

    tracing::debug!(agent_id, tool = request.name(), "tool call received");
    match dispatch(&ctx, &agent_id, request).await {
        Ok(result) => Json(result),
        Err(e) => {
            tracing::debug!(agent_id, error = %e, "tool call failed");
            Json(e.to_json())
        }
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
