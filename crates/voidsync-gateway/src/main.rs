// SPDX-License-Identifier: Apache-2.0
//! HTTP and WebSocket front door for the change-review pipeline: a minimal
//! `axum` router exposing the submission, approval, listing, and lock
//! endpoints plus the `/ws` push channel (§6).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use voidsync_app_core::{ConfigService, PipelineConfig};
use voidsync_change::{ChangeManager, ChangeManagerConfig};
use voidsync_config_fs::FsConfigStore;
use voidsync_events::EventBus;
use voidsync_plugins::builtins::{AccessibilityValidator, JsonFormatter, SecurityValidator, SyntaxValidator};
use voidsync_plugins::{Pipeline, Stage};
use voidsync_push_proto::{ClientMessage, ServerMessage};
use voidsync_store::{InMemoryStore, Store};
use voidsync_types::{ChangeFilter, ChangeId, ChangePage, ChangeStatus, LockId, VoidSyncError};

/// Shared, process-lifetime state behind every handler. A fresh
/// [`ChangeManager`] is built from this per request, the same way the Store
/// itself is wrapped fresh by `RateLimiter`/`LockRegistry` on every call.
struct AppContext {
    store: InMemoryStore,
    pipeline: Pipeline,
    events: EventBus,
    config: PipelineConfig,
}

impl AppContext {
    fn change_manager(&self) -> ChangeManager<'_> {
        ChangeManager::new(ChangeManagerConfig {
            store: &self.store,
            pipeline: &self.pipeline,
            events: &self.events,
            workspace_root: self.config.workspace_root.clone(),
            sandbox_root: self.config.sandbox_root.clone(),
            diff_context_lines: self.config.diff_context_lines,
            rate_limit_window: self.config.rate_limit_window(),
            rate_limit_max: self.config.rate_limit_max,
            max_file_size: self.config.max_file_size,
        })
    }
}

/// Wraps the pipeline's error taxonomy so handlers can return it directly;
/// the status code mapping is the single source of truth in `voidsync-types`.
struct ApiError(VoidSyncError);

impl From<VoidSyncError> for ApiError {
    fn from(err: VoidSyncError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        warn!(error = %self.0, status = status.as_u16(), "request failed");
        (status, Json(ErrorBody { error: self.0.to_string() })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Change-review pipeline gateway")]
struct Args {
    /// TCP listener for HTTP and WebSocket clients.
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: SocketAddr,
    /// Directory to load/persist pipeline configuration from, bypassing
    /// platform config-dir resolution. Primarily for containerized runs.
    #[arg(long)]
    config_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let args = Args::parse();
    let config = load_config(args.config_dir)?;

    tokio::fs::create_dir_all(&config.workspace_root).await.ok();
    tokio::fs::create_dir_all(&config.sandbox_root).await.ok();

    let mut pipeline = Pipeline::new().with_timeout(config.plugin_timeout());
    pipeline.register(Arc::new(SyntaxValidator::new(vec![Stage::PreSync, Stage::DuringSync])));
    pipeline.register(Arc::new(SecurityValidator::new(vec![Stage::PreSync, Stage::DuringSync])));
    pipeline.register(Arc::new(JsonFormatter::new(vec![Stage::PreSync, Stage::DuringSync])));
    pipeline.register(Arc::new(AccessibilityValidator::new(vec![Stage::PreSync, Stage::DuringSync])));

    let push_path = config.push_path.clone();
    let keep_alive_interval = config.keep_alive_interval();
    let ctx = Arc::new(AppContext {
        store: InMemoryStore::new(),
        pipeline,
        events: EventBus::with_keep_alive_interval(keep_alive_interval),
        config,
    });

    tokio::spawn(sweep_stale_subscribers(ctx.clone(), keep_alive_interval));

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/changes", post(submit_change).get(list_changes))
        .route("/changes/{id}/approve", post(approve_change))
        .route("/changes/{id}/reject", post(reject_change))
        .route("/locks", get(list_locks).post(create_lock))
        .route("/locks/{id}", delete(delete_lock))
        .route(&push_path, get(ws_handler))
        .with_state(ctx);

    let listener = tokio::net::TcpListener::bind(args.listen).await?;
    info!(listen = %args.listen, "gateway listening");
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

/// Evict push-channel clients that have missed two consecutive keep-alive
/// probes (§4.9).
async fn sweep_stale_subscribers(ctx: Arc<AppContext>, keep_alive_interval: chrono::Duration) {
    let period = keep_alive_interval
        .to_std()
        .unwrap_or(std::time::Duration::from_secs(30));
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        let evicted = ctx.events.sweep_stale(chrono::Utc::now());
        if !evicted.is_empty() {
            info!(count = evicted.len(), "evicted stale push-channel subscribers");
        }
    }
}

fn load_config(config_dir: Option<PathBuf>) -> anyhow::Result<PipelineConfig> {
    let config = match config_dir {
        Some(dir) => PipelineConfig::load(&ConfigService::new(FsConfigStore::at(dir)?))?,
        None => PipelineConfig::load(&ConfigService::new(FsConfigStore::new()?))?,
    };
    Ok(config)
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
}

async fn healthz() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

/// Snapshot analogous to the teacher's `GatewayMetrics`: counts of changes by
/// status plus the live subscriber count, not a full metrics/dashboard
/// surface (out of scope per §1).
#[derive(Serialize)]
struct MetricsBody {
    pending_changes: usize,
    approved_changes: usize,
    rejected_changes: usize,
    active_subscribers: usize,
}

async fn metrics(State(ctx): State<Arc<AppContext>>) -> Result<Json<MetricsBody>, ApiError> {
    let count_with_status = |status: ChangeStatus| -> Result<usize, VoidSyncError> {
        Ok(ctx
            .store
            .list_changes(&ChangeFilter {
                status: Some(status),
                ..ChangeFilter::default()
            })?
            .len())
    };

    Ok(Json(MetricsBody {
        pending_changes: count_with_status(ChangeStatus::Pending)?,
        approved_changes: count_with_status(ChangeStatus::Approved)?,
        rejected_changes: count_with_status(ChangeStatus::Rejected)?,
        active_subscribers: ctx.events.subscriber_count(),
    }))
}

#[derive(Deserialize)]
struct SubmitBody {
    agent_id: String,
    path: String,
    content: String,
}

#[derive(Serialize)]
struct SubmitResponse {
    change_id: ChangeId,
    status: ChangeStatus,
}

async fn submit_change(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<SubmitBody>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let manager = ctx.change_manager();
    let change_id = manager.submit(&body.agent_id, &body.path, &body.content).await?;
    Ok(Json(SubmitResponse {
        change_id,
        status: ChangeStatus::Pending,
    }))
}

#[derive(Deserialize, Default)]
struct ListQuery {
    #[serde(default)]
    status: Option<ChangeStatus>,
    #[serde(default)]
    agent_id: Option<String>,
    #[serde(default)]
    submitted_after: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    submitted_before: Option<chrono::DateTime<chrono::Utc>>,
    #[serde(default)]
    offset: Option<usize>,
    #[serde(default)]
    limit: Option<usize>,
}

async fn list_changes(
    State(ctx): State<Arc<AppContext>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ChangePage>, ApiError> {
    let manager = ctx.change_manager();
    let filter = ChangeFilter {
        status: query.status,
        agent_id: query.agent_id,
        submitted_after: query.submitted_after,
        submitted_before: query.submitted_before,
        offset: query.offset.unwrap_or(0),
        limit: query.limit,
    };
    Ok(Json(manager.list(&filter)?))
}

#[derive(Deserialize, Default)]
struct ApproveBody {
    approved_by: Option<String>,
}

async fn approve_change(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<ChangeId>,
    Json(body): Json<ApproveBody>,
) -> Result<Json<voidsync_types::Change>, ApiError> {
    let manager = ctx.change_manager();
    let approved_by = body.approved_by.as_deref().unwrap_or("unknown-operator");
    Ok(Json(manager.approve(id, approved_by).await?))
}

#[derive(Deserialize, Default)]
struct RejectBody {
    reason: Option<String>,
}

async fn reject_change(
    State(ctx): State<Arc<AppContext>>,
    Path(id): Path<ChangeId>,
    Json(body): Json<RejectBody>,
) -> Result<Json<voidsync_types::Change>, ApiError> {
    let manager = ctx.change_manager();
    Ok(Json(manager.reject(id, body.reason)?))
}

async fn list_locks(State(ctx): State<Arc<AppContext>>) -> Result<Json<Vec<voidsync_types::Lock>>, ApiError> {
    Ok(Json(ctx.store.list_locks()?))
}

#[derive(Deserialize)]
struct CreateLockBody {
    path: String,
    pattern: Option<String>,
}

async fn create_lock(
    State(ctx): State<Arc<AppContext>>,
    Json(body): Json<CreateLockBody>,
) -> Result<Json<voidsync_types::Lock>, ApiError> {
    let registry = voidsync_locks::LockRegistry::new(&ctx.store);
    Ok(Json(registry.create_lock(&body.path, body.pattern)?))
}

async fn delete_lock(State(ctx): State<Arc<AppContext>>, Path(id): Path<LockId>) -> Result<StatusCode, ApiError> {
    let registry = voidsync_locks::LockRegistry::new(&ctx.store);
    if registry.release_lock(id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Ok(StatusCode::NOT_FOUND)
    }
}

async fn ws_handler(State(ctx): State<Arc<AppContext>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, ctx))
}

async fn handle_socket(socket: WebSocket, ctx: Arc<AppContext>) {
    let (client_id, mut outbox) = ctx.events.register();
    let (mut ws_tx, mut ws_rx) = socket.split();

    let hello = serde_json::to_string(&ServerMessage::Connected {
        client_id: client_id.to_string(),
    });
    if let Ok(hello) = hello {
        if ws_tx.send(Message::Text(hello.into())).await.is_err() {
            ctx.events.disconnect(client_id);
            return;
        }
    }

    let writer = tokio::spawn(async move {
        while let Some(message) = outbox.recv().await {
            let Ok(text) = serde_json::to_string(&message) else {
                continue;
            };
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(message)) = ws_rx.next().await {
        match message {
            Message::Text(text) => {
                ctx.events.record_activity(client_id);
                let Ok(client_message) = serde_json::from_str::<ClientMessage>(&text) else {
                    continue;
                };
                match client_message {
                    ClientMessage::Ping => {
                        ctx.events.send_to(client_id, ServerMessage::Pong);
                    }
                    ClientMessage::Subscribe { channel } => {
                        ctx.events.subscribe(client_id, channel);
                    }
                    ClientMessage::Unsubscribe { channel } => {
                        ctx.events.unsubscribe(client_id, &channel);
                    }
                }
            }
            Message::Ping(_) | Message::Pong(_) => ctx.events.record_activity(client_id),
            Message::Close(_) => break,
            Message::Binary(_) => {}
        }
    }

    writer.abort();
    ctx.events.disconnect(client_id);
}
