use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::logsink::LogSink;
use crate::orchestrator::OrchestratorRegistry;

/// Contadores proceso-globales que observa el dashboard.
pub struct BotStatus {
    started_at: Instant,
    online: AtomicBool,
    servers: AtomicUsize,
    users: AtomicUsize,
}

impl BotStatus {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            online: AtomicBool::new(false),
            servers: AtomicUsize::new(0),
            users: AtomicUsize::new(0),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::Relaxed);
    }

    pub fn set_servers(&self, count: usize) {
        self.servers.store(count, Ordering::Relaxed);
    }

    pub fn set_users(&self, count: usize) {
        self.users.store(count, Ordering::Relaxed);
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for BotStatus {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
struct DashboardState {
    status: Arc<BotStatus>,
    logs: Arc<LogSink>,
    registry: Arc<OrchestratorRegistry>,
}

/// Levanta el servidor HTTP+WebSocket del dashboard en segundo plano.
pub async fn serve(
    port: u16,
    status: Arc<BotStatus>,
    logs: Arc<LogSink>,
    registry: Arc<OrchestratorRegistry>,
) -> Result<()> {
    let state = DashboardState {
        status,
        logs,
        registry,
    };

    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/stats", get(stats))
        .route("/api/logs", get(logs_endpoint))
        .route("/api/commands", get(commands))
        .route("/ws/logs", get(ws_logs))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    info!("📊 Dashboard escuchando en puerto {}", port);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(state): State<DashboardState>) -> Json<serde_json::Value> {
    let online = state.status.online.load(Ordering::Relaxed);
    Json(json!({
        "status": if online { "online" } else { "offline" },
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn stats(State(state): State<DashboardState>) -> Json<serde_json::Value> {
    let uptime = state.status.uptime();
    Json(json!({
        "servers": state.status.servers.load(Ordering::Relaxed),
        "users": state.status.users.load(Ordering::Relaxed),
        "active_rooms": state.registry.active_count(),
        "uptime": humantime::format_duration(Duration::from_secs(uptime.as_secs())).to_string(),
        "uptime_raw": { "total_seconds": uptime.as_secs() },
    }))
}

#[derive(Deserialize)]
struct LogsQuery {
    #[serde(default = "default_log_limit")]
    limit: usize,
}

fn default_log_limit() -> usize {
    20
}

async fn logs_endpoint(
    State(state): State<DashboardState>,
    Query(query): Query<LogsQuery>,
) -> Json<serde_json::Value> {
    let logs = state.logs.recent(query.limit);
    Json(json!({
        "total": state.logs.len(),
        "logs": logs,
    }))
}

async fn commands(State(_state): State<DashboardState>) -> Json<serde_json::Value> {
    Json(json!({
        "commands": [
            { "name": "/join", "description": "Entra al canal de voz y crea la sala de música" },
            { "name": "/play", "description": "Añade una canción o playlist a la cola" },
            { "name": "/queue", "description": "Muestra la cola actual" },
            { "name": "/skip", "description": "Salta la canción actual" },
            { "name": "/voteskip", "description": "Vota por saltar la canción" },
            { "name": "/filter", "description": "bass / nightcore / pitch" },
            { "name": "/loop", "description": "Repite la cola" },
            { "name": "/autoplay", "description": "Música automática al vaciarse la cola" },
            { "name": "/leave", "description": "Cierra la sala" },
        ]
    }))
}

async fn ws_logs(
    ws: WebSocketUpgrade,
    State(state): State<DashboardState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_logs(socket, state))
}

/// Envía el backlog inicial y después cada entrada nueva; responde a pings
/// del cliente y manda keepalives en los silencios.
async fn stream_logs(mut socket: WebSocket, state: DashboardState) {
    let initial = json!({
        "type": "initial",
        "logs": state.logs.recent(10),
    });
    if socket
        .send(Message::Text(initial.to_string().into()))
        .await
        .is_err()
    {
        return;
    }

    let mut rx = state.logs.subscribe();
    let mut keepalive = tokio::time::interval(Duration::from_secs(30));
    keepalive.tick().await; // el primero dispara inmediatamente

    loop {
        tokio::select! {
            entry = rx.recv() => {
                match entry {
                    Ok(entry) => {
                        let payload = json!({ "type": "new_log", "log": entry });
                        if socket
                            .send(Message::Text(payload.to_string().into()))
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("📊 Cliente de logs rezagado; {} entradas perdidas", skipped);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            message = socket.recv() => {
                match message {
                    Some(Ok(Message::Text(text))) if text.as_str() == "ping" => {
                        if socket.send(Message::Text("pong".into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("📊 Error de WebSocket: {}", e);
                        break;
                    }
                }
            }
            _ = keepalive.tick() => {
                let payload = json!({ "type": "keepalive" });
                if socket
                    .send(Message::Text(payload.to_string().into()))
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }
    }
}
