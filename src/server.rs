// HTTP and WebSocket surface
//
//   WS   /ws/sim        → streaming simulation (see `protocol`)
//   POST /api/chat      → retrieval-augmented answer
//   POST /api/simulate  → one-shot scenario, frames and elements
//   GET  /api/health    → liveness and index readiness
//   GET  /api/examples  → sample prompts for the UI

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;

use crate::coordinator::run_connection;
use crate::protocol::ServerMessage;
use crate::state_manager::{AppState, MAX_REPORT_FRAMES};

const INBOUND_CAPACITY: usize = 32;
const OUTBOUND_CAPACITY: usize = 64;
const DEFAULT_REPORT_FRAMES: usize = 120;

pub const EXAMPLE_PROMPTS: &[&str] = &[
    "Simulate the real solar system",
    "Two neutron stars spiraling together",
    "TRAPPIST-1 system with 7 planets",
    "Hot Jupiter with a super-Earth",
    "Alpha Centauri triple star system",
    "Black hole with 5 orbiting stars",
    "Earth-Moon system",
    "Rogue star flying through a planetary system",
    "Four equal mass stars in a chaotic dance",
    "Protoplanetary disk with 15 planetesimals",
    "Pluto-Charon binary system",
    "Saturn with its rings and moons",
    "A comet on Halley-like orbit",
    "Jupiter's Galilean moons",
    "Pulsar with companion star",
];

// ── Entry point ───────────────────────────────────────────────────────────────

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws/sim", get(ws_sim))
        .route("/api/chat", post(chat))
        .route("/api/simulate", post(simulate))
        .route("/api/health", get(health))
        .route("/api/examples", get(examples))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(listener: TcpListener, state: AppState) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "Astro Thesaurus listening");
    }
    axum::serve(listener, router(state)).await
}

// ── WebSocket ─────────────────────────────────────────────────────────────────

async fn ws_sim(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Bridge the socket to the coordinator's channels
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (inbound_tx, inbound_rx) = mpsc::channel::<String>(INBOUND_CAPACITY);
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerMessage>(OUTBOUND_CAPACITY);

    tracing::info!("Simulation client connected");

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sink.send(Message::Text(message.to_json())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let reader = tokio::spawn(async move {
        while let Some(Ok(message)) = stream.next().await {
            match message {
                Message::Text(text) => {
                    if inbound_tx.send(text).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    run_connection(
        state.pipeline.clone(),
        state.config.default_fps,
        inbound_rx,
        outbound_tx,
    )
    .await;

    reader.abort();
    let _ = writer.await;
    tracing::info!("Simulation client disconnected");
}

// ── Handlers ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
}

async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> impl IntoResponse {
    if req.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "message must not be empty"})),
        )
            .into_response();
    }
    Json(state.chat.answer(&req.message).await).into_response()
}

#[derive(Debug, Deserialize)]
struct SimulateRequest {
    prompt: String,
    #[serde(default)]
    frames: Option<usize>,
}

async fn simulate(State(state): State<AppState>, Json(req): Json<SimulateRequest>) -> impl IntoResponse {
    if req.prompt.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "prompt must not be empty"})),
        )
            .into_response();
    }
    let frames = req.frames.unwrap_or(DEFAULT_REPORT_FRAMES).min(MAX_REPORT_FRAMES);
    Json(state.simulate_once(&req.prompt, frames).await).into_response()
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub integrator_engine: String,
    pub model: String,
    pub rag_docs: usize,
    pub ready: bool,
    pub started_at: String,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "online".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        integrator_engine: "adaptive-rk4 / velocity-verlet".to_string(),
        model: state.oracle.model().to_string(),
        rag_docs: state.retriever.document_count(),
        ready: state.rag_ready(),
        started_at: state.started_at.to_rfc3339(),
    })
}

async fn examples() -> impl IntoResponse {
    Json(serde_json::json!({ "examples": EXAMPLE_PROMPTS }))
}
