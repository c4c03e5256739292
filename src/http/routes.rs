//! HTTP route definitions

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    middleware,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info};

use crate::app::AppState;
use crate::game::{CommandError, MatchCommand};
use crate::http::middleware::{
    require_admin, verify_chat_signature, WebhookError, CHAT_SIGNATURE_HEADER,
};
use crate::lobby::ChatEvent;
use crate::store::LeaderboardEntry;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;
use crate::ws::protocol::{MatchPhase, MatchSnapshot};

/// Largest page the leaderboard endpoint returns
const MAX_LEADERBOARD_LIMIT: usize = 100;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true);

    // Overlay and chat bridge routes
    let public_routes = Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .route("/match", get(match_handler))
        .route("/leaderboard", get(leaderboard_handler))
        .route("/chat/events", post(chat_event_handler));

    // Control panel routes
    let admin_routes = Router::new()
        .route("/admin/lobby", post(open_lobby_handler))
        .route("/admin/start", post(start_battle_handler))
        .route("/admin/eliminate", post(eliminate_handler))
        .route("/admin/reset", post(reset_handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    phase: Option<MatchPhase>,
    lobby_size: usize,
    alive_agents: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.match_handle.latest_snapshot();

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        phase: snapshot.as_ref().map(|s| s.phase),
        lobby_size: snapshot.as_ref().map_or(0, |s| s.lobby.len()),
        alive_agents: snapshot
            .as_ref()
            .map_or(0, |s| s.agents.iter().filter(|a| a.alive).count()),
    })
}

// ============================================================================
// Match and leaderboard
// ============================================================================

async fn match_handler(State(state): State<AppState>) -> Result<Json<MatchSnapshot>, AppError> {
    state
        .match_handle
        .latest_snapshot()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("No frame rendered yet".to_string()))
}

#[derive(Deserialize)]
struct LeaderboardQuery {
    limit: Option<usize>,
}

async fn leaderboard_handler(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Json<Vec<LeaderboardEntry>> {
    let limit = query.limit.unwrap_or(10).min(MAX_LEADERBOARD_LIMIT);
    Json(state.leaderboard.top(limit))
}

// ============================================================================
// Chat ingestion
// ============================================================================

#[derive(Serialize)]
struct ChatAccepted {
    accepted: bool,
}

/// Signed chat messages from the livestream bridge
async fn chat_event_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let signature = headers
        .get(CHAT_SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;
    verify_chat_signature(&body, signature, &state.config.chat_webhook_secret)?;

    let event: ChatEvent =
        serde_json::from_slice(&body).map_err(|_| WebhookError::InvalidPayload)?;

    if !state.chat_limiter.check(&event.username) {
        debug!(username = %event.username, "Chat message rate limited");
        return Ok((StatusCode::ACCEPTED, Json(ChatAccepted { accepted: false })));
    }

    state.match_handle.send(MatchCommand::Chat(event)).await?;
    Ok((StatusCode::ACCEPTED, Json(ChatAccepted { accepted: true })))
}

// ============================================================================
// Admin controls
// ============================================================================

#[derive(Serialize)]
struct CommandResponse {
    success: bool,
}

async fn run_admin_command(
    state: &AppState,
    command: MatchCommand,
) -> Result<Json<CommandResponse>, AppError> {
    info!(command = ?command, "Admin command");
    state.match_handle.request(command).await?;
    Ok(Json(CommandResponse { success: true }))
}

async fn open_lobby_handler(
    State(state): State<AppState>,
) -> Result<Json<CommandResponse>, AppError> {
    run_admin_command(&state, MatchCommand::OpenLobby).await
}

async fn start_battle_handler(
    State(state): State<AppState>,
) -> Result<Json<CommandResponse>, AppError> {
    run_admin_command(&state, MatchCommand::StartBattle).await
}

#[derive(Deserialize)]
struct EliminateRequest {
    username: String,
}

async fn eliminate_handler(
    State(state): State<AppState>,
    Json(req): Json<EliminateRequest>,
) -> Result<Json<CommandResponse>, AppError> {
    run_admin_command(
        &state,
        MatchCommand::Eliminate {
            username: req.username,
        },
    )
    .await
}

async fn reset_handler(State(state): State<AppState>) -> Result<Json<CommandResponse>, AppError> {
    run_admin_command(&state, MatchCommand::Reset).await
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Match loop unavailable")]
    Unavailable,
}

impl From<CommandError> for AppError {
    fn from(e: CommandError) -> Self {
        match e {
            CommandError::Stopped => AppError::Unavailable,
            CommandError::Rejected(e) => AppError::Conflict(e.to_string()),
        }
    }
}

impl From<WebhookError> for AppError {
    fn from(e: WebhookError) -> Self {
        match e {
            WebhookError::InvalidPayload => AppError::BadRequest(e.to_string()),
            WebhookError::MissingSignature | WebhookError::InvalidSignature => {
                AppError::Unauthorized(e.to_string())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Unavailable => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    use crate::config::{Config, GameConfig};
    use crate::http::middleware::{admin_claims, issue_token, sign_chat_body, ADMIN_ROLE};

    const ADMIN_SECRET: &str = "admin-secret";
    const CHAT_SECRET: &str = "chat-secret";

    fn test_config() -> Config {
        Config {
            server_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "debug".into(),
            admin_jwt_secret: ADMIN_SECRET.into(),
            chat_webhook_secret: CHAT_SECRET.into(),
            client_origin: "http://localhost:5173".into(),
            leaderboard_url: None,
            leaderboard_key: None,
            avatar_url_template: None,
            game: GameConfig {
                seed: Some(1),
                ..GameConfig::default()
            },
        }
    }

    /// Router backed by a running match loop
    fn app() -> Router {
        let (state, game) = AppState::new(test_config());
        tokio::spawn(game.run());
        build_router(state)
    }

    fn admin_post(uri: &str, role: &str, body: &str) -> Request<Body> {
        let token = issue_token(&admin_claims(role), ADMIN_SECRET);
        Request::post(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn chat_post(body: &str, signature: Option<String>) -> Request<Body> {
        let mut req = Request::post("/chat/events").header(header::CONTENT_TYPE, "application/json");
        if let Some(sig) = signature {
            req = req.header(CHAT_SIGNATURE_HEADER, sig);
        }
        req.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let resp = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["status"], "ok");
    }

    #[tokio::test]
    async fn admin_routes_need_an_admin_token() {
        let app = app();

        let anonymous = Request::post("/admin/lobby").body(Body::empty()).unwrap();
        let resp = app.clone().oneshot(anonymous).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let resp = app
            .clone()
            .oneshot(admin_post("/admin/lobby", "viewer", ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);

        let resp = app
            .oneshot(admin_post("/admin/lobby", ADMIN_ROLE, ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unsigned_chat_is_rejected() {
        let app = app();
        let body = r#"{"username":"sami","message":"join"}"#;

        let resp = app.clone().oneshot(chat_post(body, None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let forged = sign_chat_body(body.as_bytes(), "wrong");
        let resp = app.oneshot(chat_post(body, Some(forged))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn signed_garbage_is_a_json_bad_request() {
        let body = "not json";
        let signature = sign_chat_body(body.as_bytes(), CHAT_SECRET);

        let resp = app().oneshot(chat_post(body, Some(signature))).await.unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["error"], "Invalid payload");
    }

    #[tokio::test]
    async fn lobby_flow_over_http() {
        let app = app();

        let resp = app
            .clone()
            .oneshot(admin_post("/admin/lobby", ADMIN_ROLE, ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = r#"{"username":"sami","message":"join spear"}"#;
        let signature = sign_chat_body(body.as_bytes(), CHAT_SECRET);
        let resp = app
            .clone()
            .oneshot(chat_post(body, Some(signature)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
        assert_eq!(json_body(resp).await["accepted"], true);

        // One participant is not enough for a battle
        let resp = app
            .clone()
            .oneshot(admin_post("/admin/start", ADMIN_ROLE, ""))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let resp = app
            .oneshot(admin_post(
                "/admin/eliminate",
                ADMIN_ROLE,
                r#"{"username":"sami"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn leaderboard_starts_empty() {
        let resp = app()
            .oneshot(
                Request::get("/leaderboard?limit=5")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await, serde_json::json!([]));
    }
}
