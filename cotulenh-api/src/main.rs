//! Commander-chess REST API.
//!
//! Serves one in-memory game session over the engine's four surfaces:
//! serialized position, legal moves grouped by origin, status flags, and
//! air-defense zones — plus the command surface (move, undo/redo and the
//! deploy operations). Rule violations come back as 400s with a reason
//! string; they are expected outcomes, not server errors.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};

use cotulenh_core::{Game, Move, Role, RuleError, Square, ZoneSets};

// =============================================================================
// Session State
// =============================================================================

struct AppStateInner {
    game: Mutex<Game>,
}

type AppState = Arc<AppStateInner>;

// =============================================================================
// JSON Models
// =============================================================================

#[derive(Serialize)]
struct GameStateModel {
    fen: String,
    turn: char,
    in_check: bool,
    checkmate: bool,
    stalemate: bool,
    winner: Option<char>,
    deploy: Option<serde_json::Value>,
    can_undo: bool,
    can_redo: bool,
}

#[derive(Serialize)]
struct MovesModel {
    moves: BTreeMap<Square, Vec<Move>>,
}

#[derive(Deserialize)]
struct MoveRequest {
    from: Square,
    to: Square,
    /// Disambiguates deploy steps, where several roles may share an
    /// origin/destination pair.
    role: Option<Role>,
}

#[derive(Deserialize, Default)]
struct ResetRequest {
    fen: Option<String>,
}

#[derive(Deserialize)]
struct DeployStartRequest {
    origin: Square,
}

#[derive(Deserialize)]
struct RoleRequest {
    role: Role,
}

#[derive(Deserialize)]
struct RecombineRequest {
    role: Role,
    target: Square,
}

#[derive(Serialize)]
struct HealthModel {
    status: String,
}

#[derive(Serialize)]
struct ErrorModel {
    detail: String,
}

type ApiError = (StatusCode, Json<ErrorModel>);

fn bad_request(detail: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorModel {
            detail: detail.into(),
        }),
    )
}

fn rule_error(err: RuleError) -> ApiError {
    bad_request(err.to_string())
}

fn game_to_model(game: &Game) -> GameStateModel {
    GameStateModel {
        fen: game.fen(),
        turn: game.turn().to_code(),
        in_check: game.is_check(),
        checkmate: game.is_checkmate(),
        stalemate: game.is_stalemate(),
        winner: game.winner().map(|c| c.to_code()),
        deploy: game
            .deploy_snapshot()
            .and_then(|snap| serde_json::to_value(snap).ok()),
        can_undo: game.can_undo(),
        can_redo: game.can_redo(),
    }
}

// =============================================================================
// Handlers
// =============================================================================

async fn get_game(State(state): State<AppState>) -> Json<GameStateModel> {
    let game = state.game.lock().unwrap();
    Json(game_to_model(&game))
}

async fn get_moves(State(state): State<AppState>) -> Json<MovesModel> {
    let game = state.game.lock().unwrap();
    Json(MovesModel {
        moves: game.moves_by_origin(),
    })
}

async fn get_air_defense(State(state): State<AppState>) -> Json<ZoneSets> {
    let game = state.game.lock().unwrap();
    Json(game.air_defense())
}

async fn make_move(
    State(state): State<AppState>,
    Json(req): Json<MoveRequest>,
) -> Result<Json<GameStateModel>, ApiError> {
    let mut game = state.game.lock().unwrap();
    let mv = game
        .legal_moves()
        .into_iter()
        .find(|m| {
            m.from() == req.from
                && m.target() == req.to
                && match (&req.role, m) {
                    (Some(role), Move::DeployStep { piece, .. }) => piece.role == *role,
                    _ => true,
                }
        })
        .ok_or_else(|| bad_request("move is not legal in this position"))?;
    game.apply(&mv).map_err(rule_error)?;
    Ok(Json(game_to_model(&game)))
}

async fn reset_game(
    State(state): State<AppState>,
    body: Option<Json<ResetRequest>>,
) -> Result<Json<GameStateModel>, ApiError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let mut game = state.game.lock().unwrap();
    *game = match req.fen {
        Some(fen) => Game::from_fen(&fen).map_err(|e| bad_request(e.to_string()))?,
        None => Game::new(),
    };
    Ok(Json(game_to_model(&game)))
}

async fn undo(State(state): State<AppState>) -> Result<Json<GameStateModel>, ApiError> {
    let mut game = state.game.lock().unwrap();
    game.undo().map_err(rule_error)?;
    Ok(Json(game_to_model(&game)))
}

async fn redo(State(state): State<AppState>) -> Result<Json<GameStateModel>, ApiError> {
    let mut game = state.game.lock().unwrap();
    game.redo().map_err(rule_error)?;
    Ok(Json(game_to_model(&game)))
}

async fn deploy_start(
    State(state): State<AppState>,
    Json(req): Json<DeployStartRequest>,
) -> Result<Json<GameStateModel>, ApiError> {
    let mut game = state.game.lock().unwrap();
    game.deploy_start(req.origin).map_err(rule_error)?;
    Ok(Json(game_to_model(&game)))
}

async fn deploy_stay(
    State(state): State<AppState>,
    Json(req): Json<RoleRequest>,
) -> Result<Json<GameStateModel>, ApiError> {
    let mut game = state.game.lock().unwrap();
    game.deploy_stay(req.role).map_err(rule_error)?;
    Ok(Json(game_to_model(&game)))
}

async fn deploy_commit(State(state): State<AppState>) -> Result<Json<GameStateModel>, ApiError> {
    let mut game = state.game.lock().unwrap();
    game.deploy_commit().map_err(rule_error)?;
    Ok(Json(game_to_model(&game)))
}

async fn deploy_cancel(State(state): State<AppState>) -> Result<Json<GameStateModel>, ApiError> {
    let mut game = state.game.lock().unwrap();
    game.deploy_cancel().map_err(rule_error)?;
    Ok(Json(game_to_model(&game)))
}

async fn recombine(
    State(state): State<AppState>,
    Json(req): Json<RecombineRequest>,
) -> Result<Json<GameStateModel>, ApiError> {
    let mut game = state.game.lock().unwrap();
    game.recombine(req.role, req.target).map_err(rule_error)?;
    Ok(Json(game_to_model(&game)))
}

async fn health() -> Json<HealthModel> {
    Json(HealthModel {
        status: "ok".to_string(),
    })
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let state: AppState = Arc::new(AppStateInner {
        game: Mutex::new(Game::new()),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/game", get(get_game))
        .route("/moves", get(get_moves))
        .route("/air-defense", get(get_air_defense))
        .route("/move", post(make_move))
        .route("/reset", post(reset_game))
        .route("/undo", post(undo))
        .route("/redo", post(redo))
        .route("/deploy/start", post(deploy_start))
        .route("/deploy/stay", post(deploy_stay))
        .route("/deploy/commit", post(deploy_commit))
        .route("/deploy/cancel", post(deploy_cancel))
        .route("/deploy/recombine", post(recombine))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:8000")
        .await
        .expect("bind api port");
    tracing::info!("listening on {}", listener.local_addr().unwrap());
    axum::serve(listener, app).await.expect("serve api");
}
