use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::Config;
use crate::domain::{Position, StatusFilter};
use crate::fpl::{ingest_bootstrap, ingest_gw_stats, BootstrapIngest, FplClient, GwStatsIngest};
use crate::predict::{run_model, ModelRegistry, ModelRun, MAX_WINDOW};
use crate::squad::{build_squad, SquadFailure, SquadOutcome, SquadRequest, SquadRules, ViewMode};
use crate::store::{
    GameweekRecord, PlayerQuery, PlayerRecord, PredictionRecord, SquadStore, TeamRecord,
};

#[derive(Clone)]
struct ApiState {
    config: Config,
    registry: ModelRegistry,
    rules: SquadRules,
    db_path: PathBuf,
}

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    ok: bool,
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            ok: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Clone, Default, Deserialize)]
struct SquadQuery {
    target_gw: Option<u32>,
    model_name: Option<String>,
    status: Option<String>,
    max_cost: Option<f64>,
    min_predicted_points: Option<f64>,
    budget_m: Option<f64>,
    max_per_team: Option<usize>,
    view: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct PlayersQuery {
    position: Option<String>,
    team_id: Option<i64>,
    search: Option<String>,
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
struct PredictionsQuery {
    target_gw: u32,
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct BaselineRunQuery {
    target_gw: Option<u32>,
    window: Option<usize>,
    model_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GwStatsQuery {
    gw: u32,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct PageMeta {
    total: u64,
    limit: usize,
    offset: usize,
}

#[derive(Debug, Serialize)]
struct PlayersResponse {
    meta: PageMeta,
    players: Vec<PlayerRecord>,
}

#[derive(Debug, Serialize)]
struct TeamsResponse {
    teams: Vec<TeamRecord>,
}

#[derive(Debug, Serialize)]
struct GameweeksResponse {
    current: Option<GameweekRecord>,
    next: Option<GameweekRecord>,
}

#[derive(Debug, Serialize)]
struct PredictionsResponse {
    meta: PageMeta,
    rows: Vec<PredictionRecord>,
}

pub async fn run_server(config: Config, bind: SocketAddr) -> Result<()> {
    let rules = config.squad_rules()?;
    let state = ApiState {
        db_path: config.resolved_db_path(),
        registry: ModelRegistry::with_defaults(),
        rules,
        config,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/v1/squad", get(squad))
        .route("/v1/players", get(players))
        .route("/v1/teams", get(teams))
        .route("/v1/gameweeks/current", get(gameweeks_current))
        .route("/v1/predictions", get(predictions))
        .route("/v1/predictions/baseline/run", post(baseline_run))
        .route("/v1/ingest/bootstrap", post(bootstrap))
        .route("/v1/ingest/gw-stats", post(gw_stats))
        .route("/v1/config", get(show_config))
        .layer(cors)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("REST API listening on http://{bind}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> Json<ApiResponse<HealthResponse>> {
    ok(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn show_config(State(state): State<ApiState>) -> Json<ApiResponse<Config>> {
    ok(state.config)
}

async fn squad(
    State(state): State<ApiState>,
    Query(query): Query<SquadQuery>,
) -> ApiResult<SquadOutcome> {
    let model_name = query
        .model_name
        .clone()
        .unwrap_or_else(|| state.config.model.name.clone());
    let status = parse_or_default(query.status.as_deref(), StatusFilter::Available)?;
    let view = parse_or_default(query.view.as_deref(), ViewMode::Compact)?;

    let store = open_store(&state)?;
    let Some(target_gw) = store
        .resolve_target_gw(query.target_gw)
        .map_err(ApiError::internal)?
    else {
        return Ok(ok(SquadOutcome::Failed(Box::new(
            SquadFailure::no_next_gameweek(model_name),
        ))));
    };

    let request = SquadRequest {
        target_gw,
        model_name,
        status,
        max_cost: query.max_cost,
        min_predicted_points: query.min_predicted_points,
        budget_m: query.budget_m.unwrap_or(state.config.squad.budget_m),
        max_per_team: query.max_per_team.unwrap_or(state.config.squad.max_per_team),
        view,
    };
    request
        .validate()
        .map_err(|error| ApiError::bad_request(error.to_string()))?;

    let candidates = store
        .fetch_candidates(request.target_gw, &request.model_name)
        .map_err(ApiError::internal)?;
    let outcome = build_squad(candidates, &request, &state.rules).into();
    Ok(ok(outcome))
}

async fn players(
    State(state): State<ApiState>,
    Query(query): Query<PlayersQuery>,
) -> ApiResult<PlayersResponse> {
    let position = query
        .position
        .as_deref()
        .map(Position::from_str)
        .transpose()
        .map_err(|error| ApiError::bad_request(error.to_string()))?;
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let offset = query.offset.unwrap_or(0);

    let store = open_store(&state)?;
    let (total, players) = store
        .list_players(
            &PlayerQuery {
                position,
                team_id: query.team_id,
                search: query.search.clone(),
            },
            limit,
            offset,
        )
        .map_err(ApiError::internal)?;

    Ok(ok(PlayersResponse {
        meta: PageMeta {
            total,
            limit,
            offset,
        },
        players,
    }))
}

async fn teams(State(state): State<ApiState>) -> ApiResult<TeamsResponse> {
    let store = open_store(&state)?;
    let teams = store.list_teams().map_err(ApiError::internal)?;
    Ok(ok(TeamsResponse { teams }))
}

async fn gameweeks_current(State(state): State<ApiState>) -> ApiResult<GameweeksResponse> {
    let store = open_store(&state)?;
    let (current, next) = store
        .current_and_next_gameweeks()
        .map_err(ApiError::internal)?;
    Ok(ok(GameweeksResponse { current, next }))
}

async fn predictions(
    State(state): State<ApiState>,
    Query(query): Query<PredictionsQuery>,
) -> ApiResult<PredictionsResponse> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let offset = query.offset.unwrap_or(0);
    let store = open_store(&state)?;
    let (total, rows) = store
        .list_predictions(query.target_gw, limit, offset)
        .map_err(ApiError::internal)?;
    Ok(ok(PredictionsResponse {
        meta: PageMeta {
            total,
            limit,
            offset,
        },
        rows,
    }))
}

async fn baseline_run(
    State(state): State<ApiState>,
    Query(query): Query<BaselineRunQuery>,
) -> ApiResult<ModelRun> {
    let window = query.window.unwrap_or(state.config.model.window);
    if window == 0 || window > MAX_WINDOW {
        return Err(ApiError::bad_request(format!(
            "window must be between 1 and {MAX_WINDOW}, got {window}"
        )));
    }
    let model_name = query
        .model_name
        .unwrap_or_else(|| state.config.model.name.clone());
    let Some(model) = state.registry.by_name(&model_name) else {
        return Err(ApiError::bad_request(format!(
            "unknown model: {model_name} (known: {})",
            state.registry.names().join(", ")
        )));
    };

    let store = open_store(&state)?;
    let Some(target_gw) = store
        .resolve_target_gw(query.target_gw)
        .map_err(ApiError::internal)?
    else {
        return Err(ApiError::bad_request(
            "no next gameweek is marked; pass target_gw or ingest gameweeks first",
        ));
    };

    let run = run_model(&store, model.as_ref(), target_gw, window)
        .map_err(ApiError::internal)?;
    Ok(ok(run))
}

async fn bootstrap(State(state): State<ApiState>) -> ApiResult<BootstrapIngest> {
    let client = FplClient::new(state.config.fpl.base_url.clone(), state.config.fpl.timeout_secs)
        .map_err(ApiError::internal)?;
    let data = client.fetch_bootstrap().await.map_err(ApiError::internal)?;
    let store = open_store(&state)?;
    let summary = ingest_bootstrap(&store, &data).map_err(ApiError::internal)?;
    Ok(ok(summary))
}

async fn gw_stats(
    State(state): State<ApiState>,
    Query(query): Query<GwStatsQuery>,
) -> ApiResult<GwStatsIngest> {
    let client = FplClient::new(state.config.fpl.base_url.clone(), state.config.fpl.timeout_secs)
        .map_err(ApiError::internal)?;
    let data = client
        .fetch_event_live(query.gw)
        .await
        .map_err(ApiError::internal)?;
    let store = open_store(&state)?;
    let summary = ingest_gw_stats(&store, query.gw, &data).map_err(ApiError::internal)?;
    Ok(ok(summary))
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { ok: true, data })
}

fn open_store(state: &ApiState) -> std::result::Result<SquadStore, ApiError> {
    SquadStore::open(&state.db_path).map_err(ApiError::internal)
}

fn parse_or_default<T>(raw: Option<&str>, default: T) -> std::result::Result<T, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .parse::<T>()
            .map_err(|error| ApiError::bad_request(error.to_string())),
    }
}
