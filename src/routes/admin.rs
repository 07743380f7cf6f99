use axum::{
    Json, Router,
    body::Body,
    extract::{Path, Query, State},
    http::{Request, StatusCode},
    middleware::{self, Next},
    response::Response,
    routing::{get, post, put},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        draw::{DrawResultSummary, HistoryQuery, RewardSettingsPayload, SetTargetRequest, TargetResponse},
        player::{
            AdjustCoinsRequest, CreatePlayerRequest, PlayerSummary, UpdatePlayerStatusRequest,
            WalletUpdateResponse,
        },
    },
    error::AppError,
    services::{draw_service, player_service},
    state::SharedState,
};

const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Admin-only endpoints steering the draw and managing players.
pub fn router(state: SharedState) -> Router<SharedState> {
    Router::new()
        .route("/admin/draw/target", post(set_target))
        .route("/admin/draw/history", get(admin_history))
        .route(
            "/admin/settings/reward",
            get(get_reward_settings).put(update_reward_settings),
        )
        .route("/admin/players", get(list_players).post(create_player))
        .route("/admin/players/{id}", get(get_player))
        .route("/admin/players/{id}/status", put(update_player_status))
        .route("/admin/players/{id}/coins", post(update_coins))
        .route_layer(middleware::from_fn_with_state(state, require_admin_token))
}

/// Pin the value of the next draw, or restore a random draw with `-1`.
#[utoipa::path(
    post,
    path = "/admin/draw/target",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = SetTargetRequest,
    responses(
        (status = 200, description = "Pending target stored", body = TargetResponse),
        (status = 400, description = "Target outside -1..=9")
    )
)]
pub async fn set_target(
    State(state): State<SharedState>,
    Json(payload): Json<SetTargetRequest>,
) -> Result<Json<TargetResponse>, AppError> {
    Ok(Json(
        draw_service::set_pending_target(&state, payload.target).await?,
    ))
}

/// Recent draws, newest first.
#[utoipa::path(
    get,
    path = "/admin/draw/history",
    tag = "admin",
    params(
        ("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
        HistoryQuery
    ),
    responses((status = 200, description = "Recent draws, newest first", body = [DrawResultSummary]))
)]
pub async fn admin_history(
    State(state): State<SharedState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<DrawResultSummary>>, AppError> {
    Ok(Json(draw_service::recent_history(&state, query.limit).await?))
}

/// Current reward settings.
#[utoipa::path(
    get,
    path = "/admin/settings/reward",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Current reward settings", body = RewardSettingsPayload))
)]
pub async fn get_reward_settings(
    State(state): State<SharedState>,
) -> Result<Json<RewardSettingsPayload>, AppError> {
    Ok(Json(draw_service::reward_settings(&state).await?))
}

/// Validate and store new reward settings.
#[utoipa::path(
    put,
    path = "/admin/settings/reward",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = RewardSettingsPayload,
    responses(
        (status = 200, description = "Reward settings stored", body = RewardSettingsPayload),
        (status = 400, description = "Invalid settings")
    )
)]
pub async fn update_reward_settings(
    State(state): State<SharedState>,
    Json(payload): Json<RewardSettingsPayload>,
) -> Result<Json<RewardSettingsPayload>, AppError> {
    payload.validate()?;
    Ok(Json(
        draw_service::update_reward_settings(&state, payload).await?,
    ))
}

/// All players with their balances.
#[utoipa::path(
    get,
    path = "/admin/players",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    responses((status = 200, description = "Players, highest serial number first", body = [PlayerSummary]))
)]
pub async fn list_players(
    State(state): State<SharedState>,
) -> Result<Json<Vec<PlayerSummary>>, AppError> {
    Ok(Json(player_service::list_players(&state).await?))
}

/// Register a player with an empty wallet.
#[utoipa::path(
    post,
    path = "/admin/players",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream")),
    request_body = CreatePlayerRequest,
    responses(
        (status = 201, description = "Player created", body = PlayerSummary),
        (status = 409, description = "Username already taken")
    )
)]
pub async fn create_player(
    State(state): State<SharedState>,
    Json(payload): Json<CreatePlayerRequest>,
) -> Result<(StatusCode, Json<PlayerSummary>), AppError> {
    payload.validate()?;
    let player = player_service::add_player(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(player)))
}

/// One player with its balance.
#[utoipa::path(
    get,
    path = "/admin/players/{id}",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the player")),
    responses(
        (status = 200, description = "Player", body = PlayerSummary),
        (status = 404, description = "Unknown player")
    )
)]
pub async fn get_player(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<PlayerSummary>, AppError> {
    Ok(Json(player_service::get_player(&state, id).await?))
}

/// Activate or deactivate a player.
#[utoipa::path(
    put,
    path = "/admin/players/{id}/status",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the player")),
    request_body = UpdatePlayerStatusRequest,
    responses(
        (status = 200, description = "Player updated", body = PlayerSummary),
        (status = 404, description = "Unknown player")
    )
)]
pub async fn update_player_status(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePlayerStatusRequest>,
) -> Result<Json<PlayerSummary>, AppError> {
    Ok(Json(
        player_service::update_player_status(&state, id, payload.status.into()).await?,
    ))
}

/// Add or remove coins; the balance never drops below zero.
#[utoipa::path(
    post,
    path = "/admin/players/{id}/coins",
    tag = "admin",
    params(("X-Admin-Token" = String, Header, description = "Admin token issued by the /sse/admin stream"),
    ("id" = String, Path, description = "Identifier of the player")),
    request_body = AdjustCoinsRequest,
    responses(
        (status = 200, description = "Wallet updated", body = WalletUpdateResponse),
        (status = 404, description = "Unknown player or wallet")
    )
)]
pub async fn update_coins(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AdjustCoinsRequest>,
) -> Result<Json<WalletUpdateResponse>, AppError> {
    Ok(Json(
        player_service::update_coins(&state, id, payload.delta).await?,
    ))
}

async fn require_admin_token(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_owned())
        .ok_or_else(|| {
            AppError::Unauthorized("missing admin token header `X-Admin-Token`".into())
        })?;

    if state.admin_token_matches(&provided).await {
        Ok(next.run(req).await)
    } else {
        Err(AppError::Unauthorized("invalid admin token".into()))
    }
}
