use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    dto::draw::{DrawResultSummary, DrawStatusResponse, HistoryQuery, TargetNumberResponse},
    error::AppError,
    services::draw_service,
    state::SharedState,
};

/// Read-only endpoints polled by the spin UI.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/public/status", get(draw_status))
        .route("/public/target", get(target_number))
        .route("/public/history", get(public_history))
}

/// Countdown to the next draw. Resolves a due draw before answering.
#[utoipa::path(
    get,
    path = "/public/status",
    tag = "public",
    responses((status = 200, description = "Countdown snapshot", body = DrawStatusResponse))
)]
pub async fn draw_status(State(state): State<SharedState>) -> Json<DrawStatusResponse> {
    Json(draw_service::status(&state).await)
}

/// Latest resolved number, `0` when none is available.
#[utoipa::path(
    get,
    path = "/public/target",
    tag = "public",
    responses((status = 200, description = "Latest resolved number", body = TargetNumberResponse))
)]
pub async fn target_number(State(state): State<SharedState>) -> Json<TargetNumberResponse> {
    Json(draw_service::latest_target(&state).await)
}

/// Recent draws, newest first.
#[utoipa::path(
    get,
    path = "/public/history",
    tag = "public",
    params(HistoryQuery),
    responses(
        (status = 200, description = "Recent draws, newest first", body = [DrawResultSummary]),
        (status = 503, description = "Storage unavailable")
    )
)]
pub async fn public_history(
    State(state): State<SharedState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<DrawResultSummary>>, AppError> {
    Ok(Json(draw_service::recent_history(&state, query.limit).await?))
}
