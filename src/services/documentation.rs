use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the spin draw backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::sse::public_stream,
        crate::routes::sse::admin_stream,
        crate::routes::public::draw_status,
        crate::routes::public::target_number,
        crate::routes::public::public_history,
        crate::routes::admin::set_target,
        crate::routes::admin::admin_history,
        crate::routes::admin::get_reward_settings,
        crate::routes::admin::update_reward_settings,
        crate::routes::admin::list_players,
        crate::routes::admin::create_player,
        crate::routes::admin::get_player,
        crate::routes::admin::update_player_status,
        crate::routes::admin::update_coins,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::draw::DrawStatusResponse,
            crate::dto::draw::SetTargetRequest,
            crate::dto::draw::TargetResponse,
            crate::dto::draw::TargetNumberResponse,
            crate::dto::draw::DrawResultSummary,
            crate::dto::draw::ResultSource,
            crate::dto::draw::RewardSettingsPayload,
            crate::dto::player::CreatePlayerRequest,
            crate::dto::player::UpdatePlayerStatusRequest,
            crate::dto::player::AdjustCoinsRequest,
            crate::dto::player::PlayerSummary,
            crate::dto::player::PlayerStatusDto,
            crate::dto::player::WalletUpdateResponse,
            crate::dto::sse::AdminHandshake,
            crate::dto::sse::DrawResolvedEvent,
            crate::dto::sse::TargetUpdatedEvent,
            crate::dto::sse::SystemStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "public", description = "Countdown, latest number and history for the spin UI"),
        (name = "admin", description = "Draw target, reward settings and player administration"),
    )
)]
pub struct ApiDoc;
