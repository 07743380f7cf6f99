use std::time::SystemTime;

use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{PlayerEntity, PlayerStatus, WalletEntity},
    dto::player::{CreatePlayerRequest, PlayerSummary, WalletUpdateResponse},
    error::ServiceError,
    services::sse_events,
    state::SharedState,
};

/// Register a player with the next serial number and an empty wallet.
///
/// The request is expected to be validated already.
pub async fn add_player(
    state: &SharedState,
    request: CreatePlayerRequest,
) -> Result<PlayerSummary, ServiceError> {
    let store = state.require_store().await?;
    let username = request.username.trim().to_string();

    if store
        .find_player_by_username(username.clone())
        .await?
        .is_some()
    {
        return Err(ServiceError::Conflict(format!(
            "username `{username}` already exists"
        )));
    }

    let serial_no = store
        .last_serial_no()
        .await?
        .unwrap_or(0)
        .checked_add(1)
        .ok_or_else(|| ServiceError::Conflict("serial numbers exhausted".into()))?;

    let now = SystemTime::now();
    let player = PlayerEntity {
        id: Uuid::new_v4(),
        serial_no,
        full_name: request.full_name.trim().to_string(),
        username,
        status: request.status.map(Into::into).unwrap_or_default(),
        created_at: now,
    };
    store
        .insert_player(player.clone(), WalletEntity::empty(player.id, now))
        .await?;

    info!(player_id = %player.id, serial_no, "player created");
    let summary = PlayerSummary::new(player, 0);
    sse_events::broadcast_player_created(state, summary.clone());
    Ok(summary)
}

/// All players with their balances, highest serial number first.
pub async fn list_players(state: &SharedState) -> Result<Vec<PlayerSummary>, ServiceError> {
    let store = state.require_store().await?;
    let players = store.list_players().await?;
    Ok(players.into_iter().map(PlayerSummary::from).collect())
}

/// One player with its balance, `0` when the wallet is missing.
pub async fn get_player(state: &SharedState, id: Uuid) -> Result<PlayerSummary, ServiceError> {
    let store = state.require_store().await?;
    let player = store
        .find_player(id)
        .await?
        .ok_or_else(|| player_not_found(id))?;
    let coins = store
        .find_wallet(id)
        .await?
        .map_or(0, |wallet| wallet.coins);
    Ok(PlayerSummary::new(player, coins))
}

/// Change a player's status and notify admins.
pub async fn update_player_status(
    state: &SharedState,
    id: Uuid,
    status: PlayerStatus,
) -> Result<PlayerSummary, ServiceError> {
    let store = state.require_store().await?;
    let player = store
        .update_player_status(id, status)
        .await?
        .ok_or_else(|| player_not_found(id))?;
    let coins = store
        .find_wallet(id)
        .await?
        .map_or(0, |wallet| wallet.coins);

    info!(player_id = %id, ?status, "player status updated");
    let summary = PlayerSummary::new(player, coins);
    sse_events::broadcast_player_updated(state, summary.clone());
    Ok(summary)
}

/// Apply a signed coin delta; the balance is clamped at zero.
pub async fn update_coins(
    state: &SharedState,
    id: Uuid,
    delta: i64,
) -> Result<WalletUpdateResponse, ServiceError> {
    let store = state.require_store().await?;
    let player = store
        .find_player(id)
        .await?
        .ok_or_else(|| player_not_found(id))?;
    let wallet = store
        .adjust_coins(id, delta)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("wallet for player `{id}` not found")))?;

    info!(player_id = %id, delta, coins = wallet.coins, "wallet updated");
    let response = WalletUpdateResponse {
        player_id: id,
        full_name: player.full_name,
        username: player.username,
        coins: wallet.coins,
    };
    sse_events::broadcast_wallet_updated(state, response.clone());
    Ok(response)
}

fn player_not_found(id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("player `{id}` not found"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::draw_store::memory::MemoryStore,
        dto::player::PlayerStatusDto,
        state::AppState,
    };

    async fn setup() -> (SharedState, MemoryStore) {
        let state = AppState::new(AppConfig::default());
        let store = MemoryStore::new();
        state.install_store(Arc::new(store.clone())).await;
        (state, store)
    }

    fn request(full_name: &str, username: &str) -> CreatePlayerRequest {
        CreatePlayerRequest {
            full_name: full_name.into(),
            username: username.into(),
            status: None,
        }
    }

    #[tokio::test]
    async fn serial_numbers_increment_and_list_is_descending() {
        let (state, _) = setup().await;
        let first = add_player(&state, request("Ada", "ada")).await.unwrap();
        let second = add_player(&state, request("Bob", "bob")).await.unwrap();
        assert_eq!(first.serial_no, 1);
        assert_eq!(second.serial_no, 2);
        assert_eq!(first.coins, 0);
        assert_eq!(first.status, PlayerStatusDto::Active);

        let listed = list_players(&state).await.unwrap();
        let serials: Vec<u32> = listed.iter().map(|player| player.serial_no).collect();
        assert_eq!(serials, vec![2, 1]);
    }

    #[tokio::test]
    async fn duplicate_username_is_a_conflict() {
        let (state, _) = setup().await;
        add_player(&state, request("Ada", "ada")).await.unwrap();
        let err = add_player(&state, request("Other Ada", "ada"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
        assert_eq!(list_players(&state).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn coins_are_clamped_at_zero() {
        let (state, _) = setup().await;
        let mut admin = state.admin_sse().subscribe();
        let player = add_player(&state, request("Ada", "ada")).await.unwrap();

        let wallet = update_coins(&state, player.id, 25).await.unwrap();
        assert_eq!(wallet.coins, 25);
        assert_eq!(wallet.username, "ada");
        let wallet = update_coins(&state, player.id, -100).await.unwrap();
        assert_eq!(wallet.coins, 0);
        assert_eq!(get_player(&state, player.id).await.unwrap().coins, 0);

        let created = admin.recv().await.unwrap();
        assert_eq!(created.event.as_deref(), Some(sse_events::EVENT_PLAYER_CREATED));
        let updated = admin.recv().await.unwrap();
        assert_eq!(updated.event.as_deref(), Some(sse_events::EVENT_WALLET_UPDATED));
    }

    #[tokio::test]
    async fn unknown_player_is_not_found() {
        let (state, _) = setup().await;
        let id = Uuid::new_v4();
        assert!(matches!(
            get_player(&state, id).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            update_coins(&state, id, 5).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            update_player_status(&state, id, PlayerStatus::Inactive).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn status_update_keeps_balance() {
        let (state, _) = setup().await;
        let player = add_player(&state, request("Ada", "ada")).await.unwrap();
        update_coins(&state, player.id, 10).await.unwrap();

        let updated = update_player_status(&state, player.id, PlayerStatus::Inactive)
            .await
            .unwrap();
        assert_eq!(updated.status, PlayerStatusDto::Inactive);
        assert_eq!(updated.coins, 10);
    }

    #[tokio::test]
    async fn storage_failure_surfaces_as_unavailable() {
        let (state, store) = setup().await;
        store.set_fail_writes(true);
        let err = add_player(&state, request("Ada", "ada")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
    }

    #[tokio::test]
    async fn failed_wallet_write_allows_a_retry() {
        let (state, store) = setup().await;
        store.set_fail_wallet_writes(true);
        let err = add_player(&state, request("Ada", "ada")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unavailable(_)));
        assert!(list_players(&state).await.unwrap().is_empty());

        store.set_fail_wallet_writes(false);
        let player = add_player(&state, request("Ada", "ada")).await.unwrap();
        assert_eq!(player.serial_no, 1);
        assert_eq!(update_coins(&state, player.id, 5).await.unwrap().coins, 5);
    }
}
