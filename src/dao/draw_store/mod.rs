pub mod memory;
/// MongoDB backend.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{
    DrawResultEntity, PlayerEntity, PlayerStatus, PlayerWithCoinsEntity, RewardSettingsEntity,
    WalletEntity,
};
use crate::dao::storage::StorageResult;
use crate::state::draw::PendingTarget;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Persistence of the draw history and the singleton draw settings.
pub trait DrawStore: Send + Sync {
    /// Current admin override, [`PendingTarget::Random`] when none was ever written.
    fn read_pending_target(&self) -> BoxFuture<'static, StorageResult<PendingTarget>>;
    /// Overwrite the admin override.
    fn write_pending_target(&self, target: PendingTarget) -> BoxFuture<'static, StorageResult<()>>;
    /// Clear the pending target back to random if it still equals `expected`.
    ///
    /// Returns `false` when another value was written in the meantime and was kept.
    fn reset_pending_target(&self, expected: PendingTarget)
    -> BoxFuture<'static, StorageResult<bool>>;
    /// Append one resolved draw to the history.
    fn append_result(&self, result: DrawResultEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Newest valid results first, at most `limit` of them.
    fn query_history(&self, limit: usize)
    -> BoxFuture<'static, StorageResult<Vec<DrawResultEntity>>>;
    /// Most recent valid result, if any.
    fn latest_result(&self) -> BoxFuture<'static, StorageResult<Option<DrawResultEntity>>>;
    /// Stored reward settings, defaults when none were written.
    fn read_reward_settings(&self) -> BoxFuture<'static, StorageResult<RewardSettingsEntity>>;
    /// Replace the reward settings.
    fn write_reward_settings(
        &self,
        settings: RewardSettingsEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Cheap round trip proving the backend is reachable.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the underlying connection.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Persistence of player accounts and their wallets.
pub trait PlayerStore: Send + Sync {
    /// Insert a player and its wallet; fails with a conflict on duplicate username.
    fn insert_player(
        &self,
        player: PlayerEntity,
        wallet: WalletEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Player by identifier.
    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    /// Player by exact username.
    fn find_player_by_username(
        &self,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    /// Highest serial number handed out so far.
    fn last_serial_no(&self) -> BoxFuture<'static, StorageResult<Option<u32>>>;
    /// Players joined with their coins, highest serial number first.
    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerWithCoinsEntity>>>;
    /// Set the status and return the updated player, `None` when unknown.
    fn update_player_status(
        &self,
        id: Uuid,
        status: PlayerStatus,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>>;
    /// Wallet of `player_id`, if any.
    fn find_wallet(&self, player_id: Uuid)
    -> BoxFuture<'static, StorageResult<Option<WalletEntity>>>;
    /// Add a signed delta to the wallet, clamping the balance at zero.
    fn adjust_coins(
        &self,
        player_id: Uuid,
        delta: i64,
    ) -> BoxFuture<'static, StorageResult<Option<WalletEntity>>>;
}

/// Complete storage backend installed into the application state.
pub trait SpinStore: DrawStore + PlayerStore {}

impl<T: DrawStore + PlayerStore> SpinStore for T {}
