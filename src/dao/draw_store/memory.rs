//! Process-local storage backend, used when no database is configured and as the test double.

use std::{
    cmp::Reverse,
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, Ordering},
    },
    time::{Duration, SystemTime},
};

use futures::future::BoxFuture;
use thiserror::Error;
use tokio::{sync::RwLock, time::sleep};
use uuid::Uuid;

use super::{DrawStore, PlayerStore};
use crate::{
    dao::{
        models::{
            DrawResultEntity, PlayerEntity, PlayerStatus, PlayerWithCoinsEntity,
            RewardSettingsEntity, WalletEntity, apply_coin_delta,
        },
        storage::{StorageError, StorageResult},
    },
    state::draw::PendingTarget,
};

/// Failure injected through one of the `MemoryStore` failure switches.
#[derive(Debug, Error)]
#[error("simulated {operation} failure")]
pub struct MemoryFailure {
    operation: &'static str,
}

/// In-memory [`SpinStore`](super::SpinStore) with switches for injecting storage failures.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    data: RwLock<MemoryData>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    fail_resets: AtomicU32,
    fail_wallet_writes: AtomicBool,
    append_delay: RwLock<Option<Duration>>,
}

#[derive(Default)]
struct MemoryData {
    pending_target: PendingTarget,
    reward_settings: RewardSettingsEntity,
    results: Vec<DrawResultEntity>,
    players: Vec<PlayerEntity>,
    wallets: HashMap<Uuid, WalletEntity>,
}

impl MemoryStore {
    /// Empty store with a random pending target and default reward settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every read operation fail until reset.
    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every write operation fail until reset.
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make the next `count` pending-target resets fail; other writes are unaffected.
    pub fn fail_next_resets(&self, count: u32) {
        self.inner.fail_resets.store(count, Ordering::SeqCst);
    }

    /// Make the wallet half of `insert_player` fail until reset.
    pub fn set_fail_wallet_writes(&self, fail: bool) {
        self.inner.fail_wallet_writes.store(fail, Ordering::SeqCst);
    }

    /// Hold every `append_result` call for `delay` before it lands.
    pub async fn set_append_delay(&self, delay: Option<Duration>) {
        *self.inner.append_delay.write().await = delay;
    }

    /// Every stored result in insertion order, including invalid rows.
    pub async fn results(&self) -> Vec<DrawResultEntity> {
        self.inner.data.read().await.results.clone()
    }
}

impl MemoryInner {
    fn check_read(&self, operation: &'static str) -> StorageResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                format!("memory store {operation} failed"),
                MemoryFailure { operation },
            ));
        }
        Ok(())
    }

    fn check_write(&self, operation: &'static str) -> StorageResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable(
                format!("memory store {operation} failed"),
                MemoryFailure { operation },
            ));
        }
        Ok(())
    }

    async fn read_pending_target(&self) -> StorageResult<PendingTarget> {
        self.check_read("read pending target")?;
        Ok(self.data.read().await.pending_target)
    }

    async fn write_pending_target(&self, target: PendingTarget) -> StorageResult<()> {
        self.check_write("write pending target")?;
        self.data.write().await.pending_target = target;
        Ok(())
    }

    async fn reset_pending_target(&self, expected: PendingTarget) -> StorageResult<bool> {
        self.check_write("reset pending target")?;
        let armed = self
            .fail_resets
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1));
        if armed.is_ok() {
            return Err(StorageError::unavailable(
                "memory store reset pending target failed".into(),
                MemoryFailure {
                    operation: "reset pending target",
                },
            ));
        }
        let mut data = self.data.write().await;
        if data.pending_target != expected {
            return Ok(false);
        }
        data.pending_target = PendingTarget::Random;
        Ok(true)
    }

    async fn append_result(&self, result: DrawResultEntity) -> StorageResult<()> {
        let delay = *self.append_delay.read().await;
        if let Some(delay) = delay {
            sleep(delay).await;
        }
        self.check_write("append result")?;
        self.data.write().await.results.push(result);
        Ok(())
    }

    async fn query_history(&self, limit: usize) -> StorageResult<Vec<DrawResultEntity>> {
        self.check_read("query history")?;
        let data = self.data.read().await;
        let mut history: Vec<DrawResultEntity> = data
            .results
            .iter()
            .rev()
            .filter(|result| result.is_valid())
            .cloned()
            .collect();
        history.sort_by_key(|result| Reverse(result.resolved_at));
        history.truncate(limit);
        Ok(history)
    }

    async fn latest_result(&self) -> StorageResult<Option<DrawResultEntity>> {
        Ok(self.query_history(1).await?.into_iter().next())
    }

    async fn insert_player(&self, player: PlayerEntity, wallet: WalletEntity) -> StorageResult<()> {
        self.check_write("insert player")?;
        let mut data = self.data.write().await;
        if data
            .players
            .iter()
            .any(|existing| existing.username == player.username)
        {
            return Err(StorageError::conflict(format!(
                "username `{}` already exists",
                player.username
            )));
        }
        if data
            .players
            .iter()
            .any(|existing| existing.serial_no == player.serial_no)
        {
            return Err(StorageError::conflict(format!(
                "serial number {} already taken",
                player.serial_no
            )));
        }
        data.players.push(player);
        if self.fail_wallet_writes.load(Ordering::SeqCst) {
            data.players.pop();
            return Err(StorageError::unavailable(
                "memory store insert wallet failed".into(),
                MemoryFailure {
                    operation: "insert wallet",
                },
            ));
        }
        data.wallets.insert(wallet.player_id, wallet);
        Ok(())
    }

    async fn list_players(&self) -> StorageResult<Vec<PlayerWithCoinsEntity>> {
        self.check_read("list players")?;
        let data = self.data.read().await;
        let mut players: Vec<PlayerWithCoinsEntity> = data
            .players
            .iter()
            .map(|player| PlayerWithCoinsEntity {
                player: player.clone(),
                coins: data
                    .wallets
                    .get(&player.id)
                    .map(|wallet| wallet.coins)
                    .unwrap_or(0),
            })
            .collect();
        players.sort_by_key(|entry| Reverse(entry.player.serial_no));
        Ok(players)
    }

    async fn update_player_status(
        &self,
        id: Uuid,
        status: PlayerStatus,
    ) -> StorageResult<Option<PlayerEntity>> {
        self.check_write("update player status")?;
        let mut data = self.data.write().await;
        Ok(data
            .players
            .iter_mut()
            .find(|player| player.id == id)
            .map(|player| {
                player.status = status;
                player.clone()
            }))
    }

    async fn adjust_coins(&self, player_id: Uuid, delta: i64) -> StorageResult<Option<WalletEntity>> {
        self.check_write("adjust coins")?;
        let mut data = self.data.write().await;
        Ok(data.wallets.get_mut(&player_id).map(|wallet| {
            wallet.coins = apply_coin_delta(wallet.coins, delta);
            wallet.updated_at = SystemTime::now();
            wallet.clone()
        }))
    }
}

impl DrawStore for MemoryStore {
    fn read_pending_target(&self) -> BoxFuture<'static, StorageResult<PendingTarget>> {
        let store = self.clone();
        Box::pin(async move { store.inner.read_pending_target().await })
    }

    fn write_pending_target(&self, target: PendingTarget) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.write_pending_target(target).await })
    }

    fn reset_pending_target(
        &self,
        expected: PendingTarget,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reset_pending_target(expected).await })
    }

    fn append_result(&self, result: DrawResultEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.append_result(result).await })
    }

    fn query_history(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<DrawResultEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.inner.query_history(limit).await })
    }

    fn latest_result(&self) -> BoxFuture<'static, StorageResult<Option<DrawResultEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.inner.latest_result().await })
    }

    fn read_reward_settings(&self) -> BoxFuture<'static, StorageResult<RewardSettingsEntity>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.check_read("read reward settings")?;
            Ok(store.inner.data.read().await.reward_settings.clone())
        })
    }

    fn write_reward_settings(
        &self,
        settings: RewardSettingsEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.check_write("write reward settings")?;
            store.inner.data.write().await.reward_settings = settings;
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.check_read("health check") })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.check_read("reconnect") })
    }
}

impl PlayerStore for MemoryStore {
    fn insert_player(
        &self,
        player: PlayerEntity,
        wallet: WalletEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.insert_player(player, wallet).await })
    }

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.check_read("find player")?;
            let data = store.inner.data.read().await;
            Ok(data.players.iter().find(|player| player.id == id).cloned())
        })
    }

    fn find_player_by_username(
        &self,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.check_read("find player")?;
            let data = store.inner.data.read().await;
            Ok(data
                .players
                .iter()
                .find(|player| player.username == username)
                .cloned())
        })
    }

    fn last_serial_no(&self) -> BoxFuture<'static, StorageResult<Option<u32>>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.check_read("last serial number")?;
            let data = store.inner.data.read().await;
            Ok(data.players.iter().map(|player| player.serial_no).max())
        })
    }

    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerWithCoinsEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.inner.list_players().await })
    }

    fn update_player_status(
        &self,
        id: Uuid,
        status: PlayerStatus,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.inner.update_player_status(id, status).await })
    }

    fn find_wallet(
        &self,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<WalletEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.inner.check_read("find wallet")?;
            Ok(store.inner.data.read().await.wallets.get(&player_id).cloned())
        })
    }

    fn adjust_coins(
        &self,
        player_id: Uuid,
        delta: i64,
    ) -> BoxFuture<'static, StorageResult<Option<WalletEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.inner.adjust_coins(player_id, delta).await })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::state::draw::{DrawSource, DrawValue};

    fn result_at(value: i8, secs: u64) -> DrawResultEntity {
        DrawResultEntity {
            id: Uuid::new_v4(),
            value,
            source: DrawSource::Random,
            resolved_at: SystemTime::UNIX_EPOCH + Duration::from_secs(secs),
        }
    }

    #[tokio::test]
    async fn history_is_newest_first_bounded_and_filtered() {
        let store = MemoryStore::new();
        for secs in 0..15u64 {
            store.append_result(result_at((secs % 10) as i8, secs)).await.unwrap();
        }
        store.append_result(result_at(-1, 100)).await.unwrap();

        let history = store.query_history(10).await.unwrap();
        assert_eq!(history.len(), 10);
        assert!(history.iter().all(|entry| entry.value >= 0));
        assert!(
            history
                .windows(2)
                .all(|pair| pair[0].resolved_at > pair[1].resolved_at)
        );
        assert_eq!(
            history[0].resolved_at,
            SystemTime::UNIX_EPOCH + Duration::from_secs(14)
        );
    }

    #[tokio::test]
    async fn reset_keeps_newer_target() {
        let store = MemoryStore::new();
        let five = PendingTarget::Pinned(DrawValue::new(5).unwrap());
        let seven = PendingTarget::Pinned(DrawValue::new(7).unwrap());

        store.write_pending_target(seven).await.unwrap();
        assert!(!store.reset_pending_target(five).await.unwrap());
        assert_eq!(store.read_pending_target().await.unwrap(), seven);

        assert!(store.reset_pending_target(seven).await.unwrap());
        assert_eq!(
            store.read_pending_target().await.unwrap(),
            PendingTarget::Random
        );
    }

    #[tokio::test]
    async fn duplicate_username_conflicts() {
        let store = MemoryStore::new();
        let now = SystemTime::now();
        let player = PlayerEntity {
            id: Uuid::new_v4(),
            serial_no: 1,
            full_name: "Ada".into(),
            username: "ada".into(),
            status: PlayerStatus::Active,
            created_at: now,
        };
        store
            .insert_player(player.clone(), WalletEntity::empty(player.id, now))
            .await
            .unwrap();

        let duplicate = PlayerEntity {
            id: Uuid::new_v4(),
            serial_no: 2,
            ..player
        };
        let err = store
            .insert_player(duplicate.clone(), WalletEntity::empty(duplicate.id, now))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));
    }

    #[tokio::test]
    async fn injected_failures_surface_as_unavailable() {
        let store = MemoryStore::new();
        store.set_fail_writes(true);
        let err = store
            .write_pending_target(PendingTarget::Random)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Unavailable { .. }));
        store.set_fail_writes(false);
        store.write_pending_target(PendingTarget::Random).await.unwrap();
    }

    #[tokio::test]
    async fn reset_failures_are_counted_down() {
        let store = MemoryStore::new();
        let seven = PendingTarget::Pinned(DrawValue::new(7).unwrap());
        store.write_pending_target(seven).await.unwrap();

        store.fail_next_resets(1);
        assert!(store.reset_pending_target(seven).await.is_err());
        store.write_pending_target(seven).await.unwrap();
        assert!(store.reset_pending_target(seven).await.unwrap());
    }

    #[tokio::test]
    async fn equal_value_written_during_resolution_is_cleared() {
        let store = MemoryStore::new();
        let seven = PendingTarget::Pinned(DrawValue::new(7).unwrap());
        store.write_pending_target(seven).await.unwrap();
        // An admin pins 7 again before the draw that read the first 7 is cleared.
        store.write_pending_target(seven).await.unwrap();

        assert!(store.reset_pending_target(seven).await.unwrap());
        assert_eq!(
            store.read_pending_target().await.unwrap(),
            PendingTarget::Random
        );
    }

    #[tokio::test]
    async fn failed_wallet_write_leaves_no_player() {
        let store = MemoryStore::new();
        let now = SystemTime::now();
        let player = PlayerEntity {
            id: Uuid::new_v4(),
            serial_no: 1,
            full_name: "Ada".into(),
            username: "ada".into(),
            status: PlayerStatus::Active,
            created_at: now,
        };

        store.set_fail_wallet_writes(true);
        let err = store
            .insert_player(player.clone(), WalletEntity::empty(player.id, now))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Unavailable { .. }));
        assert!(store.find_player(player.id).await.unwrap().is_none());
        assert!(store.list_players().await.unwrap().is_empty());

        store.set_fail_wallet_writes(false);
        store
            .insert_player(player.clone(), WalletEntity::empty(player.id, now))
            .await
            .unwrap();
        assert_eq!(store.find_wallet(player.id).await.unwrap().unwrap().coins, 0);
    }
}
