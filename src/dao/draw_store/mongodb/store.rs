use std::{sync::Arc, time::SystemTime};

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database, IndexModel,
    bson::{DateTime, Document, doc},
    options::{IndexOptions, ReturnDocument},
};
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult, is_duplicate_key},
    models::{
        MongoDrawResultDocument, MongoPlayerDocument, MongoPlayerRow, MongoSettingsDocument,
        MongoWalletDocument, SETTINGS_ID, doc_id, reward_settings_update, valid_value_filter,
    },
};
use crate::{
    dao::{
        draw_store::{DrawStore, PlayerStore},
        models::{
            DrawResultEntity, PlayerEntity, PlayerStatus, PlayerWithCoinsEntity,
            RewardSettingsEntity, WalletEntity,
        },
        storage::StorageResult,
    },
    state::draw::{PendingTarget, RANDOM_TARGET},
};

const SETTINGS_COLLECTION_NAME: &str = "draw_settings";
const RESULTS_COLLECTION_NAME: &str = "draw_results";
const PLAYERS_COLLECTION_NAME: &str = "players";
const WALLETS_COLLECTION_NAME: &str = "wallets";

/// [`SpinStore`](crate::dao::draw_store::SpinStore) backed by MongoDB.
#[derive(Clone)]
pub struct MongoSpinStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let database =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        self.state.write().await.database = database;
        Ok(())
    }
}

impl MongoSpinStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let database = establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let database = self.database().await;

        let results = database.collection::<Document>(RESULTS_COLLECTION_NAME);
        let history_index = IndexModel::builder()
            .keys(doc! {"resolved_at": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("draw_resolved_at_idx".to_owned()))
                    .build(),
            )
            .build();
        results
            .create_index(history_index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: RESULTS_COLLECTION_NAME,
                index: "resolved_at",
                source,
            })?;

        let players = database.collection::<Document>(PLAYERS_COLLECTION_NAME);
        for (field, name) in [
            ("username", "player_username_idx"),
            ("serial_no", "player_serial_no_idx"),
        ] {
            let mut keys = Document::new();
            keys.insert(field, 1);
            let index = IndexModel::builder()
                .keys(keys)
                .options(
                    IndexOptions::builder()
                        .name(Some(name.to_owned()))
                        .unique(Some(true))
                        .build(),
                )
                .build();
            players
                .create_index(index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection: PLAYERS_COLLECTION_NAME,
                    index: name,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn settings_collection(&self) -> Collection<MongoSettingsDocument> {
        self.database()
            .await
            .collection::<MongoSettingsDocument>(SETTINGS_COLLECTION_NAME)
    }

    async fn results_collection(&self) -> Collection<MongoDrawResultDocument> {
        self.database()
            .await
            .collection::<MongoDrawResultDocument>(RESULTS_COLLECTION_NAME)
    }

    async fn players_collection(&self) -> Collection<MongoPlayerDocument> {
        self.database()
            .await
            .collection::<MongoPlayerDocument>(PLAYERS_COLLECTION_NAME)
    }

    async fn wallets_collection(&self) -> Collection<MongoWalletDocument> {
        self.database()
            .await
            .collection::<MongoWalletDocument>(WALLETS_COLLECTION_NAME)
    }

    async fn read_settings(&self) -> MongoResult<Option<MongoSettingsDocument>> {
        let collection = self.settings_collection().await;
        collection
            .find_one(doc! {"_id": SETTINGS_ID})
            .await
            .map_err(|source| MongoDaoError::ReadSettings { source })
    }

    async fn read_pending_target(&self) -> MongoResult<PendingTarget> {
        match self.read_settings().await? {
            Some(settings) => settings.pending_target(),
            None => Ok(PendingTarget::Random),
        }
    }

    async fn write_pending_target(&self, target: PendingTarget) -> MongoResult<()> {
        let collection = self.settings_collection().await;
        collection
            .update_one(
                doc! {"_id": SETTINGS_ID},
                doc! {"$set": {"pending_target": i32::from(target.as_raw())}},
            )
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::WriteSettings { source })?;
        Ok(())
    }

    /// Clear the target only while it still equals `expected`.
    async fn reset_pending_target(&self, expected: PendingTarget) -> MongoResult<bool> {
        if expected == PendingTarget::Random {
            return Ok(self.read_pending_target().await? == PendingTarget::Random);
        }

        let collection = self.settings_collection().await;
        let outcome = collection
            .update_one(
                doc! {"_id": SETTINGS_ID, "pending_target": i32::from(expected.as_raw())},
                doc! {"$set": {"pending_target": i32::from(RANDOM_TARGET)}},
            )
            .await
            .map_err(|source| MongoDaoError::WriteSettings { source })?;
        Ok(outcome.matched_count > 0)
    }

    async fn append_result(&self, result: DrawResultEntity) -> MongoResult<()> {
        let id = result.id;
        let document: MongoDrawResultDocument = result.into();
        let collection = self.results_collection().await;
        collection
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::AppendResult { id, source })?;
        Ok(())
    }

    async fn query_history(&self, limit: usize) -> MongoResult<Vec<DrawResultEntity>> {
        let collection = self.results_collection().await;
        let documents: Vec<MongoDrawResultDocument> = collection
            .find(valid_value_filter())
            .sort(doc! {"resolved_at": -1})
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await
            .map_err(|source| MongoDaoError::QueryHistory { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::QueryHistory { source })?;

        documents
            .into_iter()
            .map(DrawResultEntity::try_from)
            .collect()
    }

    async fn latest_result(&self) -> MongoResult<Option<DrawResultEntity>> {
        let collection = self.results_collection().await;
        collection
            .find_one(valid_value_filter())
            .sort(doc! {"resolved_at": -1})
            .await
            .map_err(|source| MongoDaoError::QueryHistory { source })?
            .map(DrawResultEntity::try_from)
            .transpose()
    }

    async fn read_reward_settings(&self) -> MongoResult<RewardSettingsEntity> {
        Ok(self
            .read_settings()
            .await?
            .map(|settings| settings.reward_settings())
            .unwrap_or_default())
    }

    async fn write_reward_settings(&self, settings: RewardSettingsEntity) -> MongoResult<()> {
        let collection = self.settings_collection().await;
        collection
            .update_one(
                doc! {"_id": SETTINGS_ID},
                reward_settings_update(&settings),
            )
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::WriteSettings { source })?;
        Ok(())
    }

    async fn insert_player(&self, player: PlayerEntity, wallet: WalletEntity) -> MongoResult<()> {
        let id = player.id;
        let document: MongoPlayerDocument = player.into();
        self.players_collection()
            .await
            .insert_one(&document)
            .await
            .map_err(|source| {
                if is_duplicate_key(&source) {
                    MongoDaoError::Duplicate {
                        collection: PLAYERS_COLLECTION_NAME,
                        source,
                    }
                } else {
                    MongoDaoError::SavePlayer { id, source }
                }
            })?;

        let wallet: MongoWalletDocument = wallet.into();
        let saved = self
            .wallets_collection()
            .await
            .replace_one(doc_id(id), &wallet)
            .upsert(true)
            .await;
        if let Err(source) = saved {
            // A player row never outlives a failed wallet write.
            if let Err(err) = self.players_collection().await.delete_one(doc_id(id)).await {
                warn!(player_id = %id, error = %err, "failed to remove player after wallet write failed");
            }
            return Err(MongoDaoError::UpdateWallet { id, source });
        }
        Ok(())
    }

    async fn find_player_by(&self, filter: Document) -> MongoResult<Option<PlayerEntity>> {
        self.players_collection()
            .await
            .find_one(filter)
            .await
            .map_err(|source| MongoDaoError::LoadPlayer { source })?
            .map(PlayerEntity::try_from)
            .transpose()
    }

    async fn last_serial_no(&self) -> MongoResult<Option<u32>> {
        Ok(self
            .players_collection()
            .await
            .find_one(doc! {})
            .sort(doc! {"serial_no": -1})
            .await
            .map_err(|source| MongoDaoError::LoadPlayer { source })?
            .map(PlayerEntity::try_from)
            .transpose()?
            .map(|player| player.serial_no))
    }

    async fn list_players(&self) -> MongoResult<Vec<PlayerWithCoinsEntity>> {
        let pipeline = vec![
            doc! {"$lookup": {
                "from": WALLETS_COLLECTION_NAME,
                "localField": "_id",
                "foreignField": "_id",
                "as": "wallet",
            }},
            doc! {"$unwind": {"path": "$wallet", "preserveNullAndEmptyArrays": true}},
            doc! {"$project": {
                "_id": 1,
                "serial_no": 1,
                "full_name": 1,
                "username": 1,
                "status": 1,
                "created_at": 1,
                "coins": {"$ifNull": ["$wallet.coins", 0]},
            }},
            doc! {"$sort": {"serial_no": -1}},
        ];

        let rows: Vec<MongoPlayerRow> = self
            .players_collection()
            .await
            .aggregate(pipeline)
            .with_type::<MongoPlayerRow>()
            .await
            .map_err(|source| MongoDaoError::ListPlayers { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListPlayers { source })?;

        rows.into_iter()
            .map(PlayerWithCoinsEntity::try_from)
            .collect()
    }

    async fn update_player_status(
        &self,
        id: Uuid,
        status: PlayerStatus,
    ) -> MongoResult<Option<PlayerEntity>> {
        let status = match status {
            PlayerStatus::Active => "active",
            PlayerStatus::Inactive => "inactive",
        };
        self.players_collection()
            .await
            .find_one_and_update(doc_id(id), doc! {"$set": {"status": status}})
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::SavePlayer { id, source })?
            .map(PlayerEntity::try_from)
            .transpose()
    }

    async fn find_wallet(&self, player_id: Uuid) -> MongoResult<Option<WalletEntity>> {
        self.wallets_collection()
            .await
            .find_one(doc_id(player_id))
            .await
            .map_err(|source| MongoDaoError::LoadPlayer { source })?
            .map(WalletEntity::try_from)
            .transpose()
    }

    /// Pipeline update clamping the balance at zero on the server.
    async fn adjust_coins(&self, player_id: Uuid, delta: i64) -> MongoResult<Option<WalletEntity>> {
        let pipeline = vec![doc! {"$set": {
            "coins": {"$max": [0_i64, {"$add": ["$coins", delta]}]},
            "updated_at": DateTime::from_system_time(SystemTime::now()),
        }}];

        self.wallets_collection()
            .await
            .find_one_and_update(doc_id(player_id), pipeline)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::UpdateWallet {
                id: player_id,
                source,
            })?
            .map(WalletEntity::try_from)
            .transpose()
    }
}

impl DrawStore for MongoSpinStore {
    fn read_pending_target(&self) -> BoxFuture<'static, StorageResult<PendingTarget>> {
        let store = self.clone();
        Box::pin(async move { store.read_pending_target().await.map_err(Into::into) })
    }

    fn write_pending_target(&self, target: PendingTarget) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.write_pending_target(target).await.map_err(Into::into) })
    }

    fn reset_pending_target(
        &self,
        expected: PendingTarget,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .reset_pending_target(expected)
                .await
                .map_err(Into::into)
        })
    }

    fn append_result(&self, result: DrawResultEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.append_result(result).await.map_err(Into::into) })
    }

    fn query_history(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<DrawResultEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.query_history(limit).await.map_err(Into::into) })
    }

    fn latest_result(&self) -> BoxFuture<'static, StorageResult<Option<DrawResultEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.latest_result().await.map_err(Into::into) })
    }

    fn read_reward_settings(&self) -> BoxFuture<'static, StorageResult<RewardSettingsEntity>> {
        let store = self.clone();
        Box::pin(async move { store.read_reward_settings().await.map_err(Into::into) })
    }

    fn write_reward_settings(
        &self,
        settings: RewardSettingsEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .write_reward_settings(settings)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}

impl PlayerStore for MongoSpinStore {
    fn insert_player(
        &self,
        player: PlayerEntity,
        wallet: WalletEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_player(player, wallet).await.map_err(Into::into) })
    }

    fn find_player(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_player_by(doc_id(id)).await.map_err(Into::into) })
    }

    fn find_player_by_username(
        &self,
        username: String,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .find_player_by(doc! {"username": username})
                .await
                .map_err(Into::into)
        })
    }

    fn last_serial_no(&self) -> BoxFuture<'static, StorageResult<Option<u32>>> {
        let store = self.clone();
        Box::pin(async move { store.last_serial_no().await.map_err(Into::into) })
    }

    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerWithCoinsEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_players().await.map_err(Into::into) })
    }

    fn update_player_status(
        &self,
        id: Uuid,
        status: PlayerStatus,
    ) -> BoxFuture<'static, StorageResult<Option<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .update_player_status(id, status)
                .await
                .map_err(Into::into)
        })
    }

    fn find_wallet(
        &self,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Option<WalletEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_wallet(player_id).await.map_err(Into::into) })
    }

    fn adjust_coins(
        &self,
        player_id: Uuid,
        delta: i64,
    ) -> BoxFuture<'static, StorageResult<Option<WalletEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .adjust_coins(player_id, delta)
                .await
                .map_err(Into::into)
        })
    }
}
