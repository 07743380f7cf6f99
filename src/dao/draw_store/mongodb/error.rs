use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use thiserror::Error;
use uuid::Uuid;

/// Result alias for MongoDB operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

const DUPLICATE_KEY_CODE: i32 = 11000;

/// Failures raised by the MongoDB backend.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// Required environment variable is not set.
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Connection URI could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    /// Driver rejected the client options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    /// Database never answered while connecting.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    /// Periodic ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    /// Index creation failed at startup.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    /// Settings document could not be read.
    #[error("failed to read draw settings")]
    ReadSettings {
        #[source]
        source: MongoError,
    },
    /// Settings document could not be written.
    #[error("failed to write draw settings")]
    WriteSettings {
        #[source]
        source: MongoError,
    },
    /// Draw result insert failed.
    #[error("failed to append draw result `{id}`")]
    AppendResult {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    /// History query failed.
    #[error("failed to query draw history")]
    QueryHistory {
        #[source]
        source: MongoError,
    },
    /// Stored document does not decode into an entity.
    #[error("stored document in `{collection}` is malformed: {reason}")]
    Malformed {
        collection: &'static str,
        reason: String,
    },
    /// Unique index violation.
    #[error("duplicate key in collection `{collection}`")]
    Duplicate {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    /// Player insert failed.
    #[error("failed to save player `{id}`")]
    SavePlayer {
        id: Uuid,
        #[source]
        source: MongoError,
    },
    /// Player lookup failed.
    #[error("failed to load player")]
    LoadPlayer {
        #[source]
        source: MongoError,
    },
    /// Player listing failed.
    #[error("failed to list players")]
    ListPlayers {
        #[source]
        source: MongoError,
    },
    /// Wallet write failed.
    #[error("failed to update wallet of player `{id}`")]
    UpdateWallet {
        id: Uuid,
        #[source]
        source: MongoError,
    },
}

/// Whether the error is a unique index violation.
pub fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY_CODE
    )
}
