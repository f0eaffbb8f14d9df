//! Durable store backed by Redis.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use tokio::sync::OnceCell;
use tracing::{info, trace, warn};

use super::backend::{DurableStore, StoreError};

/// A [`DurableStore`] over a lazily established Redis connection manager.
///
/// No connection is made until the first operation. While Redis cannot be
/// reached every operation fails with [`StoreError::Unavailable`] and the
/// next one tries to connect again. Once connected, the manager reconnects
/// on its own.
pub struct RedisStore {
    client: Client,
    connection: OnceCell<ConnectionManager>,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Create a store for the Redis server at `url` without connecting.
    ///
    /// Fails only when the URL itself is invalid.
    pub fn new(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url).map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self {
            client,
            connection: OnceCell::new(),
        })
    }

    /// Create a store and establish the connection up front.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let store = Self::new(url)?;
        store.connection().await?;
        Ok(store)
    }

    /// Whether a connection has been established.
    pub fn is_connected(&self) -> bool {
        self.connection.initialized()
    }

    async fn connection(&self) -> Result<ConnectionManager, StoreError> {
        let connection = self
            .connection
            .get_or_try_init(|| async {
                let connection = self.client.get_connection_manager().await.map_err(|e| {
                    warn!(error = %e, "Could not connect to Redis durable store");
                    StoreError::Unavailable(e.to_string())
                })?;
                info!("Connected to Redis durable store");
                Ok::<_, StoreError>(connection)
            })
            .await?;
        Ok(connection.clone())
    }
}

fn store_error(e: RedisError) -> StoreError {
    if e.is_io_error() || e.is_connection_dropped() || e.is_timeout() {
        StoreError::Unavailable(e.to_string())
    } else {
        StoreError::Backend(e.to_string())
    }
}

#[async_trait]
impl DurableStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut connection = self.connection().await?;
        let value = redis::cmd("GET")
            .arg(key)
            .query_async::<Option<String>>(&mut connection)
            .await
            .map_err(store_error)?;
        trace!(key = %key, found = value.is_some(), "Redis GET");
        Ok(value)
    }

    async fn put(
        &self,
        key: &str,
        value: &str,
        expire_after_secs: Option<u64>,
    ) -> Result<(), StoreError> {
        let mut connection = self.connection().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(secs) = expire_after_secs {
            cmd.arg("EX").arg(secs.max(1));
        }
        cmd.query_async::<()>(&mut connection)
            .await
            .map_err(store_error)?;
        trace!(key = %key, expire_after_secs = ?expire_after_secs, "Redis SET");
        Ok(())
    }
}
