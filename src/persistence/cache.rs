use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::ChunkError;
use crate::terrain::chunk::Chunk;

/// Redis-backed shared chunk cache. Key format: `chunk:<cx>:<cy>`.
#[derive(Clone)]
pub struct ChunkCache {
    conn: ConnectionManager,
    ttl_secs: u64,
}

impl ChunkCache {
    /// # Errors
    /// - the Redis URL cannot be parsed or the initial connection fails.
    pub async fn connect(redis_url: &str, ttl_secs: u64) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn, ttl_secs })
    }

    fn key(cx: i64, cy: i64) -> String { format!("chunk:{cx}:{cy}") }

    pub async fn get(&self, cx: i64, cy: i64) -> Result<Option<Chunk>, ChunkError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(Self::key(cx, cy))
            .await
            .map_err(|e| ChunkError::CacheUnavailable(e.to_string()))?;

        match raw {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| ChunkError::CacheUnavailable(format!("corrupt cache entry: {e}"))),
            None => Ok(None),
        }
    }

    pub async fn set(&self, chunk: &Chunk) -> Result<(), ChunkError> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(chunk)
            .map_err(|e| ChunkError::CacheUnavailable(format!("serialize failed: {e}")))?;

        conn.set_ex::<_, _, ()>(Self::key(chunk.cx, chunk.cy), json, self.ttl_secs)
            .await
            .map_err(|e| ChunkError::CacheUnavailable(e.to_string()))
    }

    /// The publish-delete discipline: deleting (not overwriting) forces the
    /// next reader to miss and rebuild from the authoritative store.
    pub async fn delete(&self, cx: i64, cy: i64) -> Result<(), ChunkError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(Self::key(cx, cy))
            .await
            .map_err(|e| ChunkError::CacheUnavailable(e.to_string()))
    }

    /// Purges every key matching `*chunk*` or `*player*`, used on
    /// `DEBUG_MODE` boot.
    pub async fn purge_debug_keys(&self) -> Result<(), ChunkError> {
        let mut conn = self.conn.clone();

        for pattern in ["*chunk*", "*player*"] {
            let keys: Vec<String> = conn
                .keys(pattern)
                .await
                .map_err(|e| ChunkError::CacheUnavailable(e.to_string()))?;

            if !keys.is_empty() {
                conn.del::<_, ()>(keys)
                    .await
                    .map_err(|e| ChunkError::CacheUnavailable(e.to_string()))?;
            }
        }

        Ok(())
    }
}
