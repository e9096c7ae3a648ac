pub mod cache;
pub mod db;

use crate::error::ChunkError;
use crate::terrain::chunk::Chunk;

/// Combines the two storage tiers named in §4.D: a Redis-backed shared
/// cache (advisory, never authoritative) and a Postgres-backed persistent
/// store (authoritative). Callers should reach for [`Store::read`] /
/// [`Store::write`] rather than poking `cache`/`db` directly — those
/// methods encode the read-through and publish-delete disciplines this
/// crate depends on for correctness.
pub struct Store {
    pub cache: cache::ChunkCache,
    pub db: db::ChunkStore,
}

impl Store {
    #[must_use]
    pub fn new(cache: cache::ChunkCache, db: db::ChunkStore) -> Self { Self { cache, db } }

    /// `cache-get` → on miss, `store-get`, repopulating the cache before
    /// returning. A cache failure (read or repopulate) degrades to a miss
    /// rather than failing the request (§7, CacheUnavailable); a store
    /// failure is surfaced, since without it there is nothing left to try
    /// but regenerate — which is the caller's job, not this layer's.
    pub async fn read(&self, cx: i64, cy: i64) -> Result<Option<Chunk>, ChunkError> {
        match self.cache.get(cx, cy).await {
            Ok(Some(chunk)) => return Ok(Some(chunk)),
            Ok(None) => {}
            Err(e) => warn!(target: "chunk::store", cx, cy, error = %e, "cache read failed, falling through to store"),
        }

        let chunk = self.db.get(cx, cy).await?;

        if let Some(chunk) = &chunk {
            if let Err(e) = self.cache.set(chunk).await {
                warn!(target: "chunk::store", cx, cy, error = %e, "cache repopulate failed after store hit");
            }
        }

        Ok(chunk)
    }

    /// `store-upsert` then `cache-delete`. Publishing the invalidation
    /// event is the caller's responsibility (it also needs to reach the
    /// pub/sub hub in [`crate::players`], which this module does not know
    /// about).
    pub async fn write(&self, chunk: &Chunk) -> Result<(), ChunkError> {
        self.db.upsert(chunk).await?;

        if let Err(e) = self.cache.delete(chunk.cx, chunk.cy).await {
            warn!(target: "chunk::store", cx = chunk.cx, cy = chunk.cy, error = %e, "cache delete failed after store write");
        }

        Ok(())
    }
}
