use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};

use crate::error::ChunkError;
use crate::terrain::chunk::Chunk;
use crate::terrain::tile::Tile;

/// Generation provenance stored alongside `tiles`, separate from the
/// tile blob itself so a future generator version change is diagnosable
/// without deserializing every tile.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct TerrainMeta {
    seed: u32,
    chunk_size: usize,
}

/// Postgres-backed persistent store — the single source of truth for
/// generated chunks. The cache in [`super::cache`] is only ever a
/// disposable read accelerator in front of this.
#[derive(Clone)]
pub struct ChunkStore {
    pool: PgPool,
}

impl ChunkStore {
    /// Connects with up to `retries` attempts at `retry_delay` spacing. A
    /// failed database initialization here is the one fatal condition at
    /// startup: callers should exit the process hard once this returns
    /// `Err`.
    ///
    /// # Errors
    /// - every connection attempt failed.
    pub async fn connect(database_url: &str, retries: u32, retry_delay: std::time::Duration) -> anyhow::Result<Self> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match PgPoolOptions::new().max_connections(16).connect(database_url).await {
                Ok(pool) => {
                    let store = Self { pool };
                    store.ensure_schema().await?;
                    return Ok(store);
                }
                Err(e) if attempt < retries => {
                    warn!(target: "chunk::store", attempt, error = %e, "database connection failed, retrying");
                    tokio::time::sleep(retry_delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn ensure_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chunks (
                cx BIGINT NOT NULL,
                cy BIGINT NOT NULL,
                tiles JSONB NOT NULL,
                terrain JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (cx, cy)
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS chunks_cx_cy_idx ON chunks (cx, cy)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn get(&self, cx: i64, cy: i64) -> Result<Option<Chunk>, ChunkError> {
        let row = sqlx::query("SELECT tiles FROM chunks WHERE cx = $1 AND cy = $2")
            .bind(cx)
            .bind(cy)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| ChunkError::StoreUnavailable(e.to_string()))?;

        let Some(row) = row else { return Ok(None) };

        let tiles_json: serde_json::Value = row
            .try_get("tiles")
            .map_err(|e| ChunkError::StoreUnavailable(e.to_string()))?;

        let tiles: Vec<Tile> = serde_json::from_value(tiles_json)
            .map_err(|e| ChunkError::StoreUnavailable(format!("corrupt tile blob: {e}")))?;

        Ok(Some(Chunk { cx, cy, tiles }))
    }

    /// Tolerates concurrent upserts on the same key: last writer wins, via
    /// `ON CONFLICT DO UPDATE`.
    pub async fn upsert(&self, chunk: &Chunk) -> Result<(), ChunkError> {
        let tiles_json = serde_json::to_value(&chunk.tiles)
            .map_err(|e| ChunkError::StoreUnavailable(format!("serialize failed: {e}")))?;

        let terrain_json = serde_json::to_value(TerrainMeta {
            seed: 0,
            chunk_size: crate::CHUNK_SIZE,
        })
        .expect("TerrainMeta is always serializable");

        sqlx::query(
            "INSERT INTO chunks (cx, cy, tiles, terrain)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (cx, cy) DO UPDATE SET tiles = EXCLUDED.tiles, terrain = EXCLUDED.terrain",
        )
        .bind(chunk.cx)
        .bind(chunk.cy)
        .bind(tiles_json)
        .bind(terrain_json)
        .execute(&self.pool)
        .await
        .map_err(|e| ChunkError::StoreUnavailable(e.to_string()))?;

        Ok(())
    }

    /// Truncates the whole table. Only ever called on `DEBUG_MODE` boot.
    pub async fn truncate(&self) -> Result<(), ChunkError> {
        sqlx::query("TRUNCATE TABLE chunks")
            .execute(&self.pool)
            .await
            .map_err(|e| ChunkError::StoreUnavailable(e.to_string()))?;

        Ok(())
    }
}
