//! Shared player registry and cross-process event bus (component F).

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::ChunkError;
use crate::worker::{ChunkWorkerHandle, WorkerJob};

const PLAYERS_KEY: &str = "players";

pub const TOPIC_PLAYER_UPDATES: &str = "player_updates";
pub const TOPIC_CHUNK_INVALIDATE: &str = "chunk_invalidate";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PlayerUpdateEvent {
    #[serde(rename = "playerId")]
    player_id: String,
    x: f64,
    y: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct ChunkInvalidateEvent {
    cx: i64,
    cy: i64,
}

/// An event a local session needs to react to, after it has already been
/// round-tripped through (or originated without needing) the shared bus.
#[derive(Debug, Clone)]
pub enum HubEvent {
    PlayerUpdate(HashMap<String, Position>),
    ChunkInvalidate { cx: i64, cy: i64 },
}

/// Redis-hash-backed registry, mirrors the teacher's pattern of keeping
/// ephemeral shared state in one hash with a refreshed TTL rather than
/// per-key expiry (which `HSET` fields can't carry individually).
#[derive(Clone)]
pub struct PlayerRegistry {
    conn: ConnectionManager,
    ttl_secs: u64,
}

impl PlayerRegistry {
    /// # Errors
    /// - the Redis URL cannot be parsed or the initial connection fails.
    pub async fn connect(redis_url: &str, ttl_secs: u64) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn, ttl_secs })
    }

    pub async fn set(&self, player_id: &str, pos: Position) -> Result<(), ChunkError> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(&pos).expect("Position is always serializable");

        conn.hset::<_, _, _, ()>(PLAYERS_KEY, player_id, json)
            .await
            .map_err(|e| ChunkError::CacheUnavailable(e.to_string()))?;

        conn.expire::<_, ()>(PLAYERS_KEY, self.ttl_secs as i64)
            .await
            .map_err(|e| ChunkError::CacheUnavailable(e.to_string()))
    }

    pub async fn remove(&self, player_id: &str) -> Result<(), ChunkError> {
        let mut conn = self.conn.clone();
        conn.hdel::<_, _, ()>(PLAYERS_KEY, player_id)
            .await
            .map_err(|e| ChunkError::CacheUnavailable(e.to_string()))
    }

    pub async fn snapshot(&self) -> Result<HashMap<String, Position>, ChunkError> {
        let mut conn = self.conn.clone();
        let raw: HashMap<String, String> = conn
            .hgetall(PLAYERS_KEY)
            .await
            .map_err(|e| ChunkError::CacheUnavailable(e.to_string()))?;

        Ok(raw
            .into_iter()
            .filter_map(|(id, json)| serde_json::from_str::<Position>(&json).ok().map(|p| (id, p)))
            .collect())
    }
}

/// Redis pub/sub wrapper over the two topics named in §4.F. Publishing is
/// fire-and-forget: a failed publish is a `BusDeliveryFailure`, logged and
/// otherwise ignored (the next cache miss still rebuilds from the store).
#[derive(Clone)]
pub struct Bus {
    client: redis::Client,
    conn: ConnectionManager,
}

impl Bus {
    /// # Errors
    /// - the Redis URL cannot be parsed or the initial connection fails.
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { client, conn })
    }

    pub async fn publish_player_update(&self, player_id: &str, pos: Position) -> Result<(), ChunkError> {
        let payload = serde_json::to_string(&PlayerUpdateEvent {
            player_id: player_id.to_owned(),
            x: pos.x,
            y: pos.y,
        })
        .expect("PlayerUpdateEvent is always serializable");

        let mut conn = self.conn.clone();
        conn.publish::<_, _, ()>(TOPIC_PLAYER_UPDATES, payload)
            .await
            .map_err(|e| ChunkError::BusDeliveryFailure(e.to_string()))
    }

    pub async fn publish_chunk_invalidate(&self, cx: i64, cy: i64) -> Result<(), ChunkError> {
        let payload =
            serde_json::to_string(&ChunkInvalidateEvent { cx, cy }).expect("ChunkInvalidateEvent is always serializable");

        let mut conn = self.conn.clone();
        conn.publish::<_, _, ()>(TOPIC_CHUNK_INVALIDATE, payload)
            .await
            .map_err(|e| ChunkError::BusDeliveryFailure(e.to_string()))
    }
}

/// Ties the registry and bus together with a process-local fan-out
/// channel that session handles subscribe to. One `Hub` per process.
pub struct Hub {
    pub registry: PlayerRegistry,
    bus: Bus,
    local: broadcast::Sender<HubEvent>,
}

impl Hub {
    #[must_use]
    pub fn new(registry: PlayerRegistry, bus: Bus) -> Self {
        let (local, _rx) = broadcast::channel(256);
        Self { registry, bus, local }
    }

    #[must_use]
    pub fn subscribe_local(&self) -> broadcast::Receiver<HubEvent> { self.local.subscribe() }

    /// Writes the player's position then publishes a hint on
    /// `player_updates`. The hint alone doesn't carry the full registry —
    /// by design, receivers re-read rather than trust the payload.
    pub async fn move_player(&self, player_id: &str, pos: Position) -> Result<(), ChunkError> {
        self.registry.set(player_id, pos).await?;

        if let Err(e) = self.bus.publish_player_update(player_id, pos).await {
            warn!(target: "players", player_id, error = %e, "player_updates publish failed");
        }

        let snapshot = self.registry.snapshot().await.unwrap_or_default();
        let _ = self.local.send(HubEvent::PlayerUpdate(snapshot));

        Ok(())
    }

    pub async fn remove_player(&self, player_id: &str) -> Result<(), ChunkError> {
        self.registry.remove(player_id).await?;

        if let Err(e) = self.bus.publish_player_update(player_id, Position { x: 0.0, y: 0.0 }).await {
            warn!(target: "players", player_id, error = %e, "player_updates publish failed on disconnect");
        }

        let snapshot = self.registry.snapshot().await.unwrap_or_default();
        let _ = self.local.send(HubEvent::PlayerUpdate(snapshot));

        Ok(())
    }

    pub async fn invalidate_chunk(&self, cx: i64, cy: i64) {
        if let Err(e) = self.bus.publish_chunk_invalidate(cx, cy).await {
            warn!(target: "players", cx, cy, error = %e, "chunk_invalidate publish failed");
        }
    }

    /// Spawned once at bootstrap. Forever forwards remote bus messages
    /// into the local fan-out channel and purges worker-local LRUs on
    /// `chunk_invalidate` — the other half of the publish-delete
    /// discipline, since the writer only deletes its own process's cache
    /// entry and local worker copies.
    pub async fn run_listener(self: Arc<Self>, workers: Vec<ChunkWorkerHandle>) {
        loop {
            if let Err(e) = self.listen_once(&workers).await {
                warn!(target: "players", error = %e, "bus listener connection dropped, reconnecting");
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            }
        }
    }

    async fn listen_once(&self, workers: &[ChunkWorkerHandle]) -> anyhow::Result<()> {
        let mut pubsub = self.bus.client.get_async_pubsub().await?;
        pubsub.subscribe(TOPIC_PLAYER_UPDATES).await?;
        pubsub.subscribe(TOPIC_CHUNK_INVALIDATE).await?;

        let mut stream = pubsub.on_message();
        while let Some(msg) = stream.next().await {
            let channel = msg.get_channel_name().to_owned();
            let payload: String = match msg.get_payload() {
                Ok(p) => p,
                Err(e) => {
                    warn!(target: "players", error = %e, "undecodable bus payload");
                    continue;
                }
            };

            match channel.as_str() {
                TOPIC_PLAYER_UPDATES => {
                    let snapshot = self.registry.snapshot().await.unwrap_or_default();
                    let _ = self.local.send(HubEvent::PlayerUpdate(snapshot));
                }
                TOPIC_CHUNK_INVALIDATE => {
                    if let Ok(event) = serde_json::from_str::<ChunkInvalidateEvent>(&payload) {
                        for handle in workers {
                            let _ = handle.sender.send(WorkerJob::Invalidate { cx: event.cx, cy: event.cy });
                        }
                        let _ = self.local.send(HubEvent::ChunkInvalidate { cx: event.cx, cy: event.cy });
                    }
                }
                _ => {}
            }
        }

        Ok(())
    }
}
