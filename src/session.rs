//! Per-client session layer (component G): one task pair per WebSocket
//! connection, JSON control messages, gzip-framed binary chunk payloads.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use flate2::write::GzEncoder;
use flate2::Compression;
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::Message;

use crate::error::ChunkError;
use crate::mining;
use crate::orchestrator::Orchestrator;
use crate::persistence::Store;
use crate::players::{Hub, HubEvent, Position};
use crate::terrain::tile::{ResourceNode, Tile};
use crate::worker::{ChunkMode, WorkerPayload};

/// Everything a session needs to fulfill requests and react to shared
/// state, bundled so `accept` only takes one extra argument per
/// connection.
pub struct SessionContext {
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<Store>,
    pub hub: Arc<Hub>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ClientMessage {
    Handshake,
    RequestChunk {
        x: f64,
        y: f64,
        #[serde(default)]
        mode: Option<String>,
        #[serde(default, rename = "seed")]
        _seed: Option<i64>,
    },
    Move {
        x: f64,
        y: f64,
    },
    Mining {
        x: i64,
        y: i64,
        tool: String,
    },
}

fn random_player_id() -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..9).map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char).collect()
}

fn round2(v: f64) -> f64 { (v * 100.0).round() / 100.0 }

fn water_type_code(tile: &Tile) -> u8 {
    use crate::terrain::tile::WaterType;
    match tile.w_t {
        None => 0,
        Some(WaterType::Ocean) => 1,
        Some(WaterType::River) => 2,
        Some(WaterType::Lake) => 3,
    }
}

/// `[x, y, h, nH, water?1:0, t, p, stp, b, c, iC?1:0, wT|0, v|0, vT|0, sT|0]`
fn encode_tile(tile: &Tile) -> Value {
    json!([
        tile.x,
        tile.y,
        round2(tile.h),
        round2(tile.n_h),
        u8::from(tile.w),
        round2(tile.t),
        round2(tile.p),
        round2(tile.stp),
        tile.b as u8,
        tile.c as u8,
        u8::from(tile.i_c),
        water_type_code(tile),
        round2(tile.v.unwrap_or(0.0)),
        tile.v_t.map_or(0, |v| v as u8),
        tile.s_t.map_or(0, |s| s as u8),
    ])
}

fn resources_from_tiles(tiles: &[Tile]) -> HashMap<String, ResourceNode> {
    tiles
        .iter()
        .filter_map(|t| t.r.as_ref().map(|r| (format!("{},{}", t.x, t.y), r.clone())))
        .collect()
}

fn chunk_data_message(cx: i64, cy: i64, mode: &str, tiles: &[Tile], resources: &HashMap<String, ResourceNode>) -> Value {
    json!({
        "type": "chunkData",
        "chunk": {
            "x": cx,
            "y": cy,
            "tiles": tiles.iter().map(encode_tile).collect::<Vec<_>>(),
            "mode": mode,
            "resources": resources,
        }
    })
}

fn gzip_json(value: &Value) -> Vec<u8> {
    let bytes = serde_json::to_vec(value).expect("Value is always serializable");
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&bytes).expect("writing to an in-memory encoder cannot fail");
    encoder.finish().expect("finishing an in-memory encoder cannot fail")
}

fn error_message(e: &ChunkError) -> String {
    match e {
        ChunkError::InvalidRequest => "Invalid request parameters".to_owned(),
        ChunkError::GenerationTimeout => "chunk generation timed out".to_owned(),
        ChunkError::CacheUnavailable(_) | ChunkError::StoreUnavailable(_) => "chunk service temporarily unavailable".to_owned(),
        ChunkError::WorkerCrash(_) => "internal generation error".to_owned(),
        ChunkError::BusDeliveryFailure(_) => "internal error".to_owned(),
        ChunkError::MiningMiss => "mining failed".to_owned(),
    }
}

/// Accepts one TCP connection, upgrades it to a WebSocket, and drives the
/// session until the client disconnects.
pub async fn accept(stream: TcpStream, ctx: Arc<SessionContext>) {
    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(target: "session", error = %e, "websocket handshake failed");
            return;
        }
    };

    let (mut sink, mut stream) = ws.split();
    let player_id = random_player_id();

    if let Err(e) = ctx.hub.move_player(&player_id, Position { x: 0.0, y: 0.0 }).await {
        warn!(target: "session", player_id, error = %e, "failed to register new player");
    }

    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();

    let players = ctx.hub.registry.snapshot().await.unwrap_or_default();
    let _ = out_tx.send(Message::Text(json!({"type": "connected", "id": player_id, "players": players}).to_string()));

    let forward_ctx = ctx.clone();
    let mut local_rx = ctx.hub.subscribe_local();
    let forward_tx = out_tx.clone();
    let forward_task = tokio::spawn(async move {
        loop {
            match local_rx.recv().await {
                Ok(HubEvent::PlayerUpdate(players)) => {
                    let msg = json!({"type": "playerUpdate", "players": players});
                    if forward_tx.send(Message::Text(msg.to_string())).is_err() {
                        break;
                    }
                }
                Ok(HubEvent::ChunkInvalidate { cx, cy }) => {
                    // Best-effort refetch-and-push. A failure here is
                    // intentionally lossy: the client will get the fresh
                    // chunk on its next explicit requestChunk regardless.
                    if let Ok(WorkerPayload::Chunk(chunk)) = forward_ctx.orchestrator.fulfill(cx, cy, ChunkMode::Chunk).await {
                        let resources = chunk.resource_map();
                        let msg = chunk_data_message(chunk.cx, chunk.cy, "chunk", &chunk.tiles, &resources);
                        let mut body = msg;
                        body["type"] = Value::from("chunkUpdate");
                        if forward_tx.send(Message::Binary(gzip_json(&body))).is_err() {
                            break;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let writer_task = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = stream.next().await {
        match msg {
            Ok(Message::Text(text)) => handle_text(&ctx, &player_id, &text, &out_tx).await,
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                trace!(target: "session", player_id, error = %e, "read error, closing session");
                break;
            }
        }
    }

    forward_task.abort();
    drop(out_tx);
    let _ = writer_task.await;

    if let Err(e) = ctx.hub.remove_player(&player_id).await {
        warn!(target: "session", player_id, error = %e, "failed to remove player on disconnect");
    }
}

async fn handle_text(ctx: &Arc<SessionContext>, player_id: &str, text: &str, out: &mpsc::UnboundedSender<Message>) {
    let parsed: Result<ClientMessage, _> = serde_json::from_str(text);

    let Ok(message) = parsed else {
        let _ = out.send(Message::Text(json!({"type": "error", "message": "Invalid request parameters"}).to_string()));
        return;
    };

    match message {
        ClientMessage::Handshake => {
            let players = ctx.hub.registry.snapshot().await.unwrap_or_default();
            let _ = out.send(Message::Text(json!({"type": "handshook", "id": player_id, "players": players}).to_string()));
        }
        ClientMessage::Move { x, y } => {
            if !x.is_finite() || !y.is_finite() {
                let _ = out.send(Message::Text(json!({"type": "error", "message": "Invalid request parameters"}).to_string()));
                return;
            }
            if let Err(e) = ctx.hub.move_player(player_id, Position { x, y }).await {
                warn!(target: "session", player_id, error = %e, "failed to record player move");
            }
        }
        ClientMessage::RequestChunk { x, y, mode, .. } => {
            handle_request_chunk(ctx, x, y, mode.as_deref(), out).await;
        }
        ClientMessage::Mining { x, y, tool } => {
            handle_mining(ctx, x, y, &tool, out).await;
        }
    }
}

async fn handle_request_chunk(ctx: &Arc<SessionContext>, x: f64, y: f64, mode: Option<&str>, out: &mpsc::UnboundedSender<Message>) {
    if !x.is_finite() || !y.is_finite() {
        let _ = out.send(Message::Text(json!({"type": "error", "message": "Invalid request parameters"}).to_string()));
        return;
    }

    let mode_str = mode.unwrap_or("chunk");
    let Some(chunk_mode) = ChunkMode::from_str(mode_str) else {
        let _ = out.send(Message::Text(json!({"type": "error", "message": "Invalid request parameters"}).to_string()));
        return;
    };

    let cx = x.round() as i64;
    let cy = y.round() as i64;

    match ctx.orchestrator.fulfill(cx, cy, chunk_mode).await {
        Ok(WorkerPayload::Chunk(chunk)) => {
            let resources = chunk.resource_map();
            let msg = chunk_data_message(chunk.cx, chunk.cy, mode_str, &chunk.tiles, &resources);
            let _ = out.send(Message::Binary(gzip_json(&msg)));
        }
        Ok(WorkerPayload::Row(tiles) | WorkerPayload::Column(tiles)) => {
            let resources = resources_from_tiles(&tiles);
            let msg = chunk_data_message(cx, cy, mode_str, &tiles, &resources);
            let _ = out.send(Message::Binary(gzip_json(&msg)));
        }
        Ok(WorkerPayload::Point(tile)) => {
            let resources = resources_from_tiles(std::slice::from_ref(&tile));
            let msg = chunk_data_message(cx, cy, mode_str, std::slice::from_ref(&tile), &resources);
            let _ = out.send(Message::Binary(gzip_json(&msg)));
        }
        Err(e) => {
            if !matches!(e, ChunkError::InvalidRequest) {
                warn!(target: "session", cx, cy, error = %e, "requestChunk failed");
            }
            let _ = out.send(Message::Text(json!({"type": "error", "message": error_message(&e)}).to_string()));
        }
    }
}

async fn handle_mining(ctx: &Arc<SessionContext>, x: i64, y: i64, tool: &str, out: &mpsc::UnboundedSender<Message>) {
    match mining::mine(&ctx.store, &ctx.hub, x, y, tool).await {
        Ok(result) => {
            let msg = json!({
                "type": "miningSuccess",
                "resource": result.resource_type.as_wire_str(),
                "amount": result.amount,
                "x": result.x,
                "y": result.y,
            });
            let _ = out.send(Message::Text(msg.to_string()));
        }
        Err(_) => {
            let _ = out.send(Message::Text(json!({"type": "miningFailed", "x": x, "y": y}).to_string()));
        }
    }
}
