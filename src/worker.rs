use std::num::NonZeroUsize;

use flume::{Receiver, Sender};
use lru::LruCache;

use crate::noise::NoiseEngine;
use crate::terrain::chunk::{chunk_key, Chunk};
use crate::terrain::tile::Tile;
use crate::{terrain, CHUNK_SIZE};

/// Worker-local LRU capacity. Not the shared cache — purely a speedup for
/// repeated requests landing on the same worker.
pub const WORKER_LRU_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkMode {
    Chunk,
    Row,
    Column,
    Point,
}

impl ChunkMode {
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "chunk" => Some(Self::Chunk),
            "row" => Some(Self::Row),
            "column" => Some(Self::Column),
            "point" => Some(Self::Point),
            _ => None,
        }
    }
}

/// A request to generate (or fetch from the local LRU) a chunk, row,
/// column, or point. For [`ChunkMode::Chunk`], `cx`/`cy` are chunk
/// coordinates. For the partial modes they are *world* coordinates — the
/// row/column/point is resolved against whichever chunk contains that
/// point.
#[derive(Debug, Clone)]
pub struct WorkerRequest {
    pub request_id: u64,
    pub cx: i64,
    pub cy: i64,
    pub mode: ChunkMode,
}

/// Everything a worker's channel can carry. Invalidation rides the same
/// channel as generation requests so a worker never needs to poll two
/// queues.
#[derive(Debug, Clone)]
pub enum WorkerJob {
    Generate(WorkerRequest),
    Invalidate { cx: i64, cy: i64 },
}

#[derive(Debug, Clone)]
pub enum WorkerPayload {
    Chunk(Chunk),
    Row(Vec<Tile>),
    Column(Vec<Tile>),
    Point(Tile),
}

#[derive(Debug, Clone)]
pub struct WorkerResponse {
    pub request_id: u64,
    pub result: Result<WorkerPayload, String>,
}

#[derive(Clone)]
pub struct ChunkWorkerHandle {
    pub sender: Sender<WorkerJob>,
}

struct WorkerState {
    seed: u32,
    engine: NoiseEngine,
    cache: LruCache<String, Chunk>,
}

/// Spawns `count` long-lived OS threads, each owning its own bounded LRU.
/// Workers never share memory with the orchestrator or each other; all
/// communication is through `flume` channels, the same discipline the
/// teacher's `ChunkWorker` uses.
///
/// # Panics
/// - a worker thread fails to spawn (fatal: the pool is unusable).
pub fn spawn_pool(count: usize, seed: u32, response_tx: &Sender<WorkerResponse>) -> Vec<ChunkWorkerHandle> {
    (0..count)
        .map(|i| spawn_worker(i, seed, response_tx.clone()))
        .collect()
}

fn spawn_worker(index: usize, seed: u32, response_tx: Sender<WorkerResponse>) -> ChunkWorkerHandle {
    let (tx, rx) = flume::unbounded();
    let name = format!("chunk-worker-{index}");

    std::thread::Builder::new()
        .name(name.clone())
        .spawn(move || run_worker(&name, seed, &rx, &response_tx))
        .expect("failed to spawn chunk worker thread");

    ChunkWorkerHandle { sender: tx }
}

fn run_worker(name: &str, seed: u32, rx: &Receiver<WorkerJob>, tx: &Sender<WorkerResponse>) {
    let mut state = WorkerState {
        seed,
        engine: NoiseEngine::new(seed),
        cache: LruCache::new(NonZeroUsize::new(WORKER_LRU_CAPACITY).unwrap()),
    };

    while let Ok(job) = rx.recv() {
        match job {
            WorkerJob::Generate(request) => {
                let response = handle_request(&mut state, &request);
                trace!(target: "chunk::worker", worker = name, request_id = request.request_id, "handled chunk request");

                if tx.send(response).is_err() {
                    warn!(target: "chunk::worker", worker = name, "orchestrator dropped its response channel");
                    break;
                }
            }
            WorkerJob::Invalidate { cx, cy } => {
                state.cache.pop(&chunk_key(cx, cy));
                trace!(target: "chunk::worker", worker = name, cx, cy, "purged local lru entry");
            }
        }
    }
}

fn handle_request(state: &mut WorkerState, request: &WorkerRequest) -> WorkerResponse {
    let (ccx, ccy) = match request.mode {
        ChunkMode::Chunk => (request.cx, request.cy),
        ChunkMode::Row | ChunkMode::Column | ChunkMode::Point => world_to_chunk(request.cx, request.cy),
    };

    let chunk = chunk_for(state, ccx, ccy);

    let payload = match request.mode {
        ChunkMode::Chunk => Ok(WorkerPayload::Chunk(chunk)),
        ChunkMode::Row => extract_row(&chunk, request.cy).map(WorkerPayload::Row),
        ChunkMode::Column => extract_column(&chunk, request.cx).map(WorkerPayload::Column),
        ChunkMode::Point => extract_point(&chunk, request.cx, request.cy).map(WorkerPayload::Point),
    };

    WorkerResponse {
        request_id: request.request_id,
        result: payload,
    }
}

fn chunk_for(state: &mut WorkerState, cx: i64, cy: i64) -> Chunk {
    let key = chunk_key(cx, cy);

    if let Some(cached) = state.cache.get(&key) {
        return cached.clone();
    }

    let chunk = terrain::generate(&state.engine, state.seed, cx, cy);
    state.cache.put(key, chunk.clone());
    chunk
}

/// Maps a world coordinate to its containing chunk, using non-negative
/// modulus (Rust's `/`/`%` truncate toward zero, which is wrong for
/// negative coordinates).
#[must_use]
pub fn world_to_chunk(wx: i64, wy: i64) -> (i64, i64) {
    let size = CHUNK_SIZE as i64;
    (wx.div_euclid(size), wy.div_euclid(size))
}

fn extract_row(chunk: &Chunk, wy: i64) -> Result<Vec<Tile>, String> {
    let (_, ly) = local_offset(chunk, 0, wy);
    let row: Vec<Tile> = (0..CHUNK_SIZE)
        .filter_map(|lx| chunk.tile_at(lx, ly).cloned())
        .collect();

    if row.len() == CHUNK_SIZE {
        Ok(row)
    } else {
        Err("row extraction out of bounds".to_owned())
    }
}

fn extract_column(chunk: &Chunk, wx: i64) -> Result<Vec<Tile>, String> {
    let (lx, _) = local_offset(chunk, wx, 0);
    let column: Vec<Tile> = (0..CHUNK_SIZE)
        .filter_map(|ly| chunk.tile_at(lx, ly).cloned())
        .collect();

    if column.len() == CHUNK_SIZE {
        Ok(column)
    } else {
        Err("column extraction out of bounds".to_owned())
    }
}

fn extract_point(chunk: &Chunk, wx: i64, wy: i64) -> Result<Tile, String> {
    chunk
        .tile_at_world(wx, wy)
        .cloned()
        .ok_or_else(|| "point extraction out of bounds".to_owned())
}

fn local_offset(chunk: &Chunk, wx: i64, wy: i64) -> (usize, usize) {
    let (ox, oy) = chunk.origin();
    ((wx - ox).rem_euclid(CHUNK_SIZE as i64) as usize, (wy - oy).rem_euclid(CHUNK_SIZE as i64) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_to_chunk_handles_negative_coordinates() {
        assert_eq!(world_to_chunk(0, 0), (0, 0));
        assert_eq!(world_to_chunk(9, 9), (0, 0));
        assert_eq!(world_to_chunk(10, 0), (1, 0));
        assert_eq!(world_to_chunk(-1, -1), (-1, -1));
        assert_eq!(world_to_chunk(-10, 0), (-1, 0));
    }

    #[test]
    fn chunk_mode_round_trips_full_grid() {
        let (tx, rx) = flume::unbounded();
        let handles = spawn_pool(1, 12345, &tx);

        handles[0]
            .sender
            .send(WorkerJob::Generate(WorkerRequest {
                request_id: 1,
                cx: 0,
                cy: 0,
                mode: ChunkMode::Chunk,
            }))
            .unwrap();

        let response = rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap();
        assert_eq!(response.request_id, 1);
        match response.result.unwrap() {
            WorkerPayload::Chunk(chunk) => assert_eq!(chunk.tiles.len(), CHUNK_SIZE * CHUNK_SIZE),
            _ => panic!("expected a chunk payload"),
        }
    }

    #[test]
    fn point_mode_returns_the_requested_tile() {
        let (tx, rx) = flume::unbounded();
        let handles = spawn_pool(1, 12345, &tx);

        handles[0]
            .sender
            .send(WorkerJob::Generate(WorkerRequest {
                request_id: 7,
                cx: 23,
                cy: -4,
                mode: ChunkMode::Point,
            }))
            .unwrap();

        let response = rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap();
        match response.result.unwrap() {
            WorkerPayload::Point(tile) => {
                assert_eq!(tile.x, 23);
                assert_eq!(tile.y, -4);
            }
            _ => panic!("expected a point payload"),
        }
    }
}
