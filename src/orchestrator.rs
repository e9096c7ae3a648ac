//! Fulfillment orchestrator (component E): dedup → cache → store → worker
//! dispatch, with per-call timeouts and a sweeper backstop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use flume::Receiver;
use tokio::sync::{broadcast, oneshot, Mutex};

use crate::error::ChunkError;
use crate::persistence::Store;
use crate::players::Hub;
use crate::terrain::chunk::{chunk_key, Chunk};
use crate::worker::{ChunkMode, ChunkWorkerHandle, WorkerJob, WorkerPayload, WorkerRequest, WorkerResponse};
use crate::REQUEST_TIMEOUT;

struct PendingEntry {
    worker_index: usize,
    started_at: Instant,
    reply: oneshot::Sender<WorkerResponse>,
}

/// Owns the in-flight dedup registry, the pending-request registry, and
/// per-worker load counters. One instance per process, shared behind an
/// `Arc`.
pub struct Orchestrator {
    store: Arc<Store>,
    hub: Arc<Hub>,
    workers: Vec<ChunkWorkerHandle>,
    loads: Vec<AtomicUsize>,
    in_flight: Mutex<HashMap<String, broadcast::Sender<Result<Chunk, ChunkError>>>>,
    pending: Mutex<HashMap<u64, PendingEntry>>,
    next_request_id: AtomicU64,
}

impl Orchestrator {
    #[must_use]
    pub fn new(store: Arc<Store>, hub: Arc<Hub>, workers: Vec<ChunkWorkerHandle>) -> Arc<Self> {
        let loads = workers.iter().map(|_| AtomicUsize::new(0)).collect();

        Arc::new(Self {
            store,
            hub,
            workers,
            loads,
            in_flight: Mutex::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            next_request_id: AtomicU64::new(1),
        })
    }

    /// Public entry point for all four request modes.
    pub async fn fulfill(&self, cx: i64, cy: i64, mode: ChunkMode) -> Result<WorkerPayload, ChunkError> {
        match mode {
            ChunkMode::Chunk => self.fulfill_chunk(cx, cy).await.map(WorkerPayload::Chunk),
            ChunkMode::Row | ChunkMode::Column | ChunkMode::Point => self.dispatch(cx, cy, mode).await,
        }
    }

    async fn fulfill_chunk(&self, cx: i64, cy: i64) -> Result<Chunk, ChunkError> {
        let key = chunk_key(cx, cy);

        let existing = {
            let guard = self.in_flight.lock().await;
            guard.get(&key).map(broadcast::Sender::subscribe)
        };

        if let Some(mut rx) = existing {
            return rx
                .recv()
                .await
                .unwrap_or_else(|_| Err(ChunkError::WorkerCrash("in-flight producer vanished".to_owned())));
        }

        let (tx, _rx) = broadcast::channel(1);
        {
            let mut guard = self.in_flight.lock().await;
            guard.insert(key.clone(), tx.clone());
        }

        let result = self.fulfill_chunk_uncached(cx, cy).await;

        {
            let mut guard = self.in_flight.lock().await;
            guard.remove(&key);
        }
        let _ = tx.send(result.clone());

        result
    }

    async fn fulfill_chunk_uncached(&self, cx: i64, cy: i64) -> Result<Chunk, ChunkError> {
        let cached = match self.store.read(cx, cy).await {
            Ok(v) => v,
            Err(e) => {
                warn!(target: "orchestrator", cx, cy, error = %e, "store read failed, falling through to generation");
                None
            }
        };

        if let Some(chunk) = cached {
            return Ok(chunk);
        }

        let payload = self.dispatch(cx, cy, ChunkMode::Chunk).await?;
        let WorkerPayload::Chunk(chunk) = payload else {
            unreachable!("ChunkMode::Chunk always yields WorkerPayload::Chunk")
        };

        self.store.write(&chunk).await?;
        self.hub.invalidate_chunk(cx, cy).await;

        Ok(chunk)
    }

    /// Dispatches a single job to the least-loaded worker and awaits its
    /// reply, bounded by [`REQUEST_TIMEOUT`]. Used directly for the
    /// partial modes; used by [`Self::fulfill_chunk_uncached`] for the
    /// generation step of full chunks.
    async fn dispatch(&self, cx: i64, cy: i64, mode: ChunkMode) -> Result<WorkerPayload, ChunkError> {
        let idx = self.pick_worker();
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();

        self.loads[idx].fetch_add(1, Ordering::SeqCst);
        {
            let mut pending = self.pending.lock().await;
            pending.insert(
                request_id,
                PendingEntry {
                    worker_index: idx,
                    started_at: Instant::now(),
                    reply: reply_tx,
                },
            );
        }

        let request = WorkerRequest { request_id, cx, cy, mode };
        if self.workers[idx].sender.send(WorkerJob::Generate(request)).is_err() {
            self.complete_pending(request_id).await;
            return Err(ChunkError::WorkerCrash(format!("worker {idx} channel closed")));
        }

        match tokio::time::timeout(REQUEST_TIMEOUT, reply_rx).await {
            Ok(Ok(response)) => match response.result {
                Ok(payload) => Ok(payload),
                Err(msg) if msg == TIMEOUT_SENTINEL => Err(ChunkError::GenerationTimeout),
                Err(msg) => Err(ChunkError::WorkerCrash(msg)),
            },
            Ok(Err(_)) => Err(ChunkError::WorkerCrash(format!("worker {idx} dropped reply channel"))),
            Err(_) => {
                self.complete_pending(request_id).await;
                Err(ChunkError::GenerationTimeout)
            }
        }
    }

    fn pick_worker(&self) -> usize {
        self.loads
            .iter()
            .enumerate()
            .min_by_key(|(_, load)| load.load(Ordering::SeqCst))
            .map_or(0, |(idx, _)| idx)
    }

    /// Removes a pending entry and decrements its worker's load, if it is
    /// still present. Whichever of {reply listener, timeout branch,
    /// sweeper} wins the race to remove it is the one that accounts for
    /// it — the others see `None` and do nothing, so the load counter is
    /// adjusted exactly once per request.
    async fn complete_pending(&self, request_id: u64) -> Option<PendingEntry> {
        let entry = {
            let mut pending = self.pending.lock().await;
            pending.remove(&request_id)
        };

        if let Some(entry) = &entry {
            self.loads[entry.worker_index].fetch_sub(1, Ordering::SeqCst);
        }

        entry
    }

    /// Background task: drains worker responses and rendezvous them with
    /// their waiting callers via the pending registry.
    pub async fn run_response_listener(self: Arc<Self>, responses: Receiver<WorkerResponse>) {
        while let Ok(response) = responses.recv_async().await {
            if let Some(entry) = self.complete_pending(response.request_id).await {
                let _ = entry.reply.send(response);
            }
        }
    }

    /// Background task: every [`crate::SWEEP_INTERVAL`], fails any pending
    /// request older than [`REQUEST_TIMEOUT`]. Guards against requests
    /// whose awaiting future was dropped (e.g. the owning session closed)
    /// before the per-call `tokio::time::timeout` could fire on its own.
    pub async fn run_sweeper(self: Arc<Self>) {
        let mut interval = tokio::time::interval(crate::SWEEP_INTERVAL);
        loop {
            interval.tick().await;
            self.sweep_expired().await;
        }
    }

    async fn sweep_expired(&self) {
        let now = Instant::now();
        let expired: Vec<u64> = {
            let pending = self.pending.lock().await;
            pending
                .iter()
                .filter(|(_, e)| now.duration_since(e.started_at) > REQUEST_TIMEOUT)
                .map(|(id, _)| *id)
                .collect()
        };

        for request_id in expired {
            if let Some(entry) = self.complete_pending(request_id).await {
                warn!(target: "orchestrator", request_id, worker = entry.worker_index, "sweeping expired request");
                let _ = entry.reply.send(WorkerResponse {
                    request_id,
                    result: Err(TIMEOUT_SENTINEL.to_owned()),
                });
            }
        }
    }
}

/// Internal marker distinguishing a sweeper-induced timeout from a real
/// worker error string, both of which travel through the same
/// `Result<_, String>` field.
const TIMEOUT_SENTINEL: &str = "__sweeper_timeout__";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::worker;

    // Constructing a full `Orchestrator` needs live Redis/Postgres
    // connections, so these tests exercise the pure worker-selection and
    // pending-registry bookkeeping in isolation instead.

    #[test]
    fn pick_worker_chooses_lowest_load() {
        let loads = vec![AtomicUsize::new(3), AtomicUsize::new(0), AtomicUsize::new(5)];
        let idx = loads
            .iter()
            .enumerate()
            .min_by_key(|(_, load)| load.load(Ordering::SeqCst))
            .map_or(0, |(idx, _)| idx);
        assert_eq!(idx, 1);
    }

    #[tokio::test]
    async fn worker_dispatch_round_trips_a_chunk_payload() {
        let (tx, rx) = flume::unbounded();
        let handles = worker::spawn_pool(1, 12345, &tx);

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
        assert!(response.result.is_ok());
    }
}
