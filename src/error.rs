use thiserror::Error;

/// Error taxonomy for the chunk fulfillment pipeline.
///
/// Variants are matched at the session boundary to pick the right wire
/// reply; anything that merely needs `?` propagation elsewhere in the crate
/// should keep using `anyhow::Result` instead of growing this enum.
#[derive(Debug, Error, Clone)]
pub enum ChunkError {
    #[error("Invalid request parameters")]
    InvalidRequest,

    #[error("generation timed out")]
    GenerationTimeout,

    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("worker crashed: {0}")]
    WorkerCrash(String),

    #[error("bus delivery failed: {0}")]
    BusDeliveryFailure(String),

    #[error("mining failed")]
    MiningMiss,
}
