#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_sign_loss)]

#[macro_use]
extern crate tracing;

pub mod config;
pub mod error;
pub mod mining;
pub mod noise;
pub mod orchestrator;
pub mod persistence;
pub mod players;
pub mod session;
pub mod terrain;
pub mod worker;

/// Edge length of a chunk, in tiles. Exposed on the wire; changing it is a
/// protocol break.
pub const CHUNK_SIZE: usize = 10;

/// Sea level in normalized height space.
pub const SEA_LEVEL: f64 = 0.4;

/// Steepness above which a tile never receives a resource.
pub const STEEP_CUTOFF: f64 = 0.8;

/// Steepness above which mined resources get harder.
pub const STEEP_HARDNESS_CUTOFF: f64 = 0.6;

/// Hardness penalty applied above [`STEEP_HARDNESS_CUTOFF`].
pub const STEEP_HARDNESS_DIFFICULTY: f64 = 0.15;

/// Upper bound on how long the orchestrator will let a single chunk request
/// run before the sweeper fails it.
pub const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(15);

/// How often the pending-request sweeper runs.
pub const SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);
