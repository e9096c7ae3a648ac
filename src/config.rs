mod cache;
mod server;
mod store;
mod world;

use anyhow::Result;

pub use self::{cache::*, server::*, store::*, world::*};

/// Process-wide configuration, assembled from environment variables.
///
/// Unlike a file-backed config this has no serialize/deserialize round
/// trip to preserve: each sub-config reads its own variables and falls
/// back to the documented default when unset.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub world: WorldConfig,
    pub cache: CacheConfig,
    pub store: StoreConfig,
}

impl Config {
    /// Loads `.env` (if present) then reads the process environment.
    ///
    /// # Errors
    /// - A set variable fails to parse into its expected type.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            server: ServerConfig::from_env()?,
            world: WorldConfig::from_env()?,
            cache: CacheConfig::from_env()?,
            store: StoreConfig::from_env()?,
        })
    }
}

/// Reads an environment variable, falling back to `default`, and parses it.
pub(crate) fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key}: {e}")),
        Err(_) => Ok(default),
    }
}
