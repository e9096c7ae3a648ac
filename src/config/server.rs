use anyhow::Result;

use super::env_or;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub worker_pool_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 15432,
            worker_pool_size: 8,
        }
    }
}

impl ServerConfig {
    /// # Errors
    /// - `PORT` or `WORKER_POOL_SIZE` is set but not parseable.
    pub fn from_env() -> Result<Self> {
        let default = Self::default();
        Ok(Self {
            port: env_or("PORT", default.port)?,
            worker_pool_size: env_or("WORKER_POOL_SIZE", default.worker_pool_size)?,
        })
    }
}
