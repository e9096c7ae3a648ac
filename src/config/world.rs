use anyhow::Result;

use super::env_or;

#[derive(Debug, Clone, Copy)]
pub struct WorldConfig {
    pub seed: u32,
}

impl Default for WorldConfig {
    fn default() -> Self { Self { seed: 12345 } }
}

impl WorldConfig {
    /// # Errors
    /// - `WORLD_SEED` is set but not a valid `u32`.
    pub fn from_env() -> Result<Self> {
        let default = Self::default();
        Ok(Self {
            seed: env_or("WORLD_SEED", default.seed)?,
        })
    }
}
