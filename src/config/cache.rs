use anyhow::Result;

use super::env_or;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub redis_url: String,
    pub chunk_ttl_secs: u64,
    pub player_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379/3".to_owned(),
            chunk_ttl_secs: 3600,
            player_ttl_secs: 3600,
        }
    }
}

impl CacheConfig {
    /// # Errors
    /// - `REDIS_URL` is set but empty.
    pub fn from_env() -> Result<Self> {
        let default = Self::default();
        let mut redis_url = env_or("REDIS_URL", default.redis_url)?;
        if redis_url.is_empty() {
            anyhow::bail!("REDIS_URL must not be empty");
        }

        if let Ok(db) = std::env::var("REDIS_DB") {
            if !db.is_empty() {
                redis_url = with_redis_db(&redis_url, &db);
            }
        }

        Ok(Self {
            redis_url,
            ..default
        })
    }
}

/// Overrides the database-index segment of a `redis://` URL with `db`,
/// appending one if the URL carries no path yet. `REDIS_DB` is a thinner
/// knob than `REDIS_URL` for swapping just the database index without
/// restating host and port.
fn with_redis_db(url: &str, db: &str) -> String {
    match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            match rest.rfind('/') {
                Some(rel_idx) => format!("{}/{db}", &url[..scheme_end + 3 + rel_idx]),
                None => format!("{}/{db}", url.trim_end_matches('/')),
            }
        }
        None => format!("{}/{db}", url.trim_end_matches('/')),
    }
}
