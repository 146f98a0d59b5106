use crate::types::{FetchConfig, PipelineError, Result, STANDARD_RESOLUTION};
use serde_json::Value;
use std::env;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// Key of the bootstrap file: `{"instagramUserId": 1233434543534}`.
pub const USER_ID_KEY: &str = "instagramUserId";

pub const DEFAULT_MEDIA_ROOT: &str = "saved_data";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Parent of every per-user media directory.
    pub media_root: PathBuf,
    pub fetch: FetchConfig,
    /// Persistence attempts allowed in flight at once. 1 means sequential.
    pub max_concurrent_persists: usize,
    /// Image resolution key to persist.
    pub image_resolution: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            media_root: PathBuf::from(DEFAULT_MEDIA_ROOT),
            fetch: FetchConfig::default(),
            max_concurrent_persists: 1,
            image_resolution: STANDARD_RESOLUTION.to_string(),
        }
    }
}

impl PipelineConfig {
    /// Defaults overridden by `FEED_MEDIA_ROOT`, `FEED_MAX_CONCURRENT_PERSISTS`,
    /// `FEED_FETCH_TIMEOUT_SECS` and `FEED_FETCH_MAX_RETRIES`.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(root) = env::var("FEED_MEDIA_ROOT") {
            if !root.trim().is_empty() {
                config.media_root = PathBuf::from(root);
            }
        }
        config.max_concurrent_persists =
            env_parse("FEED_MAX_CONCURRENT_PERSISTS").unwrap_or(config.max_concurrent_persists).max(1);
        config.fetch.timeout_seconds =
            env_parse("FEED_FETCH_TIMEOUT_SECS").unwrap_or(config.fetch.timeout_seconds);
        config.fetch.max_retries = env_parse("FEED_FETCH_MAX_RETRIES").unwrap_or(config.fetch.max_retries);

        debug!("Pipeline config: {:?}", config);
        config
    }

    pub fn with_media_root(mut self, media_root: impl Into<PathBuf>) -> Self {
        self.media_root = media_root.into();
        self
    }

    pub fn with_max_concurrent_persists(mut self, n: usize) -> Self {
        self.max_concurrent_persists = n.max(1);
        self
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// Reads the numeric user id from a bootstrap JSON file.
///
/// Unreadable or unparsable file, or JSON that is not an object with an
/// integer id -> [`PipelineError::ConfigLoad`]. Missing key ->
/// [`PipelineError::ConfigKey`]. Other I/O errors pass through unchanged.
pub fn load_instagram_user_id(path: &Path) -> Result<u64> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(PipelineError::ConfigLoad(format!("{}: {}", path.display(), e)))
        }
        Err(e) if e.kind() == ErrorKind::InvalidData => {
            return Err(PipelineError::ConfigLoad(format!("{}: {}", path.display(), e)))
        }
        Err(e) => return Err(PipelineError::Io(e)),
    };

    let data: Value = serde_json::from_str(&content)
        .map_err(|e| PipelineError::ConfigLoad(format!("{}: {}", path.display(), e)))?;

    if !data.is_object() {
        return Err(PipelineError::ConfigLoad(format!(
            "{}: expected a JSON object",
            path.display()
        )));
    }

    let value = data.get(USER_ID_KEY).ok_or_else(|| PipelineError::ConfigKey {
        key: USER_ID_KEY.to_string(),
    })?;

    value.as_u64().ok_or_else(|| {
        PipelineError::ConfigLoad(format!(
            "{}: `{}` must be a non-negative integer, got {}",
            path.display(),
            USER_ID_KEY,
            value
        ))
    })
}
