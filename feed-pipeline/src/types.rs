use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
// Collaborator contracts shared with classifier implementations
pub use interfaces::defs::{ClassificationResultMap, Classifier};

/// Appended to an item's `link` to address its thumbnail.
pub const THUMBNAIL_SUFFIX: &str = "media";

/// Image resolution persisted for non-video items.
pub const STANDARD_RESOLUTION: &str = "standard_resolution";

/// One normalized feed entry.
///
/// Built only by [`crate::parser::ItemNormalizer`]. The persistence unit is
/// the only writer of `is_media_saved` and `user_media_path`.
#[derive(Debug, Clone, Serialize)]
pub struct FeedItem {
    id: String,
    link: String,
    thumbnail_link: String,
    is_video: bool,
    images: BTreeMap<String, String>,
    user_id: String,
    username: String,
    is_media_saved: bool,
    user_media_path: Option<PathBuf>,
}

impl FeedItem {
    pub(crate) fn new(
        id: String,
        link: String,
        is_video: bool,
        images: BTreeMap<String, String>,
        user_id: String,
        username: String,
    ) -> Self {
        let thumbnail_link = format!("{}{}", link, THUMBNAIL_SUFFIX);
        Self {
            id,
            link,
            thumbnail_link,
            is_video,
            images,
            user_id,
            username,
            is_media_saved: false,
            user_media_path: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn link(&self) -> &str {
        &self.link
    }

    pub fn thumbnail_link(&self) -> &str {
        &self.thumbnail_link
    }

    pub fn is_video(&self) -> bool {
        self.is_video
    }

    /// Resolution name -> URL. Empty for videos.
    pub fn images(&self) -> &BTreeMap<String, String> {
        &self.images
    }

    pub fn image_url(&self, resolution: &str) -> Option<&str> {
        self.images.get(resolution).map(String::as_str)
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn is_media_saved(&self) -> bool {
        self.is_media_saved
    }

    pub fn user_media_path(&self) -> Option<&Path> {
        self.user_media_path.as_deref()
    }

    pub(crate) fn mark_media_saved(&mut self) {
        self.is_media_saved = true;
    }

    pub(crate) fn set_user_media_path(&mut self, path: PathBuf) {
        self.user_media_path = Some(path);
    }
}

impl fmt::Display for FeedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}|{}", self.id, self.link, self.username)
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub max_media_size_mb: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Feed-Pipeline/1.0".to_string(),
            timeout_seconds: 30,
            max_retries: 2,
            retry_delay_ms: 500,
            max_media_size_mb: 50,
        }
    }
}

/// How a successful persistence attempt was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// This call claimed the path and wrote the media.
    Downloaded { bytes: u64 },
    /// A regular file was already there, nothing fetched.
    AlreadyPresent,
    /// Another attempt won the claim between the existence check and ours.
    ClaimedElsewhere,
}

/// Item-scoped persistence conditions. None of these abort a batch.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("Video persistence is not implemented (id: {id})")]
    VideoNotImplemented { id: String },

    #[error("Media field `{field}` missing (id: {id})")]
    MediaFieldMissing { id: String, field: String },

    #[error("Failed to persist media for {id} at {}: {source}", .path.display())]
    Failure {
        id: String,
        path: PathBuf,
        #[source]
        source: Box<PipelineError>,
    },
}

impl PersistError {
    /// True for the "feature intentionally absent" class.
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, PersistError::VideoNotImplemented { .. })
    }

    pub fn item_id(&self) -> &str {
        match self {
            PersistError::VideoNotImplemented { id }
            | PersistError::MediaFieldMissing { id, .. }
            | PersistError::Failure { id, .. } => id.as_str(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Malformed feed record: field `{field}` is missing or invalid")]
    MalformedRecord { field: String },

    #[error("Invalid config key: {key}")]
    ConfigKey { key: String },

    #[error("Failed to load config: {0}")]
    ConfigLoad(String),

    #[error("Classifier failed: {0:#}")]
    Classification(anyhow::Error),

    #[error("Invalid path component: {value:?}")]
    InvalidPathComponent { value: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("General error: {0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
