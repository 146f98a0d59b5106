use crate::storage::{ClaimOutcome, MediaStore};
use crate::traits::MediaFetcher;
use crate::types::{FeedItem, PersistError, PersistOutcome, PipelineError, STANDARD_RESOLUTION};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Ensures an item's media exists on disk exactly once.
///
/// Re-running over the same items is safe: existing files are never
/// refetched, and two concurrent attempts for one id settle on a single
/// fetch through [`MediaStore::claim`].
///
/// Known gap: if the fetch fails after the claim, the empty or partial file
/// stays behind and later attempts report it as [`PersistOutcome::AlreadyPresent`].
pub struct MediaPersister {
    store: MediaStore,
    fetcher: Arc<dyn MediaFetcher>,
    resolution: String,
}

impl MediaPersister {
    pub fn new(store: MediaStore, fetcher: Arc<dyn MediaFetcher>) -> Self {
        Self {
            store,
            fetcher,
            resolution: STANDARD_RESOLUTION.to_string(),
        }
    }

    /// Persist a different image resolution instead of the standard one.
    pub fn with_resolution(mut self, resolution: impl Into<String>) -> Self {
        self.resolution = resolution.into();
        self
    }

    pub fn store(&self) -> &MediaStore {
        &self.store
    }

    pub async fn persist(&self, item: &mut FeedItem) -> Result<PersistOutcome, PersistError> {
        let outcome = if item.is_video() {
            self.persist_video(item).await?
        } else {
            self.persist_image(item).await?
        };
        item.mark_media_saved();
        Ok(outcome)
    }

    async fn persist_video(&self, item: &FeedItem) -> Result<PersistOutcome, PersistError> {
        Err(PersistError::VideoNotImplemented {
            id: item.id().to_string(),
        })
    }

    async fn persist_image(&self, item: &mut FeedItem) -> Result<PersistOutcome, PersistError> {
        let id = item.id().to_string();

        let url = match item.image_url(&self.resolution) {
            Some(url) => url.to_string(),
            None => {
                return Err(PersistError::MediaFieldMissing {
                    id,
                    field: format!("images.{}.url", self.resolution),
                })
            }
        };

        let failure = |path: PathBuf, source: PipelineError| PersistError::Failure {
            id: id.clone(),
            path,
            source: Box::new(source),
        };

        // An unusable user id still counts as an attempt, recorded at the root
        let user_dir = match self.store.user_media_dir(item.user_id()) {
            Ok(dir) => dir,
            Err(e) => {
                let root = self.store.root().to_path_buf();
                item.set_user_media_path(root.clone());
                return Err(failure(root, e));
            }
        };
        item.set_user_media_path(user_dir.clone());

        self.store
            .ensure_user_dir(item.user_id())
            .await
            .map_err(|e| failure(user_dir.clone(), e))?;

        let path = self
            .store
            .media_path(item.user_id(), &id)
            .map_err(|e| failure(user_dir.clone(), e))?;

        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {
                debug!("Media for {} already at {}, skipping fetch", id, path.display());
                return Ok(PersistOutcome::AlreadyPresent);
            }
            Ok(_) => {
                let err = PipelineError::General("target exists and is not a regular file".to_string());
                return Err(failure(path, err));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(failure(path, e.into())),
        }

        match MediaStore::claim(&path).await {
            Ok(ClaimOutcome::Claimed) => {}
            Ok(ClaimOutcome::AlreadyExists) => {
                info!("File {} already exists, skip saving", path.display());
                return Ok(PersistOutcome::ClaimedElsewhere);
            }
            Err(e) => return Err(failure(path, e)),
        }

        match self.fetcher.fetch_to_path(&url, &path).await {
            Ok(bytes) => Ok(PersistOutcome::Downloaded { bytes }),
            Err(e) => {
                // The claimed file is left in place on purpose; see type docs
                warn!("Fetch for {} failed after claim, leaving {}", id, path.display());
                Err(failure(path, e))
            }
        }
    }
}
