use crate::types::{PipelineError, Result};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Result of trying to take ownership of a media path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// We created the (empty) file and are responsible for filling it.
    Claimed,
    /// Something already existed at the path.
    AlreadyExists,
}

/// On-disk layout: `<root>/<user_id>/<item_id>`.
///
/// File presence is the durable "already persisted" record. Nothing here
/// keeps in-memory state, so several stores (or processes) may point at the
/// same root.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one user's media. Classification reads exactly
    /// this path, persistence writes under it.
    pub fn user_media_dir(&self, user_id: &str) -> Result<PathBuf> {
        Ok(self.root.join(path_component(user_id)?))
    }

    pub fn media_path(&self, user_id: &str, item_id: &str) -> Result<PathBuf> {
        Ok(self.user_media_dir(user_id)?.join(path_component(item_id)?))
    }

    /// Creates the user directory and its parents. Succeeds if it exists.
    pub async fn ensure_user_dir(&self, user_id: &str) -> Result<PathBuf> {
        let dir = self.user_media_dir(user_id)?;
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Atomically creates `path` if absent. A single create-exclusive open,
    /// so two racing claimers can never both see `Claimed`.
    pub async fn claim(path: &Path) -> Result<ClaimOutcome> {
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
        {
            Ok(_) => {
                debug!("Claimed {}", path.display());
                Ok(ClaimOutcome::Claimed)
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(ClaimOutcome::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    /// Ids of the media currently persisted for `user_id`.
    pub async fn list_media_ids(&self, user_id: &str) -> Result<Vec<String>> {
        let dir = self.user_media_dir(user_id)?;
        interfaces::defs::list_media_files(&dir)
            .await
            .map_err(|e| PipelineError::General(format!("Listing {} failed: {:#}", dir.display(), e)))
    }
}

/// Accepts only a single normal path component, so ids can never address
/// anything outside their directory.
fn path_component(value: &str) -> Result<&str> {
    let mut components = Path::new(value).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(c)), None) if c == value => Ok(value),
        _ => Err(PipelineError::InvalidPathComponent {
            value: value.to_string(),
        }),
    }
}
