use std::collections::HashMap;
use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

/// Item id -> "is target category". Ids missing from the map are
/// unclassifiable, which is not the same as `false`.
pub type ClassificationResultMap = HashMap<String, bool>;

// Object style note:
// A classifier sees a whole user media directory at once, never single items.
// Implementations receive the directory path and label every file in it by
// file name (which is the feed item id). They should not write into the
// directory; persistence owns it.

#[async_trait]
pub trait Classifier: Send + Sync {
    /// Human-readable name, used in logs.
    fn classifier_name(&self) -> String;

    /// Label the current contents of `media_dir`.
    async fn classify(&self, media_dir: &Path) -> Result<ClassificationResultMap>;
}

/// Lists the regular files directly inside `dir` by file name, sorted.
/// A missing directory yields an empty list.
pub async fn list_media_files(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
        Err(e) => return Err(e.into()),
    };
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_owned());
        }
    }
    names.sort();
    Ok(names)
}
