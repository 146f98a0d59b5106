use crate::types::Result;
use async_trait::async_trait;
use std::path::Path;

/// Trait for pulling a media blob from a URL onto local disk
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Fetch `url` and write the body to `dest`, replacing whatever is there.
    /// Returns the number of bytes written.
    async fn fetch_to_path(&self, url: &str, dest: &Path) -> Result<u64>;
}
