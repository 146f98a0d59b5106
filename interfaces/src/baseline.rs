use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use crate::defs::ClassificationResultMap;
use crate::defs::Classifier;
use crate::defs::list_media_files;

/// Labels every file in the directory as target category.
pub struct BaselineClassifier;

#[async_trait]
impl Classifier for BaselineClassifier {
    fn classifier_name(&self) -> String {
        "baseline".to_owned()
    }

    async fn classify(&self, media_dir: &Path) -> Result<ClassificationResultMap> {
        let names = list_media_files(media_dir).await?;
        Ok(names.into_iter().map(|name| (name, true)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn labels_every_regular_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        tokio::fs::write(dir.path().join("a"), b"x").await?;
        tokio::fs::write(dir.path().join("b"), b"y").await?;
        tokio::fs::create_dir(dir.path().join("nested")).await?;

        let result = BaselineClassifier.classify(dir.path()).await?;
        assert_eq!(result.len(), 2);
        assert_eq!(result.get("a"), Some(&true));
        assert_eq!(result.get("b"), Some(&true));
        assert!(!result.contains_key("nested"));
        Ok(())
    }

    #[tokio::test]
    async fn missing_directory_is_empty() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let result = BaselineClassifier.classify(&dir.path().join("nope")).await?;
        assert!(result.is_empty());
        Ok(())
    }
}
