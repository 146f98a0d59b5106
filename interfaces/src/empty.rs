use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use crate::defs::ClassificationResultMap;
use crate::defs::Classifier;

pub struct EmptyClassifier;

#[async_trait]
impl Classifier for EmptyClassifier {
    fn classifier_name(&self) -> String {
        "empty".to_owned()
    }

    async fn classify(&self, _media_dir: &Path) -> Result<ClassificationResultMap> {
        // Nothing is recognised, so nothing can be selected.
        Ok(ClassificationResultMap::new())
    }
}
