use crate::storage::MediaStore;
use crate::types::{ClassificationResultMap, Classifier, FeedItem, PipelineError, Result};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Outcome of joining persisted items against one classification result.
#[derive(Debug, Default)]
pub struct Correlation {
    /// Items labelled as target category, in input order.
    pub selected: Vec<FeedItem>,
    /// Ids the classifier said nothing about.
    pub mismatched_ids: Vec<String>,
    /// Items labelled as not target category.
    pub rejected: usize,
}

/// Runs the classifier over a user's media directory and joins the result
/// back onto items by id.
pub struct ClassificationCorrelator {
    classifier: Arc<dyn Classifier>,
    store: MediaStore,
}

impl ClassificationCorrelator {
    pub fn new(classifier: Arc<dyn Classifier>, store: MediaStore) -> Self {
        Self { classifier, store }
    }

    pub fn classifier_name(&self) -> String {
        self.classifier.classifier_name()
    }

    /// One classifier call for the whole user directory. No retries; any
    /// classifier error is returned as-is.
    pub async fn classify(&self, user_id: &str) -> Result<ClassificationResultMap> {
        let media_dir = self.store.user_media_dir(user_id)?;
        info!(
            "Classifying {} with {}",
            media_dir.display(),
            self.classifier.classifier_name()
        );

        let result = self
            .classifier
            .classify(&media_dir)
            .await
            .map_err(PipelineError::Classification)?;

        debug!("Classifier returned {} labels for user {}", result.len(), user_id);
        Ok(result)
    }

    pub fn correlate(items: Vec<FeedItem>, result: &ClassificationResultMap) -> Vec<FeedItem> {
        Self::correlate_detailed(items, result).selected
    }

    pub fn correlate_detailed(items: Vec<FeedItem>, result: &ClassificationResultMap) -> Correlation {
        let mut correlation = Correlation::default();

        for item in items {
            match result.get(item.id()) {
                Some(true) => correlation.selected.push(item),
                Some(false) => correlation.rejected += 1,
                None => {
                    warn!("Classification mismatch, id: {}", item.id());
                    correlation.mismatched_ids.push(item.id().to_string());
                }
            }
        }

        correlation
    }
}
