use crate::config::PipelineConfig;
use crate::correlator::ClassificationCorrelator;
use crate::fetcher::Fetcher;
use crate::parser::ItemNormalizer;
use crate::persist::MediaPersister;
use crate::storage::MediaStore;
use crate::traits::MediaFetcher;
use crate::types::{Classifier, FeedItem, PersistError, PersistOutcome, Result};
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Per-run counters. Every input record lands in exactly one bucket:
/// skipped video, missing media, failed, rejected, mismatched or selected.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub user_id: String,
    pub records: usize,
    pub persisted: usize,
    pub downloaded: usize,
    pub already_present: usize,
    pub skipped_videos: usize,
    pub missing_media: usize,
    pub failed: usize,
    pub rejected: usize,
    pub mismatched_ids: Vec<String>,
    pub selected: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct PipelineRun {
    pub items: Vec<FeedItem>,
    pub report: RunReport,
}

/// Feed batch -> persisted media -> classified subset.
pub struct FeedPipeline {
    config: PipelineConfig,
    persister: MediaPersister,
    correlator: ClassificationCorrelator,
}

impl FeedPipeline {
    pub fn new(
        config: PipelineConfig,
        fetcher: Arc<dyn MediaFetcher>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        let store = MediaStore::new(config.media_root.clone());
        let persister = MediaPersister::new(store.clone(), fetcher)
            .with_resolution(config.image_resolution.clone());
        let correlator = ClassificationCorrelator::new(classifier, store);

        Self {
            config,
            persister,
            correlator,
        }
    }

    /// Pipeline with the HTTP fetcher built from `config.fetch`.
    pub fn with_http_fetcher(config: PipelineConfig, classifier: Arc<dyn Classifier>) -> Result<Self> {
        let fetcher = Arc::new(Fetcher::new(config.fetch.clone())?);
        Ok(Self::new(config, fetcher, classifier))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &MediaStore {
        self.persister.store()
    }

    /// Items from `raw_records` whose media is persisted and classified as
    /// target category, in input order.
    ///
    /// Fails on the first malformed record (before anything is persisted) and
    /// when the classifier fails. Per-item persistence problems are logged
    /// and only drop that item.
    pub async fn run(&self, user_id: &str, raw_records: &[Value]) -> Result<Vec<FeedItem>> {
        Ok(self.run_with_report(user_id, raw_records).await?.items)
    }

    pub async fn run_with_report(&self, user_id: &str, raw_records: &[Value]) -> Result<PipelineRun> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", %run_id, user_id);
        self.execute(run_id, user_id, raw_records).instrument(span).await
    }

    async fn execute(&self, run_id: Uuid, user_id: &str, raw_records: &[Value]) -> Result<PipelineRun> {
        let started_at = Utc::now();
        info!("Processing {} feed records for user {}", raw_records.len(), user_id);

        let items = ItemNormalizer::normalize_batch(raw_records)?;

        for item in items.iter().filter(|item| item.user_id() != user_id) {
            warn!(
                "Item {} belongs to user {}, its media will not be in the classified directory",
                item.id(),
                item.user_id()
            );
        }

        let mut report = RunReport {
            run_id,
            user_id: user_id.to_string(),
            records: raw_records.len(),
            persisted: 0,
            downloaded: 0,
            already_present: 0,
            skipped_videos: 0,
            missing_media: 0,
            failed: 0,
            rejected: 0,
            mismatched_ids: Vec::new(),
            selected: 0,
            started_at,
            finished_at: started_at,
        };

        // Order preserving; classification waits for every attempt below
        let attempts: Vec<(FeedItem, std::result::Result<PersistOutcome, PersistError>)> =
            stream::iter(items.into_iter().map(|mut item| async move {
                let result = self.persister.persist(&mut item).await;
                (item, result)
            }))
            .buffered(self.config.max_concurrent_persists.max(1))
            .collect()
            .await;

        let mut persisted = Vec::with_capacity(attempts.len());
        for (item, result) in attempts {
            match result {
                Ok(outcome) => {
                    match outcome {
                        PersistOutcome::Downloaded { .. } => report.downloaded += 1,
                        PersistOutcome::AlreadyPresent | PersistOutcome::ClaimedElsewhere => {
                            report.already_present += 1
                        }
                    }
                    persisted.push(item);
                }
                Err(e) if e.is_not_implemented() => {
                    info!("Skipping item {}: {}", e.item_id(), e);
                    report.skipped_videos += 1;
                }
                Err(e @ PersistError::MediaFieldMissing { .. }) => {
                    warn!("Save media error: {}", e);
                    report.missing_media += 1;
                }
                Err(e) => {
                    error!("Save media error: {}", e);
                    report.failed += 1;
                }
            }
        }
        persisted.retain(FeedItem::is_media_saved);
        report.persisted = persisted.len();

        let labels = self.correlator.classify(user_id).await?;
        let correlation = ClassificationCorrelator::correlate_detailed(persisted, &labels);

        report.rejected = correlation.rejected;
        report.mismatched_ids = correlation.mismatched_ids;
        report.selected = correlation.selected.len();
        report.finished_at = Utc::now();

        info!(
            "Run finished: {} records, {} persisted, {} selected, {} rejected, {} mismatched",
            report.records,
            report.persisted,
            report.selected,
            report.rejected,
            report.mismatched_ids.len()
        );

        Ok(PipelineRun {
            items: correlation.selected,
            report,
        })
    }
}
