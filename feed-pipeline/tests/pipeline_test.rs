mod common;

use common::CountingFetcher;
use feed_pipeline::{
    ClassificationCorrelator, ClassificationResultMap, FeedPipeline, ItemNormalizer,
    MockClassifier, PipelineConfig, PipelineError, Result,
};
use interfaces::{BaselineClassifier, EmptyClassifier};
use serde_json::json;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const USER: &str = "42";

fn config(root: &Path) -> PipelineConfig {
    PipelineConfig::default().with_media_root(root)
}

fn ids(items: &[feed_pipeline::FeedItem]) -> Vec<&str> {
    items.iter().map(|item| item.id()).collect()
}

#[tokio::test]
async fn selects_only_target_images() -> Result<()> {
    common::init_tracing();
    let root = tempfile::tempdir()?;
    let fetcher = Arc::new(CountingFetcher::new(b"img"));
    let classifier = Arc::new(
        MockClassifier::new("fixed".to_string())
            .with_label("a", true)
            .with_label("c", false),
    );
    let pipeline = FeedPipeline::new(config(root.path()), fetcher.clone(), classifier.clone());

    let records = vec![
        common::image_record("a", USER),
        common::video_record("b", USER),
        common::image_record("c", USER),
    ];
    let run = pipeline.run_with_report(USER, &records).await?;

    assert_eq!(ids(&run.items), vec!["a"]);
    assert!(run.items[0].is_media_saved());
    assert_eq!(fetcher.calls(), 2);
    assert_eq!(classifier.call_count(), 1);

    let report = &run.report;
    assert_eq!(report.records, 3);
    assert_eq!(report.persisted, 2);
    assert_eq!(report.downloaded, 2);
    assert_eq!(report.skipped_videos, 1);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.selected, 1);
    assert!(report.mismatched_ids.is_empty());
    assert!(report.finished_at >= report.started_at);
    Ok(())
}

#[tokio::test]
async fn unclassified_ids_are_dropped() -> Result<()> {
    common::init_tracing();
    let root = tempfile::tempdir()?;
    let fetcher = Arc::new(CountingFetcher::new(b"img"));
    let classifier = Arc::new(MockClassifier::new("partial".to_string()).with_label("a", true));
    let pipeline = FeedPipeline::new(config(root.path()), fetcher, classifier);

    let records = vec![common::image_record("a", USER), common::image_record("c", USER)];
    let run = pipeline.run_with_report(USER, &records).await?;

    assert_eq!(ids(&run.items), vec!["a"]);
    assert_eq!(run.report.mismatched_ids, vec!["c".to_string()]);
    Ok(())
}

#[tokio::test]
async fn empty_classification_selects_nothing() -> Result<()> {
    common::init_tracing();
    let root = tempfile::tempdir()?;
    let fetcher = Arc::new(CountingFetcher::new(b"img"));
    let pipeline = FeedPipeline::new(config(root.path()), fetcher, Arc::new(EmptyClassifier));

    let records = vec![common::image_record("a", USER), common::image_record("b", USER)];
    let run = pipeline.run_with_report(USER, &records).await?;

    assert!(run.items.is_empty());
    assert_eq!(run.report.persisted, 2);
    assert_eq!(run.report.mismatched_ids.len(), 2);
    Ok(())
}

#[tokio::test]
async fn output_is_subset_in_input_order() -> Result<()> {
    common::init_tracing();
    let root = tempfile::tempdir()?;
    let fetcher = Arc::new(CountingFetcher::new(b"img").failing_for(common::image_url("p3")));
    let pipeline = FeedPipeline::new(config(root.path()), fetcher, Arc::new(BaselineClassifier));

    let input = ["p5", "p1", "p3", "p4", "p2"];
    let mut records: Vec<_> = input.iter().map(|id| common::image_record(id, USER)).collect();
    records.push(common::video_record("p6", USER));

    let items = pipeline.run(USER, &records).await?;

    let input_ids: HashSet<&str> = input.iter().copied().collect();
    assert!(ids(&items).iter().all(|id| input_ids.contains(id)));
    // p3 failed to fetch but its claimed file remains, so the baseline
    // classifier labels it too while the item itself is not persisted
    assert_eq!(ids(&items), vec!["p5", "p1", "p4", "p2"]);
    assert!(items.iter().all(|item| item.is_media_saved()));
    Ok(())
}

#[tokio::test]
async fn malformed_record_fails_before_any_persistence() -> Result<()> {
    common::init_tracing();
    let root = tempfile::tempdir()?;
    let fetcher = Arc::new(CountingFetcher::new(b"img"));
    let classifier = Arc::new(MockClassifier::new("unused".to_string()));
    let pipeline = FeedPipeline::new(config(root.path()), fetcher.clone(), classifier.clone());

    let records = vec![
        common::image_record("a", USER),
        json!({ "node": { "link": "https://example.com/p/x/", "user": { "id": USER, "username": "alice" } } }),
        common::image_record("c", USER),
    ];

    match pipeline.run(USER, &records).await {
        Err(PipelineError::MalformedRecord { field }) => assert_eq!(field, "node.id"),
        other => panic!("expected MalformedRecord, got {:?}", other),
    }
    assert_eq!(fetcher.calls(), 0);
    assert_eq!(classifier.call_count(), 0);
    assert!(!root.path().join(USER).exists());
    Ok(())
}

#[tokio::test]
async fn classifier_failure_is_fatal() -> Result<()> {
    common::init_tracing();
    let root = tempfile::tempdir()?;
    let fetcher = Arc::new(CountingFetcher::new(b"img"));
    let classifier = Arc::new(MockClassifier::new("broken".to_string()).failing("model not loaded"));
    let pipeline = FeedPipeline::new(config(root.path()), fetcher, classifier);

    let records = vec![common::image_record("a", USER)];
    match pipeline.run(USER, &records).await {
        Err(PipelineError::Classification(e)) => assert!(e.to_string().contains("model not loaded")),
        other => panic!("expected Classification error, got {:?}", other),
    }
    // Persistence already happened and stays
    assert!(root.path().join(USER).join("a").is_file());
    Ok(())
}

#[tokio::test]
async fn classifier_sees_the_directory_persistence_wrote() -> Result<()> {
    common::init_tracing();
    let root = tempfile::tempdir()?;
    let fetcher = Arc::new(CountingFetcher::new(b"img"));
    let classifier = Arc::new(MockClassifier::new("spy".to_string()).with_label("a", true));
    let pipeline = FeedPipeline::new(config(root.path()), fetcher, classifier.clone());

    let items = pipeline.run(USER, &[common::image_record("a", USER)]).await?;

    let expected = root.path().join(USER);
    assert_eq!(classifier.seen_dirs(), vec![expected.clone()]);
    assert_eq!(items[0].user_media_path(), Some(expected.as_path()));
    assert_eq!(pipeline.store().list_media_ids(USER).await?, vec!["a"]);
    Ok(())
}

#[tokio::test]
async fn rerun_does_not_refetch() -> Result<()> {
    common::init_tracing();
    let root = tempfile::tempdir()?;
    let fetcher = Arc::new(CountingFetcher::new(b"img"));
    let pipeline = FeedPipeline::new(config(root.path()), fetcher.clone(), Arc::new(BaselineClassifier));

    let records = vec![common::image_record("a", USER), common::image_record("b", USER)];
    let first = pipeline.run(USER, &records).await?;
    let second = pipeline.run_with_report(USER, &records).await?;

    assert_eq!(ids(&first), ids(&second.items));
    assert_eq!(fetcher.calls(), 2);
    assert_eq!(second.report.downloaded, 0);
    assert_eq!(second.report.already_present, 2);
    Ok(())
}

#[tokio::test]
async fn bounded_concurrency_keeps_order() -> Result<()> {
    common::init_tracing();
    let root = tempfile::tempdir()?;
    let fetcher = Arc::new(CountingFetcher::new(b"img").with_delay(Duration::from_millis(20)));
    let pipeline = FeedPipeline::new(
        config(root.path()).with_max_concurrent_persists(3),
        fetcher.clone(),
        Arc::new(BaselineClassifier),
    );

    let input: Vec<String> = (0..9).map(|n| format!("item{}", n)).collect();
    let records: Vec<_> = input.iter().map(|id| common::image_record(id, USER)).collect();

    let items = pipeline.run(USER, &records).await?;

    assert_eq!(ids(&items), input.iter().map(String::as_str).collect::<Vec<_>>());
    assert_eq!(fetcher.calls(), 9);
    assert!(fetcher.max_in_flight() <= 3);
    Ok(())
}

#[tokio::test]
async fn media_of_another_user_is_not_classified() -> Result<()> {
    common::init_tracing();
    let root = tempfile::tempdir()?;
    let fetcher = Arc::new(CountingFetcher::new(b"img"));
    let pipeline = FeedPipeline::new(config(root.path()), fetcher, Arc::new(BaselineClassifier));

    let records = vec![common::image_record("mine", USER), common::image_record("theirs", "7")];
    let run = pipeline.run_with_report(USER, &records).await?;

    assert_eq!(ids(&run.items), vec!["mine"]);
    assert_eq!(run.report.mismatched_ids, vec!["theirs".to_string()]);
    assert!(root.path().join("7").join("theirs").is_file());
    Ok(())
}

#[tokio::test]
async fn empty_batch_still_classifies_once() -> Result<()> {
    common::init_tracing();
    let root = tempfile::tempdir()?;
    let classifier = Arc::new(MockClassifier::new("idle".to_string()));
    let pipeline = FeedPipeline::new(
        config(root.path()),
        Arc::new(CountingFetcher::new(b"img")),
        classifier.clone(),
    );

    let items = pipeline.run(USER, &[]).await?;

    assert!(items.is_empty());
    assert_eq!(classifier.call_count(), 1);
    Ok(())
}

#[test]
fn correlation_keeps_order_and_splits_outcomes() -> Result<()> {
    common::init_tracing();
    let records: Vec<_> = ["w", "x", "y", "z"]
        .iter()
        .map(|id| common::image_record(id, USER))
        .collect();
    let items = ItemNormalizer::normalize_batch(&records)?;

    let mut labels = ClassificationResultMap::new();
    labels.insert("z".to_string(), true);
    labels.insert("x".to_string(), false);
    labels.insert("w".to_string(), true);
    labels.insert("unrelated".to_string(), true);

    let correlation = ClassificationCorrelator::correlate_detailed(items.clone(), &labels);
    assert_eq!(ids(&correlation.selected), vec!["w", "z"]);
    assert_eq!(correlation.mismatched_ids, vec!["y".to_string()]);
    assert_eq!(correlation.rejected, 1);

    let selected = ClassificationCorrelator::correlate(items, &labels);
    assert_eq!(ids(&selected), vec!["w", "z"]);
    Ok(())
}
