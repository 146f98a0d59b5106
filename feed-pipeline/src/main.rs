use clap::{Parser, Subcommand};
use feed_pipeline::{
    load_instagram_user_id, CommandClassifier, FeedPipeline, MediaStore, PipelineConfig,
};
use interfaces::{BaselineClassifier, Classifier, EmptyClassifier};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "feed-pipeline", about = "Persist feed media and select classified items")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one feed batch and print the selected items as JSON
    Run {
        /// Bootstrap file holding `{"instagramUserId": ...}`
        #[arg(long)]
        user_file: PathBuf,
        /// JSON array of raw feed records
        #[arg(long)]
        feed: PathBuf,
        #[arg(long)]
        media_root: Option<PathBuf>,
        /// External classifier program, called with the media directory
        #[arg(long, conflicts_with = "baseline")]
        classifier_cmd: Option<PathBuf>,
        #[arg(long = "classifier-arg", requires = "classifier_cmd")]
        classifier_args: Vec<String>,
        /// Label every persisted file as target category
        #[arg(long)]
        baseline: bool,
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// List media ids already persisted for a user
    Status {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        media_root: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = PipelineConfig::from_env();

    match cli.command {
        Command::Run {
            user_file,
            feed,
            media_root,
            classifier_cmd,
            classifier_args,
            baseline,
            concurrency,
        } => {
            if let Some(root) = media_root {
                config = config.with_media_root(root);
            }
            if let Some(n) = concurrency {
                config = config.with_max_concurrent_persists(n);
            }

            let user_id = load_instagram_user_id(&user_file)?.to_string();

            let content = tokio::fs::read_to_string(&feed).await?;
            let records: Vec<Value> = serde_json::from_str(&content)?;

            let classifier: Arc<dyn Classifier> = match classifier_cmd {
                Some(program) => Arc::new(CommandClassifier::new(program).with_args(classifier_args)),
                None if baseline => Arc::new(BaselineClassifier),
                None => {
                    warn!("No classifier configured, nothing will be selected");
                    Arc::new(EmptyClassifier)
                }
            };

            info!("Starting feed pipeline for user {}", user_id);
            let pipeline = FeedPipeline::with_http_fetcher(config, classifier)?;
            let run = pipeline.run_with_report(&user_id, &records).await.map_err(|e| {
                error!("Pipeline run failed: {}", e);
                Box::new(e) as Box<dyn std::error::Error>
            })?;

            info!("Run report: {}", serde_json::to_string(&run.report)?);
            println!("{}", serde_json::to_string_pretty(&run.items)?);
        }
        Command::Status { user_id, media_root } => {
            if let Some(root) = media_root {
                config = config.with_media_root(root);
            }
            let store = MediaStore::new(config.media_root);
            let ids = store.list_media_ids(&user_id).await?;
            info!("{} media files persisted for user {}", ids.len(), user_id);
            for id in ids {
                println!("{}", id);
            }
        }
    }

    Ok(())
}
