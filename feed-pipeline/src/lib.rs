pub mod types;
pub mod traits;
pub mod parser;
pub mod fetcher;
pub mod storage;
pub mod persist;
pub mod classifier;
pub mod correlator;
pub mod config;
pub mod pipeline;

pub use types::*;
pub use traits::MediaFetcher;
pub use parser::ItemNormalizer;
pub use fetcher::Fetcher;
pub use storage::{ClaimOutcome, MediaStore};
pub use persist::MediaPersister;
pub use classifier::{CommandClassifier, MockClassifier};
pub use correlator::{ClassificationCorrelator, Correlation};
pub use config::{load_instagram_user_id, PipelineConfig};
pub use pipeline::{FeedPipeline, PipelineRun, RunReport};
