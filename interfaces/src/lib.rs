pub mod baseline;
pub mod defs;
pub mod empty;

pub use baseline::BaselineClassifier;
pub use defs::ClassificationResultMap;
pub use defs::Classifier;
pub use empty::EmptyClassifier;
