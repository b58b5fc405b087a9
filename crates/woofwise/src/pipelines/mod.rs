//! Query handlers. Each turns a routed query into a user-facing string and
//! never fails: errors become plain-language messages.

pub mod analytics;
pub mod nlu;

pub use analytics::AnalyticsPipeline;
pub use nlu::NluPipeline;

pub const DATASET_NOT_LOADED: &str =
  "Error: Dataset not loaded. Please ensure dog_breeds.csv is available.";
