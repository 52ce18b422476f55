pub mod artifacts;
pub mod classifier;
pub mod decision;
pub mod error;
pub mod graph;
pub mod pipeline;
pub mod refiner;
pub mod service;

pub use decision::EmotionPrediction;
pub use error::EmographError;
pub use pipeline::{EmotionPipeline, DEFAULT_MIN_CONFIDENCE};
pub use service::{EmotionService, LocalEmotionService, NoopEmotionService};
