//! Multimodal product-category classification with attention explanations.
//!
//! Implements the normalise → extract-keywords → predict → attribute
//! pipeline used to categorise e-commerce listings from a product image plus
//! free-form text, and to explain each prediction with per-keyword
//! attribution scores and a spatial attention heatmap.

pub mod api;
pub mod attribution;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod imaging;
pub mod keywords;
pub mod normalize;
pub mod pipeline;
pub mod predictor;
pub mod providers;

pub use api::{
    AttentionMap, Category, CategoryScore, Explanation, KeywordAttribution, PredictionResult,
};
pub use attribution::{AttentionAttributor, KeywordTokens};
#[cfg(feature = "cli")]
pub use cli::ProdlensArgs;
pub use config::ExtractionConfig;
pub use imaging::DecodedImage;
pub use keywords::KeywordExtractor;
pub use normalize::TextNormalizer;
pub use pipeline::{Pipeline, PipelineError, PipelineOutcome};
pub use predictor::MultimodalPredictor;
pub use providers::{JointOutputs, VisionLanguageModel};
