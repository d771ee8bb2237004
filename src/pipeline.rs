//! The end-to-end classification pipeline.
//!
//! Chains normalisation, keyword extraction, multimodal inference, and
//! attention attribution over a shared model. Empty keyword extraction is a
//! hard stop before any inference runs; a failed attribution on an
//! otherwise-valid input degrades to a prediction-only outcome instead of
//! discarding the response.

use thiserror::Error;

use crate::api::{Explanation, PredictionResult};
use crate::attribution::{AttentionAttributor, AttributionError, KeywordTokens};
use crate::config::ExtractionConfig;
use crate::imaging::{DecodedImage, ImagingError};
use crate::keywords::KeywordExtractor;
use crate::normalize::TextNormalizer;
use crate::predictor::{MultimodalPredictor, PredictionError};
use crate::providers::{JointOutputs, VisionLanguageModel};

/// Native patch grid side assumed when none is configured.
pub const DEFAULT_PATCH_GRID: usize = 7;

/// Errors surfaced by the pipeline entry points.
#[derive(Debug, Error)]
pub enum PipelineError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// The image payload is missing or unreadable.
    #[error("invalid input: {0}")]
    Input(#[from] ImagingError),
    /// Normalisation and extraction produced no keywords.
    #[error("text produced no keywords")]
    ExtractionEmpty,
    /// Inference or score construction failed.
    #[error("inference failed: {0}")]
    Inference(#[source] PredictionError<E>),
    /// Attribution could not be derived from the model outputs.
    #[error("attribution failed: {0}")]
    Attribution(#[from] AttributionError),
}

/// Result of a full pipeline run.
///
/// `explanation` is [`None`] when attribution failed but the prediction
/// itself succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    /// The classification outcome.
    pub prediction: PredictionResult,
    /// Explanation artefacts, absent on degraded runs.
    pub explanation: Option<Explanation>,
}

/// The normalise → extract → predict → attribute pipeline.
pub struct Pipeline<M> {
    normalizer: TextNormalizer,
    extractor: KeywordExtractor,
    predictor: MultimodalPredictor<M>,
    attributor: AttentionAttributor,
}

impl<M> std::fmt::Debug for Pipeline<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("extractor", &self.extractor)
            .field("attributor", &self.attributor)
            .finish_non_exhaustive()
    }
}

impl<M: VisionLanguageModel> Pipeline<M> {
    /// Assemble a pipeline over a loaded model with default extraction.
    pub fn new(model: M) -> Self {
        Self::with_config(model, &ExtractionConfig::default())
    }

    /// Assemble a pipeline with explicit extraction settings.
    pub fn with_config(model: M, config: &ExtractionConfig) -> Self {
        Self {
            normalizer: TextNormalizer::new(),
            extractor: config.build(),
            predictor: MultimodalPredictor::new(model),
            attributor: AttentionAttributor::new(DEFAULT_PATCH_GRID),
        }
    }

    /// Override the native patch grid side.
    #[must_use]
    pub fn with_patch_grid(mut self, patch_grid: usize) -> Self {
        self.attributor = AttentionAttributor::new(patch_grid);
        self
    }

    /// Normalise raw text and extract its ranked keywords.
    ///
    /// Pure and infallible; empty or junk input yields an empty list.
    #[must_use]
    pub fn normalize_and_extract_keywords(&self, raw_text: &str) -> Vec<String> {
        let normalized = self.normalizer.normalize(raw_text);
        self.extractor.extract(&normalized)
    }

    /// Normalise raw text and extract at most `top_n` ranked keywords,
    /// ignoring the configured limit for this call.
    #[must_use]
    pub fn normalize_and_extract_keywords_top(&self, raw_text: &str, top_n: usize) -> Vec<String> {
        let normalized = self.normalizer.normalize(raw_text);
        self.extractor.extract_top(&normalized, top_n)
    }

    /// Classify an image against already-extracted keywords.
    ///
    /// # Errors
    ///
    /// Returns input errors for unreadable images, `ExtractionEmpty` for an
    /// empty keyword list, and inference errors from the model.
    pub fn predict(
        &self,
        image_bytes: &[u8],
        keywords: &[String],
    ) -> Result<PredictionResult, PipelineError<M::Error>> {
        let image = DecodedImage::from_bytes(image_bytes)?;
        if keywords.is_empty() {
            return Err(PipelineError::ExtractionEmpty);
        }
        self.predictor
            .predict(&image, keywords)
            .map_err(PipelineError::Inference)
    }

    /// Produce both explanation artefacts for an image and its keywords.
    ///
    /// # Errors
    ///
    /// Returns input, extraction, inference, and attribution errors.
    pub fn attribute(
        &self,
        image_bytes: &[u8],
        keywords: &[String],
    ) -> Result<Explanation, PipelineError<M::Error>> {
        let image = DecodedImage::from_bytes(image_bytes)?;
        if keywords.is_empty() {
            return Err(PipelineError::ExtractionEmpty);
        }
        let (_, outputs) = self
            .predictor
            .predict_with_outputs(&image, keywords)
            .map_err(PipelineError::Inference)?;
        let keyword_tokens = self.keyword_tokens(keywords).map_err(PipelineError::Inference)?;
        self.explain(&image, &outputs, &keyword_tokens)
            .map_err(PipelineError::Attribution)
    }

    /// Run the full pipeline over raw inputs.
    ///
    /// # Errors
    ///
    /// Returns input errors, `ExtractionEmpty` before any inference when
    /// the text yields no keywords, and inference errors. Attribution
    /// failures degrade to a prediction-only outcome.
    pub fn run(
        &self,
        image_bytes: &[u8],
        raw_text: &str,
    ) -> Result<PipelineOutcome, PipelineError<M::Error>> {
        let keywords = self.normalize_and_extract_keywords(raw_text);
        if keywords.is_empty() {
            return Err(PipelineError::ExtractionEmpty);
        }
        let image = DecodedImage::from_bytes(image_bytes)?;
        let (prediction, outputs) = self
            .predictor
            .predict_with_outputs(&image, &keywords)
            .map_err(PipelineError::Inference)?;
        tracing::info!(
            category = %prediction.predicted_category,
            confidence = prediction.confidence,
            "classified listing"
        );

        let explanation = match self
            .keyword_tokens(&keywords)
            .map_err(PipelineError::Inference)
            .and_then(|kw| {
                self.explain(&image, &outputs, &kw)
                    .map_err(PipelineError::Attribution)
            }) {
            Ok(explanation) => Some(explanation),
            Err(error) => {
                tracing::warn!(%error, "attribution failed, returning prediction only");
                None
            }
        };

        Ok(PipelineOutcome {
            prediction,
            explanation,
        })
    }

    /// Pair each keyword with the model's sub-word spellings of it.
    fn keyword_tokens(
        &self,
        keywords: &[String],
    ) -> Result<Vec<KeywordTokens>, PredictionError<M::Error>> {
        keywords
            .iter()
            .map(|keyword| {
                self.predictor
                    .model()
                    .tokenize(keyword)
                    .map(|raw| KeywordTokens::new(keyword.clone(), &raw))
                    .map_err(PredictionError::Model)
            })
            .collect()
    }

    /// Derive both artefacts at the image's original dimensions.
    fn explain(
        &self,
        image: &DecodedImage,
        outputs: &JointOutputs,
        keywords: &[KeywordTokens],
    ) -> Result<Explanation, AttributionError> {
        self.attributor.explain(
            outputs,
            image.original_height() as usize,
            image.original_width() as usize,
            keywords,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Category;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::convert::Infallible;
    use std::io::Cursor;

    /// Scripted model covering the full trait surface.
    struct StubModel {
        patch_grid: usize,
        hot_token: usize,
        fail_attention: bool,
    }

    impl StubModel {
        fn outputs(&self, text: &str) -> JointOutputs {
            let patches = self.patch_grid * self.patch_grid;
            let seq = patches + 1;
            let tokens: Vec<String> = text
                .split(", ")
                .map(|word| format!("{word}</w>"))
                .collect();
            let vision_attention = if self.fail_attention {
                vec![vec![0.0; 3]; 3]
            } else {
                vec![vec![1.0 / seq as f32; seq]; seq]
            };
            let mut cross = vec![vec![0.0_f32; tokens.len()]; patches];
            if self.hot_token < tokens.len() {
                for row in &mut cross {
                    row[self.hot_token] = 1.0 / patches as f32;
                }
            }
            JointOutputs {
                image_embedding: vec![1.0, 0.0],
                text_embedding: vec![0.0, 1.0],
                logits: Some(vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 4.0]),
                vision_attention,
                cross_attention: cross,
                attention_mask: vec![1; tokens.len()],
                tokens,
            }
        }
    }

    impl VisionLanguageModel for StubModel {
        type Error = Infallible;

        fn infer(&self, _: &DecodedImage, text: &str) -> Result<JointOutputs, Infallible> {
            Ok(self.outputs(text))
        }

        fn embed_text(&self, _: &str) -> Result<Vec<f32>, Infallible> {
            Ok(vec![0.0, 1.0])
        }

        fn tokenize(&self, text: &str) -> Result<Vec<String>, Infallible> {
            Ok(vec![format!("{text}</w>")])
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([90, 60, 30])));
        let mut bytes = Cursor::new(Vec::new());
        image
            .write_to(&mut bytes, ImageFormat::Png)
            .unwrap_or_else(|_| unreachable!("in-memory PNG encoding"));
        bytes.into_inner()
    }

    fn pipeline(fail_attention: bool) -> Pipeline<StubModel> {
        Pipeline::new(StubModel {
            patch_grid: DEFAULT_PATCH_GRID,
            hot_token: 0,
            fail_attention,
        })
    }

    #[test]
    fn normalisation_feeds_extraction() {
        let keywords = pipeline(false)
            .normalize_and_extract_keywords("500ml waterproof SSD storage case");
        assert_eq!(
            keywords,
            [
                "liter", "water", "resistant", "solid", "state", "drive", "storage", "case"
            ]
        );
    }

    #[test]
    fn per_call_top_n_overrides_the_configured_limit() {
        let pipeline = pipeline(false);
        let keywords = pipeline
            .normalize_and_extract_keywords_top("500ml waterproof SSD storage case", 3);
        assert_eq!(keywords, ["liter", "water", "resistant"]);
        assert_eq!(
            pipeline
                .normalize_and_extract_keywords("500ml waterproof SSD storage case")
                .len(),
            8
        );
    }

    #[test]
    fn empty_text_stops_before_inference() {
        let result = pipeline(false).run(&png_bytes(32, 32), "   ");
        assert!(matches!(result, Err(PipelineError::ExtractionEmpty)));
    }

    #[test]
    fn unreadable_image_is_an_input_error() {
        let result = pipeline(false).run(&[1, 2, 3], "leather watch strap");
        assert!(matches!(result, Err(PipelineError::Input(_))));
    }

    #[test]
    #[expect(clippy::expect_used, reason = "test should fail loudly")]
    fn full_run_produces_prediction_and_explanation() {
        let outcome = pipeline(false)
            .run(&png_bytes(80, 60), "leather watch strap")
            .expect("run");
        assert_eq!(outcome.prediction.predicted_category, Category::Watches);
        let explanation = outcome.explanation.expect("explanation");
        assert_eq!(explanation.attention_map.shape(), (60, 80));
        assert_eq!(explanation.keyword_attribution.len(), 3);
    }

    #[test]
    #[expect(clippy::expect_used, reason = "test should fail loudly")]
    fn heatmap_uses_original_dimensions_for_oversized_images() {
        let explanation = pipeline(false)
            .attribute(
                &png_bytes(800, 600),
                &["watch".to_owned(), "leather".to_owned()],
            )
            .expect("attribute");
        assert_eq!(explanation.attention_map.shape(), (600, 800));
    }

    #[test]
    #[expect(clippy::expect_used, reason = "test should fail loudly")]
    fn attribution_failure_degrades_to_prediction_only() {
        let outcome = pipeline(true)
            .run(&png_bytes(32, 32), "leather watch strap")
            .expect("run");
        assert_eq!(outcome.prediction.predicted_category, Category::Watches);
        assert!(outcome.explanation.is_none());
    }

    #[test]
    #[expect(clippy::expect_used, reason = "test should fail loudly")]
    fn attribution_mass_lands_on_the_first_keyword() {
        let explanation = pipeline(false)
            .attribute(
                &png_bytes(32, 32),
                &[
                    "watch".to_owned(),
                    "leather".to_owned(),
                    "waterproof".to_owned(),
                ],
            )
            .expect("attribute");
        let attribution = &explanation.keyword_attribution;
        assert!((attribution.score("watch").expect("watch") - 1.0).abs() < 1e-6);
        assert_eq!(attribution.score("leather"), Some(0.0));
        assert_eq!(attribution.score("waterproof"), Some(0.0));
    }

    #[test]
    fn predict_rejects_an_empty_keyword_list() {
        let result = pipeline(false).predict(&png_bytes(32, 32), &[]);
        assert!(matches!(result, Err(PipelineError::ExtractionEmpty)));
    }
}
