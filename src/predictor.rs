//! Multimodal category prediction.
//!
//! Wraps a [`VisionLanguageModel`] and turns one joint forward pass into a
//! softmax distribution over the seven categories. When the model exposes a
//! fine-tuned linear head its logits are used directly; otherwise the image
//! embedding is scored by cosine similarity against per-category text
//! prototype embeddings scaled by a fixed temperature.

use std::sync::Mutex;

use thiserror::Error;

use crate::api::{Category, CategoryScore, PredictionResult};
use crate::imaging::DecodedImage;
use crate::providers::{JointOutputs, VisionLanguageModel};

/// Temperature dividing prototype cosine similarities before softmax.
pub const PROTOTYPE_TEMPERATURE: f32 = 0.07;

/// Norms below this are treated as zero when normalising embeddings.
const NEAR_ZERO: f32 = 1e-6;

/// Errors produced while turning model outputs into a prediction.
#[derive(Debug, Error)]
pub enum PredictionError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// The underlying model failed.
    #[error("model inference failed: {0}")]
    Model(#[source] E),
    /// The fine-tuned head produced the wrong number of logits.
    #[error("model produced {actual} logits but expected {expected}")]
    LogitCount { expected: usize, actual: usize },
    /// A prototype embedding's dimension disagrees with the image embedding.
    #[error("embedding dimensions disagree: image {image} vs prototype {prototype}")]
    DimensionMismatch { image: usize, prototype: usize },
    /// An embedding collapsed to (near) zero norm.
    #[error("embedding norm is too small to normalise")]
    DegenerateEmbedding,
}

/// Category predictor over a shared vision-language model.
pub struct MultimodalPredictor<M> {
    model: M,
    prototypes: Mutex<Option<Vec<Vec<f32>>>>,
}

impl<M> std::fmt::Debug for MultimodalPredictor<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultimodalPredictor").finish_non_exhaustive()
    }
}

impl<M: VisionLanguageModel> MultimodalPredictor<M> {
    /// Wrap a loaded model.
    pub fn new(model: M) -> Self {
        Self {
            model,
            prototypes: Mutex::new(None),
        }
    }

    /// The wrapped model.
    pub const fn model(&self) -> &M {
        &self.model
    }

    /// Classify one image against its keyword text.
    ///
    /// `keywords` are joined with `", "` to form the text input, and echoed
    /// in the result.
    ///
    /// # Errors
    ///
    /// Propagates model failures and rejects malformed model outputs.
    pub fn predict(
        &self,
        image: &DecodedImage,
        keywords: &[String],
    ) -> Result<PredictionResult, PredictionError<M::Error>> {
        self.predict_with_outputs(image, keywords)
            .map(|(prediction, _)| prediction)
    }

    /// Classify and also hand back the raw joint outputs for attribution.
    ///
    /// # Errors
    ///
    /// Propagates model failures and rejects malformed model outputs.
    pub fn predict_with_outputs(
        &self,
        image: &DecodedImage,
        keywords: &[String],
    ) -> Result<(PredictionResult, JointOutputs), PredictionError<M::Error>> {
        let text = keywords.join(", ");
        let outputs = self
            .model
            .infer(image, &text)
            .map_err(PredictionError::Model)?;

        let raw_scores = match &outputs.logits {
            Some(logits) => {
                if logits.len() != Category::ALL.len() {
                    return Err(PredictionError::LogitCount {
                        expected: Category::ALL.len(),
                        actual: logits.len(),
                    });
                }
                tracing::debug!("scoring with the fine-tuned head");
                logits.clone()
            }
            None => {
                tracing::debug!("scoring against prototype embeddings");
                self.prototype_scores(&outputs.image_embedding)?
            }
        };

        let probabilities = softmax(&raw_scores);
        let (predicted_category, confidence) = argmax(&probabilities);
        let category_scores = Category::ALL
            .into_iter()
            .zip(probabilities)
            .map(|(category, score)| CategoryScore { category, score })
            .collect();

        let prediction = PredictionResult {
            predicted_category,
            confidence,
            category_scores,
            keywords: keywords.to_vec(),
        };
        Ok((prediction, outputs))
    }

    /// Cosine-similarity scores against the cached category prototypes,
    /// scaled by [`PROTOTYPE_TEMPERATURE`].
    #[expect(clippy::float_arithmetic, reason = "similarity scoring")]
    fn prototype_scores(
        &self,
        image_embedding: &[f32],
    ) -> Result<Vec<f32>, PredictionError<M::Error>> {
        let prototypes = self.prototypes()?;
        prototypes
            .iter()
            .map(|prototype| {
                if prototype.len() != image_embedding.len() {
                    return Err(PredictionError::DimensionMismatch {
                        image: image_embedding.len(),
                        prototype: prototype.len(),
                    });
                }
                let similarity = cosine(image_embedding, prototype)
                    .ok_or(PredictionError::DegenerateEmbedding)?;
                Ok(similarity / PROTOTYPE_TEMPERATURE)
            })
            .collect()
    }

    /// Per-category text prototype embeddings, built once on first use.
    fn prototypes(&self) -> Result<Vec<Vec<f32>>, PredictionError<M::Error>> {
        if let Ok(guard) = self.prototypes.lock()
            && let Some(prototypes) = guard.as_ref()
        {
            return Ok(prototypes.clone());
        }
        let built = Category::ALL
            .into_iter()
            .map(|category| {
                self.model
                    .embed_text(category.label())
                    .map_err(PredictionError::Model)
            })
            .collect::<Result<Vec<_>, _>>()?;
        if let Ok(mut guard) = self.prototypes.lock() {
            *guard = Some(built.clone());
        }
        tracing::info!(count = built.len(), "built category prototype embeddings");
        Ok(built)
    }
}

/// Numerically stable softmax.
#[must_use]
#[expect(clippy::float_arithmetic, reason = "probability normalisation")]
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    if total < NEAR_ZERO {
        let uniform = 1.0 / scores.len() as f32;
        return vec![uniform; scores.len()];
    }
    exps.into_iter().map(|e| e / total).collect()
}

/// Cosine similarity, [`None`] when either vector has (near) zero norm.
#[expect(clippy::float_arithmetic, reason = "similarity scoring")]
fn cosine(a: &[f32], b: &[f32]) -> Option<f32> {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    (norm_a > NEAR_ZERO && norm_b > NEAR_ZERO).then(|| dot / (norm_a * norm_b))
}

/// The winning category and its probability.
fn argmax(probabilities: &[f32]) -> (Category, f32) {
    let mut best = (Category::ALL[0], f32::NEG_INFINITY);
    for (category, probability) in Category::ALL.into_iter().zip(probabilities) {
        if *probability > best.1 {
            best = (category, *probability);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};
    use std::convert::Infallible;

    /// Stub model with scripted outputs.
    struct StubModel {
        logits: Option<Vec<f32>>,
        image_embedding: Vec<f32>,
        text_embeddings: Vec<Vec<f32>>,
    }

    impl VisionLanguageModel for StubModel {
        type Error = Infallible;

        fn infer(&self, _: &DecodedImage, _: &str) -> Result<JointOutputs, Infallible> {
            Ok(JointOutputs {
                image_embedding: self.image_embedding.clone(),
                text_embedding: vec![0.0; self.image_embedding.len()],
                logits: self.logits.clone(),
                vision_attention: Vec::new(),
                cross_attention: Vec::new(),
                tokens: Vec::new(),
                attention_mask: Vec::new(),
            })
        }

        fn embed_text(&self, text: &str) -> Result<Vec<f32>, Infallible> {
            let index = Category::from_label(text).map_or(0, Category::index);
            Ok(self.text_embeddings[index].clone())
        }

        fn tokenize(&self, text: &str) -> Result<Vec<String>, Infallible> {
            Ok(text.split_whitespace().map(str::to_owned).collect())
        }
    }

    fn image() -> DecodedImage {
        DecodedImage::from_dynamic(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            10,
            10,
            Rgb([1, 2, 3]),
        )))
    }

    fn one_hot(index: usize, dim: usize) -> Vec<f32> {
        let mut v = vec![0.0; dim];
        v[index] = 1.0;
        v
    }

    #[test]
    fn softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let total: f32 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    #[expect(clippy::expect_used, reason = "test should fail loudly")]
    fn fine_tuned_logits_drive_the_prediction() {
        let model = StubModel {
            logits: Some(vec![0.0, 0.0, 5.0, 0.0, 0.0, 0.0, 0.0]),
            image_embedding: vec![1.0, 0.0],
            text_embeddings: vec![vec![0.0; 2]; 7],
        };
        let predictor = MultimodalPredictor::new(model);
        let prediction = predictor
            .predict(&image(), &["laptop".to_owned()])
            .expect("predict");
        assert_eq!(prediction.predicted_category, Category::Computers);
        assert_eq!(prediction.keywords, ["laptop"]);
        let total: f32 = prediction.category_scores.iter().map(|cs| cs.score).sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert!((prediction.confidence - prediction.score(Category::Computers).unwrap()).abs()
            < f32::EPSILON);
    }

    #[test]
    #[expect(clippy::expect_used, reason = "test should fail loudly")]
    fn prototype_fallback_picks_the_aligned_category() {
        let dim = 7;
        let model = StubModel {
            logits: None,
            image_embedding: one_hot(Category::Watches.index(), dim),
            text_embeddings: (0..dim).map(|i| one_hot(i, dim)).collect(),
        };
        let predictor = MultimodalPredictor::new(model);
        let prediction = predictor
            .predict(&image(), &["watch".to_owned()])
            .expect("predict");
        assert_eq!(prediction.predicted_category, Category::Watches);
        assert!(prediction.confidence > 0.9, "temperature sharpens the match");
    }

    #[test]
    fn wrong_logit_count_is_rejected() {
        let model = StubModel {
            logits: Some(vec![0.0; 3]),
            image_embedding: vec![1.0],
            text_embeddings: vec![vec![1.0]; 7],
        };
        let predictor = MultimodalPredictor::new(model);
        assert!(matches!(
            predictor.predict(&image(), &["mug".to_owned()]),
            Err(PredictionError::LogitCount {
                expected: 7,
                actual: 3
            })
        ));
    }

    #[test]
    fn zero_image_embedding_is_degenerate() {
        let model = StubModel {
            logits: None,
            image_embedding: vec![0.0; 4],
            text_embeddings: vec![vec![1.0, 0.0, 0.0, 0.0]; 7],
        };
        let predictor = MultimodalPredictor::new(model);
        assert!(matches!(
            predictor.predict(&image(), &["mug".to_owned()]),
            Err(PredictionError::DegenerateEmbedding)
        ));
    }
}
