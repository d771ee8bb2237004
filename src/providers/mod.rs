//! Model providers.
//!
//! The pipeline consumes the pretrained vision-language model through the
//! narrow [`VisionLanguageModel`] trait; the model itself is an external
//! collaborator loaded once per process and shared read-only. The `onnx`
//! feature supplies a local ONNX Runtime implementation, and the
//! `provider-api` feature a client for a remote scoring service.

#[cfg(feature = "onnx")]
pub mod onnx;
#[cfg(feature = "provider-api")]
pub mod remote;

/// Everything one joint forward pass produces.
///
/// Attention tensors arrive already averaged over heads. `vision_attention`
/// is the last vision layer's self-attention over the full vision sequence
/// (class token at position 0, then the image patches in row-major order);
/// `cross_attention` holds one row per image patch with one column per text
/// token position.
#[derive(Debug, Clone, PartialEq)]
pub struct JointOutputs {
    /// Image embedding from the vision tower.
    pub image_embedding: Vec<f32>,
    /// Text embedding from the text tower.
    pub text_embedding: Vec<f32>,
    /// Fine-tuned classification logits, when the graph exposes them.
    pub logits: Option<Vec<f32>>,
    /// Head-averaged vision self-attention, `[vision_seq][vision_seq]`.
    pub vision_attention: Vec<Vec<f32>>,
    /// Head-averaged patch-to-token cross-attention, `[patches][text_seq]`.
    pub cross_attention: Vec<Vec<f32>>,
    /// Token strings for the encoded text, padding included.
    pub tokens: Vec<String>,
    /// Attention mask over `tokens`; `0` marks padding.
    pub attention_mask: Vec<u32>,
}

/// Read-only interface over a loaded vision-language model.
pub trait VisionLanguageModel {
    /// Error type surfaced by the implementation.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Run one joint forward pass over an image and its text.
    ///
    /// # Errors
    ///
    /// Returns the implementation's error when encoding, inference, or
    /// output extraction fails.
    fn infer(
        &self,
        image: &crate::imaging::DecodedImage,
        text: &str,
    ) -> Result<JointOutputs, Self::Error>;

    /// Embed a standalone piece of text.
    ///
    /// Used to build per-category prototype embeddings when no fine-tuned
    /// head is available.
    ///
    /// # Errors
    ///
    /// Returns the implementation's error when encoding or inference fails.
    fn embed_text(&self, text: &str) -> Result<Vec<f32>, Self::Error>;

    /// Tokenise text without running inference.
    ///
    /// Needed to match keywords against the model's sub-word vocabulary.
    ///
    /// # Errors
    ///
    /// Returns the implementation's error when encoding fails.
    fn tokenize(&self, text: &str) -> Result<Vec<String>, Self::Error>;
}
