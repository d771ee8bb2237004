//! Configuration for the ONNX CLIP provider.

use super::artefact::ModelArtefact;

/// Default CLIP text sequence length.
pub const CLIP_SEQUENCE_LENGTH: usize = 77;
/// Default CLIP square input resolution in pixels.
pub const CLIP_IMAGE_SIZE: u32 = 224;
/// Default CLIP patch grid side for a 224-pixel input with 32-pixel patches.
pub const CLIP_PATCH_GRID: usize = 7;
/// Default CLIP end-of-text token, also used for padding.
pub const CLIP_PAD_TOKEN: &str = "<|endoftext|>";
/// Identifier of [`CLIP_PAD_TOKEN`] in the standard CLIP vocabulary.
pub const CLIP_PAD_ID: u32 = 49_407;

/// Names of the graph inputs, in the order the exported model declares them.
#[derive(Debug, Clone)]
pub struct GraphInputs {
    /// Pixel tensor input, `[1, 3, size, size]`.
    pub pixel_values: String,
    /// Token identifier input, `[1, seq]`.
    pub input_ids: String,
    /// Attention mask input, `[1, seq]`.
    pub attention_mask: String,
}

impl Default for GraphInputs {
    fn default() -> Self {
        Self {
            pixel_values: "pixel_values".to_owned(),
            input_ids: "input_ids".to_owned(),
            attention_mask: "attention_mask".to_owned(),
        }
    }
}

/// Names of the graph outputs to query after inference.
#[derive(Debug, Clone)]
pub struct GraphOutputs {
    /// Image embedding, `[1, dim]`.
    pub image_embedding: String,
    /// Text embedding, `[1, dim]`.
    pub text_embedding: String,
    /// Fine-tuned classification logits, `[1, categories]`. [`None`] for a
    /// base export without the linear head.
    pub logits: Option<String>,
    /// Head-averaged last-layer vision self-attention,
    /// `[1, vision_seq, vision_seq]`.
    pub vision_attention: String,
    /// Head-averaged patch-to-token cross-attention,
    /// `[1, patches, text_seq]`.
    pub cross_attention: String,
}

impl Default for GraphOutputs {
    fn default() -> Self {
        Self {
            image_embedding: "image_embeds".to_owned(),
            text_embedding: "text_embeds".to_owned(),
            logits: Some("logits".to_owned()),
            vision_attention: "vision_attention".to_owned(),
            cross_attention: "cross_attention".to_owned(),
        }
    }
}

/// Configuration for [`super::ClipOnnx`].
#[derive(Debug, Clone)]
pub struct ClipOnnxConfig {
    /// Model artefact (ONNX graph) to load.
    pub model: ModelArtefact,
    /// Tokeniser artefact consumed by `tokenizers`.
    pub tokenizer: ModelArtefact,
    /// Graph input names.
    pub inputs: GraphInputs,
    /// Graph output names.
    pub outputs: GraphOutputs,
    /// Fixed token count. Inputs are padded and truncated to this size.
    /// Must be greater than zero so every encoding produces fixed-length
    /// tensors.
    pub max_sequence_length: usize,
    /// Token inserted when padding shorter sequences.
    pub pad_token: String,
    /// Identifier of the padding token.
    pub pad_id: u32,
    /// Square pixel resolution the vision tower expects.
    pub image_size: u32,
    /// Side of the native patch grid; the vision sequence is
    /// `patch_grid² + 1` including the class token.
    pub patch_grid: usize,
}

impl ClipOnnxConfig {
    /// Configuration with standard CLIP ViT-B/32 defaults.
    #[must_use]
    pub fn new(model: ModelArtefact, tokenizer: ModelArtefact) -> Self {
        Self {
            model,
            tokenizer,
            inputs: GraphInputs::default(),
            outputs: GraphOutputs::default(),
            max_sequence_length: CLIP_SEQUENCE_LENGTH,
            pad_token: CLIP_PAD_TOKEN.to_owned(),
            pad_id: CLIP_PAD_ID,
            image_size: CLIP_IMAGE_SIZE,
            patch_grid: CLIP_PATCH_GRID,
        }
    }

    /// Number of image patches the vision tower attends over.
    #[must_use]
    pub const fn patch_count(&self) -> usize {
        self.patch_grid * self.patch_grid
    }
}
