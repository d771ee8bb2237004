//! ONNX Runtime implementation of the vision-language provider.

use std::sync::{Arc, Mutex};

use ort::{session::Session, value::TensorRef};
use tokenizers::{
    PaddingDirection, PaddingParams, PaddingStrategy, Tokenizer, TruncationDirection,
    TruncationParams, TruncationStrategy,
};

use super::{
    config::{ClipOnnxConfig, GraphInputs, GraphOutputs},
    errors::ClipOnnxError,
    preprocess,
};
use crate::imaging::DecodedImage;
use crate::providers::{JointOutputs, VisionLanguageModel};

/// A CLIP-style vision-language model served by ONNX Runtime.
///
/// The session requires `&mut` to run, so access is serialised behind a
/// mutex; the provider itself is shared read-only across the process.
#[derive(Debug)]
pub struct ClipOnnx {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    inputs: GraphInputs,
    outputs: GraphOutputs,
    has_logits: bool,
    max_sequence_length: usize,
    image_size: u32,
    patch_count: usize,
}

impl ClipOnnx {
    /// Builds the provider from the supplied configuration.
    ///
    /// Both artefacts are checksum-verified before anything is loaded.
    ///
    /// # Errors
    ///
    /// Returns configuration and runtime errors when artefacts cannot be
    /// verified, tokeniser setup fails, or the ONNX session cannot be
    /// created.
    pub fn new(config: ClipOnnxConfig) -> Result<Self, ClipOnnxError> {
        if config.max_sequence_length == 0 {
            return Err(ClipOnnxError::ZeroSequenceLength);
        }
        if config.patch_grid == 0 {
            return Err(ClipOnnxError::ZeroPatchGrid);
        }

        config.model.verify()?;
        config.tokenizer.verify()?;

        let mut tokenizer = Tokenizer::from_file(&config.tokenizer.path).map_err(|source| {
            ClipOnnxError::LoadTokenizer {
                path: config.tokenizer.path.clone(),
                source,
            }
        })?;

        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: config.max_sequence_length,
                strategy: TruncationStrategy::OnlyFirst,
                stride: 0,
                direction: TruncationDirection::Right,
            }))
            .map_err(ClipOnnxError::ConfigureTruncation)?;

        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::Fixed(config.max_sequence_length),
            direction: PaddingDirection::Right,
            pad_to_multiple_of: None,
            pad_id: config.pad_id,
            pad_type_id: 0,
            pad_token: config.pad_token.clone(),
        }));

        let session = Session::builder()
            .map_err(ClipOnnxError::CreateSessionBuilder)?
            .commit_from_file(&config.model.path)
            .map_err(ClipOnnxError::CreateSession)?;

        let has_logits = config
            .outputs
            .logits
            .as_ref()
            .is_some_and(|name| session.outputs.iter().any(|output| output.name == *name));

        tracing::info!(
            model = %config.model.path.display(),
            fine_tuned_head = has_logits,
            "loaded vision-language model"
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            inputs: config.inputs,
            outputs: config.outputs,
            has_logits,
            max_sequence_length: config.max_sequence_length,
            image_size: config.image_size,
            patch_count: config.patch_count(),
        })
    }

    /// Whether the loaded graph exposes a fine-tuned classification head.
    #[must_use]
    pub const fn has_fine_tuned_head(&self) -> bool {
        self.has_logits
    }

    /// Encode text into fixed-length ids, mask, and token strings.
    fn encode(
        &self,
        text: &str,
    ) -> Result<(Vec<i64>, Vec<i64>, Vec<String>, Vec<u32>), ClipOnnxError> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(ClipOnnxError::Encode)?;

        let ids = encoding.get_ids();
        let mask = encoding.get_attention_mask();
        if ids.len() != self.max_sequence_length || mask.len() != self.max_sequence_length {
            return Err(ClipOnnxError::SequenceLength {
                expected: self.max_sequence_length,
                actual: ids.len(),
            });
        }

        let ids_vec: Vec<i64> = ids.iter().map(|id| i64::from(*id)).collect();
        let mask_vec: Vec<i64> = mask.iter().map(|m| i64::from(*m)).collect();
        let tokens = encoding.get_tokens().to_vec();
        Ok((ids_vec, mask_vec, tokens, mask.to_vec()))
    }

    /// Run the graph over one pixel tensor and one encoded text.
    fn forward(
        &self,
        pixels: &[f32],
        ids: &[i64],
        mask: &[i64],
    ) -> Result<RawOutputs, ClipOnnxError> {
        let side = self.image_size as usize;
        let pixel_tensor = TensorRef::from_array_view(([1_usize, 3, side, side], pixels))
            .map_err(ClipOnnxError::EncodeTensor)?;
        let ids_tensor = TensorRef::from_array_view(([1_usize, self.max_sequence_length], ids))
            .map_err(ClipOnnxError::EncodeTensor)?;
        let mask_tensor = TensorRef::from_array_view(([1_usize, self.max_sequence_length], mask))
            .map_err(ClipOnnxError::EncodeTensor)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| ClipOnnxError::SessionPoisoned)?;

        let outputs = session
            .run(ort::inputs! {
                self.inputs.pixel_values.as_str() => pixel_tensor,
                self.inputs.input_ids.as_str() => ids_tensor,
                self.inputs.attention_mask.as_str() => mask_tensor,
            })
            .map_err(ClipOnnxError::Inference)?;

        let fetch = |name: &str| {
            outputs.get(name).ok_or_else(|| ClipOnnxError::OutputMissing {
                name: name.to_owned(),
            })
        };

        let image_embedding = extract_vector(fetch(&self.outputs.image_embedding)?,
            &self.outputs.image_embedding)?;
        let text_embedding =
            extract_vector(fetch(&self.outputs.text_embedding)?, &self.outputs.text_embedding)?;
        let logits = if self.has_logits {
            match &self.outputs.logits {
                Some(name) => Some(extract_vector(fetch(name)?, name)?),
                None => None,
            }
        } else {
            None
        };
        let vision_seq = self.patch_count + 1;
        let vision_attention = extract_matrix(
            fetch(&self.outputs.vision_attention)?,
            &self.outputs.vision_attention,
            vision_seq,
            vision_seq,
        )?;
        let cross_attention = extract_matrix(
            fetch(&self.outputs.cross_attention)?,
            &self.outputs.cross_attention,
            self.patch_count,
            self.max_sequence_length,
        )?;

        Ok(RawOutputs {
            image_embedding,
            text_embedding,
            logits,
            vision_attention,
            cross_attention,
        })
    }
}

/// Tensors pulled out of one forward pass before token metadata is attached.
struct RawOutputs {
    image_embedding: Vec<f32>,
    text_embedding: Vec<f32>,
    logits: Option<Vec<f32>>,
    vision_attention: Vec<Vec<f32>>,
    cross_attention: Vec<Vec<f32>>,
}

impl VisionLanguageModel for ClipOnnx {
    type Error = ClipOnnxError;

    fn infer(&self, image: &DecodedImage, text: &str) -> Result<JointOutputs, Self::Error> {
        let (ids, mask, tokens, raw_mask) = self.encode(text)?;
        let pixels = preprocess::pixel_tensor(image, self.image_size);
        let raw = self.forward(&pixels, &ids, &mask)?;
        Ok(JointOutputs {
            image_embedding: raw.image_embedding,
            text_embedding: raw.text_embedding,
            logits: raw.logits,
            vision_attention: raw.vision_attention,
            cross_attention: raw.cross_attention,
            tokens,
            attention_mask: raw_mask,
        })
    }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>, Self::Error> {
        let (ids, mask, _, _) = self.encode(text)?;
        // The graph is joint, so text-only embedding feeds a blank image.
        let side = self.image_size as usize;
        let pixels = vec![0.0_f32; 3 * side * side];
        let raw = self.forward(&pixels, &ids, &mask)?;
        Ok(raw.text_embedding)
    }

    fn tokenize(&self, text: &str) -> Result<Vec<String>, Self::Error> {
        let encoding = self
            .tokenizer
            .encode(text, false)
            .map_err(ClipOnnxError::Encode)?;
        let mask = encoding.get_attention_mask();
        Ok(encoding
            .get_tokens()
            .iter()
            .zip(mask.iter())
            .filter(|(_, m)| **m == 1)
            .map(|(token, _)| token.clone())
            .collect())
    }
}

/// Extract a `[1, n]` or `[n]` float tensor as a vector.
fn extract_vector(
    value: &ort::value::DynValue,
    name: &str,
) -> Result<Vec<f32>, ClipOnnxError> {
    let (dims, data) = extract_raw(value)?;
    let valid = matches!(dims.as_slice(), [_] | [1, _]);
    if !valid {
        return Err(ClipOnnxError::UnexpectedShape {
            name: name.to_owned(),
            expected: "[1, n]".to_owned(),
            actual: dims,
        });
    }
    Ok(data)
}

/// Extract a `[rows, cols]` tensor (optionally batched, optionally with a
/// leading head axis that gets averaged away) as row vectors.
fn extract_matrix(
    value: &ort::value::DynValue,
    name: &str,
    rows: usize,
    cols: usize,
) -> Result<Vec<Vec<f32>>, ClipOnnxError> {
    let (dims, data) = extract_raw(value)?;
    let heads = match dims.as_slice() {
        [r, c] | [1, r, c] if *r == rows && *c == cols => 1,
        [1, h, r, c] if *r == rows && *c == cols => *h,
        _ => {
            return Err(ClipOnnxError::UnexpectedShape {
                name: name.to_owned(),
                expected: format!("[1, heads?, {rows}, {cols}]"),
                actual: dims,
            });
        }
    };
    Ok(head_average(&data, heads, rows, cols))
}

/// Average a `[heads, rows, cols]` block over its head axis.
#[expect(clippy::float_arithmetic, reason = "attention averaging")]
fn head_average(data: &[f32], heads: usize, rows: usize, cols: usize) -> Vec<Vec<f32>> {
    let plane = rows * cols;
    let scale = 1.0 / heads as f32;
    (0..rows)
        .map(|row| {
            (0..cols)
                .map(|col| {
                    (0..heads)
                        .map(|head| data[head * plane + row * cols + col])
                        .sum::<f32>()
                        * scale
                })
                .collect()
        })
        .collect()
}

/// Pull shape and data out of one float tensor value.
fn extract_raw(value: &ort::value::DynValue) -> Result<(Vec<usize>, Vec<f32>), ClipOnnxError> {
    let (shape, data) = value
        .try_extract_tensor::<f32>()
        .map_err(ClipOnnxError::Inference)?;
    let dims: Vec<usize> = shape
        .iter()
        .map(|dim| usize::try_from(*dim).unwrap_or(0))
        .collect();
    Ok((dims, data.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::head_average;

    #[test]
    fn head_average_collapses_the_head_axis() {
        // Two heads over a 1x2 plane.
        let data = [1.0, 3.0, 3.0, 5.0];
        let averaged = head_average(&data, 2, 1, 2);
        assert_eq!(averaged, vec![vec![2.0, 4.0]]);
    }

    #[test]
    fn single_head_is_identity() {
        let data = [0.25, 0.75];
        let averaged = head_average(&data, 1, 1, 2);
        assert_eq!(averaged, vec![vec![0.25, 0.75]]);
    }
}
