//! Attention-based explanations.
//!
//! Two artefacts are derived from one joint forward pass: a spatial heatmap
//! over the product image and per-keyword attribution scores over the text.
//!
//! The heatmap starts from the last vision layer's head-averaged
//! self-attention. The class token's row and column are dropped, the
//! remaining patch-to-patch matrix is mean-pooled over queries into one
//! score per patch, reshaped to the native grid, upsampled with Catmull-Rom
//! cubic interpolation to the ORIGINAL image dimensions, clipped of negative
//! interpolation artefacts, and min-max normalised into `[0, 1]`.
//!
//! Keyword attribution sums cross-attention mass per text-token position,
//! accumulates contiguous sub-word runs into whole words, and credits each
//! word's mass to the first keyword it matches. Scores are renormalised to
//! sum 1; when nothing matched the scores stay all zero rather than being
//! inflated.

use thiserror::Error;

use crate::api::{AttentionMap, Explanation, KeywordAttribution};
use crate::providers::JointOutputs;

/// Variations below this are treated as zero when normalising.
const NEAR_ZERO: f32 = 1e-6;

/// Token strings that never carry keyword attribution.
const SPECIAL_TOKENS: &[&str] = &["[CLS]", "[SEP]", "<pad>", "<|startoftext|>", "<|endoftext|>"];

/// Errors raised when model outputs do not fit the configured geometry.
#[derive(Debug, Error)]
pub enum AttributionError {
    /// The vision self-attention matrix has the wrong shape.
    #[error("vision attention is {rows}x{cols} but the patch grid needs {expected}x{expected}")]
    VisionAttentionShape {
        expected: usize,
        rows: usize,
        cols: usize,
    },
    /// The cross-attention matrix has the wrong number of patch rows.
    #[error("cross attention has {actual} patch rows but expected {expected}")]
    CrossAttentionRows { expected: usize, actual: usize },
    /// A cross-attention row disagrees with the token sequence length.
    #[error("cross attention row has {actual} columns but {expected} tokens were supplied")]
    CrossAttentionColumns { expected: usize, actual: usize },
    /// The attention mask length disagrees with the token sequence.
    #[error("attention mask covers {actual} positions but {expected} tokens were supplied")]
    MaskLength { expected: usize, actual: usize },
}

/// A keyword together with the model's sub-word spellings of it.
///
/// `token_forms` holds the cleaned token strings the model's tokeniser
/// produces for the keyword alone, so that whole-word matches and sub-word
/// matches are both recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordTokens {
    /// The keyword as extracted.
    pub keyword: String,
    /// Cleaned sub-word spellings of the keyword.
    pub token_forms: Vec<String>,
}

impl KeywordTokens {
    /// Pair a keyword with its raw tokeniser output.
    #[must_use]
    pub fn new(keyword: impl Into<String>, raw_tokens: &[String]) -> Self {
        Self {
            keyword: keyword.into(),
            token_forms: raw_tokens.iter().map(|t| clean_token(t)).collect(),
        }
    }

    /// A keyword with no tokeniser spellings, matched whole-word only.
    #[must_use]
    pub fn whole_word(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            token_forms: Vec::new(),
        }
    }

    fn matches(&self, word: &str) -> bool {
        word == self.keyword || self.token_forms.iter().any(|form| form == word)
    }
}

/// Derives both explanation artefacts from one forward pass.
#[derive(Debug, Clone, Copy)]
pub struct AttentionAttributor {
    patch_grid: usize,
}

impl AttentionAttributor {
    /// Attributor for a model with a `patch_grid`×`patch_grid` native grid.
    #[must_use]
    pub const fn new(patch_grid: usize) -> Self {
        Self { patch_grid }
    }

    /// Side of the native patch grid.
    #[must_use]
    pub const fn patch_grid(&self) -> usize {
        self.patch_grid
    }

    /// Build the spatial heatmap at the original image dimensions.
    ///
    /// `vision_attention` is the head-averaged last-layer self-attention
    /// over the full vision sequence, class token first.
    ///
    /// # Errors
    ///
    /// Returns [`AttributionError::VisionAttentionShape`] when the matrix
    /// does not cover the class token plus every patch.
    pub fn heatmap(
        &self,
        vision_attention: &[Vec<f32>],
        original_height: usize,
        original_width: usize,
    ) -> Result<AttentionMap, AttributionError> {
        let grid = self.patch_scores(vision_attention)?;
        let upsampled = upsample_cubic(&grid, self.patch_grid, original_height, original_width);
        let normalised = clip_and_normalise(upsampled);
        Ok(AttentionMap::from_values(original_height, original_width, normalised)
            .unwrap_or_else(|| AttentionMap::zeros(original_height, original_width)))
    }

    /// Mean-pool the patch-to-patch attention into one score per patch.
    #[expect(clippy::float_arithmetic, reason = "attention pooling")]
    fn patch_scores(&self, vision_attention: &[Vec<f32>]) -> Result<Vec<f32>, AttributionError> {
        let patches = self.patch_grid * self.patch_grid;
        let expected = patches + 1;
        let rows = vision_attention.len();
        let cols = vision_attention.first().map_or(0, Vec::len);
        if rows != expected || vision_attention.iter().any(|row| row.len() != expected) {
            return Err(AttributionError::VisionAttentionShape {
                expected,
                rows,
                cols,
            });
        }

        // Drop the class token's row and column, then average over queries.
        let scale = 1.0 / patches as f32;
        let mut scores = vec![0.0_f32; patches];
        for row in vision_attention.iter().skip(1) {
            for (score, value) in scores.iter_mut().zip(row.iter().skip(1)) {
                *score += value * scale;
            }
        }
        Ok(scores)
    }

    /// Attribute cross-attention mass to keywords.
    ///
    /// # Errors
    ///
    /// Returns shape errors when the cross-attention matrix, tokens, and
    /// mask disagree with each other or with the patch grid.
    #[expect(clippy::float_arithmetic, reason = "attribution accumulation")]
    pub fn keyword_attribution(
        &self,
        cross_attention: &[Vec<f32>],
        tokens: &[String],
        attention_mask: &[u32],
        keywords: &[KeywordTokens],
    ) -> Result<KeywordAttribution, AttributionError> {
        let patches = self.patch_grid * self.patch_grid;
        if cross_attention.len() != patches {
            return Err(AttributionError::CrossAttentionRows {
                expected: patches,
                actual: cross_attention.len(),
            });
        }
        if let Some(row) = cross_attention.iter().find(|row| row.len() != tokens.len()) {
            return Err(AttributionError::CrossAttentionColumns {
                expected: tokens.len(),
                actual: row.len(),
            });
        }
        if attention_mask.len() != tokens.len() {
            return Err(AttributionError::MaskLength {
                expected: tokens.len(),
                actual: attention_mask.len(),
            });
        }

        // Total attention each token position received across all patches.
        let token_mass: Vec<f32> = (0..tokens.len())
            .map(|position| cross_attention.iter().map(|row| row[position]).sum())
            .collect();

        let mut scores = vec![0.0_f32; keywords.len()];
        let mut run = WordRun::default();
        for ((token, mask), mass) in tokens.iter().zip(attention_mask).zip(&token_mass) {
            if *mask == 0 {
                continue;
            }
            if SPECIAL_TOKENS.contains(&token.as_str()) || is_comma(token) {
                continue;
            }
            if let Some(continuation) = token.strip_prefix("##") {
                run.extend(&clean_token(continuation), *mass);
            } else {
                run.flush(keywords, &mut scores);
                run.start(&clean_token(token), *mass);
            }
        }
        run.flush(keywords, &mut scores);

        let total: f32 = scores.iter().sum();
        let entries = keywords
            .iter()
            .zip(&scores)
            .map(|(kw, score)| {
                let value = if total < NEAR_ZERO { 0.0 } else { score / total };
                (kw.keyword.clone(), value)
            })
            .collect();
        Ok(KeywordAttribution::new(entries))
    }

    /// Produce both explanation artefacts from one forward pass.
    ///
    /// # Errors
    ///
    /// Propagates shape errors from either artefact.
    pub fn explain(
        &self,
        outputs: &JointOutputs,
        original_height: usize,
        original_width: usize,
        keywords: &[KeywordTokens],
    ) -> Result<Explanation, AttributionError> {
        let attention_map =
            self.heatmap(&outputs.vision_attention, original_height, original_width)?;
        let keyword_attribution = self.keyword_attribution(
            &outputs.cross_attention,
            &outputs.tokens,
            &outputs.attention_mask,
            keywords,
        )?;
        Ok(Explanation {
            attention_map,
            keyword_attribution,
        })
    }
}

/// One contiguous run of sub-word tokens being assembled into a word.
#[derive(Default)]
struct WordRun {
    word: String,
    mass: f32,
}

impl WordRun {
    fn start(&mut self, word: &str, mass: f32) {
        self.word = word.to_owned();
        self.mass = mass;
    }

    #[expect(clippy::float_arithmetic, reason = "attribution accumulation")]
    fn extend(&mut self, suffix: &str, mass: f32) {
        if self.word.is_empty() {
            // Continuation with no opener, treat as a word of its own.
            self.word = suffix.to_owned();
        } else {
            self.word.push_str(suffix);
        }
        self.mass += mass;
    }

    /// Credit the accumulated mass to the first matching keyword.
    #[expect(clippy::float_arithmetic, reason = "attribution accumulation")]
    fn flush(&mut self, keywords: &[KeywordTokens], scores: &mut [f32]) {
        if !self.word.is_empty()
            && let Some(index) = keywords.iter().position(|kw| kw.matches(&self.word))
        {
            scores[index] += self.mass;
        }
        self.word.clear();
        self.mass = 0.0;
    }
}

/// Strip sub-word markers from a token string.
fn clean_token(token: &str) -> String {
    let token = token.strip_suffix("</w>").unwrap_or(token);
    let token = token.strip_prefix("##").unwrap_or(token);
    token.to_owned()
}

/// Whether a token is punctuation-only comma output.
fn is_comma(token: &str) -> bool {
    matches!(clean_token(token).as_str(), "," | "")
}

/// Catmull-Rom cubic weights for fractional offset `t`.
#[expect(clippy::float_arithmetic, reason = "interpolation kernel")]
fn catmull_rom_weights(t: f32) -> [f32; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    [
        -0.5 * t3 + t2 - 0.5 * t,
        1.5 * t3 - 2.5 * t2 + 1.0,
        -1.5 * t3 + 2.0 * t2 + 0.5 * t,
        0.5 * t3 - 0.5 * t2,
    ]
}

/// Separable cubic upsample of a `side`×`side` grid to `out_h`×`out_w`.
#[expect(clippy::float_arithmetic, reason = "interpolation arithmetic")]
fn upsample_cubic(grid: &[f32], side: usize, out_h: usize, out_w: usize) -> Vec<f32> {
    if out_h == 0 || out_w == 0 || side == 0 {
        return vec![0.0; out_h * out_w];
    }
    let clamp = |index: isize| -> usize { index.clamp(0, side as isize - 1) as usize };
    let sample = |row: usize, col: usize| -> f32 { grid[row * side + col] };

    let mut out = vec![0.0_f32; out_h * out_w];
    let scale_y = side as f32 / out_h as f32;
    let scale_x = side as f32 / out_w as f32;
    for out_row in 0..out_h {
        let src_y = (out_row as f32 + 0.5) * scale_y - 0.5;
        let base_y = src_y.floor();
        let wy = catmull_rom_weights(src_y - base_y);
        let ys: [usize; 4] = std::array::from_fn(|i| clamp(base_y as isize + i as isize - 1));
        for out_col in 0..out_w {
            let src_x = (out_col as f32 + 0.5) * scale_x - 0.5;
            let base_x = src_x.floor();
            let wx = catmull_rom_weights(src_x - base_x);
            let xs: [usize; 4] = std::array::from_fn(|i| clamp(base_x as isize + i as isize - 1));
            let mut value = 0.0;
            for (wy_i, y) in wy.iter().zip(ys) {
                for (wx_j, x) in wx.iter().zip(xs) {
                    value += wy_i * wx_j * sample(y, x);
                }
            }
            out[out_row * out_w + out_col] = value;
        }
    }
    out
}

/// Clip negative interpolation artefacts and min-max normalise into `[0, 1]`.
#[expect(clippy::float_arithmetic, reason = "normalisation arithmetic")]
fn clip_and_normalise(mut values: Vec<f32>) -> Vec<f32> {
    for value in &mut values {
        if *value < 0.0 {
            *value = 0.0;
        }
    }
    let min = values.iter().copied().fold(f32::INFINITY, f32::min);
    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let range = max - min;
    if !range.is_finite() || range < NEAR_ZERO {
        return vec![0.0; values.len()];
    }
    for value in &mut values {
        *value = (*value - min) / range;
    }
    values
}
