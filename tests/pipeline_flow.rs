//! End-to-end pipeline behaviour over a scripted model.

mod support;

use std::convert::Infallible;

use product_lens::pipeline::DEFAULT_PATCH_GRID;
use product_lens::{
    Category, DecodedImage, JointOutputs, Pipeline, PipelineError, VisionLanguageModel,
};
use support::{approx_eq, png_bytes};

/// Model whose outputs are derived from the text it receives.
///
/// Cross-attention mass always lands on the first token; the fine-tuned
/// head always votes for `Watches`.
struct ScriptedModel {
    break_attention: bool,
}

impl ScriptedModel {
    fn outputs(&self, text: &str) -> JointOutputs {
        let patches = DEFAULT_PATCH_GRID * DEFAULT_PATCH_GRID;
        let seq = patches + 1;
        let tokens: Vec<String> = text.split(", ").map(|w| format!("{w}</w>")).collect();
        let vision_attention = if self.break_attention {
            vec![vec![0.0; 2]; 2]
        } else {
            // All queries look at the first patch.
            let mut attention = vec![vec![0.0_f32; seq]; seq];
            for row in &mut attention {
                row[1] = 1.0;
            }
            attention
        };
        let mut cross_attention = vec![vec![0.0_f32; tokens.len()]; patches];
        for row in &mut cross_attention {
            row[0] = 1.0;
        }
        JointOutputs {
            image_embedding: vec![1.0, 0.0],
            text_embedding: vec![0.0, 1.0],
            logits: Some(vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 6.0]),
            vision_attention,
            cross_attention,
            attention_mask: vec![1; tokens.len()],
            tokens,
        }
    }
}

impl VisionLanguageModel for ScriptedModel {
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

fn pipeline() -> Pipeline<ScriptedModel> {
    Pipeline::new(ScriptedModel {
        break_attention: false,
    })
}

#[test]
fn full_run_classifies_and_explains() {
    let outcome = match pipeline().run(&png_bytes(80, 60), "leather watch strap") {
        Ok(outcome) => outcome,
        Err(error) => panic!("pipeline failed: {error}"),
    };
    assert_eq!(outcome.prediction.predicted_category, Category::Watches);
    assert_eq!(outcome.prediction.keywords, ["leather", "watch", "strap"]);

    let total: f32 = outcome
        .prediction
        .category_scores
        .iter()
        .map(|cs| cs.score)
        .sum();
    assert!(approx_eq(total, 1.0, 1e-6));

    let explanation = match outcome.explanation {
        Some(explanation) => explanation,
        None => panic!("expected an explanation"),
    };
    assert_eq!(explanation.attention_map.shape(), (60, 80));
    for value in explanation.attention_map.values() {
        assert!((0.0..=1.0).contains(value));
    }
}

#[test]
fn confidence_is_the_argmax_probability() {
    let outcome = match pipeline().run(&png_bytes(32, 32), "leather watch strap") {
        Ok(outcome) => outcome,
        Err(error) => panic!("pipeline failed: {error}"),
    };
    let winner = outcome
        .prediction
        .score(outcome.prediction.predicted_category);
    assert_eq!(winner, Some(outcome.prediction.confidence));
    for cs in &outcome.prediction.category_scores {
        assert!(cs.score <= outcome.prediction.confidence);
    }
}

#[test]
fn oversized_image_attributes_at_original_dimensions() {
    let explanation = match pipeline().attribute(
        &png_bytes(800, 600),
        &["watch".to_owned(), "leather".to_owned()],
    ) {
        Ok(explanation) => explanation,
        Err(error) => panic!("attribution failed: {error}"),
    };
    assert_eq!(explanation.attention_map.shape(), (600, 800));
}

#[test]
fn attribution_credits_the_attended_keyword_only() {
    let explanation = match pipeline().attribute(
        &png_bytes(64, 64),
        &[
            "watch".to_owned(),
            "leather".to_owned(),
            "waterproof".to_owned(),
        ],
    ) {
        Ok(explanation) => explanation,
        Err(error) => panic!("attribution failed: {error}"),
    };
    let attribution = &explanation.keyword_attribution;
    assert!(approx_eq(attribution.score("watch").unwrap_or(-1.0), 1.0, 1e-6));
    assert_eq!(attribution.score("leather"), Some(0.0));
    assert_eq!(attribution.score("waterproof"), Some(0.0));
    assert!(approx_eq(attribution.total(), 1.0, 1e-6));
}

#[test]
fn empty_text_is_a_hard_stop_before_inference() {
    for raw in ["", "   ", "the of and"] {
        let result = pipeline().run(&png_bytes(32, 32), raw);
        assert!(
            matches!(result, Err(PipelineError::ExtractionEmpty)),
            "expected ExtractionEmpty for {raw:?}"
        );
    }
}

#[test]
fn unreadable_image_bytes_are_an_input_error() {
    let result = pipeline().run(b"not an image", "leather watch strap");
    assert!(matches!(result, Err(PipelineError::Input(_))));
}

#[test]
fn broken_attention_degrades_to_prediction_only() {
    let pipeline = Pipeline::new(ScriptedModel {
        break_attention: true,
    });
    let outcome = match pipeline.run(&png_bytes(32, 32), "leather watch strap") {
        Ok(outcome) => outcome,
        Err(error) => panic!("pipeline failed: {error}"),
    };
    assert_eq!(outcome.prediction.predicted_category, Category::Watches);
    assert!(outcome.explanation.is_none());
}
