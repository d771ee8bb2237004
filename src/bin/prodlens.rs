//! Command-line front end for the classification pipeline.

use std::process::ExitCode;

use ortho_config::OrthoConfig;
use tracing_subscriber::EnvFilter;

use product_lens::ProdlensArgs;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = match ProdlensArgs::load() {
        Ok(args) => args,
        Err(error) => {
            eprintln!("failed to load configuration: {error}");
            return ExitCode::FAILURE;
        }
    };

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}

/// Execute the requested classification.
fn run(args: &ProdlensArgs) -> Result<(), String> {
    let image = args
        .image
        .as_ref()
        .ok_or("an --image path is required")?;
    let text = args.text.as_deref().ok_or("a --text value is required")?;
    let image_bytes =
        std::fs::read(image).map_err(|e| format!("failed to read {}: {e}", image.display()))?;
    classify(args, &image_bytes, text)
}

#[cfg(feature = "onnx")]
fn classify(args: &ProdlensArgs, image_bytes: &[u8], text: &str) -> Result<(), String> {
    use product_lens::config::ExtractionConfig;
    use product_lens::providers::onnx::{ClipOnnx, ClipOnnxConfig, ModelArtefact};
    use product_lens::Pipeline;

    let model = ModelArtefact::model(
        args.model_path
            .clone()
            .ok_or("a --model-path is required")?,
        args.model_sha256
            .as_deref()
            .ok_or("a --model-sha256 is required")?,
    );
    let tokenizer = ModelArtefact::tokenizer(
        args.tokenizer_path
            .clone()
            .ok_or("a --tokenizer-path is required")?,
        args.tokenizer_sha256
            .as_deref()
            .ok_or("a --tokenizer-sha256 is required")?,
    );

    let provider = ClipOnnx::new(ClipOnnxConfig::new(model, tokenizer))
        .map_err(|e| format!("failed to load model: {e}"))?;
    let extraction = ExtractionConfig {
        top_n: args.top_n,
        ..ExtractionConfig::default()
    };
    extraction
        .validate()
        .map_err(|e| format!("invalid configuration: {e}"))?;

    let pipeline = Pipeline::with_config(provider, &extraction);
    let outcome = pipeline
        .run(image_bytes, text)
        .map_err(|e| format!("classification failed: {e}"))?;

    let rendered = serde_json::json!({
        "prediction": outcome.prediction,
        "keyword_attribution": outcome.explanation.as_ref().map(|e| &e.keyword_attribution),
    });
    let body = serde_json::to_string_pretty(&rendered)
        .map_err(|e| format!("failed to render result: {e}"))?;
    println!("{body}");
    Ok(())
}

#[cfg(not(feature = "onnx"))]
fn classify(_args: &ProdlensArgs, _image_bytes: &[u8], _text: &str) -> Result<(), String> {
    Err("this build has no local model support; rebuild with the `onnx` feature".to_owned())
}
