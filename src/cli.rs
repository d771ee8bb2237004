//! CLI argument types and layered configuration for the `prodlens` binary.
//! Loads from CLI args, environment (prefix `PRODLENS_`), and optional
//! config files.

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use ortho_config::OrthoError;
use serde::Deserialize;
use std::path::PathBuf;

use crate::keywords::DEFAULT_TOP_N;

/// Command-line arguments for the `prodlens` binary.
///
/// Configuration values are loaded from command line arguments, environment
/// variables (prefixed with `PRODLENS_`), and an optional configuration
/// file.
///
/// # Examples
///
/// Parse flags directly:
/// ```
/// use product_lens::cli::ProdlensArgs;
/// use ortho_config::OrthoConfig;
///
/// let args = ProdlensArgs::load_from_iter(["prodlens", "--top-n", "5"])
///     .expect("load args from CLI iterator");
/// assert_eq!(args.top_n, 5);
/// ```
///
/// Load from a configuration file:
/// ```
/// use product_lens::cli::ProdlensArgs;
/// use ortho_config::OrthoConfig;
/// use std::io::Write;
/// use tempfile::NamedTempFile;
///
/// let mut file = NamedTempFile::new().expect("create temp file");
/// writeln!(file, "text = \"leather watch strap\"").expect("write config");
/// let path = file.path().to_str().expect("path str");
/// let args = ProdlensArgs::load_from_iter(["prodlens", "--config-path", path])
///     .expect("load args from config path");
/// assert_eq!(args.text.as_deref(), Some("leather watch strap"));
/// ```
#[derive(Debug, Deserialize, ortho_config::OrthoConfig)]
#[ortho_config(prefix = "PRODLENS")]
pub struct ProdlensArgs {
    /// Path to the product image to classify.
    pub image: Option<PathBuf>,

    /// Raw product text (title plus description).
    pub text: Option<String>,

    /// Path to the ONNX model artefact.
    pub model_path: Option<PathBuf>,

    /// Expected SHA-256 of the model artefact.
    pub model_sha256: Option<String>,

    /// Path to the tokeniser artefact.
    pub tokenizer_path: Option<PathBuf>,

    /// Expected SHA-256 of the tokeniser artefact.
    pub tokenizer_sha256: Option<String>,

    /// Maximum number of keywords to extract.
    #[ortho_config(default = 15)]
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Optional path to a configuration file.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

fn default_top_n() -> usize {
    DEFAULT_TOP_N
}

impl ProdlensArgs {
    /// Load configuration solely from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an [`OrthoError`] if any variable cannot be parsed.
    pub fn load_from_env() -> Result<Self, OrthoError> {
        Figment::new()
            .merge(Env::prefixed("PRODLENS_"))
            .extract()
            .map_err(Into::into)
    }

    /// Load configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an [`OrthoError`] if the file cannot be read or parsed.
    pub fn load_from_config(path: &str) -> Result<Self, OrthoError> {
        Figment::new()
            .merge(Toml::file(path))
            .extract()
            .map_err(Into::into)
    }

    /// Load configuration from environment variables and a file path.
    ///
    /// # Errors
    ///
    /// Returns an [`OrthoError`] if either source contains invalid values.
    pub fn load_from_env_and_config(path: &str) -> Result<Self, OrthoError> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("PRODLENS_"))
            .extract()
            .map_err(Into::into)
    }
}
