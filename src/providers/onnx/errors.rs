//! Errors for the ONNX vision-language provider.

use std::path::PathBuf;

use thiserror::Error;

use super::artefact::{ArtefactKind, Sha256Digest};

/// Errors produced by the ONNX CLIP provider.
#[derive(Debug, Error)]
pub enum ClipOnnxError {
    #[error("failed to read artefact at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{kind} artefact at {path} expected SHA-256 {expected} but found {actual}")]
    ChecksumMismatch {
        kind: ArtefactKind,
        path: PathBuf,
        expected: Sha256Digest,
        actual: Sha256Digest,
    },
    #[error("failed to load tokenizer from {path}: {source}")]
    LoadTokenizer {
        path: PathBuf,
        #[source]
        source: tokenizers::Error,
    },
    #[error("failed to configure tokenizer truncation: {0}")]
    ConfigureTruncation(#[source] tokenizers::Error),
    #[error("failed to construct ONNX session builder: {0}")]
    CreateSessionBuilder(#[source] ort::Error),
    #[error("failed to create ONNX session: {0}")]
    CreateSession(#[source] ort::Error),
    #[error("provider requires max_sequence_length > 0")]
    ZeroSequenceLength,
    #[error("provider requires patch_grid > 0")]
    ZeroPatchGrid,
    #[error("tokenizer produced sequence of length {actual} but expected {expected}")]
    SequenceLength { expected: usize, actual: usize },
    #[error("failed to encode text: {0}")]
    Encode(#[source] tokenizers::Error),
    #[error("failed to convert input into tensor: {0}")]
    EncodeTensor(#[source] ort::Error),
    #[error("session mutex was poisoned by a previous panic")]
    SessionPoisoned,
    #[error("failed to run inference: {0}")]
    Inference(#[source] ort::Error),
    #[error("ONNX output \"{name}\" missing from session results")]
    OutputMissing { name: String },
    #[error("ONNX output \"{name}\" has shape {actual:?} but expected {expected}")]
    UnexpectedShape {
        name: String,
        expected: String,
        actual: Vec<usize>,
    },
}
