//! ONNX Runtime provider for the vision-language model.
//!
//! Loads a CLIP-style export plus its tokeniser from checksum-verified
//! artefacts and serves [`crate::providers::VisionLanguageModel`] behind a
//! mutex-guarded session.

pub mod artefact;
pub mod config;
pub mod errors;
pub mod preprocess;

mod model;

pub use artefact::{ArtefactKind, ModelArtefact, Sha256Digest};
pub use config::{ClipOnnxConfig, GraphInputs, GraphOutputs};
pub use errors::ClipOnnxError;
pub use model::ClipOnnx;
