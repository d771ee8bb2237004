//! Checksum-verified model artefacts.
//!
//! Both the ONNX graph and its tokeniser file are pinned to a recorded
//! SHA-256 digest and verified before anything is loaded, so a partially
//! downloaded or swapped artefact fails fast with a message naming which of
//! the two is wrong.

use std::{
    fmt,
    fs::File,
    io::{BufReader, Read},
    path::{Path, PathBuf},
};

use sha2::{Digest, Sha256};

use super::errors::ClipOnnxError;

/// Which of the provider's two artefacts a checksum refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtefactKind {
    /// The exported ONNX graph.
    Model,
    /// The tokeniser definition consumed by `tokenizers`.
    Tokenizer,
}

impl fmt::Display for ArtefactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Model => "model",
            Self::Tokenizer => "tokenizer",
        })
    }
}

/// A SHA-256 digest held as lowercase hexadecimal.
///
/// Normalised at construction, so digests recorded with stray whitespace or
/// uppercase hex compare equal to computed ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sha256Digest(String);

impl Sha256Digest {
    /// Wrap a recorded hex digest, trimming and lowercasing it.
    #[must_use]
    pub fn new(hex: impl AsRef<str>) -> Self {
        Self(hex.as_ref().trim().to_ascii_lowercase())
    }

    /// The digest as lowercase hex.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// File-based artefact that must match a recorded digest before loading.
#[derive(Debug, Clone)]
pub struct ModelArtefact {
    /// Which artefact this is, used to label verification failures.
    pub kind: ArtefactKind,
    /// Location of the artefact on disk.
    pub path: PathBuf,
    /// Expected SHA-256 digest.
    pub sha256: Sha256Digest,
}

impl ModelArtefact {
    /// An ONNX graph artefact pinned to `sha256`.
    #[must_use]
    pub fn model(path: impl Into<PathBuf>, sha256: impl AsRef<str>) -> Self {
        Self {
            kind: ArtefactKind::Model,
            path: path.into(),
            sha256: Sha256Digest::new(sha256),
        }
    }

    /// A tokeniser artefact pinned to `sha256`.
    #[must_use]
    pub fn tokenizer(path: impl Into<PathBuf>, sha256: impl AsRef<str>) -> Self {
        Self {
            kind: ArtefactKind::Tokenizer,
            path: path.into(),
            sha256: Sha256Digest::new(sha256),
        }
    }

    /// Verifies the artefact against its recorded digest.
    ///
    /// # Errors
    ///
    /// Returns `ChecksumMismatch` naming the artefact kind when the computed
    /// digest differs, and propagates I/O errors while reading the file.
    pub fn verify(&self) -> Result<(), ClipOnnxError> {
        let actual = compute_sha256(&self.path)?;
        if actual == self.sha256 {
            Ok(())
        } else {
            Err(ClipOnnxError::ChecksumMismatch {
                kind: self.kind,
                path: self.path.clone(),
                expected: self.sha256.clone(),
                actual,
            })
        }
    }
}

/// Computes the SHA-256 digest of the file at `path`.
///
/// # Errors
///
/// Returns I/O errors from opening or reading the file.
pub fn compute_sha256(path: &Path) -> Result<Sha256Digest, ClipOnnxError> {
    let file = File::open(path).map_err(|source| ClipOnnxError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 8192];
    loop {
        let read = reader.read(&mut buffer).map_err(|source| ClipOnnxError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if read == 0 {
            break;
        }
        let chunk = buffer.get(..read).ok_or_else(|| ClipOnnxError::Io {
            path: path.to_path_buf(),
            source: std::io::Error::other("read reported bytes beyond buffer length"),
        })?;
        hasher.update(chunk);
    }
    Ok(Sha256Digest::new(format!("{:x}", hasher.finalize())))
}
