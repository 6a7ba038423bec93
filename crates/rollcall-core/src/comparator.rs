//! The face-comparison boundary.
//!
//! A comparator takes two image paths and returns a structured outcome. It is
//! constructed explicitly and handed to [`FaceVerifier`](crate::FaceVerifier),
//! so tests can substitute stubs for the ONNX models.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::detector::DetectorError;
use crate::recognizer::RecognizerError;
use crate::types::{ComparisonOutcome, ModelSelector};

#[derive(Error, Debug)]
pub enum ComparatorError {
    #[error("failed to decode image {path}: {source}")]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("no face detected in {0}")]
    NoFaceDetected(PathBuf),
    #[error("unsupported model: {0}")]
    UnsupportedModel(ModelSelector),
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
    #[error("comparator failure: {0}")]
    Internal(String),
}

/// One probe/reference pair to compare.
#[derive(Debug, Clone, Copy)]
pub struct ComparisonRequest<'a> {
    pub probe: &'a Path,
    pub reference: &'a Path,
    pub model: ModelSelector,
    /// When false, a failed face detection falls back to comparing the whole
    /// image instead of failing.
    pub enforce_detection: bool,
}

/// Face comparison capability. Implementations block; they may take
/// hundreds of milliseconds per call.
pub trait FaceComparator: Send + Sync {
    fn compare(&self, request: &ComparisonRequest<'_>) -> Result<ComparisonOutcome, ComparatorError>;
}
