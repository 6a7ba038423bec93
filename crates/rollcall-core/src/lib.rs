//! rollcall-core: capture ingestion and fail-closed face verification.
//!
//! Captures arrive as data URIs, are written to disk, and are compared
//! against a user's reference photo by a [`FaceComparator`]. The shipped
//! comparator runs SCRFD detection and ArcFace recognition on ONNX Runtime.

pub mod alignment;
pub mod comparator;
pub mod detector;
pub mod ingest;
pub mod layout;
pub mod onnx_comparator;
pub mod recognizer;
pub mod types;
pub mod verifier;

pub use comparator::{ComparatorError, ComparisonRequest, FaceComparator};
pub use detector::FaceDetector;
pub use ingest::{persist, EncodedImage, IngestError};
pub use layout::FaceStoreLayout;
pub use onnx_comparator::{OnnxFaceComparator, DEFAULT_SIMILARITY_THRESHOLD};
pub use recognizer::FaceRecognizer;
pub use types::{BoundingBox, ComparisonOutcome, Embedding, ModelSelector};
pub use verifier::FaceVerifier;
