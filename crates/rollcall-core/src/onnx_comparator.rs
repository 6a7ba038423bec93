//! Production [`FaceComparator`]: SCRFD detection + ArcFace embeddings.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use image::RgbImage;
use serde_json::Value;

use crate::alignment;
use crate::comparator::{ComparatorError, ComparisonRequest, FaceComparator};
use crate::detector::FaceDetector;
use crate::recognizer::FaceRecognizer;
use crate::types::{BoundingBox, ComparisonOutcome, Embedding, ModelSelector};

/// SCRFD model file expected next to the ArcFace model.
pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.40;

const DETECTOR_BACKEND: &str = "scrfd";
const SIMILARITY_METRIC: &str = "cosine";

/// Compares two image files by the cosine similarity of their ArcFace
/// embeddings.
///
/// Sessions are loaded once and shared; concurrent callers serialize on
/// the model locks only for the inference itself.
pub struct OnnxFaceComparator {
    detector: Mutex<FaceDetector>,
    recognizer: Mutex<FaceRecognizer>,
    model: ModelSelector,
    threshold: f32,
}

/// An embedding plus whether it came from a detected face.
struct FaceEmbedding {
    embedding: Embedding,
    detected: bool,
}

impl OnnxFaceComparator {
    /// Load both models from `model_dir`. Fails if either file is missing.
    pub fn load(model_dir: &Path, model: ModelSelector, threshold: f32) -> Result<Self, ComparatorError> {
        let detector_path = model_dir.join(DETECTOR_MODEL_FILE);
        let recognizer_path = model_dir.join(model.file_name());

        let detector = FaceDetector::load(&detector_path.to_string_lossy())?;
        let recognizer = FaceRecognizer::load(&recognizer_path.to_string_lossy(), model)?;

        tracing::info!(
            model_dir = %model_dir.display(),
            model = %model,
            threshold,
            "face comparator ready"
        );

        Ok(Self {
            detector: Mutex::new(detector),
            recognizer: Mutex::new(recognizer),
            model,
            threshold,
        })
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    fn embed(&self, path: &Path, enforce_detection: bool) -> Result<FaceEmbedding, ComparatorError> {
        let image = load_rgb(path)?;
        let faces = lock(&self.detector, "detector")?.detect(&image)?;

        let (face, detected) = match faces.into_iter().next() {
            Some(face) => (face, true),
            None if enforce_detection => return Err(ComparatorError::NoFaceDetected(path.to_path_buf())),
            None => {
                tracing::debug!(path = %path.display(), "no face detected; comparing whole image");
                (whole_image_face(&image), false)
            }
        };

        let embedding = lock(&self.recognizer, "recognizer")?.extract(&image, &face)?;
        Ok(FaceEmbedding { embedding, detected })
    }
}

impl FaceComparator for OnnxFaceComparator {
    fn compare(&self, request: &ComparisonRequest<'_>) -> Result<ComparisonOutcome, ComparatorError> {
        if request.model != self.model {
            return Err(ComparatorError::UnsupportedModel(request.model));
        }

        let probe = self.embed(request.probe, request.enforce_detection)?;
        let reference = self.embed(request.reference, request.enforce_detection)?;

        let similarity = probe.embedding.similarity(&reference.embedding);
        let mut outcome = decide(similarity, self.threshold, self.model);
        outcome
            .extra
            .insert("probe_face_detected".into(), Value::Bool(probe.detected));
        outcome
            .extra
            .insert("reference_face_detected".into(), Value::Bool(reference.detected));
        Ok(outcome)
    }
}

/// Threshold decision on a cosine similarity.
fn decide(similarity: f32, threshold: f32, model: ModelSelector) -> ComparisonOutcome {
    let mut outcome = ComparisonOutcome {
        verified: Some(similarity >= threshold),
        distance: Some(1.0 - similarity),
        similarity: Some(similarity),
        threshold: Some(threshold),
        model: Some(model.as_str().to_string()),
        detector_backend: Some(DETECTOR_BACKEND.to_string()),
        ..ComparisonOutcome::default()
    };
    outcome
        .extra
        .insert("similarity_metric".into(), Value::from(SIMILARITY_METRIC));
    outcome
}

/// Decode an image file, sniffing the format from its bytes. Probe and
/// reference files are always named `.png` whatever the capture held.
fn load_rgb(path: &Path) -> Result<RgbImage, ComparatorError> {
    let decode = || -> image::ImageResult<RgbImage> {
        let image = image::ImageReader::open(path)?.with_guessed_format()?.decode()?;
        Ok(image.to_rgb8())
    };
    decode().map_err(|source| ComparatorError::ImageDecode {
        path: path.to_path_buf(),
        source,
    })
}

fn whole_image_face(image: &RgbImage) -> BoundingBox {
    BoundingBox {
        x: 0.0,
        y: 0.0,
        width: image.width() as f32,
        height: image.height() as f32,
        confidence: 0.0,
        landmarks: Some(alignment::whole_image_landmarks(image.width(), image.height())),
    }
}

fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> Result<MutexGuard<'a, T>, ComparatorError> {
    mutex
        .lock()
        .map_err(|_| ComparatorError::Internal(format!("{what} lock poisoned")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_decide_threshold_inclusive() {
        let model = ModelSelector::default();
        assert!(decide(0.40, 0.40, model).is_verified());
        assert!(!decide(0.39, 0.40, model).is_verified());
    }

    #[test]
    fn test_decide_reports_distance() {
        let outcome = decide(0.75, 0.40, ModelSelector::default());
        assert!((outcome.distance.unwrap() - 0.25).abs() < 1e-6);
        assert_eq!(outcome.model.as_deref(), Some("w600k_r50"));
        assert_eq!(outcome.detector_backend.as_deref(), Some("scrfd"));
        assert_eq!(outcome.extra["similarity_metric"], "cosine");
    }

    #[test]
    fn test_whole_image_face_has_landmarks() {
        let face = whole_image_face(&RgbImage::new(320, 240));
        assert_eq!((face.width, face.height), (320.0, 240.0));
        assert!(face.landmarks.is_some());
    }

    #[test]
    fn test_load_rgb_rejects_non_image() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("capture.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        assert!(matches!(load_rgb(&path), Err(ComparatorError::ImageDecode { .. })));
    }

    #[test]
    fn test_load_rgb_sniffs_jpeg_named_png() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("capture.png");
        let mut jpeg = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(RgbImage::from_pixel(32, 24, image::Rgb([200, 120, 40])))
            .write_to(&mut jpeg, image::ImageFormat::Jpeg)
            .unwrap();
        std::fs::write(&path, jpeg.into_inner()).unwrap();

        let image = load_rgb(&path).unwrap();
        assert_eq!(image.dimensions(), (32, 24));
    }

    #[test]
    fn test_load_requires_model_files() {
        let tmp = TempDir::new().unwrap();
        let err = OnnxFaceComparator::load(tmp.path(), ModelSelector::default(), DEFAULT_SIMILARITY_THRESHOLD)
            .err()
            .unwrap();
        assert!(matches!(err, ComparatorError::Detector(_)));
    }
}
