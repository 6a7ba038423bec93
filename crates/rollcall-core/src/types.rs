use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    /// Cosine similarity in [-1, 1]. Higher = more similar.
    ///
    /// A zero-norm operand yields 0.0.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 { dot / denom } else { 0.0 }
    }

    /// Cosine distance, `1 - similarity`, in [0, 2].
    pub fn cosine_distance(&self, other: &Embedding) -> f32 {
        1.0 - self.similarity(other)
    }
}

/// Embedding model used for comparisons.
///
/// Fixed to a single model; the selector exists so the comparator boundary
/// carries the choice explicitly rather than relying on a global default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelSelector {
    #[default]
    #[serde(rename = "w600k_r50")]
    ArcFaceW600kR50,
}

impl ModelSelector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ArcFaceW600kR50 => "w600k_r50",
        }
    }

    /// ONNX file name expected in the model directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::ArcFaceW600kR50 => "w600k_r50.onnx",
        }
    }
}

impl std::fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured result of one probe/reference comparison.
///
/// Only `verified` drives the gate decision. Everything else is carried for
/// logging, and unknown fields survive a JSON round trip in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detector_backend: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ComparisonOutcome {
    /// Outcome with only the match flag set.
    pub fn verdict(verified: bool) -> Self {
        Self {
            verified: Some(verified),
            ..Self::default()
        }
    }

    /// Parse an outcome from its JSON form, e.g. `{"verified": true, "distance": 0.31}`.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// True only for an explicit positive match; a missing field counts as no match.
    pub fn is_verified(&self) -> bool {
        self.verified.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(values: &[f32]) -> Embedding {
        Embedding { values: values.to_vec(), model_version: None }
    }

    #[test]
    fn test_similarity_identical() {
        let a = emb(&[0.6, 0.8, 0.0]);
        assert!((a.similarity(&a) - 1.0).abs() < 1e-6);
        assert!(a.cosine_distance(&a).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_orthogonal() {
        let a = emb(&[1.0, 0.0]);
        let b = emb(&[0.0, 1.0]);
        assert!(a.similarity(&b).abs() < 1e-6);
        assert!((a.cosine_distance(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_opposite() {
        let a = emb(&[1.0, 0.0]);
        let b = emb(&[-1.0, 0.0]);
        assert!((a.similarity(&b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_similarity_zero_vector() {
        let a = emb(&[0.0, 0.0]);
        let b = emb(&[1.0, 0.0]);
        assert_eq!(a.similarity(&b), 0.0);
    }

    #[test]
    fn test_outcome_missing_verified_is_no_match() {
        let outcome = ComparisonOutcome::from_json(r#"{"distance": 0.12}"#).unwrap();
        assert_eq!(outcome.verified, None);
        assert!(!outcome.is_verified());
    }

    #[test]
    fn test_outcome_keeps_unknown_fields() {
        let outcome = ComparisonOutcome::from_json(
            r#"{"verified": true, "model": "w600k_r50", "facial_areas": {"img1": [1, 2]}}"#,
        )
        .unwrap();
        assert!(outcome.is_verified());
        assert_eq!(outcome.model.as_deref(), Some("w600k_r50"));
        assert!(outcome.extra.contains_key("facial_areas"));

        let round = serde_json::to_value(&outcome).unwrap();
        assert_eq!(round["facial_areas"]["img1"][1], 2);
    }

    #[test]
    fn test_model_selector_names() {
        let model = ModelSelector::default();
        assert_eq!(model.as_str(), "w600k_r50");
        assert_eq!(model.file_name(), "w600k_r50.onnx");
        assert_eq!(serde_json::to_string(&model).unwrap(), "\"w600k_r50\"");
    }
}
