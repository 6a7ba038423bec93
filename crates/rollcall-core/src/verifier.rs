//! Fail-closed face verification.
//!
//! [`FaceVerifier::verify`] answers one question: does this capture match the
//! stored reference? Every failure (missing reference, undecodable probe,
//! comparator error, comparator panic) resolves to `false`. Failures are
//! told apart from a plain no-match only in the logs.

use std::any::Any;
use std::fs;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::comparator::{ComparisonRequest, FaceComparator};
use crate::ingest::EncodedImage;
use crate::layout::probe_path_in;
use crate::types::ModelSelector;

/// Verifies captures against reference images through an injected comparator.
#[derive(Clone)]
pub struct FaceVerifier {
    comparator: Arc<dyn FaceComparator>,
    probe_dir: PathBuf,
    model: ModelSelector,
    enforce_detection: bool,
}

impl FaceVerifier {
    /// Probes are written to `probe_dir` for the duration of one call.
    pub fn new(comparator: Arc<dyn FaceComparator>, probe_dir: impl Into<PathBuf>) -> Self {
        Self {
            comparator,
            probe_dir: probe_dir.into(),
            model: ModelSelector::default(),
            enforce_detection: false,
        }
    }

    pub fn with_enforce_detection(mut self, enforce_detection: bool) -> Self {
        self.enforce_detection = enforce_detection;
        self
    }

    pub fn probe_dir(&self) -> &Path {
        &self.probe_dir
    }

    /// Compare a data-URI capture against the image at `reference`.
    ///
    /// Returns `true` only when the comparator reports an explicit match.
    /// An empty or missing reference short-circuits to `false` without
    /// creating a probe file or calling the comparator.
    pub fn verify(&self, probe: &str, reference: Option<&Path>) -> bool {
        let Some(reference) = reference.filter(|p| !p.as_os_str().is_empty()) else {
            tracing::info!("verify: no reference image enrolled");
            return false;
        };
        if !reference.exists() {
            tracing::info!(reference = %reference.display(), "verify: reference image missing");
            return false;
        }

        let probe_file = TempProbe::new(probe_path_in(&self.probe_dir));
        if let Err(e) = EncodedImage::parse(probe).and_then(|image| image.persist(probe_file.path())) {
            tracing::warn!(error = %e, "verify: could not materialize probe");
            return false;
        }

        let request = ComparisonRequest {
            probe: probe_file.path(),
            reference,
            model: self.model,
            enforce_detection: self.enforce_detection,
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.comparator.compare(&request)));

        match result {
            Ok(Ok(outcome)) => {
                let verified = outcome.is_verified();
                tracing::info!(
                    verified,
                    distance = ?outcome.distance,
                    similarity = ?outcome.similarity,
                    threshold = ?outcome.threshold,
                    model = outcome.model.as_deref().unwrap_or(self.model.as_str()),
                    detector = outcome.detector_backend.as_deref().unwrap_or("unknown"),
                    extra = ?outcome.extra,
                    reference = %reference.display(),
                    "verify: comparison complete"
                );
                verified
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    error = %e,
                    detail = ?e,
                    reference = %reference.display(),
                    "verify: comparison failed; treating as not verified"
                );
                false
            }
            Err(payload) => {
                tracing::error!(
                    panic = panic_message(payload.as_ref()),
                    reference = %reference.display(),
                    "verify: comparator panicked; treating as not verified"
                );
                false
            }
        }
    }
}

/// A probe file that is deleted when dropped, whatever path the call took.
struct TempProbe {
    path: PathBuf,
}

impl TempProbe {
    fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempProbe {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            // The probe may never have been written.
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "failed to remove probe file");
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::ComparatorError;
    use crate::types::ComparisonOutcome;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingComparator {
        calls: AtomicUsize,
    }

    impl FaceComparator for CountingComparator {
        fn compare(&self, _request: &ComparisonRequest<'_>) -> Result<ComparisonOutcome, ComparatorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ComparisonOutcome::verdict(true))
        }
    }

    #[test]
    fn test_temp_probe_removed_on_drop() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("capture_x.png");
        {
            let probe = TempProbe::new(path.clone());
            std::fs::write(probe.path(), b"x").unwrap();
            assert!(path.exists());
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_temp_probe_drop_tolerates_missing_file() {
        let tmp = TempDir::new().unwrap();
        drop(TempProbe::new(tmp.path().join("never_written.png")));
    }

    #[test]
    fn test_missing_reference_skips_comparator() {
        let tmp = TempDir::new().unwrap();
        let comparator = Arc::new(CountingComparator::default());
        let verifier = FaceVerifier::new(comparator.clone(), tmp.path());

        assert!(!verifier.verify("data:image/png;base64,AAAA", None));
        assert!(!verifier.verify("data:image/png;base64,AAAA", Some(Path::new(""))));
        assert_eq!(comparator.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_panic_message_variants() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("boom"));
        let borrowed: Box<dyn Any + Send> = Box::new("bang");
        let other: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(owned.as_ref()), "boom");
        assert_eq!(panic_message(borrowed.as_ref()), "bang");
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
