use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use rollcall_core::{persist, FaceComparator, FaceStoreLayout, FaceVerifier, IngestError};
use thiserror::Error;

use crate::config::Config;
use crate::ledger::{AttendanceLedger, AttendanceRecord, LedgerError};

/// Shown for every rejected capture, whatever the underlying cause.
pub const NOT_RECOGNIZED_MESSAGE: &str =
    "Face not recognized. Please try again with good lighting and alignment.";

#[derive(Error, Debug)]
pub enum GateError {
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error("failed to remove face data for user {user_id}: {source}")]
    Remove {
        user_id: u64,
        #[source]
        source: std::io::Error,
    },
    #[error("verification task failed: {0}")]
    Task(String),
}

/// A student's request to mark themselves present.
#[derive(Debug, Clone)]
pub struct MarkRequest {
    pub user_id: u64,
    pub unit_id: u64,
    /// Data URI of the capture; may be empty if the browser sent nothing.
    pub capture: String,
    /// The user's enrolled reference image, if any.
    pub reference: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarkOutcome {
    Recorded(AttendanceRecord),
    NotRecognized,
}

impl MarkOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            Self::Recorded(_) => "Attendance marked!",
            Self::NotRecognized => NOT_RECOGNIZED_MESSAGE,
        }
    }
}

/// Verifies captures and records attendance for accepted ones.
pub struct AttendanceGate {
    verifier: FaceVerifier,
    layout: FaceStoreLayout,
    ledger: Arc<dyn AttendanceLedger>,
}

impl AttendanceGate {
    pub fn new(verifier: FaceVerifier, layout: FaceStoreLayout, ledger: Arc<dyn AttendanceLedger>) -> Self {
        Self { verifier, layout, ledger }
    }

    /// Build a gate whose probe directory and detection policy come from `config`.
    pub fn from_config(
        config: &Config,
        comparator: Arc<dyn FaceComparator>,
        ledger: Arc<dyn AttendanceLedger>,
    ) -> Self {
        let layout = config.layout();
        let verifier = FaceVerifier::new(comparator, layout.uploads_dir())
            .with_enforce_detection(config.enforce_detection);
        Self::new(verifier, layout, ledger)
    }

    pub fn layout(&self) -> &FaceStoreLayout {
        &self.layout
    }

    /// Store (or replace) a user's reference photo.
    pub fn enroll_reference(&self, user_id: u64, data_uri: &str) -> Result<PathBuf, GateError> {
        let path = persist(data_uri, self.layout.reference_path(user_id))?;
        tracing::info!(user_id, path = %path.display(), "reference image enrolled");
        Ok(path)
    }

    /// Fail-closed capture check; see [`FaceVerifier::verify`].
    pub fn verify(&self, capture: &str, reference: Option<&Path>) -> bool {
        if capture.is_empty() {
            tracing::info!("verify: empty capture");
            return false;
        }
        self.verifier.verify(capture, reference)
    }

    pub fn mark_attendance(&self, request: &MarkRequest) -> Result<MarkOutcome, GateError> {
        if !self.verify(&request.capture, request.reference.as_deref()) {
            tracing::info!(user_id = request.user_id, unit_id = request.unit_id, "attendance rejected");
            return Ok(MarkOutcome::NotRecognized);
        }
        self.record_accepted(request).map(MarkOutcome::Recorded)
    }

    /// Persist the durable capture and hand the attendance row to the ledger.
    /// Only called after a positive verification.
    pub(crate) fn record_accepted(&self, request: &MarkRequest) -> Result<AttendanceRecord, GateError> {
        let now = Utc::now();
        let capture_path = persist(&request.capture, self.layout.capture_path(request.user_id, now))?;

        let record =
            AttendanceRecord::self_marked(request.user_id, request.unit_id, capture_path.clone(), now);
        if let Err(e) = self.ledger.record(&record) {
            if let Err(remove_err) = std::fs::remove_file(&capture_path) {
                tracing::debug!(
                    path = %capture_path.display(),
                    error = %remove_err,
                    "failed to remove unrecorded capture"
                );
            }
            return Err(e.into());
        }

        tracing::info!(
            user_id = record.user_id,
            unit_id = record.unit_id,
            date = %record.date,
            "attendance recorded"
        );
        Ok(record)
    }

    /// Delete the user's reference photo and captures.
    pub fn remove_user_faces(&self, user_id: u64) -> Result<bool, GateError> {
        self.layout
            .remove_user(user_id)
            .map_err(|source| GateError::Remove { user_id, source })
    }
}
