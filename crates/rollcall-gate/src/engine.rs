use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::config::{Config, DEFAULT_MAX_CONCURRENT_VERIFICATIONS};
use crate::gate::{AttendanceGate, GateError, MarkOutcome, MarkRequest};

/// Clone-safe async handle to an [`AttendanceGate`].
///
/// Model inference blocks, so each verification runs on tokio's blocking
/// pool under a timeout. At most `max_concurrent` comparisons run at once;
/// a slot is held until the comparison really finishes, so work abandoned
/// by a timed-out caller still counts against the limit. Waiting for a slot
/// shares the same timeout. A verification that overruns resolves to
/// `false`; a blocking task that already started keeps running in the
/// background and still removes its probe file.
#[derive(Clone)]
pub struct EngineHandle {
    gate: Arc<AttendanceGate>,
    verify_timeout: Duration,
    slots: Arc<Semaphore>,
    max_concurrent: usize,
}

impl EngineHandle {
    pub fn new(gate: AttendanceGate, verify_timeout: Duration) -> Self {
        Self {
            gate: Arc::new(gate),
            verify_timeout,
            slots: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENT_VERIFICATIONS)),
            max_concurrent: DEFAULT_MAX_CONCURRENT_VERIFICATIONS,
        }
    }

    /// Build a handle with the timeout and concurrency limit from `config`.
    pub fn from_config(gate: AttendanceGate, config: &Config) -> Self {
        Self::new(gate, config.verify_timeout()).with_max_concurrent(config.max_concurrent_verifications)
    }

    /// Limit how many comparisons run at once (at least one).
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self.slots = Arc::new(Semaphore::new(self.max_concurrent));
        self
    }

    pub fn gate(&self) -> &AttendanceGate {
        &self.gate
    }

    pub fn verify_timeout(&self) -> Duration {
        self.verify_timeout
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub async fn verify(&self, capture: String, reference: Option<PathBuf>) -> bool {
        let gate = Arc::clone(&self.gate);
        let slots = Arc::clone(&self.slots);
        let work = async move {
            let Ok(slot) = slots.acquire_owned().await else {
                return Ok::<_, tokio::task::JoinError>(false);
            };
            tokio::task::spawn_blocking(move || {
                let _slot = slot;
                gate.verify(&capture, reference.as_deref())
            })
            .await
        };

        match tokio::time::timeout(self.verify_timeout, work).await {
            Ok(Ok(verified)) => verified,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "verification task failed; treating as not verified");
                false
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.verify_timeout.as_millis() as u64,
                    available_slots = self.slots.available_permits(),
                    "verification timed out; treating as not verified"
                );
                false
            }
        }
    }

    pub async fn mark_attendance(&self, request: MarkRequest) -> Result<MarkOutcome, GateError> {
        if !self.verify(request.capture.clone(), request.reference.clone()).await {
            tracing::info!(user_id = request.user_id, unit_id = request.unit_id, "attendance rejected");
            return Ok(MarkOutcome::NotRecognized);
        }

        let gate = Arc::clone(&self.gate);
        tokio::task::spawn_blocking(move || gate.record_accepted(&request))
            .await
            .map_err(|e| GateError::Task(e.to_string()))?
            .map(MarkOutcome::Recorded)
    }

    pub async fn enroll_reference(&self, user_id: u64, data_uri: String) -> Result<PathBuf, GateError> {
        let gate = Arc::clone(&self.gate);
        tokio::task::spawn_blocking(move || gate.enroll_reference(user_id, &data_uri))
            .await
            .map_err(|e| GateError::Task(e.to_string()))?
    }
}
