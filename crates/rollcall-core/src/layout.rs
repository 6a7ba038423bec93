//! On-disk layout of reference images, durable captures and transient probes.
//!
//! ```text
//! <known_faces>/user_<id>/reference.png
//! <known_faces>/user_<id>/captures/capture_<YYYYmmdd_HHMMSS>.png
//! <uploads>/capture_<32 hex>.png
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use uuid::Uuid;

const REFERENCE_FILE: &str = "reference.png";
const CAPTURES_DIR: &str = "captures";
const CAPTURE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Clone)]
pub struct FaceStoreLayout {
    known_faces: PathBuf,
    uploads: PathBuf,
}

impl FaceStoreLayout {
    pub fn new(known_faces: impl Into<PathBuf>, uploads: impl Into<PathBuf>) -> Self {
        Self {
            known_faces: known_faces.into(),
            uploads: uploads.into(),
        }
    }

    pub fn known_faces_dir(&self) -> &Path {
        &self.known_faces
    }

    /// Shared directory for transient probe files.
    pub fn uploads_dir(&self) -> &Path {
        &self.uploads
    }

    pub fn user_dir(&self, user_id: u64) -> PathBuf {
        self.known_faces.join(format!("user_{user_id}"))
    }

    pub fn reference_path(&self, user_id: u64) -> PathBuf {
        self.user_dir(user_id).join(REFERENCE_FILE)
    }

    pub fn captures_dir(&self, user_id: u64) -> PathBuf {
        self.user_dir(user_id).join(CAPTURES_DIR)
    }

    /// Durable capture path stamped with `at` (second resolution, UTC).
    pub fn capture_path(&self, user_id: u64, at: DateTime<Utc>) -> PathBuf {
        self.captures_dir(user_id)
            .join(format!("capture_{}.png", at.format(CAPTURE_TIMESTAMP_FORMAT)))
    }

    /// Fresh, collision-free probe path under the uploads directory.
    pub fn probe_path(&self) -> PathBuf {
        probe_path_in(&self.uploads)
    }

    /// Recursively delete a user's face folder. Returns `false` if there was none.
    pub fn remove_user(&self, user_id: u64) -> io::Result<bool> {
        let dir = self.user_dir(user_id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::info!(user_id, path = %dir.display(), "user face folder removed");
                Ok(true)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// `capture_<uuid v4 simple>.png` inside `dir`.
pub fn probe_path_in(dir: &Path) -> PathBuf {
    dir.join(format!("capture_{}.png", Uuid::new_v4().simple()))
}
