use std::path::PathBuf;
use std::time::Duration;

use rollcall_core::{FaceStoreLayout, DEFAULT_SIMILARITY_THRESHOLD};
use serde::Serialize;

pub const DEFAULT_VERIFY_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_CONCURRENT_VERIFICATIONS: usize = 4;

/// Gate configuration, loaded from environment variables.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Root for reference photos and durable captures (`user_<id>/...`).
    pub known_faces_dir: PathBuf,
    /// Shared directory for transient probe files.
    pub upload_dir: PathBuf,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Cosine similarity threshold for a positive match.
    pub similarity_threshold: f32,
    /// Upper bound on one verification, in seconds.
    pub verify_timeout_secs: u64,
    /// Comparisons allowed to run at once; later requests wait for a slot.
    pub max_concurrent_verifications: usize,
    /// Fail comparisons where no face is detected instead of comparing whole images.
    pub enforce_detection: bool,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = var("ROLLCALL_DATA_DIR").map(PathBuf::from).unwrap_or_else(|| {
            var("XDG_DATA_HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| {
                    let home = var("HOME").unwrap_or_else(|| "/tmp".to_string());
                    PathBuf::from(home).join(".local/share")
                })
                .join("rollcall")
        });

        let dir = |key: &str, default: &str| {
            var(key)
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join(default))
        };

        Self {
            known_faces_dir: dir("ROLLCALL_KNOWN_FACES_DIR", "known_faces"),
            upload_dir: dir("ROLLCALL_UPLOAD_DIR", "uploads"),
            model_dir: dir("ROLLCALL_MODEL_DIR", "models"),
            similarity_threshold: parse_or(
                var("ROLLCALL_SIMILARITY_THRESHOLD"),
                DEFAULT_SIMILARITY_THRESHOLD,
            ),
            verify_timeout_secs: nonzero_or(
                var("ROLLCALL_VERIFY_TIMEOUT_SECS"),
                DEFAULT_VERIFY_TIMEOUT_SECS,
            ),
            max_concurrent_verifications: nonzero_or(
                var("ROLLCALL_MAX_CONCURRENT_VERIFICATIONS"),
                DEFAULT_MAX_CONCURRENT_VERIFICATIONS,
            ),
            enforce_detection: var("ROLLCALL_ENFORCE_DETECTION")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        }
    }

    pub fn layout(&self) -> FaceStoreLayout {
        FaceStoreLayout::new(&self.known_faces_dir, &self.upload_dir)
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.verify_timeout_secs)
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, default: T) -> T {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

/// Like [`parse_or`], but zero also means "use the default".
fn nonzero_or<T: std::str::FromStr + PartialEq + Default + Copy>(value: Option<String>, default: T) -> T {
    match parse_or(value, default) {
        v if v == T::default() => default,
        v => v,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_under_home() {
        let cfg = config(&[("HOME", "/home/ada")]);
        assert_eq!(cfg.known_faces_dir, PathBuf::from("/home/ada/.local/share/rollcall/known_faces"));
        assert_eq!(cfg.upload_dir, PathBuf::from("/home/ada/.local/share/rollcall/uploads"));
        assert_eq!(cfg.model_dir, PathBuf::from("/home/ada/.local/share/rollcall/models"));
        assert!((cfg.similarity_threshold - 0.40).abs() < 1e-6);
        assert_eq!(cfg.verify_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.max_concurrent_verifications, 4);
        assert!(!cfg.enforce_detection);
    }

    #[test]
    fn test_overrides() {
        let cfg = config(&[
            ("XDG_DATA_HOME", "/var/lib"),
            ("ROLLCALL_UPLOAD_DIR", "/tmp/probes"),
            ("ROLLCALL_SIMILARITY_THRESHOLD", "0.55"),
            ("ROLLCALL_VERIFY_TIMEOUT_SECS", "3"),
            ("ROLLCALL_MAX_CONCURRENT_VERIFICATIONS", "2"),
            ("ROLLCALL_ENFORCE_DETECTION", "Yes"),
        ]);
        assert_eq!(cfg.known_faces_dir, PathBuf::from("/var/lib/rollcall/known_faces"));
        assert_eq!(cfg.upload_dir, PathBuf::from("/tmp/probes"));
        assert!((cfg.similarity_threshold - 0.55).abs() < 1e-6);
        assert_eq!(cfg.verify_timeout_secs, 3);
        assert_eq!(cfg.max_concurrent_verifications, 2);
        assert!(cfg.enforce_detection);
    }

    #[test]
    fn test_unparseable_values_fall_back() {
        let cfg = config(&[
            ("ROLLCALL_DATA_DIR", "/data"),
            ("ROLLCALL_SIMILARITY_THRESHOLD", "high"),
            ("ROLLCALL_VERIFY_TIMEOUT_SECS", "-1"),
        ]);
        assert_eq!(cfg.model_dir, PathBuf::from("/data/models"));
        assert!((cfg.similarity_threshold - DEFAULT_SIMILARITY_THRESHOLD).abs() < 1e-6);
        assert_eq!(cfg.verify_timeout_secs, 10);
    }

    #[test]
    fn test_zero_limits_fall_back() {
        let cfg = config(&[
            ("ROLLCALL_VERIFY_TIMEOUT_SECS", "0"),
            ("ROLLCALL_MAX_CONCURRENT_VERIFICATIONS", "0"),
        ]);
        assert_eq!(cfg.verify_timeout(), Duration::from_secs(DEFAULT_VERIFY_TIMEOUT_SECS));
        assert_eq!(cfg.max_concurrent_verifications, DEFAULT_MAX_CONCURRENT_VERIFICATIONS);
    }
}
