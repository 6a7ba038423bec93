//! Data URI ingestion.
//!
//! Browser captures arrive as `data:<mime-type>;base64,<payload>`. The string
//! is split once on the first comma; the header only contributes the media
//! type, the payload is decoded verbatim with the standard base64 alphabet.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use thiserror::Error;

const DATA_URI_SEPARATOR: char = ',';
const DATA_URI_SCHEME: &str = "data:";
const BASE64_MARKER: &str = ";base64";

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("malformed data URI: {0}")]
    MalformedInput(String),
    #[error("failed to store image at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A decoded data URI payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    media_type: Option<String>,
    bytes: Vec<u8>,
}

impl EncodedImage {
    /// Parse `header,base64payload`.
    pub fn parse(data_uri: &str) -> Result<Self, IngestError> {
        let (header, payload) = data_uri.split_once(DATA_URI_SEPARATOR).ok_or_else(|| {
            IngestError::MalformedInput("missing ',' between header and payload".into())
        })?;

        let media_type = parse_media_type(header);
        if media_type.is_none() {
            tracing::debug!(header, "data URI header not in data:<mime>;base64 form");
        }

        let bytes = STANDARD
            .decode(payload.trim())
            .map_err(|e| IngestError::MalformedInput(format!("invalid base64 payload: {e}")))?;

        Ok(Self { media_type, bytes })
    }

    /// Wrap raw image bytes, e.g. to build a data URI from a file on disk.
    pub fn from_bytes(media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            media_type: Some(media_type.into()),
            bytes,
        }
    }

    /// Media type from the header (`image/png`), if the header was well formed.
    pub fn media_type(&self) -> Option<&str> {
        self.media_type.as_deref()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Encode back to `data:<mime>;base64,<payload>`.
    pub fn to_data_uri(&self) -> String {
        let media_type = self.media_type.as_deref().unwrap_or("application/octet-stream");
        format!(
            "{DATA_URI_SCHEME}{media_type}{BASE64_MARKER}{DATA_URI_SEPARATOR}{}",
            STANDARD.encode(&self.bytes)
        )
    }

    /// Write the decoded bytes to `destination`, creating missing parent
    /// directories and overwriting any existing file.
    pub fn persist(&self, destination: impl AsRef<Path>) -> Result<PathBuf, IngestError> {
        let destination = destination.as_ref();

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| IngestError::Storage {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        fs::write(destination, &self.bytes).map_err(|source| IngestError::Storage {
            path: destination.to_path_buf(),
            source,
        })?;

        tracing::debug!(
            path = %destination.display(),
            bytes = self.bytes.len(),
            media_type = self.media_type.as_deref().unwrap_or("unknown"),
            "image persisted"
        );

        Ok(destination.to_path_buf())
    }
}

impl FromStr for EncodedImage {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Decode a data URI and write it to `destination`.
///
/// Nothing touches the filesystem unless the input decodes cleanly.
/// Returns `destination` so callers can build the path and write in one expression.
pub fn persist(data_uri: &str, destination: impl AsRef<Path>) -> Result<PathBuf, IngestError> {
    EncodedImage::parse(data_uri)?.persist(destination)
}

/// `data:image/png;base64` → `Some("image/png")`.
fn parse_media_type(header: &str) -> Option<String> {
    let rest = header.trim().strip_prefix(DATA_URI_SCHEME)?;
    let media_type = rest.strip_suffix(BASE64_MARKER)?;
    // Parameters such as `;charset=...` may precede the base64 marker.
    let media_type = media_type.split(';').next().unwrap_or_default();
    if media_type.is_empty() {
        None
    } else {
        Some(media_type.to_string())
    }
}
