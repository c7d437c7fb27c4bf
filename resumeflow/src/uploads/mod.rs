//! Uploaded resume documents.
//!
//! A resume can be uploaded once and referenced from any number of job
//! requests by its file id, the first 12 hex digits of its SHA-256. Only
//! plain-text formats are accepted; the text is validated at upload time
//! so a later submission cannot fail on the document itself.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::context::MAX_RESUME_CHARS;
use crate::core::sha256_hex;

/// Content types accepted for resume uploads.
pub const SUPPORTED_RESUME_TYPES: [&str; 2] = ["text/plain", "text/markdown"];

/// Upper bound on an uploaded document, in bytes.
pub const MAX_UPLOAD_BYTES: usize = 4 * MAX_RESUME_CHARS;

const FILE_ID_LEN: usize = 12;

/// Why an upload was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadError {
    /// The content type is not one of [`SUPPORTED_RESUME_TYPES`].
    #[error("Resume type '{0}' is not supported; upload text/plain or text/markdown")]
    UnsupportedType(String),

    /// The document has no text.
    #[error("Uploaded resume is empty")]
    Empty,

    /// The document is over the size limits.
    #[error("Uploaded resume exceeds {0}")]
    TooLarge(String),

    /// The bytes are not UTF-8 text.
    #[error("Uploaded resume is not valid UTF-8 text")]
    NotText,
}

/// Metadata returned for a stored upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedResume {
    /// Id to pass as `resume_file_id`.
    pub file_id: String,
    /// Normalised content type.
    pub content_type: String,
    /// Size in bytes.
    pub size: usize,
    /// Hex-encoded SHA-256 of the content.
    pub sha256: String,
    /// When the document was first uploaded.
    pub created_at: DateTime<Utc>,
}

#[derive(Debug)]
struct StoredResume {
    meta: UploadedResume,
    text: String,
}

/// Uploaded resumes keyed by content hash.
///
/// Uploading the same bytes twice returns the existing entry.
#[derive(Debug, Default)]
pub struct ResumeUploads {
    files: DashMap<String, StoredResume>,
}

impl ResumeUploads {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and stores a document.
    pub fn put(&self, content_type: &str, bytes: &[u8]) -> Result<UploadedResume, UploadError> {
        let content_type = normalize_content_type(content_type);
        if !SUPPORTED_RESUME_TYPES.contains(&content_type.as_str()) {
            return Err(UploadError::UnsupportedType(content_type));
        }
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(UploadError::TooLarge(format!("{MAX_UPLOAD_BYTES} bytes")));
        }
        let text = std::str::from_utf8(bytes).map_err(|_| UploadError::NotText)?;
        let text = text.trim_start_matches('\u{feff}').trim();
        if text.is_empty() {
            return Err(UploadError::Empty);
        }
        if text.chars().count() > MAX_RESUME_CHARS {
            return Err(UploadError::TooLarge(format!("{MAX_RESUME_CHARS} characters")));
        }

        let sha256 = sha256_hex(bytes);
        let file_id = sha256[..FILE_ID_LEN].to_string();
        let stored = self
            .files
            .entry(file_id.clone())
            .or_insert_with(|| StoredResume {
                meta: UploadedResume {
                    file_id,
                    content_type,
                    size: bytes.len(),
                    sha256,
                    created_at: Utc::now(),
                },
                text: text.to_string(),
            });
        debug!(file_id = %stored.meta.file_id, size = stored.meta.size, "Resume uploaded");
        Ok(stored.meta.clone())
    }

    /// The text of an upload.
    #[must_use]
    pub fn text(&self, file_id: &str) -> Option<String> {
        self.files.get(file_id).map(|stored| stored.text.clone())
    }

    /// Metadata of an upload.
    #[must_use]
    pub fn describe(&self, file_id: &str) -> Option<UploadedResume> {
        self.files.get(file_id).map(|stored| stored.meta.clone())
    }

    /// Number of stored uploads.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if nothing was uploaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Drops parameters such as `charset` and lowercases the type.
fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{JobContext, JobRequest};
    use crate::testing::SAMPLE_RESUME;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_put_hashes_and_dedupes() {
        let uploads = ResumeUploads::new();
        let first = uploads
            .put("text/plain; charset=utf-8", SAMPLE_RESUME.as_bytes())
            .unwrap();
        assert_eq!(first.file_id.len(), 12);
        assert!(first.sha256.starts_with(&first.file_id));
        assert_eq!(first.content_type, "text/plain");

        let again = uploads.put("text/plain", SAMPLE_RESUME.as_bytes()).unwrap();
        assert_eq!(again, first);
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads.text(&first.file_id).unwrap(), SAMPLE_RESUME.trim());
    }

    #[test]
    fn test_rejects_unsupported_and_bad_content() {
        let uploads = ResumeUploads::new();
        assert_eq!(
            uploads.put("application/pdf", b"%PDF-1.7").unwrap_err(),
            UploadError::UnsupportedType("application/pdf".to_string())
        );
        assert_eq!(uploads.put("text/plain", b"  \n ").unwrap_err(), UploadError::Empty);
        assert_eq!(
            uploads.put("text/markdown", &[0xff, 0xfe, 0x00]).unwrap_err(),
            UploadError::NotText
        );
        let huge = vec![b'a'; MAX_UPLOAD_BYTES + 1];
        assert!(matches!(
            uploads.put("text/plain", &huge),
            Err(UploadError::TooLarge(_))
        ));
        assert!(uploads.is_empty());
    }

    #[test]
    fn test_request_resolves_upload() {
        let uploads = ResumeUploads::new();
        let meta = uploads.put("text/markdown", b"# Jane Doe\nML engineer").unwrap();

        let request = JobRequest::new("", "Senior AI Engineer, Acme Health")
            .with_resume_file(meta.file_id.clone())
            .resolve_upload(&uploads)
            .unwrap();
        let ctx = JobContext::try_from(request).unwrap();
        assert_eq!(ctx.resume_text(), "# Jane Doe\nML engineer");
        assert_eq!(ctx.summary().resume_file_id, Some(meta.file_id));
    }

    #[test]
    fn test_request_upload_errors() {
        let uploads = ResumeUploads::new();
        let meta = uploads.put("text/plain", b"Jane Doe").unwrap();

        let unknown = JobRequest::new("", "Engineer")
            .with_resume_file("000000000000")
            .resolve_upload(&uploads)
            .unwrap_err();
        assert_eq!(unknown.field, "resume_file_id");

        let both = JobRequest::new("inline text", "Engineer")
            .with_resume_file(meta.file_id.clone())
            .resolve_upload(&uploads)
            .unwrap_err();
        assert!(both.message.contains("not both"));

        let unresolved =
            JobContext::try_from(JobRequest::new("", "Engineer").with_resume_file(meta.file_id))
                .unwrap_err();
        assert_eq!(unresolved.field, "resume_file_id");

        let inline = JobRequest::new("Jane Doe", "Engineer")
            .resolve_upload(&uploads)
            .unwrap();
        assert_eq!(inline.resume_file_id, None);
    }
}
