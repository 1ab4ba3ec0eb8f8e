//! Error types for the docx-proof library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`DocxProofError`] — **Fatal**: the document cannot be processed at all
//!   (unreadable file, not a docx, no oracle configured). Returned as
//!   `Err(DocxProofError)` from the top-level `correct*` functions.
//!
//! * [`NodeError`] — **Non-fatal**: a single paragraph or image failed
//!   (transient API error, dropped media token, unreadable picture) but the
//!   rest of the document is fine. Stored inside the per-node outcomes of
//!   [`crate::output::CorrectionOutput`] so callers can inspect partial
//!   success rather than losing the whole document to one bad node.
//!
//! The separation lets callers decide their own tolerance: abort on the first
//! node failure, log and continue, or collect all errors for a post-run report.

use std::path::PathBuf;
use thiserror::Error;

/// Coarse reason code distinguishing the fatal classes at the caller
/// boundary (HTTP status mapping, CLI exit codes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The supplied document is unreadable, not a docx, or malformed.
    BadInput,
    /// No correction oracle could be resolved (missing credentials/config).
    ServiceUnavailable,
    /// Everything else (I/O, internal bugs).
    Internal,
}

impl ErrorKind {
    /// Stable string form of the reason code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BadInput => "bad-input",
            ErrorKind::ServiceUnavailable => "service-unavailable",
            ErrorKind::Internal => "internal",
        }
    }
}

/// All fatal errors returned by the docx-proof library.
///
/// Node-level failures use [`NodeError`] and are stored in
/// [`crate::output::CorrectionOutput`] rather than propagated here.
#[derive(Debug, Error)]
pub enum DocxProofError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The file exists and was read, but is not a zip container.
    #[error("File is not a valid docx (not a zip archive): '{path}'\nFirst bytes: {magic:?}")]
    NotADocx { path: PathBuf, magic: [u8; 4] },

    // ── Document errors ───────────────────────────────────────────────────
    /// The zip container could not be read.
    #[error("Docx archive is corrupt: {detail}")]
    CorruptArchive { detail: String },

    /// A required package part is absent.
    #[error("Docx is missing required part '{part}'\nThe file may be an old .doc or a renamed archive.")]
    MissingPart { part: String },

    /// `word/document.xml` (or a rels part) could not be parsed.
    #[error("Malformed document XML: {detail}")]
    MalformedXml { detail: String },

    // ── Oracle errors ─────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// An oracle call failed after all retries.
    ///
    /// Surfaced by oracle implementations; the pipeline downgrades it to a
    /// [`NodeError`] so a single bad paragraph never aborts the document.
    #[error("Oracle call failed: {message}")]
    OracleFailed { message: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DocxProofError {
    /// The coarse reason code for this error (`bad-input`,
    /// `service-unavailable`, `internal`).
    pub fn kind(&self) -> ErrorKind {
        match self {
            DocxProofError::FileNotFound { .. }
            | DocxProofError::PermissionDenied { .. }
            | DocxProofError::InvalidInput { .. }
            | DocxProofError::DownloadFailed { .. }
            | DocxProofError::DownloadTimeout { .. }
            | DocxProofError::NotADocx { .. }
            | DocxProofError::CorruptArchive { .. }
            | DocxProofError::MissingPart { .. }
            | DocxProofError::MalformedXml { .. } => ErrorKind::BadInput,
            DocxProofError::ProviderNotConfigured { .. } => ErrorKind::ServiceUnavailable,
            _ => ErrorKind::Internal,
        }
    }
}

/// A non-fatal error for a single paragraph or image.
///
/// Stored alongside the per-node outcomes in
/// [`crate::output::CorrectionOutput`]. The overall correction continues past
/// any number of these.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum NodeError {
    /// Correction oracle call failed after retries; original text kept.
    #[error("Paragraph {paragraph}: oracle call failed: {detail}")]
    CorrectionFailed { paragraph: usize, detail: String },

    /// A media token from the input was absent from the oracle output;
    /// the output was discarded and the original text kept.
    #[error("Paragraph {paragraph}: oracle output dropped media token '{token}'")]
    TokenLost { paragraph: usize, token: String },

    /// Vision oracle call failed; a placeholder description was inserted.
    #[error("Image {image} (paragraph {paragraph}): description failed: {detail}")]
    DescriptionFailed {
        image: usize,
        paragraph: usize,
        detail: String,
    },

    /// The image's media part could not be resolved or decoded; a
    /// placeholder description was inserted.
    #[error("Image {image} (paragraph {paragraph}): media unavailable: {detail}")]
    MediaUnavailable {
        image: usize,
        paragraph: usize,
        detail: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_codes() {
        let e = DocxProofError::MissingPart {
            part: "word/document.xml".into(),
        };
        assert_eq!(e.kind(), ErrorKind::BadInput);
        assert_eq!(e.kind().as_str(), "bad-input");

        let e = DocxProofError::ProviderNotConfigured {
            provider: "openai".into(),
            hint: "set OPENAI_API_KEY".into(),
        };
        assert_eq!(e.kind(), ErrorKind::ServiceUnavailable);
        assert_eq!(e.kind().as_str(), "service-unavailable");

        let e = DocxProofError::Internal("boom".into());
        assert_eq!(e.kind(), ErrorKind::Internal);
    }

    #[test]
    fn not_a_docx_display() {
        let e = DocxProofError::NotADocx {
            path: PathBuf::from("report.docx"),
            magic: [0x25, 0x50, 0x44, 0x46],
        };
        let msg = e.to_string();
        assert!(msg.contains("report.docx"), "got: {msg}");
        assert!(msg.contains("zip"), "got: {msg}");
    }

    #[test]
    fn provider_not_configured_display() {
        let e = DocxProofError::ProviderNotConfigured {
            provider: "azure".into(),
            hint: "set AZURE_OPENAI_API_KEY".into(),
        };
        assert!(e.to_string().contains("azure"));
        assert!(e.to_string().contains("AZURE_OPENAI_API_KEY"));
    }

    #[test]
    fn token_lost_display() {
        let e = NodeError::TokenLost {
            paragraph: 7,
            token: "[[FIG1]]".into(),
        };
        assert!(e.to_string().contains("[[FIG1]]"));
        assert!(e.to_string().contains("Paragraph 7"));
    }

    #[test]
    fn media_unavailable_display() {
        let e = NodeError::MediaUnavailable {
            image: 2,
            paragraph: 5,
            detail: "rId9 not in relationships".into(),
        };
        assert!(e.to_string().contains("rId9"));
        assert!(e.to_string().contains("Image 2"));
    }
}
