//! Input resolution: normalise a user-supplied path or URL to document bytes.
//!
//! ## Why bytes instead of a temp file?
//!
//! The zip layer reads from any `Read + Seek`, so a downloaded document can
//! stay in memory — no temp directory to create, no cleanup to get wrong.
//! We validate the ZIP magic bytes (`PK\x03\x04`) before returning so
//! callers get a meaningful error rather than a confusing archive failure
//! three stages later. Office documents saved as `.doc`, HTML error pages
//! served with `200 OK`, and renamed PDFs are all caught here.

use crate::error::DocxProofError;
use std::path::PathBuf;
use tracing::{debug, info};

/// Local-file-header signature of a ZIP archive.
const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// The resolved input — either a local path or bytes downloaded from a URL.
#[derive(Debug)]
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; the document was downloaded in full.
    Downloaded { url: String, bytes: Vec<u8> },
}

impl ResolvedInput {
    /// A display name for logs and default output naming.
    pub fn name(&self) -> String {
        match self {
            ResolvedInput::Local(p) => p.display().to_string(),
            ResolvedInput::Downloaded { url, .. } => extract_filename(url),
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to document bytes or a local path.
///
/// If the input is a URL, download it. If the input is a local file,
/// validate it exists and is readable.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, DocxProofError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Resolve a local file path, validating existence and ZIP magic bytes.
fn resolve_local(path_str: &str) -> Result<ResolvedInput, DocxProofError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(DocxProofError::FileNotFound { path });
    }

    // Check read permission by attempting to open
    match std::fs::File::open(&path) {
        Ok(mut f) => {
            use std::io::Read;
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != ZIP_MAGIC {
                return Err(DocxProofError::NotADocx { path, magic });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DocxProofError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(DocxProofError::FileNotFound { path });
        }
    }

    debug!("Resolved local docx: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Download a URL and return the document bytes.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, DocxProofError> {
    info!("Downloading docx from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DocxProofError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            DocxProofError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            DocxProofError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(DocxProofError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| DocxProofError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?
        .to_vec();

    // Verify ZIP magic bytes before handing the payload on.
    if bytes.len() >= 4 && &bytes[..4] != ZIP_MAGIC {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        return Err(DocxProofError::NotADocx {
            path: PathBuf::from(extract_filename(url)),
            magic,
        });
    }

    info!("Downloaded {} bytes", bytes.len());

    Ok(ResolvedInput::Downloaded {
        url: url.to_string(),
        bytes,
    })
}

/// Extract a reasonable filename from the URL.
pub fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.docx".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.docx"));
        assert!(is_url("http://example.com/doc.docx"));
        assert!(!is_url("/tmp/doc.docx"));
        assert!(!is_url("doc.docx"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_extract_filename() {
        assert_eq!(
            extract_filename("https://example.com/reports/relatorio.docx"),
            "relatorio.docx"
        );
        assert_eq!(extract_filename("https://example.com/"), "downloaded.docx");
        assert_eq!(
            extract_filename("https://example.com/download"),
            "downloaded.docx"
        );
    }

    #[test]
    fn missing_local_file() {
        let err = resolve_local("/definitely/not/here.docx").unwrap_err();
        assert!(matches!(err, DocxProofError::FileNotFound { .. }));
    }

    #[test]
    fn local_file_with_wrong_magic() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fake.docx");
        std::fs::write(&path, b"%PDF-1.7 not a docx").expect("write");
        let err = resolve_local(path.to_str().expect("utf8 path")).unwrap_err();
        assert!(matches!(err, DocxProofError::NotADocx { magic, .. } if &magic == b"%PDF"));
    }

    #[test]
    fn local_zip_passes_magic_check() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ok.docx");
        std::fs::write(&path, b"PK\x03\x04rest-of-archive").expect("write");
        let resolved = resolve_local(path.to_str().expect("utf8 path")).expect("resolve");
        assert!(matches!(resolved, ResolvedInput::Local(_)));
    }
}
