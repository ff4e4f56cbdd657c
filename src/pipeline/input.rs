//! Input resolution: turn a user-supplied path or URL into PDF bytes.
//!
//! pdfium can load a document straight from memory, so both local files and
//! downloads end up as a byte buffer. We validate the PDF magic bytes
//! (`%PDF`) before returning so callers get a meaningful error instead of an
//! opaque pdfium failure.

use crate::error::LeaseScanError;
use std::path::PathBuf;
use tracing::{debug, info};

const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// A document loaded into memory.
#[derive(Debug, Clone)]
pub struct ResolvedInput {
    /// Human-readable origin (path or URL), used in logs and errors.
    pub source: String,
    pub bytes: Vec<u8>,
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to PDF bytes.
///
/// URLs are downloaded with a `timeout_secs` budget; anything else is read
/// as a local path.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, LeaseScanError> {
    if input.trim().is_empty() {
        return Err(LeaseScanError::InvalidInput {
            input: input.to_string(),
        });
    }
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        read_local(input).await
    }
}

/// Verify that `bytes` start with the PDF magic number.
pub fn ensure_pdf(source: &str, bytes: &[u8]) -> Result<(), LeaseScanError> {
    if bytes.len() < PDF_MAGIC.len() || &bytes[..PDF_MAGIC.len()] != PDF_MAGIC {
        return Err(LeaseScanError::NotAPdf {
            source_name: source.to_string(),
            magic: bytes.iter().take(PDF_MAGIC.len()).copied().collect(),
        });
    }
    Ok(())
}

async fn read_local(path_str: &str) -> Result<ResolvedInput, LeaseScanError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(LeaseScanError::PermissionDenied { path });
        }
        Err(_) => return Err(LeaseScanError::FileNotFound { path }),
    };

    ensure_pdf(path_str, &bytes)?;
    debug!("Read local PDF: {} ({} bytes)", path.display(), bytes.len());

    Ok(ResolvedInput {
        source: path_str.to_string(),
        bytes,
    })
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, LeaseScanError> {
    info!("Downloading PDF from: {}", url);

    if reqwest::Url::parse(url).is_err() {
        return Err(LeaseScanError::InvalidInput {
            input: url.to_string(),
        });
    }

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| LeaseScanError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let map_err = |e: reqwest::Error| {
        if e.is_timeout() {
            LeaseScanError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            LeaseScanError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    };

    let response = client.get(url).send().await.map_err(map_err)?;

    if !response.status().is_success() {
        return Err(LeaseScanError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response.bytes().await.map_err(map_err)?.to_vec();
    ensure_pdf(url, &bytes)?;

    info!("Downloaded {} bytes", bytes.len());

    Ok(ResolvedInput {
        source: url.to_string(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/lease.pdf"));
        assert!(is_url("http://example.com/lease.pdf"));
        assert!(!is_url("/tmp/lease.pdf"));
        assert!(!is_url("lease.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn ensure_pdf_checks_magic() {
        assert!(ensure_pdf("a", b"%PDF-1.7\n...").is_ok());
        match ensure_pdf("a.docx", b"PK\x03\x04rest") {
            Err(LeaseScanError::NotAPdf { magic, .. }) => assert_eq!(magic, b"PK\x03\x04"),
            other => panic!("expected NotAPdf, got {other:?}"),
        }
        assert!(matches!(
            ensure_pdf("empty", b""),
            Err(LeaseScanError::NotAPdf { .. })
        ));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let err = resolve_input("/definitely/not/here/lease.pdf", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, LeaseScanError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn blank_input_is_invalid() {
        let err = resolve_input("  ", 5).await.unwrap_err();
        assert!(matches!(err, LeaseScanError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn local_non_pdf_is_rejected() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"This is a plain text lease.").unwrap();
        let err = resolve_input(f.path().to_str().unwrap(), 5)
            .await
            .unwrap_err();
        assert!(matches!(err, LeaseScanError::NotAPdf { .. }));
    }

    #[tokio::test]
    async fn local_pdf_bytes_are_returned() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-1.4\n%fake").unwrap();
        let resolved = resolve_input(f.path().to_str().unwrap(), 5).await.unwrap();
        assert_eq!(resolved.bytes, b"%PDF-1.4\n%fake");
    }
}
