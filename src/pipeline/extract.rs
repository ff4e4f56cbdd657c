//! Text extraction: PDF bytes → concatenated page text via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps global state
//! and must not be driven from async worker threads. Extraction runs on the
//! blocking pool, one document at a time, behind a process-wide lock.
//!
//! ## Locating pdfium
//!
//! 1. `PDFIUM_LIB_PATH`: explicit path to the shared library
//! 2. the platform library name in the current directory
//! 3. the platform library name next to the running executable
//! 4. the system library search path

use crate::error::LeaseScanError;
use pdfium_render::prelude::*;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, info};

/// pdfium is not re-entrant across bindings; serialise all use.
static PDFIUM_LOCK: Mutex<()> = Mutex::new(());

/// Text pulled out of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub page_count: usize,
}

/// Extract the text of every page, in page order.
///
/// # Errors
/// - [`LeaseScanError::PasswordRequired`] for encrypted documents
/// - [`LeaseScanError::ExtractionFailed`] when pdfium cannot be bound or the
///   document cannot be parsed
/// - [`LeaseScanError::NoExtractableText`] when no page has a text layer
pub async fn extract_text(
    source: &str,
    bytes: Vec<u8>,
    password: Option<&str>,
) -> Result<ExtractedText, LeaseScanError> {
    let source_owned = source.to_string();
    let password = password.map(str::to_string);

    let extracted = tokio::task::spawn_blocking(move || {
        extract_text_blocking(&source_owned, bytes, password.as_deref())
    })
    .await
    .map_err(|e| LeaseScanError::Internal(format!("Extraction task panicked: {}", e)))??;

    if extracted.text.trim().is_empty() {
        return Err(LeaseScanError::NoExtractableText {
            source_name: source.to_string(),
            page_count: extracted.page_count,
        });
    }

    info!(
        "Extracted {} chars from {} pages",
        extracted.text.chars().count(),
        extracted.page_count
    );
    Ok(extracted)
}

fn extract_text_blocking(
    source: &str,
    bytes: Vec<u8>,
    password: Option<&str>,
) -> Result<ExtractedText, LeaseScanError> {
    let _guard = PDFIUM_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let pdfium = bind_pdfium(source)?;

    let document = pdfium
        .load_pdf_from_byte_vec(bytes, password)
        .map_err(|e| classify_load_error(source, &format!("{:?}", e)))?;

    let pages = document.pages();
    let page_count = pages.len() as usize;
    debug!("PDF loaded: {} pages", page_count);

    let mut page_texts = Vec::with_capacity(page_count);
    for (idx, page) in pages.iter().enumerate() {
        let text = page
            .text()
            .map_err(|e| LeaseScanError::ExtractionFailed {
                source_name: source.to_string(),
                detail: format!("page {}: {:?}", idx + 1, e),
            })?
            .all();
        debug!("Page {} → {} chars", idx + 1, text.len());
        page_texts.push(text);
    }

    Ok(ExtractedText {
        text: join_pages(page_texts),
        page_count,
    })
}

/// Concatenate page texts as-is, with nothing inserted between pages.
///
/// The excerpt window counts characters of exactly this string.
pub fn join_pages<I>(pages: I) -> String
where
    I: IntoIterator<Item = String>,
{
    pages.into_iter().collect()
}

fn classify_load_error(source: &str, detail: &str) -> LeaseScanError {
    if detail.contains("Password") || detail.contains("password") {
        LeaseScanError::PasswordRequired {
            source_name: source.to_string(),
        }
    } else {
        LeaseScanError::ExtractionFailed {
            source_name: source.to_string(),
            detail: detail.to_string(),
        }
    }
}

fn bind_pdfium(source: &str) -> Result<Pdfium, LeaseScanError> {
    let bindings = match std::env::var_os("PDFIUM_LIB_PATH") {
        Some(path) => Pdfium::bind_to_library(PathBuf::from(path)),
        None => candidate_dirs()
            .into_iter()
            .find_map(|dir| {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir)).ok()
            })
            .map(Ok)
            .unwrap_or_else(Pdfium::bind_to_system_library),
    }
    .map_err(|e| LeaseScanError::ExtractionFailed {
        source_name: source.to_string(),
        detail: format!(
            "pdfium library unavailable ({:?}); set PDFIUM_LIB_PATH=/path/to/libpdfium",
            e
        ),
    })?;

    Ok(Pdfium::new(bindings))
}

fn candidate_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![PathBuf::from("./")];
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.to_path_buf()))
    {
        dirs.push(exe_dir);
    }
    dirs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_pages_adds_no_separator() {
        let joined = join_pages(vec!["Page one".to_string(), "Page two\n".to_string(), "Three".to_string()]);
        assert_eq!(joined, "Page onePage two\nThree");
    }

    #[test]
    fn join_pages_empty() {
        assert_eq!(join_pages(Vec::<String>::new()), "");
        assert_eq!(join_pages(vec![String::new(), "x".to_string()]), "x");
    }

    #[test]
    fn password_errors_are_classified() {
        let e = classify_load_error("lease.pdf", "PdfiumLibraryInternalError(PasswordError)");
        assert!(matches!(e, LeaseScanError::PasswordRequired { .. }));

        let e = classify_load_error("lease.pdf", "PdfiumLibraryInternalError(FormatError)");
        match e {
            LeaseScanError::ExtractionFailed { detail, .. } => assert!(detail.contains("FormatError")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
