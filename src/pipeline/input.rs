//! Input validation: make sure a file is a PDF before handing it to pdfium.
//!
//! pdfium does reject garbage, but its error for a JPEG uploaded by mistake
//! is an opaque `FormatError`. Checking the `%PDF` magic first gives callers
//! a clear "not a PDF" instead, and lets the HTTP layer answer 415 without
//! touching the engine or the disk.

use crate::error::RasterError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Every PDF starts with this marker.
pub const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Check that `bytes` starts with the PDF magic.
///
/// `origin` is only used to label the error.
pub fn check_pdf_bytes(bytes: &[u8], origin: &Path) -> Result<(), RasterError> {
    if bytes.len() >= PDF_MAGIC.len() && &bytes[..PDF_MAGIC.len()] == PDF_MAGIC {
        return Ok(());
    }

    let mut magic = [0u8; 4];
    let n = bytes.len().min(magic.len());
    magic[..n].copy_from_slice(&bytes[..n]);
    Err(RasterError::NotAPdf {
        path: origin.to_path_buf(),
        magic,
    })
}

/// Validate a local file: it must exist, be readable and carry the PDF magic.
pub fn check_pdf_file(path: &Path) -> Result<PathBuf, RasterError> {
    let mut f = std::fs::File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => RasterError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => RasterError::Load {
            path: path.to_path_buf(),
            detail: e.to_string(),
        },
    })?;

    let mut head = Vec::with_capacity(PDF_MAGIC.len());
    f.by_ref()
        .take(PDF_MAGIC.len() as u64)
        .read_to_end(&mut head)
        .map_err(|e| RasterError::Load {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
    check_pdf_bytes(&head, path)?;

    debug!("Validated PDF input: {}", path.display());
    Ok(path.to_path_buf())
}
