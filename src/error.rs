//! Error types for the pdf2raster library.
//!
//! Every conversion failure is a [`RasterError`]. The variants are grouped by
//! where the failure originates so that callers can map them onto their own
//! failure classes without string matching:
//!
//! * **Input**: the file handed to the converter is missing or is not a PDF.
//! * **Engine**: the PDFium library could not be bound.
//! * **Conversion**: load, encode and write failures of a single job.
//! * **Config**: builder validation.
//!
//! [`RasterError::is_client_error`] is the one place that decides whether a
//! failure was caused by the document rather than by the machine.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the pdf2raster library.
#[derive(Debug, Error)]
pub enum RasterError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, or place the platform library\n\
next to the executable or on the system library path.\n"
    )]
    EngineUnavailable(String),

    // ── Conversion errors ─────────────────────────────────────────────────
    /// The document could not be opened or the requested page rendered.
    /// Corrupt, encrypted and empty documents all end up here.
    #[error("Failed to load '{path}': {detail}")]
    Load { path: PathBuf, detail: String },

    /// The rendered page could not be encoded into the output format.
    #[error("Failed to encode page as {format}: {detail}")]
    Encode { format: String, detail: String },

    /// The encoded image could not be written to disk.
    #[error("Failed to write output file '{path}': {source}")]
    Write {
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

impl RasterError {
    /// `true` when the failure was caused by the input document itself.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RasterError::FileNotFound { .. } | RasterError::NotAPdf { .. } | RasterError::Load { .. }
        )
    }
}
