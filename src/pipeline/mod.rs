//! Pipeline stages for PDF-to-raster conversion.
//!
//! Each submodule implements exactly one transformation step, in the order
//! the conversion runs them. Keeping stages separate makes each testable on
//! its own and keeps pdfium confined to [`render`].
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ flatten ──▶ encode ──▶ (atomic write)
//! (%PDF)    (pdfium)   (alpha)     (jpeg/png)
//! ```
//!
//! 1. [`input`]   reject files that do not carry the PDF magic
//! 2. [`render`]  open the document, render the selected page at the
//!    configured DPI on the shared engine thread
//! 3. [`flatten`] composite transparency onto an opaque background
//! 4. [`encode`]  JPEG (with quality and density) or PNG bytes, plus
//!    content sniffing for the HTTP layer

pub mod encode;
pub mod flatten;
pub mod input;
pub mod render;
