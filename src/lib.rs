//! # pdf2raster
//!
//! Turn the first page of a PDF into a high-resolution raster image, either
//! from Rust, from the command line, or over HTTP.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    check the %PDF magic
//!  ├─ 2. Render   first page at 300 DPI via pdfium (shared engine thread)
//!  ├─ 3. Flatten  composite transparency onto white
//!  ├─ 4. Encode   JPEG quality 95 (or PNG)
//!  └─ 5. Output   atomic write to the requested path
//! ```
//!
//! The HTTP server in [`server`] wraps the same [`Converter`]: a multipart
//! upload is written to a per-request scratch directory, converted, and the
//! image is returned as an attachment. The scratch directory is removed when
//! the request finishes.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2raster::{Converter, PdfiumRasterizer, RenderConfig};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Binds pdfium once; share the rasterizer for the life of the process.
//!     let engine = Arc::new(PdfiumRasterizer::start(None)?);
//!     let converter = Converter::new(engine, RenderConfig::default());
//!     let report = converter.convert("document.pdf", "page.jpg")?;
//!     eprintln!("{}x{} px", report.width_px, report.height_px);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2raster` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{OutputFormat, RenderConfig, RenderConfigBuilder, ServerConfig};
pub use convert::{ConversionReport, Converter};
pub use error::RasterError;
pub use pipeline::render::{PageRasterizer, PageRequest, PdfiumRasterizer, RasterizedPage};
pub use server::{router, serve, AppState, UploadError};
