//! Binding the PDFium raster engine.
//!
//! PDFium keeps process-wide state: `FPDF_InitLibrary` must run once before
//! any document is opened and `FPDF_DestroyLibrary` once at the end. The
//! engine is bound once at startup and shared; the library is released when
//! the last handle is dropped.
//!
//! ## Library resolution (first match wins)
//!
//! 1. An explicit path passed to [`bind_engine`].
//! 2. `PDFIUM_LIB_PATH`: a file, or a directory holding the platform library.
//! 3. The current directory (`./libpdfium.so`, `./libpdfium.dylib`, `./pdfium.dll`).
//! 4. The system library search path.

use crate::error::RasterError;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming an existing pdfium library.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Bind to PDFium, trying each location in turn.
///
/// Call this once per process and share the result.
pub fn bind_engine(explicit: Option<&Path>) -> Result<Pdfium, RasterError> {
    let mut attempts: Vec<String> = Vec::new();

    for candidate in candidate_paths(explicit) {
        match Pdfium::bind_to_library(&candidate) {
            Ok(bindings) => {
                info!("PDFium bound from {}", candidate.display());
                return Ok(Pdfium::new(bindings));
            }
            Err(e) => {
                debug!("PDFium not loadable from {}: {:?}", candidate.display(), e);
                attempts.push(format!("{}: {:?}", candidate.display(), e));
            }
        }
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => {
            info!("PDFium bound from system library path");
            Ok(Pdfium::new(bindings))
        }
        Err(e) => {
            attempts.push(format!("system library: {:?}", e));
            Err(RasterError::EngineUnavailable(attempts.join("; ")))
        }
    }
}

/// Library files to try before falling back to the system search path.
fn candidate_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(p) = explicit {
        paths.push(resolve_library_file(p));
    }

    if let Ok(env_path) = std::env::var(PDFIUM_LIB_PATH_ENV) {
        if !env_path.is_empty() {
            paths.push(resolve_library_file(Path::new(&env_path)));
        }
    }

    let local = Pdfium::pdfium_platform_library_name_at_path("./");
    if local.exists() {
        paths.push(local);
    }

    paths.dedup();
    paths
}

/// A directory means "the platform library inside it".
fn resolve_library_file(p: &Path) -> PathBuf {
    if p.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(p)
    } else {
        p.to_path_buf()
    }
}
