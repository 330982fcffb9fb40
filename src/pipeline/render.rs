//! PDF rasterisation: render one page to a `DynamicImage` via pdfium.
//!
//! ## Engine thread
//!
//! pdfium keeps global state and must not be driven from several threads
//! at once. [`PdfiumRasterizer`] binds it once on a dedicated thread and
//! feeds that thread render jobs over a channel. Each
//! job opens its own document, renders, and drops the document before the
//! reply is sent, so no pdfium handle ever outlives the call that created it.
//!
//! The engine thread exits, and pdfium is torn down, when the last
//! `PdfiumRasterizer` handle is dropped.
//!
//! ## Pixel budget
//!
//! The DPI is fixed, so the bitmap size follows the page's MediaBox, which
//! the uploader controls. A few hundred bytes of PDF can declare a
//! 5000×5000 pt page, 20833×20833 px at 300 DPI. Every render goes through
//! [`target_size`], which refuses pages over `max_pixels` before pdfium
//! allocates anything.

use crate::config::{points_to_pixels, RenderConfig};
use crate::engine;
use crate::error::RasterError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

/// One rendered page plus what we learned about the document on the way.
#[derive(Debug, Clone)]
pub struct RasterizedPage {
    pub image: DynamicImage,
    /// Zero-based index of the page that was rendered.
    pub page_index: u16,
    /// Total pages in the source document.
    pub page_count: usize,
    /// Page size in PDF points.
    pub width_pt: f32,
    pub height_pt: f32,
}

/// Which page to render, and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Zero-based page index.
    pub page_index: u16,
    pub dpi: u32,
    /// Upper bound on `width_px × height_px`.
    pub max_pixels: u64,
}

impl From<&RenderConfig> for PageRequest {
    fn from(cfg: &RenderConfig) -> Self {
        Self {
            page_index: cfg.page_index,
            dpi: cfg.dpi,
            max_pixels: cfg.max_pixels,
        }
    }
}

/// A raster backend able to render a single page of a document file.
///
/// Implementations block; async callers run them on the blocking pool.
pub trait PageRasterizer: Send + Sync {
    /// Render the requested page of the document at `path`.
    ///
    /// The returned image is `page size × dpi / 72` pixels. A document that
    /// cannot be opened, has no such page, or whose page exceeds the pixel
    /// budget yields [`RasterError::Load`].
    fn rasterize(&self, path: &Path, request: PageRequest)
        -> Result<RasterizedPage, RasterError>;
}

/// Pixel size of a `width_pt × height_pt` page for `request`, or a Load
/// error if it is over the budget.
///
/// Implementations call this before allocating the bitmap.
pub fn target_size(
    path: &Path,
    width_pt: f32,
    height_pt: f32,
    request: PageRequest,
) -> Result<(u32, u32), RasterError> {
    let width_px = points_to_pixels(width_pt, request.dpi);
    let height_px = points_to_pixels(height_pt, request.dpi);
    let pixels = u64::from(width_px) * u64::from(height_px);

    if pixels > request.max_pixels {
        return Err(RasterError::Load {
            path: path.to_path_buf(),
            detail: format!(
                "page is {width_px}x{height_px} px at {} DPI, over the {} pixel limit",
                request.dpi, request.max_pixels
            ),
        });
    }
    Ok((width_px, height_px))
}

// ── pdfium backend ───────────────────────────────────────────────────────

struct RenderJob {
    path: PathBuf,
    request: PageRequest,
    reply: mpsc::Sender<Result<RasterizedPage, RasterError>>,
}

/// [`PageRasterizer`] backed by a process-wide pdfium instance.
pub struct PdfiumRasterizer {
    jobs: Mutex<Option<mpsc::Sender<RenderJob>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl PdfiumRasterizer {
    /// Bind pdfium on a new engine thread.
    ///
    /// Blocks until the library is bound; a binding failure is returned here
    /// rather than surfacing on the first render.
    pub fn start(library_path: Option<&Path>) -> Result<Self, RasterError> {
        let library_path = library_path.map(Path::to_path_buf);
        let (job_tx, job_rx) = mpsc::channel::<RenderJob>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), RasterError>>();

        let worker = std::thread::Builder::new()
            .name("pdfium-engine".into())
            .spawn(move || {
                let pdfium = match engine::bind_engine(library_path.as_deref()) {
                    Ok(p) => {
                        let _ = ready_tx.send(Ok(()));
                        p
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                for job in job_rx {
                    let result = render_page_blocking(&pdfium, &job.path, job.request);
                    if job.reply.send(result).is_err() {
                        warn!("Render caller went away before the result was ready");
                    }
                }

                info!("PDF engine thread shutting down");
            })
            .map_err(|e| RasterError::Internal(format!("Failed to spawn engine thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                jobs: Mutex::new(Some(job_tx)),
                worker: Mutex::new(Some(worker)),
            }),
            Ok(Err(e)) => {
                let _ = worker.join();
                Err(e)
            }
            Err(_) => {
                let _ = worker.join();
                Err(RasterError::Internal(
                    "Engine thread exited during startup".into(),
                ))
            }
        }
    }

    fn sender(&self) -> Result<mpsc::Sender<RenderJob>, RasterError> {
        self.jobs
            .lock()
            .map_err(|_| RasterError::Internal("Engine handle poisoned".into()))?
            .clone()
            .ok_or_else(|| RasterError::Internal("PDF engine has been shut down".into()))
    }

    /// Stop accepting jobs and wait for the engine thread to release pdfium.
    pub fn shutdown(&self) {
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.take();
        }
        let handle = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("PDF engine thread panicked");
            }
        }
    }
}

impl PageRasterizer for PdfiumRasterizer {
    fn rasterize(
        &self,
        path: &Path,
        request: PageRequest,
    ) -> Result<RasterizedPage, RasterError> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.sender()?
            .send(RenderJob {
                path: path.to_path_buf(),
                request,
                reply: reply_tx,
            })
            .map_err(|_| RasterError::Internal("PDF engine thread is not running".into()))?;

        reply_rx
            .recv()
            .map_err(|_| RasterError::Internal("PDF engine dropped the render job".into()))?
    }
}

impl Drop for PdfiumRasterizer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Blocking implementation of page rendering. Runs on the engine thread.
fn render_page_blocking(
    pdfium: &Pdfium,
    pdf_path: &Path,
    request: PageRequest,
) -> Result<RasterizedPage, RasterError> {
    let PageRequest { page_index, dpi, .. } = request;
    let load_err = |detail: String| RasterError::Load {
        path: pdf_path.to_path_buf(),
        detail,
    };

    // The document is the rendering context for this job; it is closed when
    // it goes out of scope, on every path out of this function.
    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| load_err(format!("{:?}", e)))?;

    let pages = document.pages();
    let page_count = pages.len() as usize;
    debug!("PDF loaded: {} pages", page_count);

    if usize::from(page_index) >= page_count {
        return Err(load_err(format!(
            "page {} is out of range (document has {} pages)",
            usize::from(page_index) + 1,
            page_count
        )));
    }

    let page = pages
        .get(page_index)
        .map_err(|e| load_err(format!("{:?}", e)))?;

    let width_pt = page.width().value;
    let height_pt = page.height().value;
    let (width_px, height_px) = target_size(pdf_path, width_pt, height_pt, request)?;

    let width = i32::try_from(width_px)
        .map_err(|_| load_err(format!("width {width_px}px exceeds renderer limits")))?;
    let height = i32::try_from(height_px)
        .map_err(|_| load_err(format!("height {height_px}px exceeds renderer limits")))?;

    let render_config = PdfRenderConfig::new()
        .set_target_width(width)
        .set_target_height(height);

    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| load_err(format!("render failed: {:?}", e)))?;

    let image = bitmap.as_image();
    debug!(
        "Rendered page {} ({}x{} pt) → {}x{} px at {} DPI",
        page_index + 1,
        width_pt,
        height_pt,
        image.width(),
        image.height(),
        dpi
    );

    Ok(RasterizedPage {
        image,
        page_index,
        page_count,
        width_pt,
        height_pt,
    })
}
