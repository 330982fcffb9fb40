//! Conversion entry points.
//!
//! A [`Converter`] pairs a raster backend with a [`RenderConfig`] and turns
//! one PDF file into one image file. It holds no per-job state: every call
//! opens its own document and writes its own output, so a single converter
//! is shared freely across threads and requests.
//!
//! The steps run in a fixed order:
//!
//! 1. validate the input (`%PDF` magic)
//! 2. render the configured page at the configured DPI; the resolution is
//!    part of the render request, so it is in effect before any content is
//!    rasterised
//! 3. flatten alpha onto the background colour
//! 4. encode at the configured quality and format
//! 5. write atomically: temp sibling, then rename over `output`

use crate::config::{OutputFormat, RenderConfig};
use crate::error::RasterError;
use crate::pipeline::render::{PageRasterizer, PageRequest};
use crate::pipeline::{encode, flatten, input};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, info};

/// What a successful conversion produced.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionReport {
    pub output: PathBuf,
    pub format: OutputFormat,
    pub width_px: u32,
    pub height_px: u32,
    /// Zero-based page that was rendered.
    pub page_index: u16,
    /// Pages in the source document; all but `page_index` are ignored.
    pub page_count: usize,
    pub bytes_written: usize,
    pub duration_ms: u64,
}

/// Stateless PDF → raster converter.
#[derive(Clone)]
pub struct Converter {
    rasterizer: Arc<dyn PageRasterizer>,
    config: RenderConfig,
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("rasterizer", &"<dyn PageRasterizer>")
            .field("config", &self.config)
            .finish()
    }
}

impl Converter {
    pub fn new(rasterizer: Arc<dyn PageRasterizer>, config: RenderConfig) -> Self {
        Self { rasterizer, config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Convert `input` (a PDF) into a single image at `output`.
    ///
    /// Blocks for the duration of the render; use [`Converter::convert_async`]
    /// from async code.
    ///
    /// # Errors
    /// - [`RasterError::FileNotFound`] / [`RasterError::NotAPdf`]: bad input file
    /// - [`RasterError::Load`]: pdfium could not open or render the page
    /// - [`RasterError::Encode`]: the image encoder failed
    /// - [`RasterError::Write`]: `output` could not be written
    pub fn convert(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
    ) -> Result<ConversionReport, RasterError> {
        let start = Instant::now();
        let input = input.as_ref();
        let output = output.as_ref();
        let cfg = &self.config;

        input::check_pdf_file(input)?;

        let page = self.rasterizer.rasterize(input, PageRequest::from(cfg))?;
        debug!(
            "Page {}/{} rendered at {}x{} px",
            page.page_index + 1,
            page.page_count,
            page.image.width(),
            page.image.height()
        );

        let (page_index, page_count) = (page.page_index, page.page_count);
        let flat = flatten::flatten_alpha(page.image, cfg.background);
        let (width_px, height_px) = flat.dimensions();

        let bytes = encode::encode_page(&flat, cfg.format, cfg.quality, cfg.dpi)?;
        write_atomic(output, &bytes)?;

        let report = ConversionReport {
            output: output.to_path_buf(),
            format: cfg.format,
            width_px,
            height_px,
            page_index,
            page_count,
            bytes_written: bytes.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Converted {} → {} ({}x{} {}, {} bytes, {}ms)",
            input.display(),
            output.display(),
            report.width_px,
            report.height_px,
            report.format,
            report.bytes_written,
            report.duration_ms
        );

        Ok(report)
    }

    /// Async wrapper around [`Converter::convert`].
    ///
    /// Rendering and encoding are CPU-bound, so the job runs on tokio's
    /// blocking pool to keep the async workers free.
    pub async fn convert_async(
        &self,
        input: PathBuf,
        output: PathBuf,
    ) -> Result<ConversionReport, RasterError> {
        self.spawn_convert(input, output, ()).await
    }

    /// Like [`Converter::convert_async`], but `permit` moves into the
    /// blocking job and is released only when the job finishes.
    ///
    /// Dropping the returned future does not stop a job that has started,
    /// so a caller that goes away still holds its slot until the work is
    /// done.
    pub async fn convert_with_permit(
        &self,
        input: PathBuf,
        output: PathBuf,
        permit: OwnedSemaphorePermit,
    ) -> Result<ConversionReport, RasterError> {
        self.spawn_convert(input, output, permit).await
    }

    async fn spawn_convert<G: Send + 'static>(
        &self,
        input: PathBuf,
        output: PathBuf,
        guard: G,
    ) -> Result<ConversionReport, RasterError> {
        let converter = self.clone();
        tokio::task::spawn_blocking(move || {
            let result = converter.convert(&input, &output);
            drop(guard);
            result
        })
        .await
        .map_err(|e| RasterError::Internal(format!("Conversion task panicked: {}", e)))?
    }
}

/// Write `bytes` to `path` so that `path` either holds the complete output or
/// is left untouched.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), RasterError> {
    let write_err = |source: std::io::Error| RasterError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".pdf2raster-")
        .suffix(".part")
        .tempfile_in(dir)
        .map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::render::{target_size, RasterizedPage};
    use image::{DynamicImage, Rgba, RgbaImage};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Semaphore;

    /// Renders a fully transparent page of the requested size and records
    /// which page was asked for.
    struct TransparentPages {
        page_count: usize,
        width_pt: f32,
        height_pt: f32,
        delay: Duration,
        requested: Mutex<Vec<PageRequest>>,
    }

    impl TransparentPages {
        fn new(page_count: usize, width_pt: f32, height_pt: f32) -> Self {
            Self {
                page_count,
                width_pt,
                height_pt,
                delay: Duration::ZERO,
                requested: Mutex::new(Vec::new()),
            }
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn requested_pages(&self) -> Vec<u16> {
            self.requested
                .lock()
                .unwrap()
                .iter()
                .map(|r| r.page_index)
                .collect()
        }
    }

    impl PageRasterizer for TransparentPages {
        fn rasterize(
            &self,
            path: &Path,
            request: PageRequest,
        ) -> Result<RasterizedPage, RasterError> {
            self.requested.lock().unwrap().push(request);
            std::thread::sleep(self.delay);
            if usize::from(request.page_index) >= self.page_count {
                return Err(RasterError::Load {
                    path: path.to_path_buf(),
                    detail: "page out of range".into(),
                });
            }
            let (w, h) = target_size(path, self.width_pt, self.height_pt, request)?;
            Ok(RasterizedPage {
                image: DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([0, 0, 0, 0]))),
                page_index: request.page_index,
                page_count: self.page_count,
                width_pt: self.width_pt,
                height_pt: self.height_pt,
            })
        }
    }

    fn write_pdf_stub(dir: &Path) -> PathBuf {
        let p = dir.join("in.pdf");
        std::fs::write(&p, b"%PDF-1.4\n%%EOF\n").unwrap();
        p
    }

    fn small_config() -> RenderConfig {
        // 72 DPI keeps the test images at 1 px per point.
        RenderConfig::builder().dpi(72).build().unwrap()
    }

    #[test]
    fn renders_first_page_only() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_pdf_stub(dir.path());
        let raster = Arc::new(TransparentPages::new(3, 100.0, 50.0));
        let converter = Converter::new(raster.clone(), small_config());

        let report = converter.convert(&input, dir.path().join("out.jpg")).unwrap();

        assert_eq!(raster.requested_pages(), vec![0]);
        assert_eq!(report.page_index, 0);
        assert_eq!(report.page_count, 3);
    }

    #[test]
    fn output_is_opaque_and_white() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_pdf_stub(dir.path());
        let out = dir.path().join("out.png");
        let config = RenderConfig::builder()
            .dpi(72)
            .format(OutputFormat::Png)
            .build()
            .unwrap();
        let converter = Converter::new(Arc::new(TransparentPages::new(1, 20.0, 10.0)), config);

        converter.convert(&input, &out).unwrap();

        let img = image::open(&out).unwrap();
        assert!(!img.color().has_alpha());
        assert!(img.to_rgb8().pixels().all(|p| p.0 == [255, 255, 255]));
    }

    #[test]
    fn letter_page_at_default_dpi() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_pdf_stub(dir.path());
        let converter = Converter::new(
            Arc::new(TransparentPages::new(1, 612.0, 792.0)),
            RenderConfig::default(),
        );

        let report = converter.convert(&input, dir.path().join("out.jpg")).unwrap();

        assert_eq!((report.width_px, report.height_px), (2550, 3300));
        assert_eq!(report.format, OutputFormat::Jpeg);
    }

    #[test]
    fn repeat_conversion_is_identical() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_pdf_stub(dir.path());
        let converter = Converter::new(Arc::new(TransparentPages::new(1, 40.0, 40.0)), small_config());

        converter.convert(&input, dir.path().join("a.jpg")).unwrap();
        converter.convert(&input, dir.path().join("b.jpg")).unwrap();

        let a = std::fs::read(dir.path().join("a.jpg")).unwrap();
        let b = std::fs::read(dir.path().join("b.jpg")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn load_failure_leaves_no_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_pdf_stub(dir.path());
        let out = dir.path().join("out.jpg");
        let config = RenderConfig::builder().dpi(72).page_index(5).build().unwrap();
        let converter = Converter::new(Arc::new(TransparentPages::new(1, 10.0, 10.0)), config);

        let err = converter.convert(&input, &out).unwrap_err();

        assert!(matches!(err, RasterError::Load { .. }));
        assert!(!out.exists());
    }

    #[test]
    fn oversized_page_is_refused_with_the_configured_budget() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_pdf_stub(dir.path());
        let out = dir.path().join("out.jpg");
        let raster = Arc::new(TransparentPages::new(1, 5000.0, 5000.0));
        let config = RenderConfig::default();
        let converter = Converter::new(raster.clone(), config.clone());

        let err = converter.convert(&input, &out).unwrap_err();

        assert!(matches!(err, RasterError::Load { .. }), "got: {err}");
        assert!(err.is_client_error());
        assert_eq!(raster.requested.lock().unwrap()[0].max_pixels, config.max_pixels);
        assert_eq!(raster.requested.lock().unwrap()[0].dpi, 300);
        assert!(!out.exists());
    }

    #[test]
    fn non_pdf_input_never_reaches_the_engine() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("photo.pdf");
        std::fs::write(&input, b"\xFF\xD8\xFF\xE0 not a pdf").unwrap();
        let raster = Arc::new(TransparentPages::new(1, 10.0, 10.0));
        let converter = Converter::new(raster.clone(), small_config());

        let err = converter.convert(&input, dir.path().join("out.jpg")).unwrap_err();

        assert!(matches!(err, RasterError::NotAPdf { .. }));
        assert!(raster.requested_pages().is_empty());
    }

    #[test]
    fn unwritable_output_is_a_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_pdf_stub(dir.path());
        let out = dir.path().join("missing-subdir").join("out.jpg");
        let converter = Converter::new(Arc::new(TransparentPages::new(1, 10.0, 10.0)), small_config());

        let err = converter.convert(&input, &out).unwrap_err();

        assert!(matches!(err, RasterError::Write { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn async_wrapper_runs_on_blocking_pool() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_pdf_stub(dir.path());
        let out = dir.path().join("out.jpg");
        let converter = Converter::new(Arc::new(TransparentPages::new(2, 10.0, 10.0)), small_config());

        let report = converter.convert_async(input, out.clone()).await.unwrap();

        assert_eq!(report.output, out);
        assert!(out.exists());
    }

    #[tokio::test]
    async fn permit_outlives_an_abandoned_caller() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_pdf_stub(dir.path());
        let out = dir.path().join("out.jpg");
        let raster = TransparentPages::new(1, 10.0, 10.0).with_delay(Duration::from_millis(300));
        let converter = Converter::new(Arc::new(raster), small_config());
        let slots = Arc::new(Semaphore::new(1));

        let permit = Arc::clone(&slots).acquire_owned().await.unwrap();
        let abandoned = tokio::time::timeout(
            Duration::from_millis(20),
            converter.convert_with_permit(input, out.clone(), permit),
        )
        .await;
        assert!(abandoned.is_err());

        // The job is still running, so its slot is still taken.
        assert_eq!(slots.available_permits(), 0);

        let _again = Arc::clone(&slots).acquire_owned().await.unwrap();
        assert!(out.exists());
    }
}
