//! Configuration types for rendering and serving.
//!
//! [`RenderConfig`] controls a single conversion: resolution, quality, page,
//! output format and the colour alpha is flattened onto. [`ServerConfig`]
//! wraps it with everything the HTTP front end needs. Both have defaults that
//! reproduce the classic behaviour: first page, 300 DPI, quality 95, JPEG,
//! 10 MiB uploads on port 80.

use crate::error::RasterError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// PDF user space is defined in points; 72 points make an inch.
pub const POINTS_PER_INCH: f32 = 72.0;

/// Default upload bound: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 << 20;

/// Multipart field carrying the document.
pub const DEFAULT_UPLOAD_FIELD: &str = "PDF";

/// Default pixel budget for one rendered page: 64 megapixels, about 256 MB
/// as an RGBA bitmap. A2 at 300 DPI (4961×7016) fits; A1 does not.
pub const DEFAULT_MAX_PIXELS: u64 = 64_000_000;

/// Configuration for a single PDF-to-raster conversion.
///
/// Built via [`RenderConfig::builder()`] or using [`RenderConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2raster::{OutputFormat, RenderConfig};
///
/// let config = RenderConfig::builder()
///     .dpi(150)
///     .format(OutputFormat::Png)
///     .build()
///     .unwrap();
/// assert_eq!(config.format.extension(), "png");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Rendering resolution in dots per inch. Range: 72–600. Default: 300.
    ///
    /// The pixel size of the output is the page size in points × dpi / 72,
    /// so a US Letter page (612×792 pt) renders at 2550×3300 px.
    pub dpi: u32,

    /// JPEG compression quality. Range: 1–100. Default: 95.
    ///
    /// Ignored for PNG, which is lossless.
    pub quality: u8,

    /// Zero-based page to render. Default: 0.
    pub page_index: u16,

    /// Encoded output format. Default: [`OutputFormat::Jpeg`].
    pub format: OutputFormat,

    /// Opaque RGB colour that transparent regions are composited onto.
    /// Default: white.
    pub background: [u8; 3],

    /// Largest page, in pixels (`width_px × height_px`), that will be
    /// rendered. Default: [`DEFAULT_MAX_PIXELS`].
    ///
    /// The DPI is never lowered to fit: a page over the budget is refused
    /// with [`RasterError::Load`] before any bitmap is allocated.
    pub max_pixels: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            quality: 95,
            page_index: 0,
            format: OutputFormat::default(),
            background: [255, 255, 255],
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }
}

impl RenderConfig {
    /// Create a new builder for `RenderConfig`.
    pub fn builder() -> RenderConfigBuilder {
        RenderConfigBuilder {
            config: Self::default(),
        }
    }

    /// Pixel size of a page of `width_pt` × `height_pt` points at this DPI.
    pub fn pixel_size(&self, width_pt: f32, height_pt: f32) -> (u32, u32) {
        (
            points_to_pixels(width_pt, self.dpi),
            points_to_pixels(height_pt, self.dpi),
        )
    }
}

/// Convert a length in points to pixels at `dpi`, rounding to the nearest
/// pixel and never returning zero.
pub fn points_to_pixels(points: f32, dpi: u32) -> u32 {
    let px = (f64::from(points) * f64::from(dpi) / f64::from(POINTS_PER_INCH)).round();
    (px as u32).max(1)
}

/// Builder for [`RenderConfig`].
#[derive(Debug)]
pub struct RenderConfigBuilder {
    config: RenderConfig,
}

impl RenderConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn quality(mut self, quality: u8) -> Self {
        self.config.quality = quality;
        self
    }

    pub fn page_index(mut self, index: u16) -> Self {
        self.config.page_index = index;
        self
    }

    pub fn format(mut self, format: OutputFormat) -> Self {
        self.config.format = format;
        self
    }

    pub fn background(mut self, rgb: [u8; 3]) -> Self {
        self.config.background = rgb;
        self
    }

    pub fn max_pixels(mut self, pixels: u64) -> Self {
        self.config.max_pixels = pixels;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RenderConfig, RasterError> {
        let c = &self.config;
        if !(72..=600).contains(&c.dpi) {
            return Err(RasterError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if !(1..=100).contains(&c.quality) {
            return Err(RasterError::InvalidConfig(format!(
                "Quality must be 1–100, got {}",
                c.quality
            )));
        }
        if c.max_pixels == 0 {
            return Err(RasterError::InvalidConfig(
                "Pixel budget must be > 0".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Output format ────────────────────────────────────────────────────────

/// Encoded format of the rendered page.
///
/// JPEG is the default: it is what the conversion is tuned for (quality 95,
/// alpha flattened because JPEG cannot store it). PNG is available for
/// callers that want lossless output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
}

impl OutputFormat {
    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }

    /// MIME type of the encoded bytes.
    pub fn mime_type(self) -> &'static str {
        self.image_format().to_mime_type()
    }

    /// The matching `image` crate format.
    pub fn image_format(self) -> image::ImageFormat {
        match self {
            OutputFormat::Jpeg => image::ImageFormat::Jpeg,
            OutputFormat::Png => image::ImageFormat::Png,
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Jpeg => f.write_str("jpeg"),
            OutputFormat::Png => f.write_str("png"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = RasterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            other => Err(RasterError::InvalidConfig(format!(
                "Unknown output format '{other}' (expected jpg or png)"
            ))),
        }
    }
}

// ── Server ───────────────────────────────────────────────────────────────

/// Configuration for the HTTP front end.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Interface to listen on. Default: `0.0.0.0`.
    pub host: String,

    /// TCP port. Default: 80.
    pub port: u16,

    /// Directory served at `/` (the upload form). Default: `html`.
    pub static_dir: PathBuf,

    /// Where per-request scratch directories are created.
    /// `None` uses the system temp directory.
    pub temp_dir: Option<PathBuf>,

    /// Largest accepted request body in bytes. Default: 10 MiB.
    pub max_upload_bytes: usize,

    /// Multipart field holding the PDF. Default: `PDF`.
    pub upload_field: String,

    /// Conversions allowed to run at the same time.
    /// Default: available parallelism.
    pub max_concurrent_conversions: usize,

    /// Settings applied to every conversion.
    pub render: RenderConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 80,
            static_dir: PathBuf::from("html"),
            temp_dir: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            upload_field: DEFAULT_UPLOAD_FIELD.to_string(),
            max_concurrent_conversions: default_concurrency(),
            render: RenderConfig::default(),
        }
    }
}

impl ServerConfig {
    /// `host:port` as accepted by `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check the values a builder cannot clamp on its own.
    pub fn validate(&self) -> Result<(), RasterError> {
        if self.max_upload_bytes == 0 {
            return Err(RasterError::InvalidConfig(
                "Maximum upload size must be > 0".into(),
            ));
        }
        if self.max_concurrent_conversions == 0 {
            return Err(RasterError::InvalidConfig(
                "Concurrent conversions must be ≥ 1".into(),
            ));
        }
        if self.upload_field.is_empty() {
            return Err(RasterError::InvalidConfig(
                "Upload field name must not be empty".into(),
            ));
        }
        Ok(())
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
