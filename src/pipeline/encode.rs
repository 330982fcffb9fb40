//! Image encoding: flattened page → JPEG or PNG bytes.
//!
//! JPEG is written at the configured quality (95 by default) with a JFIF
//! density header carrying the render DPI.

use crate::config::OutputFormat;
use crate::error::RasterError;
use image::codecs::jpeg::{JpegEncoder, PixelDensity};
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};
use tracing::debug;

/// Fallback when the bytes match no known image signature.
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Encode `img` as `format`.
///
/// `quality` applies to JPEG only; `dpi` is recorded in the JPEG header.
pub fn encode_page(
    img: &RgbImage,
    format: OutputFormat,
    quality: u8,
    dpi: u32,
) -> Result<Vec<u8>, RasterError> {
    let mut buf = Vec::new();
    let (w, h) = img.dimensions();

    let result = match format {
        OutputFormat::Jpeg => {
            let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
            encoder.set_pixel_density(PixelDensity::dpi(u16::try_from(dpi).unwrap_or(u16::MAX)));
            encoder.write_image(img.as_raw(), w, h, ExtendedColorType::Rgb8)
        }
        OutputFormat::Png => {
            PngEncoder::new(&mut buf).write_image(img.as_raw(), w, h, ExtendedColorType::Rgb8)
        }
    };

    result.map_err(|e| RasterError::Encode {
        format: format.to_string(),
        detail: e.to_string(),
    })?;

    debug!("Encoded {}x{} page → {} bytes {}", w, h, buf.len(), format);
    Ok(buf)
}

/// Determine the MIME type of `bytes` from their content, not a file name.
pub fn sniff_content_type(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .map(|f| f.to_mime_type())
        .unwrap_or(OCTET_STREAM)
}
