//! Alpha flattening: composite a rendered page onto an opaque background.
//!
//! JPEG has no alpha channel. Encoding an RGBA buffer straight to JPEG drops
//! alpha without blending, so transparent regions come out black (their RGB
//! is usually zero). Blending against the background colour first keeps
//! them the colour the page would have on paper.

use image::{DynamicImage, Rgb, RgbImage};

/// Blend every pixel of `image` over `background` and drop the alpha channel.
///
/// Takes the image by value: an RGBA8 page (what pdfium renders) is read in
/// place instead of being copied first. Images without alpha are converted
/// to RGB unchanged.
pub fn flatten_alpha(image: DynamicImage, background: [u8; 3]) -> RgbImage {
    let rgba = match image {
        DynamicImage::ImageRgba8(rgba) => rgba,
        other if !other.color().has_alpha() => return other.into_rgb8(),
        other => other.into_rgba8(),
    };

    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (src, dst) in rgba.pixels().zip(out.pixels_mut()) {
        let [r, g, b, a] = src.0;
        *dst = Rgb([
            blend(r, background[0], a),
            blend(g, background[1], a),
            blend(b, background[2], a),
        ]);
    }

    out
}

/// `fg` over `bg` with coverage `alpha`, rounded to nearest.
fn blend(fg: u8, bg: u8, alpha: u8) -> u8 {
    let a = u32::from(alpha);
    let v = u32::from(fg) * a + u32::from(bg) * (255 - a);
    ((v + 127) / 255) as u8
}
