//! End-to-end tests against the real pdfium engine.
//!
//! They need the native pdfium library, so they are gated behind the
//! `E2E_ENABLED` environment variable and skip if the library cannot be
//! bound.
//!
//! Run with:
//!   E2E_ENABLED=1 PDFIUM_LIB_PATH=/opt/pdfium/lib cargo test --test e2e -- --nocapture

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use image::GenericImageView;
use pdf2raster::{
    router, AppState, Converter, OutputFormat, PageRasterizer, PageRequest, PdfiumRasterizer,
    RenderConfig, ServerConfig,
};
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tower::ServiceExt;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn page(page_index: u16, dpi: u32) -> PageRequest {
    PageRequest {
        page_index,
        dpi,
        ..PageRequest::from(&RenderConfig::default())
    }
}

/// One engine for the whole test binary; pdfium is bound once per process.
fn engine() -> Option<Arc<PdfiumRasterizer>> {
    static ENGINE: OnceLock<Option<Arc<PdfiumRasterizer>>> = OnceLock::new();
    ENGINE
        .get_or_init(|| match PdfiumRasterizer::start(None) {
            Ok(e) => Some(Arc::new(e)),
            Err(e) => {
                println!("SKIP — pdfium not available: {e}");
                None
            }
        })
        .clone()
}

/// Skip this test unless E2E_ENABLED is set and pdfium can be bound.
macro_rules! e2e_engine_or_skip {
    () => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        match engine() {
            Some(e) => e,
            None => return,
        }
    }};
}

/// Build a minimal valid PDF with one blank page per `(width, height)` in
/// points. The first page gets a filled black square so it is not blank.
fn make_pdf(pages: &[(u32, u32)]) -> Vec<u8> {
    let mut objects: Vec<String> = Vec::new();
    let n = pages.len();

    // 1: catalog, 2: pages, then for each page a page object and a content stream.
    objects.push("<< /Type /Catalog /Pages 2 0 R >>".to_string());
    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", 3 + 2 * i)).collect();
    objects.push(format!(
        "<< /Type /Pages /Kids [{}] /Count {} >>",
        kids.join(" "),
        n
    ));

    for (i, (w, h)) in pages.iter().enumerate() {
        let content_id = 4 + 2 * i;
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {w} {h}] /Contents {content_id} 0 R >>"
        ));
        let stream = if i == 0 {
            "0 0 0 rg 10 10 50 50 re f".to_string()
        } else {
            String::new()
        };
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            stream.len(),
            stream
        ));
    }

    let mut out = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_at = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for off in offsets {
        out.extend_from_slice(format!("{off:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_at
        )
        .as_bytes(),
    );
    out
}

fn write_pdf(dir: &Path, name: &str, pages: &[(u32, u32)]) -> std::path::PathBuf {
    let p = dir.join(name);
    std::fs::write(&p, make_pdf(pages)).unwrap();
    p
}

// ── Engine ───────────────────────────────────────────────────────────────────

#[test]
fn letter_page_renders_at_300_dpi() {
    let engine = e2e_engine_or_skip!();
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(dir.path(), "letter.pdf", &[(612, 792)]);

    let page = engine.rasterize(&input, page(0, 300)).unwrap();
    assert_eq!(page.page_count, 1);
    assert_eq!(page.image.dimensions(), (2550, 3300));
}

#[test]
fn missing_page_is_a_load_error() {
    let engine = e2e_engine_or_skip!();
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(dir.path(), "one.pdf", &[(200, 200)]);

    let err = engine.rasterize(&input, page(5, 72)).unwrap_err();
    assert!(err.is_client_error(), "got: {err}");
}

#[test]
fn oversized_media_box_is_refused_before_rendering() {
    let engine = e2e_engine_or_skip!();
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(dir.path(), "poster.pdf", &[(5000, 5000)]);

    let err = engine.rasterize(&input, page(0, 300)).unwrap_err();
    assert!(matches!(err, pdf2raster::RasterError::Load { .. }), "got: {err}");
    assert!(err.to_string().contains("pixel limit"), "got: {err}");
}

#[test]
fn corrupt_pdf_is_a_load_error() {
    let engine = e2e_engine_or_skip!();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("corrupt.pdf");
    std::fs::write(&input, b"%PDF-1.4\nthis is not really a pdf\n").unwrap();

    let err = engine.rasterize(&input, page(0, 72)).unwrap_err();
    assert!(matches!(err, pdf2raster::RasterError::Load { .. }), "got: {err}");
}

// ── Converter ────────────────────────────────────────────────────────────────

#[test]
fn converts_first_page_of_three() {
    let engine = e2e_engine_or_skip!();
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(dir.path(), "three.pdf", &[(300, 150), (612, 792), (612, 792)]);
    let output = dir.path().join("out.jpg");

    let converter = Converter::new(engine, RenderConfig::default());
    let report = converter.convert(&input, &output).unwrap();

    assert_eq!(report.page_index, 0);
    assert_eq!(report.page_count, 3);
    assert_eq!((report.width_px, report.height_px), (1250, 625));

    let img = image::open(&output).unwrap();
    assert_eq!(img.dimensions(), (1250, 625));
    assert!(!img.color().has_alpha());
}

#[test]
fn output_has_no_transparency_and_white_background() {
    let engine = e2e_engine_or_skip!();
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(dir.path(), "page.pdf", &[(200, 200)]);
    let output = dir.path().join("out.png");

    let config = RenderConfig::builder()
        .dpi(72)
        .format(OutputFormat::Png)
        .build()
        .unwrap();
    Converter::new(engine, config)
        .convert(&input, &output)
        .unwrap();

    let img = image::open(&output).unwrap().to_rgba8();
    assert!(img.pixels().all(|p| p.0[3] == 255));
    // Top-left corner is outside the filled square.
    assert_eq!(img.get_pixel(0, 0).0, [255, 255, 255, 255]);
    // PDF y grows upward; the square sits at the bottom-left.
    assert_eq!(img.get_pixel(30, 170).0[..3], [0, 0, 0]);
}

#[test]
fn repeat_conversion_is_deterministic() {
    let engine = e2e_engine_or_skip!();
    let dir = tempfile::tempdir().unwrap();
    let input = write_pdf(dir.path(), "page.pdf", &[(612, 792)]);
    let converter = Converter::new(engine, RenderConfig::default());

    converter.convert(&input, dir.path().join("a.jpg")).unwrap();
    converter.convert(&input, dir.path().join("b.jpg")).unwrap();

    let a = std::fs::read(dir.path().join("a.jpg")).unwrap();
    let b = std::fs::read(dir.path().join("b.jpg")).unwrap();
    assert_eq!(a, b);
}

// ── HTTP ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn upload_round_trip_through_pdfium() {
    let engine = e2e_engine_or_skip!();
    let scratch = tempfile::tempdir().unwrap();
    let config = ServerConfig {
        temp_dir: Some(scratch.path().to_path_buf()),
        ..ServerConfig::default()
    };
    let app = router(AppState::new(config, engine));

    let boundary = "e2e-boundary";
    let mut body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"PDF\"; \
         filename=\"letter.pdf\"\r\nContent-Type: application/pdf\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(&make_pdf(&[(612, 792), (100, 100)]));
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let req = Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();

    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/jpeg");

    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let img = image::load_from_memory(&bytes).unwrap();
    assert_eq!(img.dimensions(), (2550, 3300));
    assert!(std::fs::read_dir(scratch.path()).unwrap().next().is_none());
}
