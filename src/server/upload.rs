//! `POST /upload`: multipart PDF in, first page as an image out.
//!
//! The handler owns a scratch directory for the lifetime of the request.
//! Input and output files live inside it, and it is removed when the handler
//! returns, whether the conversion succeeded or not.

use axum::{
    body::{Body, Bytes},
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    http::{header, HeaderValue, StatusCode},
    response::Response,
};
use std::path::Path;
use tempfile::TempDir;

use super::error::UploadError;
use super::state::AppState;
use crate::config::ServerConfig;
use crate::pipeline::{encode, input};

/// Served when neither the upload nor its name give us anything usable.
const DEFAULT_DOWNLOAD_STEM: &str = "page";

/// Header value telling every cache layer to keep its hands off.
const NO_STORE: &str = "private, no-transform, no-store, must-revalidate";

/// The file field pulled out of the multipart body.
#[derive(Debug)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// POST /upload
pub async fn upload_pdf(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, UploadError> {
    let mut multipart = multipart.map_err(|e| UploadError::InvalidUpload(e.body_text()))?;
    let config = state.config();

    let upload = read_file_field(&mut multipart, &config.upload_field, config.max_upload_bytes).await?;

    tracing::info!(
        file_name = ?upload.file_name,
        content_type = ?upload.content_type,
        size = upload.data.len(),
        "PDF upload received"
    );

    let label = upload.file_name.as_deref().unwrap_or("upload");
    input::check_pdf_bytes(&upload.data, Path::new(label))?;

    let scratch = scratch_dir(config)?;
    let format = state.converter().config().format;
    let input_path = scratch.path().join("input.pdf");
    let output_path = scratch.path().join(format!("page.{}", format.extension()));

    tokio::fs::write(&input_path, &upload.data)
        .await
        .map_err(UploadError::TempFile)?;

    let permit = state
        .conversions()
        .acquire_owned()
        .await
        .map_err(|_| UploadError::Internal("Conversion queue closed".into()))?;
    // The permit travels with the job: a client that disconnects mid-render
    // does not free its slot until the render is done.
    let report = state
        .converter()
        .convert_with_permit(input_path, output_path.clone(), permit)
        .await?;

    let image = tokio::fs::read(&output_path)
        .await
        .map_err(UploadError::TempFile)?;

    tracing::info!(
        pages = report.page_count,
        width = report.width_px,
        height = report.height_px,
        bytes = image.len(),
        duration_ms = report.duration_ms,
        "Upload converted"
    );

    let filename = format!(
        "{}.{}",
        download_stem(upload.file_name.as_deref()),
        format.extension()
    );
    image_response(image, &filename)
}

/// Find `field_name` among the multipart fields and read it fully.
///
/// Other fields are skipped. The body limit is enforced by the router's
/// `DefaultBodyLimit`; `max_bytes` is checked again here so the handler is
/// correct even when mounted without it.
pub async fn read_file_field(
    multipart: &mut Multipart,
    field_name: &str,
    max_bytes: usize,
) -> Result<UploadedFile, UploadError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_bytes))?
    {
        let name = field.name().unwrap_or("").to_string();
        if name != field_name {
            tracing::debug!("Skipping multipart field '{}'", name);
            continue;
        }

        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e, max_bytes))?;

        if data.len() > max_bytes {
            return Err(UploadError::FileTooLarge { max: max_bytes });
        }

        return Ok(UploadedFile {
            file_name,
            content_type,
            data,
        });
    }

    Err(UploadError::MissingFile(field_name.to_string()))
}

fn multipart_error(e: MultipartError, max_bytes: usize) -> UploadError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        UploadError::FileTooLarge { max: max_bytes }
    } else {
        UploadError::InvalidUpload(e.body_text())
    }
}

fn scratch_dir(config: &ServerConfig) -> Result<TempDir, UploadError> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("pdf2raster-");
    match &config.temp_dir {
        Some(dir) => builder.tempdir_in(dir),
        None => builder.tempdir(),
    }
    .map_err(UploadError::TempFile)
}

/// Turn the client's file name into a safe download name without extension.
fn download_stem(file_name: Option<&str>) -> String {
    let stem = file_name
        .map(|n| n.rsplit(['/', '\\']).next().unwrap_or(n))
        .map(|n| Path::new(n).file_stem().and_then(|s| s.to_str()).unwrap_or(""))
        .unwrap_or("");

    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_');

    if cleaned.is_empty() {
        DEFAULT_DOWNLOAD_STEM.to_string()
    } else {
        cleaned.to_string()
    }
}

/// 200 with the image as an attachment and caching disabled.
fn image_response(image: Vec<u8>, filename: &str) -> Result<Response, UploadError> {
    let content_type = encode::sniff_content_type(&image);
    let len = image.len();

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .header(header::EXPIRES, HeaderValue::from_static("0"))
        .header(header::CACHE_CONTROL, HeaderValue::from_static(NO_STORE))
        .header(header::CONTENT_LENGTH, len)
        .header("content-transfer-encoding", HeaderValue::from_static("binary"))
        .body(Body::from(image))
        .map_err(|e| UploadError::Internal(e.to_string()))
}
