//! CLI binary for pdf2raster.
//!
//! A thin shim over the library crate: `serve` maps flags onto
//! `ServerConfig` and runs the HTTP server, `convert` runs a single
//! conversion on a local file.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use pdf2raster::{
    server, AppState, Converter, OutputFormat, PdfiumRasterizer, RenderConfig, ServerConfig,
};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Serve the upload form and POST /upload on port 8080
  pdf2raster serve --port 8080

  # One-shot conversion of a local file
  pdf2raster convert invoice.pdf invoice.jpg

  # Lossless output
  pdf2raster convert --format png scan.pdf scan.png

  # Upload with curl
  curl -F PDF=@invoice.pdf http://localhost:8080/upload -o invoice.jpg

ENVIRONMENT VARIABLES:
  PDF2RASTER_HOST              Interface to bind (default 0.0.0.0)
  PDF2RASTER_PORT              TCP port (default 80)
  PDF2RASTER_STATIC_DIR        Directory served at / (default html)
  PDF2RASTER_TEMP_DIR          Parent of per-request scratch directories
  PDF2RASTER_MAX_UPLOAD_BYTES  Upload limit in bytes (default 10485760)
  PDF2RASTER_MAX_CONCURRENCY   Conversions running at once
  PDF2RASTER_DPI               Render resolution (default 300)
  PDF2RASTER_QUALITY           JPEG quality 1-100 (default 95)
  PDF2RASTER_FORMAT            jpg or png (default jpg)
  PDF2RASTER_MAX_PIXELS        Largest page accepted, in pixels (default 64000000)
  PDFIUM_LIB_PATH              libpdfium file, or the directory containing it
  RUST_LOG                     Overrides --verbose / --quiet
"#;

/// Rasterize the first page of a PDF, over HTTP or from the command line.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2raster",
    version,
    about = "Rasterize the first page of a PDF at 300 DPI",
    long_about = "Rasterize the first page of a PDF document into a JPEG (or PNG) at \
300 DPI with transparency flattened onto white. Runs as an HTTP upload service or \
converts a single local file.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "PDF2RASTER_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "PDF2RASTER_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP upload service.
    Serve(ServeArgs),

    /// Convert one local PDF and exit.
    Convert(ConvertArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Interface to listen on.
    #[arg(long, env = "PDF2RASTER_HOST", default_value = "0.0.0.0")]
    host: String,

    /// TCP port.
    #[arg(short, long, env = "PDF2RASTER_PORT", default_value_t = 80)]
    port: u16,

    /// Directory served at `/` (the upload form).
    #[arg(long, env = "PDF2RASTER_STATIC_DIR", default_value = "html")]
    static_dir: PathBuf,

    /// Parent directory for per-request scratch space.
    #[arg(long, env = "PDF2RASTER_TEMP_DIR")]
    temp_dir: Option<PathBuf>,

    /// Largest accepted upload in bytes.
    #[arg(long, env = "PDF2RASTER_MAX_UPLOAD_BYTES",
          default_value_t = pdf2raster::config::DEFAULT_MAX_UPLOAD_BYTES)]
    max_upload_bytes: usize,

    /// Conversions allowed to run at the same time (default: CPU count).
    #[arg(long, env = "PDF2RASTER_MAX_CONCURRENCY")]
    max_concurrency: Option<usize>,

    #[command(flatten)]
    render: RenderArgs,
}

#[derive(Args, Debug)]
struct ConvertArgs {
    /// PDF to read.
    input: PathBuf,

    /// Image to write. Its extension picks the format unless --format is given.
    output: PathBuf,

    #[command(flatten)]
    render: RenderArgs,

    /// Print the conversion report as JSON on stdout.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Render resolution (72–600).
    #[arg(long, env = "PDF2RASTER_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// JPEG quality (1–100). Ignored for PNG.
    #[arg(long, env = "PDF2RASTER_QUALITY", default_value_t = 95,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// Output format: jpg or png.
    #[arg(long, env = "PDF2RASTER_FORMAT")]
    format: Option<OutputFormat>,

    /// Refuse pages whose bitmap would exceed this many pixels.
    #[arg(long, env = "PDF2RASTER_MAX_PIXELS",
          default_value_t = pdf2raster::config::DEFAULT_MAX_PIXELS,
          value_parser = clap::value_parser!(u64).range(1..))]
    max_pixels: u64,

    /// libpdfium to load (file or directory). Defaults to ./ then the system.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,
}

impl RenderArgs {
    fn render_config(&self, fallback: OutputFormat) -> Result<RenderConfig> {
        RenderConfig::builder()
            .dpi(self.dpi)
            .quality(self.quality)
            .max_pixels(self.max_pixels)
            .format(self.format.unwrap_or(fallback))
            .build()
            .context("Invalid render configuration")
    }

    fn start_engine(&self) -> Result<PdfiumRasterizer> {
        PdfiumRasterizer::start(self.pdfium_lib.as_deref())
            .context("Failed to bind the PDFium library (set PDFIUM_LIB_PATH)")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Serve(args) => serve(args).await,
        Command::Convert(args) => convert(args, cli.quiet).await,
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    tracing::info!("pdf2raster v{}", env!("CARGO_PKG_VERSION"));

    let config = server_config(&args)?;
    tracing::info!(
        address = %config.bind_address(),
        static_dir = %config.static_dir.display(),
        max_upload_bytes = config.max_upload_bytes,
        max_concurrency = config.max_concurrent_conversions,
        dpi = config.render.dpi,
        quality = config.render.quality,
        format = %config.render.format,
        "Configuration loaded"
    );

    let engine = tokio::task::block_in_place(|| args.render.start_engine())?;
    let state = AppState::new(config.clone(), Arc::new(engine));

    let listener = tokio::net::TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address()))?;

    server::serve(listener, state)
        .await
        .context("HTTP server failed")
}

async fn convert(args: ConvertArgs, quiet: bool) -> Result<()> {
    let render = args.render.render_config(format_for_path(&args.output))?;
    let engine = tokio::task::block_in_place(|| args.render.start_engine())?;
    let converter = Converter::new(Arc::new(engine), render);

    let report = converter
        .convert_async(args.input.clone(), args.output.clone())
        .await
        .with_context(|| format!("Failed to convert {}", args.input.display()))?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !quiet {
        eprintln!(
            "{}x{} {}  {} bytes  {}ms  →  {}",
            report.width_px,
            report.height_px,
            report.format,
            report.bytes_written,
            report.duration_ms,
            report.output.display()
        );
    }
    Ok(())
}

/// Map CLI args to `ServerConfig`.
fn server_config(args: &ServeArgs) -> Result<ServerConfig> {
    let defaults = ServerConfig::default();
    let config = ServerConfig {
        host: args.host.clone(),
        port: args.port,
        static_dir: args.static_dir.clone(),
        temp_dir: args.temp_dir.clone(),
        max_upload_bytes: args.max_upload_bytes,
        max_concurrent_conversions: args
            .max_concurrency
            .unwrap_or(defaults.max_concurrent_conversions),
        render: args.render.render_config(OutputFormat::default())?,
        ..defaults
    };
    config.validate().context("Invalid server configuration")?;
    Ok(config)
}

/// Format implied by the output file extension, JPEG when unknown.
fn format_for_path(path: &Path) -> OutputFormat {
    path.extension()
        .and_then(|e| e.to_str())
        .and_then(|e| e.parse().ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(format_for_path(Path::new("out.png")), OutputFormat::Png);
        assert_eq!(format_for_path(Path::new("out.JPEG")), OutputFormat::Jpeg);
        assert_eq!(format_for_path(Path::new("out")), OutputFormat::Jpeg);
        assert_eq!(format_for_path(Path::new("out.tiff")), OutputFormat::Jpeg);
    }

    #[test]
    fn serve_defaults() {
        let cli = Cli::try_parse_from(["pdf2raster", "serve"]).unwrap();
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        let config = server_config(&args).unwrap();
        assert_eq!(config.port, 80);
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.render.dpi, 300);
        assert_eq!(config.render.quality, 95);
        assert_eq!(config.render.format, OutputFormat::Jpeg);
        assert_eq!(
            config.render.max_pixels,
            pdf2raster::config::DEFAULT_MAX_PIXELS
        );
    }

    #[test]
    fn explicit_format_wins_over_extension() {
        let cli = Cli::try_parse_from([
            "pdf2raster",
            "convert",
            "--format",
            "png",
            "in.pdf",
            "out.jpg",
        ])
        .unwrap();
        let Command::Convert(args) = cli.command else {
            panic!("expected convert");
        };
        let render = args
            .render
            .render_config(format_for_path(&args.output))
            .unwrap();
        assert_eq!(render.format, OutputFormat::Png);
    }

    #[test]
    fn zero_pixel_budget_is_rejected() {
        assert!(Cli::try_parse_from(["pdf2raster", "serve", "--max-pixels", "0"]).is_err());
    }

    #[test]
    fn dpi_out_of_range_is_rejected() {
        assert!(Cli::try_parse_from(["pdf2raster", "serve", "--dpi", "1200"]).is_err());
    }
}
