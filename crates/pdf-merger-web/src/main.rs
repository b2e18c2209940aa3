//! PDF Merger Web - JSON API for uploading PDFs and assembling merged documents.

mod helpers;
mod routes;
mod state;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, header};
use clap::Parser;
use pdf_merger_core::AppConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use state::AppState;

#[derive(Parser, Debug)]
#[command(name = "pdf-merger-web")]
#[command(author, version, about = "PDF Merger Web Server", long_about = None)]
struct Args {
    /// Host to bind to
    #[arg(long, env = "HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to bind to
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: u16,

    /// Config file (defaults to the XDG config dir, then ./config.toml)
    #[arg(short, long, env = "PDF_MERGER_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for uploaded documents (overrides config)
    #[arg(long, env = "UPLOAD_DIR")]
    upload_dir: Option<PathBuf>,

    /// Directory for merged outputs (overrides config)
    #[arg(long, env = "OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AppConfig::load(),
    };

    if let Some(dir) = &args.upload_dir {
        config.storage.upload_dir = Some(dir.clone());
    }
    if let Some(dir) = &args.output_dir {
        config.storage.output_dir = Some(dir.clone());
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let default_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    let config = load_config(&args)?;
    let body_limit = usize::try_from(
        config
            .limits
            .max_upload_bytes()
            .saturating_mul(config.limits.max_files_per_upload as u64),
    )
    .unwrap_or(usize::MAX);
    let sweep_interval = config.retention.sweep_interval();

    let state = Arc::new(AppState::new(config).context("Failed to initialize application state")?);

    // Background sweep of stale documents and unclaimed artifacts
    let sweep_state = Arc::clone(&state);
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(sweep_interval).await;
            if let Some(report) = sweep_state.sweep().await {
                debug!(
                    "Sweep removed {} documents, {} artifacts",
                    report.documents.len(),
                    report.artifacts.len()
                );
            }
        }
    });

    let app = routes::api_router(state)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, max-age=0"),
        ))
        .layer(CompressionLayer::new())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
