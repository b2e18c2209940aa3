//! PDF Merger CLI - Command line tool for merging pages of PDF documents.

use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_merger_core::{
    AppConfig, AssemblyJob, AssemblyOptions, AssemblyResult, MergePageRequest, MergeRequest,
    PageId, PageManifest, PdfMerger, Rotation, SourceDocument,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "pdf-merge")]
#[command(author, version, about = "Merge pages of PDF documents", long_about = None)]
struct Args {
    /// Input PDF files, in order
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output PDF file (default: the configured output name)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pages to take, e.g. "1:1-3,2:2@90,1:5" (FILE:PAGES[@ROTATION])
    #[arg(long, conflicts_with_all = ["skip", "rotate"])]
    select: Option<String>,

    /// Leave out a page, e.g. "2:1" (repeatable)
    #[arg(long, value_name = "FILE:PAGE")]
    skip: Vec<String>,

    /// Turn a page a quarter clockwise, e.g. "1:3" (repeatable)
    #[arg(long, value_name = "FILE:PAGE")]
    rotate: Vec<String>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// What to assemble: an explicit selection or the edited full manifest.
enum Work {
    Request(MergeRequest),
    Manifest(PageManifest),
}

/// A run of pages from one input, as written on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PageSelector {
    /// 1-based input position
    file: usize,
    first: usize,
    last: usize,
    rotation: Rotation,
}

fn parse_file_page(spec: &str) -> Result<(usize, usize)> {
    let (file, page) = spec
        .split_once(':')
        .with_context(|| format!("Expected FILE:PAGE, got '{spec}'"))?;
    let file: usize = file.trim().parse().context("Invalid file number")?;
    let page: usize = page.trim().parse().context("Invalid page number")?;
    if file == 0 || page == 0 {
        bail!("File and page numbers start at 1 in '{spec}'");
    }
    Ok((file, page))
}

fn parse_selection(spec: &str) -> Result<Vec<PageSelector>> {
    let mut result = Vec::new();

    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (target, rotation) = match part.split_once('@') {
            Some((target, degrees)) => {
                let degrees: i64 = degrees.trim().parse().context("Invalid rotation")?;
                (target, Rotation::from_degrees(degrees)?)
            }
            None => (part, Rotation::R0),
        };

        let (file, pages) = target
            .split_once(':')
            .with_context(|| format!("Expected FILE:PAGES, got '{part}'"))?;
        let file: usize = file.trim().parse().context("Invalid file number")?;

        let (first, last) = match pages.split_once('-') {
            Some((start, end)) => (
                start.trim().parse().context("Invalid page range start")?,
                end.trim().parse().context("Invalid page range end")?,
            ),
            None => {
                let page: usize = pages.trim().parse().context("Invalid page number")?;
                (page, page)
            }
        };

        if file == 0 || first == 0 || first > last {
            bail!("Invalid selection '{part}'");
        }
        result.push(PageSelector {
            file,
            first,
            last,
            rotation,
        });
    }

    if result.is_empty() {
        bail!("Empty page selection");
    }
    Ok(result)
}

fn source_at(documents: &[SourceDocument], file: usize) -> Result<&SourceDocument> {
    documents
        .get(file.wrapping_sub(1))
        .with_context(|| format!("File {file} is not one of the {} inputs", documents.len()))
}

/// Expand selectors into an explicit merge request.
fn selection_request(
    selectors: &[PageSelector],
    documents: &[SourceDocument],
    output_name: &str,
) -> Result<MergeRequest> {
    let mut pages = Vec::new();
    for selector in selectors {
        let doc = source_at(documents, selector.file)?;
        if selector.last > doc.page_count {
            bail!(
                "{} has {} pages, page {} requested",
                doc.original_name,
                doc.page_count,
                selector.last
            );
        }
        pages.extend((selector.first..=selector.last).map(|page_number| MergePageRequest {
            source_document_id: doc.id.clone(),
            page_number,
            rotation: selector.rotation,
        }));
    }
    Ok(MergeRequest {
        pages,
        output_name: Some(output_name.to_string()),
    })
}

/// Build the full manifest, then apply skips and rotations.
fn edited_manifest(documents: &[SourceDocument], skip: &[String], rotate: &[String]) -> Result<PageManifest> {
    let mut manifest = PageManifest::build(documents);

    let page_id = |spec: &str| -> Result<PageId> {
        let (file, page) = parse_file_page(spec)?;
        Ok(PageId::derive(&source_at(documents, file)?.id, page))
    };

    for spec in skip {
        manifest = manifest
            .toggle(&page_id(spec)?)
            .with_context(|| format!("Cannot skip '{spec}'"))?;
    }
    for spec in rotate {
        manifest = manifest
            .rotate(&page_id(spec)?)
            .with_context(|| format!("Cannot rotate '{spec}'"))?;
    }
    Ok(manifest)
}

/// Write `bytes` next to `path` and rename into place.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (before parsing args so env vars are available)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let log_level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = if let Some(config_path) = &args.config {
        AppConfig::from_file(config_path).context("Failed to load config file")?
    } else {
        AppConfig::load()
    };

    // Uploads and the intermediate artifact live in a scratch dir for this run
    let scratch = tempfile::tempdir().context("Failed to create scratch directory")?;
    config.storage.upload_dir = Some(scratch.path().join("uploads"));
    config.storage.output_dir = Some(scratch.path().join("outputs"));

    let output_path = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.default_output_name));
    let output_name = output_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(&config.default_output_name)
        .to_string();

    let merger = Arc::new(PdfMerger::new(config).context("Failed to initialize merger")?);

    let mut documents = Vec::with_capacity(args.inputs.len());
    for input in &args.inputs {
        info!("Loading PDF: {}", input.display());
        let bytes = std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
        let name = input
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("document.pdf");
        let doc = merger
            .registry()
            .register(name, bytes)
            .with_context(|| format!("Failed to load PDF: {}", input.display()))?;
        info!("{} has {} pages", name, doc.page_count);
        documents.push(doc);
    }

    let work = if let Some(spec) = &args.select {
        Work::Request(selection_request(&parse_selection(spec)?, &documents, &output_name)?)
    } else {
        Work::Manifest(edited_manifest(&documents, &args.skip, &args.rotate)?)
    };
    let total = match &work {
        Work::Request(request) => request.pages.len(),
        Work::Manifest(manifest) => manifest.enabled_pages().count(),
    };
    if total == 0 {
        bail!("No pages left to merge");
    }

    let pb = ProgressBar::new(total as u64);
    // Template is hardcoded and valid, unwrap is safe
    #[allow(clippy::unwrap_used)]
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );

    // Ctrl-C stops assembly between pages
    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_flag = Arc::clone(&cancel);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_flag.store(true, Ordering::Relaxed);
        }
    });

    let task_merger = Arc::clone(&merger);
    let task_pb = pb.clone();
    let result: AssemblyResult = tokio::task::spawn_blocking(move || {
        let progress = move |done: usize, _total: usize| task_pb.set_position(done as u64);
        let options = AssemblyOptions {
            progress: Some(&progress),
            cancel: Some(cancel.as_ref()),
        };
        match work {
            Work::Request(request) => {
                let plan = task_merger.planner().plan_request(&request)?;
                task_merger.engine().run(&mut AssemblyJob::new(plan), &options)
            }
            Work::Manifest(manifest) => task_merger.merge_manifest(&manifest, Some(output_name.as_str()), &options),
        }
    })
    .await
    .context("Assembly task failed")?
    .context("Failed to assemble output")?;

    pb.finish_with_message("Merge complete");

    let download = merger
        .artifacts()
        .retrieve(result.artifact_id.as_str())
        .context("Failed to read merged output")?;
    write_atomic(&output_path, &download.bytes)
        .with_context(|| format!("Failed to write output: {}", output_path.display()))?;

    if let Err(e) = merger.artifacts().expire(&result.artifact_id) {
        warn!("Failed to remove scratch artifact: {}", e);
    }

    // CLI output is intentional
    #[allow(clippy::print_stdout)]
    {
        println!(
            "Merged {} pages ({} KB) into: {}",
            result.page_count,
            result.file_size_kb(),
            output_path.display()
        );
    }

    Ok(())
}
