use clap::{Parser, Subcommand};
use htmlimg::cache::CacheStats;
use htmlimg::config::{self, Config};
use htmlimg::pipeline::{Pipeline, PipelineStats, Rewrite};
use htmlimg::plan::OperatingMode;
use htmlimg::session::Session;
use htmlimg::output;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

type DocumentError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser)]
#[command(name = "htmlimg")]
#[command(about = "Rewrite image references in HTML into optimized artifacts")]
#[command(long_about = "\
Rewrite image references in HTML into optimized artifacts

Transformations are requested in the reference itself:

  <img src=\"img/photo.jpg?width=800&format=webp\">

becomes

  <img src=\".img/photo.w800.webp\">

and .img/photo.w800.webp is generated under the source root.

Parameters:
  width, height   Resize. One edge keeps the aspect ratio, two edges crop.
  format          jpeg (jpg), png, webp, avif, gif, tiff
  quality         1-100, for jpeg and avif
  background      #rgb or #rrggbb, flattens transparency

Output names are deterministic, so artifacts from earlier runs are reused.

Run 'htmlimg gen-config' to generate a documented htmlimg.toml.")]
#[command(version)]
struct Cli {
    /// Source root that references resolve against
    #[arg(long, default_value = ".", global = true)]
    source: PathBuf,

    /// Config file (default: <source>/htmlimg.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Artifact directory relative to the source root (overrides config)
    #[arg(long, global = true)]
    temp_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args)]
struct RewriteArgs {
    /// HTML files or directories (default: the source root)
    inputs: Vec<PathBuf>,

    /// Directory rewritten documents are written to
    #[arg(long, default_value = "dist")]
    out: PathBuf,

    /// Interactive run: honour --mode and print every generated artifact
    #[arg(long)]
    dev: bool,

    /// Operating mode for dev runs (overrides config)
    #[arg(long, value_enum)]
    mode: Option<OperatingMode>,

    /// Print per-document statistics as JSON lines
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Rewrite documents and generate the images they reference
    Rewrite(RewriteArgs),
    /// Show what would be generated, without writing anything
    Check {
        /// HTML files or directories (default: the source root)
        inputs: Vec<PathBuf>,
    },
    /// Remove the artifact directory
    Clean,
    /// Print a stock htmlimg.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    match &cli.command {
        Command::Rewrite(args) => {
            let mut config = load_config(&cli)?;
            if let Some(mode) = args.mode {
                config.mode = mode;
            }
            init_thread_pool(&config.processing);

            let session = Session::open(&cli.source, &config.temp_dir, args.dev)?;
            let pipeline = Pipeline::new(session, &config)?;
            let out_dir = std::path::absolute(&args.out)?;
            let documents = collect_documents(
                &args.inputs,
                pipeline.session().source_root(),
                &[pipeline.session().temp_path(), out_dir.as_path()],
            );
            tracing::debug!(count = documents.len(), mode = ?pipeline.mode(), "rewriting documents");

            let verbose = args.dev;
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    output::print_event(&event, verbose);
                }
            });
            let results: Vec<(String, Result<Option<PipelineStats>, DocumentError>)> = documents
                .par_iter()
                .map_with(tx, |tx, path| {
                    let label = document_label(path, pipeline.session().source_root());
                    let result = rewrite_document(&pipeline, path, &out_dir, tx);
                    (label, result)
                })
                .collect();
            printer.join().ok();

            let mut failures = 0;
            let mut rewritten = 0;
            let mut run = CacheStats::default();
            for (label, result) in &results {
                if let Ok(Some(stats)) = result {
                    rewritten += 1;
                    run.merge(&stats.cache);
                }
                match result {
                    Ok(Some(stats)) if args.json => {
                        let line = serde_json::json!({ "document": label, "stats": stats });
                        println!("{line}");
                    }
                    Ok(Some(stats)) => output::print_batch(label, stats),
                    Ok(None) => {}
                    Err(e) => {
                        failures += 1;
                        eprintln!("error: {label}: {e}");
                    }
                }
            }
            if args.json {
                println!("{}", serde_json::json!({ "documents": rewritten, "total": run }));
            } else {
                output::print_run_summary(rewritten, &run);
            }
            if failures > 0 {
                return Err(format!("{failures} document(s) could not be rewritten").into());
            }
        }
        Command::Check { inputs } => {
            let config = load_config(&cli)?;
            let session = Session::resolve(&cli.source, &config.temp_dir, false)?;
            let pipeline = Pipeline::new(session, &config)?;
            let documents = collect_documents(
                inputs,
                pipeline.session().source_root(),
                &[pipeline.session().temp_path()],
            );
            for path in &documents {
                let html = std::fs::read_to_string(path)?;
                let label = document_label(path, pipeline.session().source_root());
                output::print_preview(&label, &pipeline.preview(&html), |name| {
                    pipeline.public_path(name)
                });
            }
        }
        Command::Clean => {
            let config = load_config(&cli)?;
            let session = Session::resolve(&cli.source, &config.temp_dir, false)?;
            if session.close()? {
                println!("Removed {}", session.temp_path().display());
            } else {
                println!("Nothing to clean at {}", session.temp_path().display());
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Load config from `--config` or the source root, then apply CLI overrides.
fn load_config(cli: &Cli) -> Result<Config, config::ConfigError> {
    let mut config = match &cli.config {
        Some(path) => config::load_config_file(path)?,
        None => config::load_config(&cli.source)?,
    };
    if let Some(temp_dir) = &cli.temp_dir {
        config.temp_dir = temp_dir.clone();
        config.validate()?;
    }
    Ok(config)
}

/// Rewrite one document into `out_dir`. `None` when nothing matched; the
/// document is still copied so the output tree is complete.
fn rewrite_document(
    pipeline: &Pipeline,
    path: &Path,
    out_dir: &Path,
    events: &std::sync::mpsc::Sender<htmlimg::pipeline::PipelineEvent>,
) -> Result<Option<PipelineStats>, DocumentError> {
    let html = std::fs::read_to_string(path)?;
    let relative = path
        .strip_prefix(pipeline.session().source_root())
        .ok()
        .or_else(|| path.file_name().map(Path::new))
        .ok_or_else(|| format!("not a file: {}", path.display()))?;
    let target = out_dir.join(relative);
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)?;
    }

    match pipeline.rewrite(&html, Some(events))? {
        Rewrite::Unchanged => {
            std::fs::write(&target, html)?;
            Ok(None)
        }
        Rewrite::Rewritten { html, stats } => {
            std::fs::write(&target, html)?;
            Ok(Some(stats))
        }
    }
}

/// Every `.html`/`.htm` file under `inputs` (or `source_root` when empty),
/// skipping the `excluded` directories.
fn collect_documents(inputs: &[PathBuf], source_root: &Path, excluded: &[&Path]) -> Vec<PathBuf> {
    let roots: Vec<PathBuf> = if inputs.is_empty() {
        vec![source_root.to_path_buf()]
    } else {
        inputs
            .iter()
            .filter_map(|p| std::path::absolute(p).ok())
            .collect()
    };

    let mut documents: Vec<PathBuf> = roots
        .iter()
        .flat_map(|root| {
            WalkDir::new(root)
                .follow_links(true)
                .into_iter()
                .filter_entry(|entry| !excluded.iter().any(|dir| entry.path() == *dir))
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file() && is_html(entry.path()))
                .map(|entry| entry.into_path())
        })
        .collect();
    documents.sort();
    documents.dedup();
    documents
}

fn is_html(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("html") || e.eq_ignore_ascii_case("htm"))
        .unwrap_or(false)
}

fn document_label(path: &Path, source_root: &Path) -> String {
    path.strip_prefix(source_root)
        .unwrap_or(path)
        .display()
        .to_string()
}

/// Install the stderr log subscriber. `RUST_LOG` controls verbosity
/// (default `warn`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
