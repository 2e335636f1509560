//! CLI binary for md2docx.
//!
//! A thin shim over the library crate that maps a JSON config file plus CLI
//! flags to `ConversionConfig`, converts one or more inputs, and writes the
//! DOCX files.

use anyhow::{Context, Result};
use clap::Parser;
use md2docx::convert::write_docx;
use md2docx::pipeline::input::default_output_name;
use md2docx::{
    convert_batch, ConversionConfig, ConversionProgressCallback, ConversionStage, ConversionStats,
    MergeWarning, MetadataDate, ProgressCallback, ReferenceDoc,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const SPINNER_TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over all inputs, plus a log line per
/// finished document and per merge warning. Documents finish out of order
/// during batch conversion, so per-source start times are tracked.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new(total: usize) -> Arc<Self> {
        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:32.green/238}] {pos:>3}/{len} documents  {wide_msg:.dim}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(SPINNER_TICKS);

        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn elapsed(&self, source: &str) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(source))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, source: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(source.to_string(), Instant::now());
        }
    }

    fn on_stage(&self, source: &str, stage: ConversionStage) {
        self.bar.set_message(format!("{source}: {stage}"));
    }

    fn on_warning(&self, source: &str, warning: &MergeWarning) {
        self.bar
            .println(format!("  {} {}  {}", yellow("⚠"), source, yellow(&warning.to_string())));
    }

    fn on_conversion_complete(&self, source: &str, stats: &ConversionStats) {
        let secs = self.elapsed(source);
        self.bar.println(format!(
            "  {} {}  {}  {}",
            green("✓"),
            source,
            dim(&format!(
                "{}/{} tables  {:>7} bytes",
                stats.tables_merged, stats.tables_extracted, stats.output_bytes
            )),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_conversion_error(&self, source: &str, error: &str) {
        let secs = self.elapsed(source);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let first_line = error.lines().next().unwrap_or(error);
        let msg = if first_line.chars().count() > 80 {
            format!("{}\u{2026}", first_line.chars().take(79).collect::<String>())
        } else {
            first_line.to_string()
        };

        self.bar.println(format!(
            "  {} {}  {}  {}",
            red("✗"),
            source,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic conversion (writes guide.docx in the current directory)
  md2docx guide.md

  # Explicit output file, with a config file
  md2docx --config md2docx.json guide.md -o out/guide.docx

  # Extract HTML tables, strip front matter, rewrite internal links
  md2docx --extract-tables --remove-front-matter \
          --link-base https://docs.example.com/v1 docs/*.md -o build/

  # Metadata and table of contents
  md2docx --title "Release Notes" --author "Docs Team" --date today \
          --toc --toc-depth 2 --toc-title Contents notes.md

  # Convert from URL, DOCX to stdout
  md2docx https://example.com/raw/README.md -o - > readme.docx

  # JSON summary of every conversion
  md2docx --json docs/*.md -o build/

CONFIG FILE (all keys optional):
  {
    "metadata": { "title": "...", "author": ["A", "B"], "date": "...",
                  "abstract": "...", "abstract-title": "...", "toc-title": "..." },
    "plugin":   { "remove_front_matter": true,
                  "replace_internal_links": false | "https://base/url",
                  "extract_html_table": true },
    "pandoc":   { "reference-doc": "bundled" | "path.docx" | null,
                  "resource-path": "...", "toc": true, "toc-depth": 3, "toc-title": "..." }
  }
  Command-line flags override values from the file.

ENVIRONMENT VARIABLES:
  PANDOC_PATH             Path to an existing pandoc: skips lookup and download
  PANDOC_AUTO_CACHE_DIR   Override the default pandoc cache directory
  RUST_LOG                Log filter, e.g. md2docx=debug

SETUP:
  pandoc is used from PANDOC_PATH or PATH when installed. Otherwise a pinned
  release (~30 MB) is downloaded on first run and cached in
  ~/.cache/md2docx/pandoc-<version>/.
"#;

/// Convert Markdown files and URLs to Word documents through pandoc.
#[derive(Parser, Debug)]
#[command(
    name = "md2docx",
    version,
    about = "Convert Markdown files and URLs to Word (DOCX) through pandoc",
    long_about = "Convert Markdown documents (local files or URLs) to DOCX through pandoc. \
Optionally injects metadata, strips front matter, rewrites internal links, and converts \
embedded HTML tables separately so links and lists inside cells survive.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local Markdown file paths or HTTP/HTTPS URLs.
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Output file (single input), directory (several inputs), or `-` for stdout.
    #[arg(short, long, env = "MD2DOCX_OUTPUT")]
    output: Option<PathBuf>,

    /// JSON configuration file (metadata / plugin / pandoc sections).
    #[arg(short, long, env = "MD2DOCX_CONFIG")]
    config: Option<PathBuf>,

    // ── Metadata ─────────────────────────────────────────────────────────
    /// Document title.
    #[arg(long)]
    title: Option<String>,

    /// Author; repeat for several, or give a comma-separated list.
    #[arg(long)]
    author: Vec<String>,

    /// Document date: free text, or `today`.
    #[arg(long)]
    date: Option<String>,

    /// Abstract text.
    #[arg(long = "abstract")]
    abstract_text: Option<String>,

    /// Heading shown above the abstract.
    #[arg(long)]
    abstract_title: Option<String>,

    /// Title of the table of contents.
    #[arg(long)]
    toc_title: Option<String>,

    // ── Plugins ──────────────────────────────────────────────────────────
    /// Remove `---` delimited front-matter blocks from the body.
    #[arg(long)]
    remove_front_matter: bool,

    /// Rewrite `(/…/page.md#frag)` links to `(<BASE>/page#frag)`.
    #[arg(long, value_name = "BASE")]
    link_base: Option<String>,

    /// Convert HTML tables separately and merge them back in.
    #[arg(long)]
    extract_tables: bool,

    // ── pandoc ───────────────────────────────────────────────────────────
    /// Reference DOCX for styles: a path, `bundled`, or `none`.
    #[arg(long, value_name = "PATH|bundled|none")]
    reference_doc: Option<String>,

    /// pandoc resource path for images and other linked files.
    #[arg(long)]
    resource_path: Option<String>,

    /// Generate a table of contents.
    #[arg(long, conflicts_with = "no_toc")]
    toc: bool,

    /// Explicitly disable the table of contents.
    #[arg(long)]
    no_toc: bool,

    /// Heading levels included in the table of contents (1–6).
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=6))]
    toc_depth: Option<u32>,

    /// pandoc executable to use instead of auto-detection.
    #[arg(long, env = "MD2DOCX_PANDOC")]
    pandoc: Option<PathBuf>,

    // ── Runtime ──────────────────────────────────────────────────────────
    /// Documents converted concurrently.
    #[arg(short = 'j', long, env = "MD2DOCX_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "MD2DOCX_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Print a JSON summary of every conversion to stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "MD2DOCX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MD2DOCX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MD2DOCX_QUIET")]
    quiet: bool,
}

/// Where one input's DOCX goes.
#[derive(Debug, Clone, PartialEq)]
enum Destination {
    Stdout,
    File(PathBuf),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let to_stdout = cli.output.as_deref() == Some(Path::new("-"));
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !to_stdout;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
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

    let destinations = plan_destinations(&cli.inputs, cli.output.as_deref())?;

    // ── Ensure pandoc is available ───────────────────────────────────────
    let pandoc_path = match cli.pandoc.clone() {
        Some(p) => p,
        None => ensure_pandoc(cli.quiet)?,
    };

    // ── Build config ─────────────────────────────────────────────────────
    let progress: Option<Arc<CliProgressCallback>> =
        show_progress.then(|| CliProgressCallback::new(cli.inputs.len()));
    let config = build_config(
        &cli,
        pandoc_path,
        progress.clone().map(|p| p as ProgressCallback),
    )?;

    // ── Run conversions ──────────────────────────────────────────────────
    let started = Instant::now();
    let items = convert_batch(&cli.inputs, &config)
        .await
        .context("Conversion failed")?;

    if let Some(ref p) = progress {
        p.bar.finish_and_clear();
    }

    // ── Write outputs ────────────────────────────────────────────────────
    let mut summaries = Vec::with_capacity(items.len());
    let mut failed = 0usize;
    for (item, dest) in items.into_iter().zip(destinations) {
        let outcome = match item.result {
            Ok(output) => match write_destination(&dest, &output.docx).await {
                Ok(()) => Ok(output),
                Err(e) => Err(e),
            },
            Err(e) => Err(anyhow::Error::new(e)),
        };

        match outcome {
            Ok(output) => {
                if !cli.quiet && !show_progress && !cli.json {
                    for w in &output.warnings {
                        eprintln!("{} {}: {}", yellow("⚠"), item.source, w);
                    }
                }
                summaries.push(serde_json::json!({
                    "source": item.source,
                    "output": dest_label(&dest),
                    "warnings": output.warnings,
                    "stats": output.stats,
                }));
            }
            Err(e) => {
                failed += 1;
                if !show_progress || cli.json {
                    eprintln!("{} {}: {:#}", red("✗"), item.source, e);
                }
                summaries.push(serde_json::json!({
                    "source": item.source,
                    "output": dest_label(&dest),
                    "error": format!("{e:#}"),
                }));
            }
        }
    }

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summaries).context("Failed to serialise summary")?
        );
    } else if !cli.quiet {
        let total = summaries.len();
        eprintln!(
            "{}  {}/{} documents  {}ms",
            if failed == 0 { green("✔") } else { red("✘") },
            bold(&(total - failed).to_string()),
            total,
            started.elapsed().as_millis(),
        );
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} conversions failed", summaries.len());
    }
    Ok(())
}

/// Locate pandoc, downloading it with a progress bar when needed.
fn ensure_pandoc(quiet: bool) -> Result<PathBuf> {
    if let Some(path) = pandoc_auto::local_pandoc_path() {
        return Ok(path);
    }
    if quiet {
        return tokio::task::block_in_place(|| pandoc_auto::ensure_pandoc(None))
            .context("Failed to download pandoc");
    }

    let dl_bar = ProgressBar::new(0);
    dl_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {bytes}/{total_bytes}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(SPINNER_TICKS),
    );
    dl_bar.set_prefix("pandoc");
    dl_bar.enable_steady_tick(Duration::from_millis(80));

    let bar = dl_bar.clone();
    // block_in_place keeps the reference lifetime valid (no 'static
    // requirement) while taking the blocking download off the executor.
    let path = tokio::task::block_in_place(|| {
        pandoc_auto::ensure_pandoc(Some(&|downloaded, total| {
            if let Some(t) = total {
                if bar.length().unwrap_or(0) != t {
                    bar.set_length(t);
                }
            }
            bar.set_position(downloaded);
        }))
    })
    .context("Failed to download pandoc")?;

    dl_bar.finish_with_message("ready ✓");
    Ok(path)
}

/// Map CLI args (and the optional config file) to `ConversionConfig`.
fn build_config(
    cli: &Cli,
    pandoc_path: PathBuf,
    progress: Option<ProgressCallback>,
) -> Result<ConversionConfig> {
    let base = match cli.config {
        Some(ref path) => ConversionConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => ConversionConfig::default(),
    };

    let mut builder = ConversionConfig::builder()
        .metadata(base.metadata)
        .plugin(base.plugin)
        .pandoc(base.pandoc)
        .pandoc_path(pandoc_path)
        .concurrency(cli.concurrency)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref t) = cli.title {
        builder = builder.title(t);
    }
    match cli.author.len() {
        0 => {}
        1 => builder = builder.author(&cli.author[0]),
        _ => builder = builder.authors(cli.author.clone()),
    }
    if let Some(ref d) = cli.date {
        builder = builder.date(parse_date(d));
    }
    if let Some(ref a) = cli.abstract_text {
        builder = builder.abstract_text(a);
    }
    if let Some(ref a) = cli.abstract_title {
        builder = builder.abstract_title(a);
    }
    if let Some(ref t) = cli.toc_title {
        builder = builder.toc_title(t);
    }
    if cli.remove_front_matter {
        builder = builder.remove_front_matter(true);
    }
    if let Some(ref base) = cli.link_base {
        builder = builder.replace_internal_links(base);
    }
    if cli.extract_tables {
        builder = builder.extract_html_table(true);
    }
    if let Some(ref doc) = cli.reference_doc {
        builder = builder.reference_doc(parse_reference_doc(doc));
    }
    if let Some(ref p) = cli.resource_path {
        builder = builder.resource_path(p);
    }
    if cli.toc {
        builder = builder.toc(true);
    } else if cli.no_toc {
        builder = builder.toc(false);
    }
    if let Some(depth) = cli.toc_depth {
        builder = builder.toc_depth(depth);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// `today` becomes the local date; anything else is passed through as text.
fn parse_date(s: &str) -> MetadataDate {
    if s.eq_ignore_ascii_case("today") {
        MetadataDate::Date(chrono::Local::now().date_naive())
    } else {
        MetadataDate::Text(s.to_string())
    }
}

fn parse_reference_doc(s: &str) -> ReferenceDoc {
    match s.to_lowercase().as_str() {
        "bundled" => ReferenceDoc::Bundled,
        "none" => ReferenceDoc::None,
        _ => ReferenceDoc::Path(PathBuf::from(s)),
    }
}

/// One destination per input, in input order.
///
/// A single input writes to `-o` as a file (or into it, when it names an
/// existing directory); several inputs need `-o` to be a directory. Without
/// `-o`, each input becomes `<stem>.docx` in the current directory.
fn plan_destinations(inputs: &[String], output: Option<&Path>) -> Result<Vec<Destination>> {
    let named = |dir: &Path, input: &str| Destination::File(dir.join(default_output_name(input)));

    match output {
        Some(p) if p == Path::new("-") => {
            if inputs.len() != 1 {
                anyhow::bail!("`-o -` (stdout) needs exactly one input, got {}", inputs.len());
            }
            Ok(vec![Destination::Stdout])
        }
        Some(p) if inputs.len() == 1 && !p.is_dir() => Ok(vec![Destination::File(p.to_path_buf())]),
        Some(p) => {
            if p.exists() && !p.is_dir() {
                anyhow::bail!(
                    "-o {} must be a directory when converting {} inputs",
                    p.display(),
                    inputs.len()
                );
            }
            Ok(inputs.iter().map(|i| named(p, i)).collect())
        }
        None => Ok(inputs.iter().map(|i| named(Path::new(""), i)).collect()),
    }
}

async fn write_destination(dest: &Destination, bytes: &[u8]) -> Result<()> {
    match dest {
        Destination::Stdout => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle.write_all(bytes).context("Failed to write to stdout")?;
            handle.flush().context("Failed to flush stdout")?;
            Ok(())
        }
        Destination::File(path) => Ok(write_docx(path, bytes).await?),
    }
}

fn dest_label(dest: &Destination) -> String {
    match dest {
        Destination::Stdout => "-".to_string(),
        Destination::File(p) => p.display().to_string(),
    }
}
