//! Conversion entry points.
//!
//! [`markdown_to_docx`] is the synchronous core: raw Markdown bytes in, DOCX
//! bytes out, through whatever [`DocumentConverter`] the caller supplies.
//! The async front doors ([`convert`], [`convert_to_file`],
//! [`convert_batch`], …) resolve inputs, locate pandoc, and run the core
//! inside `tokio::task::spawn_blocking` since pandoc is a blocking child
//! process.

use crate::config::ConversionConfig;
use crate::error::Md2DocxError;
use crate::output::{BatchItem, ConversionOutput, ConversionStats};
use crate::pipeline::pandoc::{
    build_options, resolve_reference_doc, DocumentConverter, PandocConverter, SourceFormat,
};
use crate::pipeline::{frontmatter, input, links, merge, tables};
use crate::progress::{ConversionProgressCallback, ConversionStage};
use futures::stream::{self, StreamExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Source label used in progress events for in-memory input.
pub const MEMORY_SOURCE: &str = "-";

/// Convert Markdown bytes to a DOCX buffer.
///
/// Stages run in a fixed order, each gated by `config`:
/// metadata block, body (front matter stripped if enabled), internal link
/// rewriting over the whole text, HTML table extraction, pandoc over the main
/// text, and, when tables were extracted, pandoc over the tables followed by
/// the merge. If the first conversion fails the second is never attempted.
///
/// # Errors
/// Any [`Md2DocxError`] from decoding, conversion or merging. Merge
/// correlation misses are not errors; they are returned in
/// [`ConversionOutput::warnings`].
pub fn markdown_to_docx(
    markdown: &[u8],
    config: &ConversionConfig,
    converter: &dyn DocumentConverter,
) -> Result<ConversionOutput, Md2DocxError> {
    convert_labelled(MEMORY_SOURCE, markdown, config, converter)
}

/// [`markdown_to_docx`] with start/complete/error notifications for `source`.
fn convert_labelled(
    source: &str,
    markdown: &[u8],
    config: &ConversionConfig,
    converter: &dyn DocumentConverter,
) -> Result<ConversionOutput, Md2DocxError> {
    let callback = config.progress_callback.as_deref();
    if let Some(cb) = callback {
        cb.on_conversion_start(source);
    }

    let result = run_stages(source, markdown, config, converter, callback);

    if let Some(cb) = callback {
        match &result {
            Ok(output) => {
                for w in &output.warnings {
                    cb.on_warning(source, w);
                }
                cb.on_conversion_complete(source, &output.stats);
            }
            Err(e) => cb.on_conversion_error(source, &e.to_string()),
        }
    }
    result
}

fn run_stages(
    source: &str,
    raw: &[u8],
    config: &ConversionConfig,
    converter: &dyn DocumentConverter,
    callback: Option<&dyn ConversionProgressCallback>,
) -> Result<ConversionOutput, Md2DocxError> {
    let total_start = Instant::now();
    let stage = |s: ConversionStage| {
        debug!("{}: {}", source, s);
        if let Some(cb) = callback {
            cb.on_stage(source, s);
        }
    };
    let mut stats = ConversionStats {
        input_bytes: raw.len(),
        ..Default::default()
    };

    // ── Step 1: Metadata block ───────────────────────────────────────────
    stage(ConversionStage::Metadata);
    let mut markdown = config
        .metadata
        .generate_metadata_block()
        .map_err(|e| Md2DocxError::Internal(format!("metadata block: {e}")))?;

    // ── Step 2: Body ─────────────────────────────────────────────────────
    let body = if config.plugin.remove_front_matter {
        stage(ConversionStage::FrontMatter);
        frontmatter::remove_front_matter(raw)
    } else {
        raw.to_vec()
    };
    markdown.push_str(&String::from_utf8(body)?);
    markdown.push('\n');

    // ── Step 3: Internal links ───────────────────────────────────────────
    if let Some(ref base) = config.plugin.replace_internal_links {
        stage(ConversionStage::InternalLinks);
        markdown = links::rewrite_internal_links(&markdown, base);
    }

    // ── Step 4: Table extraction ─────────────────────────────────────────
    let extraction = if config.plugin.extract_html_table {
        stage(ConversionStage::TableExtraction);
        let extraction = tables::extract_html_tables(&markdown);
        debug!("Extracted {} HTML tables", extraction.tables.len());
        Some(extraction)
    } else {
        None
    };
    let main_text = extraction
        .as_ref()
        .map_or(markdown.as_str(), |e| e.content.as_str());
    stats.markdown_bytes = main_text.len();
    stats.tables_extracted = extraction.as_ref().map_or(0, |e| e.tables.len());

    // ── Step 5: Convert the main document ────────────────────────────────
    let reference_doc = resolve_reference_doc(&config.pandoc, converter)?;
    stage(ConversionStage::ConvertDocument);
    let pandoc_start = Instant::now();
    let main_docx = converter.convert(
        &build_options(&config.pandoc, SourceFormat::Markdown, reference_doc.as_deref()),
        main_text.as_bytes(),
    )?;
    debug!("Main document: {} bytes", main_docx.len());

    // ── Step 6: Convert and merge the tables ─────────────────────────────
    let (docx, warnings) = match extraction.filter(|e| !e.is_empty()) {
        Some(extraction) => {
            stage(ConversionStage::ConvertTables);
            let side_docx = converter.convert(
                &build_options(&config.pandoc, SourceFormat::Html, reference_doc.as_deref()),
                extraction.side_document().as_bytes(),
            )?;
            stats.pandoc_duration_ms = pandoc_start.elapsed().as_millis() as u64;
            debug!("Table document: {} bytes", side_docx.len());

            stage(ConversionStage::MergeTables);
            let merge_start = Instant::now();
            let outcome = merge::merge_documents(&main_docx, &side_docx, tables::MARKER_PREFIX)
                .inspect_err(|e| error!("Table merge failed for {}: {}", source, e))?;
            stats.merge_duration_ms = merge_start.elapsed().as_millis() as u64;
            stats.tables_merged = outcome.tables_merged;
            (outcome.document, outcome.warnings)
        }
        None => {
            stats.pandoc_duration_ms = pandoc_start.elapsed().as_millis() as u64;
            (main_docx, Vec::new())
        }
    };

    stats.output_bytes = docx.len();
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;

    info!(
        "Converted {}: {} tables ({} merged), {} bytes, {}ms",
        source,
        stats.tables_extracted,
        stats.tables_merged,
        stats.output_bytes,
        stats.total_duration_ms
    );

    Ok(ConversionOutput {
        docx,
        warnings,
        stats,
    })
}

/// Convert a Markdown file or URL to DOCX with pandoc.
///
/// pandoc is taken from [`ConversionConfig::pandoc_path`] or located by
/// `pandoc-auto` (downloading a pinned release on first use).
///
/// # Errors
/// Returns `Err(Md2DocxError)` for fatal errors:
/// - File not found / permission denied / download failure
/// - pandoc unavailable or failing
/// - Malformed DOCX from either pandoc run
pub async fn convert(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2DocxError> {
    let converter = locate_converter(config).await?;
    convert_with(input_str, config, converter).await
}

/// [`convert`] with a caller-supplied converter.
pub async fn convert_with(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
    converter: Arc<dyn DocumentConverter>,
) -> Result<ConversionOutput, Md2DocxError> {
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = match input::resolve_input(input_str, config.download_timeout_secs).await {
        Ok(r) => r,
        Err(e) => {
            if let Some(ref cb) = config.progress_callback {
                cb.on_conversion_error(input_str, &e.to_string());
            }
            return Err(e);
        }
    };

    // ── Step 2: Run the pipeline off the async executor ──────────────────
    let config = config.clone();
    tokio::task::spawn_blocking(move || {
        convert_labelled(&resolved.source, &resolved.bytes, &config, converter.as_ref())
    })
    .await
    .map_err(|e| Md2DocxError::Internal(format!("conversion task failed: {e}")))?
}

/// Convert Markdown bytes in memory with pandoc.
pub async fn convert_from_bytes(
    bytes: &[u8],
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2DocxError> {
    let converter = locate_converter(config).await?;
    let bytes = bytes.to_vec();
    let config = config.clone();
    tokio::task::spawn_blocking(move || markdown_to_docx(&bytes, &config, converter.as_ref()))
        .await
        .map_err(|e| Md2DocxError::Internal(format!("conversion task failed: {e}")))?
}

/// Convert a Markdown file or URL and write the DOCX to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files. The
/// returned output still carries the DOCX bytes.
pub async fn convert_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2DocxError> {
    let output = convert(input_str, config).await?;
    write_docx(output_path.as_ref(), &output.docx).await?;
    Ok(output)
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    config: &ConversionConfig,
) -> Result<ConversionOutput, Md2DocxError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Md2DocxError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, config))
}

/// Convert many inputs, at most [`ConversionConfig::concurrency`] at a time.
///
/// pandoc is located once up front; failing that fails the whole batch.
/// Per-input failures are reported in the returned items, which follow the
/// order of `inputs`.
pub async fn convert_batch(
    inputs: &[String],
    config: &ConversionConfig,
) -> Result<Vec<BatchItem>, Md2DocxError> {
    let converter = locate_converter(config).await?;
    Ok(convert_batch_with(inputs, config, converter).await)
}

/// [`convert_batch`] with a caller-supplied converter.
pub async fn convert_batch_with(
    inputs: &[String],
    config: &ConversionConfig,
    converter: Arc<dyn DocumentConverter>,
) -> Vec<BatchItem> {
    let mut items: Vec<(usize, BatchItem)> = stream::iter(inputs.iter().enumerate().map(
        |(idx, source)| {
            let converter = Arc::clone(&converter);
            async move {
                let result = convert_with(source, config, converter).await;
                (
                    idx,
                    BatchItem {
                        source: source.clone(),
                        result,
                    },
                )
            }
        },
    ))
    .buffer_unordered(config.concurrency.max(1))
    .collect()
    .await;

    items.sort_by_key(|(idx, _)| *idx);
    items.into_iter().map(|(_, item)| item).collect()
}

/// Write `bytes` to `path` through a sibling temp file and a rename.
pub async fn write_docx(path: &Path, bytes: &[u8]) -> Result<(), Md2DocxError> {
    let write_err = |e: std::io::Error| Md2DocxError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = path.with_extension("docx.tmp");
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// The configured pandoc, or one located (and possibly downloaded) by
/// `pandoc-auto` on a blocking thread.
async fn locate_converter(
    config: &ConversionConfig,
) -> Result<Arc<dyn DocumentConverter>, Md2DocxError> {
    if let Some(ref path) = config.pandoc_path {
        return Ok(Arc::new(PandocConverter::new(path.clone())));
    }
    let converter = tokio::task::spawn_blocking(PandocConverter::locate)
        .await
        .map_err(|e| Md2DocxError::Internal(format!("pandoc lookup task failed: {e}")))??;
    debug!("Using pandoc at {}", converter.program().display());
    Ok(Arc::new(converter))
}
