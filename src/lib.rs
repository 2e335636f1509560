//! # md2docx
//!
//! Convert Markdown documents to Word (DOCX) through pandoc, with HTML table
//! extraction and re-merge.
//!
//! ## Why this crate?
//!
//! pandoc's Markdown reader flattens raw `<table>` blocks: links, lists and
//! line breaks inside cells are lost. Its HTML reader handles them well. This
//! crate cuts block-level HTML tables out of the Markdown, converts them in a
//! separate HTML pass, and splices the resulting Word tables back into the
//! main document at the original positions, carrying over hyperlink
//! relationships and list numbering.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Markdown
//!  │
//!  ├─ 1. Input     read a local file or download from URL
//!  ├─ 2. Metadata  YAML block (title, author, date, abstract, toc-title)
//!  ├─ 3. Body      optional front-matter removal
//!  ├─ 4. Links     optional rewrite of /…/page.md links to a base URL
//!  ├─ 5. Tables    optional HTML table extraction → markers + side document
//!  ├─ 6. pandoc    markdown → docx, and html → docx for the side document
//!  └─ 7. Merge     marker paragraphs replaced by the converted tables
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use md2docx::{convert_to_file, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .title("User Guide")
//!         .remove_front_matter(true)
//!         .extract_html_table(true)
//!         .build()?;
//!     let output = convert_to_file("guide.md", "guide.docx", &config).await?;
//!     for warning in &output.warnings {
//!         eprintln!("warning: {warning}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! For full control over the converter (or to test without pandoc), call
//! [`markdown_to_docx`] with any [`DocumentConverter`].
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `md2docx` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! md2docx = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod docx;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, PandocConfig, PluginConfig, ReferenceDoc};
pub use convert::{
    convert, convert_batch, convert_batch_with, convert_from_bytes, convert_sync, convert_to_file,
    convert_with, markdown_to_docx,
};
pub use error::{Md2DocxError, MergeWarning};
pub use output::{BatchItem, ConversionOutput, ConversionStats};
pub use pipeline::metadata::{Authors, DocumentMetadata, MetadataDate};
pub use pipeline::pandoc::{DocumentConverter, PandocConverter};
pub use progress::{ConversionProgressCallback, ConversionStage, NoopProgressCallback, ProgressCallback};
