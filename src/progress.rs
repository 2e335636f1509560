//! Progress-callback trait for per-document conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline moves each document through its stages.
//!
//! Every event carries the `source` label of the document: the path or URL
//! given to [`crate::convert::convert`], or `"-"` for in-memory input. During
//! [`crate::convert::convert_batch`] several documents are in flight at once,
//! so events for different sources interleave.
//!
//! # Example
//!
//! ```rust
//! use md2docx::{ConversionConfig, ConversionProgressCallback, ConversionStage, MergeWarning};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct WarningCounter {
//!     warnings: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for WarningCounter {
//!     fn on_warning(&self, source: &str, warning: &MergeWarning) {
//!         self.warnings.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{source}: {warning}");
//!     }
//! }
//!
//! let counter = Arc::new(WarningCounter { warnings: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::error::MergeWarning;
use crate::output::ConversionStats;
use std::fmt;
use std::sync::Arc;

/// A step of the conversion pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionStage {
    /// Rendering the YAML metadata block.
    Metadata,
    /// Removing front-matter blocks from the body.
    FrontMatter,
    /// Rewriting root-relative `.md` links.
    InternalLinks,
    /// Cutting HTML tables out of the Markdown.
    TableExtraction,
    /// pandoc run over the main Markdown.
    ConvertDocument,
    /// pandoc run over the extracted tables.
    ConvertTables,
    /// Transplanting the converted tables into the main document.
    MergeTables,
}

impl ConversionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversionStage::Metadata => "metadata",
            ConversionStage::FrontMatter => "front matter",
            ConversionStage::InternalLinks => "internal links",
            ConversionStage::TableExtraction => "table extraction",
            ConversionStage::ConvertDocument => "pandoc (markdown)",
            ConversionStage::ConvertTables => "pandoc (tables)",
            ConversionStage::MergeTables => "table merge",
        }
    }
}

impl fmt::Display for ConversionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Called by the conversion pipeline as it processes each document.
///
/// Implementations must be `Send + Sync` (batch conversion runs documents
/// concurrently). All methods have default no-op implementations so callers
/// only override what they care about.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before the first stage of a document.
    fn on_conversion_start(&self, source: &str) {
        let _ = source;
    }

    /// Called as each enabled stage begins. Disabled stages are skipped.
    fn on_stage(&self, source: &str, stage: ConversionStage) {
        let _ = (source, stage);
    }

    /// Called for each non-fatal merge warning, in the order recorded.
    fn on_warning(&self, source: &str, warning: &MergeWarning) {
        let _ = (source, warning);
    }

    /// Called when a document has been converted.
    fn on_conversion_complete(&self, source: &str, stats: &ConversionStats) {
        let _ = (source, stats);
    }

    /// Called when a document fails with a fatal error.
    fn on_conversion_error(&self, source: &str, error: &str) {
        let _ = (source, error);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
