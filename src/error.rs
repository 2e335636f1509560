//! Error types for the md2docx library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Md2DocxError`] — **Fatal**: the conversion cannot produce a document
//!   (missing input, pandoc failure, malformed DOCX from either pass).
//!   Returned as `Err(Md2DocxError)` from every top-level function; no
//!   partial output is ever returned alongside it.
//!
//! * [`MergeWarning`] — **Non-fatal**: a correlation miss during the table
//!   merge (a marker paragraph with no matching table, a hyperlink id missing
//!   from the relationship map). The merged document is still produced; the
//!   affected marker or reference is left as-is and the warning is stored in
//!   [`crate::output::ConversionOutput::warnings`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the md2docx library.
#[derive(Debug, Error)]
pub enum Md2DocxError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// Markdown input is not valid UTF-8.
    #[error("Input is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    // ── Converter errors ──────────────────────────────────────────────────
    /// No pandoc executable could be found or downloaded.
    #[error("pandoc is not available: {0}\nInstall pandoc or set PANDOC_PATH=/path/to/pandoc.")]
    PandocUnavailable(String),

    /// The pandoc process could not be started or its pipes failed.
    #[error("Failed to run '{program}': {source}")]
    ConverterSpawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// pandoc exited unsuccessfully. `stderr` is passed through verbatim.
    #[error("Conversion from {from} failed ({status}):\n{stderr}")]
    ConversionFailed {
        from: String,
        status: String,
        stderr: String,
    },

    // ── Document errors ───────────────────────────────────────────────────
    /// A DOCX buffer could not be opened or a required part is malformed.
    #[error("Invalid DOCX ({context}): {detail}")]
    InvalidDocx { context: String, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output DOCX file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Configuration could not be parsed or failed validation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Md2DocxError {
    /// Shorthand for building [`Md2DocxError::InvalidDocx`].
    pub(crate) fn docx(context: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        Md2DocxError::InvalidDocx {
            context: context.into(),
            detail: detail.to_string(),
        }
    }
}

/// A non-fatal correlation miss recorded while merging the table document.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum MergeWarning {
    /// A main-document paragraph carries the marker prefix but no extracted
    /// table was keyed by its exact text; the marker text stays in the output.
    #[error("No table found for marker paragraph '{text}'; left in place")]
    UnmatchedMarker { text: String },

    /// A hyperlink inside a transplanted table references a relationship that
    /// was not migrated; the reference is left unchanged.
    #[error("Hyperlink relationship '{id}' under heading '{heading}' has no mapping; left unchanged")]
    UnmappedRelationship { id: String, heading: String },

    /// Two tables in the side document share a heading; the later one wins.
    #[error("Heading '{heading}' labels more than one table; the later table wins")]
    HeadingOverwritten { heading: String },
}
