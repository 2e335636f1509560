//! Pipeline stages for Markdown-to-DOCX conversion.
//!
//! Each submodule implements exactly one transformation step and is
//! independently testable; [`crate::convert`] sequences them.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ metadata ──▶ frontmatter ──▶ links ──▶ tables ──┬─▶ pandoc (markdown) ──┐
//! (path/URL) (YAML block)  (strip)      (rewrite)  (extract) └─▶ pandoc (html) ──────┴─▶ merge
//! ```
//!
//! 1. [`input`]       — read the user-supplied path or URL into bytes
//! 2. [`metadata`]    — render the YAML metadata block
//! 3. [`frontmatter`] — strip `---` delimited blocks from the raw body
//! 4. [`links`]       — point root-relative `.md` links at a published site
//! 5. [`tables`]      — cut block-level HTML tables out, leaving markers
//! 6. [`pandoc`]      — run the converter over the main text and the tables
//! 7. [`merge`]       — swap marker paragraphs for the converted tables

pub mod frontmatter;
pub mod input;
pub mod links;
pub mod merge;
pub mod metadata;
pub mod pandoc;
pub mod tables;
