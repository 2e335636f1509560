//! Configuration types for Markdown-to-DOCX conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`] or loaded from a JSON file. The JSON
//! layout has three sections:
//!
//! ```json
//! {
//!   "metadata": { "title": "Guide", "author": "Docs Team", "toc-title": "Contents" },
//!   "plugin":   { "remove_front_matter": true,
//!                 "replace_internal_links": "https://docs.example.com/v1",
//!                 "extract_html_table": true },
//!   "pandoc":   { "reference-doc": "bundled", "toc": true, "toc-depth": 2 }
//! }
//! ```
//!
//! `metadata` and `pandoc` keys are dash-cased, `plugin` keys snake-cased.
//! Every section and every key is optional.

use crate::error::Md2DocxError;
use crate::pipeline::metadata::{Authors, DocumentMetadata, MetadataDate};
use crate::progress::ProgressCallback;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::path::{Path, PathBuf};

/// Greatest heading level pandoc accepts for `--toc-depth`.
pub const MAX_TOC_DEPTH: u32 = 6;

// ── Plugin switches ──────────────────────────────────────────────────────

/// Markdown preprocessing switches. All off by default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Strip every `---\n … ---\n` block from the body before conversion.
    pub remove_front_matter: bool,

    /// Base URL for root-relative `.md` links; `false` (or absent) disables
    /// rewriting.
    #[serde(
        deserialize_with = "deserialize_link_base",
        serialize_with = "serialize_link_base"
    )]
    pub replace_internal_links: Option<String>,

    /// Convert block-level HTML tables through pandoc's HTML reader and merge
    /// them back into the document.
    pub extract_html_table: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LinkBaseValue {
    Flag(bool),
    Base(String),
}

fn deserialize_link_base<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<LinkBaseValue>::deserialize(deserializer)? {
        None | Some(LinkBaseValue::Flag(false)) => Ok(None),
        Some(LinkBaseValue::Flag(true)) => Err(serde::de::Error::custom(
            "replace_internal_links must be false or a base URL string",
        )),
        Some(LinkBaseValue::Base(base)) => Ok(Some(base)),
    }
}

fn serialize_link_base<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(base) => serializer.serialize_str(base),
        None => serializer.serialize_bool(false),
    }
}

// ── pandoc options ───────────────────────────────────────────────────────

/// Which reference document pandoc copies styles from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ReferenceDoc {
    /// pandoc's own default `reference.docx`, materialised in the pandoc cache
    /// and passed explicitly. JSON: `"bundled"`. (default)
    #[default]
    Bundled,
    /// A caller-supplied DOCX. JSON: any other string.
    Path(PathBuf),
    /// Pass no `--reference-doc` at all. JSON: `null`.
    None,
}

impl Serialize for ReferenceDoc {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ReferenceDoc::Bundled => serializer.serialize_str("bundled"),
            ReferenceDoc::Path(p) => serializer.serialize_str(&p.to_string_lossy()),
            ReferenceDoc::None => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for ReferenceDoc {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<String>::deserialize(deserializer)? {
            None => ReferenceDoc::None,
            Some(s) if s == "bundled" => ReferenceDoc::Bundled,
            Some(s) => ReferenceDoc::Path(PathBuf::from(s)),
        })
    }
}

/// Options forwarded to both pandoc runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PandocConfig {
    pub reference_doc: ReferenceDoc,
    /// `--resource-path`, searched for images and other linked files.
    pub resource_path: Option<String>,
    /// `--toc=true|false`; omitted when `None`.
    pub toc: Option<bool>,
    /// `--toc-depth`, 1 to [`MAX_TOC_DEPTH`].
    pub toc_depth: Option<u32>,
    /// Title of the generated table of contents.
    pub toc_title: Option<String>,
}

// ── JSON file layout ─────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    metadata: DocumentMetadata,
    plugin: PluginConfig,
    pandoc: PandocConfig,
}

// ── ConversionConfig ─────────────────────────────────────────────────────

/// Configuration for a Markdown-to-DOCX conversion.
///
/// Built via [`ConversionConfig::builder()`], loaded with
/// [`ConversionConfig::from_json_file`], or [`ConversionConfig::default()`]
/// (pandoc alone, no preprocessing).
///
/// # Example
/// ```rust
/// use md2docx::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .title("Release Notes")
///     .author("Docs Team")
///     .extract_html_table(true)
///     .replace_internal_links("https://docs.example.com/v1")
///     .toc(true)
///     .build()
///     .unwrap();
/// assert!(config.plugin.extract_html_table);
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Fields written into the YAML metadata block.
    pub metadata: DocumentMetadata,

    /// Markdown preprocessing switches.
    pub plugin: PluginConfig,

    /// Options forwarded to pandoc.
    pub pandoc: PandocConfig,

    /// Explicit pandoc executable. When `None`, `pandoc-auto` locates or
    /// downloads one.
    pub pandoc_path: Option<PathBuf>,

    /// Documents converted at once by [`crate::convert::convert_batch`].
    /// Default: 4.
    ///
    /// Each conversion spawns up to two pandoc processes, so this is roughly
    /// half the number of concurrent child processes.
    pub concurrency: usize,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Optional observer for conversion stages and merge warnings.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            metadata: DocumentMetadata::default(),
            plugin: PluginConfig::default(),
            pandoc: PandocConfig::default(),
            pandoc_path: None,
            concurrency: 4,
            download_timeout_secs: 120,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("metadata", &self.metadata)
            .field("plugin", &self.plugin)
            .field("pandoc", &self.pandoc)
            .field("pandoc_path", &self.pandoc_path)
            .field("concurrency", &self.concurrency)
            .field("download_timeout_secs", &self.download_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Parse the JSON layout described in the module docs and validate it.
    pub fn from_json_str(json: &str) -> Result<Self, Md2DocxError> {
        let file: ConfigFile = serde_json::from_str(json)
            .map_err(|e| Md2DocxError::InvalidConfig(e.to_string()))?;
        Self::builder()
            .metadata(file.metadata)
            .plugin(file.plugin)
            .pandoc(file.pandoc)
            .build()
    }

    /// Load a JSON configuration file.
    ///
    /// A relative `reference-doc` path is resolved against the file's
    /// directory so configs can ship next to their reference documents.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, Md2DocxError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            Md2DocxError::InvalidConfig(format!("cannot read '{}': {e}", path.display()))
        })?;
        let mut config = Self::from_json_str(&json)?;

        if let ReferenceDoc::Path(ref mut doc) = config.pandoc.reference_doc {
            if doc.is_relative() {
                if let Some(dir) = path.parent() {
                    *doc = dir.join(&*doc);
                }
            }
        }
        Ok(config)
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn metadata(mut self, metadata: DocumentMetadata) -> Self {
        self.config.metadata = metadata;
        self
    }

    pub fn plugin(mut self, plugin: PluginConfig) -> Self {
        self.config.plugin = plugin;
        self
    }

    pub fn pandoc(mut self, pandoc: PandocConfig) -> Self {
        self.config.pandoc = pandoc;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.config.metadata.title = Some(title.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.config.metadata.author = Some(Authors::One(author.into()));
        self
    }

    pub fn authors(mut self, authors: Vec<String>) -> Self {
        self.config.metadata.author = Some(Authors::Many(authors));
        self
    }

    pub fn date(mut self, date: impl Into<MetadataDate>) -> Self {
        self.config.metadata.date = Some(date.into());
        self
    }

    pub fn abstract_text(mut self, text: impl Into<String>) -> Self {
        self.config.metadata.abstract_text = Some(text.into());
        self
    }

    pub fn abstract_title(mut self, title: impl Into<String>) -> Self {
        self.config.metadata.abstract_title = Some(title.into());
        self
    }

    /// Table-of-contents title, both as a metadata field and as a pandoc
    /// option.
    pub fn toc_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        self.config.metadata.toc_title = Some(title.clone());
        self.config.pandoc.toc_title = Some(title);
        self
    }

    pub fn remove_front_matter(mut self, v: bool) -> Self {
        self.config.plugin.remove_front_matter = v;
        self
    }

    pub fn replace_internal_links(mut self, base_url: impl Into<String>) -> Self {
        self.config.plugin.replace_internal_links = Some(base_url.into());
        self
    }

    pub fn extract_html_table(mut self, v: bool) -> Self {
        self.config.plugin.extract_html_table = v;
        self
    }

    pub fn reference_doc(mut self, doc: ReferenceDoc) -> Self {
        self.config.pandoc.reference_doc = doc;
        self
    }

    pub fn resource_path(mut self, path: impl Into<String>) -> Self {
        self.config.pandoc.resource_path = Some(path.into());
        self
    }

    pub fn toc(mut self, v: bool) -> Self {
        self.config.pandoc.toc = Some(v);
        self
    }

    pub fn toc_depth(mut self, depth: u32) -> Self {
        self.config.pandoc.toc_depth = Some(depth);
        self
    }

    pub fn pandoc_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pandoc_path = Some(path.into());
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Md2DocxError> {
        let c = &self.config;
        if c.concurrency == 0 {
            return Err(Md2DocxError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if let Some(depth) = c.pandoc.toc_depth {
            if !(1..=MAX_TOC_DEPTH).contains(&depth) {
                return Err(Md2DocxError::InvalidConfig(format!(
                    "toc-depth must be 1–{MAX_TOC_DEPTH}, got {depth}"
                )));
            }
        }
        if let Some(ref base) = c.plugin.replace_internal_links {
            if base.trim().is_empty() {
                return Err(Md2DocxError::InvalidConfig(
                    "replace_internal_links base URL is empty".into(),
                ));
            }
        }
        if let ReferenceDoc::Path(ref p) = c.pandoc.reference_doc {
            if p.as_os_str().is_empty() {
                return Err(Md2DocxError::InvalidConfig(
                    "reference-doc path is empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let c = ConversionConfig::default();
        assert_eq!(c.pandoc.reference_doc, ReferenceDoc::Bundled);
        assert!(!c.plugin.remove_front_matter);
        assert!(c.plugin.replace_internal_links.is_none());
        assert!(!c.plugin.extract_html_table);
        assert_eq!(c.concurrency, 4);
        assert!(c.metadata.is_empty());
    }

    #[test]
    fn json_layout_round_trips_into_sections() {
        let c = ConversionConfig::from_json_str(
            r#"{
                "metadata": {"title": "Guide", "author": ["A", "B"], "abstract-title": "Summary", "toc-title": "Contents"},
                "plugin": {"remove_front_matter": true, "replace_internal_links": "https://d.test/v1/", "extract_html_table": true},
                "pandoc": {"reference-doc": "custom.docx", "resource-path": "assets", "toc": true, "toc-depth": 2, "toc-title": "TOC"}
            }"#,
        )
        .unwrap();
        assert_eq!(c.metadata.title.as_deref(), Some("Guide"));
        assert_eq!(c.metadata.abstract_title.as_deref(), Some("Summary"));
        assert!(c.plugin.remove_front_matter);
        assert_eq!(
            c.plugin.replace_internal_links.as_deref(),
            Some("https://d.test/v1/")
        );
        assert_eq!(
            c.pandoc.reference_doc,
            ReferenceDoc::Path(PathBuf::from("custom.docx"))
        );
        assert_eq!(c.pandoc.resource_path.as_deref(), Some("assets"));
        assert_eq!(c.pandoc.toc, Some(true));
        assert_eq!(c.pandoc.toc_depth, Some(2));
        assert_eq!(c.pandoc.toc_title.as_deref(), Some("TOC"));
    }

    #[test]
    fn link_rewriting_accepts_false_or_string() {
        let off: PluginConfig =
            serde_json::from_str(r#"{"replace_internal_links": false}"#).unwrap();
        assert!(off.replace_internal_links.is_none());

        let on: PluginConfig =
            serde_json::from_str(r#"{"replace_internal_links": "https://x.test"}"#).unwrap();
        assert_eq!(on.replace_internal_links.as_deref(), Some("https://x.test"));

        assert!(serde_json::from_str::<PluginConfig>(r#"{"replace_internal_links": true}"#).is_err());
        assert_eq!(
            serde_json::to_value(&off).unwrap()["replace_internal_links"],
            serde_json::Value::Bool(false)
        );
    }

    #[test]
    fn reference_doc_variants() {
        let parse = |json: &str| serde_json::from_str::<PandocConfig>(json).unwrap().reference_doc;
        assert_eq!(parse("{}"), ReferenceDoc::Bundled);
        assert_eq!(parse(r#"{"reference-doc": "bundled"}"#), ReferenceDoc::Bundled);
        assert_eq!(parse(r#"{"reference-doc": null}"#), ReferenceDoc::None);
        assert_eq!(
            parse(r#"{"reference-doc": "a/b.docx"}"#),
            ReferenceDoc::Path(PathBuf::from("a/b.docx"))
        );
    }

    #[test]
    fn unknown_section_is_rejected() {
        let err = ConversionConfig::from_json_str(r#"{"plugins": {}}"#).unwrap_err();
        assert!(matches!(err, Md2DocxError::InvalidConfig(_)));
    }

    #[test]
    fn build_validates_toc_depth_and_link_base() {
        assert!(ConversionConfig::builder().toc_depth(0).build().is_err());
        assert!(ConversionConfig::builder().toc_depth(7).build().is_err());
        assert!(ConversionConfig::builder().toc_depth(3).build().is_ok());
        assert!(ConversionConfig::builder()
            .replace_internal_links("  ")
            .build()
            .is_err());
    }

    #[test]
    fn builder_clamps_concurrency() {
        let c = ConversionConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn toc_title_sets_metadata_and_pandoc() {
        let c = ConversionConfig::builder().toc_title("Contents").build().unwrap();
        assert_eq!(c.metadata.toc_title.as_deref(), Some("Contents"));
        assert_eq!(c.pandoc.toc_title.as_deref(), Some("Contents"));
    }

    #[test]
    fn relative_reference_doc_resolves_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"pandoc": {"reference-doc": "ref.docx"}}"#).unwrap();
        let c = ConversionConfig::from_json_file(&path).unwrap();
        assert_eq!(
            c.pandoc.reference_doc,
            ReferenceDoc::Path(dir.path().join("ref.docx"))
        );
    }

    #[test]
    fn missing_config_file_is_invalid_config() {
        let err = ConversionConfig::from_json_file("/nonexistent/md2docx.json").unwrap_err();
        assert!(matches!(err, Md2DocxError::InvalidConfig(_)));
    }
}
