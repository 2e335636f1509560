//! YAML metadata block prepended to the Markdown handed to pandoc.
//!
//! pandoc reads a leading `---` … `---` YAML block as document metadata and
//! maps the keys onto template variables (`title`, `author`, `abstract`,
//! `toc-title`, …). Only fields that carry a value are written, so an empty
//! configuration yields a bare `---\n---\n`.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Date format written for [`MetadataDate::Date`] and
/// [`MetadataDate::DateTime`] values.
pub const DATE_FORMAT: &str = "%Y%m%d";

/// Document authors: a single name, a comma-separated list of names, or an
/// explicit list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Authors {
    One(String),
    Many(Vec<String>),
}

impl Authors {
    /// Trimmed, non-empty author names in order. A single string is split on
    /// commas.
    pub fn names(&self) -> Vec<&str> {
        let raw: Vec<&str> = match self {
            Authors::One(s) => s.split(',').collect(),
            Authors::Many(v) => v.iter().map(String::as_str).collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }
}

impl From<&str> for Authors {
    fn from(s: &str) -> Self {
        Authors::One(s.to_string())
    }
}

impl From<Vec<String>> for Authors {
    fn from(v: Vec<String>) -> Self {
        Authors::Many(v)
    }
}

/// Document date: free text passed through unchanged, or a calendar value
/// formatted with [`DATE_FORMAT`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataDate {
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl MetadataDate {
    /// The value written into the metadata block, `None` for blank text.
    pub fn render(&self) -> Option<String> {
        match self {
            MetadataDate::Text(s) => non_blank(Some(s)).map(str::to_string),
            MetadataDate::Date(d) => Some(d.format(DATE_FORMAT).to_string()),
            MetadataDate::DateTime(dt) => Some(dt.format(DATE_FORMAT).to_string()),
        }
    }
}

impl From<&str> for MetadataDate {
    fn from(s: &str) -> Self {
        MetadataDate::Text(s.to_string())
    }
}

impl From<String> for MetadataDate {
    fn from(s: String) -> Self {
        MetadataDate::Text(s)
    }
}

impl From<NaiveDate> for MetadataDate {
    fn from(d: NaiveDate) -> Self {
        MetadataDate::Date(d)
    }
}

impl From<NaiveDateTime> for MetadataDate {
    fn from(dt: NaiveDateTime) -> Self {
        MetadataDate::DateTime(dt)
    }
}

/// Metadata fields injected into the document. Also the `metadata` section
/// of the JSON configuration, whose keys are dash-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<Authors>,
    pub date: Option<MetadataDate>,
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    pub abstract_title: Option<String>,
    pub toc_title: Option<String>,
}

/// Author value as written: a plain scalar for one name, a sequence for more.
#[derive(Serialize)]
#[serde(untagged)]
enum AuthorField<'a> {
    One(&'a str),
    Many(Vec<&'a str>),
}

/// Key order and names of the emitted YAML.
#[derive(Serialize)]
struct MetadataFields<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    author: Option<AuthorField<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(rename = "abstract", skip_serializing_if = "Option::is_none")]
    abstract_text: Option<&'a str>,
    #[serde(rename = "abstract-title", skip_serializing_if = "Option::is_none")]
    abstract_title: Option<&'a str>,
    #[serde(rename = "toc-title", skip_serializing_if = "Option::is_none")]
    toc_title: Option<&'a str>,
}

impl MetadataFields<'_> {
    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.author.is_none()
            && self.date.is_none()
            && self.abstract_text.is_none()
            && self.abstract_title.is_none()
            && self.toc_title.is_none()
    }
}

fn non_blank(s: Option<&String>) -> Option<&str> {
    s.map(String::as_str).filter(|s| !s.trim().is_empty())
}

impl DocumentMetadata {
    fn fields(&self) -> MetadataFields<'_> {
        let author = self.author.as_ref().and_then(|a| {
            let mut names = a.names();
            match names.len() {
                0 => None,
                1 => names.pop().map(AuthorField::One),
                _ => Some(AuthorField::Many(names)),
            }
        });
        MetadataFields {
            title: non_blank(self.title.as_ref()),
            author,
            date: self.date.as_ref().and_then(MetadataDate::render),
            abstract_text: non_blank(self.abstract_text.as_ref()),
            abstract_title: non_blank(self.abstract_title.as_ref()),
            toc_title: non_blank(self.toc_title.as_ref()),
        }
    }

    /// Whether no field would be written.
    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Render the `---\n<yaml>---\n` block.
    pub fn generate_metadata_block(&self) -> Result<String, serde_yaml::Error> {
        generate_metadata_block(self)
    }
}

/// Render `metadata` as a pandoc YAML metadata block.
///
/// Blank strings count as absent. With nothing to write the block is just the
/// two delimiter lines.
pub fn generate_metadata_block(metadata: &DocumentMetadata) -> Result<String, serde_yaml::Error> {
    let fields = metadata.fields();
    if fields.is_empty() {
        return Ok("---\n---\n".to_string());
    }
    let yaml = serde_yaml::to_string(&fields)?;
    Ok(format!("---\n{yaml}---\n"))
}
