//! Result types returned by the conversion entry points.

use crate::error::MergeWarning;
use serde::{Deserialize, Serialize};

/// A converted document plus everything worth reporting about the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Final DOCX bytes.
    #[serde(skip)]
    pub docx: Vec<u8>,

    /// Non-fatal correlation misses from the table merge, in the order they
    /// were found. Empty when tables were not extracted.
    pub warnings: Vec<MergeWarning>,

    pub stats: ConversionStats,
}

/// Sizes, counts and timings of one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Raw input size in bytes.
    pub input_bytes: usize,
    /// Size of the Markdown handed to pandoc (metadata block included).
    pub markdown_bytes: usize,
    /// Tables cut out of the Markdown.
    pub tables_extracted: usize,
    /// Marker paragraphs replaced by a table.
    pub tables_merged: usize,
    /// Final DOCX size in bytes.
    pub output_bytes: usize,
    /// Wall-clock time spent in pandoc (both runs).
    pub pandoc_duration_ms: u64,
    /// Wall-clock time spent merging.
    pub merge_duration_ms: u64,
    pub total_duration_ms: u64,
}

impl ConversionOutput {
    /// Whether every extracted table made it into the document.
    pub fn all_tables_merged(&self) -> bool {
        self.stats.tables_merged == self.stats.tables_extracted
    }
}

/// Outcome of one input in [`crate::convert::convert_batch`].
#[derive(Debug)]
pub struct BatchItem {
    /// The input exactly as given.
    pub source: String,
    pub result: Result<ConversionOutput, crate::error::Md2DocxError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_skips_docx_bytes() {
        let out = ConversionOutput {
            docx: vec![0x50, 0x4b, 0x03, 0x04],
            warnings: vec![MergeWarning::HeadingOverwritten {
                heading: "Intro".into(),
            }],
            stats: ConversionStats {
                tables_extracted: 2,
                tables_merged: 1,
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&out).unwrap();
        assert!(json.get("docx").is_none());
        assert_eq!(json["stats"]["tables_extracted"], 2);
        assert_eq!(json["warnings"].as_array().unwrap().len(), 1);
        assert!(!out.all_tables_merged());
    }
}
