//! HTML table extraction.
//!
//! pandoc's Markdown reader handles raw `<table>` blocks poorly (links and
//! lists inside cells are flattened), while its HTML reader converts them
//! faithfully. So each block-level table is cut out of the Markdown, replaced
//! by a unique marker line, and collected into a side document that is
//! converted separately with `--from=html`. [`crate::pipeline::merge`] later
//! swaps each marker paragraph for the converted table.
//!
//! ```text
//! "Intro\n  <table>…</table>\n"  ──▶  content: "Intro\n  MD2DOCX_REPLACE_TABLE_0\n"
//!                                  side:    "MD2DOCX_REPLACE_TABLE_0\n\n<table>…</table>\n\n"
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

/// Prefix shared by every marker; the merger searches paragraphs for it.
pub const MARKER_PREFIX: &str = "MD2DOCX_REPLACE_TABLE";

/// A table opening tag (attributes allowed) through the first closing tag,
/// preceded by a line break and optional whitespace. Group 1 is the
/// whitespace, group 2 the table markup.
static TABLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\n(\s*?)(<table(?:\s[^>]*)?>.*?</table>)").unwrap()
});

/// Marker text for the table at `index` (0-based, scan order).
pub fn marker_for(index: usize) -> String {
    format!("{MARKER_PREFIX}_{index}")
}

/// One table cut out of the Markdown body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedTable {
    pub marker: String,
    /// Whitespace between the preceding line break and the table.
    pub indent: String,
    /// Raw `<table>…</table>` markup.
    pub markup: String,
}

/// Result of [`extract_html_tables`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableExtraction {
    /// Input with every table replaced by its marker.
    pub content: String,
    /// Tables in document order.
    pub tables: Vec<ExtractedTable>,
}

impl TableExtraction {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Side document fed to the HTML conversion pass: each marker, a blank
    /// line, the table, a blank line.
    pub fn side_document(&self) -> String {
        self.tables
            .iter()
            .map(|t| format!("{}\n\n{}\n\n", t.marker, t.markup))
            .collect()
    }

    /// Put every table back where its marker sits. Inverse of
    /// [`extract_html_tables`].
    pub fn restore(&self) -> String {
        let mut out = self.content.clone();
        let mut cursor = 0;
        for table in &self.tables {
            let needle = format!("\n{}{}", table.indent, table.marker);
            let Some(found) = out[cursor..].find(&needle) else {
                continue;
            };
            let start = cursor + found + 1 + table.indent.len();
            out.replace_range(start..start + table.marker.len(), &table.markup);
            cursor = start + table.markup.len();
        }
        out
    }
}

/// Replace every block-level HTML table in `text` with a numbered marker.
///
/// A table counts as block-level when a line break and optional whitespace
/// precede its opening tag; inline tables (`Content <table>…`) stay in place.
/// Markers are numbered from 0 in scan order, and every byte outside the
/// matched tables is left as-is.
pub fn extract_html_tables(text: &str) -> TableExtraction {
    let mut tables = Vec::new();
    let content = TABLE_RE
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let marker = marker_for(tables.len());
            let indent = caps[1].to_string();
            let replacement = format!("\n{indent}{marker}");
            tables.push(ExtractedTable {
                marker,
                indent,
                markup: caps[2].to_string(),
            });
            replacement
        })
        .into_owned();

    TableExtraction { content, tables }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_become_numbered_markers() {
        let text = "Table1\n<table><thead>Test1</thead></table>\n\nTable2\n<table><thead>Test2</thead></table>\n\n";
        let ex = extract_html_tables(text);
        assert_eq!(
            ex.content,
            "Table1\nMD2DOCX_REPLACE_TABLE_0\n\nTable2\nMD2DOCX_REPLACE_TABLE_1\n\n"
        );
        assert_eq!(
            ex.side_document(),
            "MD2DOCX_REPLACE_TABLE_0\n\n<table><thead>Test1</thead></table>\n\n\
             MD2DOCX_REPLACE_TABLE_1\n\n<table><thead>Test2</thead></table>\n\n"
        );
    }

    #[test]
    fn indentation_is_kept_in_content_not_in_side_document() {
        let text = "Table1\n    <table><thead>Test1</thead>    </table>\n\nTable2\n  <table><thead>Test2</thead></table>\n\n";
        let ex = extract_html_tables(text);
        assert_eq!(
            ex.content,
            "Table1\n    MD2DOCX_REPLACE_TABLE_0\n\nTable2\n  MD2DOCX_REPLACE_TABLE_1\n\n"
        );
        assert_eq!(ex.tables[0].indent, "    ");
        assert_eq!(ex.tables[0].markup, "<table><thead>Test1</thead>    </table>");
        assert!(ex.side_document().starts_with(
            "MD2DOCX_REPLACE_TABLE_0\n\n<table><thead>Test1</thead>    </table>\n\n"
        ));
    }

    #[test]
    fn inline_table_is_not_extracted() {
        let text = "Content <table> </table>";
        let ex = extract_html_tables(text);
        assert_eq!(ex.content, text);
        assert!(ex.is_empty());
        assert_eq!(ex.side_document(), "");
    }

    #[test]
    fn multiline_table_with_attributes() {
        let text = "# Heading\n\n<table class=\"wide\">\n<tr><td><a href=\"https://a.test\">a</a></td></tr>\n</table>\nafter";
        let ex = extract_html_tables(text);
        assert_eq!(ex.tables.len(), 1);
        assert!(ex.tables[0].markup.starts_with("<table class=\"wide\">"));
        assert!(ex.tables[0].markup.ends_with("</table>"));
        assert_eq!(ex.content, "# Heading\n\nMD2DOCX_REPLACE_TABLE_0\nafter");
    }

    #[test]
    fn lookalike_tags_are_ignored() {
        let text = "x\n<tablet>no</tablet>\n";
        assert!(extract_html_tables(text).is_empty());
    }

    #[test]
    fn identical_tables_get_distinct_markers() {
        let text = "a\n<table>same</table>\nb\n<table>same</table>\n";
        let ex = extract_html_tables(text);
        let markers: Vec<_> = ex.tables.iter().map(|t| t.marker.as_str()).collect();
        assert_eq!(markers, vec!["MD2DOCX_REPLACE_TABLE_0", "MD2DOCX_REPLACE_TABLE_1"]);
        assert_eq!(ex.content, "a\nMD2DOCX_REPLACE_TABLE_0\nb\nMD2DOCX_REPLACE_TABLE_1\n");
    }

    #[test]
    fn restore_reproduces_input() {
        let mut text = String::from("start\n");
        for i in 0..12 {
            text.push_str(&format!("para {i}\n  <table><tr><td>{i}</td></tr></table>\n"));
        }
        let ex = extract_html_tables(&text);
        assert_eq!(ex.tables.len(), 12);
        assert_eq!(ex.tables[11].marker, "MD2DOCX_REPLACE_TABLE_11");
        assert_eq!(ex.restore(), text);
    }

    #[test]
    fn no_tables_means_unchanged_content() {
        let text = "# Title\n\nJust prose.\n";
        let ex = extract_html_tables(text);
        assert_eq!(ex.content, text);
        assert_eq!(ex.restore(), text);
    }
}
