//! Shared helpers for integration tests: a converter that stands in for
//! pandoc and builds real (tiny) DOCX packages.

#![allow(dead_code)]

use md2docx::docx::WordDocument;
use md2docx::{DocumentConverter, Md2DocxError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::sync::Mutex;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());
static HREF_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"href="([^"]+)""#).unwrap());

/// One recorded converter invocation.
#[derive(Debug, Clone)]
pub struct Call {
    pub options: Vec<String>,
    pub input: String,
}

impl Call {
    pub fn from_format(&self) -> Option<&str> {
        self.options
            .iter()
            .find_map(|o| o.strip_prefix("--from="))
    }
}

/// Pandoc stand-in.
///
/// Markdown input becomes one paragraph per blank-line separated block. HTML
/// input does the same, except `<table>` blocks become one-cell tables whose
/// text is the tag-stripped markup; an `href` in the table becomes an
/// external hyperlink relationship referenced from the cell.
#[derive(Default)]
pub struct MockConverter {
    pub calls: Mutex<Vec<Call>>,
    /// Fail the run whose `--from=` matches.
    pub fail_on: Option<&'static str>,
    pub bundled: Option<PathBuf>,
}

impl MockConverter {
    pub fn failing_on(format: &'static str) -> Self {
        Self {
            fail_on: Some(format),
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }
}

impl DocumentConverter for MockConverter {
    fn convert(&self, options: &[String], input: &[u8]) -> Result<Vec<u8>, Md2DocxError> {
        let call = Call {
            options: options.to_vec(),
            input: String::from_utf8(input.to_vec()).unwrap(),
        };
        let from = call.from_format().unwrap_or_default().to_string();
        self.calls.lock().unwrap().push(call.clone());

        if self.fail_on == Some(from.as_str()) {
            return Err(Md2DocxError::ConversionFailed {
                from,
                status: "exit status: 64".into(),
                stderr: "mock failure".into(),
            });
        }

        let mut body = String::new();
        let mut rels = Vec::new();
        for block in call.input.split("\n\n").map(str::trim).filter(|b| !b.is_empty()) {
            if from == "html" && block.starts_with("<table") {
                let text = TAG_RE.replace_all(block, " ");
                let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
                match HREF_RE.captures(block) {
                    Some(c) => {
                        let id = format!("rId{}", 10 + rels.len());
                        body.push_str(&linked_table(&text, &id));
                        rels.push((id, c[1].to_string()));
                    }
                    None => body.push_str(&plain_table(&text)),
                }
            } else {
                body.push_str(&paragraph(block));
            }
        }
        Ok(docx(&body, &rels))
    }

    fn bundled_reference_doc(&self) -> Result<Option<PathBuf>, Md2DocxError> {
        Ok(self.bundled.clone())
    }
}

// ── DOCX builders ────────────────────────────────────────────────────────

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

pub fn paragraph(text: &str) -> String {
    format!(
        r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
        escape(text)
    )
}

pub fn plain_table(text: &str) -> String {
    format!(
        r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#,
        escape(text)
    )
}

pub fn linked_table(text: &str, rel_id: &str) -> String {
    format!(
        r#"<w:tbl><w:tr><w:tc><w:p><w:hyperlink r:id="{rel_id}"><w:r><w:t>{}</w:t></w:r></w:hyperlink></w:p><w:p><w:pPr><w:numPr><w:ilvl w:val="1"/><w:numId w:val="5"/></w:numPr></w:pPr><w:r><w:t>item</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#,
        escape(text)
    )
}

/// Minimal package: content types, package rels, main part, document rels.
pub fn docx(body_xml: &str, hyperlinks: &[(String, String)]) -> Vec<u8> {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body>{body_xml}<w:sectPr/></w:body></w:document>"#
    );

    let mut rels = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
    );
    for (id, target) in hyperlinks {
        rels.push_str(&format!(
            r#"<Relationship Id="{id}" Type="{}" Target="{}" TargetMode="External"/>"#,
            md2docx::docx::HYPERLINK_REL_TYPE,
            escape(target)
        ));
    }
    rels.push_str("</Relationships>");

    let parts: [(&str, &str); 5] = [
        (
            "[Content_Types].xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#,
        ),
        (
            "_rels/.rels",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#,
        ),
        ("word/document.xml", &document),
        ("word/_rels/document.xml.rels", &rels),
        (
            "word/styles.xml",
            r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"/>"#,
        ),
    ];

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, body) in parts {
        zip.start_file(name, SimpleFileOptions::default()).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

// ── Inspection ───────────────────────────────────────────────────────────

/// Body blocks of a DOCX: `P:<text>` per paragraph, `TBL:<text>` per table.
pub fn body_outline(bytes: &[u8]) -> Vec<String> {
    let doc = WordDocument::from_bytes(bytes).unwrap();
    let body = doc.body().unwrap();
    body.elements()
        .filter_map(|el| {
            if doc.is_w(el, "p") {
                Some(format!("P:{}", doc.paragraph_text(el)))
            } else if doc.is_w(el, "tbl") {
                let mut text = String::new();
                el.visit(&mut |e| {
                    if doc.is_w(e, "p") {
                        if !text.is_empty() {
                            text.push('|');
                        }
                        text.push_str(&doc.paragraph_text(e));
                    }
                });
                Some(format!("TBL:{text}"))
            } else {
                None
            }
        })
        .collect()
}
