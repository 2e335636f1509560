//! In-memory DOCX builders for unit tests.

use super::rels::HYPERLINK_REL_TYPE;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const DOCUMENT_OPEN: &str = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><w:body>"#;
const DOCUMENT_CLOSE: &str = "<w:sectPr/></w:body></w:document>";

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const PACKAGE_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

/// `(id, type, target, external)`.
pub type RelEntry = (String, String, String, bool);

pub fn hyperlink_rel(id: &str, target: &str) -> RelEntry {
    (id.into(), HYPERLINK_REL_TYPE.into(), target.into(), true)
}

pub fn styles_rel(id: &str) -> RelEntry {
    (
        id.into(),
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles".into(),
        "styles.xml".into(),
        false,
    )
}

pub fn paragraph(text: &str) -> String {
    format!(r#"<w:p><w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#)
}

/// One-cell table whose cell holds a hyperlink and a numbered paragraph.
pub fn linked_table(cell_text: &str, rel_id: &str) -> String {
    format!(
        r#"<w:tbl><w:tr><w:tc><w:p><w:hyperlink r:id="{rel_id}"><w:r><w:t>{cell_text}</w:t></w:r></w:hyperlink></w:p><w:p><w:pPr><w:numPr><w:ilvl w:val="2"/><w:numId w:val="7"/></w:numPr></w:pPr><w:r><w:t>item</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#
    )
}

pub fn plain_table(cell_text: &str) -> String {
    format!(r#"<w:tbl><w:tr><w:tc><w:p><w:r><w:t>{cell_text}</w:t></w:r></w:p></w:tc></w:tr></w:tbl>"#)
}

fn rels_xml(rels: &[RelEntry]) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );
    for (id, ty, target, external) in rels {
        let mode = if *external { r#" TargetMode="External""# } else { "" };
        xml.push_str(&format!(
            r#"<Relationship Id="{id}" Type="{ty}" Target="{target}"{mode}/>"#
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

/// Package with the given raw main-part XML and no document relationships.
pub fn package_with_document(document_xml: &str) -> Vec<u8> {
    build(document_xml, None)
}

/// Package whose body holds `body_xml` followed by `w:sectPr`.
pub fn docx(body_xml: &str, rels: &[RelEntry]) -> Vec<u8> {
    let document = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n{DOCUMENT_OPEN}{body_xml}{DOCUMENT_CLOSE}"
    );
    build(&document, Some(&rels_xml(rels)))
}

fn build(document_xml: &str, document_rels: Option<&str>) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let opts = SimpleFileOptions::default();
    let mut entries: Vec<(&str, &str)> = vec![
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", PACKAGE_RELS),
        ("word/document.xml", document_xml),
        ("word/styles.xml", "<w:styles xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"/>"),
    ];
    if let Some(rels) = document_rels {
        entries.push(("word/_rels/document.xml.rels", rels));
    }
    for (name, body) in entries {
        zip.start_file(name, opts).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}
