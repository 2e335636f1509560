//! Minimal WordprocessingML object model.
//!
//! Only what the table merge needs is modelled: the ordered body nodes of the
//! main document part (paragraphs and tables as owned [`Element`] trees), the
//! part's relationship table, and lossless re-serialisation of the package.
//! Everything else in the archive (styles, numbering, media) is carried
//! through byte-for-byte.
//!
//! ```text
//! DocxPackage (zip) ──▶ word/document.xml ──▶ XmlDocument ──▶ w:body children
//!                   └─▶ word/_rels/document.xml.rels ──▶ Relationships
//! ```

pub mod package;
pub mod rels;
pub mod xml;

#[cfg(test)]
pub(crate) mod fixtures;

pub use package::DocxPackage;
pub use rels::{Relationship, Relationships, HYPERLINK_REL_TYPE};
pub use xml::{Element, Node, XmlDocument, XmlError};

use thiserror::Error;

/// WordprocessingML main namespace.
pub const WORDML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
/// Namespace of `r:id` style relationship references.
pub const REL_REF_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Structural errors while opening or saving a DOCX package.
#[derive(Debug, Error)]
pub enum DocxError {
    #[error("not a readable zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed XML: {0}")]
    Xml(#[from] XmlError),

    #[error("part '{part}' is not UTF-8: {source}")]
    Encoding {
        part: String,
        #[source]
        source: std::str::Utf8Error,
    },

    #[error("missing part '{0}'")]
    MissingPart(String),

    #[error("'{0}' has no body element")]
    MissingBody(String),
}

/// Namespace prefixes in use by one document part.
///
/// pandoc always writes `w:` and `r:`, but the prefixes are resolved from the
/// root's `xmlns:*` declarations so qualified lookups stay correct for any
/// producer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prefixes {
    pub w: String,
    pub r: String,
}

impl Prefixes {
    fn from_root(root: &Element) -> Self {
        let lookup = |ns: &str, fallback: &str| {
            root.attributes
                .iter()
                .find(|(k, v)| k.starts_with("xmlns:") && v == ns)
                .map(|(k, _)| k["xmlns:".len()..].to_string())
                .unwrap_or_else(|| fallback.to_string())
        };
        Self {
            w: lookup(WORDML_NS, "w"),
            r: lookup(REL_REF_NS, "r"),
        }
    }

    /// Qualified WordprocessingML name, e.g. `w("p")` → `w:p`.
    pub fn w(&self, local: &str) -> String {
        format!("{}:{local}", self.w)
    }

    /// Qualified relationship-reference name, e.g. `r("id")` → `r:id`.
    pub fn r(&self, local: &str) -> String {
        format!("{}:{local}", self.r)
    }
}

/// An opened DOCX: package, parsed main part, and its relationships.
#[derive(Debug, Clone)]
pub struct WordDocument {
    package: DocxPackage,
    document_path: String,
    document: XmlDocument,
    relationships: Relationships,
    prefixes: Prefixes,
}

impl WordDocument {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocxError> {
        let package = DocxPackage::from_bytes(bytes)?;
        let document_path = package.main_document_path()?;

        let xml = package
            .part_str(&document_path)?
            .ok_or_else(|| DocxError::MissingPart(document_path.clone()))?;
        let document = XmlDocument::parse(xml)?;
        let prefixes = Prefixes::from_root(&document.root);

        if document.root.child(&prefixes.w("body")).is_none() {
            return Err(DocxError::MissingBody(document_path));
        }

        let relationships = match package.part_str(&package::rels_path_for(&document_path))? {
            Some(xml) => Relationships::parse(xml)?,
            None => Relationships::default(),
        };

        Ok(Self {
            package,
            document_path,
            document,
            relationships,
            prefixes,
        })
    }

    pub fn prefixes(&self) -> &Prefixes {
        &self.prefixes
    }

    /// Root element of the main document part (`w:document`).
    pub fn root(&self) -> &Element {
        &self.document.root
    }

    pub fn body(&self) -> Option<&Element> {
        self.document.root.child(&self.prefixes.w("body"))
    }

    pub fn body_mut(&mut self) -> Option<&mut Element> {
        let name = self.prefixes.w("body");
        self.document.root.child_mut(&name)
    }

    pub fn relationships(&self) -> &Relationships {
        &self.relationships
    }

    /// Register a relationship on the main part, reusing an identical one.
    pub fn relate_to(&mut self, target: &str, rel_type: &str, external: bool) -> String {
        self.relationships.relate_to(target, rel_type, external)
    }

    /// `xmlns:*` declarations on the root element.
    pub fn namespace_declarations(&self) -> impl Iterator<Item = (&str, &str)> {
        self.document
            .root
            .attributes
            .iter()
            .filter(|(k, _)| k.starts_with("xmlns:"))
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Whether `el` is a WordprocessingML element with the given local name.
    pub fn is_w(&self, el: &Element, local: &str) -> bool {
        el.prefix() == Some(self.prefixes.w.as_str()) && el.local_name() == local
    }

    /// Text of a paragraph element: `w:t` content, `w:tab` as `\t`,
    /// `w:br`/`w:cr` as `\n`, in document order.
    pub fn paragraph_text(&self, paragraph: &Element) -> String {
        let mut out = String::new();
        paragraph.visit(&mut |el| {
            if el.prefix() != Some(self.prefixes.w.as_str()) {
                return;
            }
            match el.local_name() {
                "t" => {
                    for child in &el.children {
                        if let Node::Text(t) | Node::CData(t) = child {
                            out.push_str(t);
                        }
                    }
                }
                "tab" => out.push('\t'),
                "br" | "cr" => out.push('\n'),
                _ => {}
            }
        });
        out
    }

    /// Serialise the document and its relationships back into a DOCX buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocxError> {
        let mut package = self.package.clone();
        package.set_part(&self.document_path, self.document.to_bytes()?);
        if !self.relationships.is_empty()
            || package
                .part(&package::rels_path_for(&self.document_path))
                .is_some()
        {
            package.set_part(
                &package::rels_path_for(&self.document_path),
                self.relationships.to_xml()?,
            );
        }
        package.to_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{docx, hyperlink_rel, paragraph};
    use super::*;

    #[test]
    fn opens_body_and_relationships() {
        let bytes = docx(
            &format!("{}{}", paragraph("Hello"), paragraph("World")),
            &[hyperlink_rel("rId5", "https://example.com/")],
        );
        let doc = WordDocument::from_bytes(&bytes).unwrap();
        let body = doc.body().unwrap();
        let texts: Vec<String> = body
            .elements()
            .filter(|e| doc.is_w(e, "p"))
            .map(|p| doc.paragraph_text(p))
            .collect();
        assert_eq!(texts, vec!["Hello", "World"]);
        assert_eq!(doc.relationships().len(), 1);
        assert_eq!(doc.prefixes().w("tbl"), "w:tbl");
    }

    #[test]
    fn paragraph_text_joins_runs_tabs_and_breaks() {
        let body = r#"<w:p><w:r><w:t>a</w:t><w:tab/><w:t xml:space="preserve">b </w:t></w:r><w:hyperlink r:id="rId1"><w:r><w:t>link</w:t></w:r></w:hyperlink><w:r><w:br/><w:t>c</w:t></w:r></w:p>"#;
        let doc = WordDocument::from_bytes(&docx(body, &[])).unwrap();
        let p = doc.body().unwrap().elements().next().unwrap();
        assert_eq!(doc.paragraph_text(p), "a\tb link\nc");
    }

    #[test]
    fn round_trip_keeps_body_and_other_parts() {
        let bytes = docx(&paragraph("Keep me"), &[]);
        let doc = WordDocument::from_bytes(&bytes).unwrap();
        let again = WordDocument::from_bytes(&doc.to_bytes().unwrap()).unwrap();
        assert_eq!(again.body(), doc.body());

        let pkg = DocxPackage::from_bytes(&doc.to_bytes().unwrap()).unwrap();
        assert!(pkg.part("word/styles.xml").is_some());
    }

    #[test]
    fn document_without_body_is_rejected() {
        let bytes = fixtures::package_with_document(
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"/>"#,
        );
        assert!(matches!(
            WordDocument::from_bytes(&bytes),
            Err(DocxError::MissingBody(_))
        ));
    }
}
