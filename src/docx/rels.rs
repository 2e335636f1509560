//! Relationship parts (`*.rels`): id → target tables scoped to one part.

use super::xml::{Element, Node, XmlDocument};
use super::DocxError;

pub const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
pub const HYPERLINK_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";
pub const OFFICE_DOCUMENT_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";

/// One `<Relationship>` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: String,
    pub rel_type: String,
    pub target: String,
    /// `TargetMode="External"`.
    pub external: bool,
}

/// Ordered relationship table of a single part.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Relationships {
    items: Vec<Relationship>,
}

impl Relationships {
    pub fn parse(xml: &str) -> Result<Self, DocxError> {
        let doc = XmlDocument::parse(xml)?;
        let items = doc
            .root
            .elements()
            .filter(|e| e.local_name() == "Relationship")
            .filter_map(|e| {
                Some(Relationship {
                    id: e.attr("Id")?.to_string(),
                    rel_type: e.attr("Type").unwrap_or_default().to_string(),
                    target: e.attr("Target").unwrap_or_default().to_string(),
                    external: e.attr("TargetMode") == Some("External"),
                })
            })
            .collect();
        Ok(Self { items })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.items.iter().find(|r| r.id == id)
    }

    pub fn of_type<'a>(&'a self, rel_type: &'a str) -> impl Iterator<Item = &'a Relationship> {
        self.items.iter().filter(move |r| r.rel_type == rel_type)
    }

    /// Return the id of a relationship to `target`, adding one if none with
    /// the same type, target and mode exists yet.
    pub fn relate_to(&mut self, target: &str, rel_type: &str, external: bool) -> String {
        if let Some(existing) = self
            .items
            .iter()
            .find(|r| r.rel_type == rel_type && r.target == target && r.external == external)
        {
            return existing.id.clone();
        }

        let id = self.next_id();
        self.items.push(Relationship {
            id: id.clone(),
            rel_type: rel_type.to_string(),
            target: target.to_string(),
            external,
        });
        id
    }

    /// Lowest `rIdN` (N ≥ 1) not already taken; fills gaps first.
    fn next_id(&self) -> String {
        (1..=self.items.len() + 1)
            .map(|n| format!("rId{n}"))
            .find(|candidate| self.get(candidate).is_none())
            .unwrap_or_else(|| format!("rId{}", self.items.len() + 1))
    }

    pub fn to_xml(&self) -> Result<Vec<u8>, DocxError> {
        let mut root = Element::new("Relationships").with_attr("xmlns", RELATIONSHIPS_NS);
        for rel in &self.items {
            let mut el = Element::new("Relationship")
                .with_attr("Id", rel.id.as_str())
                .with_attr("Type", rel.rel_type.as_str())
                .with_attr("Target", rel.target.as_str());
            if rel.external {
                el.set_attr("TargetMode", "External");
            }
            root.push(Node::Element(el));
        }
        Ok(XmlDocument::with_root(root).to_bytes()?)
    }
}
