//! Transplants converted tables into the main document.
//!
//! Inputs are two DOCX buffers produced by pandoc: the main document, in
//! which every extracted table left a marker paragraph, and the side document
//! built from [`crate::pipeline::tables::TableExtraction::side_document`],
//! where each marker paragraph is followed by its converted table.
//!
//! ```text
//! side body:  P("MD2DOCX_REPLACE_TABLE_0")  TBL₀  P("…_1")  TBL₁
//!                    │ heading key                 │
//!                    ▼                             ▼
//! main body:  P(intro)  P("MD2DOCX_REPLACE_TABLE_0")  P(text)  P("…_1")
//!                                 ⇣ replaced by TBL₀           ⇣ TBL₁
//! ```
//!
//! Correlation is by exact paragraph text: the key of a table is the
//! stripped text of the nearest non-empty paragraph before it, and a main
//! paragraph is replaced only if its full text equals a key. Anything that
//! fails to correlate stays in place and is reported as a [`MergeWarning`].

use crate::docx::{Element, Node, Prefixes, WordDocument, HYPERLINK_REL_TYPE};
use crate::error::{Md2DocxError, MergeWarning};
use std::collections::HashMap;
use tracing::{debug, warn};

/// `w:numId` given to every numbered paragraph inside a transplanted table.
pub const TRANSPLANT_NUM_ID: &str = "1";

/// `w:ilvl` given to every numbered paragraph inside a transplanted table.
pub const TRANSPLANT_ILVL: &str = "0";

/// Result of [`merge_documents`].
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// The merged DOCX.
    pub document: Vec<u8>,
    /// Correlation misses, in the order they were found.
    pub warnings: Vec<MergeWarning>,
    /// Tables in the side document that had a heading key.
    pub tables_found: usize,
    /// Marker paragraphs replaced by a table.
    pub tables_merged: usize,
}

/// Replace each marker paragraph of `main` with the matching table of `side`.
///
/// Hyperlink relationships of the side document are registered on the main
/// document first, and transplanted tables have their `r:id` references
/// rewritten to the new ids. List numbering inside the tables is collapsed
/// to `numId` [`TRANSPLANT_NUM_ID`] at level [`TRANSPLANT_ILVL`], since the
/// side document's numbering definitions are not carried over.
///
/// # Errors
/// [`Md2DocxError::InvalidDocx`] if either buffer is not a DOCX with a body.
pub fn merge_documents(
    main: &[u8],
    side: &[u8],
    marker_prefix: &str,
) -> Result<MergeOutcome, Md2DocxError> {
    let mut main_doc =
        WordDocument::from_bytes(main).map_err(|e| Md2DocxError::docx("main document", e))?;
    let side_doc =
        WordDocument::from_bytes(side).map_err(|e| Md2DocxError::docx("table document", e))?;
    let mut warnings = Vec::new();

    // ── Step 1: migrate hyperlink relationships ──────────────────────────
    let rel_map = migrate_hyperlinks(&mut main_doc, &side_doc);
    debug!("Migrated {} hyperlink relationships", rel_map.len());

    // ── Step 2: collect tables keyed by their heading ────────────────────
    let foreign_ns = missing_namespaces(&main_doc, &side_doc);
    let tables = collect_tables(&side_doc, &rel_map, &foreign_ns, &mut warnings);
    let tables_found = tables.len();

    // ── Step 3: replace marker paragraphs ────────────────────────────────
    let tables_merged = replace_markers(&mut main_doc, &tables, marker_prefix, &mut warnings)?;

    for w in &warnings {
        warn!("{}", w);
    }

    // ── Step 4: serialise ────────────────────────────────────────────────
    let document = main_doc
        .to_bytes()
        .map_err(|e| Md2DocxError::docx("merged document", e))?;

    Ok(MergeOutcome {
        document,
        warnings,
        tables_found,
        tables_merged,
    })
}

/// Register every hyperlink relationship of `side` on `main`; old id → new id.
fn migrate_hyperlinks(main: &mut WordDocument, side: &WordDocument) -> HashMap<String, String> {
    side.relationships()
        .of_type(HYPERLINK_REL_TYPE)
        .map(|rel| {
            let new_id = main.relate_to(&rel.target, &rel.rel_type, rel.external);
            (rel.id.clone(), new_id)
        })
        .collect()
}

/// Namespace declarations of the side root whose prefix is unbound, or bound
/// differently, on the main root.
fn missing_namespaces(main: &WordDocument, side: &WordDocument) -> Vec<(String, String)> {
    let main_ns: HashMap<&str, &str> = main.namespace_declarations().collect();
    side.namespace_declarations()
        .filter(|(k, v)| main_ns.get(k) != Some(v))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn collect_tables(
    side: &WordDocument,
    rel_map: &HashMap<String, String>,
    foreign_ns: &[(String, String)],
    warnings: &mut Vec<MergeWarning>,
) -> HashMap<String, Element> {
    let mut tables = HashMap::new();
    let Some(body) = side.body() else {
        return tables;
    };

    let mut heading: Option<String> = None;
    for el in body.elements() {
        if side.is_w(el, "p") {
            let text = side.paragraph_text(el);
            let text = text.trim();
            if !text.is_empty() {
                heading = Some(text.to_string());
            }
        } else if side.is_w(el, "tbl") {
            let Some(ref key) = heading else {
                debug!("Skipping table with no preceding paragraph");
                continue;
            };
            let mut copy = el.clone();
            rewrite_table(&mut copy, side.prefixes(), rel_map, key, warnings);
            declare_namespaces(&mut copy, foreign_ns);
            if tables.insert(key.clone(), copy).is_some() {
                warnings.push(MergeWarning::HeadingOverwritten {
                    heading: key.clone(),
                });
            }
        }
    }
    tables
}

/// Remap hyperlink ids and collapse numbering inside a copied table.
fn rewrite_table(
    table: &mut Element,
    prefixes: &Prefixes,
    rel_map: &HashMap<String, String>,
    heading: &str,
    warnings: &mut Vec<MergeWarning>,
) {
    let hyperlink = prefixes.w("hyperlink");
    let num_pr = prefixes.w("numPr");
    let ilvl = prefixes.w("ilvl");
    let num_id = prefixes.w("numId");
    let val = prefixes.w("val");
    let rel_id = prefixes.r("id");

    table.visit_mut(&mut |el| {
        if el.name == hyperlink {
            let Some(old) = el.attr(&rel_id).map(str::to_string) else {
                return;
            };
            match rel_map.get(&old) {
                Some(new) => el.set_attr(rel_id.as_str(), new.as_str()),
                None => warnings.push(MergeWarning::UnmappedRelationship {
                    id: old,
                    heading: heading.to_string(),
                }),
            }
        } else if el.name == num_pr {
            if let Some(level) = el.child_mut(&ilvl) {
                level.set_attr(val.as_str(), TRANSPLANT_ILVL);
            }
            if let Some(id) = el.child_mut(&num_id) {
                id.set_attr(val.as_str(), TRANSPLANT_NUM_ID);
            }
        }
    });
}

/// Carry side-document namespace bindings onto the copied element so it stays
/// well-formed under the main root.
fn declare_namespaces(table: &mut Element, foreign_ns: &[(String, String)]) {
    if foreign_ns.is_empty() {
        return;
    }
    let mut used = Vec::new();
    table.visit(&mut |el| {
        let names = std::iter::once(el.name.as_str())
            .chain(el.attributes.iter().map(|(k, _)| k.as_str()));
        for name in names {
            if let Some((prefix, _)) = name.split_once(':') {
                if prefix != "xmlns" && prefix != "xml" && !used.iter().any(|p| p == prefix) {
                    used.push(prefix.to_string());
                }
            }
        }
    });
    for (decl, uri) in foreign_ns {
        let prefix = &decl["xmlns:".len()..];
        if used.iter().any(|p| p == prefix) && table.attr(decl).is_none() {
            table.set_attr(decl.as_str(), uri.as_str());
        }
    }
}

fn replace_markers(
    main: &mut WordDocument,
    tables: &HashMap<String, Element>,
    marker_prefix: &str,
    warnings: &mut Vec<MergeWarning>,
) -> Result<usize, Md2DocxError> {
    let body = main
        .body()
        .ok_or_else(|| Md2DocxError::docx("main document", "missing body"))?;

    // Text is read in one pass and nodes swapped in a second, since text
    // extraction borrows the document.
    let markers: Vec<(usize, String)> = body
        .children
        .iter()
        .enumerate()
        .filter_map(|(i, node)| {
            let el = node.as_element()?;
            if !main.is_w(el, "p") {
                return None;
            }
            let text = main.paragraph_text(el);
            text.contains(marker_prefix).then_some((i, text))
        })
        .collect();

    let body = main
        .body_mut()
        .ok_or_else(|| Md2DocxError::docx("main document", "missing body"))?;

    let mut merged = 0;
    for (index, text) in markers {
        match tables.get(&text) {
            Some(table) => {
                body.children[index] = Node::Element(table.clone());
                merged += 1;
            }
            None => warnings.push(MergeWarning::UnmatchedMarker { text }),
        }
    }
    Ok(merged)
}
