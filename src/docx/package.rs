//! OOXML package container: the ZIP archive holding a DOCX's parts.
//!
//! Every part is read into memory once; mutated parts are swapped in with
//! [`DocxPackage::set_part`] and the archive is rebuilt in the original entry
//! order with each entry's original compression method and timestamp, so
//! rebuilding the same content twice yields identical bytes.

use super::rels::{Relationships, OFFICE_DOCUMENT_REL_TYPE};
use super::DocxError;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// Package-level relationships part.
pub const PACKAGE_RELS_PATH: &str = "_rels/.rels";

/// Fallback location of the main document part.
pub const DEFAULT_DOCUMENT_PATH: &str = "word/document.xml";

#[derive(Debug, Clone)]
struct PackagePart {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    modified: DateTime,
}

/// In-memory DOCX archive.
#[derive(Debug, Clone, Default)]
pub struct DocxPackage {
    parts: Vec<PackagePart>,
}

impl DocxPackage {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocxError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut parts = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            parts.push(PackagePart {
                name: file.name().to_string(),
                data,
                compression: file.compression(),
                modified: file.last_modified().unwrap_or_default(),
            });
        }

        Ok(Self { parts })
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.data.as_slice())
    }

    /// Part content as UTF-8 text.
    pub fn part_str(&self, name: &str) -> Result<Option<&str>, DocxError> {
        self.part(name)
            .map(|bytes| {
                std::str::from_utf8(bytes).map_err(|e| DocxError::Encoding {
                    part: name.to_string(),
                    source: e,
                })
            })
            .transpose()
    }

    /// Replace a part's content, or append a new deflated part.
    pub fn set_part(&mut self, name: &str, data: Vec<u8>) {
        match self.parts.iter_mut().find(|p| p.name == name) {
            Some(part) => part.data = data,
            None => self.parts.push(PackagePart {
                name: name.to_string(),
                data,
                compression: CompressionMethod::Deflated,
                modified: DateTime::default(),
            }),
        }
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(|p| p.name.as_str())
    }

    /// Locate the main document part through the package relationships,
    /// falling back to `word/document.xml`.
    pub fn main_document_path(&self) -> Result<String, DocxError> {
        let Some(xml) = self.part_str(PACKAGE_RELS_PATH)? else {
            return Ok(DEFAULT_DOCUMENT_PATH.to_string());
        };
        let rels = Relationships::parse(xml)?;
        let path = rels
            .of_type(OFFICE_DOCUMENT_REL_TYPE)
            .next()
            .map(|r| r.target.trim_start_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_DOCUMENT_PATH.to_string());
        Ok(path)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, DocxError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for part in &self.parts {
            let method = match part.compression {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            let options = SimpleFileOptions::default()
                .compression_method(method)
                .last_modified_time(part.modified);
            writer.start_file(part.name.as_str(), options)?;
            writer.write_all(&part.data)?;
        }
        Ok(writer.finish()?.into_inner())
    }
}

/// Relationships part that belongs to `part_path`
/// (`word/document.xml` → `word/_rels/document.xml.rels`).
pub fn rels_path_for(part_path: &str) -> String {
    match part_path.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part_path}.rels"),
    }
}
