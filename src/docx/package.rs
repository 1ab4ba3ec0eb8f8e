//! ZIP container round-trip for `.docx` files.
//!
//! ## Why keep every part as raw bytes?
//!
//! Correction only ever touches `word/document.xml`. Styles, numbering,
//! headers, embedded fonts, and pictures must come out of the rewritten
//! archive byte-for-byte identical to how they went in — users diff their
//! documents, and a corrector that perturbs untouched parts is not
//! trustworthy. So the package is a plain ordered list of
//! `(name, bytes)` entries: no part is parsed unless a pipeline stage asks
//! for it, and the writer replays the list in its original order.
//!
//! Media parts are written `Stored` (they are already compressed formats;
//! deflating PNG/JPEG again wastes CPU for ~0% gain), everything else
//! `Deflated`.

use crate::error::DocxProofError;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use std::path::Path;
use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Local-file-header signature of a non-empty ZIP archive.
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

/// Part name of the main document body.
const DOCUMENT_PART: &str = "word/document.xml";

/// Part name of the body's relationship table.
const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";

/// One entry from `word/_rels/document.xml.rels`.
///
/// Image runs reference pictures indirectly: the run carries a relationship
/// id (`r:embed="rId4"`), and the relationship maps that id to a target part
/// such as `media/image1.png`.
#[derive(Debug, Clone)]
pub struct Relationship {
    /// Relationship type URI (image, hyperlink, ...).
    pub rel_type: String,
    /// Target, relative to `word/` unless it starts with `/`.
    pub target: String,
}

/// An opened `.docx` archive: every part, in original order.
#[derive(Debug)]
pub struct DocxPackage {
    /// `(part name, raw bytes)` in the order the archive listed them.
    entries: Vec<(String, Vec<u8>)>,
    /// Index of `word/document.xml` within `entries`.
    document_index: usize,
}

impl DocxPackage {
    /// Open a `.docx` file from disk.
    pub fn open(path: &Path) -> Result<Self, DocxProofError> {
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => DocxProofError::PermissionDenied {
                path: path.to_path_buf(),
            },
            _ => DocxProofError::FileNotFound {
                path: path.to_path_buf(),
            },
        })?;
        Self::parse(&bytes, path)
    }

    /// Open a `.docx` archive already held in memory.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DocxProofError> {
        Self::parse(bytes, Path::new("(in-memory)"))
    }

    fn parse(bytes: &[u8], origin: &Path) -> Result<Self, DocxProofError> {
        if bytes.len() < 4 || bytes[..4] != ZIP_MAGIC {
            let mut magic = [0u8; 4];
            let n = bytes.len().min(4);
            magic[..n].copy_from_slice(&bytes[..n]);
            return Err(DocxProofError::NotADocx {
                path: origin.to_path_buf(),
                magic,
            });
        }

        let mut archive =
            ZipArchive::new(Cursor::new(bytes)).map_err(|e| DocxProofError::CorruptArchive {
                detail: e.to_string(),
            })?;

        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| DocxProofError::CorruptArchive {
                    detail: e.to_string(),
                })?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut data)
                .map_err(|e| DocxProofError::CorruptArchive {
                    detail: format!("{name}: {e}"),
                })?;
            entries.push((name, data));
        }

        let document_index = entries
            .iter()
            .position(|(name, _)| name == DOCUMENT_PART)
            .ok_or_else(|| DocxProofError::MissingPart {
                part: DOCUMENT_PART.to_string(),
            })?;

        debug!(
            "Opened {}: {} parts, document.xml is {} bytes",
            origin.display(),
            entries.len(),
            entries[document_index].1.len()
        );

        Ok(Self {
            entries,
            document_index,
        })
    }

    /// The main document body as UTF-8 text.
    pub fn document_xml(&self) -> Result<String, DocxProofError> {
        String::from_utf8(self.entries[self.document_index].1.clone()).map_err(|_| {
            DocxProofError::MalformedXml {
                detail: format!("{DOCUMENT_PART} is not valid UTF-8"),
            }
        })
    }

    /// Swap in a rewritten document body. Every other part is untouched.
    pub fn replace_document_xml(&mut self, xml: String) {
        self.entries[self.document_index].1 = xml.into_bytes();
    }

    /// Raw bytes of a part, by exact archive name.
    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| data.as_slice())
    }

    /// Names of all parts, in archive order.
    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Resolve a relationship target to the bytes of its media part.
    ///
    /// Targets are relative to `word/` (`media/image1.png`) unless they start
    /// with `/`, in which case they name the part from the archive root.
    /// Returns `None` for external targets and missing parts alike.
    pub fn media(&self, target: &str) -> Option<&[u8]> {
        let name = match target.strip_prefix('/') {
            Some(absolute) => absolute.to_string(),
            None => format!("word/{target}"),
        };
        self.part(&name)
    }

    /// Parse `word/_rels/document.xml.rels` into an id → relationship map.
    ///
    /// A document with no relationship part (no images, no hyperlinks) yields
    /// an empty map rather than an error.
    pub fn relationships(&self) -> Result<HashMap<String, Relationship>, DocxProofError> {
        let Some(bytes) = self.part(DOCUMENT_RELS_PART) else {
            debug!("No {DOCUMENT_RELS_PART} part; document has no relationships");
            return Ok(HashMap::new());
        };
        let xml = std::str::from_utf8(bytes).map_err(|_| DocxProofError::MalformedXml {
            detail: format!("{DOCUMENT_RELS_PART} is not valid UTF-8"),
        })?;

        let mut reader = Reader::from_str(xml);
        let mut buf = Vec::new();
        let mut rels = HashMap::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(e)) | Ok(Event::Start(e))
                    if e.local_name().as_ref() == b"Relationship" =>
                {
                    let mut id = None;
                    let mut rel_type = String::new();
                    let mut target = String::new();
                    for attr in e.attributes().flatten() {
                        let value = String::from_utf8_lossy(&attr.value).into_owned();
                        match attr.key.as_ref() {
                            b"Id" => id = Some(value),
                            b"Type" => rel_type = value,
                            b"Target" => target = value,
                            _ => {}
                        }
                    }
                    if let Some(id) = id {
                        rels.insert(id, Relationship { rel_type, target });
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(DocxProofError::MalformedXml {
                        detail: format!("{DOCUMENT_RELS_PART}: {e}"),
                    })
                }
            }
            buf.clear();
        }

        debug!("Parsed {} relationships", rels.len());
        Ok(rels)
    }

    /// Rebuild the archive.
    ///
    /// Parts are written in their original order. Media parts are `Stored`,
    /// everything else `Deflated`. Archive-level metadata (timestamps, extra
    /// fields) is not carried over; the per-part bytes are.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DocxProofError> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let deflated = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        for (name, data) in &self.entries {
            let options = if name.starts_with("word/media/") {
                stored
            } else {
                deflated
            };
            zip.start_file(name.as_str(), options)
                .map_err(|e| DocxProofError::Internal(format!("zip write {name}: {e}")))?;
            zip.write_all(data)
                .map_err(|e| DocxProofError::Internal(format!("zip write {name}: {e}")))?;
        }

        let cursor = zip
            .finish()
            .map_err(|e| DocxProofError::Internal(format!("zip finish: {e}")))?;
        Ok(cursor.into_inner())
    }

    /// Save the rebuilt archive to disk.
    pub fn save(&self, path: &Path) -> Result<(), DocxProofError> {
        let bytes = self.to_bytes()?;
        std::fs::write(path, bytes).map_err(|source| DocxProofError::OutputWriteFailed {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_zip(parts: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in parts {
            zip.start_file(*name, SimpleFileOptions::default())
                .expect("start_file");
            zip.write_all(data).expect("write_all");
        }
        zip.finish().expect("finish").into_inner()
    }

    const DOC_XML: &str = r#"<?xml version="1.0"?><w:document><w:body/></w:document>"#;

    const RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
<Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/image1.png"/>
</Relationships>"#;

    #[test]
    fn rejects_non_zip_bytes() {
        let err = DocxPackage::from_bytes(b"hello, definitely not a zip").unwrap_err();
        assert!(matches!(err, DocxProofError::NotADocx { magic, .. } if &magic == b"hell"));
    }

    #[test]
    fn rejects_truncated_bytes() {
        let err = DocxPackage::from_bytes(b"PK").unwrap_err();
        assert!(matches!(err, DocxProofError::NotADocx { .. }));
    }

    #[test]
    fn missing_document_part() {
        let bytes = build_zip(&[("word/styles.xml", b"<styles/>")]);
        let err = DocxPackage::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, DocxProofError::MissingPart { part } if part == "word/document.xml"));
    }

    #[test]
    fn document_round_trip_preserves_other_parts() {
        let media = [0x89u8, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3];
        let bytes = build_zip(&[
            ("[Content_Types].xml", b"<Types/>"),
            ("word/document.xml", DOC_XML.as_bytes()),
            ("word/media/image1.png", &media),
        ]);

        let mut package = DocxPackage::from_bytes(&bytes).expect("open");
        assert_eq!(package.document_xml().expect("utf8"), DOC_XML);

        let replaced = DOC_XML.replace("<w:body/>", "<w:body><w:p/></w:body>");
        package.replace_document_xml(replaced.clone());
        let rebuilt = package.to_bytes().expect("rebuild");

        let reopened = DocxPackage::from_bytes(&rebuilt).expect("reopen");
        assert_eq!(reopened.document_xml().expect("utf8"), replaced);
        assert_eq!(reopened.part("word/media/image1.png"), Some(&media[..]));
        assert_eq!(reopened.part("[Content_Types].xml"), Some(&b"<Types/>"[..]));
        // Order survives the round trip.
        let names: Vec<&str> = reopened.part_names().collect();
        assert_eq!(
            names,
            vec![
                "[Content_Types].xml",
                "word/document.xml",
                "word/media/image1.png"
            ]
        );
    }

    #[test]
    fn media_parts_are_stored_not_deflated() {
        let bytes = build_zip(&[
            ("word/document.xml", DOC_XML.as_bytes()),
            ("word/media/image1.png", &[1, 2, 3, 4]),
        ]);
        let rebuilt = DocxPackage::from_bytes(&bytes)
            .expect("open")
            .to_bytes()
            .expect("rebuild");

        let mut archive = ZipArchive::new(Cursor::new(rebuilt)).expect("zip");
        let media = archive.by_name("word/media/image1.png").expect("media");
        assert_eq!(media.compression(), CompressionMethod::Stored);
        drop(media);
        let doc = archive.by_name("word/document.xml").expect("doc");
        assert_eq!(doc.compression(), CompressionMethod::Deflated);
    }

    #[test]
    fn parses_relationships() {
        let bytes = build_zip(&[
            ("word/document.xml", DOC_XML.as_bytes()),
            ("word/_rels/document.xml.rels", RELS_XML.as_bytes()),
        ]);
        let package = DocxPackage::from_bytes(&bytes).expect("open");
        let rels = package.relationships().expect("rels");
        assert_eq!(rels.len(), 2);
        assert_eq!(rels["rId4"].target, "media/image1.png");
        assert!(rels["rId4"].rel_type.ends_with("/image"));
    }

    #[test]
    fn no_rels_part_is_empty_map() {
        let bytes = build_zip(&[("word/document.xml", DOC_XML.as_bytes())]);
        let package = DocxPackage::from_bytes(&bytes).expect("open");
        assert!(package.relationships().expect("rels").is_empty());
    }

    #[test]
    fn media_target_resolution() {
        let bytes = build_zip(&[
            ("word/document.xml", DOC_XML.as_bytes()),
            ("word/media/image1.png", &[9, 9, 9]),
        ]);
        let package = DocxPackage::from_bytes(&bytes).expect("open");
        assert_eq!(package.media("media/image1.png"), Some(&[9u8, 9, 9][..]));
        assert_eq!(
            package.media("/word/media/image1.png"),
            Some(&[9u8, 9, 9][..])
        );
        assert_eq!(package.media("media/missing.png"), None);
    }
}
