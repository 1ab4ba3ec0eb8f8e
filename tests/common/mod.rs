//! Shared fixtures for the integration tests: in-memory docx builders and
//! deterministic stub oracles. No network, no files on disk.

use async_trait::async_trait;
use docx_proof::{CorrectionOracle, DocxProofError, ImagePayload, OracleReply};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// A 1×1 transparent PNG. Small enough to inline, real enough to pass
/// through the image normaliser untouched.
pub const TINY_PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F,
    0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9C, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A, 0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82,
];

const CONTENT_TYPES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Default Extension="png" ContentType="image/png"/>"#,
    r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
    r#"</Types>"#
);

const ROOT_RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
    r#"</Relationships>"#
);

const STYLES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
    r#"<w:style w:type="paragraph" w:styleId="Normal"><w:name w:val="Normal"/></w:style>"#,
    r#"</w:styles>"#
);

/// Wrap `<w:body>` content into a complete `word/document.xml` with the
/// namespaces the fixtures use.
pub fn wrap_body(body: &str) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<w:document"#,
            r#" xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main""#,
            r#" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#,
            r#" xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main""#,
            r#" xmlns:v="urn:schemas-microsoft-com:vml">"#,
            r#"<w:body>{body}</w:body></w:document>"#
        ),
        body = body
    )
}

/// A run holding plain text.
pub fn text_run(text: &str) -> String {
    format!(r#"<w:r><w:t xml:space="preserve">{text}</w:t></w:r>"#)
}

/// A paragraph holding one plain text run.
pub fn text_paragraph(text: &str) -> String {
    format!("<w:p>{}</w:p>", text_run(text))
}

/// A paragraph holding one embedded-image run referencing `rel_id`.
pub fn image_paragraph(rel_id: &str) -> String {
    format!(
        r#"<w:p><w:r><w:drawing><a:blip r:embed="{rel_id}"/></w:drawing></w:r></w:p>"#
    )
}

/// Build a complete docx package: content types, root rels, styles, and the
/// given document part. `media` entries create `word/media/<name>` parts and
/// matching relationship table rows `(rel id, media file name)`.
pub fn build_docx(document_xml: &str, media: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(CONTENT_TYPES.as_bytes()).unwrap();
    zip.start_file("_rels/.rels", options).unwrap();
    zip.write_all(ROOT_RELS.as_bytes()).unwrap();
    zip.start_file("word/document.xml", options).unwrap();
    zip.write_all(document_xml.as_bytes()).unwrap();
    zip.start_file("word/styles.xml", options).unwrap();
    zip.write_all(STYLES.as_bytes()).unwrap();

    if !media.is_empty() {
        let mut rels = String::from(concat!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#
        ));
        for (rel_id, file_name, _) in media {
            rels.push_str(&format!(
                r#"<Relationship Id="{rel_id}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="media/{file_name}"/>"#
            ));
        }
        rels.push_str("</Relationships>");

        zip.start_file("word/_rels/document.xml.rels", options).unwrap();
        zip.write_all(rels.as_bytes()).unwrap();

        for (_, file_name, bytes) in media {
            zip.start_file(format!("word/media/{file_name}"), options)
                .unwrap();
            zip.write_all(bytes).unwrap();
        }
    }

    zip.finish().unwrap().into_inner()
}

/// Shorthand for a text-only fixture.
pub fn build_text_docx(body: &str) -> Vec<u8> {
    build_docx(&wrap_body(body), &[])
}

/// Deterministic oracle for integration tests.
///
/// Corrections come from an exact-match replacement table (text not in the
/// table echoes back). Vision replies are numbered in call order, which is
/// reverse document order in the pipeline, so tests can detect where each
/// description landed.
pub struct StubOracle {
    replacements: HashMap<String, String>,
    describe: bool,
    pub correction_calls: Mutex<Vec<String>>,
    pub vision_calls: AtomicUsize,
}

impl StubOracle {
    /// Echo every paragraph, fail every image description.
    pub fn echo() -> Self {
        Self {
            replacements: HashMap::new(),
            describe: false,
            correction_calls: Mutex::new(Vec::new()),
            vision_calls: AtomicUsize::new(0),
        }
    }

    /// Echo paragraphs, apply the given exact-text replacements.
    pub fn fixing(pairs: &[(&str, &str)]) -> Self {
        let mut oracle = Self::echo();
        for (from, to) in pairs {
            oracle
                .replacements
                .insert((*from).to_string(), (*to).to_string());
        }
        oracle
    }

    /// Answer image descriptions with "Imagem descrita N" (N = call order).
    pub fn describing(mut self) -> Self {
        self.describe = true;
        self
    }
}

#[async_trait]
impl CorrectionOracle for StubOracle {
    async fn correct_text(&self, text: &str) -> Result<OracleReply, DocxProofError> {
        self.correction_calls
            .lock()
            .unwrap()
            .push(text.to_string());
        let corrected = self
            .replacements
            .get(text)
            .cloned()
            .unwrap_or_else(|| text.to_string());
        Ok(OracleReply::local(corrected))
    }

    async fn describe_image(
        &self,
        _image: &ImagePayload,
        _context: &str,
    ) -> Result<OracleReply, DocxProofError> {
        if !self.describe {
            return Err(DocxProofError::OracleFailed {
                message: "vision disabled in this stub".into(),
            });
        }
        let n = self.vision_calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(OracleReply::local(format!("Imagem descrita {n}")))
    }
}

/// Oracle that fails every call, for fallback tests.
pub struct FailingOracle;

#[async_trait]
impl CorrectionOracle for FailingOracle {
    async fn correct_text(&self, _text: &str) -> Result<OracleReply, DocxProofError> {
        Err(DocxProofError::OracleFailed {
            message: "simulated outage".into(),
        })
    }

    async fn describe_image(
        &self,
        _image: &ImagePayload,
        _context: &str,
    ) -> Result<OracleReply, DocxProofError> {
        Err(DocxProofError::OracleFailed {
            message: "simulated outage".into(),
        })
    }
}

/// Oracle that rewrites every paragraph to a fixed string, for tests that
/// need a known "wrong" reply (dropped media tokens, markup).
pub struct FixedReplyOracle(pub &'static str);

#[async_trait]
impl CorrectionOracle for FixedReplyOracle {
    async fn correct_text(&self, _text: &str) -> Result<OracleReply, DocxProofError> {
        Ok(OracleReply::local(self.0))
    }

    async fn describe_image(
        &self,
        _image: &ImagePayload,
        _context: &str,
    ) -> Result<OracleReply, DocxProofError> {
        Err(DocxProofError::OracleFailed {
            message: "vision disabled in this stub".into(),
        })
    }
}

/// Per-part contents of a docx archive, for byte-level comparisons.
pub fn unzip_parts(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
    use std::io::Read;

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut parts = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).unwrap();
        if entry.is_dir() {
            continue;
        }
        let mut content = Vec::new();
        entry.read_to_end(&mut content).unwrap();
        parts.push((entry.name().to_string(), content));
    }
    parts
}

/// The `word/document.xml` part of a docx byte buffer.
pub fn document_xml_of(bytes: &[u8]) -> String {
    let parts = unzip_parts(bytes);
    let (_, content) = parts
        .into_iter()
        .find(|(name, _)| name == "word/document.xml")
        .expect("word/document.xml present");
    String::from_utf8(content).expect("utf-8 document part")
}
