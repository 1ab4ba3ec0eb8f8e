//! Full-document correction entry points.
//!
//! ## One pass, surgical splices
//!
//! [`correct`] walks the document once, sends every paragraph text to the
//! correction oracle, optionally asks a vision model to describe each
//! embedded image, then applies every recorded splice in one pass and
//! repackages the archive. Bytes the splices never touched are carried
//! through verbatim, so section properties, styles, headers, and any markup
//! the pipeline does not model cannot be damaged.
//!
//! Per-node failures degrade, they never abort: a paragraph whose correction
//! fails keeps its original text, an image whose description fails gets a
//! placeholder paragraph, and the run still returns `Ok` with the failures
//! recorded in [`CorrectionOutput::paragraphs`] and
//! [`CorrectionOutput::images`]. Only input, package, and provider problems
//! are fatal.

use crate::config::CorrectionConfig;
use crate::docx::edit::EditSet;
use crate::docx::package::DocxPackage;
use crate::docx::tree::DocumentTree;
use crate::error::DocxProofError;
use crate::oracle::{CorrectionOracle, LlmOracle};
use crate::output::{CorrectionOutput, CorrectionStats, DocumentSummary, ParagraphStatus};
use crate::pipeline::input::ResolvedInput;
use crate::pipeline::{annotate, input, rewrite, walker};
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Correct a docx file or URL.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input` — Local file path or HTTP/HTTPS URL to a docx
/// * `config` — Correction configuration
///
/// # Returns
/// `Ok(CorrectionOutput)` on success, even if some paragraphs or images
/// failed (check `output.stats.failed` and `output.is_clean()`).
///
/// # Errors
/// Returns `Err(DocxProofError)` only for fatal errors:
/// - File not found / permission denied / download failure
/// - Not a valid docx (bad magic, corrupt archive, missing document part)
/// - No LLM provider could be resolved
pub async fn correct(
    input: impl AsRef<str>,
    config: &CorrectionConfig,
) -> Result<CorrectionOutput, DocxProofError> {
    let input = input.as_ref();
    info!("Starting correction: {}", input);

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input, config.download_timeout_secs).await?;
    let package = match &resolved {
        ResolvedInput::Local(path) => DocxPackage::open(path)?,
        ResolvedInput::Downloaded { bytes, .. } => DocxPackage::from_bytes(bytes)?,
    };

    correct_package(package, config).await
}

/// Correct docx bytes already in memory.
///
/// The archive is read from the buffer directly; nothing touches the
/// filesystem. This is the recommended API when documents come from a
/// database, an upload handler, or a message queue.
///
/// # Example
/// ```rust,no_run
/// use docx_proof::{correct_from_bytes, CorrectionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes: Vec<u8> = std::fs::read("relatorio.docx")?;
/// let config = CorrectionConfig::default();
/// let output = correct_from_bytes(&bytes, &config).await?;
/// std::fs::write("relatorio_corrigido.docx", &output.docx)?;
/// # Ok(())
/// # }
/// ```
pub async fn correct_from_bytes(
    bytes: &[u8],
    config: &CorrectionConfig,
) -> Result<CorrectionOutput, DocxProofError> {
    correct_package(DocxPackage::from_bytes(bytes)?, config).await
}

/// Correct a docx and write the result directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn correct_to_file(
    input: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &CorrectionConfig,
) -> Result<CorrectionOutput, DocxProofError> {
    let output = correct(input, config).await?;
    let path = output_path.as_ref();

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    tokio::fs::create_dir_all(&parent)
        .await
        .map_err(|e| DocxProofError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

    // Stage in the destination directory so the final rename never crosses
    // a filesystem boundary, and the temp file is cleaned up on failure.
    let write_err = |e: std::io::Error| DocxProofError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
    tmp.write_all(&output.docx).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;

    info!("Wrote corrected document to {}", path.display());
    Ok(output)
}

/// Synchronous wrapper around [`correct`].
///
/// Creates a temporary tokio runtime internally.
pub fn correct_sync(
    input: impl AsRef<str>,
    config: &CorrectionConfig,
) -> Result<CorrectionOutput, DocxProofError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DocxProofError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(correct(input, config))
}

/// Check whether a correction oracle can be resolved with this configuration.
///
/// Walks the same resolution chain as [`correct`] but sends no request, so
/// success means credentials are present and a provider was constructed,
/// not that the credentials are valid.
pub fn check_oracle(config: &CorrectionConfig) -> Result<(), DocxProofError> {
    resolve_oracle(config).map(|_| ())
}

/// Count a document's structure without calling any oracle.
///
/// Does not require an LLM provider or API key.
pub async fn inspect(input: impl AsRef<str>) -> Result<DocumentSummary, DocxProofError> {
    let resolved = input::resolve_input(input.as_ref(), 120).await?;
    let package = match &resolved {
        ResolvedInput::Local(path) => DocxPackage::open(path)?,
        ResolvedInput::Downloaded { bytes, .. } => DocxPackage::from_bytes(bytes)?,
    };

    let xml = package.document_xml()?;
    let tree = DocumentTree::parse(&xml)?;
    let walk = walker::walk(&tree);

    Ok(DocumentSummary {
        paragraphs: walk.len(),
        tables: tree.table_count(),
        image_runs: walker::count_image_runs(&walk),
        media_parts: package
            .part_names()
            .filter(|n| n.starts_with("word/media/"))
            .count(),
        text_chars: walk.iter().map(|wp| wp.para.text().chars().count()).sum(),
    })
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// The correction pipeline proper, once the package is open.
async fn correct_package(
    mut package: DocxPackage,
    config: &CorrectionConfig,
) -> Result<CorrectionOutput, DocxProofError> {
    let total_start = Instant::now();

    // ── Step 2: Resolve the oracle ───────────────────────────────────────
    let oracle = resolve_oracle(config)?;

    // ── Step 3: Parse the document part ──────────────────────────────────
    let xml = package.document_xml()?;
    let tree = DocumentTree::parse(&xml)?;
    let walk = walker::walk(&tree);
    let total = walk.len();
    let total_images = walker::count_image_runs(&walk);
    info!(
        "Document has {} paragraphs, {} tables, {} image runs",
        total,
        tree.table_count(),
        total_images
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_correction_start(total, total_images);
    }

    // ── Step 4: Correct paragraph text ───────────────────────────────────
    // Sequential on purpose: the oracle cache deduplicates repeated
    // boilerplate only when earlier replies land before later lookups.
    let oracle_start = Instant::now();
    let mut edits = EditSet::new();
    let mut paragraphs = Vec::with_capacity(total);
    for wp in &walk {
        if let Some(ref cb) = config.progress_callback {
            cb.on_paragraph_start(wp.index, total);
        }
        let outcome =
            rewrite::rewrite_paragraph(wp, &xml, oracle.as_ref(), config, &mut edits).await;
        if let Some(ref cb) = config.progress_callback {
            match &outcome.error {
                None => cb.on_paragraph_complete(
                    wp.index,
                    total,
                    outcome.status == ParagraphStatus::Corrected,
                ),
                Some(e) => cb.on_paragraph_error(wp.index, total, &e.to_string()),
            }
        }
        paragraphs.push(outcome);
    }

    // ── Step 5: Describe embedded images ─────────────────────────────────
    let images = if config.annotate_images {
        annotate::annotate_images(&walk, &package, oracle.as_ref(), config, &mut edits).await
    } else {
        debug!("Image annotation disabled");
        Vec::new()
    };
    let oracle_duration_ms = oracle_start.elapsed().as_millis() as u64;

    // ── Step 6: Apply splices and repackage ──────────────────────────────
    let edit_count = edits.len();
    let rewritten = edits.apply(&xml)?;
    debug!("Applied {} splices to the document part", edit_count);
    package.replace_document_xml(rewritten);
    let docx = package.to_bytes()?;

    // ── Step 7: Compute stats ────────────────────────────────────────────
    let count = |s: ParagraphStatus| paragraphs.iter().filter(|p| p.status == s).count();
    let corrected = count(ParagraphStatus::Corrected);
    let described_images = images.iter().filter(|i| i.described).count();

    let stats = CorrectionStats {
        total_paragraphs: total,
        corrected,
        unchanged: count(ParagraphStatus::Unchanged),
        skipped: count(ParagraphStatus::Skipped),
        failed: count(ParagraphStatus::Failed),
        cache_hits: paragraphs.iter().filter(|p| p.cached).count(),
        total_images: images.len(),
        described_images,
        placeholder_images: images.len() - described_images,
        total_prompt_tokens: paragraphs.iter().map(|p| p.prompt_tokens).sum::<usize>()
            + images.iter().map(|i| i.prompt_tokens).sum::<usize>(),
        total_completion_tokens: paragraphs.iter().map(|p| p.completion_tokens).sum::<usize>()
            + images.iter().map(|i| i.completion_tokens).sum::<usize>(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        oracle_duration_ms,
    };

    info!(
        "Correction complete: {}/{} paragraphs corrected, {} images described, {}ms total",
        corrected, total, described_images, stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_correction_complete(total, corrected);
    }

    Ok(CorrectionOutput {
        docx,
        paragraphs,
        images,
        stats,
    })
}

/// Instantiate a named provider with the given model.
fn create_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, DocxProofError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DocxProofError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the correction oracle, from most-specific to least-specific.
///
/// The four-level fallback chain lets library users and CLI users each set
/// exactly as much or as little as they need:
///
/// 1. **Pre-built oracle** (`config.oracle`) — the caller constructed and
///    configured the oracle entirely; we use it as-is. Useful in tests or
///    when sharing one correction cache across several documents.
///
/// 2. **Named provider + model** (`config.provider_name`) — the caller named
///    a provider (e.g. `"openai"`) and optional model. We call
///    [`ProviderFactory::create_llm_provider`] which reads the corresponding
///    API key (`OPENAI_API_KEY`, etc.) from the environment.
///
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`) —
///    both env vars set means the provider and model were chosen at the
///    execution environment level (Makefile, shell script, CI). Checked
///    before full auto-detection so the model choice is honoured even when
///    multiple API keys are present.
///
/// 4. **Full auto-detection** (`ProviderFactory::from_env`) — the factory
///    scans all known API key variables and picks the first available
///    provider. Convenient for `docxproof relatorio.docx` with no other
///    configuration.
///
/// With image annotation enabled the resolved model must accept images;
/// the default `gpt-4.1-nano` does.
fn resolve_oracle(config: &CorrectionConfig) -> Result<Arc<dyn CorrectionOracle>, DocxProofError> {
    // 1) User-provided oracle takes priority
    if let Some(ref oracle) = config.oracle {
        return Ok(Arc::clone(oracle));
    }

    // 2) Provider name + model
    let provider = if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
        create_provider(name, model)?
    } else if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        // 3) Environment pair, when both are non-empty
        if !prov.is_empty() && !model.is_empty() {
            create_provider(&prov, &model)?
        } else {
            detect_provider(config)?
        }
    } else {
        detect_provider(config)?
    };

    let mut oracle = LlmOracle::new(provider)
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens)
        .with_retries(config.max_retries, config.retry_backoff_ms)
        .with_cache(config.use_cache);
    if let Some(ref prompt) = config.system_prompt {
        oracle = oracle.with_system_prompt(prompt.clone());
    }
    Ok(Arc::new(oracle))
}

/// Auto-detect a provider from the environment.
///
/// Prefers OpenAI explicitly when an OpenAI API key is present, so users
/// with multiple provider keys default to OpenAI unless they request
/// another provider.
fn detect_provider(config: &CorrectionConfig) -> Result<Arc<dyn LLMProvider>, DocxProofError> {
    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or("gpt-4.1-nano");
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DocxProofError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NodeError;
    use crate::oracle::{ImagePayload, OracleReply};
    use std::io::{Cursor, Write};
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    const DOC_XML: &str = concat!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
        r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">"#,
        r#"<w:body>"#,
        r#"<w:p><w:r><w:t>Texto com erro ortografico.</w:t></w:r></w:p>"#,
        r#"<w:p><w:r><w:t xml:space="preserve">   </w:t></w:r></w:p>"#,
        r#"<w:p><w:r><w:t>Texto ja correto.</w:t></w:r></w:p>"#,
        r#"</w:body></w:document>"#
    );

    fn docx_bytes() -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        zip.start_file("word/document.xml", SimpleFileOptions::default())
            .expect("start");
        zip.write_all(DOC_XML.as_bytes()).expect("write");
        zip.finish().expect("finish").into_inner()
    }

    /// Fixes one known typo, echoes everything else.
    struct TypoOracle;

    #[async_trait::async_trait]
    impl CorrectionOracle for TypoOracle {
        async fn correct_text(&self, text: &str) -> Result<OracleReply, DocxProofError> {
            Ok(OracleReply::local(
                text.replace("ortografico", "ortográfico"),
            ))
        }
        async fn describe_image(
            &self,
            _image: &ImagePayload,
            _context: &str,
        ) -> Result<OracleReply, DocxProofError> {
            Err(DocxProofError::Internal("not a vision stub".into()))
        }
    }

    /// Returns every paragraph verbatim.
    struct EchoOracle;

    #[async_trait::async_trait]
    impl CorrectionOracle for EchoOracle {
        async fn correct_text(&self, text: &str) -> Result<OracleReply, DocxProofError> {
            Ok(OracleReply::local(text))
        }
        async fn describe_image(
            &self,
            _image: &ImagePayload,
            _context: &str,
        ) -> Result<OracleReply, DocxProofError> {
            Err(DocxProofError::Internal("not a vision stub".into()))
        }
    }

    fn stub_config() -> CorrectionConfig {
        CorrectionConfig {
            oracle: Some(Arc::new(TypoOracle)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn corrects_bytes_end_to_end() {
        let output = correct_from_bytes(&docx_bytes(), &stub_config())
            .await
            .expect("correct");

        assert_eq!(output.stats.total_paragraphs, 3);
        assert_eq!(output.stats.corrected, 1);
        assert_eq!(output.stats.skipped, 1);
        assert_eq!(output.stats.unchanged, 1);
        assert_eq!(output.stats.failed, 0);
        assert!(output.is_clean());

        let package = DocxPackage::from_bytes(&output.docx).expect("reopen");
        let xml = package.document_xml().expect("document part");
        assert!(xml.contains("erro ortográfico"));
        assert!(!xml.contains("erro ortografico"));
        assert!(xml.contains("Texto ja correto."));
    }

    #[tokio::test]
    async fn idempotent_oracle_leaves_document_part_byte_identical() {
        let bytes = docx_bytes();
        let config = CorrectionConfig {
            oracle: Some(Arc::new(EchoOracle)),
            ..Default::default()
        };
        let output = correct_from_bytes(&bytes, &config).await.expect("correct");

        let before = DocxPackage::from_bytes(&bytes)
            .expect("open")
            .document_xml()
            .expect("xml");
        let after = DocxPackage::from_bytes(&output.docx)
            .expect("reopen")
            .document_xml()
            .expect("xml");
        assert_eq!(before, after);
        assert_eq!(output.stats.corrected, 0);
    }

    #[tokio::test]
    async fn failing_oracle_degrades_instead_of_aborting() {
        struct AlwaysDown;

        #[async_trait::async_trait]
        impl CorrectionOracle for AlwaysDown {
            async fn correct_text(&self, _text: &str) -> Result<OracleReply, DocxProofError> {
                Err(DocxProofError::OracleFailed {
                    message: "503".into(),
                })
            }
            async fn describe_image(
                &self,
                _image: &ImagePayload,
                _context: &str,
            ) -> Result<OracleReply, DocxProofError> {
                Err(DocxProofError::OracleFailed {
                    message: "503".into(),
                })
            }
        }

        let bytes = docx_bytes();
        let config = CorrectionConfig {
            oracle: Some(Arc::new(AlwaysDown)),
            ..Default::default()
        };
        let output = correct_from_bytes(&bytes, &config).await.expect("correct");

        assert_eq!(output.stats.failed, 2);
        assert!(!output.is_clean());
        assert!(output
            .node_errors()
            .all(|e| matches!(e, NodeError::CorrectionFailed { .. })));

        // Original text survives in the output document.
        let after = DocxPackage::from_bytes(&output.docx)
            .expect("reopen")
            .document_xml()
            .expect("xml");
        assert!(after.contains("Texto com erro ortografico."));
    }

    #[tokio::test]
    async fn correct_to_file_writes_a_valid_package() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input_path = dir.path().join("entrada.docx");
        std::fs::write(&input_path, docx_bytes()).expect("write input");
        let output_path = dir.path().join("saida.docx");

        let output = correct_to_file(
            input_path.to_str().expect("utf8 path"),
            &output_path,
            &stub_config(),
        )
        .await
        .expect("correct");

        assert!(output_path.exists());
        let written = std::fs::read(&output_path).expect("read output");
        assert_eq!(written, output.docx);
        DocxPackage::from_bytes(&written).expect("valid package");
    }

    #[tokio::test]
    async fn inspect_counts_without_an_oracle() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input_path = dir.path().join("entrada.docx");
        std::fs::write(&input_path, docx_bytes()).expect("write input");

        let summary = inspect(input_path.to_str().expect("utf8 path"))
            .await
            .expect("inspect");
        assert_eq!(summary.paragraphs, 3);
        assert_eq!(summary.tables, 0);
        assert_eq!(summary.image_runs, 0);
        assert_eq!(summary.media_parts, 0);
    }

    #[test]
    fn correct_sync_runs_without_an_ambient_runtime() {
        let dir = tempfile::tempdir().expect("tempdir");
        let input_path = dir.path().join("entrada.docx");
        std::fs::write(&input_path, docx_bytes()).expect("write input");

        let output = correct_sync(input_path.to_str().expect("utf8 path"), &stub_config())
            .expect("correct");
        assert_eq!(output.stats.corrected, 1);
    }
}
