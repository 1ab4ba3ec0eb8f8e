//! # docx-proof
//!
//! Correct the text of Word documents with an LLM while preserving structure.
//!
//! ## Why this crate?
//!
//! The obvious pipeline — extract the text, fix it, regenerate the document —
//! destroys everything the text extraction cannot represent: styles, tables,
//! section properties, embedded pictures, numbering. Instead this crate opens
//! the docx as what it is (a zip of XML parts), maps every paragraph to its
//! exact byte range in `word/document.xml`, sends only the visible text to an
//! LLM corrector, and splices the corrected text back into the original
//! bytes. Whatever the pipeline does not understand is carried through
//! untouched, so the output opens in Word exactly like the input — minus the
//! typos.
//!
//! ## Pipeline Overview
//!
//! ```text
//! docx
//!  │
//!  ├─ 1. Input     resolve local file or download from URL (ZIP magic check)
//!  ├─ 2. Package   open the archive, locate word/document.xml
//!  ├─ 3. Tree      parse the XML into paragraphs/runs with byte spans
//!  ├─ 4. Correct   sequential oracle calls, one per paragraph (cached)
//!  ├─ 5. Annotate  describe embedded images, insert italic descriptions
//!  ├─ 6. Splice    apply all recorded edits to the original XML bytes
//!  └─ 7. Output    repackaged docx + per-paragraph / per-image stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docx_proof::{correct, CorrectionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = CorrectionConfig::default();
//!     let output = correct("relatorio.docx", &config).await?;
//!     std::fs::write("relatorio_corrigido.docx", &output.docx)?;
//!     eprintln!("{}/{} paragraphs corrected, tokens: {} in / {} out",
//!         output.stats.corrected,
//!         output.stats.total_paragraphs,
//!         output.stats.total_prompt_tokens,
//!         output.stats.total_completion_tokens);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docxproof` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! docx-proof = { version = "0.3", default-features = false }
//! ```
//!
//! ## Choosing a Model
//!
//! Image annotation sends pictures to the same model, so pick one that
//! accepts images when `annotate_images` is on (the default).
//!
//! | Model | $/1M tokens | Quality | Best for |
//! |-------|------------|---------|----------|
//! | `gpt-4.1-nano` | $0.10/$0.40 | ★★★ | Default — fast, cheap |
//! | `gpt-4.1-mini` | $0.40/$1.60 | ★★★★ | Balance |
//! | `gpt-4.1`      | $2.00/$8.00 | ★★★★★ | Highest accuracy |
//! | `claude-sonnet-4-20250514` | $3.00/$15.00 | ★★★★★ | Dense pedagogical text |
//! | `gemini-2.0-flash` | $0.10/$0.40 | ★★★ | Alternative cheap option |
//!
//! A 30-page exercise booklet costs roughly **$0.01** with `gpt-4.1-nano`.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod correct;
pub mod docx;
pub mod error;
pub mod oracle;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{CorrectionConfig, CorrectionConfigBuilder};
pub use correct::{
    check_oracle, correct, correct_from_bytes, correct_sync, correct_to_file, inspect,
};
pub use error::{DocxProofError, ErrorKind, NodeError};
pub use oracle::{CorrectionOracle, ImagePayload, LlmOracle, OracleReply};
pub use output::{
    CorrectionOutput, CorrectionStats, DocumentSummary, ImageOutcome, ParagraphOutcome,
    ParagraphStatus,
};
pub use progress::{CorrectionProgressCallback, NoopProgressCallback, ProgressCallback};
