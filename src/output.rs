//! Output and report types for a correction run.
//!
//! A run produces the corrected document bytes plus a per-node report:
//! one [`ParagraphOutcome`] per walked paragraph, one [`ImageOutcome`] per
//! annotated image run, and aggregate [`CorrectionStats`]. Node failures are
//! recorded here rather than propagated, so a caller can always retrieve the
//! (partially) corrected document and decide afterwards how strict to be.
//!
//! Everything except the raw bytes serialises to JSON for reporting.

use crate::error::NodeError;
use serde::Serialize;

/// What happened to one walked paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParagraphStatus {
    /// The oracle changed the text and the runs were rewritten.
    Corrected,
    /// The oracle returned the text unchanged; the paragraph was not touched.
    Unchanged,
    /// Empty or whitespace-only; never sent to the oracle.
    Skipped,
    /// Oracle failure or media-token loss; original text kept.
    Failed,
}

/// Per-paragraph result, in walk order.
#[derive(Debug, Clone, Serialize)]
pub struct ParagraphOutcome {
    /// 0-indexed position in the walk (body paragraphs first, then tables).
    pub index: usize,
    /// Human-readable location, e.g. `body` or `table 0 / row 1 / cell 2`.
    pub location: String,
    pub status: ParagraphStatus,
    /// True when the correction came from the session cache.
    pub cached: bool,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub duration_ms: u64,
    /// Oracle retries consumed (0 = first attempt succeeded).
    pub retries: u32,
    /// Present when `status == Failed`.
    pub error: Option<NodeError>,
}

/// Per-image result, in document order.
#[derive(Debug, Clone, Serialize)]
pub struct ImageOutcome {
    /// 0-indexed image ordinal in document order.
    pub index: usize,
    /// Walk index of the paragraph containing the image run.
    pub paragraph: usize,
    pub location: String,
    /// True if the vision oracle produced the description; false if the
    /// placeholder was inserted.
    pub described: bool,
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub duration_ms: u64,
    /// Present when `described == false`.
    pub error: Option<NodeError>,
}

/// Aggregate counters for one correction run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CorrectionStats {
    pub total_paragraphs: usize,
    pub corrected: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cache_hits: usize,
    pub total_images: usize,
    pub described_images: usize,
    pub placeholder_images: usize,
    pub total_prompt_tokens: usize,
    pub total_completion_tokens: usize,
    /// Wall-clock time for the whole run.
    pub total_duration_ms: u64,
    /// Time spent inside oracle calls (correction + vision).
    pub oracle_duration_ms: u64,
}

/// The result of correcting one document.
#[derive(Debug, Clone, Serialize)]
pub struct CorrectionOutput {
    /// The corrected document, a complete docx package.
    #[serde(skip)]
    pub docx: Vec<u8>,
    /// Per-paragraph outcomes in walk order.
    pub paragraphs: Vec<ParagraphOutcome>,
    /// Per-image outcomes in document order.
    pub images: Vec<ImageOutcome>,
    pub stats: CorrectionStats,
}

impl CorrectionOutput {
    /// True when every node succeeded (no fallbacks, no placeholders).
    pub fn is_clean(&self) -> bool {
        self.stats.failed == 0 && self.stats.placeholder_images == 0
    }

    /// All per-node errors recorded during the run, paragraphs first.
    pub fn node_errors(&self) -> impl Iterator<Item = &NodeError> {
        self.paragraphs
            .iter()
            .filter_map(|p| p.error.as_ref())
            .chain(self.images.iter().filter_map(|i| i.error.as_ref()))
    }
}

/// Structural counts reported by [`crate::inspect`] without touching any oracle.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSummary {
    /// Paragraphs the walker would visit (body + table cells, recursive).
    pub paragraphs: usize,
    /// Tables at any nesting depth.
    pub tables: usize,
    /// Runs carrying an embedded image reference.
    pub image_runs: usize,
    /// Entries under `word/media/`.
    pub media_parts: usize,
    /// Total decoded text length across walked paragraphs.
    pub text_chars: usize,
}
