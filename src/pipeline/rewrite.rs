//! Paragraph correction: oracle round-trip and run redistribution.
//!
//! ## Redistribution
//!
//! A paragraph's text is usually shredded across several runs (spell-checker
//! sessions leave a run boundary at every squiggle Word once drew). The
//! corrected text cannot be pushed back run-by-run — corrections move
//! characters across run boundaries — so the whole paragraph text is
//! corrected at once and redistributed: the first text run is replaced by
//! freshly built runs carrying the corrected text in that run's properties,
//! every other text run is deleted, and image runs stay byte-identical in
//! place.
//!
//! ## Fallback
//!
//! Correction must never lose content. If the oracle call fails after
//! retries, or its output drops a `[[...]]` media placeholder present in
//! the input, the paragraph keeps its original markup and the failure is
//! reported in the per-paragraph outcome instead.

use crate::config::CorrectionConfig;
use crate::docx::build::run_xml;
use crate::docx::edit::EditSet;
use crate::docx::tree::RunContent;
use crate::error::NodeError;
use crate::oracle::CorrectionOracle;
use crate::output::{ParagraphOutcome, ParagraphStatus};
use crate::pipeline::markup::{self, Segment};
use crate::pipeline::walker::WalkedParagraph;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Instant;
use tracing::{debug, warn};

/// Placeholder tokens like `[[FIG1]]` that must survive correction.
static MEDIA_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\[[A-Za-z0-9_]+\]\]").unwrap());

/// Whole-reply code fence some models wrap their answer in.
static RE_OUTER_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\n(.*)\n```\s*$").unwrap());

/// Correct one paragraph, recording any required splices into `edits`.
///
/// `xml` must be the same document string the walk was parsed from; run
/// spans index into it.
pub async fn rewrite_paragraph(
    walked: &WalkedParagraph<'_>,
    xml: &str,
    oracle: &dyn CorrectionOracle,
    config: &CorrectionConfig,
    edits: &mut EditSet,
) -> ParagraphOutcome {
    let started = Instant::now();
    let original = walked.para.text();
    let mut outcome = ParagraphOutcome {
        index: walked.index,
        location: walked.location.clone(),
        status: ParagraphStatus::Skipped,
        cached: false,
        prompt_tokens: 0,
        completion_tokens: 0,
        duration_ms: 0,
        retries: 0,
        error: None,
    };

    if original.trim().is_empty() {
        debug!(
            "Paragraph {} ({}): no text, skipped",
            walked.index, walked.location
        );
        outcome.duration_ms = started.elapsed().as_millis() as u64;
        return outcome;
    }

    match oracle.correct_text(&original).await {
        Err(e) => {
            warn!(
                "Paragraph {} ({}): correction failed, keeping original: {e}",
                walked.index, walked.location
            );
            outcome.status = ParagraphStatus::Failed;
            outcome.error = Some(NodeError::CorrectionFailed {
                paragraph: walked.index,
                detail: e.to_string(),
            });
        }
        Ok(reply) => {
            outcome.cached = reply.cached;
            outcome.prompt_tokens = reply.prompt_tokens;
            outcome.completion_tokens = reply.completion_tokens;
            outcome.retries = reply.retries;

            let corrected = sanitize_reply(&reply.text);
            if let Some(token) = lost_token(&original, &corrected) {
                warn!(
                    "Paragraph {}: oracle output dropped '{token}', keeping original",
                    walked.index
                );
                outcome.status = ParagraphStatus::Failed;
                outcome.error = Some(NodeError::TokenLost {
                    paragraph: walked.index,
                    token,
                });
            } else if corrected == original {
                debug!("Paragraph {}: already correct", walked.index);
                outcome.status = ParagraphStatus::Unchanged;
            } else {
                debug!(
                    "Paragraph {}: rewriting {} runs",
                    walked.index,
                    walked.para.runs.len()
                );
                redistribute(walked, xml, &corrected, config.apply_markup, edits);
                outcome.status = ParagraphStatus::Corrected;
            }
        }
    }

    outcome.duration_ms = started.elapsed().as_millis() as u64;
    outcome
}

/// Replace the paragraph's text runs with rebuilt runs carrying `corrected`.
fn redistribute(
    walked: &WalkedParagraph<'_>,
    xml: &str,
    corrected: &str,
    apply_markup: bool,
    edits: &mut EditSet,
) {
    let runs = &walked.para.runs;
    let Some(donor_idx) = runs
        .iter()
        .position(|r| matches!(r.content, RunContent::Text(_)))
    else {
        // Non-empty text implies a text run; guard anyway, never panic here.
        return;
    };

    let base_rpr = runs[donor_idx].rpr.map(|span| &xml[span.range()]);
    let segments = if apply_markup {
        markup::parse_segments(corrected)
    } else {
        vec![Segment::plain(corrected)]
    };

    let mut replacement = String::new();
    for segment in &segments {
        replacement.push_str(&run_xml(base_rpr, segment.style, &segment.text));
    }

    edits.replace(runs[donor_idx].span.range(), replacement);
    for (idx, run) in runs.iter().enumerate() {
        if idx != donor_idx {
            if let RunContent::Text(_) = run.content {
                edits.delete(run.span.range());
            }
        }
    }
}

/// Trim the oracle reply and unwrap a whole-reply code fence.
fn sanitize_reply(reply: &str) -> String {
    let trimmed = reply.trim();
    if let Some(caps) = RE_OUTER_FENCE.captures(trimmed) {
        if let Some(inner) = caps.get(1) {
            return inner.as_str().trim().to_string();
        }
    }
    trimmed.to_string()
}

/// First `[[...]]` token of `input` missing from `output`, if any.
fn lost_token(input: &str, output: &str) -> Option<String> {
    for token in MEDIA_TOKEN.find_iter(input) {
        if !output.contains(token.as_str()) {
            return Some(token.as_str().to_string());
        }
    }
    None
}
