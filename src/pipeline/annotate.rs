//! Inline image annotation: describe each embedded picture and insert the
//! description as a new paragraph right after the picture's paragraph.
//!
//! ## Why reverse document order?
//!
//! Every insertion offset comes from the span tree and must stay valid
//! until the splice set is applied. Descriptions are recorded from the last
//! image to the first: with the splice set's same-offset rule (recorded
//! later lands earlier), two pictures in one paragraph still get their
//! descriptions in document order.
//!
//! ## Degradation
//!
//! Description is best-effort per image. A missing relationship, an
//! undecodable EMF, or a failed vision call inserts the placeholder
//! paragraph instead, so the reader always sees that a picture was there —
//! the run itself is never touched.

use crate::config::CorrectionConfig;
use crate::docx::build::description_paragraph_xml;
use crate::docx::edit::EditSet;
use crate::docx::package::{DocxPackage, Relationship};
use crate::docx::tree::RunContent;
use crate::error::NodeError;
use crate::oracle::{CorrectionOracle, ImagePayload};
use crate::output::ImageOutcome;
use crate::pipeline::encode;
use crate::pipeline::walker::WalkedParagraph;
use crate::prompts::IMAGE_PLACEHOLDER;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One image run occurrence, with everything needed to describe it.
struct ImageSite {
    ordinal: usize,
    paragraph: usize,
    location: String,
    rel_id: Option<String>,
    insert_at: usize,
    context: String,
}

/// Describe every image run and record the description insertions.
///
/// Returns per-image outcomes in document order.
pub async fn annotate_images(
    walk: &[WalkedParagraph<'_>],
    package: &DocxPackage,
    oracle: &dyn CorrectionOracle,
    config: &CorrectionConfig,
    edits: &mut EditSet,
) -> Vec<ImageOutcome> {
    let mut sites = Vec::new();
    for (walk_pos, wp) in walk.iter().enumerate() {
        for run in wp.para.image_runs() {
            let rel_id = match &run.content {
                RunContent::Image { rel_id } => rel_id.clone(),
                RunContent::Text(_) => None,
            };
            sites.push(ImageSite {
                ordinal: sites.len(),
                paragraph: wp.index,
                location: wp.location.clone(),
                rel_id,
                insert_at: wp.para.span.end,
                context: context_window(walk, walk_pos, config.context_chars),
            });
        }
    }
    if sites.is_empty() {
        debug!("No image runs to annotate");
        return Vec::new();
    }

    info!("Describing {} embedded images", sites.len());
    let rels = package.relationships().unwrap_or_else(|e| {
        warn!("Relationship table unreadable, all images get placeholders: {e}");
        HashMap::new()
    });

    let total = sites.len();
    let mut outcomes = Vec::with_capacity(total);

    for site in sites.iter().rev() {
        let started = Instant::now();
        let mut outcome = ImageOutcome {
            index: site.ordinal,
            paragraph: site.paragraph,
            location: site.location.clone(),
            described: false,
            prompt_tokens: 0,
            completion_tokens: 0,
            duration_ms: 0,
            error: None,
        };

        let description = match resolve_payload(site, &rels, package) {
            Err(node_err) => {
                warn!("Image {} ({}): {node_err}", site.ordinal, site.location);
                outcome.error = Some(node_err);
                IMAGE_PLACEHOLDER.to_string()
            }
            Ok(payload) => match oracle.describe_image(&payload, &site.context).await {
                Ok(reply) => {
                    outcome.prompt_tokens = reply.prompt_tokens;
                    outcome.completion_tokens = reply.completion_tokens;
                    let text = reply.text.trim().to_string();
                    if text.is_empty() {
                        outcome.error = Some(NodeError::DescriptionFailed {
                            image: site.ordinal,
                            paragraph: site.paragraph,
                            detail: "model returned an empty description".to_string(),
                        });
                        IMAGE_PLACEHOLDER.to_string()
                    } else {
                        outcome.described = true;
                        text
                    }
                }
                Err(e) => {
                    warn!(
                        "Image {} ({}): description failed: {e}",
                        site.ordinal, site.location
                    );
                    outcome.error = Some(NodeError::DescriptionFailed {
                        image: site.ordinal,
                        paragraph: site.paragraph,
                        detail: e.to_string(),
                    });
                    IMAGE_PLACEHOLDER.to_string()
                }
            },
        };

        edits.insert(site.insert_at, description_paragraph_xml(&description));
        outcome.duration_ms = started.elapsed().as_millis() as u64;

        if let Some(callback) = &config.progress_callback {
            callback.on_image_complete(site.ordinal, total, outcome.described);
        }
        outcomes.push(outcome);
    }

    // Executed back to front; report in document order.
    outcomes.sort_by_key(|o| o.index);
    outcomes
}

/// Resolve the image run to a vision payload via the relationship table.
fn resolve_payload(
    site: &ImageSite,
    rels: &HashMap<String, Relationship>,
    package: &DocxPackage,
) -> Result<ImagePayload, NodeError> {
    let unavailable = |detail: String| NodeError::MediaUnavailable {
        image: site.ordinal,
        paragraph: site.paragraph,
        detail,
    };

    let rel_id = site
        .rel_id
        .as_deref()
        .ok_or_else(|| unavailable("image run carries no relationship id".to_string()))?;
    let rel = rels
        .get(rel_id)
        .ok_or_else(|| unavailable(format!("'{rel_id}' not in relationship table")))?;
    let bytes = package
        .media(&rel.target)
        .ok_or_else(|| unavailable(format!("media part '{}' not found", rel.target)))?;
    encode::prepare_image(bytes).map_err(|e| unavailable(e.to_string()))
}

/// Sibling text around the image's paragraph, for the vision prompt.
///
/// Previous and next paragraph count only when they live in the same
/// container — a picture in a table cell never borrows context from the
/// body or from a neighbouring cell.
fn context_window(walk: &[WalkedParagraph<'_>], at: usize, budget: usize) -> String {
    let current = &walk[at];
    let mut parts = Vec::new();

    if at > 0 {
        let prev = &walk[at - 1];
        if prev.container == current.container {
            parts.push(clip(&prev.para.text(), budget));
        }
    }
    parts.push(clip(&current.para.text(), budget));
    if let Some(next) = walk.get(at + 1) {
        if next.container == current.container {
            parts.push(clip(&next.para.text(), budget));
        }
    }

    parts.retain(|p| !p.is_empty());
    parts.join("\n\n")
}

fn clip(text: &str, budget: usize) -> String {
    text.trim().chars().take(budget).collect()
}
