//! Pipeline stages for document correction.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different description strategy) without
//! touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ walker ──▶ rewrite ──▶ annotate ──▶ edits
//! (URL/path) (tree)    (correct)   (describe)   (splice)
//! ```
//!
//! 1. [`input`]    — canonicalise the user-supplied path or URL to raw bytes
//! 2. [`walker`]   — flatten the span tree into the paragraph sequence the
//!    later stages iterate: body first, then table cells, tables nested-last
//! 3. [`markup`]   — parse the oracle's emphasis markers into styled segments
//! 4. [`rewrite`]  — correct one paragraph's text and redistribute it over
//!    rebuilt runs; the per-paragraph network stage
//! 5. [`encode`]   — normalise an embedded picture to base64 PNG/JPEG for
//!    the multimodal API request body
//! 6. [`annotate`] — describe embedded pictures and insert the description
//!    paragraphs, walking in reverse so recorded offsets stay valid

pub mod annotate;
pub mod encode;
pub mod input;
pub mod markup;
pub mod rewrite;
pub mod walker;
