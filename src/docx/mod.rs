//! The `.docx` container and document model.
//!
//! A `.docx` file is a ZIP archive of XML parts. The body text lives in
//! `word/document.xml`; embedded pictures live under `word/media/` and are
//! wired to runs through `word/_rels/document.xml.rels`. This module owns
//! everything below the correction pipeline: archive round-trip, the span
//! tree parsed from the document XML, and splice-based editing of that XML.
//!
//! ## Data Flow
//!
//! ```text
//! bytes ──▶ package ──▶ tree ──▶ edit ──▶ package
//! (zip)     (parts)    (spans)  (splices) (rebuilt zip)
//! ```
//!
//! 1. [`package`] — ordered ZIP parts with lookups for the document XML,
//!    the relationship table, and media blobs
//! 2. [`tree`]    — read-only span tree over the document XML: paragraphs,
//!    runs, and tables, each carrying byte offsets back into the source
//! 3. [`edit`]    — deferred byte-range splices, applied back-to-front so
//!    recorded offsets stay valid while the text changes
//! 4. [`build`]   — construction of replacement WordprocessingML fragments

pub mod build;
pub mod edit;
pub mod package;
pub mod tree;
