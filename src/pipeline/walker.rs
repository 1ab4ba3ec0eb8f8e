//! Snapshot walk over the document tree.
//!
//! ## Traversal order
//!
//! Correction visits paragraphs in a fixed order the rest of the pipeline
//! (indices in reports, context windows, progress counters) depends on:
//! body paragraphs first, then tables in document order, each cell's direct
//! paragraphs before any table nested inside that cell. The walk is taken
//! once, up front, into a `Vec` — the tree is immutable while the pipeline
//! runs, and a snapshot gives every later stage stable indices to agree on.
//!
//! Context windows for image description are built from *siblings*: the
//! paragraphs before and after within the same container. A cell paragraph
//! never borrows context from the body or from a neighbouring cell, so each
//! walked paragraph carries its container's id.

use crate::docx::tree::{Block, DocumentTree, Paragraph};

/// One paragraph of the flattened document, with addressing metadata.
#[derive(Debug)]
pub struct WalkedParagraph<'a> {
    /// Position in the walk; the paragraph index used everywhere downstream.
    pub index: usize,
    /// Container id; paragraphs with equal ids are siblings.
    pub container: usize,
    /// Human-readable position for logs and reports,
    /// e.g. `body` or `table 0 / row 1 / cell 2`.
    pub location: String,
    pub para: &'a Paragraph,
}

/// Flatten the tree into the pipeline's paragraph sequence.
pub fn walk(tree: &DocumentTree) -> Vec<WalkedParagraph<'_>> {
    let mut out = Vec::new();
    let mut next_container = 0;
    walk_blocks(&tree.body, "body", &mut next_container, &mut out);
    out
}

fn walk_blocks<'a>(
    blocks: &'a [Block],
    location: &str,
    next_container: &mut usize,
    out: &mut Vec<WalkedParagraph<'a>>,
) {
    let container = *next_container;
    *next_container += 1;

    for block in blocks {
        if let Block::Paragraph(p) = block {
            out.push(WalkedParagraph {
                index: out.len(),
                container,
                location: location.to_string(),
                para: p,
            });
        }
    }

    let mut table_no = 0;
    for block in blocks {
        if let Block::Table(table) = block {
            for (row_no, row) in table.rows.iter().enumerate() {
                for (cell_no, cell) in row.cells.iter().enumerate() {
                    let cell_location = if location == "body" {
                        format!("table {table_no} / row {row_no} / cell {cell_no}")
                    } else {
                        format!("{location} / table {table_no} / row {row_no} / cell {cell_no}")
                    };
                    walk_blocks(&cell.blocks, &cell_location, next_container, out);
                }
            }
            table_no += 1;
        }
    }
}

/// Total number of image runs across the walk.
pub fn count_image_runs(walk: &[WalkedParagraph<'_>]) -> usize {
    walk.iter().map(|wp| wp.para.image_runs().count()).sum()
}
