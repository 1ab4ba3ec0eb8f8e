//! Deferred byte-range splices against the document XML.
//!
//! ## Why defer?
//!
//! The span tree records byte offsets into the original XML. Splicing while
//! walking would shift every offset after the splice point and invalidate
//! the rest of the tree. Instead, pipeline stages record their edits here
//! and the whole set is applied in one pass, back to front, so each splice
//! leaves all not-yet-applied offsets intact.
//!
//! Ordering at a shared offset is deliberate: the sort is stable and
//! application is sequential, so of two insertions at the same point the
//! one recorded *later* ends up *earlier* in the output. The image
//! annotator records insertions in reverse document order and relies on
//! exactly this to get same-paragraph descriptions out in document order.

use crate::error::DocxProofError;
use std::ops::Range;

#[derive(Debug, Clone)]
struct Edit {
    range: Range<usize>,
    replacement: String,
}

/// An ordered collection of splices, applied with [`EditSet::apply`].
#[derive(Debug, Default)]
pub struct EditSet {
    edits: Vec<Edit>,
}

impl EditSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// Replace the bytes in `range` with `replacement`.
    pub fn replace(&mut self, range: Range<usize>, replacement: impl Into<String>) {
        debug_assert!(range.start <= range.end);
        self.edits.push(Edit {
            range,
            replacement: replacement.into(),
        });
    }

    /// Remove the bytes in `range`.
    pub fn delete(&mut self, range: Range<usize>) {
        self.replace(range, String::new());
    }

    /// Insert `content` at byte offset `at`.
    pub fn insert(&mut self, at: usize, content: impl Into<String>) {
        self.replace(at..at, content);
    }

    /// Apply every recorded splice to `xml` and return the edited string.
    ///
    /// Edits must not overlap; an insertion sharing an offset with another
    /// edit's boundary is fine. Overlaps and out-of-range edits are caller
    /// bugs and are reported as internal errors rather than silently
    /// producing scrambled XML.
    pub fn apply(mut self, xml: &str) -> Result<String, DocxProofError> {
        self.edits.sort_by(|a, b| b.range.start.cmp(&a.range.start));

        if let Some(first) = self.edits.first() {
            if first.range.end > xml.len() {
                return Err(DocxProofError::Internal(format!(
                    "edit {:?} exceeds document length {}",
                    first.range,
                    xml.len()
                )));
            }
        }
        for pair in self.edits.windows(2) {
            let (later, earlier) = (&pair[0], &pair[1]);
            if earlier.range.end > later.range.start {
                return Err(DocxProofError::Internal(format!(
                    "overlapping edits {:?} and {:?}",
                    earlier.range, later.range
                )));
            }
        }
        for edit in &self.edits {
            if !xml.is_char_boundary(edit.range.start) || !xml.is_char_boundary(edit.range.end) {
                return Err(DocxProofError::Internal(format!(
                    "edit {:?} not on a char boundary",
                    edit.range
                )));
            }
        }

        let mut out = xml.to_string();
        for edit in &self.edits {
            out.replace_range(edit.range.clone(), &edit.replacement);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_set_is_identity() {
        let out = EditSet::new().apply("<a/><b/>").expect("apply");
        assert_eq!(out, "<a/><b/>");
    }

    #[test]
    fn replace_delete_insert() {
        //                0123456789
        let xml = "aaabbbccc";
        let mut edits = EditSet::new();
        edits.replace(3..6, "B");
        edits.delete(6..9);
        edits.insert(0, ">");
        let out = edits.apply(xml).expect("apply");
        assert_eq!(out, ">aaaB");
    }

    #[test]
    fn offsets_recorded_forward_apply_backward() {
        let xml = "0123456789";
        let mut edits = EditSet::new();
        // Recorded in document order; earlier edits change lengths.
        edits.replace(0..2, "xxxx");
        edits.replace(5..7, "");
        edits.insert(9, "!");
        let out = edits.apply(xml).expect("apply");
        assert_eq!(out, "xxxx23478!9");
    }

    #[test]
    fn later_recorded_insertion_lands_earlier() {
        // Recording in reverse document order puts same-point insertions
        // back into document order.
        let mut edits = EditSet::new();
        edits.insert(1, "2");
        edits.insert(1, "1");
        let out = edits.apply("ab").expect("apply");
        assert_eq!(out, "a12b");
    }

    #[test]
    fn insertion_at_replacement_boundary_is_allowed() {
        let mut edits = EditSet::new();
        edits.insert(5, "+");
        edits.replace(0..5, "HEAD");
        let out = edits.apply("01234rest").expect("apply");
        assert_eq!(out, "HEAD+rest");
    }

    #[test]
    fn overlap_is_rejected() {
        let mut edits = EditSet::new();
        edits.replace(0..5, "x");
        edits.replace(3..8, "y");
        let err = edits.apply("0123456789").unwrap_err();
        assert!(err.to_string().contains("overlapping"));
    }

    #[test]
    fn out_of_range_is_rejected() {
        let mut edits = EditSet::new();
        edits.replace(4..20, "x");
        assert!(edits.apply("short").is_err());
    }

    #[test]
    fn non_boundary_offset_is_rejected() {
        let mut edits = EditSet::new();
        edits.insert(1, "x");
        // 'é' is two bytes; offset 1 is inside it.
        assert!(edits.apply("é").is_err());
    }
}
