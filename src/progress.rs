//! Progress-callback trait for per-node correction events.
//!
//! Inject an [`Arc<dyn CorrectionProgressCallback>`] via
//! [`crate::config::CorrectionConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline works through a document.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a Tokio broadcast channel, a WebSocket, a database record,
//! or a terminal progress bar — without the library knowing anything about how
//! the host application communicates. The trait is `Send + Sync` so one
//! callback can be shared across documents when the caller processes several
//! concurrently.
//!
//! # Example
//!
//! ```rust
//! use docx_proof::{CorrectionProgressCallback, CorrectionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     changed: Arc<AtomicUsize>,
//! }
//!
//! impl CorrectionProgressCallback for CountingCallback {
//!     fn on_paragraph_complete(&self, index: usize, total: usize, changed: bool) {
//!         if changed {
//!             self.changed.fetch_add(1, Ordering::SeqCst);
//!         }
//!         eprintln!("Paragraph {}/{} done", index + 1, total);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     changed: Arc::new(AtomicUsize::new(0)),
//! });
//!
//! let config = CorrectionConfig::builder()
//!     .progress_callback(counter as Arc<dyn CorrectionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the correction pipeline as it processes each node.
///
/// Within one document the pipeline is sequential, so calls arrive in order;
/// implementations still must be `Send + Sync` because a single callback may
/// be shared by several documents processed concurrently by the caller. All
/// methods have default no-op implementations so callers only override what
/// they care about.
pub trait CorrectionProgressCallback: Send + Sync {
    /// Called once after the document is parsed, before any oracle call.
    ///
    /// # Arguments
    /// * `total_paragraphs` — paragraphs the walker will visit
    /// * `total_images`     — image runs the annotator will visit
    fn on_correction_start(&self, total_paragraphs: usize, total_images: usize) {
        let _ = (total_paragraphs, total_images);
    }

    /// Called just before a paragraph's text is sent to the oracle.
    ///
    /// # Arguments
    /// * `index` — 0-indexed walk position
    /// * `total` — total paragraphs in the walk
    fn on_paragraph_start(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called when a paragraph finishes (corrected, unchanged, or skipped).
    ///
    /// # Arguments
    /// * `index`   — 0-indexed walk position
    /// * `total`   — total paragraphs in the walk
    /// * `changed` — whether the paragraph text was rewritten
    fn on_paragraph_complete(&self, index: usize, total: usize, changed: bool) {
        let _ = (index, total, changed);
    }

    /// Called when a paragraph fails after all retries are exhausted.
    ///
    /// The paragraph keeps its original text; processing continues.
    ///
    /// # Arguments
    /// * `index` — 0-indexed walk position
    /// * `total` — total paragraphs in the walk
    /// * `error` — human-readable error description
    fn on_paragraph_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called when an image annotation finishes.
    ///
    /// # Arguments
    /// * `index`     — 0-indexed image position in document order
    /// * `total`     — total image runs in the document
    /// * `described` — true if the vision oracle produced a description,
    ///   false if the placeholder was inserted
    fn on_image_complete(&self, index: usize, total: usize, described: bool) {
        let _ = (index, total, described);
    }

    /// Called once after every node has been attempted.
    ///
    /// # Arguments
    /// * `total_paragraphs` — paragraphs visited
    /// * `corrected`        — paragraphs whose text was rewritten
    fn on_correction_complete(&self, total_paragraphs: usize, corrected: usize) {
        let _ = (total_paragraphs, corrected);
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl CorrectionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::CorrectionConfig`].
pub type ProgressCallback = Arc<dyn CorrectionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingCallback {
        starts: Arc<AtomicUsize>,
        completes: Arc<AtomicUsize>,
        errors: Arc<AtomicUsize>,
        images: Arc<AtomicUsize>,
        walk_total: Arc<AtomicUsize>,
        corrected_total: Arc<AtomicUsize>,
    }

    impl CorrectionProgressCallback for TrackingCallback {
        fn on_correction_start(&self, total_paragraphs: usize, _total_images: usize) {
            self.walk_total.store(total_paragraphs, Ordering::SeqCst);
        }

        fn on_paragraph_start(&self, _index: usize, _total: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_paragraph_complete(&self, _index: usize, _total: usize, _changed: bool) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_paragraph_error(&self, _index: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_image_complete(&self, _index: usize, _total: usize, _described: bool) {
            self.images.fetch_add(1, Ordering::SeqCst);
        }

        fn on_correction_complete(&self, _total_paragraphs: usize, corrected: usize) {
            self.corrected_total.store(corrected, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_correction_start(5, 1);
        cb.on_paragraph_start(0, 5);
        cb.on_paragraph_complete(0, 5, true);
        cb.on_paragraph_error(1, 5, "some error");
        cb.on_image_complete(0, 1, false);
        cb.on_correction_complete(5, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback {
            starts: Arc::new(AtomicUsize::new(0)),
            completes: Arc::new(AtomicUsize::new(0)),
            errors: Arc::new(AtomicUsize::new(0)),
            images: Arc::new(AtomicUsize::new(0)),
            walk_total: Arc::new(AtomicUsize::new(0)),
            corrected_total: Arc::new(AtomicUsize::new(0)),
        };

        tracker.on_correction_start(3, 2);
        assert_eq!(tracker.walk_total.load(Ordering::SeqCst), 3);

        tracker.on_paragraph_start(0, 3);
        tracker.on_paragraph_complete(0, 3, true);
        tracker.on_paragraph_start(1, 3);
        tracker.on_paragraph_complete(1, 3, false);
        tracker.on_paragraph_start(2, 3);
        tracker.on_paragraph_error(2, 3, "oracle timeout");
        tracker.on_image_complete(0, 2, true);
        tracker.on_image_complete(1, 2, false);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 3);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.images.load(Ordering::SeqCst), 2);

        tracker.on_correction_complete(3, 1);
        assert_eq!(tracker.corrected_total.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn CorrectionProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_correction_start(10, 0);
        cb.on_paragraph_start(0, 10);
        cb.on_paragraph_complete(0, 10, false);
    }
}
