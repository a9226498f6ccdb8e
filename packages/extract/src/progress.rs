//! Batch progress.
//!
//! The batch driver reports each finished document through
//! [`ProgressCallback`] and leaves the drawing to its caller. The CLI shows
//! a document counter; tests pass [`null_progress()`].

use std::sync::Arc;

/// Told about every document a batch works through.
///
/// A batch calls it from several worker threads at once.
pub trait ProgressCallback: Send + Sync {
    /// Number of documents in the batch.
    fn set_total(&self, total: u64);

    /// `delta` more documents are done.
    fn inc(&self, delta: u64);

    /// Labels the document currently being extracted.
    fn set_message(&self, msg: String);

    /// The batch is over. `msg` summarizes it.
    fn finish(&self, msg: String);
}

/// Discards every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// A shared [`NullProgress`] for callers that show nothing.
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
