//! Notification hook – fire-and-forget events raised by the pipeline.

use std::path::Path;

/// Receives pipeline events. Implementations must not fail; anything they
/// need to report goes to the log.
pub trait Notifier: Send + Sync {
    /// A PDF was produced for document `document_id`.
    fn document_created(&self, document_id: &str, pdf: &Path);

    /// The PDF generator failed its precondition check while a document was
    /// being constructed. `error` is the operator-facing message.
    fn binary_warning(&self, error: &str);
}

/// Writes events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn document_created(&self, document_id: &str, pdf: &Path) {
        log::info!("Document {document_id} created: {}", pdf.display());
    }

    fn binary_warning(&self, error: &str) {
        log::warn!("PDF generator binary is unusable: {error}");
    }
}
