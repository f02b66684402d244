//! Error types for the merge pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the merge pipeline
///
/// Every variant is terminal for the merge invocation that produced it;
/// the presentation shell shows the `Display` string and nothing is
/// retried.
#[derive(Error, Debug)]
pub enum Error {
    /// Merge requested with an empty document list
    #[error("no documents to merge")]
    EmptyInput,

    /// An input could not be opened or parsed as a PDF
    #[error("failed to read {}: {}", .path.display(), .source)]
    DocumentRead {
        path: PathBuf,
        #[source]
        source: lopdf::Error,
    },

    /// An input parsed but contains no pages
    #[error("PDF has no pages: {}", .0.display())]
    EmptyDocument(PathBuf),

    /// The scratch or final output could not be written
    #[error("failed to write {}: {}", .path.display(), .source)]
    DocumentWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The page-number overlay could not be built for a page
    #[error("failed to stamp page number {page}: {reason}")]
    OverlayRender { page: usize, reason: String },
}
