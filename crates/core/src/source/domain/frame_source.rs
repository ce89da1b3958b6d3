use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum SourceError {
    /// The source has no further frames and will not produce any without a
    /// reset. Not a fault: the caller stops advancing and keeps serving the
    /// last published frame.
    #[error("end of sequence")]
    EndOfSequence,
    #[error("failed to open {path}: {reason}")]
    Open { path: String, reason: String },
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("dataset fetch failed: {0}")]
    Fetch(#[from] super::dataset_client::DatasetError),
    #[error("dataset contains no usable images")]
    EmptyDataset,
}

impl SourceError {
    pub fn is_end_of_sequence(&self) -> bool {
        matches!(self, SourceError::EndOfSequence)
    }
}

/// Produces frames on demand for the refresh loop.
///
/// Implementations own their underlying handles (decoder contexts, fetched
/// image caches) exclusively; they are driven from a single thread at a
/// time, moving between the orchestrator and the running loop.
pub trait FrameSource: Send {
    /// Opens/prepares the underlying source and returns the first frame
    /// synchronously, so the store is never empty after a successful
    /// activation.
    fn activate(&mut self) -> Result<Frame, SourceError>;

    /// Produces the next frame in sequence.
    fn next(&mut self) -> Result<Frame, SourceError>;

    /// Releases all underlying resources. Idempotent.
    fn deactivate(&mut self);

    /// The cadence this source should be replayed at.
    fn fps(&self) -> f64;
}
