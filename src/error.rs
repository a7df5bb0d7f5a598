use thiserror::Error;

/// Failure taxonomy for one analysis or chat invocation. Every variant is
/// fatal to the invocation that raised it; retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("upload failed: {0}")]
    Upload(String),

    #[error("file status check failed: {0}")]
    Poll(String),

    #[error("remote processing failed: {0}")]
    RemoteProcessing(String),

    #[error("file processing timed out after {0} status checks")]
    Timeout(usize),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("malformed diagnosis response: {0}")]
    Schema(String),

    #[error("analysis cancelled")]
    Cancelled,
}
