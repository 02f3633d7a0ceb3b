use std::io;

use thiserror::Error;

/// Failures surfaced by [`ReadingStore`](super::ReadingStore) operations.
///
/// All variants are recoverable at the request / generator-cycle level.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The submitted reading is not a field/value mapping. State is untouched.
    #[error("invalid reading: {0}")]
    InvalidInput(String),

    /// No reading has been accepted yet.
    #[error("no reading available")]
    NotFound,

    /// The backing storage rejected the write. State is untouched.
    #[error("storage fault while {action}: {source}")]
    StorageFault {
        action: &'static str,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    pub(crate) fn storage(action: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::StorageFault { action, source }
    }
}
