//! Error types for coin storage operations.

use bitcoin::{OutPoint, Txid};

/// Errors that can occur across the store layers.
///
/// [`Error::NotFound`] and [`Error::AlreadySpent`] are expected runtime
/// conditions, surfaced to the caller and never retried here.
/// [`Error::Codec`] and [`Error::UndoInconsistent`] indicate corrupted data
/// or a caller contract violation and are fatal for the operation.
/// [`Error::Backend`] wraps whatever the backing store reported, unchanged.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No entry for this transaction id in the overlay or any backend.
    #[error("coins for {0} not found")]
    NotFound(Txid),

    /// The target output is already spent; the entry was left unchanged.
    #[error("output {0} is already spent")]
    AlreadySpent(OutPoint),

    /// Undo data does not match the current state of the store.
    #[error("undo data inconsistent with the store: {0}")]
    UndoInconsistent(&'static str),

    /// Encoding or decoding a coin entry failed.
    #[error(transparent)]
    Codec(#[from] coinstack_coins::Error),

    /// The backing store failed; flush leaves the overlay untouched so the
    /// caller may retry.
    #[error("backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wrap a backend-specific error for propagation through the store
    /// layers.
    pub fn backend(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Backend(err.into())
    }
}
