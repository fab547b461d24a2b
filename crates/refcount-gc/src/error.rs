//! Error types for reference bookkeeping.

use crate::key::ObjectKey;
use thiserror::Error;

/// Errors reported by handle access and registry operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RefError {
    /// The handle was default-constructed or moved out of.
    #[error("dereferenced an empty handle")]
    EmptyHandle,
    /// No slot holds this key, or the slot was freed and reused.
    #[error("object {0} is not registered")]
    Unregistered(ObjectKey),
    /// The object is known to the registry but its last strong handle is gone.
    #[error("object {0} has no live strong references")]
    Expired(ObjectKey),
}

/// Result type for bookkeeping operations.
pub type RefResult<T> = Result<T, RefError>;

/// Report a broken bookkeeping invariant and stop.
///
/// Used from `Drop` and `Deref`, where the error cannot be returned.
#[cold]
#[track_caller]
#[allow(clippy::panic)]
pub(crate) fn fatal(err: RefError) -> ! {
    tracing::error!(%err, "reference bookkeeping invariant violated");
    panic!("{err}")
}
