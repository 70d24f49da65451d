use std::collections::TryReserveError;

use thiserror::Error;

/// Errors reported by [`RbTree`](crate::RbTree) and its cursors.
///
/// Lookup misses are not errors: they come back as the end cursor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// A cursor at the end position was dereferenced.
    #[error("cursor is at the end position and has no value")]
    NoPosition,
    /// A position refers to a node that has since been erased.
    #[error("position refers to a node that is no longer in the tree")]
    StalePosition,
    /// The node arena could not grow to hold a new node.
    #[error("node allocation failed: {0}")]
    AllocationFailed(#[from] TryReserveError),
    /// Structural verification found a broken invariant.
    #[error("tree invariant violated: {0}")]
    Invariant(String),
}
