//! Batcher error types

use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced to the caller that owns a request
///
/// `E` is the worker's own error type. It is held behind an `Arc` so every
/// request in a failed batch receives the very same error value.
#[derive(Debug, Error)]
pub enum BatchError<E> {
    #[error("Queue is at max capacity ({capacity}), unable to add {requested} additional item(s) to {queued} queued")]
    CapacityExceeded {
        capacity: usize,
        queued: usize,
        requested: usize,
    },

    #[error("Assertion error: batch worker {worker} returned {actual} results for a batch of {expected}")]
    ContractViolation {
        worker: String,
        expected: usize,
        actual: usize,
    },

    #[error(transparent)]
    Worker(Arc<E>),

    #[error("Batch worker {worker} panicked")]
    WorkerPanicked { worker: String },

    #[error("Request dropped before it was settled")]
    Dropped,
}

impl<E> BatchError<E> {
    /// Check if this is a synchronous admission failure
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self, BatchError::CapacityExceeded { .. })
    }

    /// Check if the worker broke the one-result-per-argument contract
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, BatchError::ContractViolation { .. })
    }

    /// Get the worker's own error, if this is a propagated worker failure
    pub fn worker_error(&self) -> Option<&E> {
        match self {
            BatchError::Worker(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

// Manual impl: cloning never needs `E: Clone` since the worker error is shared.
impl<E> Clone for BatchError<E> {
    fn clone(&self) -> Self {
        match self {
            BatchError::CapacityExceeded {
                capacity,
                queued,
                requested,
            } => BatchError::CapacityExceeded {
                capacity: *capacity,
                queued: *queued,
                requested: *requested,
            },
            BatchError::ContractViolation {
                worker,
                expected,
                actual,
            } => BatchError::ContractViolation {
                worker: worker.clone(),
                expected: *expected,
                actual: *actual,
            },
            BatchError::Worker(err) => BatchError::Worker(Arc::clone(err)),
            BatchError::WorkerPanicked { worker } => BatchError::WorkerPanicked { worker: worker.clone() },
            BatchError::Dropped => BatchError::Dropped,
        }
    }
}
