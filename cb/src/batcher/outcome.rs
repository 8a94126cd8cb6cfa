//! Single-resolution request outcomes
//!
//! Each pending request owns one [`Settler`] and hands out clones of one
//! [`Outcome`]. The settler is consumed when used, so an outcome can be
//! settled at most once; every clone observes the same result.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::channel::oneshot;
use futures::future::Shared;
use tracing::debug;

use super::error::BatchError;

type Settlement<V, E> = Result<V, BatchError<E>>;

/// Create a linked settler/outcome pair
pub(crate) fn channel<V: Clone, E>() -> (Settler<V, E>, Outcome<V, E>) {
    let (tx, rx) = oneshot::channel();
    (Settler { tx }, Outcome { rx: rx.shared() })
}

/// The capability to settle one outcome
pub(crate) struct Settler<V, E> {
    tx: oneshot::Sender<Settlement<V, E>>,
}

impl<V, E> Settler<V, E> {
    /// Resolve the outcome with a value
    pub(crate) fn resolve(self, value: V) {
        self.settle(Ok(value));
    }

    /// Reject the outcome with an error
    pub(crate) fn reject(self, err: BatchError<E>) {
        self.settle(Err(err));
    }

    fn settle(self, settlement: Settlement<V, E>) {
        // Every caller may have stopped listening; nothing to deliver then
        if self.tx.send(settlement).is_err() {
            debug!("Settler::settle: no outcome left listening");
        }
    }
}

impl<V, E> fmt::Debug for Settler<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settler")
            .field("canceled", &self.tx.is_canceled())
            .finish()
    }
}

/// A cloneable future resolving to one request's result
///
/// Callers whose submissions were coalesced receive clones of the same
/// outcome. Dropping an outcome never cancels the underlying request.
pub struct Outcome<V, E> {
    rx: Shared<oneshot::Receiver<Settlement<V, E>>>,
}

impl<V: Clone, E> Outcome<V, E> {
    /// Check whether two handles refer to the same pending request
    pub fn ptr_eq(&self, other: &Self) -> bool {
        self.rx.ptr_eq(&other.rx)
    }
}

impl<V, E> Clone for Outcome<V, E> {
    fn clone(&self) -> Self {
        Self { rx: self.rx.clone() }
    }
}

impl<V, E> fmt::Debug for Outcome<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outcome").finish_non_exhaustive()
    }
}

impl<V: Clone, E> Future for Outcome<V, E> {
    type Output = Settlement<V, E>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.rx.poll_unpin(cx) {
            Poll::Ready(Ok(settlement)) => Poll::Ready(settlement),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(BatchError::Dropped)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_resolve_reaches_every_clone() {
        let (settler, outcome) = channel::<u32, String>();
        let other = outcome.clone();
        assert!(outcome.ptr_eq(&other));

        settler.resolve(7);

        assert_eq!(outcome.await.unwrap(), 7);
        assert_eq!(other.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_reject_carries_error() {
        let (settler, outcome) = channel::<u32, String>();
        settler.reject(BatchError::ContractViolation {
            worker: "w".to_string(),
            expected: 2,
            actual: 1,
        });

        let err = outcome.await.unwrap_err();
        assert!(err.is_contract_violation());
    }

    #[tokio::test]
    async fn test_dropped_settler_rejects_as_dropped() {
        let (settler, outcome) = channel::<u32, String>();
        drop(settler);

        assert!(matches!(outcome.await, Err(BatchError::Dropped)));
    }

    #[test]
    fn test_settle_without_listeners_is_quiet() {
        let (settler, outcome) = channel::<u32, String>();
        drop(outcome);
        settler.resolve(1);
    }

    #[test]
    fn test_distinct_pairs_are_not_ptr_eq() {
        let (_s1, a) = channel::<u32, String>();
        let (_s2, b) = channel::<u32, String>();
        assert!(!a.ptr_eq(&b));
    }
}
