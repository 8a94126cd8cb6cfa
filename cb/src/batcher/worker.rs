//! BatchWorker trait definition

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;
use tracing::debug;

/// Bulk-processing capability supplied by the caller
///
/// Given the arguments of one batch, in claim order, the worker must return
/// exactly one result per argument at the same position, or fail as a whole.
/// The batcher never retries or validates arguments on the worker's behalf.
#[async_trait]
pub trait BatchWorker<A, V>: Send + Sync {
    /// Error returned when the whole batch fails
    type Error: Send + Sync + 'static;

    /// Process one batch of arguments
    async fn process(&self, args: Vec<A>) -> Result<Vec<V>, Self::Error>;

    /// Name used when reporting contract violations
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Adapter turning an async closure into a [`BatchWorker`]
pub struct WorkerFn<F, A> {
    name: String,
    func: F,
    _args: PhantomData<fn(A)>,
}

/// Wrap `func` as a named worker
pub fn worker_fn<F, A>(name: impl Into<String>, func: F) -> WorkerFn<F, A> {
    let name = name.into();
    debug!(%name, "worker_fn: called");
    WorkerFn {
        name,
        func,
        _args: PhantomData,
    }
}

impl<F, A> fmt::Debug for WorkerFn<F, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerFn").field("name", &self.name).finish_non_exhaustive()
    }
}

#[async_trait]
impl<F, Fut, A, V, E> BatchWorker<A, V> for WorkerFn<F, A>
where
    F: Fn(Vec<A>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<V>, E>> + Send,
    A: Send + 'static,
    V: Send + 'static,
    E: Send + Sync + 'static,
{
    type Error = E;

    async fn process(&self, args: Vec<A>) -> Result<Vec<V>, E> {
        debug!(worker = %self.name, batch_size = args.len(), "WorkerFn::process: called");
        (self.func)(args).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}
