//! Batcher implementation

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::FutureExt;
use futures::future::{TryJoinAll, try_join_all};
use tracing::{debug, warn};

use super::config::BatcherConfig;
use super::error::BatchError;
use super::outcome::{self, Outcome, Settler};
use super::worker::BatchWorker;

/// Combined future returned by [`Batcher::submit_all`]
pub type BatchResults<V, E> = TryJoinAll<Outcome<V, E>>;

type Matcher<A> = dyn Fn(&A, &A) -> bool + Send + Sync;

/// A submitted request not yet claimed by a dispatch cycle
struct PendingRequest<A, V, E> {
    args: A,
    outcome: Outcome<V, E>,
    settler: Settler<V, E>,
}

/// Internal state protected by mutex
struct BatcherState<A, V, E> {
    /// FIFO queue of unclaimed requests
    waiting: VecDeque<PendingRequest<A, V, E>>,

    /// Arguments and outcomes of the batch currently at the worker
    active: Vec<(A, Outcome<V, E>)>,

    /// True exactly while a worker call is pending
    in_flight: bool,
}

struct BatcherInner<W, A, V>
where
    W: BatchWorker<A, V>,
{
    worker: W,
    config: BatcherConfig,
    matcher: Box<Matcher<A>>,
    state: Mutex<BatcherState<A, V, W::Error>>,
}

/// The Batcher coalesces individually submitted requests into
/// size-bounded worker calls, one call in flight at a time.
///
/// Clones share the same queue. Dispatch cycles run as Tokio tasks on the
/// runtime of the submitting caller. A submission made outside any runtime
/// is queued but not dispatched; it is claimed by the first cycle started
/// from a later submission inside a runtime.
pub struct Batcher<W, A, V>
where
    W: BatchWorker<A, V>,
{
    inner: Arc<BatcherInner<W, A, V>>,
}

impl<W, A, V> Clone for Batcher<W, A, V>
where
    W: BatchWorker<A, V>,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<W, A, V> Batcher<W, A, V>
where
    W: BatchWorker<A, V> + 'static,
    A: Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a batcher that coalesces structurally equal arguments
    pub fn new(worker: W, config: BatcherConfig) -> Self
    where
        A: PartialEq,
    {
        Self::with_matcher(worker, config, |a: &A, b: &A| a == b)
    }

    /// Create a batcher with a custom predicate deciding which arguments coalesce
    pub fn with_matcher<M>(worker: W, config: BatcherConfig, matcher: M) -> Self
    where
        M: Fn(&A, &A) -> bool + Send + Sync + 'static,
    {
        debug!(?config, worker = %worker.name(), "Batcher::with_matcher: called");
        Self {
            inner: Arc::new(BatcherInner {
                worker,
                config,
                matcher: Box::new(matcher),
                state: Mutex::new(BatcherState {
                    waiting: VecDeque::new(),
                    active: Vec::new(),
                    in_flight: false,
                }),
            }),
        }
    }

    /// Get the configuration this batcher was built with
    pub fn config(&self) -> &BatcherConfig {
        &self.inner.config
    }

    /// Submit one request
    ///
    /// Returns the outcome of an already pending request with equal arguments
    /// if there is one. Otherwise the request is queued and a dispatch cycle
    /// is triggered. Fails immediately if the queue is full.
    pub fn submit(&self, args: A) -> Result<Outcome<V, W::Error>, BatchError<W::Error>> {
        debug!("Batcher::submit: called");
        let mut state = self.inner.lock();

        if let Some(outcome) = self.inner.find_pending(&state, &args) {
            debug!("Batcher::submit: equal request pending, coalescing");
            return Ok(outcome);
        }

        let capacity = self.inner.config.max_queue_size;
        if state.waiting.len() >= capacity {
            debug!(capacity, "Batcher::submit: queue full, rejecting");
            return Err(BatchError::CapacityExceeded {
                capacity,
                queued: state.waiting.len(),
                requested: 1,
            });
        }

        let (settler, outcome) = outcome::channel();
        state.waiting.push_back(PendingRequest {
            args,
            outcome: outcome.clone(),
            settler,
        });
        debug!(queued = state.waiting.len(), "Batcher::submit: queued");
        drop(state);

        self.inner.dispatch();
        Ok(outcome)
    }

    /// Submit several requests and wait for all of them
    ///
    /// Admission is checked against the current queue depth before anything
    /// is queued. The returned future yields results in input order and fails
    /// as soon as any one request fails; the remaining requests still run.
    pub fn submit_all<I>(&self, args: I) -> Result<BatchResults<V, W::Error>, BatchError<W::Error>>
    where
        I: IntoIterator<Item = A>,
    {
        let args: Vec<A> = args.into_iter().collect();
        debug!(count = args.len(), "Batcher::submit_all: called");

        {
            let state = self.inner.lock();
            let capacity = self.inner.config.max_queue_size;
            if state.waiting.len().saturating_add(args.len()) > capacity {
                debug!(capacity, "Batcher::submit_all: queue near capacity, rejecting");
                return Err(BatchError::CapacityExceeded {
                    capacity,
                    queued: state.waiting.len(),
                    requested: args.len(),
                });
            }
        }

        let outcomes = args
            .into_iter()
            .map(|a| self.submit(a))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(try_join_all(outcomes))
    }
}

impl<W, A, V> BatcherInner<W, A, V>
where
    W: BatchWorker<A, V> + 'static,
    A: Clone + Send + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn lock(&self) -> MutexGuard<'_, BatcherState<A, V, W::Error>> {
        // State is only mutated in short non-panicking sections
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Find a pending request with matching arguments, in flight first
    fn find_pending(&self, state: &BatcherState<A, V, W::Error>, args: &A) -> Option<Outcome<V, W::Error>> {
        state
            .active
            .iter()
            .find(|(pending, _)| (self.matcher)(args, pending))
            .map(|(_, outcome)| outcome.clone())
            .or_else(|| {
                state
                    .waiting
                    .iter()
                    .find(|request| (self.matcher)(args, &request.args))
                    .map(|request| request.outcome.clone())
            })
    }

    /// Start a dispatch cycle unless one is already in flight
    ///
    /// Outside a Tokio runtime nothing is claimed; the queue waits for the
    /// next submission made inside one.
    fn dispatch(self: &Arc<Self>) {
        debug!("BatcherInner::dispatch: called");
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("BatcherInner::dispatch: no tokio runtime, leaving requests queued");
            return;
        };
        let batch = {
            let mut state = self.lock();
            if state.in_flight {
                debug!("BatcherInner::dispatch: cycle in flight, skipping");
                return;
            }
            if state.waiting.is_empty() {
                debug!("BatcherInner::dispatch: queue empty, nothing to claim");
                return;
            }

            let take = self.config.max_batch_size.max(1).min(state.waiting.len());
            let batch: Vec<_> = state.waiting.drain(..take).collect();
            state.active = batch.iter().map(|r| (r.args.clone(), r.outcome.clone())).collect();
            state.in_flight = true;
            debug!(claimed = take, remaining = state.waiting.len(), "BatcherInner::dispatch: claimed batch");
            batch
        };

        let inner = Arc::clone(self);
        handle.spawn(inner.run_cycle(batch));
    }

    /// Run one claimed batch through the worker and settle every request
    async fn run_cycle(self: Arc<Self>, batch: Vec<PendingRequest<A, V, W::Error>>) {
        let expected = batch.len();
        debug!(batch_size = expected, "BatcherInner::run_cycle: called");

        let (args, settlers): (Vec<A>, Vec<_>) = batch.into_iter().map(|r| (r.args, r.settler)).unzip();
        // The call itself happens inside the guard so a worker that panics
        // before handing back its future is caught too
        let worker = &self.worker;
        let result = AssertUnwindSafe(async move { worker.process(args).await })
            .catch_unwind()
            .await;

        let more = {
            let mut state = self.lock();
            state.active.clear();
            state.in_flight = false;
            !state.waiting.is_empty()
        };

        match result {
            Ok(Ok(values)) if values.len() == expected => {
                debug!(batch_size = expected, "BatcherInner::run_cycle: resolving batch");
                for (settler, value) in settlers.into_iter().zip(values) {
                    settler.resolve(value);
                }
            }
            Ok(Ok(values)) => {
                warn!(
                    worker = %self.worker.name(),
                    expected,
                    actual = values.len(),
                    "Batch worker returned wrong number of results"
                );
                let err = BatchError::ContractViolation {
                    worker: self.worker.name().to_string(),
                    expected,
                    actual: values.len(),
                };
                reject_all(settlers, &err);
            }
            Ok(Err(err)) => {
                debug!(batch_size = expected, "BatcherInner::run_cycle: worker failed, rejecting batch");
                reject_all(settlers, &BatchError::Worker(Arc::new(err)));
            }
            Err(_) => {
                warn!(worker = %self.worker.name(), "Batch worker panicked");
                let err = BatchError::WorkerPanicked {
                    worker: self.worker.name().to_string(),
                };
                reject_all(settlers, &err);
            }
        }

        if more {
            let delay = self.config.delay();
            debug!(?delay, "BatcherInner::run_cycle: queue non-empty, scheduling next cycle");
            if delay.is_zero() {
                tokio::task::yield_now().await;
            } else {
                tokio::time::sleep(delay).await;
            }
            self.dispatch();
        }
    }
}

fn reject_all<V, E>(settlers: Vec<Settler<V, E>>, err: &BatchError<E>) {
    for settler in settlers {
        settler.reject(err.clone());
    }
}

impl<W, A, V> Drop for BatcherInner<W, A, V>
where
    W: BatchWorker<A, V>,
{
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if !state.waiting.is_empty() {
            debug!(
                dropped = state.waiting.len(),
                "BatcherInner::drop: unclaimed requests dropped"
            );
        }
    }
}
