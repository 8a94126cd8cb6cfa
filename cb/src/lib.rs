//! Coalesce - request-coalescing batch scheduler
//!
//! Turns "one call per item" call patterns (per-key lookups, per-id fetches)
//! into "one call per group" without callers having to coordinate. Callers
//! submit items one at a time; a [`Batcher`] queues them and hands them to a
//! caller-supplied [`BatchWorker`] in size-bounded groups, then fans each
//! group's results back out to the original callers.
//!
//! # Core Concepts
//!
//! - **Single-flight**: at most one worker call is outstanding per batcher
//! - **Coalescing**: equal arguments submitted while pending share one outcome
//! - **FIFO claiming**: the queue is drained front-first, `max_batch_size` at a time
//! - **Whole-batch failure**: a failed worker call rejects every request in its batch
//!
//! # Example
//!
//! ```ignore
//! use coalesce::{Batcher, BatcherConfig, worker_fn};
//!
//! let worker = worker_fn("lookup", |ids: Vec<u64>| async move {
//!     Ok::<_, std::io::Error>(db.fetch_many(&ids).await)
//! });
//! let batcher = Batcher::new(worker, BatcherConfig::default());
//!
//! let user = batcher.submit(42)?.await?;
//! let users = batcher.submit_all(vec![1, 2, 3])?.await?;
//! ```
//!
//! # Modules
//!
//! - [`batcher`] - the scheduler, its worker trait, outcomes and errors
//! - [`config`] - file-backed configuration loading
//! - [`cli`] - command-line interface for the `cb` demo binary

pub mod batcher;
pub mod cli;
pub mod config;

pub use batcher::{
    BatchError, BatchResults, BatchWorker, Batcher, BatcherConfig, Outcome, WorkerFn, worker_fn,
};
pub use config::Config;

/// Default maximum number of requests handed to one worker call
pub const DEFAULT_MAX_BATCH_SIZE: usize = 50;

/// Default maximum number of unclaimed requests (effectively unbounded)
pub const DEFAULT_MAX_QUEUE_SIZE: usize = usize::MAX;

/// Default delay between dispatch cycles in milliseconds
pub const DEFAULT_DELAY_MS: u64 = 0;
