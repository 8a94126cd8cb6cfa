//! Batcher for coalescing individual requests
//!
//! Accumulates submitted requests in a single queue and dispatches them to a
//! bulk worker in size-bounded groups, one worker call at a time.

mod config;
mod core;
mod error;
mod outcome;
mod worker;

pub use config::BatcherConfig;
pub use core::{BatchResults, Batcher};
pub use error::BatchError;
pub use outcome::Outcome;
pub use worker::{BatchWorker, WorkerFn, worker_fn};
