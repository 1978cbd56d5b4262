//! Concurrent read-modify-write benchmark driver.
//!
//! A [`Coordinator`] opens one store connection per worker, runs a fixed
//! pool of [`Worker`]s for a fixed duration and sums their success
//! counters after a bounded join.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod mutator;
pub mod rng;
pub mod worker;

pub use config::{AbandonPolicy, BenchConfig};
pub use coordinator::{Coordinator, RunSummary, WorkerResult, WorkerStatus};
pub use error::{BenchError, MutateError};
pub use mutator::{RecordMutator, shuffle_str};
pub use rng::Rng;
pub use worker::{StopReason, Worker, WorkerExit, WorkerProgress};
