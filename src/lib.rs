//! Bounded-concurrency batch execution for futures.
//!
//! This crate runs a finite batch of futures with a cap on how many are
//! in flight at once, and hands back every output in submission order.
//!
//! `futures::future::join_all` starts everything at once, which is a great
//! way to exhaust sockets or hammer an upstream when the batch is large.
//! A semaphore keeps the *work* bounded but still means constructing (and
//! having the runtime track) every future up front. [`Gather`] instead
//! pulls tasks lazily from an iterator: at most `max_concurrent` futures
//! exist inside the driver at any instant, the rest have not even been
//! constructed yet.
//!
//! The logic is rather simple: in-flight futures are tagged with their
//! submission index, their outputs land in per-index slots, and every
//! settlement tops the in-flight set back up from the iterator. The
//! aggregate `Vec` resolves only once the whole batch has settled, so slot
//! `i` always holds task `i`'s output no matter which task finished first.
//!
//! Failures are collected, not short-circuited: make your tasks return
//! `Result` and each slot reports its own outcome independently.
//!
//! Make sure to check out the docs for examples!
pub mod error;
pub mod scheduler;

pub use error::SchedulerError;
pub use scheduler::Gather;
