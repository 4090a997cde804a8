//! Bounded batch driver built on `FuturesUnordered`.

use std::mem;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{FuturesUnordered, Stream};
use futures::Future;
use pin_project::pin_project;
use tracing::trace;

use crate::error::SchedulerError;

/// Tags a task with its submission index so the outcome can be routed to
/// the right slot regardless of completion order.
#[pin_project]
struct Indexed<F> {
    index: usize,
    #[pin]
    task: F,
}

impl<F> Future for Indexed<F>
where
    F: Future,
{
    type Output = (usize, F::Output);

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        this.task.poll(cx).map(|output| (*this.index, output))
    }
}

/// Writes `output` into `slots[index]` unless something already settled
/// there. Returns whether this settlement was honored; a task that
/// (incorrectly) reports twice only gets its first outcome recorded.
fn record_settlement<O>(slots: &mut [Option<O>], index: usize, output: O) -> bool {
    let slot = &mut slots[index];
    match slot {
        Some(_) => false,
        None => {
            *slot = Some(output);
            true
        }
    }
}

/// Bounded-concurrency driver for a batch of futures.
///
/// This struct consumes an iterator where each item is a future. By using
/// an iterator as the pending queue, we need no additional state or
/// additional storage for the excess of futures, and tasks past the
/// concurrency window are not even constructed until a slot frees up.
///
/// `Gather` is itself a [`Future`]: awaiting it runs the whole batch (at
/// most `max_concurrent` tasks in flight at any instant) and resolves with
/// a `Vec` holding task `i`'s output at position `i`, no matter which
/// order the tasks actually finished in.
///
/// Failures are collected rather than short-circuited: give it tasks that
/// return `Result` and the output `Vec` reports each slot's outcome
/// independently, always resolving once every task has settled.
#[pin_project]
pub struct Gather<T, F>
where
    T: Iterator<Item = F>,
    F: Future,
{
    max_concurrent: usize,
    tasks: T,
    next_index: usize,
    completed: usize,
    slots: Vec<Option<F::Output>>,
    finished: bool,
    #[pin]
    running: FuturesUnordered<Indexed<F>>,
}

impl<T, F> Gather<T, F>
where
    T: Iterator<Item = F>,
    F: Future,
{
    /// Creates a new bounded driver over a batch of tasks.
    ///
    /// Up to `max_concurrent` tasks are admitted immediately; the rest are
    /// pulled from the iterator, in order, as slots free up. Since
    /// iterators are lazily evaluated, futures past the initial window
    /// will be created on the fly as well.
    ///
    /// A `max_concurrent` of 0 is refused before the iterator is touched,
    /// so no task is constructed or started.
    /// ```rust
    /// use futures_gather::Gather;
    ///
    /// async fn fetch(page: u64) -> u64 {
    ///     page * 2
    /// }
    ///
    /// let tasks = (0..100).map(fetch);
    /// let batch = Gather::try_new(5, tasks).unwrap();
    /// // Only the first 5 futures exist right now; the other 95 will be
    /// // pulled from the iterator as slots free up.
    /// assert_eq!(batch.in_flight(), 5);
    ///
    /// tokio_test::block_on(async move {
    ///     let outputs = batch.await;
    ///     assert_eq!(outputs.len(), 100);
    ///     // Slot i holds task i's output, whatever the finishing order.
    ///     assert_eq!(outputs[7], 14);
    /// });
    /// ```
    pub fn try_new<I>(max_concurrent: usize, tasks: I) -> Result<Self, SchedulerError>
    where
        I: IntoIterator<IntoIter = T>,
    {
        if max_concurrent == 0 {
            return Err(SchedulerError::InvalidLimit);
        }
        let running = FuturesUnordered::new();
        let mut tasks = tasks.into_iter();
        let mut slots = Vec::new();
        let mut next_index = 0;
        // Admit the first window up front. The futures themselves stay
        // inert until the driver is polled.
        while next_index < max_concurrent {
            match tasks.next() {
                Some(task) => {
                    slots.push(None);
                    running.push(Indexed {
                        index: next_index,
                        task,
                    });
                    next_index += 1;
                }
                None => break,
            }
        }
        Ok(Self {
            max_concurrent,
            tasks,
            next_index,
            completed: 0,
            slots,
            finished: false,
            running,
        })
    }

    /// Change the concurrency limit at runtime.
    ///
    /// Tasks already in flight are never interrupted; the new limit is
    /// only consulted on the next admission decision, i.e. after the next
    /// settlement. Lowering the limit simply stops refills until enough
    /// tasks have drained.
    ///
    /// Rejects 0 for the same reason [`Gather::try_new`] does.
    pub fn set_max_concurrent(&mut self, max_concurrent: usize) -> Result<(), SchedulerError> {
        if max_concurrent == 0 {
            return Err(SchedulerError::InvalidLimit);
        }
        self.max_concurrent = max_concurrent;
        Ok(())
    }

    /// The current concurrency limit.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Number of tasks currently in flight. Never exceeds
    /// [`max_concurrent`](Gather::max_concurrent).
    pub fn in_flight(&self) -> usize {
        self.running.len()
    }

    /// Number of tasks that have settled so far.
    pub fn completed(&self) -> usize {
        self.completed
    }
}

impl<T, F> Future for Gather<T, F>
where
    T: Iterator<Item = F>,
    F: Future,
{
    type Output = Vec<F::Output>;

    /// Drive the batch: drain settlements from the in-flight set, and
    /// after each one, top the set back up from the iterator while
    /// capacity remains.
    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut this = self.project();
        if *this.finished {
            panic!("Gather polled after completion");
        }
        loop {
            match this.running.as_mut().poll_next(cx) {
                Poll::Ready(Some((index, output))) => {
                    if record_settlement(this.slots, index, output) {
                        *this.completed += 1;
                    }
                    trace!(index, completed = *this.completed, "task settled");
                    while this.running.len() < *this.max_concurrent {
                        match this.tasks.next() {
                            Some(task) => {
                                trace!(
                                    index = *this.next_index,
                                    in_flight = this.running.len(),
                                    "task admitted"
                                );
                                this.slots.push(None);
                                this.running.push(Indexed {
                                    index: *this.next_index,
                                    task,
                                });
                                *this.next_index += 1;
                            }
                            None => break,
                        }
                    }
                }
                Poll::Ready(None) => {
                    // Refills never leave capacity unused while tasks
                    // remain, so an empty in-flight set means the whole
                    // batch has settled.
                    *this.finished = true;
                    let outputs = mem::take(this.slots)
                        .into_iter()
                        .map(|slot| slot.expect("settled task left an empty slot"))
                        .collect();
                    return Poll::Ready(outputs);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
