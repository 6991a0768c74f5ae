//! Effect Scheduler
//!
//! The scheduler holds effects that were notified by a write and runs them
//! in the order they were queued.
//!
//! # Batching
//!
//! Writes inside a batch only queue effects. The batch depth counts nested
//! batches; when the outermost batch ends, the queue is drained once, so
//! effects observe the state after the whole batch and never an
//! intermediate one.
//!
//! # Re-entrancy
//!
//! An effect that writes a signal while the queue is draining only appends
//! to the queue. The running drain picks the new entries up before it
//! returns, which keeps execution strictly first-in first-out.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use crate::error::ReactiveError;

/// FIFO queue of pending jobs plus a batch nesting counter.
pub struct UpdateScheduler<J> {
    queue: RefCell<VecDeque<J>>,
    batch_depth: Cell<u32>,
    flushing: Cell<bool>,
    /// Maximum number of jobs a single drain may run.
    flush_limit: Option<usize>,
}

/// Clears the draining flag when the drain ends, including by panic.
struct DrainGuard<'a>(&'a Cell<bool>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<J> UpdateScheduler<J> {
    /// Create an empty scheduler.
    pub fn new(flush_limit: Option<usize>) -> Self {
        Self {
            queue: RefCell::new(VecDeque::new()),
            batch_depth: Cell::new(0),
            flushing: Cell::new(false),
            flush_limit,
        }
    }

    /// Append a job to the queue.
    pub fn enqueue(&self, job: J) {
        self.queue.borrow_mut().push_back(job);
    }

    /// Number of jobs waiting to run.
    pub fn queued(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Current batch nesting depth.
    pub fn batch_depth(&self) -> u32 {
        self.batch_depth.get()
    }

    /// Whether writes should defer their flush.
    pub fn is_batching(&self) -> bool {
        self.batch_depth.get() > 0
    }

    /// Whether a drain is in progress.
    pub fn is_flushing(&self) -> bool {
        self.flushing.get()
    }

    /// Enter a batch.
    pub fn start_batch(&self) {
        self.batch_depth.set(self.batch_depth.get() + 1);
    }

    /// Leave a batch. Returns `true` when this closed the outermost batch
    /// and the queue should be drained.
    pub fn end_batch(&self) -> bool {
        let depth = self.batch_depth.get();
        assert!(depth > 0, "end_batch called without a matching start_batch");
        self.batch_depth.set(depth - 1);
        depth == 1
    }

    /// Run queued jobs until the queue is empty.
    ///
    /// Jobs queued while draining are run by the same drain. A drain
    /// requested from inside a running drain returns immediately. Returns
    /// the number of jobs run, or an error when the flush limit is
    /// exceeded. In that case every job left in the queue is handed to
    /// `discard` instead of `run`.
    pub fn drain(
        &self,
        mut run: impl FnMut(J),
        mut discard: impl FnMut(J),
    ) -> Result<usize, ReactiveError> {
        if self.flushing.replace(true) {
            return Ok(0);
        }
        let _guard = DrainGuard(&self.flushing);

        let mut ran = 0;
        loop {
            let job = self.queue.borrow_mut().pop_front();
            let Some(job) = job else {
                break;
            };

            if let Some(limit) = self.flush_limit {
                if ran >= limit {
                    let dropped: Vec<J> = self.queue.borrow_mut().drain(..).collect();
                    discard(job);
                    dropped.into_iter().for_each(&mut discard);
                    return Err(ReactiveError::FlushLimitExceeded { limit });
                }
            }

            run(job);
            ran += 1;
        }

        Ok(ran)
    }
}

impl<J> Default for UpdateScheduler<J> {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn drains_in_fifo_order() {
        let scheduler = UpdateScheduler::new(None);
        scheduler.enqueue(1);
        scheduler.enqueue(2);
        scheduler.enqueue(3);

        let mut seen = Vec::new();
        let ran = scheduler.drain(|job| seen.push(job), drop).unwrap();

        assert_eq!(ran, 3);
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(scheduler.queued(), 0);
    }

    #[test]
    fn jobs_queued_while_draining_run_last() {
        let scheduler = Rc::new(UpdateScheduler::new(None));
        scheduler.enqueue(1);
        scheduler.enqueue(2);

        let mut seen = Vec::new();
        let inner = scheduler.clone();
        let run = |job: i32| {
            seen.push(job);
            if job == 1 {
                inner.enqueue(10);
                // Nested drain requests are ignored.
                assert_eq!(inner.drain(|_| unreachable!(), drop).unwrap(), 0);
            }
        };
        scheduler.drain(run, drop).unwrap();

        assert_eq!(seen, vec![1, 2, 10]);
    }

    #[test]
    fn only_outermost_batch_end_flushes() {
        let scheduler: UpdateScheduler<()> = UpdateScheduler::new(None);
        scheduler.start_batch();
        scheduler.start_batch();
        assert!(scheduler.is_batching());

        assert!(!scheduler.end_batch());
        assert!(scheduler.end_batch());
        assert!(!scheduler.is_batching());
    }

    #[test]
    #[should_panic(expected = "without a matching start_batch")]
    fn unbalanced_end_batch_panics() {
        let scheduler: UpdateScheduler<()> = UpdateScheduler::new(None);
        scheduler.end_batch();
    }

    #[test]
    fn flush_limit_discards_the_rest() {
        let scheduler = UpdateScheduler::new(Some(2));
        for job in 0..5 {
            scheduler.enqueue(job);
        }

        let mut seen = Vec::new();
        let mut discarded = Vec::new();
        let result = scheduler.drain(|job| seen.push(job), |job| discarded.push(job));

        assert_eq!(result, Err(ReactiveError::FlushLimitExceeded { limit: 2 }));
        assert_eq!(seen, vec![0, 1]);
        assert_eq!(discarded, vec![2, 3, 4]);
        assert_eq!(scheduler.queued(), 0);
        assert!(!scheduler.is_flushing());
    }
}
