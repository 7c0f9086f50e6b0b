//! A single-threaded cooperative task queue.
//!
//! Stands in for "some later context": collaborators that complete
//! asynchronously schedule their completion here, and the driver calls
//! [`RunLoop::run_until_idle`] to deliver it. Tasks run in FIFO order; a
//! task scheduled while the loop is running executes in the same drain.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use conflux_core::Subscription;
use tracing::trace;

struct Task {
    cancelled: Rc<Cell<bool>>,
    job: Box<dyn FnOnce()>,
}

#[derive(Clone, Default)]
pub struct RunLoop {
    queue: Rc<RefCell<VecDeque<Task>>>,
}

impl RunLoop {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `job`. Cancelling the returned subscription before the job
    /// runs skips it.
    pub fn schedule(&self, job: impl FnOnce() + 'static) -> Subscription {
        let cancelled = Rc::new(Cell::new(false));
        self.queue.borrow_mut().push_back(Task {
            cancelled: Rc::clone(&cancelled),
            job: Box::new(job),
        });
        Subscription::new(move || cancelled.set(true))
    }

    /// Number of queued tasks, including cancelled ones not yet drained.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Run tasks until the queue is empty. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        loop {
            // The queue borrow ends before the job runs so jobs may schedule.
            let Some(task) = self.queue.borrow_mut().pop_front() else {
                break;
            };
            if task.cancelled.get() {
                continue;
            }
            (task.job)();
            ran += 1;
        }
        trace!(ran, "run loop idle");
        ran
    }
}

impl fmt::Debug for RunLoop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunLoop")
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_in_fifo_order() {
        let run_loop = RunLoop::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut subs = Vec::new();
        for i in 0..3 {
            let log = Rc::clone(&log);
            subs.push(run_loop.schedule(move || log.borrow_mut().push(i)));
        }
        assert!(log.borrow().is_empty());
        assert_eq!(run_loop.run_until_idle(), 3);
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert_eq!(run_loop.pending(), 0);
    }

    #[test]
    fn cancelled_task_is_skipped() {
        let run_loop = RunLoop::new();
        let hit = Rc::new(Cell::new(false));
        let flag = Rc::clone(&hit);
        let sub = run_loop.schedule(move || flag.set(true));
        drop(sub);
        assert_eq!(run_loop.run_until_idle(), 0);
        assert!(!hit.get());
    }

    #[test]
    fn tasks_may_schedule_more_work() {
        let run_loop = RunLoop::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let held: Rc<RefCell<Vec<Subscription>>> = Rc::new(RefCell::new(Vec::new()));
        let inner_loop = run_loop.clone();
        let inner_held = Rc::clone(&held);
        let outer_log = Rc::clone(&log);
        let _sub = run_loop.schedule(move || {
            outer_log.borrow_mut().push("outer");
            let inner_log = Rc::clone(&outer_log);
            let follow_up = inner_loop.schedule(move || inner_log.borrow_mut().push("inner"));
            inner_held.borrow_mut().push(follow_up);
        });
        assert_eq!(run_loop.run_until_idle(), 2);
        assert_eq!(*log.borrow(), vec!["outer", "inner"]);
    }
}
