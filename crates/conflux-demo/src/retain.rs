//! An owner that keeps its own pipelines alive without leaking.
//!
//! [`Screen`] stores its subscriptions in a [`SubscriptionBag`] and its
//! pipeline closures reach back to it through a `Weak`. Ownership only
//! ever points from the screen to the subscription, so dropping the last
//! `Rc<Screen>` frees the screen and cancels everything it started.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use conflux_core::{
    AnyPublisher, Completion, Empty, FuturePublisher, Never, PublisherExt, SubscriptionBag,
};
use tracing::debug;

use crate::run_loop::RunLoop;

#[derive(Debug)]
pub struct Screen {
    run_loop: RunLoop,
    cancellables: RefCell<SubscriptionBag>,
    log: Rc<RefCell<Vec<String>>>,
}

impl Screen {
    pub fn new(run_loop: RunLoop, log: Rc<RefCell<Vec<String>>>) -> Rc<Self> {
        Rc::new(Self {
            run_loop,
            cancellables: RefCell::new(SubscriptionBag::new()),
            log,
        })
    }

    /// Start the two-step load. The follow-up step is built through a
    /// weak handle; once the screen is gone it is replaced by an empty
    /// publisher.
    pub fn load(self: &Rc<Self>) {
        let weak: Weak<Self> = Rc::downgrade(self);
        let log = Rc::clone(&self.log);
        let step_log = Rc::clone(&self.log);
        self.first_step()
            .flat_map(move |()| match weak.upgrade() {
                Some(screen) => {
                    step_log.borrow_mut().push("first step done".to_string());
                    screen.second_step()
                }
                None => Empty::new().boxed(),
            })
            .sink(
                move |_: Completion<Never>| log.borrow_mut().push("Done".to_string()),
                |()| {},
            )
            .store(&mut self.cancellables.borrow_mut());
    }

    /// Subscriptions the screen currently keeps alive.
    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        self.cancellables.borrow().active_count()
    }

    fn first_step(&self) -> AnyPublisher<(), Never> {
        let run_loop = self.run_loop.clone();
        FuturePublisher::new(move |promise| run_loop.schedule(move || promise.resolve(())))
            .boxed()
    }

    fn second_step(&self) -> AnyPublisher<(), Never> {
        Empty::new().boxed()
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        debug!(
            subscriptions = self.cancellables.get_mut().len(),
            "screen released"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (RunLoop, Rc<RefCell<Vec<String>>>, Rc<Screen>) {
        let run_loop = RunLoop::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let screen = Screen::new(run_loop.clone(), Rc::clone(&log));
        (run_loop, log, screen)
    }

    #[test]
    fn load_completes_while_owner_alive() {
        let (run_loop, log, screen) = setup();
        screen.load();
        assert_eq!(screen.active_subscriptions(), 1);
        run_loop.run_until_idle();
        assert_eq!(*log.borrow(), vec!["first step done", "Done"]);
        assert_eq!(screen.active_subscriptions(), 0);
    }

    #[test]
    fn pipeline_does_not_keep_owner_alive() {
        let (run_loop, log, screen) = setup();
        screen.load();
        let weak = Rc::downgrade(&screen);
        drop(screen);
        assert!(weak.upgrade().is_none());
        assert_eq!(run_loop.run_until_idle(), 0);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn strong_count_is_unchanged_by_load() {
        let (_run_loop, _log, screen) = setup();
        screen.load();
        screen.load();
        assert_eq!(Rc::strong_count(&screen), 1);
        assert_eq!(screen.active_subscriptions(), 2);
    }
}
