#![forbid(unsafe_code)]

//! A subject that forwards values to whoever is subscribed at send time.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::{Registry, attach, broadcast, finish};
use crate::completion::Completion;
use crate::publisher::Publisher;
use crate::sink::{Downstream, Sink};
use crate::subscription::Subscription;

/// Broadcasts each sent value to the current subscribers. Nothing is
/// retained: a subscriber sees only values sent after it attached.
pub struct PassthroughSubject<T, E> {
    registry: Rc<RefCell<Registry<T, E>>>,
}

impl<T: Clone + 'static, E: Clone + 'static> PassthroughSubject<T, E> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry::default())),
        }
    }

    /// Deliver `value` to every subscriber, in subscription order.
    /// Ignored after completion.
    pub fn send(&self, value: T) {
        broadcast(&self.registry, value);
    }

    /// Terminate the subject. Only the first call has any effect.
    pub fn send_completion(&self, completion: Completion<E>) {
        finish(&self.registry, completion);
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.registry.borrow_mut().subscriber_count()
    }

    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.registry.borrow().is_terminated()
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Default for PassthroughSubject<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> Clone for PassthroughSubject<T, E> {
    fn clone(&self) -> Self {
        Self {
            registry: Rc::clone(&self.registry),
        }
    }
}

impl<T, E: fmt::Debug> fmt::Debug for PassthroughSubject<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.registry.borrow();
        f.debug_struct("PassthroughSubject")
            .field("completion", &state.completion)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Publisher for PassthroughSubject<T, E> {
    type Output = T;
    type Failure = E;

    fn subscribe_sink(&self, sink: Box<dyn Sink<T, E>>) -> Subscription {
        match attach(&self.registry, Downstream::new(sink)) {
            Ok(subscription) => subscription,
            Err((downstream, completion)) => {
                downstream.complete(completion);
                Subscription::from_cancellable(downstream)
            }
        }
    }
}
