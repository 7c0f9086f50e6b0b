#![forbid(unsafe_code)]

//! A subject that always has a value to give.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::{Registry, attach, broadcast, finish};
use crate::completion::Completion;
use crate::logging::trace;
use crate::publisher::Publisher;
use crate::sink::{Downstream, Sink};
use crate::subscription::Subscription;

/// Retains the latest value. A new subscriber receives it synchronously,
/// before `subscribe` returns and before any later `send`.
pub struct CurrentValueSubject<T, E> {
    registry: Rc<RefCell<Registry<T, E>>>,
    value: Rc<RefCell<T>>,
}

impl<T: Clone + 'static, E: Clone + 'static> CurrentValueSubject<T, E> {
    pub fn new(value: T) -> Self {
        Self {
            registry: Rc::new(RefCell::new(Registry::default())),
            value: Rc::new(RefCell::new(value)),
        }
    }

    /// A clone of the retained value.
    #[must_use]
    pub fn value(&self) -> T {
        self.value.borrow().clone()
    }

    /// Replace the retained value, then broadcast it. Ignored after
    /// completion.
    pub fn send(&self, value: T) {
        if self.registry.borrow().is_terminated() {
            return;
        }
        *self.value.borrow_mut() = value.clone();
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

impl<T, E> Clone for CurrentValueSubject<T, E> {
    fn clone(&self) -> Self {
        Self {
            registry: Rc::clone(&self.registry),
            value: Rc::clone(&self.value),
        }
    }
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for CurrentValueSubject<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurrentValueSubject")
            .field("value", &self.value.borrow())
            .field("completion", &self.registry.borrow().completion)
            .finish_non_exhaustive()
    }
}

impl<T: Clone + 'static, E: Clone + 'static> Publisher for CurrentValueSubject<T, E> {
    type Output = T;
    type Failure = E;

    fn subscribe_sink(&self, sink: Box<dyn Sink<T, E>>) -> Subscription {
        let downstream = Downstream::new(sink);
        match attach(&self.registry, downstream.clone()) {
            Ok(subscription) => {
                let current = self.value.borrow().clone();
                trace!("replaying current value to new subscriber");
                downstream.send(current);
                subscription
            }
            Err((downstream, completion)) => {
                downstream.complete(completion);
                Subscription::from_cancellable(downstream)
            }
        }
    }
}
