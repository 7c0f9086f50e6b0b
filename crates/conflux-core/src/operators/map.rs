#![forbid(unsafe_code)]

//! `map`: synchronous value transform.

use std::fmt;
use std::rc::Rc;

use crate::completion::Completion;
use crate::publisher::Publisher;
use crate::sink::Sink;
use crate::subscription::Subscription;

/// Applies a transform to every value at delivery time. Cannot fail;
/// failures from upstream pass through untouched.
pub struct Map<P, F> {
    upstream: P,
    transform: Rc<F>,
}

impl<P, F> Map<P, F> {
    pub(crate) fn new(upstream: P, transform: F) -> Self {
        Self {
            upstream,
            transform: Rc::new(transform),
        }
    }
}

impl<P: Clone, F> Clone for Map<P, F> {
    fn clone(&self) -> Self {
        Self {
            upstream: self.upstream.clone(),
            transform: Rc::clone(&self.transform),
        }
    }
}

impl<P: fmt::Debug, F> fmt::Debug for Map<P, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Map")
            .field("upstream", &self.upstream)
            .finish_non_exhaustive()
    }
}

impl<P, F, U> Publisher for Map<P, F>
where
    P: Publisher,
    F: Fn(P::Output) -> U + 'static,
    U: 'static,
{
    type Output = U;
    type Failure = P::Failure;

    fn subscribe_sink(&self, sink: Box<dyn Sink<U, P::Failure>>) -> Subscription {
        self.upstream.subscribe_sink(Box::new(MapSink {
            transform: Rc::clone(&self.transform),
            downstream: sink,
        }))
    }
}

struct MapSink<F, U, E> {
    transform: Rc<F>,
    downstream: Box<dyn Sink<U, E>>,
}

impl<T, U, E, F> Sink<T, E> for MapSink<F, U, E>
where
    F: Fn(T) -> U,
{
    fn receive(&mut self, value: T) {
        self.downstream.receive((self.transform)(value));
    }

    fn receive_completion(&mut self, completion: Completion<E>) {
        self.downstream.receive_completion(completion);
    }

    fn is_wanted(&self) -> bool {
        self.downstream.is_wanted()
    }
}
