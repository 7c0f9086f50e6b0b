#![forbid(unsafe_code)]

//! `map_err`: failure transform.

use std::rc::Rc;

use crate::completion::Completion;
use crate::publisher::Publisher;
use crate::sink::Sink;
use crate::subscription::Subscription;

/// Converts the upstream failure; values pass through untouched.
pub struct MapErr<P, F> {
    upstream: P,
    transform: Rc<F>,
}

impl<P, F> MapErr<P, F> {
    pub(crate) fn new(upstream: P, transform: F) -> Self {
        Self {
            upstream,
            transform: Rc::new(transform),
        }
    }
}

impl<P: Clone, F> Clone for MapErr<P, F> {
    fn clone(&self) -> Self {
        Self {
            upstream: self.upstream.clone(),
            transform: Rc::clone(&self.transform),
        }
    }
}

impl<P, F, E> Publisher for MapErr<P, F>
where
    P: Publisher,
    F: Fn(P::Failure) -> E + 'static,
    E: 'static,
{
    type Output = P::Output;
    type Failure = E;

    fn subscribe_sink(&self, sink: Box<dyn Sink<P::Output, E>>) -> Subscription {
        self.upstream.subscribe_sink(Box::new(MapErrSink {
            transform: Rc::clone(&self.transform),
            downstream: sink,
        }))
    }
}

struct MapErrSink<F, T, E> {
    transform: Rc<F>,
    downstream: Box<dyn Sink<T, E>>,
}

impl<T, E, G, F> Sink<T, G> for MapErrSink<F, T, E>
where
    F: Fn(G) -> E,
{
    fn receive(&mut self, value: T) {
        self.downstream.receive(value);
    }

    fn receive_completion(&mut self, completion: Completion<G>) {
        let transform = &self.transform;
        self.downstream
            .receive_completion(completion.map_failure(|error| transform(error)));
    }

    fn is_wanted(&self) -> bool {
        self.downstream.is_wanted()
    }
}
