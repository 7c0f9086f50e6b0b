//! Terminal signals.

use std::convert::Infallible;

/// Failure type of publishers that cannot fail.
pub type Never = Infallible;

/// The terminal event of a subscription. Nothing follows it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Completion<E> {
    /// The publisher produced all of its values.
    Finished,
    /// The publisher stopped with an error.
    Failed(E),
}

impl<E> Completion<E> {
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }

    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// The failure carried by this completion, if any.
    #[must_use]
    pub fn failure(&self) -> Option<&E> {
        match self {
            Self::Finished => None,
            Self::Failed(error) => Some(error),
        }
    }

    /// Convert the failure, leaving `Finished` untouched.
    pub fn map_failure<F>(self, f: impl FnOnce(E) -> F) -> Completion<F> {
        match self {
            Self::Finished => Completion::Finished,
            Self::Failed(error) => Completion::Failed(f(error)),
        }
    }
}

impl Completion<Never> {
    /// Relabel a completion that cannot carry a failure.
    pub fn relabel<F>(self) -> Completion<F> {
        match self {
            Self::Finished => Completion::Finished,
            Self::Failed(never) => match never {},
        }
    }
}

impl<E> From<Result<(), E>> for Completion<E> {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::Finished,
            Err(error) => Self::Failed(error),
        }
    }
}
