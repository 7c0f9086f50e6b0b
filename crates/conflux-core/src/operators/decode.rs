#![forbid(unsafe_code)]

//! `decode`: turn raw payloads into typed values.
//!
//! The deserializer is an external collaborator behind the [`Decoder`]
//! trait. With the `json` feature, [`JsonDecoder`] decodes any
//! `serde::de::DeserializeOwned` type from JSON bytes.

use std::fmt;
#[cfg(feature = "json")]
use std::marker::PhantomData;
use std::rc::Rc;

use thiserror::Error;

use super::try_map::subscribe_fallible;
use crate::publisher::Publisher;
use crate::sink::Sink;
use crate::subscription::Subscription;

/// Synchronous payload deserializer.
pub trait Decoder {
    type Output;
    type Error;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Output, Self::Error>;
}

/// A structured deserialization failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to decode payload at line {line}, column {column}: {message}")]
pub struct DecodeError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl DecodeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            line: 0,
            column: 0,
        }
    }
}

#[cfg(feature = "json")]
impl From<serde_json::Error> for DecodeError {
    fn from(error: serde_json::Error) -> Self {
        Self {
            message: error.to_string(),
            line: error.line(),
            column: error.column(),
        }
    }
}

/// JSON decoder for any owned deserializable type.
#[cfg(feature = "json")]
pub struct JsonDecoder<T> {
    _target: PhantomData<fn() -> T>,
}

#[cfg(feature = "json")]
impl<T> JsonDecoder<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            _target: PhantomData,
        }
    }
}

#[cfg(feature = "json")]
impl<T> Default for JsonDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "json")]
impl<T> Clone for JsonDecoder<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

#[cfg(feature = "json")]
impl<T> fmt::Debug for JsonDecoder<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JsonDecoder")
    }
}

#[cfg(feature = "json")]
impl<T: serde::de::DeserializeOwned> Decoder for JsonDecoder<T> {
    type Output = T;
    type Error = DecodeError;

    fn decode(&self, bytes: &[u8]) -> Result<T, DecodeError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Decodes each upstream payload. A decode error becomes the chain's
/// failure (through `From`) and releases the upstream.
pub struct Decode<P, D> {
    upstream: P,
    decoder: Rc<D>,
}

impl<P, D> Decode<P, D> {
    pub(crate) fn new(upstream: P, decoder: D) -> Self {
        Self {
            upstream,
            decoder: Rc::new(decoder),
        }
    }
}

impl<P: Clone, D> Clone for Decode<P, D> {
    fn clone(&self) -> Self {
        Self {
            upstream: self.upstream.clone(),
            decoder: Rc::clone(&self.decoder),
        }
    }
}

impl<P: fmt::Debug, D> fmt::Debug for Decode<P, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decode")
            .field("upstream", &self.upstream)
            .finish_non_exhaustive()
    }
}

impl<P, D> Publisher for Decode<P, D>
where
    P: Publisher,
    P::Output: AsRef<[u8]>,
    P::Failure: From<D::Error>,
    D: Decoder + 'static,
    D::Output: 'static,
{
    type Output = D::Output;
    type Failure = P::Failure;

    fn subscribe_sink(&self, sink: Box<dyn Sink<D::Output, P::Failure>>) -> Subscription {
        let decoder = Rc::clone(&self.decoder);
        let transform = Rc::new(move |payload: P::Output| {
            decoder
                .decode(payload.as_ref())
                .map_err(<P::Failure as From<D::Error>>::from)
        });
        subscribe_fallible(&self.upstream, transform, sink)
    }
}
