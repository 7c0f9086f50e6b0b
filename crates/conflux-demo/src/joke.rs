//! The joke-fetch pipeline: transport bytes, decode a [`Response`], keep
//! the joke text.

use std::rc::Rc;

use conflux_core::{AnyPublisher, FuturePublisher, JsonDecoder, PublisherExt};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::ApiError;
use crate::run_loop::RunLoop;

pub const JOKE_URL: &str = "https://api.chucknorris.io/jokes/random";

/// Payload shape of the joke endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub icon_url: String,
    pub value: String,
}

/// Raw result of a transport request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub url: String,
    pub status: u16,
    pub data: Vec<u8>,
}

/// Something that can fetch a URL asynchronously.
pub trait Transport {
    fn fetch(&self, url: &str) -> AnyPublisher<Fetched, ApiError>;
}

/// In-memory transport answering every request with one payload. The
/// answer is delivered from the run loop, never during `subscribe`.
#[derive(Debug, Clone)]
pub struct CannedTransport {
    run_loop: RunLoop,
    status: u16,
    payload: Rc<[u8]>,
}

impl CannedTransport {
    pub fn new(run_loop: RunLoop, payload: impl Into<Vec<u8>>) -> Self {
        let payload: Vec<u8> = payload.into();
        Self {
            run_loop,
            status: 200,
            payload: payload.into(),
        }
    }

    /// A transport serving a well-formed joke.
    #[must_use]
    pub fn with_joke(run_loop: RunLoop, joke: &str) -> Self {
        let response = Response {
            icon_url: "https://assets.chucknorris.host/img/avatar/chuck-norris.png".to_string(),
            value: joke.to_string(),
        };
        // Serializing a struct of two strings cannot fail.
        let payload = serde_json::to_vec(&response).unwrap_or_default();
        Self::new(run_loop, payload)
    }
}

impl Transport for CannedTransport {
    fn fetch(&self, url: &str) -> AnyPublisher<Fetched, ApiError> {
        let run_loop = self.run_loop.clone();
        let status = self.status;
        let payload = Rc::clone(&self.payload);
        let url = url.to_string();
        FuturePublisher::new(move |promise| {
            trace!(url = %url, "canned request started");
            let fetched = Fetched {
                url: url.clone(),
                status,
                data: payload.to_vec(),
            };
            run_loop.schedule(move || promise.resolve(fetched))
        })
        .boxed()
    }
}

/// Fetch a joke and keep only its text.
pub fn get_joke(transport: &dyn Transport) -> AnyPublisher<String, ApiError> {
    transport
        .fetch(JOKE_URL)
        .map(|fetched| fetched.data)
        .decode(JsonDecoder::<Response>::new())
        .map(|response| response.value)
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use conflux_core::Completion;
    use std::cell::RefCell;

    fn collect(run_loop: &RunLoop, transport: &CannedTransport) -> Vec<String> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let values = Rc::clone(&log);
        let completions = Rc::clone(&log);
        let _sub = get_joke(transport).sink(
            move |c| completions.borrow_mut().push(format!("{c:?}")),
            move |v| values.borrow_mut().push(v),
        );
        assert!(log.borrow().is_empty());
        run_loop.run_until_idle();
        log.take()
    }

    #[test]
    fn decodes_joke_value() {
        let run_loop = RunLoop::new();
        let transport =
            CannedTransport::new(run_loop.clone(), r#"{"icon_url":"http://x","value":"joke"}"#);
        assert_eq!(collect(&run_loop, &transport), vec!["joke", "Finished"]);
    }

    #[test]
    fn malformed_payload_fails_without_value() {
        let run_loop = RunLoop::new();
        let transport = CannedTransport::new(run_loop.clone(), "{not json");
        let seen = collect(&run_loop, &transport);
        assert_eq!(seen.len(), 1);
        assert!(seen[0].starts_with("Failed(Decode("), "got {seen:?}");
    }

    #[test]
    fn with_joke_round_trips() {
        let run_loop = RunLoop::new();
        let transport = CannedTransport::with_joke(run_loop.clone(), "Chuck counted to infinity.");
        assert_eq!(
            collect(&run_loop, &transport),
            vec!["Chuck counted to infinity.", "Finished"]
        );
    }

    #[test]
    fn cancel_before_delivery_discards_result() {
        let run_loop = RunLoop::new();
        let transport = CannedTransport::with_joke(run_loop.clone(), "late");
        let log = Rc::new(RefCell::new(Vec::new()));
        let values = Rc::clone(&log);
        let sub = get_joke(&transport).sink(
            |_: Completion<ApiError>| {},
            move |v| values.borrow_mut().push(v),
        );
        drop(sub);
        assert_eq!(run_loop.run_until_idle(), 0);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn fetch_reports_url_and_status() {
        let run_loop = RunLoop::new();
        let transport = CannedTransport::new(run_loop.clone(), "x");
        let seen = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&seen);
        let _sub = transport.fetch(JOKE_URL).sink(
            |_: Completion<ApiError>| {},
            move |fetched| *slot.borrow_mut() = Some(fetched),
        );
        run_loop.run_until_idle();
        let fetched = seen.take().expect("delivered");
        assert_eq!(fetched.url, JOKE_URL);
        assert_eq!(fetched.status, 200);
        assert_eq!(fetched.data, b"x");
    }
}
