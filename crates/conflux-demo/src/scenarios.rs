//! Walk-through scenarios.
//!
//! Each scenario builds its own subjects and subscriptions, drives them,
//! and returns the lines its sinks observed, in order. Nothing is shared
//! between runs except the injected [`Environment`].

use std::cell::RefCell;
use std::rc::Rc;

use conflux_core::{
    Completion, CurrentValueSubject, Never, PassthroughSubject, PublisherExt, Subscription,
};
use tracing::info;

use crate::api::{Api, Credentials, User, VALID_USERNAME};
use crate::error::ApiError;
use crate::joke::{CannedTransport, get_joke};
use crate::retain::Screen;
use crate::run_loop::RunLoop;

/// Collaborators a scenario may use.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    pub api: Api,
}

pub type Transcript = Vec<String>;

#[derive(Debug, Clone, Copy)]
pub struct Scenario {
    pub name: &'static str,
    pub title: &'static str,
    run: fn(&Environment) -> Transcript,
}

impl Scenario {
    pub fn run(&self, env: &Environment) -> Transcript {
        info!(scenario = self.name, "running scenario");
        (self.run)(env)
    }
}

pub const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "subscribers",
        title: "Publishers and subscribers",
        run: publishers_and_subscribers,
    },
    Scenario {
        name: "linking",
        title: "Linking publishers",
        run: linking_publishers,
    },
    Scenario {
        name: "api-call",
        title: "Creating an API call with publishers",
        run: api_call,
    },
    Scenario {
        name: "login",
        title: "Using publishers in real life",
        run: real_life_login,
    },
    Scenario {
        name: "retain",
        title: "Retain cycles",
        run: retain_cycles,
    },
];

#[must_use]
pub fn find(name: &str) -> Option<&'static Scenario> {
    SCENARIOS.iter().find(|scenario| scenario.name == name)
}

type Lines = Rc<RefCell<Transcript>>;

fn lines() -> Lines {
    Rc::new(RefCell::new(Vec::new()))
}

fn printer(lines: &Lines) -> impl FnMut(String) + 'static {
    let lines = Rc::clone(lines);
    move |text| lines.borrow_mut().push(text)
}

// ---------------------------------------------------------------------------
// Publishers and subscribers
// ---------------------------------------------------------------------------

fn subscribe_to(stream: &PassthroughSubject<String, Never>, out: &Lines) {
    // Dropped at the end of this scope, so nothing is ever printed.
    let _local = stream.sink_value(printer(out));
}

fn subscribe_to_with_cancellable(
    stream: &PassthroughSubject<String, Never>,
    out: &Lines,
) -> Subscription {
    stream.sink_value(printer(out))
}

/// Subjects, sinks, and how subscription lifetime decides delivery.
pub fn publishers_and_subscribers(_env: &Environment) -> Transcript {
    let out = lines();

    let publisher: PassthroughSubject<String, Never> = PassthroughSubject::new();
    let _greeting = publisher.sink_value(printer(&out));
    publisher.send("Hello, old friend".to_string());

    let text_observer: PassthroughSubject<String, Never> = PassthroughSubject::new();
    let mut text_subscription = text_observer.sink_value(printer(&out));
    for ch in ["H", "e", "l", "l", "o"] {
        text_observer.send(ch.to_string());
    }
    text_subscription.cancel();

    subscribe_to(&text_observer, &out);
    for ch in ["n", "e", "v", "e", "r"] {
        text_observer.send(ch.to_string());
    }

    text_subscription = subscribe_to_with_cancellable(&text_observer, &out);
    text_observer.send("Cancellable".to_string());
    text_observer.send("Persisted".to_string());
    drop(text_subscription);

    out.take()
}

// ---------------------------------------------------------------------------
// Linking publishers
// ---------------------------------------------------------------------------

/// Chaining subjects with `flat_map`: int to string to double.
///
/// The inner `CurrentValueSubject`s never complete, and `flat_map` runs one
/// inner publisher at a time, so only the first int reaches the sink. Later
/// ints wait in the operator's buffer until the subscription is dropped.
pub fn linking_publishers(_env: &Environment) -> Transcript {
    let out = lines();
    let int_publisher: PassthroughSubject<i32, Never> = PassthroughSubject::new();

    let sink_out = Rc::clone(&out);
    let _subscription = int_publisher
        .clone()
        .flat_map(|n| CurrentValueSubject::<String, Never>::new(n.to_string()))
        .flat_map(|text| {
            CurrentValueSubject::<f64, Never>::new(text.parse::<f64>().unwrap_or(f64::NAN))
        })
        .sink_value(move |double| {
            sink_out
                .borrow_mut()
                .push(format!("output is double: {double:?}"));
        });

    int_publisher.send(1);
    int_publisher.send(2);
    out.take()
}

// ---------------------------------------------------------------------------
// Creating an API call
// ---------------------------------------------------------------------------

const SAMPLE_JOKE: &str = "Chuck Norris can unit test an entire application with a single assert.";

/// A future-backed transport request decoded into a joke, then the same
/// pipeline over a malformed payload.
pub fn api_call(_env: &Environment) -> Transcript {
    let out = lines();
    let run_loop = RunLoop::new();

    let good = CannedTransport::with_joke(run_loop.clone(), SAMPLE_JOKE);
    let bad = CannedTransport::new(run_loop.clone(), "<html>rate limited</html>");

    let mut subscriptions = Vec::new();
    for transport in [&good, &bad] {
        let values = Rc::clone(&out);
        let failures = Rc::clone(&out);
        subscriptions.push(get_joke(transport).sink(
            move |completion| {
                if let Completion::Failed(error) = completion {
                    failures.borrow_mut().push(error.to_string());
                }
            },
            move |joke| values.borrow_mut().push(format!("Published joke: {joke}")),
        ));
    }

    out.borrow_mut()
        .push(format!("{} requests in flight", run_loop.pending()));
    run_loop.run_until_idle();
    out.take()
}

// ---------------------------------------------------------------------------
// Using publishers in real life
// ---------------------------------------------------------------------------

fn report_failure(out: &Lines) -> impl FnOnce(Completion<ApiError>) + 'static {
    let out = Rc::clone(out);
    move |completion| {
        if let Completion::Failed(error) = completion {
            out.borrow_mut().push(error.to_string());
        }
    }
}

fn report_user(out: &Lines) -> impl FnMut(User) + 'static {
    let out = Rc::clone(out);
    move |user| out.borrow_mut().push(format!("Received user: {user}"))
}

/// A login button flow: credentials in, token or user out.
pub fn real_life_login(env: &Environment) -> Transcript {
    let out = lines();

    // Credentials arriving on a fallible subject.
    let credentials_observer1: PassthroughSubject<Credentials, ApiError> =
        PassthroughSubject::new();
    let api = env.api.clone();
    let token_out = Rc::clone(&out);
    let _subscription1 = credentials_observer1
        .clone()
        .flat_map(move |credentials| api.login(&credentials.username, &credentials.password))
        .sink(report_failure(&out), move |token| {
            token_out
                .borrow_mut()
                .push(format!("Received token: {token}"));
        });
    credentials_observer1.send(Credentials::valid());

    // Text input cannot fail, so the failure type is relabelled first.
    let credentials_observer2: PassthroughSubject<Credentials, Never> = PassthroughSubject::new();
    let login_api = env.api.clone();
    let user_api = env.api.clone();
    let _subscription2 = credentials_observer2
        .clone()
        .set_failure_type::<ApiError>()
        .flat_map(move |credentials| login_api.login(&credentials.username, &credentials.password))
        .flat_map(move |token| user_api.fetch_user(&token))
        .sink(report_failure(&out), report_user(&out));
    credentials_observer2.send(Credentials::valid());

    // The bundled helper, fed a wrong password.
    let credentials_observer3: PassthroughSubject<Credentials, Never> = PassthroughSubject::new();
    let api = env.api.clone();
    let _subscription3 = credentials_observer3
        .clone()
        .set_failure_type::<ApiError>()
        .flat_map(move |credentials| {
            api.login_and_fetch_user(&credentials.username, &credentials.password)
        })
        .sink(report_failure(&out), report_user(&out));
    credentials_observer3.send(Credentials::new(VALID_USERNAME, "invalid"));

    out.take()
}

// ---------------------------------------------------------------------------
// Retain cycles
// ---------------------------------------------------------------------------

/// An owner holding its own pipeline, then being released mid-flight.
pub fn retain_cycles(_env: &Environment) -> Transcript {
    let out = lines();
    let run_loop = RunLoop::new();

    let screen = Screen::new(run_loop.clone(), Rc::clone(&out));
    screen.load();
    run_loop.run_until_idle();

    let released = Screen::new(run_loop.clone(), Rc::clone(&out));
    released.load();
    let watcher = Rc::downgrade(&released);
    drop(released);
    let skipped = run_loop.run_until_idle() == 0;
    out.borrow_mut().push(format!(
        "released screen freed: {}, pending work skipped: {skipped}",
        watcher.upgrade().is_none()
    ));

    drop(screen);
    out.take()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_unique() {
        for (i, a) in SCENARIOS.iter().enumerate() {
            for b in &SCENARIOS[i + 1..] {
                assert_ne!(a.name, b.name);
            }
        }
    }

    #[test]
    fn find_by_name() {
        assert_eq!(find("login").map(|s| s.title), Some("Using publishers in real life"));
        assert!(find("missing").is_none());
    }

    #[test]
    fn subscribers_transcript() {
        let transcript = publishers_and_subscribers(&Environment::default());
        assert_eq!(
            transcript,
            vec![
                "Hello, old friend",
                "H",
                "e",
                "l",
                "l",
                "o",
                "Cancellable",
                "Persisted"
            ]
        );
    }

    #[test]
    fn linking_transcript() {
        // The second int is held behind the first, still-open inner subject.
        assert_eq!(
            linking_publishers(&Environment::default()),
            vec!["output is double: 1.0"]
        );
    }

    #[test]
    fn api_call_transcript() {
        let transcript = api_call(&Environment::default());
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[0], "2 requests in flight");
        assert_eq!(transcript[1], format!("Published joke: {SAMPLE_JOKE}"));
        assert!(transcript[2].starts_with("failed to decode payload"));
    }

    #[test]
    fn login_transcript() {
        assert_eq!(
            real_life_login(&Environment::default()),
            vec![
                "Received token: TheToken",
                "Received user: Hoppekat (ABCD1234) <test@test.dk>",
                "invalid credentials",
            ]
        );
    }

    #[test]
    fn retain_transcript() {
        assert_eq!(
            retain_cycles(&Environment::default()),
            vec![
                "first step done",
                "Done",
                "released screen freed: true, pending work skipped: true",
            ]
        );
    }
}
