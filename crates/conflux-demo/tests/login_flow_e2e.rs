//! End-to-end checks for the login flow, the joke pipeline and the
//! walk-through scenarios, driven through the public demo API.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use clap::Parser;
use conflux_core::{Completion, Just, Never, PassthroughSubject, PublisherExt};
use conflux_demo::api::{Api, Credentials, TOKEN, User, VALID_PASSWORD, VALID_USERNAME};
use conflux_demo::cli::{Cli, run_with_writer};
use conflux_demo::joke::{CannedTransport, get_joke};
use conflux_demo::run_loop::RunLoop;
use conflux_demo::scenarios::{Environment, SCENARIOS};
use conflux_demo::{ApiError, DemoError};
use proptest::prelude::{prop_assert_eq, prop_oneof, proptest};
use proptest::strategy::{Just as Always, Strategy};

// ── Helpers ─────────────────────────────────────────────────────────────

fn transcript<T: std::fmt::Debug + 'static>(
    publisher: &impl PublisherExt<Output = T, Failure = ApiError>,
) -> Vec<String> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let values = Rc::clone(&log);
    let completions = Rc::clone(&log);
    let _sub = publisher.sink(
        move |c| completions.borrow_mut().push(format!("{c:?}")),
        move |v| values.borrow_mut().push(format!("{v:?}")),
    );
    log.take()
}

/// An API whose `fetch_user` counts its invocations.
fn counting_api() -> (Api, Rc<Cell<usize>>) {
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let api = Api::default().with_fetch_user(move |_| {
        counter.set(counter.get() + 1);
        Just::new(User::fixture()).set_failure_type().boxed()
    });
    (api, calls)
}

// ═════════════════════════════════════════════════════════════════════════
// Login
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn valid_login_yields_token_then_finished() {
    let api = Api::default();
    assert_eq!(
        transcript(&api.login(VALID_USERNAME, VALID_PASSWORD)),
        vec![format!("{TOKEN:?}"), "Finished".to_string()]
    );
}

#[test]
fn invalid_login_fails_and_never_fetches_user() {
    let (api, calls) = counting_api();
    let subject: PassthroughSubject<Credentials, Never> = PassthroughSubject::new();
    let login_api = api.clone();
    let user_api = api.clone();
    let log = Rc::new(RefCell::new(Vec::new()));
    let values = Rc::clone(&log);
    let completions = Rc::clone(&log);
    let _sub = subject
        .clone()
        .set_failure_type::<ApiError>()
        .flat_map(move |c| login_api.login(&c.username, &c.password))
        .flat_map(move |token| user_api.fetch_user(&token))
        .sink(
            move |c| completions.borrow_mut().push(format!("{c:?}")),
            move |user: User| values.borrow_mut().push(user.name),
        );

    subject.send(Credentials::new(VALID_USERNAME, "invalid"));
    // The chain is terminated; later input is ignored.
    subject.send(Credentials::valid());

    assert_eq!(*log.borrow(), vec!["Failed(InvalidCredentials)"]);
    assert_eq!(calls.get(), 0);
}

#[test]
fn valid_login_fetches_user_once() {
    let (api, calls) = counting_api();
    assert_eq!(
        transcript(&api.login_and_fetch_user(VALID_USERNAME, VALID_PASSWORD)).len(),
        2
    );
    assert_eq!(calls.get(), 1);
}

#[test]
fn failure_reaches_sink_unmodified() {
    let api = Api::default();
    let failure = Rc::new(RefCell::new(None));
    let slot = Rc::clone(&failure);
    let _sub = api.login_and_fetch_user("nobody", "nothing").sink(
        move |c: Completion<ApiError>| *slot.borrow_mut() = c.failure().cloned(),
        |_| panic!("no user expected"),
    );
    assert_eq!(*failure.borrow(), Some(ApiError::InvalidCredentials));
}

proptest! {
    #[test]
    fn only_the_valid_pair_logs_in(
        username in prop_oneof![Always(VALID_USERNAME.to_string()), "[a-zA-Z]{0,12}".prop_map(String::from)],
        password in prop_oneof![Always(VALID_PASSWORD.to_string()), "[a-zA-Z]{0,12}".prop_map(String::from)],
    ) {
        let (api, calls) = counting_api();
        let seen = transcript(&api.login_and_fetch_user(&username, &password));
        let valid = username == VALID_USERNAME && password == VALID_PASSWORD;
        if valid {
            prop_assert_eq!(seen.len(), 2);
            prop_assert_eq!(seen[1].as_str(), "Finished");
            prop_assert_eq!(calls.get(), 1);
        } else {
            prop_assert_eq!(seen, vec!["Failed(InvalidCredentials)".to_string()]);
            prop_assert_eq!(calls.get(), 0);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// Joke pipeline
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn joke_payload_decodes_to_value() {
    let run_loop = RunLoop::new();
    let transport =
        CannedTransport::new(run_loop.clone(), r#"{"icon_url":"http://x","value":"joke"}"#);
    let log = Rc::new(RefCell::new(Vec::new()));
    let values = Rc::clone(&log);
    let completions = Rc::clone(&log);
    let _sub = get_joke(&transport).sink(
        move |c| completions.borrow_mut().push(format!("{c:?}")),
        move |v| values.borrow_mut().push(v),
    );
    run_loop.run_until_idle();
    assert_eq!(*log.borrow(), vec!["joke", "Finished"]);
}

#[test]
fn malformed_joke_payload_fails() {
    let run_loop = RunLoop::new();
    let transport = CannedTransport::new(run_loop.clone(), "{\"value\":");
    let outcome = Rc::new(RefCell::new(Vec::new()));
    let values = Rc::clone(&outcome);
    let completions = Rc::clone(&outcome);
    let _sub = get_joke(&transport).sink(
        move |c| completions.borrow_mut().push(Err(c)),
        move |v| values.borrow_mut().push(Ok(v)),
    );
    run_loop.run_until_idle();
    let outcome = outcome.borrow();
    assert_eq!(outcome.len(), 1);
    assert!(matches!(
        outcome[0],
        Err(Completion::Failed(ApiError::Decode(_)))
    ));
}

// ═════════════════════════════════════════════════════════════════════════
// CLI
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn all_prints_every_scenario_title() {
    let cli = Cli::try_parse_from(["conflux-demo", "all"]).expect("parse");
    let mut buf = Vec::new();
    run_with_writer(cli, &Environment::default(), &mut buf).expect("run");
    let text = String::from_utf8(buf).expect("utf8");
    for scenario in SCENARIOS {
        assert!(text.contains(scenario.title), "missing {}", scenario.title);
    }
    assert!(text.contains("Received token: TheToken"));
    assert!(text.contains("output is double: 1.0"));
}

#[test]
fn cli_login_with_bad_password_exits_with_request_failure() {
    let cli = Cli::try_parse_from([
        "conflux-demo",
        "login",
        "--username",
        VALID_USERNAME,
        "--password",
        "invalid",
    ])
    .expect("parse");
    let mut buf = Vec::new();
    let error = run_with_writer(cli, &Environment::default(), &mut buf).expect_err("login fails");
    assert!(matches!(
        error,
        DemoError::Api(ApiError::InvalidCredentials)
    ));
    assert_eq!(error.exit_code(), 3);
    assert!(buf.is_empty());
}

#[test]
fn cli_login_uses_injected_api() {
    let api = Api::default().with_login(|_, _| Just::new("Other".to_string()).set_failure_type().boxed());
    let env = Environment { api };
    let cli = Cli::try_parse_from(["conflux-demo", "login", "--username", "a", "--password", "b"])
        .expect("parse");
    let mut buf = Vec::new();
    run_with_writer(cli, &env, &mut buf).expect("run");
    assert_eq!(
        String::from_utf8(buf).expect("utf8"),
        "Received user: Hoppekat (ABCD1234) <test@test.dk>\n"
    );
}
