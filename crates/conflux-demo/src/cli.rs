use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use clap::{Args, Parser, Subcommand};
use conflux_core::{Completion, PublisherExt};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use crate::api::User;
use crate::error::{ApiError, DemoError, Result};
use crate::scenarios::{Environment, SCENARIOS, Scenario, find};

#[derive(Debug, Parser)]
#[command(
    name = "conflux-demo",
    about = "Walk through conflux-core scenarios: subjects, linking, API calls, login flows and retention",
    version
)]
pub struct Cli {
    /// Log filter directive, e.g. `debug` or `conflux_demo=trace`.
    #[arg(long, global = true, env = "CONFLUX_LOG", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print scenario names and titles.
    List,

    /// Run one scenario and print its transcript.
    Run(RunArgs),

    /// Run every scenario in order.
    All,

    /// Log in against the mock service and fetch the user.
    Login(LoginArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Scenario name as shown by `list`.
    pub scenario: String,
}

#[derive(Debug, Args)]
pub struct LoginArgs {
    #[arg(long, env = "CONFLUX_DEMO_USERNAME")]
    pub username: String,

    #[arg(long, env = "CONFLUX_DEMO_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Print the user as JSON instead of a summary line.
    #[arg(long)]
    pub json: bool,
}

pub fn run_from_env() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    run(cli)
}

pub fn run(cli: Cli) -> Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    run_with_writer(cli, &Environment::default(), &mut out)
}

pub fn run_with_writer(cli: Cli, env: &Environment, out: &mut dyn Write) -> Result<()> {
    match cli.command {
        Commands::List => {
            for scenario in SCENARIOS {
                writeln!(out, "{:<12} {}", scenario.name, scenario.title)?;
            }
            Ok(())
        }
        Commands::Run(args) => {
            let scenario =
                find(&args.scenario).ok_or_else(|| DemoError::unknown_scenario(&args.scenario))?;
            print_scenario(scenario, env, out)
        }
        Commands::All => {
            for scenario in SCENARIOS {
                print_scenario(scenario, env, out)?;
            }
            Ok(())
        }
        Commands::Login(args) => run_login(&args, env, out),
    }
}

fn print_scenario(scenario: &Scenario, env: &Environment, out: &mut dyn Write) -> Result<()> {
    writeln!(out, "== {} ==", scenario.title)?;
    for line in scenario.run(env) {
        writeln!(out, "{line}")?;
    }
    Ok(())
}

fn run_login(args: &LoginArgs, env: &Environment, out: &mut dyn Write) -> Result<()> {
    let outcome: Rc<RefCell<Option<std::result::Result<User, ApiError>>>> =
        Rc::new(RefCell::new(None));
    let on_value = Rc::clone(&outcome);
    let on_completion = Rc::clone(&outcome);
    let _subscription = env
        .api
        .login_and_fetch_user(&args.username, &args.password)
        .sink(
            move |completion| {
                if let Completion::Failed(error) = completion {
                    *on_completion.borrow_mut() = Some(Err(error));
                }
            },
            move |user| *on_value.borrow_mut() = Some(Ok(user)),
        );

    let result = outcome.take();
    match result {
        Some(Ok(user)) if args.json => {
            serde_json::to_writer_pretty(&mut *out, &user).map_err(io::Error::from)?;
            writeln!(out)?;
            Ok(())
        }
        Some(Ok(user)) => {
            writeln!(out, "Received user: {user}")?;
            Ok(())
        }
        Some(Err(error)) => Err(error.into()),
        None => {
            warn!(username = %args.username, "login finished without a user");
            Ok(())
        }
    }
}

/// Install the global fmt subscriber. A second call is a no-op.
pub fn init_tracing(directive: &str) {
    let filter = EnvFilter::try_new(directive).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).expect("valid arguments")
    }

    fn output(args: &[&str]) -> (Result<()>, String) {
        let mut buf = Vec::new();
        let result = run_with_writer(parse(args), &Environment::default(), &mut buf);
        (result, String::from_utf8(buf).expect("utf8 output"))
    }

    #[test]
    fn list_prints_every_scenario() {
        let (result, text) = output(&["conflux-demo", "list"]);
        assert!(result.is_ok());
        for scenario in SCENARIOS {
            assert!(text.contains(scenario.name), "missing {}", scenario.name);
        }
    }

    #[test]
    fn unknown_scenario_is_an_error() {
        let (result, _) = output(&["conflux-demo", "run", "teleport"]);
        let error = result.expect_err("unknown scenario");
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn log_level_is_global() {
        let cli = parse(&["conflux-demo", "list", "--log-level", "debug"]);
        assert_eq!(cli.log_level, "debug");
    }

    #[test]
    fn login_json_output() {
        let (result, text) = output(&[
            "conflux-demo",
            "login",
            "--username",
            "validUsername",
            "--password",
            "validPassword",
            "--json",
        ]);
        assert!(result.is_ok());
        let value: serde_json::Value = serde_json::from_str(&text).expect("json");
        assert_eq!(value["id"], "ABCD1234");
        assert_eq!(value["is_verified"], false);
    }
}
