//! Mock credential and user service.
//!
//! [`Api`] holds its operations as swappable function values so tests and
//! scenarios can inject alternatives without a trait object per call site.
//! The defaults answer synchronously: a fixed token for the valid
//! credential pair, and a fixed user for any token.

use std::fmt;
use std::rc::Rc;

use conflux_core::{AnyPublisher, Fail, Just, PublisherExt};
use serde::Serialize;
use tracing::debug;

use crate::error::ApiError;

pub const VALID_USERNAME: &str = "validUsername";
pub const VALID_PASSWORD: &str = "validPassword";

/// Token returned by the default login.
pub const TOKEN: &str = "TheToken";

/// A username/password pair as entered by a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The pair the default login accepts.
    #[must_use]
    pub fn valid() -> Self {
        Self::new(VALID_USERNAME, VALID_PASSWORD)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub is_verified: bool,
}

impl User {
    /// The user every default `fetch_user` call returns.
    #[must_use]
    pub fn fixture() -> Self {
        Self {
            id: "ABCD1234".to_string(),
            name: "Hoppekat".to_string(),
            email: Some("test@test.dk".to_string()),
            is_verified: false,
        }
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)?;
        if let Some(email) = &self.email {
            write!(f, " <{email}>")?;
        }
        if self.is_verified {
            f.write_str(" verified")?;
        }
        Ok(())
    }
}

pub type LoginFn = dyn Fn(&str, &str) -> AnyPublisher<String, ApiError>;
pub type FetchUserFn = dyn Fn(&str) -> AnyPublisher<User, ApiError>;

#[derive(Clone)]
pub struct Api {
    login: Rc<LoginFn>,
    fetch_user: Rc<FetchUserFn>,
}

impl Api {
    pub fn new(
        login: impl Fn(&str, &str) -> AnyPublisher<String, ApiError> + 'static,
        fetch_user: impl Fn(&str) -> AnyPublisher<User, ApiError> + 'static,
    ) -> Self {
        Self {
            login: Rc::new(login),
            fetch_user: Rc::new(fetch_user),
        }
    }

    #[must_use]
    pub fn with_login(
        mut self,
        login: impl Fn(&str, &str) -> AnyPublisher<String, ApiError> + 'static,
    ) -> Self {
        self.login = Rc::new(login);
        self
    }

    #[must_use]
    pub fn with_fetch_user(
        mut self,
        fetch_user: impl Fn(&str) -> AnyPublisher<User, ApiError> + 'static,
    ) -> Self {
        self.fetch_user = Rc::new(fetch_user);
        self
    }

    /// Exchange credentials for a token.
    pub fn login(&self, username: &str, password: &str) -> AnyPublisher<String, ApiError> {
        debug!(username, "login requested");
        (self.login)(username, password)
    }

    pub fn fetch_user(&self, token: &str) -> AnyPublisher<User, ApiError> {
        debug!("user fetch requested");
        (self.fetch_user)(token)
    }

    /// Log in, then fetch the user with the resulting token. A login
    /// failure ends the chain before `fetch_user` is ever called.
    pub fn login_and_fetch_user(
        &self,
        username: &str,
        password: &str,
    ) -> AnyPublisher<User, ApiError> {
        let api = self.clone();
        self.login(username, password)
            .flat_map(move |token| api.fetch_user(&token))
            .boxed()
    }
}

impl Default for Api {
    fn default() -> Self {
        Self::new(default_login, default_fetch_user)
    }
}

impl fmt::Debug for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Api").finish_non_exhaustive()
    }
}

fn default_login(username: &str, password: &str) -> AnyPublisher<String, ApiError> {
    if username != VALID_USERNAME || password != VALID_PASSWORD {
        return Fail::new(ApiError::InvalidCredentials).boxed();
    }
    Just::new(TOKEN.to_string()).set_failure_type().boxed()
}

fn default_fetch_user(_token: &str) -> AnyPublisher<User, ApiError> {
    Just::new(User::fixture()).set_failure_type().boxed()
}
