use conflux_core::DecodeError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DemoError>;

/// Failures produced by the mock service and the joke pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

#[derive(Debug, Error)]
pub enum DemoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown scenario: {name} (try `conflux-demo list`)")]
    UnknownScenario { name: String },

    #[error("request failed: {0}")]
    Api(#[from] ApiError),
}

impl DemoError {
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UnknownScenario { .. } => 2,
            Self::Api(_) => 3,
            Self::Io(_) => 1,
        }
    }

    #[must_use]
    pub fn unknown_scenario(name: impl Into<String>) -> Self {
        Self::UnknownScenario { name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_distinguish_usage_from_request_failures() {
        assert_eq!(DemoError::unknown_scenario("nope").exit_code(), 2);
        assert_eq!(DemoError::from(ApiError::InvalidCredentials).exit_code(), 3);
        let io = std::io::Error::other("closed");
        assert_eq!(DemoError::from(io).exit_code(), 1);
    }

    #[test]
    fn decode_errors_display_transparently() {
        let error = ApiError::from(DecodeError::new("expected value"));
        assert_eq!(error.to_string(), DecodeError::new("expected value").to_string());
    }

    #[test]
    fn unknown_scenario_message_names_it() {
        let message = DemoError::unknown_scenario("teleport").to_string();
        assert!(message.contains("teleport"));
    }
}
