use thiserror::Error;

/// Reply used for failures whose details stay in the logs.
pub const GENERIC_FAILURE: &str = "sorry, something broke on my end. try again in a bit.";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no such user: {0}")]
    NoSuchUser(String),
    #[error("storage failure: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("invalid authentication")]
    AuthInvalid,
    #[error("{method} failed: {error}")]
    Api { method: &'static str, error: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("could not decode payload: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
#[error("could not look up user {id}: {source}")]
pub struct LookupError {
    pub id: String,
    #[source]
    pub source: ChatError,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("{0} can't receive karma.")]
    Blacklisted(String),
    #[error("You cannot give yourself points.")]
    SelfKarmaDisallowed,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid alias {0:?}: expected name++alias[++alias...]")]
    InvalidAlias(String),
    #[error("reactji {0:?} is configured as both upvote and downvote")]
    OverlappingReactji(String),
    #[error("invalid dashboard url {0:?}")]
    InvalidDashboardUrl(String),
}

#[derive(Debug, Error)]
#[error("dashboard unavailable: {0}")]
pub struct DashboardError(pub String);

/// Everything that can go wrong while carrying out one classified command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Lookup(#[from] LookupError),
    #[error("{0}")]
    NoSuchUser(String),
    #[error(transparent)]
    Policy(#[from] PolicyError),
    #[error("persistence failure: {0}")]
    Persistence(StoreError),
    #[error(transparent)]
    Dashboard(#[from] DashboardError),
    #[error("reply failed: {0}")]
    Transport(#[from] ChatError),
}

impl From<StoreError> for CommandError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NoSuchUser(_) => Self::NoSuchUser(err.to_string()),
            StoreError::Backend(_) => Self::Persistence(err),
        }
    }
}

impl CommandError {
    /// Text shown to the chat user. Expected outcomes are shown verbatim,
    /// faults only when `debug` is on.
    #[must_use]
    pub fn user_message(&self, debug: bool) -> String {
        match self {
            Self::NoSuchUser(_) | Self::Policy(_) => self.to_string(),
            Self::Lookup(_) | Self::Persistence(_) | Self::Dashboard(_) | Self::Transport(_) => {
                if debug {
                    self.to_string()
                } else {
                    GENERIC_FAILURE.to_owned()
                }
            }
        }
    }

    /// Whether the error is an ordinary outcome rather than a fault.
    #[must_use]
    pub const fn is_expected(&self) -> bool {
        matches!(self, Self::NoSuchUser(_) | Self::Policy(_))
    }
}
