use kcp_client::ClientError;

use crate::controllers::workspace::Action;
use crate::controllers::workspace::ReconcileState;
use crate::controllers::workspace::StepOutcome;

#[derive(thiserror::Error, Debug)]
pub enum ReconcileError {
    #[error("client error: {0}")]
    Client(#[from] ClientError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("{0:?} requires a fetched workspace")]
    OutOfOrder(Action),
}

/// state machine was fed an outcome it can not accept
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("no transition from {state:?} on {outcome:?}")]
pub struct TransitionError {
    pub state: ReconcileState,
    pub outcome: StepOutcome,
}

#[derive(thiserror::Error, Debug)]
pub enum ResolveError {
    #[error("client error: {0}")]
    Client(#[from] ClientError),
    #[error("workspace type {0} not found")]
    NotFound(String),
    #[error("no workspace type found")]
    Empty,
    #[error("expected exactly one workspace type, found {0}")]
    Ambiguous(usize),
    #[error("workspace type {0} has no virtual workspace url")]
    NoVirtualWorkspaces(String),
    #[error("invalid configuration: {0}")]
    Config(#[from] kcp_client::ConfigError),
}

#[derive(thiserror::Error, Debug)]
pub enum CredentialError {
    #[error("client error: {0}")]
    Client(#[from] ClientError),
    #[error("the secret for cluster {secret} is missing a non-empty value for {key:?}")]
    MissingData { secret: String, key: &'static str },
    #[error("the secret for cluster {secret} has invalid base64 in {key:?}: {source}")]
    Base64 {
        secret: String,
        key: &'static str,
        source: base64::DecodeError,
    },
    #[error("the secret for cluster {secret} has a token that is not utf-8: {source}")]
    InvalidToken {
        secret: String,
        source: std::string::FromUtf8Error,
    },
    #[error("invalid configuration for cluster {secret}: {source}")]
    Config {
        secret: String,
        source: kcp_client::ConfigError,
    },
}
