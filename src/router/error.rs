use std::time::Duration;
use thiserror::Error;

/// Failure talking to a router. Every router operation returns this; the
/// reconciliation layer decides whether to log and continue or to propagate.
#[derive(Error, Debug)]
pub enum RouterError {
    #[error("cannot reach router: {0}")]
    Io(#[from] std::io::Error),

    #[error("router did not answer within {0:?}")]
    Timeout(Duration),

    #[error("login rejected: {0}")]
    LoginRejected(String),

    #[error("router requires the pre-6.43 challenge login, which is not supported")]
    LegacyLogin,

    #[error("router returned an error: {0}")]
    Trap(String),

    #[error("router closed the session: {0}")]
    Fatal(String),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("session is not connected")]
    NotConnected,

    #[error("no lease with address {0}")]
    LeaseNotFound(String),

    #[error("lease has no identifier")]
    MissingLeaseId,

    #[error("comment of lease {0} is not valid UTF-8, refusing to rewrite it")]
    UndecodableComment(String),
}

impl RouterError {
    /// Whether the error means the router could not be used at all, as opposed
    /// to one request being refused.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            RouterError::Io(_)
                | RouterError::Timeout(_)
                | RouterError::LoginRejected(_)
                | RouterError::LegacyLogin
                | RouterError::Fatal(_)
                | RouterError::NotConnected
        )
    }

    /// Whether replies on the connection can no longer be paired with requests.
    /// A late reply to a timed-out command would otherwise be read by the next one.
    pub fn breaks_connection(&self) -> bool {
        matches!(
            self,
            RouterError::Io(_) | RouterError::Timeout(_) | RouterError::Fatal(_) | RouterError::Protocol(_)
        )
    }
}
