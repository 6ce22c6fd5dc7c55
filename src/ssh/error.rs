use std::time::Duration;

use thiserror::Error as ThisError;

/// Coarse failure class; drives status classification and the skip policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    AuthFailure,
    Timeout,
    ConnectionError,
    ProtocolError,
}

#[derive(Debug, Clone, ThisError)]
pub enum SessionError {
    #[error("authentication failed for {username}@{address}")]
    Auth { address: String, username: String },
    #[error("connection to {address} timed out after {}s", after.as_secs())]
    Timeout { address: String, after: Duration },
    #[error("connection to {address} failed: {message}")]
    Connection { address: String, message: String },
    #[error("ssh protocol error with {address}: {message}")]
    Protocol { address: String, message: String },
}

impl SessionError {
    pub fn kind(&self) -> FailureKind {
        match self {
            SessionError::Auth { .. } => FailureKind::AuthFailure,
            SessionError::Timeout { .. } => FailureKind::Timeout,
            SessionError::Connection { .. } => FailureKind::ConnectionError,
            SessionError::Protocol { .. } => FailureKind::ProtocolError,
        }
    }

    pub fn address(&self) -> &str {
        match self {
            SessionError::Auth { address, .. }
            | SessionError::Timeout { address, .. }
            | SessionError::Connection { address, .. }
            | SessionError::Protocol { address, .. } => address,
        }
    }

    pub(crate) fn from_russh(address: &str, after: Duration, err: russh::Error) -> Self {
        match err {
            russh::Error::ConnectionTimeout | russh::Error::InactivityTimeout => {
                SessionError::Timeout {
                    address: address.to_string(),
                    after,
                }
            }
            russh::Error::IO(e) => Self::from_io(address, after, e),
            other => SessionError::Protocol {
                address: address.to_string(),
                message: other.to_string(),
            },
        }
    }

    pub(crate) fn from_io(address: &str, after: Duration, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::TimedOut {
            SessionError::Timeout {
                address: address.to_string(),
                after,
            }
        } else {
            SessionError::Connection {
                address: address.to_string(),
                message: err.to_string(),
            }
        }
    }

    pub(crate) fn from_sftp(address: &str, err: russh_sftp::client::error::Error) -> Self {
        SessionError::Protocol {
            address: address.to_string(),
            message: err.to_string(),
        }
    }
}
