use thiserror::Error;

/// Failure of the physical link underneath a [`Transport`](crate::Transport).
///
/// A read timeout is *not* an error: `read` returns `Ok(0)` instead.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The link went away (cable pulled, port closed, EOF).
    #[error("channel disconnected")]
    Disconnected,

    /// The device is not attached yet (e.g. USB-CDC not enumerated).
    #[error("channel busy: {reason}")]
    Busy { reason: String },

    /// Any other I/O failure, kept for diagnostics.
    #[error("serial I/O error: {0}")]
    Io(std::io::Error),
}

impl TransportError {
    pub fn busy(reason: impl Into<String>) -> Self {
        Self::Busy {
            reason: reason.into(),
        }
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::BrokenPipe
            | ErrorKind::NotConnected
            | ErrorKind::UnexpectedEof
            | ErrorKind::ConnectionAborted
            | ErrorKind::ConnectionReset => Self::Disconnected,
            ErrorKind::NotFound => Self::Busy {
                reason: err.to_string(),
            },
            _ => Self::Io(err),
        }
    }
}

impl From<serialport::Error> for TransportError {
    fn from(err: serialport::Error) -> Self {
        match err.kind() {
            serialport::ErrorKind::NoDevice => Self::Busy {
                reason: err.description,
            },
            serialport::ErrorKind::Io(kind) => Self::from(std::io::Error::new(kind, err.description)),
            _ => Self::Io(std::io::Error::other(err.description)),
        }
    }
}

/// Top-level error type for the `relaylink-api` crate.
#[derive(Debug, Error)]
pub enum Error {
    // ── Link ────────────────────────────────────────────────────────
    #[error(transparent)]
    Transport(#[from] TransportError),

    // ── Protocol ────────────────────────────────────────────────────
    /// A command line was empty or contained an embedded CR/LF.
    #[error("invalid command {command:?}: {reason}")]
    InvalidCommand { command: String, reason: &'static str },
}

impl Error {
    /// Returns `true` if the link is gone and must be reopened.
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Disconnected))
    }

    /// Returns `true` if retrying later might succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(TransportError::Busy { .. } | TransportError::Disconnected)
        )
    }
}
