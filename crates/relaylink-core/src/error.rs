// ── Core error types ──
//
// What the engine reports to its consumers. Link failures arrive from
// relaylink-api and are folded into channel-level variants here; remote
// output that fails to parse never becomes an error at all.

use relaylink_api::TransportError;
use thiserror::Error;

use crate::model::EntityKey;
use crate::session::SessionState;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Channel errors ───────────────────────────────────────────────
    #[error("Channel offline: {reason}")]
    ChannelOffline { reason: String },

    #[error("Channel busy: {reason}")]
    ChannelBusy { reason: String },

    #[error("Unknown channel: {channel}")]
    UnknownChannel { channel: String },

    // ── Session errors ───────────────────────────────────────────────
    #[error("No network with index {key}")]
    EntityNotFound { key: EntityKey },

    #[error("Cannot {operation} while {from}")]
    InvalidTransition {
        from: SessionState,
        operation: &'static str,
    },

    #[error("Invalid command {command:?}: {reason}")]
    InvalidCommand { command: String, reason: String },

    #[error("Session for channel {channel} has shut down")]
    SessionClosed { channel: String },

    // ── Collaborators ────────────────────────────────────────────────
    #[error("Portal error: {message}")]
    Portal { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// The channel is unusable right now but may come back.
    pub fn is_offline(&self) -> bool {
        matches!(self, Self::ChannelOffline { .. } | Self::ChannelBusy { .. })
    }
}

// ── Conversion from protocol-layer errors ────────────────────────────

impl From<TransportError> for CoreError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Busy { reason } => Self::ChannelBusy { reason },
            TransportError::Disconnected => Self::ChannelOffline {
                reason: "disconnected".into(),
            },
            TransportError::Io(e) => Self::ChannelOffline { reason: e.to_string() },
        }
    }
}

impl From<relaylink_api::Error> for CoreError {
    fn from(err: relaylink_api::Error) -> Self {
        match err {
            relaylink_api::Error::Transport(e) => e.into(),
            relaylink_api::Error::InvalidCommand { command, reason } => Self::InvalidCommand {
                command,
                reason: reason.into(),
            },
        }
    }
}
