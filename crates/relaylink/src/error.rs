//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use relaylink_config::ConfigError;
use relaylink_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Link ─────────────────────────────────────────────────────────
    #[error("Channel is offline: {reason}")]
    #[diagnostic(
        code(relaylink::channel_offline),
        help(
            "Check the cable and that the module is powered.\n\
             List attached ports with: relaylink ports"
        )
    )]
    ChannelOffline { reason: String },

    #[error("Channel is busy: {reason}")]
    #[diagnostic(
        code(relaylink::channel_busy),
        help("A USB device may still be enumerating, or another program holds the port. Try again shortly.")
    )]
    ChannelBusy { reason: String },

    // ── Channels ─────────────────────────────────────────────────────
    #[error("Unknown channel '{channel}'")]
    #[diagnostic(
        code(relaylink::unknown_channel),
        help(
            "Configured channels: {available}\n\
             Run: relaylink channels"
        )
    )]
    UnknownChannel { channel: String, available: String },

    #[error("No channels configured")]
    #[diagnostic(
        code(relaylink::no_channels),
        help(
            "Add a [channels.<id>] table to {path}\n\
             Or pass --port <device> to use a serial port directly."
        )
    )]
    NoChannels { path: String },

    // ── Session ──────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(relaylink::not_found),
        help("Run: relaylink {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("{message}")]
    #[diagnostic(code(relaylink::invalid_state))]
    InvalidState { message: String },

    #[error("Engine error: {message}")]
    #[diagnostic(code(relaylink::engine))]
    Engine { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(relaylink::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(relaylink::config),
        help("Check the config file, or RELAYLINK_* environment overrides.")
    )]
    Config(Box<ConfigError>),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON serialization failed: {0}")]
    #[diagnostic(code(relaylink::json))]
    Json(#[from] serde_json::Error),
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ChannelOffline { .. } | Self::ChannelBusy { .. } => exit_code::CONNECTION,
            Self::UnknownChannel { .. } | Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::InvalidState { .. } => exit_code::CONFLICT,
            Self::Validation { .. } | Self::NoChannels { .. } | Self::Config(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ChannelOffline { reason } => Self::ChannelOffline { reason },

            CoreError::ChannelBusy { reason } => Self::ChannelBusy { reason },

            CoreError::UnknownChannel { channel } => Self::UnknownChannel {
                channel,
                available: String::new(),
            },

            CoreError::EntityNotFound { key } => Self::NotFound {
                resource_type: "network".into(),
                identifier: key.to_string(),
                list_command: "scan".into(),
            },

            err @ CoreError::InvalidTransition { .. } => Self::InvalidState {
                message: err.to_string(),
            },

            CoreError::InvalidCommand { command, reason } => Self::Validation {
                field: "command".into(),
                reason: format!("{command:?}: {reason}"),
            },

            err @ (CoreError::SessionClosed { .. }
            | CoreError::Portal { .. }
            | CoreError::Config { .. }
            | CoreError::Internal(_)) => Self::Engine {
                message: err.to_string(),
            },
        }
    }
}
