//! Command dispatch: bridges CLI args -> session operations -> output formatting.

pub mod channels;
pub mod lists;
pub mod observe;
pub mod ports;
pub mod scan;
pub mod send;

use relaylink_core::ChannelRegistry;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a channel-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, registry: &ChannelRegistry, global: &GlobalOpts) -> Result<(), CliError> {
    let session = registry.active_session()?;
    match cmd {
        Command::Scan => scan::handle(&session, global).await,
        Command::Observe(args) => observe::handle(&session, &args, global).await,
        Command::Probes => lists::probes(&session, global).await,
        Command::Hosts => lists::hosts(&session, global).await,
        Command::Send(args) => send::handle(&session, args, global).await,
        // Local commands are handled before dispatch
        Command::Ports | Command::Channels | Command::Completions(_) => Err(CliError::Engine {
            message: "command does not use a channel".into(),
        }),
    }
}
