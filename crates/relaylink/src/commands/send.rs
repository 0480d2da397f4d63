//! `send`: relay a raw command line.

use relaylink_api::Command;
use relaylink_core::Session;

use crate::cli::{GlobalOpts, SendArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(session: &Session, args: SendArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let line = args.command.join(" ");
    let command = Command::raw(&line).map_err(|e| CliError::Validation {
        field: "command".into(),
        reason: e.to_string(),
    })?;

    session.send(command).await?;
    output::note(global, &format!("Sent `{line}` on {}", session.channel()));
    Ok(())
}
