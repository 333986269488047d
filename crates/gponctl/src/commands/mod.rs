//! Command dispatch: bridges CLI args -> controller operations -> output formatting.

pub mod alarms;
pub mod config_cmd;
pub mod olts;
pub mod onus;
pub mod poll;
pub mod run;
pub mod util;

use gponctl_core::Controller;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch an inventory-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    controller: &Controller,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Run(_) => run::handle(controller, global).await,
        Command::Poll(args) => poll::handle_poll(controller, &args, global).await,
        Command::Sync(args) => poll::handle_sync(controller, &args, global).await,
        Command::Olts(args) => olts::handle(controller, args, global).await,
        Command::Onus(args) => onus::handle(controller, args, global).await,
        Command::Alarms(args) => alarms::handle(controller, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
