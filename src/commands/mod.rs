mod kit;

use crate::app::AppContext;
use crate::cli;
use std::process::ExitCode;

pub fn dispatch(command: cli::Commands, ctx: &AppContext) -> ExitCode {
    match command {
        cli::Commands::Kit(args) => kit::run(args, ctx),
    }
}
