mod app;
mod cli;
mod commands;
mod config;
mod exit_codes;
mod kit;
mod output;
mod questions;

use std::process::ExitCode;

fn main() -> ExitCode {
    app::run()
}
