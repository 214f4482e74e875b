use crate::{cli, commands, exit_codes, output};
use clap::error::ErrorKind as ClapErrorKind;
use clap::{ColorChoice, CommandFactory, FromArgMatches};
use std::io::IsTerminal;
use std::process::ExitCode;

pub(crate) struct AppContext {
    pub output_mode: output::OutputMode,
}

pub fn run() -> ExitCode {
    env_logger::init();

    // Respect NO_COLOR and piped output before clap renders anything.
    let mut command = cli::Cli::command();
    if !use_color() {
        command = command.color(ColorChoice::Never);
    }

    let cli = match command.clone().try_get_matches() {
        Ok(matches) => match cli::Cli::from_arg_matches(&matches) {
            Ok(cli) => cli,
            Err(err) => {
                let _ = err.print();
                return ExitCode::from(exit_codes::EXIT_USAGE);
            }
        },
        Err(err) if matches!(err.kind(), ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion) => {
            let _ = err.print();
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(exit_codes::EXIT_USAGE);
        }
    };

    let Some(subcommand) = cli.command else {
        command.print_help().expect("help to be printed");
        println!();
        return ExitCode::from(exit_codes::EXIT_USAGE);
    };

    let ctx = AppContext {
        output_mode: output::OutputMode {
            json: cli.json,
            quiet: cli.quiet,
        },
    };
    commands::dispatch(subcommand, &ctx)
}

fn use_color() -> bool {
    std::env::var_os("NO_COLOR").is_none()
        && std::io::stdout().is_terminal()
        && std::io::stderr().is_terminal()
}
