use serde_json::json;
use std::process::ExitCode;

pub struct OutputMode {
    pub json: bool,
    pub quiet: bool,
}

/// Print a command result: the bare value in text mode, a `{value, meta}`
/// object in JSON mode.
pub fn print_value(value: String, meta: serde_json::Value, mode: &OutputMode) -> ExitCode {
    if mode.json {
        let payload = json!({
            "value": value,
            "meta": meta,
        });
        println!("{payload}");
    } else {
        println!("{value}");
    }
    ExitCode::SUCCESS
}

/// Informational notice on stderr, silenced by `--quiet`.
pub fn notice(mode: &OutputMode, message: &str) {
    if !mode.quiet {
        eprintln!("{message}");
    }
}
