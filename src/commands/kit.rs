use crate::app::AppContext;
use crate::kit::format_v3::{self, KitV3};
use crate::kit::kdf::{self, KdfParams};
use crate::kit::policy::Policy;
use crate::kit::{self, BuildRequest, CancelToken, prompt};
use crate::questions;
use crate::{cli, config, exit_codes, output};
use secrecy::ExposeSecret;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use zeroize::Zeroizing;

const KIT_ENV: &str = "SECQ_KIT";
const APP_DIR: &str = "secq";
const DEFAULT_KIT_FILE: &str = "kit.json";
const TEST_KDF_ENV: &str = "SECQ_TEST_KDF";

pub fn run(args: cli::KitArgs, ctx: &AppContext) -> ExitCode {
    match args.command {
        cli::KitCommands::Path(args) => run_path(args, ctx),
        cli::KitCommands::Build(args) => run_build(args, ctx),
        cli::KitCommands::Recover(args) => run_recover(args, ctx),
        cli::KitCommands::Inspect(args) => run_inspect(args, ctx),
        cli::KitCommands::Calibrate(args) => run_calibrate(args, ctx),
    }
}

fn kit_path(override_path: Option<&Path>) -> Result<PathBuf, config::ConfigError> {
    if let Some(path) = override_path {
        return Ok(path.to_path_buf());
    }

    if let Some(path) = std::env::var_os(KIT_ENV) {
        return Ok(PathBuf::from(path));
    }

    let mut dir = dirs::config_dir().ok_or(config::ConfigError::ConfigDirUnavailable)?;
    dir.push(APP_DIR);
    dir.push(DEFAULT_KIT_FILE);
    Ok(dir)
}

fn resolve_kit_path(arg: &cli::KitPathArg) -> Result<PathBuf, ExitCode> {
    kit_path(arg.kit.as_deref()).map_err(|error| {
        eprintln!("Error: {error}");
        exit_codes::exit_code_for_config_error(&error)
    })
}

fn run_path(args: cli::PathOnlyArgs, ctx: &AppContext) -> ExitCode {
    let path = match resolve_kit_path(&args.path) {
        Ok(path) => path,
        Err(code) => return code,
    };

    output::print_value(
        path.display().to_string(),
        json!({
            "kind": "kit-path",
            "path": path.display().to_string(),
        }),
        &ctx.output_mode,
    )
}

fn run_build(args: cli::BuildArgs, ctx: &AppContext) -> ExitCode {
    let out_path = match resolve_kit_path(&args.path) {
        Ok(path) => path,
        Err(code) => return code,
    };

    let loaded = match questions::load_questions(&args.questions) {
        Ok(loaded) => loaded,
        Err(error) => {
            eprintln!("Error: {error}");
            return exit_codes::exit_code_for_question_error(&error);
        }
    };
    if loaded.defaulted_all_correct > 0 {
        output::notice(
            &ctx.output_mode,
            &format!(
                "Notice: {} question(s) had no correct_answers; all alternatives treated as correct.",
                loaded.defaulted_all_correct
            ),
        );
    }

    let params = match build_params(&args) {
        Ok(params) => params,
        Err(code) => return code,
    };

    let real_secret = match prompt::prompt_real_secret() {
        Ok(secret) => secret,
        Err(error) => {
            eprintln!("Error: {error}");
            return exit_codes::exit_code_for_prompt_error(&error);
        }
    };

    let mut decoys = Vec::new();
    for index in 1..=args.prompt_decoys {
        match prompt::prompt_secret(&format!("Decoy secret {index}: ")) {
            Ok(secret) => {
                decoys.push(Zeroizing::new(secret.expose_secret().as_bytes().to_vec()));
            }
            Err(error) => {
                eprintln!("Error: {error}");
                return exit_codes::exit_code_for_prompt_error(&error);
            }
        }
    }

    let pad = match args.pad {
        Some(pad) => Some(pad),
        None => match config::default_pad() {
            Ok(configured) => configured.map(|p| p as usize),
            Err(error) => {
                eprintln!("Error: {error}");
                return exit_codes::exit_code_for_config_error(&error);
            }
        },
    };

    let policy = if args.allow_weak {
        output::notice(
            &ctx.output_mode,
            "Warning: hardness gate disabled; this kit may be brute-forceable.",
        );
        Policy::permissive()
    } else {
        Policy::standard()
    };

    let request = BuildRequest {
        questions: loaded.questions,
        real_secret: Zeroizing::new(real_secret.expose_secret().as_bytes().to_vec()),
        decoys,
        threshold: args.threshold,
        pad,
        params,
        policy,
    };

    let kit = match kit::build_kit(request) {
        Ok(kit) => kit,
        Err(error) => {
            eprintln!("Error: {error}");
            return exit_codes::exit_code_for_kit_error(&error);
        }
    };

    if let Err(error) = write_kit(&out_path, &kit) {
        eprintln!("Error: {error}");
        return exit_codes::exit_code_for_kit_error(&error);
    }

    output::print_value(
        out_path.display().to_string(),
        json!({
            "kind": "kit-build",
            "path": out_path.display().to_string(),
            "questions": kit.questions.len(),
            "secrets_count": kit.config.secrets_count,
            "pad_size": kit.config.pad_size,
            "real_threshold": kit.config.real_threshold,
        }),
        &ctx.output_mode,
    )
}

fn run_recover(args: cli::RecoverArgs, ctx: &AppContext) -> ExitCode {
    let kit_file = match resolve_kit_path(&args.path) {
        Ok(path) => path,
        Err(code) => return code,
    };

    let kit = match read_kit(&kit_file) {
        Ok(kit) => kit,
        Err(error) => {
            eprintln!("Error: {error}");
            return exit_codes::exit_code_for_kit_error(&error);
        }
    };

    let selections = match questions::load_selections(&args.answers)
        .and_then(|entries| questions::resolve_selections(&entries, &kit))
    {
        Ok(selections) => selections,
        Err(error) => {
            eprintln!("Error: {error}");
            return exit_codes::exit_code_for_question_error(&error);
        }
    };

    let recovered = match kit::recover(&kit, &selections, &CancelToken::new()) {
        Ok(recovered) => recovered,
        Err(error) => {
            eprintln!("Error: {error}");
            return exit_codes::exit_code_for_kit_error(&error);
        }
    };

    let plaintext = String::from_utf8_lossy(&recovered.plaintext).into_owned();
    output::print_value(
        plaintext,
        json!({
            "kind": "kit-recover",
            "auth_ok": recovered.auth_ok,
        }),
        &ctx.output_mode,
    )
}

fn run_inspect(args: cli::InspectArgs, ctx: &AppContext) -> ExitCode {
    let kit_file = match resolve_kit_path(&args.path) {
        Ok(path) => path,
        Err(code) => return code,
    };

    let kit = match read_kit(&kit_file) {
        Ok(kit) => kit,
        Err(error) => {
            eprintln!("Error: {error}");
            return exit_codes::exit_code_for_kit_error(&error);
        }
    };

    let total_alternatives: usize = kit.questions.iter().map(|q| q.alternatives.len()).sum();
    output::print_value(
        format!("version {}", kit.config.version),
        json!({
            "kind": "kit-inspect",
            "path": kit_file.display().to_string(),
            "version": kit.config.version,
            "questions": kit.questions.len(),
            "alternatives": total_alternatives,
            "secrets_count": kit.config.secrets_count,
            "real_threshold": kit.config.real_threshold,
            "pad_size": kit.config.pad_size,
            "argon2_params": kit.config.argon2_params,
        }),
        &ctx.output_mode,
    )
}

fn run_calibrate(args: cli::CalibrateArgs, ctx: &AppContext) -> ExitCode {
    let calibration = match kdf::calibrate(args.target_ms) {
        Ok(calibration) => calibration,
        Err(error) => {
            eprintln!("Error: {error}");
            return ExitCode::from(exit_codes::EXIT_SOFTWARE);
        }
    };

    let guess_ms = match kdf::estimate_guess_ms(calibration.params, args.samples) {
        Ok(ms) => ms,
        Err(error) => {
            eprintln!("Error: {error}");
            return ExitCode::from(exit_codes::EXIT_SOFTWARE);
        }
    };

    if args.save {
        let profile = config::KdfProfile {
            params: calibration.params,
            measured_ms: Some(calibration.measured_ms),
        };
        match config::save_profile(profile) {
            Ok(path) => output::notice(
                &ctx.output_mode,
                &format!("Saved Argon2 profile to {}", path.display()),
            ),
            Err(error) => {
                eprintln!("Error: {error}");
                return exit_codes::exit_code_for_config_error(&error);
            }
        }
    }

    let params = calibration.params;
    output::print_value(
        format!(
            "t={} m={}KiB p={} ({}ms)",
            params.time_cost, params.memory_kib, params.parallelism, calibration.measured_ms
        ),
        json!({
            "kind": "kit-calibrate",
            "params": params,
            "measured_ms": calibration.measured_ms,
            "estimated_guess_ms": guess_ms,
            "saved": args.save,
        }),
        &ctx.output_mode,
    )
}

/// Parameter precedence: explicit flags, then the saved profile, then the
/// recommended defaults. `SECQ_TEST_KDF` forces test-sized parameters.
fn build_params(args: &cli::BuildArgs) -> Result<KdfParams, ExitCode> {
    if std::env::var_os(TEST_KDF_ENV).is_some() {
        return Ok(KdfParams::for_tests());
    }

    let base = config::effective_params().map_err(|error| {
        eprintln!("Error: {error}");
        exit_codes::exit_code_for_config_error(&error)
    })?;

    let params = KdfParams {
        time_cost: args.time_cost.unwrap_or(base.time_cost),
        memory_kib: args.memory_cost.unwrap_or(base.memory_kib),
        parallelism: args.parallelism.unwrap_or(base.parallelism),
    };
    params.validate().map_err(|error| {
        eprintln!("Error: {error}");
        ExitCode::from(exit_codes::EXIT_USAGE)
    })?;
    Ok(params)
}

fn read_kit(path: &Path) -> Result<KitV3, kit::KitError> {
    let bytes = kit::io::read_bytes(path)?;
    Ok(format_v3::decode_kit(&bytes)?)
}

fn write_kit(path: &Path, kit: &KitV3) -> Result<(), kit::KitError> {
    let encoded = format_v3::encode_kit(kit)?;
    kit::io::write_bytes_atomic(path, encoded.as_bytes())?;
    Ok(())
}
