use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "secq",
    author,
    version,
    about = "Threshold security-question recovery kits with decoy secrets.",
    long_about = "Protects a secret behind multiple-choice security questions. \
                  Enough correct answers reconstruct the real secret; plausible \
                  but wrong answer sets reconstruct a decoy, indistinguishably."
)]
pub struct Cli {
    #[arg(long, global = true, help = "Emit machine-readable JSON output.")]
    pub json: bool,

    #[arg(long, global = true, help = "Suppress informational notices.")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    #[command(about = "Build, inspect and recover recovery kits.")]
    Kit(KitArgs),
}

#[derive(Debug, Args)]
pub struct KitArgs {
    #[command(subcommand)]
    pub command: KitCommands,
}

#[derive(Debug, Subcommand)]
pub enum KitCommands {
    #[command(about = "Build a recovery kit from a question file.")]
    Build(BuildArgs),

    #[command(about = "Recover a secret from a kit and a selection file.")]
    Recover(RecoverArgs),

    #[command(about = "Show a kit's public parameters.")]
    Inspect(InspectArgs),

    #[command(about = "Calibrate Argon2id parameters to a wall-clock target.")]
    Calibrate(CalibrateArgs),

    #[command(about = "Print the kit path that would be used by default.")]
    Path(PathOnlyArgs),
}

#[derive(Debug, Args)]
pub struct KitPathArg {
    #[arg(long, value_name = "FILE", help = "Kit file (default: SECQ_KIT or the platform config dir).")]
    pub kit: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct BuildArgs {
    #[arg(long, value_name = "FILE", help = "Question file (JSON).")]
    pub questions: PathBuf,

    #[command(flatten)]
    pub path: KitPathArg,

    #[arg(long, help = "Real-share threshold T.")]
    pub threshold: usize,

    #[arg(long, help = "Pad size in bytes; defaults to a recommendation with headroom.")]
    pub pad: Option<usize>,

    #[arg(
        long = "prompt-decoys",
        value_name = "N",
        default_value_t = 0,
        help = "Prompt for this many decoy secrets (no-echo). One default decoy is generated when zero."
    )]
    pub prompt_decoys: usize,

    #[arg(long, value_name = "N", help = "Argon2id passes (1..10).")]
    pub time_cost: Option<u32>,

    #[arg(long, value_name = "KIB", help = "Argon2id memory in KiB (8192..1048576).")]
    pub memory_cost: Option<u32>,

    #[arg(long, value_name = "N", help = "Argon2id lanes (1..32).")]
    pub parallelism: Option<u32>,

    #[arg(
        long,
        action = clap::ArgAction::SetTrue,
        help = "Skip the hardness gate and threshold floor. The kit will be weak."
    )]
    pub allow_weak: bool,
}

#[derive(Debug, Args)]
pub struct RecoverArgs {
    #[command(flatten)]
    pub path: KitPathArg,

    #[arg(long, value_name = "FILE", help = "Selection file (JSON).")]
    pub answers: PathBuf,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    #[command(flatten)]
    pub path: KitPathArg,
}

#[derive(Debug, Args)]
pub struct CalibrateArgs {
    #[arg(long, value_name = "MS", default_value_t = crate::kit::kdf::CALIBRATION_DEFAULT_TARGET_MS,
          help = "Per-derivation wall-clock target.")]
    pub target_ms: u64,

    #[arg(long, value_name = "N", default_value_t = 3, help = "Samples for the per-guess estimate.")]
    pub samples: u32,

    #[arg(long, action = clap::ArgAction::SetTrue, help = "Persist the result to the config file.")]
    pub save: bool,
}

#[derive(Debug, Args)]
pub struct PathOnlyArgs {
    #[command(flatten)]
    pub path: KitPathArg,
}
