use crate::config;
use crate::kit::KitError;
use crate::kit::policy::PolicyError;
use crate::kit::prompt::PromptError;
use crate::questions::QuestionError;
use std::process::ExitCode;

pub const EXIT_USAGE: u8 = 64;
pub const EXIT_IO: u8 = 2;
pub const EXIT_SOFTWARE: u8 = 1;

pub fn exit_code_for_config_error(error: &config::ConfigError) -> ExitCode {
    use config::ConfigError::*;

    match error {
        ConfigDirUnavailable | Io(_) => ExitCode::from(EXIT_IO),
        Parse(_) | Serialize(_) | UnsupportedSchemaVersion(_) => ExitCode::from(EXIT_SOFTWARE),
    }
}

pub fn exit_code_for_question_error(error: &QuestionError) -> ExitCode {
    use QuestionError::*;

    match error {
        Io(_) => ExitCode::from(EXIT_IO),
        Json(_) | Empty | InvalidQuestion { .. } | UnknownQuestion(_) | UnknownAnswer { .. } => {
            ExitCode::from(EXIT_USAGE)
        }
    }
}

pub fn exit_code_for_prompt_error(error: &PromptError) -> ExitCode {
    use PromptError::*;

    match error {
        Io(_) => ExitCode::from(EXIT_IO),
        Empty | Mismatch => ExitCode::from(EXIT_USAGE),
    }
}

pub fn exit_code_for_kit_error(error: &KitError) -> ExitCode {
    use KitError::*;

    match error {
        Policy(PolicyError::HardnessBelowFloor { .. })
        | Policy(PolicyError::ThresholdBelowFloor { .. })
        | Policy(PolicyError::ThresholdAboveCorrect { .. })
        | SecretOutOfPolicy
        | TooManyDecoys
        | TooManyAlternatives
        | DuplicateQuestion
        | Kdf(_)
        | PadTooSmall { .. } => ExitCode::from(EXIT_USAGE),
        InvalidKit(_) | CryptoFailure | InsufficientShares | Cancelled => {
            ExitCode::from(EXIT_SOFTWARE)
        }
        Io(_) => ExitCode::from(EXIT_IO),
    }
}
