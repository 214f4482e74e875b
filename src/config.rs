//! Tool configuration: the calibrated Argon2 profile and pad default.
//!
//! Stored as TOML under the platform config directory (override with
//! `SECQ_CONFIG`). The config never contains secrets, questions or kit
//! material; it only remembers what `kit calibrate --save` measured so later
//! builds reuse the profile.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::kit::kdf::KdfParams;

const CONFIG_ENV: &str = "SECQ_CONFIG";
const APP_DIR: &str = "secq";
const CONFIG_FILE_NAME: &str = "config.toml";
const CURRENT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to determine configuration directory")]
    ConfigDirUnavailable,

    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("config schema version '{0}' is not supported")]
    UnsupportedSchemaVersion(u32),
}

/// A saved calibration result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfProfile {
    #[serde(flatten)]
    pub params: KdfParams,
    /// Wall-clock per derivation observed at calibration time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measured_ms: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FileConfig {
    #[serde(default)]
    schema_version: Option<u32>,
    #[serde(default)]
    kdf: Option<KdfProfile>,
    #[serde(default)]
    default_pad: Option<u32>,
}

pub fn config_path() -> Result<PathBuf, ConfigError> {
    if let Ok(path) = env::var(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }

    let mut dir = dirs::config_dir().ok_or(ConfigError::ConfigDirUnavailable)?;
    dir.push(APP_DIR);
    dir.push(CONFIG_FILE_NAME);
    Ok(dir)
}

/// Argon2 parameters to use when the caller passed none: the saved profile
/// if there is one, the recommended defaults otherwise.
pub fn effective_params() -> Result<KdfParams, ConfigError> {
    Ok(load(&config_path()?)?
        .kdf
        .map(|profile| profile.params)
        .unwrap_or_else(KdfParams::recommended))
}

pub fn saved_profile() -> Result<Option<KdfProfile>, ConfigError> {
    Ok(load(&config_path()?)?.kdf)
}

pub fn save_profile(profile: KdfProfile) -> Result<PathBuf, ConfigError> {
    let path = config_path()?;
    let mut config = load(&path)?;
    config.kdf = Some(profile);
    config.schema_version = Some(CURRENT_SCHEMA_VERSION);
    persist(&path, &config)?;
    Ok(path)
}

pub fn default_pad() -> Result<Option<u32>, ConfigError> {
    Ok(load(&config_path()?)?.default_pad)
}

fn load(path: &Path) -> Result<FileConfig, ConfigError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(FileConfig::default());
        }
        Err(err) => return Err(err.into()),
    };

    let config: FileConfig = toml::from_str(&contents)?;
    let version = config.schema_version.unwrap_or(0);
    if version > CURRENT_SCHEMA_VERSION {
        return Err(ConfigError::UnsupportedSchemaVersion(version));
    }
    Ok(config)
}

fn persist(path: &Path, config: &FileConfig) -> Result<(), ConfigError> {
    let parent = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&parent)?;

    let toml = toml::to_string_pretty(config)?;
    let mut temp = NamedTempFile::new_in(&parent)?;
    temp.write_all(toml.as_bytes())?;
    temp.flush()?;
    temp.persist(path).map_err(|err| ConfigError::Io(err.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = load(&path).unwrap();
        assert!(config.kdf.is_none());
        assert!(config.schema_version.is_none());
    }

    #[test]
    fn profile_roundtrips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let profile = KdfProfile {
            params: KdfParams {
                time_cost: 4,
                memory_kib: 524_288,
                parallelism: 2,
            },
            measured_ms: Some(310),
        };
        let config = FileConfig {
            schema_version: Some(CURRENT_SCHEMA_VERSION),
            kdf: Some(profile),
            default_pad: Some(256),
        };
        persist(&path, &config).unwrap();

        let loaded = load(&path).unwrap();
        assert_eq!(loaded.kdf, Some(profile));
        assert_eq!(loaded.default_pad, Some(256));
    }

    #[test]
    fn newer_schema_versions_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "schema_version = 99\n").unwrap();

        assert!(matches!(
            load(&path),
            Err(ConfigError::UnsupportedSchemaVersion(99))
        ));
    }
}
