//! Per-answer key derivation with Argon2id.
//!
//! Every envelope key is derived from the normalized answer text and a
//! per-envelope random salt. There is no password anywhere in the scheme:
//! knowing which answers to pick *is* the credential, and the memory-hard
//! KDF is what makes enumerating answer combinations expensive.
//!
//! Calibration sizes the parameters to a wall-clock target on the machine
//! building the kit, since that cost is paid once per selected answer during
//! recovery but once per *guess* by an attacker.

use argon2::{Algorithm, Argon2, Params as Argon2Params, Version};
use secrecy::SecretSlice;
use std::time::Instant;
use thiserror::Error;
use zeroize::Zeroize;

/// Output size (bytes) of every derivation; doubles as the AEAD key size.
pub const KEY_LEN: usize = 32;
/// Size (bytes) of per-envelope salts.
pub const SALT_LEN: usize = 16;

/// Parameter bounds accepted by the kit format.
pub const TIME_COST_RANGE: (u32, u32) = (1, 10);
pub const MEMORY_KIB_RANGE: (u32, u32) = (8_192, 1_048_576);
pub const PARALLELISM_RANGE: (u32, u32) = (1, 32);

/// Calibration defaults: start at 256 MiB, 2 passes, and grow until a single
/// derivation costs at least the target.
const CALIBRATION_START: KdfParams = KdfParams {
    time_cost: 2,
    memory_kib: 256 * 1024,
    parallelism: 1,
};
const CALIBRATION_MAX_MEMORY_KIB: u32 = 1_048_576;
const CALIBRATION_MAX_TIME_COST: u32 = 6;
pub const CALIBRATION_DEFAULT_TARGET_MS: u64 = 250;

/// Derived key bytes with zeroize-on-drop semantics.
pub type KeyBytes = SecretSlice<u8>;

/// Argon2id tuning parameters, persisted in the kit and in every envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct KdfParams {
    pub time_cost: u32,
    #[serde(rename = "memory_cost")]
    pub memory_kib: u32,
    pub parallelism: u32,
}

impl KdfParams {
    /// Defaults matching the interactive tool's "normal" profile.
    pub fn recommended() -> Self {
        Self {
            time_cost: 3,
            memory_kib: 65_536,
            parallelism: 4,
        }
    }

    /// Small parameters for test runs; never acceptable for real kits.
    pub fn for_tests() -> Self {
        Self {
            time_cost: 1,
            memory_kib: 8_192,
            parallelism: 1,
        }
    }

    pub fn validate(&self) -> Result<(), KdfError> {
        let in_range = |v: u32, (lo, hi): (u32, u32)| v >= lo && v <= hi;
        if !in_range(self.time_cost, TIME_COST_RANGE)
            || !in_range(self.memory_kib, MEMORY_KIB_RANGE)
            || !in_range(self.parallelism, PARALLELISM_RANGE)
        {
            return Err(KdfError::ParamsOutOfRange {
                time_cost: self.time_cost,
                memory_kib: self.memory_kib,
                parallelism: self.parallelism,
            });
        }
        Ok(())
    }

    fn to_argon2(self) -> Result<Argon2Params, KdfError> {
        Ok(Argon2Params::new(
            self.memory_kib,
            self.time_cost,
            self.parallelism,
            Some(KEY_LEN),
        )?)
    }
}

#[derive(Debug, Error)]
pub enum KdfError {
    #[error("argon2 parameters out of range: t={time_cost} m={memory_kib}KiB p={parallelism}")]
    ParamsOutOfRange {
        time_cost: u32,
        memory_kib: u32,
        parallelism: u32,
    },

    #[error("argon2 error")]
    Argon2(#[from] argon2::Error),
}

/// Derive a 32-byte key from answer text and a 16-byte salt.
///
/// The answer must already be normalized (`hasher::norm`); this function
/// does not normalize so that callers cannot accidentally double-normalize.
pub fn derive_key(
    answer_bytes: &[u8],
    salt: &[u8; SALT_LEN],
    params: KdfParams,
) -> Result<KeyBytes, KdfError> {
    params.validate()?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.to_argon2()?);

    let mut out = vec![0u8; KEY_LEN];
    if let Err(err) = argon2.hash_password_into(answer_bytes, salt, &mut out) {
        out.zeroize();
        return Err(err.into());
    }
    Ok(KeyBytes::from(out))
}

/// Result of a calibration run.
#[derive(Debug, Clone, Copy)]
pub struct Calibration {
    pub params: KdfParams,
    pub measured_ms: u64,
}

/// Find parameters whose single-derivation cost reaches `target_ms`.
///
/// Memory doubles from 256 MiB up to 1 GiB first, then time_cost grows up to
/// 6. Stops at the cap even if still under target; the caller decides whether
/// that is acceptable.
pub fn calibrate(target_ms: u64) -> Result<Calibration, KdfError> {
    let mut params = CALIBRATION_START;

    loop {
        let measured_ms = measure_once(params)?;
        if measured_ms >= target_ms {
            return Ok(Calibration {
                params,
                measured_ms,
            });
        }

        if params.memory_kib < CALIBRATION_MAX_MEMORY_KIB {
            params.memory_kib = (params.memory_kib * 2).min(CALIBRATION_MAX_MEMORY_KIB);
        } else if params.time_cost < CALIBRATION_MAX_TIME_COST {
            params.time_cost += 1;
        } else {
            return Ok(Calibration {
                params,
                measured_ms,
            });
        }
    }
}

/// Average wall-clock milliseconds of one derivation over `samples` runs.
///
/// Feeds brute-force cost estimates; the probe inputs are fixed and public.
pub fn estimate_guess_ms(params: KdfParams, samples: u32) -> Result<f64, KdfError> {
    let samples = samples.max(1);
    let mut total_ms = 0u64;
    for _ in 0..samples {
        total_ms += measure_once(params)?;
    }
    Ok(total_ms as f64 / samples as f64)
}

fn measure_once(params: KdfParams) -> Result<u64, KdfError> {
    let salt = [0x5au8; SALT_LEN];
    let start = Instant::now();
    let _key = derive_key(b"calibration probe", &salt, params)?;
    Ok(start.elapsed().as_millis() as u64)
}
