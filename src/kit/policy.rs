//! Construction policy: combinatorial hardness and threshold floors.
//!
//! A kit whose correct answers are a large fraction of all alternatives is
//! cheap to brute-force regardless of KDF cost, so construction is refused
//! below a hardness floor measured in bits: the gap between the number of
//! T-subsets an attacker must try and the number that reconstruct.

use thiserror::Error;

/// Minimum combinatorial hardness accepted by the standard policy.
pub const MIN_HARDNESS_BITS: f64 = 80.0;
/// Absolute threshold floor when more than one alternative is correct.
pub const MIN_THRESHOLD: usize = 8;
/// Relative threshold floor as a fraction of the correct count.
pub const THRESHOLD_FRACTION: f64 = 0.35;
/// Maximum raw secret length (bytes) before base64 encoding.
pub const MAX_SECRET_LEN: usize = 256;
/// Maximum number of configured decoys.
pub const MAX_DECOYS: usize = 5;

/// Knobs applied at kit construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Policy {
    /// Refuse construction below this many bits; `None` disables the gate.
    pub min_hardness_bits: Option<f64>,
    /// Enforce `T >= max(8, ceil(0.35 * correct))`.
    pub enforce_threshold_floor: bool,
}

impl Policy {
    /// Production defaults.
    pub fn standard() -> Self {
        Self {
            min_hardness_bits: Some(MIN_HARDNESS_BITS),
            enforce_threshold_floor: true,
        }
    }

    /// No floors. For tests and for operators who explicitly accept a weak
    /// kit (`--allow-weak`).
    pub fn permissive() -> Self {
        Self {
            min_hardness_bits: None,
            enforce_threshold_floor: false,
        }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("combinatorial hardness {bits:.1} bits is below the {floor:.0}-bit floor")]
    HardnessBelowFloor { bits: f64, floor: f64 },

    #[error("threshold {threshold} is below the floor {floor}")]
    ThresholdBelowFloor { threshold: usize, floor: usize },

    #[error("threshold {threshold} exceeds the {correct} correct alternatives")]
    ThresholdAboveCorrect { threshold: usize, correct: usize },
}

/// `log2 C(N,T) − log2 C(C,T)`: bits of work separating blind T-subset
/// search over all alternatives from search over the correct ones.
pub fn hardness_bits(total_alts: usize, correct: usize, threshold: usize) -> f64 {
    log2_choose(total_alts, threshold) - log2_choose(correct, threshold)
}

/// Threshold floor for a given correct count.
pub fn threshold_floor(correct: usize) -> usize {
    if correct <= 1 {
        1
    } else {
        MIN_THRESHOLD.max((THRESHOLD_FRACTION * correct as f64).ceil() as usize)
    }
}

/// Apply `policy` to the proposed kit geometry.
pub fn check(
    policy: Policy,
    total_alts: usize,
    correct: usize,
    threshold: usize,
) -> Result<(), PolicyError> {
    if threshold > correct {
        return Err(PolicyError::ThresholdAboveCorrect { threshold, correct });
    }

    if policy.enforce_threshold_floor {
        let floor = threshold_floor(correct);
        if threshold < floor {
            return Err(PolicyError::ThresholdBelowFloor { threshold, floor });
        }
    }

    if let Some(floor) = policy.min_hardness_bits {
        let bits = hardness_bits(total_alts, correct, threshold);
        if bits < floor {
            return Err(PolicyError::HardnessBelowFloor { bits, floor });
        }
    }

    Ok(())
}

/// `log2 C(n,k)` via the log-gamma function; exact enough for gate
/// comparisons and stable for any kit-sized n.
fn log2_choose(n: usize, k: usize) -> f64 {
    if k > n {
        return f64::NEG_INFINITY;
    }
    let ln =
        lgamma(n as f64 + 1.0) - lgamma(k as f64 + 1.0) - lgamma((n - k) as f64 + 1.0);
    ln / std::f64::consts::LN_2
}

unsafe extern "C" {
    #[link_name = "lgamma"]
    fn c_lgamma(x: f64) -> f64;
}

fn lgamma(x: f64) -> f64 {
    unsafe { c_lgamma(x) }
}
