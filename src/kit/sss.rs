//! Shamir secret sharing over GF(2⁸), byte-wise.
//!
//! The secret is length-prefixed (2 bytes big-endian) and zero-padded to a
//! fixed `pad` before splitting, so every share in a kit has the identical
//! length `pad + 1` regardless of which secret it belongs to. The final byte
//! of each share is its x-coordinate in `1..=255`; the leading `pad` bytes
//! are the per-position polynomial evaluations.
//!
//! Combining interpolates at x = 0 across however many shares are given.
//! Interpolating through garbage produces garbage, not an error: share
//! validity is established upstream by AEAD and downstream by the
//! authentication catalog, never by this module.

use rand::RngCore;
use rand::rngs::OsRng;
use thiserror::Error;
use zeroize::Zeroizing;

/// x-coordinates are single nonzero bytes, so 255 shares at most.
pub const MAX_SHARES: usize = 255;
/// Size of the big-endian length prefix inside the padded secret.
pub const LENGTH_PREFIX: usize = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SssError {
    #[error("share count {shares} below threshold {threshold}")]
    SharesBelowThreshold { shares: usize, threshold: usize },

    #[error("threshold must be at least 1")]
    ThresholdZero,

    #[error("at most {MAX_SHARES} shares are supported, requested {0}")]
    TooManyShares(usize),

    #[error("pad {pad} too small for secret of {secret_len} bytes")]
    PadTooSmall { pad: usize, secret_len: usize },

    #[error("no shares to combine")]
    NoShares,

    #[error("shares have inconsistent lengths")]
    InconsistentLength,

    #[error("duplicate or zero x-coordinate among shares")]
    BadCoordinates,

    #[error("length prefix exceeds padded payload")]
    BadLengthPrefix,
}

/// Arithmetic in GF(2⁸) modulo the AES polynomial x⁸+x⁴+x³+x+1.
mod gf256 {
    pub fn mul(mut a: u8, mut b: u8) -> u8 {
        let mut product = 0u8;
        while b != 0 {
            if b & 1 != 0 {
                product ^= a;
            }
            let carry = a & 0x80;
            a <<= 1;
            if carry != 0 {
                a ^= 0x1b;
            }
            b >>= 1;
        }
        product
    }

    /// a⁻¹ = a^254, square-and-multiply. inv(0) is undefined; callers must
    /// reject zero denominators before dividing.
    pub fn inv(a: u8) -> u8 {
        // a^254 = a^2 · a^4 · … · a^128, square-and-multiply.
        let mut acc = 1u8;
        let mut power = a;
        for _ in 0..7 {
            power = mul(power, power);
            acc = mul(acc, power);
        }
        acc
    }

    pub fn div(a: u8, b: u8) -> u8 {
        mul(a, inv(b))
    }
}

/// Length-prefix and zero-fill `secret` to exactly `pad` bytes.
pub fn pad_secret(secret: &[u8], pad: usize) -> Result<Zeroizing<Vec<u8>>, SssError> {
    if pad < secret.len() + LENGTH_PREFIX {
        return Err(SssError::PadTooSmall {
            pad,
            secret_len: secret.len(),
        });
    }

    let mut padded = Zeroizing::new(Vec::with_capacity(pad));
    padded.extend_from_slice(&(secret.len() as u16).to_be_bytes());
    padded.extend_from_slice(secret);
    padded.resize(pad, 0);
    Ok(padded)
}

/// Strip the 2-byte length prefix from combined padded bytes.
pub fn strip_length_prefix(padded: &[u8]) -> Result<Zeroizing<Vec<u8>>, SssError> {
    if padded.len() < LENGTH_PREFIX {
        return Err(SssError::BadLengthPrefix);
    }
    let declared = u16::from_be_bytes([padded[0], padded[1]]) as usize;
    if declared > padded.len() - LENGTH_PREFIX {
        return Err(SssError::BadLengthPrefix);
    }
    Ok(Zeroizing::new(
        padded[LENGTH_PREFIX..LENGTH_PREFIX + declared].to_vec(),
    ))
}

/// Split `secret` into `shares` shares with the given `threshold`.
///
/// Each returned share is `pad + 1` bytes: `pad` polynomial evaluations
/// followed by the x-coordinate `1..=shares`.
pub fn split(
    secret: &[u8],
    shares: usize,
    threshold: usize,
    pad: usize,
) -> Result<Vec<Zeroizing<Vec<u8>>>, SssError> {
    if threshold == 0 {
        return Err(SssError::ThresholdZero);
    }
    if shares < threshold {
        return Err(SssError::SharesBelowThreshold { shares, threshold });
    }
    if shares > MAX_SHARES {
        return Err(SssError::TooManyShares(shares));
    }

    let padded = pad_secret(secret, pad)?;

    let mut out: Vec<Zeroizing<Vec<u8>>> = (1..=shares as u8)
        .map(|x| {
            let mut share = Zeroizing::new(vec![0u8; pad + 1]);
            share[pad] = x;
            share
        })
        .collect();

    let mut coeffs = Zeroizing::new(vec![0u8; threshold]);
    for (position, &secret_byte) in padded.iter().enumerate() {
        // f(x) = secret_byte + a₁x + … + a_{t−1}x^{t−1}, fresh randomness
        // per byte position.
        coeffs[0] = secret_byte;
        OsRng.fill_bytes(&mut coeffs[1..]);

        for share in out.iter_mut() {
            let x = share[pad];
            let mut y = coeffs[0];
            let mut x_pow = x;
            for &coeff in coeffs[1..].iter() {
                y ^= gf256::mul(coeff, x_pow);
                x_pow = gf256::mul(x_pow, x);
            }
            share[position] = y;
        }
    }

    Ok(out)
}

/// Lagrange-interpolate all given shares at x = 0.
///
/// Returns the padded bytes; use [`strip_length_prefix`] to recover the
/// secret. Combining fewer shares than the original threshold yields
/// well-formed but meaningless bytes.
pub fn combine(shares: &[impl AsRef<[u8]>]) -> Result<Zeroizing<Vec<u8>>, SssError> {
    if shares.is_empty() {
        return Err(SssError::NoShares);
    }

    let share_len = shares[0].as_ref().len();
    if share_len < 2 || shares.iter().any(|s| s.as_ref().len() != share_len) {
        return Err(SssError::InconsistentLength);
    }
    let pad = share_len - 1;

    let xs: Vec<u8> = shares.iter().map(|s| s.as_ref()[pad]).collect();
    for (i, &x) in xs.iter().enumerate() {
        if x == 0 || xs[..i].contains(&x) {
            return Err(SssError::BadCoordinates);
        }
    }

    let mut padded = Zeroizing::new(vec![0u8; pad]);
    for position in 0..pad {
        let mut value = 0u8;
        for (i, share) in shares.iter().enumerate() {
            let xi = xs[i];
            let yi = share.as_ref()[position];

            // Lᵢ(0) = Π_{j≠i} xⱼ / (xᵢ ⊕ xⱼ)
            let mut numerator = 1u8;
            let mut denominator = 1u8;
            for (j, &xj) in xs.iter().enumerate() {
                if i != j {
                    numerator = gf256::mul(numerator, xj);
                    denominator = gf256::mul(denominator, xi ^ xj);
                }
            }
            value ^= gf256::mul(yi, gf256::div(numerator, denominator));
        }
        padded[position] = value;
    }

    Ok(padded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_combine_roundtrip() {
        let secret = b"the eagle nests at dawn";
        let shares = split(secret, 5, 3, 64).unwrap();
        assert_eq!(shares.len(), 5);
        assert!(shares.iter().all(|s| s.len() == 65));

        let padded = combine(&shares[1..4]).unwrap();
        let recovered = strip_length_prefix(&padded).unwrap();
        assert_eq!(recovered.as_slice(), secret);
    }

    #[test]
    fn any_threshold_subset_recovers() {
        let secret = b"subset independence";
        let shares = split(secret, 6, 4, 48).unwrap();

        for combo in [[0usize, 1, 2, 3], [0, 2, 4, 5], [1, 3, 4, 5]] {
            let picked: Vec<&Zeroizing<Vec<u8>>> = combo.iter().map(|&i| &shares[i]).collect();
            let padded = combine(&picked.iter().map(|s| s.as_slice()).collect::<Vec<_>>()).unwrap();
            let recovered = strip_length_prefix(&padded).unwrap();
            assert_eq!(recovered.as_slice(), secret);
        }
    }

    #[test]
    fn more_than_threshold_shares_still_recover() {
        let secret = b"extra points lie on the curve";
        let shares = split(secret, 7, 3, 64).unwrap();
        let padded = combine(&shares).unwrap();
        assert_eq!(strip_length_prefix(&padded).unwrap().as_slice(), secret);
    }

    #[test]
    fn below_threshold_yields_garbage_not_error() {
        let secret = b"needs three";
        let shares = split(secret, 5, 3, 32).unwrap();
        let padded = combine(&shares[..2]).unwrap();
        // Structurally fine, semantically wrong.
        assert_eq!(padded.len(), 32);
        let wrong = strip_length_prefix(&padded)
            .map(|p| p.as_slice() != secret)
            .unwrap_or(true);
        assert!(wrong);
    }

    #[test]
    fn threshold_one_is_a_constant_polynomial() {
        let secret = b"any single share suffices";
        let shares = split(secret, 9, 1, 40).unwrap();
        for share in &shares {
            let padded = combine(std::slice::from_ref(share)).unwrap();
            assert_eq!(strip_length_prefix(&padded).unwrap().as_slice(), secret);
        }
    }

    #[test]
    fn split_rejects_bad_parameters() {
        assert_eq!(
            split(b"s", 2, 3, 32).unwrap_err(),
            SssError::SharesBelowThreshold {
                shares: 2,
                threshold: 3
            }
        );
        assert_eq!(split(b"s", 3, 0, 32).unwrap_err(), SssError::ThresholdZero);
        assert!(matches!(
            split(b"s", 300, 2, 32).unwrap_err(),
            SssError::TooManyShares(300)
        ));
        assert!(matches!(
            split(&[0u8; 31], 3, 2, 32).unwrap_err(),
            SssError::PadTooSmall { .. }
        ));
    }

    #[test]
    fn combine_rejects_duplicate_and_zero_coordinates() {
        let shares = split(b"coords", 4, 2, 16).unwrap();

        let duplicated = vec![shares[0].as_slice(), shares[0].as_slice()];
        assert_eq!(combine(&duplicated).unwrap_err(), SssError::BadCoordinates);

        let mut zeroed = shares[1].clone();
        let last = zeroed.len() - 1;
        zeroed[last] = 0;
        assert_eq!(
            combine(&[zeroed.as_slice()]).unwrap_err(),
            SssError::BadCoordinates
        );
    }

    #[test]
    fn combine_rejects_mixed_lengths() {
        let a = split(b"one", 2, 1, 16).unwrap();
        let b = split(b"two", 2, 1, 24).unwrap();
        let mixed = vec![a[0].as_slice(), b[0].as_slice()];
        assert_eq!(combine(&mixed).unwrap_err(), SssError::InconsistentLength);
    }

    #[test]
    fn gf256_inverse_covers_all_nonzero_bytes() {
        for a in 1u16..=255 {
            let a = a as u8;
            assert_eq!(super::gf256::mul(a, super::gf256::inv(a)), 1, "a={a}");
        }
    }

    #[test]
    fn length_prefix_is_big_endian() {
        let padded = pad_secret(&[0xaa; 300], 310).unwrap();
        assert_eq!(&padded[..2], &[0x01, 0x2c]);
    }
}
