//! The recovery-kit core: hashing, key derivation, AEAD envelopes, Shamir
//! sharing, kit assembly and the recovery engine.

pub mod aead;
pub mod auth;
pub mod format_v3;
pub mod hasher;
pub mod io;
pub mod kdf;
pub mod policy;
pub mod prompt;
pub mod sss;

mod allocate;
mod build;
mod recover;

pub use build::{BuildRequest, build_kit, default_decoy, recommended_pad};
pub use recover::{CancelToken, Recovered, Selection, recover};

use thiserror::Error;

/// Top-level error surface of the kit core.
///
/// Per-envelope failures never appear here: the engines swallow them and move
/// on. Anything crypto-shaped that does surface is the single generic
/// "share unavailable", so callers and logs cannot distinguish an
/// authentication failure from malformed data.
#[derive(Debug, Error)]
pub enum KitError {
    #[error(transparent)]
    InvalidKit(#[from] format_v3::KitFormatError),

    #[error(transparent)]
    Policy(#[from] policy::PolicyError),

    #[error(transparent)]
    Kdf(#[from] kdf::KdfError),

    #[error("secret is empty or exceeds {} bytes", policy::MAX_SECRET_LEN)]
    SecretOutOfPolicy,

    #[error("at most {} decoys are supported", policy::MAX_DECOYS)]
    TooManyDecoys,

    #[error("pad size {pad} too small; this kit needs at least {needed}")]
    PadTooSmall { pad: usize, needed: usize },

    #[error("kits support at most {} alternatives in total", sss::MAX_SHARES)]
    TooManyAlternatives,

    #[error("two questions have identical content")]
    DuplicateQuestion,

    #[error("share unavailable")]
    CryptoFailure,

    #[error("not enough shares to reconstruct any secret")]
    InsufficientShares,

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] io::KitIoError),
}
