//! Authenticated encryption for share envelopes.
//!
//! Two ciphers behind one interface, chosen uniformly at random per envelope
//! so ciphertext metadata carries no signal about the slot's role. AAD is
//! mandatory and binds every ciphertext to its question/alternative slot and
//! kit version; a moved envelope fails authentication instead of decrypting
//! into a foreign slot.
//!
//! Decryption failure is deliberately a single opaque error: callers must not
//! be able to tell a bad tag from malformed input, and neither may logs.

use aes_gcm::Aes256Gcm;
use chacha20poly1305::ChaCha20Poly1305;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use rand::RngCore;
use rand::rngs::OsRng;
use secrecy::ExposeSecret;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::kit::kdf::KeyBytes;

/// Nonce size shared by both ciphers.
pub const NONCE_LEN: usize = 12;
/// Detached tag size for AES-256-GCM envelopes.
pub const TAG_LEN: usize = 16;

/// Envelope cipher, persisted by name in the kit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EnvelopeAlg {
    #[serde(rename = "aes256gcm")]
    Aes256Gcm,
    #[serde(rename = "chacha20poly1305")]
    ChaCha20Poly1305,
}

impl EnvelopeAlg {
    pub fn as_str(self) -> &'static str {
        match self {
            EnvelopeAlg::Aes256Gcm => "aes256gcm",
            EnvelopeAlg::ChaCha20Poly1305 => "chacha20poly1305",
        }
    }

    /// Uniformly random cipher choice from the OS RNG.
    pub fn random() -> Self {
        if OsRng.next_u32() & 1 == 0 {
            EnvelopeAlg::Aes256Gcm
        } else {
            EnvelopeAlg::ChaCha20Poly1305
        }
    }
}

#[derive(Debug, Error)]
pub enum AeadError {
    /// Covers bad keys, bad tags, bad lengths and malformed input alike.
    #[error("envelope unavailable")]
    Unavailable,
}

/// Output of a single seal operation.
///
/// For AES-GCM the 16-byte tag is carried detached; for ChaCha20-Poly1305 it
/// stays appended to the ciphertext, matching the stored envelope shape.
pub struct Sealed {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
    pub tag: Option<[u8; TAG_LEN]>,
}

/// AAD binding an envelope to its slot: `q_hash|alt_hash|algorithm|version`.
pub fn slot_aad(q_hash: &str, alt_hash: &str, alg: EnvelopeAlg, version: u32) -> Vec<u8> {
    format!("{q_hash}|{alt_hash}|{}|{version}", alg.as_str()).into_bytes()
}

/// Encrypt `plaintext` under `key` with a fresh random nonce.
pub fn encrypt(
    alg: EnvelopeAlg,
    key: &KeyBytes,
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Sealed, AeadError> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let payload = Payload {
        msg: plaintext,
        aad,
    };

    match alg {
        EnvelopeAlg::Aes256Gcm => {
            let cipher = Aes256Gcm::new_from_slice(key.expose_secret())
                .map_err(|_| AeadError::Unavailable)?;
            let mut combined = cipher
                .encrypt(aes_gcm::Nonce::from_slice(&nonce), payload)
                .map_err(|_| AeadError::Unavailable)?;
            if combined.len() < TAG_LEN {
                return Err(AeadError::Unavailable);
            }
            let tag_bytes = combined.split_off(combined.len() - TAG_LEN);
            let mut tag = [0u8; TAG_LEN];
            tag.copy_from_slice(&tag_bytes);
            Ok(Sealed {
                nonce,
                ciphertext: combined,
                tag: Some(tag),
            })
        }
        EnvelopeAlg::ChaCha20Poly1305 => {
            let cipher = ChaCha20Poly1305::new_from_slice(key.expose_secret())
                .map_err(|_| AeadError::Unavailable)?;
            let ciphertext = cipher
                .encrypt(chacha20poly1305::Nonce::from_slice(&nonce), payload)
                .map_err(|_| AeadError::Unavailable)?;
            Ok(Sealed {
                nonce,
                ciphertext,
                tag: None,
            })
        }
    }
}

/// Decrypt an envelope body. `tag` must be present exactly for AES-GCM.
pub fn decrypt(
    alg: EnvelopeAlg,
    key: &KeyBytes,
    nonce: &[u8],
    ciphertext: &[u8],
    tag: Option<&[u8]>,
    aad: &[u8],
) -> Result<Zeroizing<Vec<u8>>, AeadError> {
    if nonce.len() != NONCE_LEN {
        return Err(AeadError::Unavailable);
    }

    match alg {
        EnvelopeAlg::Aes256Gcm => {
            let tag = tag.ok_or(AeadError::Unavailable)?;
            if tag.len() != TAG_LEN {
                return Err(AeadError::Unavailable);
            }
            let mut combined = Vec::with_capacity(ciphertext.len() + TAG_LEN);
            combined.extend_from_slice(ciphertext);
            combined.extend_from_slice(tag);

            let cipher = Aes256Gcm::new_from_slice(key.expose_secret())
                .map_err(|_| AeadError::Unavailable)?;
            let plaintext = cipher
                .decrypt(
                    aes_gcm::Nonce::from_slice(nonce),
                    Payload {
                        msg: &combined,
                        aad,
                    },
                )
                .map_err(|_| AeadError::Unavailable)?;
            Ok(Zeroizing::new(plaintext))
        }
        EnvelopeAlg::ChaCha20Poly1305 => {
            if tag.is_some() {
                return Err(AeadError::Unavailable);
            }
            let cipher = ChaCha20Poly1305::new_from_slice(key.expose_secret())
                .map_err(|_| AeadError::Unavailable)?;
            let plaintext = cipher
                .decrypt(
                    chacha20poly1305::Nonce::from_slice(nonce),
                    Payload {
                        msg: ciphertext,
                        aad,
                    },
                )
                .map_err(|_| AeadError::Unavailable)?;
            Ok(Zeroizing::new(plaintext))
        }
    }
}
