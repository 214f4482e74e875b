//! Version-3 kit document: serde model, canonical encoding, load validation.
//!
//! The kit is a single self-contained JSON document. Maps are `BTreeMap` so
//! writers always produce the same field order for the same kit, which keeps
//! fixtures and diffs stable; readers accept any order. A version mismatch is
//! fatal on load, and validation is strict: a kit that is structurally off in
//! any way is rejected as a whole rather than partially honored.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::kit::aead::{self, EnvelopeAlg};
use crate::kit::auth::{AUTH_SALT_LEN, AUTH_TAG_LEN, CatalogEntry};
use crate::kit::kdf::{self, KdfParams};

/// Current (and only supported) kit document version.
pub const KIT_VERSION: u32 = 3;

/// KDF identifier recorded in every envelope.
pub const KDF_TYPE_ARGON2ID: &str = "argon2id";

#[derive(Debug, Error)]
pub enum KitFormatError {
    #[error("kit is not valid json")]
    Json(#[from] serde_json::Error),

    #[error("unsupported kit version {0}")]
    UnsupportedVersion(u32),

    #[error("kit field invalid: {0}")]
    InvalidField(&'static str),

    #[error("kit is missing {0}")]
    Missing(&'static str),

    #[error("secrets_count {declared} does not match {entries} auth catalog entries")]
    CatalogMismatch { declared: u32, entries: usize },
}

/// Top-level kit document.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct KitV3 {
    pub config: KitConfigV3,
    pub questions: Vec<QuestionV3>,
    /// `q_hash -> alt_hash -> slot ("s0".."sS") -> envelope`.
    pub encrypted_shares: BTreeMap<String, BTreeMap<String, ShareBlockV3>>,
}

pub type ShareBlockV3 = BTreeMap<String, EnvelopeV3>;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct KitConfigV3 {
    pub real_threshold: u32,
    pub pad_size: u32,
    pub argon2_params: KdfParams,
    pub version: u32,
    pub secrets_count: u32,
    pub auth_catalog: Vec<AuthEntryV3>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AuthEntryV3 {
    pub salt: String,
    pub hmac_sha256: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct QuestionV3 {
    pub id: u64,
    pub text: String,
    pub alternatives: Vec<String>,
    pub is_critical: bool,
    pub integrity_hash: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct EnvelopeV3 {
    pub algorithm: EnvelopeAlg,
    pub ciphertext: String,
    pub nonce: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub salt: String,
    pub kdf: KdfSpecV3,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct KdfSpecV3 {
    #[serde(rename = "type")]
    pub kdf_type: String,
    pub t: u32,
    pub m: u32,
    pub p: u32,
    pub len: u32,
}

impl KdfSpecV3 {
    pub fn from_params(params: KdfParams) -> Self {
        Self {
            kdf_type: KDF_TYPE_ARGON2ID.to_string(),
            t: params.time_cost,
            m: params.memory_kib,
            p: params.parallelism,
            len: kdf::KEY_LEN as u32,
        }
    }

    pub fn to_params(&self) -> Result<KdfParams, KitFormatError> {
        if self.kdf_type != KDF_TYPE_ARGON2ID || self.len as usize != kdf::KEY_LEN {
            return Err(KitFormatError::InvalidField("envelope.kdf"));
        }
        let params = KdfParams {
            time_cost: self.t,
            memory_kib: self.m,
            parallelism: self.p,
        };
        params
            .validate()
            .map_err(|_| KitFormatError::InvalidField("envelope.kdf"))?;
        Ok(params)
    }
}

/// Decoded body of one envelope, ready for key derivation and AEAD.
pub struct EnvelopeParts {
    pub algorithm: EnvelopeAlg,
    pub ciphertext: Vec<u8>,
    pub nonce: Vec<u8>,
    pub tag: Option<Vec<u8>>,
    pub salt: [u8; kdf::SALT_LEN],
    pub params: KdfParams,
}

impl EnvelopeV3 {
    pub fn decode(&self) -> Result<EnvelopeParts, KitFormatError> {
        let nonce = b64_field(&self.nonce, Some(aead::NONCE_LEN), "envelope.nonce")?;
        let salt_bytes = b64_field(&self.salt, Some(kdf::SALT_LEN), "envelope.salt")?;
        let ciphertext = b64_field(&self.ciphertext, None, "envelope.ciphertext")?;

        let tag = match (self.algorithm, &self.tag) {
            (EnvelopeAlg::Aes256Gcm, Some(tag)) => {
                Some(b64_field(tag, Some(aead::TAG_LEN), "envelope.tag")?)
            }
            (EnvelopeAlg::ChaCha20Poly1305, None) => None,
            _ => return Err(KitFormatError::InvalidField("envelope.tag")),
        };

        let mut salt = [0u8; kdf::SALT_LEN];
        salt.copy_from_slice(&salt_bytes);

        Ok(EnvelopeParts {
            algorithm: self.algorithm,
            ciphertext,
            nonce,
            tag,
            salt,
            params: self.kdf.to_params()?,
        })
    }

    /// Total ciphertext length including the tag, wherever it is carried.
    fn sealed_len(&self) -> Result<usize, KitFormatError> {
        let ct = b64_field(&self.ciphertext, None, "envelope.ciphertext")?.len();
        Ok(match self.algorithm {
            EnvelopeAlg::Aes256Gcm => ct + aead::TAG_LEN,
            EnvelopeAlg::ChaCha20Poly1305 => ct,
        })
    }
}

impl KitV3 {
    /// Number of decoy secrets (`S`); derived from the catalog, never from
    /// `secrets_count` alone.
    pub fn decoy_count(&self) -> usize {
        self.config.auth_catalog.len().saturating_sub(1)
    }

    /// Decode the auth catalog into raw entries.
    pub fn auth_entries(&self) -> Result<Vec<CatalogEntry>, KitFormatError> {
        self.config
            .auth_catalog
            .iter()
            .map(|entry| {
                let salt_bytes =
                    b64_field(&entry.salt, Some(AUTH_SALT_LEN), "auth_catalog.salt")?;
                let tag_bytes = b64_field(
                    &entry.hmac_sha256,
                    Some(AUTH_TAG_LEN),
                    "auth_catalog.hmac_sha256",
                )?;
                let mut salt = [0u8; AUTH_SALT_LEN];
                salt.copy_from_slice(&salt_bytes);
                let mut tag = [0u8; AUTH_TAG_LEN];
                tag.copy_from_slice(&tag_bytes);
                Ok(CatalogEntry { salt, tag })
            })
            .collect()
    }

    /// Look up one envelope by slot.
    pub fn envelope(&self, q_hash: &str, alt_hash: &str, slot: &str) -> Option<&EnvelopeV3> {
        self.encrypted_shares
            .get(q_hash)?
            .get(alt_hash)?
            .get(slot)
    }

    /// Full structural validation; called on every load.
    pub fn validate(&self) -> Result<(), KitFormatError> {
        if self.config.version != KIT_VERSION {
            return Err(KitFormatError::UnsupportedVersion(self.config.version));
        }

        let entries = self.config.auth_catalog.len();
        if self.config.secrets_count as usize != entries {
            return Err(KitFormatError::CatalogMismatch {
                declared: self.config.secrets_count,
                entries,
            });
        }
        if entries < 2 {
            return Err(KitFormatError::InvalidField("auth_catalog"));
        }
        self.auth_entries()?;

        if self.config.real_threshold == 0 {
            return Err(KitFormatError::InvalidField("real_threshold"));
        }
        self.config
            .argon2_params
            .validate()
            .map_err(|_| KitFormatError::InvalidField("argon2_params"))?;

        if self.questions.is_empty() {
            return Err(KitFormatError::Missing("questions"));
        }
        let mut seen_hashes = std::collections::BTreeSet::new();
        for question in &self.questions {
            if !seen_hashes.insert(question.integrity_hash.as_str()) {
                return Err(KitFormatError::InvalidField("question.integrity_hash"));
            }
        }

        let secrets = entries;
        let pad = self.config.pad_size as usize;

        for question in &self.questions {
            if question.alternatives.is_empty() {
                return Err(KitFormatError::InvalidField("question.alternatives"));
            }

            let expected_hash =
                crate::kit::hasher::question_hash(&question.text, &question.alternatives);
            if question.integrity_hash != expected_hash {
                return Err(KitFormatError::InvalidField("question.integrity_hash"));
            }

            let block = self
                .encrypted_shares
                .get(&question.integrity_hash)
                .ok_or(KitFormatError::Missing("encrypted_shares entry"))?;

            for alt in &question.alternatives {
                let alt_block = block
                    .get(&crate::kit::hasher::alt_hash(alt))
                    .ok_or(KitFormatError::Missing("alternative share block"))?;

                if alt_block.len() != secrets {
                    return Err(KitFormatError::InvalidField("share block slot count"));
                }

                for index in 0..secrets {
                    let envelope = alt_block
                        .get(&slot_key(index))
                        .ok_or(KitFormatError::Missing("share slot"))?;

                    envelope.decode()?;
                    if envelope.kdf.to_params()? != self.config.argon2_params {
                        return Err(KitFormatError::InvalidField("envelope.kdf"));
                    }
                    // Uniform size profile: plaintext is always pad+1 bytes.
                    if envelope.sealed_len()? != pad + 1 + aead::TAG_LEN {
                        return Err(KitFormatError::InvalidField("envelope.ciphertext"));
                    }
                }
            }
        }

        Ok(())
    }
}

/// Slot name for secret `index` (`0` is the real secret).
pub fn slot_key(index: usize) -> String {
    format!("s{index}")
}

/// Stable pretty-printed encoding.
pub fn encode_kit(kit: &KitV3) -> Result<String, KitFormatError> {
    Ok(serde_json::to_string_pretty(kit)?)
}

/// Parse and fully validate a kit document.
pub fn decode_kit(bytes: &[u8]) -> Result<KitV3, KitFormatError> {
    let kit: KitV3 = serde_json::from_slice(bytes)?;
    kit.validate()?;
    Ok(kit)
}

pub fn b64_encode(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

fn b64_field(
    value: &str,
    expected_len: Option<usize>,
    field: &'static str,
) -> Result<Vec<u8>, KitFormatError> {
    let bytes = BASE64
        .decode(value)
        .map_err(|_| KitFormatError::InvalidField(field))?;
    if let Some(expected) = expected_len {
        if bytes.len() != expected {
            return Err(KitFormatError::InvalidField(field));
        }
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_keys_are_sequential() {
        assert_eq!(slot_key(0), "s0");
        assert_eq!(slot_key(3), "s3");
    }

    #[test]
    fn b64_field_checks_length() {
        let encoded = b64_encode(&[0u8; 12]);
        assert!(b64_field(&encoded, Some(12), "nonce").is_ok());
        assert!(matches!(
            b64_field(&encoded, Some(16), "salt"),
            Err(KitFormatError::InvalidField("salt"))
        ));
        assert!(matches!(
            b64_field("not base64!!!", None, "ciphertext"),
            Err(KitFormatError::InvalidField("ciphertext"))
        ));
    }

    #[test]
    fn kdf_spec_roundtrips_params() {
        let params = KdfParams::for_tests();
        let spec = KdfSpecV3::from_params(params);
        assert_eq!(spec.kdf_type, KDF_TYPE_ARGON2ID);
        assert_eq!(spec.to_params().unwrap(), params);
    }

    #[test]
    fn kdf_spec_rejects_foreign_types() {
        let mut spec = KdfSpecV3::from_params(KdfParams::for_tests());
        spec.kdf_type = "scrypt".to_string();
        assert!(spec.to_params().is_err());
    }

    #[test]
    fn version_mismatch_is_fatal() {
        let doc = serde_json::json!({
            "config": {
                "real_threshold": 1,
                "pad_size": 64,
                "argon2_params": {"time_cost": 1, "memory_cost": 8192, "parallelism": 1},
                "version": 2,
                "secrets_count": 2,
                "auth_catalog": [
                    {"salt": b64_encode(&[0u8; 16]), "hmac_sha256": b64_encode(&[0u8; 32])},
                    {"salt": b64_encode(&[1u8; 16]), "hmac_sha256": b64_encode(&[1u8; 32])},
                ],
            },
            "questions": [],
            "encrypted_shares": {},
        });
        let result = decode_kit(doc.to_string().as_bytes());
        assert!(matches!(
            result,
            Err(KitFormatError::UnsupportedVersion(2))
        ));
    }

    #[test]
    fn secrets_count_must_match_catalog() {
        let doc = serde_json::json!({
            "config": {
                "real_threshold": 1,
                "pad_size": 64,
                "argon2_params": {"time_cost": 1, "memory_cost": 8192, "parallelism": 1},
                "version": 3,
                "secrets_count": 3,
                "auth_catalog": [
                    {"salt": b64_encode(&[0u8; 16]), "hmac_sha256": b64_encode(&[0u8; 32])},
                    {"salt": b64_encode(&[1u8; 16]), "hmac_sha256": b64_encode(&[1u8; 32])},
                ],
            },
            "questions": [],
            "encrypted_shares": {},
        });
        let result = decode_kit(doc.to_string().as_bytes());
        assert!(matches!(
            result,
            Err(KitFormatError::CatalogMismatch {
                declared: 3,
                entries: 2
            })
        ));
    }
}
