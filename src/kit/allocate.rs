//! Share allocation: maps every alternative to one envelope per secret.
//!
//! The global index is the kit's question order with alternative order inside
//! each question. Real shares land only on correct alternatives; incorrect
//! alternatives get random filler of the same length under slot `s0`. Every
//! decoy is split across *all* alternatives, so any selection can feed a
//! decoy reconstruction. Each plaintext is sealed under a key derived from
//! its own alternative's text with a fresh salt and a coin-flipped cipher.

use rand::RngCore;
use rand::rngs::OsRng;
use std::collections::BTreeMap;
use zeroize::Zeroizing;

use crate::kit::KitError;
use crate::kit::aead::{self, EnvelopeAlg};
use crate::kit::format_v3::{self, EnvelopeV3, KdfSpecV3, ShareBlockV3};
use crate::kit::hasher;
use crate::kit::kdf::{self, KdfParams};
use crate::kit::sss::{self, SssError};
use crate::questions::Question;

/// `q_hash -> alt_hash -> slot -> envelope`, as stored in the kit.
pub type ShareMap = BTreeMap<String, BTreeMap<String, ShareBlockV3>>;

/// Threshold used for the first decoy: a single selected answer suffices.
const FIRST_DECOY_THRESHOLD: usize = 1;

struct SlotRef<'a> {
    q_hash: String,
    alt_hash: String,
    answer: &'a str,
    correct: bool,
}

/// Split the encoded secrets and seal one envelope per `(alternative,
/// secret)` pair.
///
/// `real_b64` and `decoys_b64` are the base64 text bytes of the secrets;
/// geometry (counts, threshold vs correct) must already have been checked.
pub(crate) fn allocate_and_encrypt(
    questions: &[Question],
    real_b64: &[u8],
    decoys_b64: &[Zeroizing<Vec<u8>>],
    threshold: usize,
    pad: usize,
    params: KdfParams,
) -> Result<ShareMap, KitError> {
    let slots = global_order(questions);
    let total = slots.len();
    let correct = slots.iter().filter(|s| s.correct).count();

    let real_shares = sss::split(real_b64, correct, threshold, pad).map_err(map_split_error)?;

    let mut decoy_shares = Vec::with_capacity(decoys_b64.len());
    for (index, decoy) in decoys_b64.iter().enumerate() {
        let decoy_threshold = if index == 0 {
            FIRST_DECOY_THRESHOLD
        } else {
            threshold
        };
        decoy_shares
            .push(sss::split(decoy, total, decoy_threshold, pad).map_err(map_split_error)?);
    }

    let mut out: ShareMap = BTreeMap::new();
    let mut real_iter = real_shares.into_iter();

    for (global_index, slot) in slots.iter().enumerate() {
        let mut block: ShareBlockV3 = BTreeMap::new();

        let s0: Zeroizing<Vec<u8>> = if slot.correct {
            real_iter.next().ok_or(KitError::CryptoFailure)?
        } else {
            random_filler(pad + 1)
        };
        block.insert(format_v3::slot_key(0), seal_slot(slot, &s0, params)?);
        drop(s0);

        for (decoy_index, shares) in decoy_shares.iter().enumerate() {
            let share = shares
                .get(global_index)
                .ok_or(KitError::CryptoFailure)?;
            block.insert(
                format_v3::slot_key(decoy_index + 1),
                seal_slot(slot, share, params)?,
            );
        }

        out.entry(slot.q_hash.clone())
            .or_default()
            .insert(slot.alt_hash.clone(), block);
    }

    Ok(out)
}

fn global_order(questions: &[Question]) -> Vec<SlotRef<'_>> {
    let mut slots = Vec::new();
    for question in questions {
        let q_hash = question.integrity_hash();
        for alternative in &question.alternatives {
            slots.push(SlotRef {
                q_hash: q_hash.clone(),
                alt_hash: hasher::alt_hash(alternative),
                answer: alternative,
                correct: question.is_correct(alternative),
            });
        }
    }
    slots
}

fn seal_slot(
    slot: &SlotRef<'_>,
    plaintext: &[u8],
    params: KdfParams,
) -> Result<EnvelopeV3, KitError> {
    let mut salt = [0u8; kdf::SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let algorithm = EnvelopeAlg::random();
    let key = kdf::derive_key(hasher::norm(slot.answer).as_bytes(), &salt, params)
        .map_err(|_| KitError::CryptoFailure)?;

    let aad = aead::slot_aad(&slot.q_hash, &slot.alt_hash, algorithm, format_v3::KIT_VERSION);
    let sealed =
        aead::encrypt(algorithm, &key, plaintext, &aad).map_err(|_| KitError::CryptoFailure)?;

    Ok(EnvelopeV3 {
        algorithm,
        ciphertext: format_v3::b64_encode(&sealed.ciphertext),
        nonce: format_v3::b64_encode(&sealed.nonce),
        tag: sealed.tag.as_ref().map(|t| format_v3::b64_encode(t)),
        salt: format_v3::b64_encode(&salt),
        kdf: KdfSpecV3::from_params(params),
    })
}

/// Filler for incorrect alternatives: random bytes, same length as a share.
fn random_filler(len: usize) -> Zeroizing<Vec<u8>> {
    let mut filler = Zeroizing::new(vec![0u8; len]);
    OsRng.fill_bytes(&mut filler);
    filler
}

fn map_split_error(err: SssError) -> KitError {
    match err {
        SssError::PadTooSmall { pad, secret_len } => KitError::PadTooSmall {
            pad,
            needed: secret_len + sss::LENGTH_PREFIX,
        },
        _ => KitError::CryptoFailure,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::questions::parse_questions;

    fn two_questions() -> Vec<Question> {
        parse_questions(
            serde_json::json!([
                {
                    "id": 1,
                    "text": "Capital of Norway?",
                    "alternatives": ["Oslo", "Bergen"],
                    "correct_answers": ["Oslo"]
                },
                {
                    "id": 2,
                    "text": "First pet?",
                    "alternatives": ["Rex", "Milo"],
                    "correct_answers": ["Milo"]
                }
            ])
            .to_string()
            .as_bytes(),
        )
        .unwrap()
        .questions
    }

    #[test]
    fn every_alternative_gets_every_slot() {
        let questions = two_questions();
        let decoys = vec![Zeroizing::new(b"ZGVjb3k=".to_vec())];
        let map = allocate_and_encrypt(
            &questions,
            b"cmVhbA==",
            &decoys,
            2,
            64,
            KdfParams::for_tests(),
        )
        .unwrap();

        assert_eq!(map.len(), 2);
        for question in &questions {
            let block = &map[&question.integrity_hash()];
            assert_eq!(block.len(), question.alternatives.len());
            for alternative in &question.alternatives {
                let slots = &block[&hasher::alt_hash(alternative)];
                assert_eq!(slots.len(), 2);
                assert!(slots.contains_key("s0"));
                assert!(slots.contains_key("s1"));
            }
        }
    }

    #[test]
    fn envelopes_share_one_size_profile() {
        let questions = two_questions();
        let decoys = vec![Zeroizing::new(b"ZGVjb3k=".to_vec())];
        let pad = 48;
        let map = allocate_and_encrypt(
            &questions,
            b"cmVhbA==",
            &decoys,
            2,
            pad,
            KdfParams::for_tests(),
        )
        .unwrap();

        for block in map.values() {
            for slots in block.values() {
                for envelope in slots.values() {
                    let parts = envelope.decode().unwrap();
                    let sealed = match parts.algorithm {
                        EnvelopeAlg::Aes256Gcm => parts.ciphertext.len() + aead::TAG_LEN,
                        EnvelopeAlg::ChaCha20Poly1305 => parts.ciphertext.len(),
                    };
                    assert_eq!(sealed, pad + 1 + aead::TAG_LEN);
                }
            }
        }
    }

    #[test]
    fn pad_too_small_is_reported_with_requirement() {
        let questions = two_questions();
        let long_secret = vec![b'A'; 64];
        let result = allocate_and_encrypt(
            &questions,
            &long_secret,
            &[],
            2,
            32,
            KdfParams::for_tests(),
        );
        assert!(matches!(
            result,
            Err(KitError::PadTooSmall { pad: 32, needed: 66 })
        ));
    }
}
