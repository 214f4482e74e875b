//! Kit assembly.
//!
//! `build_kit` is the single entry point for creating a kit: it checks
//! policy, base64-encodes the secrets, runs the share allocator, seals the
//! authentication catalog and emits the finished document. The input secrets
//! are consumed and zeroed here; the returned kit holds only ciphertext,
//! hashes and public metadata.

use log::debug;
use rand::Rng;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use zeroize::Zeroizing;

use crate::kit::KitError;
use crate::kit::allocate;
use crate::kit::auth::CatalogEntry;
use crate::kit::format_v3::{
    self, AuthEntryV3, KIT_VERSION, KitConfigV3, KitV3, QuestionV3,
};
use crate::kit::kdf::KdfParams;
use crate::kit::policy::{self, Policy};
use crate::kit::sss;
use crate::questions::Question;

/// Characters in a synthesized default decoy.
const DEFAULT_DECOY_LEN: usize = 16;

/// Everything needed to build one kit.
pub struct BuildRequest {
    pub questions: Vec<Question>,
    pub real_secret: Zeroizing<Vec<u8>>,
    pub decoys: Vec<Zeroizing<Vec<u8>>>,
    pub threshold: usize,
    /// `None` applies [`recommended_pad`].
    pub pad: Option<usize>,
    pub params: KdfParams,
    pub policy: Policy,
}

/// Pad recommendation: generous headroom over the real secret's encoding so
/// pad size alone does not reveal secret length.
pub fn recommended_pad(real_b64_len: usize) -> usize {
    128.max(real_b64_len + 32)
}

/// A plausible stand-in secret for kits configured without explicit decoys.
pub fn default_decoy() -> Zeroizing<Vec<u8>> {
    let token: Vec<u8> = OsRng
        .sample_iter(&Alphanumeric)
        .take(DEFAULT_DECOY_LEN)
        .collect();
    Zeroizing::new(token)
}

pub fn build_kit(request: BuildRequest) -> Result<KitV3, KitError> {
    let BuildRequest {
        questions,
        real_secret,
        mut decoys,
        threshold,
        pad,
        params,
        policy,
    } = request;

    params.validate()?;
    check_secret(&real_secret)?;
    if decoys.len() > policy::MAX_DECOYS {
        return Err(KitError::TooManyDecoys);
    }
    for decoy in &decoys {
        check_secret(decoy)?;
    }
    if decoys.is_empty() {
        decoys.push(default_decoy());
    }

    let total_alts: usize = questions.iter().map(|q| q.alternatives.len()).sum();
    let correct: usize = questions
        .iter()
        .map(|q| q.alternatives.iter().filter(|a| q.is_correct(a)).count())
        .sum();

    if total_alts > sss::MAX_SHARES {
        return Err(KitError::TooManyAlternatives);
    }
    let distinct: std::collections::BTreeSet<String> =
        questions.iter().map(|q| q.integrity_hash()).collect();
    if distinct.len() != questions.len() {
        return Err(KitError::DuplicateQuestion);
    }
    policy::check(policy, total_alts, correct, threshold)?;

    let real_b64 = encode_secret(&real_secret);
    let decoys_b64: Vec<Zeroizing<Vec<u8>>> = decoys.iter().map(|d| encode_secret(d)).collect();

    let pad = pad.unwrap_or_else(|| recommended_pad(real_b64.len()));
    let needed = decoys_b64
        .iter()
        .map(|d| d.len())
        .chain(std::iter::once(real_b64.len()))
        .max()
        .unwrap_or(0)
        + sss::LENGTH_PREFIX;
    if pad < needed {
        return Err(KitError::PadTooSmall { pad, needed });
    }

    debug!(
        "building kit: {} questions, {total_alts} alternatives, {} secrets, pad {pad}",
        questions.len(),
        1 + decoys.len(),
    );

    let encrypted_shares =
        allocate::allocate_and_encrypt(&questions, &real_b64, &decoys_b64, threshold, pad, params)?;

    let mut catalog_entries: Vec<CatalogEntry> = Vec::with_capacity(1 + decoys.len());
    catalog_entries.push(CatalogEntry::seal(&real_secret));
    for decoy in &decoys {
        catalog_entries.push(CatalogEntry::seal(decoy));
    }
    catalog_entries.shuffle(&mut OsRng);

    let auth_catalog: Vec<AuthEntryV3> = catalog_entries
        .iter()
        .map(|entry| AuthEntryV3 {
            salt: format_v3::b64_encode(&entry.salt),
            hmac_sha256: format_v3::b64_encode(&entry.tag),
        })
        .collect();

    let secrets_count = (1 + decoys.len()) as u32;
    let kit = KitV3 {
        config: KitConfigV3 {
            real_threshold: threshold as u32,
            pad_size: pad as u32,
            argon2_params: params,
            version: KIT_VERSION,
            secrets_count,
            auth_catalog,
        },
        questions: questions
            .iter()
            .map(|q| QuestionV3 {
                id: q.id,
                text: q.text.clone(),
                alternatives: q.alternatives.clone(),
                is_critical: q.is_critical,
                integrity_hash: q.integrity_hash(),
            })
            .collect(),
        encrypted_shares,
    };

    Ok(kit)
}

fn check_secret(secret: &[u8]) -> Result<(), KitError> {
    if secret.is_empty() || secret.len() > policy::MAX_SECRET_LEN {
        return Err(KitError::SecretOutOfPolicy);
    }
    Ok(())
}

fn encode_secret(secret: &[u8]) -> Zeroizing<Vec<u8>> {
    Zeroizing::new(format_v3::b64_encode(secret).into_bytes())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::questions::parse_questions;

    pub(crate) fn sample_questions(count: usize, alts: usize, correct_per_q: usize) -> Vec<Question> {
        let raw: Vec<serde_json::Value> = (0..count)
            .map(|qi| {
                let alternatives: Vec<String> =
                    (0..alts).map(|ai| format!("answer-{qi}-{ai}")).collect();
                let correct: Vec<String> = alternatives[..correct_per_q].to_vec();
                serde_json::json!({
                    "id": qi as u64,
                    "text": format!("Question number {qi}?"),
                    "alternatives": alternatives,
                    "correct_answers": correct,
                })
            })
            .collect();
        parse_questions(serde_json::to_string(&raw).unwrap().as_bytes())
            .unwrap()
            .questions
    }

    fn quick_request(questions: Vec<Question>, threshold: usize) -> BuildRequest {
        BuildRequest {
            questions,
            real_secret: Zeroizing::new(b"Remember: river-stone-42".to_vec()),
            decoys: vec![Zeroizing::new(b"a harmless phrase".to_vec())],
            threshold,
            pad: Some(128),
            params: KdfParams::for_tests(),
            policy: Policy::permissive(),
        }
    }

    #[test]
    fn built_kit_passes_its_own_validation() {
        let kit = build_kit(quick_request(sample_questions(4, 3, 2), 3)).unwrap();
        kit.validate().unwrap();
        assert_eq!(kit.config.version, KIT_VERSION);
        assert_eq!(kit.config.secrets_count, 2);
        assert_eq!(kit.questions.len(), 4);
    }

    #[test]
    fn default_decoy_is_synthesized_when_none_given() {
        let mut request = quick_request(sample_questions(3, 2, 2), 2);
        request.decoys = Vec::new();
        let kit = build_kit(request).unwrap();
        assert_eq!(kit.config.secrets_count, 2);
        assert_eq!(kit.config.auth_catalog.len(), 2);
    }

    #[test]
    fn oversized_secret_is_refused() {
        let mut request = quick_request(sample_questions(3, 2, 2), 2);
        request.real_secret = Zeroizing::new(vec![b'x'; policy::MAX_SECRET_LEN + 1]);
        assert!(matches!(
            build_kit(request),
            Err(KitError::SecretOutOfPolicy)
        ));
    }

    #[test]
    fn too_many_decoys_are_refused() {
        let mut request = quick_request(sample_questions(3, 2, 2), 2);
        request.decoys = (0..6)
            .map(|i| Zeroizing::new(format!("decoy {i}").into_bytes()))
            .collect();
        assert!(matches!(build_kit(request), Err(KitError::TooManyDecoys)));
    }

    #[test]
    fn standard_policy_gates_weak_geometry() {
        let mut request = quick_request(sample_questions(12, 4, 4), 8);
        request.policy = Policy::standard();
        assert!(matches!(build_kit(request), Err(KitError::Policy(_))));
    }

    #[test]
    fn threshold_above_correct_count_is_refused() {
        let request = quick_request(sample_questions(3, 2, 1), 4);
        assert!(matches!(build_kit(request), Err(KitError::Policy(_))));
    }

    #[test]
    fn pad_smaller_than_secrets_is_refused() {
        let mut request = quick_request(sample_questions(3, 2, 2), 2);
        request.pad = Some(8);
        assert!(matches!(build_kit(request), Err(KitError::PadTooSmall { .. })));
    }

    #[test]
    fn duplicate_question_content_is_refused() {
        let mut questions = sample_questions(3, 2, 2);
        questions.push(questions[0].clone());
        let request = quick_request(questions, 2);
        assert!(matches!(
            build_kit(request),
            Err(KitError::DuplicateQuestion)
        ));
    }

    #[test]
    fn recommended_pad_has_headroom() {
        assert_eq!(recommended_pad(10), 128);
        assert_eq!(recommended_pad(200), 232);
    }

    #[test]
    fn default_decoys_are_distinct() {
        assert_ne!(default_decoy().as_slice(), default_decoy().as_slice());
    }
}
