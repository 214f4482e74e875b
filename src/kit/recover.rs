//! Recovery: from a set of selected answers back to one configured secret.
//!
//! The engine first tries the real path: decrypt the `s0` envelope of every
//! selected alternative and search T-subsets of whatever decrypted for a
//! combination the authentication catalog accepts. Filler shares decrypt just
//! as happily as real ones, which is why the subset search exists at all.
//!
//! If the real path yields nothing, the selection deterministically routes to
//! one decoy variant, whose shares live on *every* alternative; extra shares
//! are pulled from unselected alternatives when the selection alone is too
//! small. The caller observes only the reconstructed plaintext and a single
//! auth bit, never which path produced it.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use log::debug;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use zeroize::Zeroizing;

use crate::kit::KitError;
use crate::kit::aead;
use crate::kit::auth::{self, CatalogEntry};
use crate::kit::format_v3::{self, KitV3};
use crate::kit::hasher;
use crate::kit::kdf;
use crate::kit::sss;

/// Exhaustive subset enumeration is allowed up to this many combinations.
const MAX_EXHAUSTIVE_SUBSETS: u64 = 5_000;
/// Past that, this many unique random subsets are sampled instead.
const MAX_SAMPLED_SUBSETS: usize = 200;

/// One selected answer, addressed by content hashes with the texts kept for
/// key derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub q_hash: String,
    pub alt_hash: String,
    pub question: String,
    pub answer: String,
}

/// Cooperative cancellation handle.
///
/// Checked before every key derivation and every combine attempt; an
/// in-flight derivation runs to completion but its output is discarded.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Outcome of a recovery run.
pub struct Recovered {
    pub plaintext: Zeroizing<Vec<u8>>,
    /// True when the plaintext matched some catalog entry; which entry is
    /// never disclosed.
    pub auth_ok: bool,
}

pub fn recover(
    kit: &KitV3,
    selections: &[Selection],
    cancel: &CancelToken,
) -> Result<Recovered, KitError> {
    kit.validate()?;

    let selections = dedup(selections);
    if selections.is_empty() {
        return Err(KitError::InsufficientShares);
    }

    let catalog = kit.auth_entries()?;
    let threshold = kit.config.real_threshold as usize;
    let decoy_count = kit.decoy_count();

    // A structurally-valid combine that never authenticated; surfaced with
    // auth_ok = false only if nothing better turns up.
    let mut unverified: Option<Zeroizing<Vec<u8>>> = None;

    // Real attempt over slot s0.
    let mut real_shares = Vec::new();
    for selection in &selections {
        if let Some(share) = open_slot(
            kit,
            &selection.q_hash,
            &selection.alt_hash,
            &selection.answer,
            0,
            cancel,
        )? {
            real_shares.push(share);
        }
    }
    debug!(
        "recovery: {} of {} selected envelopes opened",
        real_shares.len(),
        selections.len()
    );

    if real_shares.len() >= threshold {
        if let Some(plaintext) =
            search_subsets(&real_shares, threshold, &catalog, cancel, &mut unverified)?
        {
            return Ok(Recovered {
                plaintext,
                auth_ok: true,
            });
        }
    }
    drop(real_shares);

    // Deterministic decoy routing.
    let decoy_index = route_decoy(&selections, decoy_count);
    let mut decoy_shares = Vec::new();
    for selection in &selections {
        if let Some(share) = open_slot(
            kit,
            &selection.q_hash,
            &selection.alt_hash,
            &selection.answer,
            decoy_index,
            cancel,
        )? {
            decoy_shares.push(share);
        }
    }

    if let Some(plaintext) =
        search_rising_thresholds(&decoy_shares, threshold, &catalog, cancel, &mut unverified)?
    {
        return Ok(Recovered {
            plaintext,
            auth_ok: true,
        });
    }

    // Pull additional decoy shares from unselected alternatives, in global
    // index order, until the full threshold is reachable.
    if decoy_shares.len() < threshold {
        let selected: BTreeSet<(&str, &str)> = selections
            .iter()
            .map(|s| (s.q_hash.as_str(), s.alt_hash.as_str()))
            .collect();

        'pull: for question in &kit.questions {
            for alternative in &question.alternatives {
                let alt_hash = hasher::alt_hash(alternative);
                if selected.contains(&(question.integrity_hash.as_str(), alt_hash.as_str())) {
                    continue;
                }
                if let Some(share) = open_slot(
                    kit,
                    &question.integrity_hash,
                    &alt_hash,
                    alternative,
                    decoy_index,
                    cancel,
                )? {
                    decoy_shares.push(share);
                }
                if decoy_shares.len() >= threshold {
                    break 'pull;
                }
            }
        }

        if let Some(plaintext) =
            search_rising_thresholds(&decoy_shares, threshold, &catalog, cancel, &mut unverified)?
        {
            return Ok(Recovered {
                plaintext,
                auth_ok: true,
            });
        }
    }

    match unverified {
        Some(plaintext) => Ok(Recovered {
            plaintext,
            auth_ok: false,
        }),
        None => Err(KitError::InsufficientShares),
    }
}

/// Deterministic decoy choice: SHA3-256 over the sorted selection pairs,
/// last four bytes big-endian, reduced to `1..=decoy_count`.
fn route_decoy(selections: &[Selection], decoy_count: usize) -> usize {
    let mut pairs: Vec<(&str, &str)> = selections
        .iter()
        .map(|s| (s.q_hash.as_str(), s.alt_hash.as_str()))
        .collect();
    pairs.sort();

    let mut material = Vec::new();
    for (q_hash, alt_hash) in pairs {
        material.extend_from_slice(q_hash.as_bytes());
        material.push(b'|');
        material.extend_from_slice(alt_hash.as_bytes());
        material.push(b'\n');
    }

    let digest = hasher::sha3_256(&material);
    let tail = u32::from_be_bytes([digest[28], digest[29], digest[30], digest[31]]);
    (tail as usize % decoy_count) + 1
}

/// Derive the per-answer key and open one slot's envelope.
///
/// Every failure mode — absent envelope, malformed fields, KDF refusal, tag
/// mismatch — collapses to `None`; only cancellation surfaces.
fn open_slot(
    kit: &KitV3,
    q_hash: &str,
    alt_hash: &str,
    answer: &str,
    slot_index: usize,
    cancel: &CancelToken,
) -> Result<Option<Zeroizing<Vec<u8>>>, KitError> {
    if cancel.is_cancelled() {
        return Err(KitError::Cancelled);
    }

    let Some(envelope) = kit.envelope(q_hash, alt_hash, &format_v3::slot_key(slot_index)) else {
        return Ok(None);
    };
    let Ok(parts) = envelope.decode() else {
        return Ok(None);
    };

    let Ok(key) = kdf::derive_key(hasher::norm(answer).as_bytes(), &parts.salt, parts.params)
    else {
        return Ok(None);
    };
    if cancel.is_cancelled() {
        return Err(KitError::Cancelled);
    }

    let aad = aead::slot_aad(q_hash, alt_hash, parts.algorithm, kit.config.version);
    match aead::decrypt(
        parts.algorithm,
        &key,
        &parts.nonce,
        &parts.ciphertext,
        parts.tag.as_deref(),
        &aad,
    ) {
        Ok(plaintext) => {
            #[cfg(feature = "beta-diagnostics")]
            debug!("opened slot share {}", hasher::share_hash(&plaintext));
            Ok(Some(plaintext))
        }
        Err(_) => Ok(None),
    }
}

/// Try combine thresholds `1..=min(|shares|, cap)` in rising order.
fn search_rising_thresholds(
    shares: &[Zeroizing<Vec<u8>>],
    cap: usize,
    catalog: &[CatalogEntry],
    cancel: &CancelToken,
    unverified: &mut Option<Zeroizing<Vec<u8>>>,
) -> Result<Option<Zeroizing<Vec<u8>>>, KitError> {
    for size in 1..=cap.min(shares.len()) {
        if let Some(found) = search_subsets(shares, size, catalog, cancel, unverified)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Search `size`-subsets of `shares` for one whose combination the catalog
/// accepts. Exhaustive below [`MAX_EXHAUSTIVE_SUBSETS`] combinations, random
/// sampling up to [`MAX_SAMPLED_SUBSETS`] unique subsets beyond that.
fn search_subsets(
    shares: &[Zeroizing<Vec<u8>>],
    size: usize,
    catalog: &[CatalogEntry],
    cancel: &CancelToken,
    unverified: &mut Option<Zeroizing<Vec<u8>>>,
) -> Result<Option<Zeroizing<Vec<u8>>>, KitError> {
    if size == 0 || shares.len() < size {
        return Ok(None);
    }

    if subset_count_capped(shares.len(), size, MAX_EXHAUSTIVE_SUBSETS) <= MAX_EXHAUSTIVE_SUBSETS {
        let mut indices: Vec<usize> = (0..size).collect();
        loop {
            if let Some(found) = try_combine(shares, &indices, catalog, cancel, unverified)? {
                return Ok(Some(found));
            }
            if !advance(&mut indices, shares.len()) {
                return Ok(None);
            }
        }
    }

    let mut seen: BTreeSet<Vec<usize>> = BTreeSet::new();
    let mut rng = rand::rngs::OsRng;
    while seen.len() < MAX_SAMPLED_SUBSETS {
        let mut indices = rand::seq::index::sample(&mut rng, shares.len(), size).into_vec();
        indices.sort_unstable();
        if !seen.insert(indices.clone()) {
            continue;
        }
        if let Some(found) = try_combine(shares, &indices, catalog, cancel, unverified)? {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Combine one subset and check it against the catalog.
fn try_combine(
    shares: &[Zeroizing<Vec<u8>>],
    indices: &[usize],
    catalog: &[CatalogEntry],
    cancel: &CancelToken,
    unverified: &mut Option<Zeroizing<Vec<u8>>>,
) -> Result<Option<Zeroizing<Vec<u8>>>, KitError> {
    if cancel.is_cancelled() {
        return Err(KitError::Cancelled);
    }

    let picked: Vec<&[u8]> = indices.iter().map(|&i| shares[i].as_slice()).collect();
    let Ok(padded) = sss::combine(&picked) else {
        return Ok(None);
    };
    let Ok(encoded) = sss::strip_length_prefix(&padded) else {
        return Ok(None);
    };
    let Ok(decoded) = BASE64.decode(encoded.as_slice()) else {
        return Ok(None);
    };
    let candidate = Zeroizing::new(decoded);

    if auth::catalog_contains(catalog, &candidate) {
        return Ok(Some(candidate));
    }
    if unverified.is_none() {
        *unverified = Some(candidate);
    }
    Ok(None)
}

/// Next lexicographic combination of `indices` below `n`; false when done.
fn advance(indices: &mut [usize], n: usize) -> bool {
    let size = indices.len();
    let mut i = size;
    while i > 0 {
        i -= 1;
        if indices[i] != i + n - size {
            indices[i] += 1;
            for j in i + 1..size {
                indices[j] = indices[j - 1] + 1;
            }
            return true;
        }
    }
    false
}

/// `C(n, k)` capped: any value above `cap` is reported as `cap + 1`.
fn subset_count_capped(n: usize, k: usize, cap: u64) -> u64 {
    let k = k.min(n - k);
    let mut count = 1u64;
    for i in 0..k {
        count = match count.checked_mul((n - i) as u64) {
            Some(v) => v / (i as u64 + 1),
            None => return cap + 1,
        };
        if count > cap {
            return cap + 1;
        }
    }
    count
}

fn dedup(selections: &[Selection]) -> Vec<Selection> {
    let mut seen = BTreeSet::new();
    selections
        .iter()
        .filter(|s| seen.insert((s.q_hash.clone(), s.alt_hash.clone())))
        .cloned()
        .collect()
}
