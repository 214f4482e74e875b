//! Final-authentication catalog.
//!
//! One salted HMAC per configured secret, real and decoys alike, stored in a
//! shuffled order. Verification answers exactly one question — "is this
//! plaintext one of the configured secrets?" — and must not leak which entry
//! matched, so every entry is always checked and results are merged with
//! constant-time operations.

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use subtle::{Choice, ConstantTimeEq};
use zeroize::Zeroize;

/// Salt length per catalog entry.
pub const AUTH_SALT_LEN: usize = 16;
/// HMAC-SHA256 tag length.
pub const AUTH_TAG_LEN: usize = 32;

const HKDF_INFO_FINAL_AUTH: &[u8] = b"SECQ final-auth v3";

/// A single catalog entry: per-secret salt and keyed tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub salt: [u8; AUTH_SALT_LEN],
    pub tag: [u8; AUTH_TAG_LEN],
}

impl CatalogEntry {
    /// Build an entry over `secret` with a fresh random salt.
    pub fn seal(secret: &[u8]) -> Self {
        let mut salt = [0u8; AUTH_SALT_LEN];
        OsRng.fill_bytes(&mut salt);
        let tag = tag_for(secret, &salt);
        Self { salt, tag }
    }

    /// Constant-time check of `candidate` against this entry.
    fn matches(&self, candidate: &[u8]) -> Choice {
        let mut computed = tag_for(candidate, &self.salt);
        let matched = computed.as_slice().ct_eq(self.tag.as_slice());
        computed.zeroize();
        matched
    }
}

/// True when `candidate` matches any entry.
///
/// All entries are evaluated unconditionally; the result carries no
/// information about which one matched or how many did.
pub fn catalog_contains(entries: &[CatalogEntry], candidate: &[u8]) -> bool {
    let mut any = Choice::from(0u8);
    for entry in entries {
        any |= entry.matches(candidate);
    }
    bool::from(any)
}

fn tag_for(secret: &[u8], salt: &[u8; AUTH_SALT_LEN]) -> [u8; AUTH_TAG_LEN] {
    let hk = Hkdf::<Sha256>::new(Some(salt), secret);
    let mut k_auth = [0u8; 32];
    hk.expand(HKDF_INFO_FINAL_AUTH, &mut k_auth)
        .expect("32 bytes is a valid hkdf-sha256 output length");

    let mut mac =
        Hmac::<Sha256>::new_from_slice(&k_auth).expect("hmac accepts any key length");
    mac.update(secret);
    let tag: [u8; AUTH_TAG_LEN] = mac.finalize().into_bytes().into();
    k_auth.zeroize();
    tag
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sealed_entry_matches_its_secret() {
        let entry = CatalogEntry::seal(b"river-stone-42");
        assert!(catalog_contains(&[entry], b"river-stone-42"));
    }

    #[test]
    fn wrong_candidate_does_not_match() {
        let entry = CatalogEntry::seal(b"river-stone-42");
        assert!(!catalog_contains(&[entry], b"river-stone-43"));
        assert!(!catalog_contains(&[], b"anything"));
    }

    #[test]
    fn any_entry_in_catalog_matches() {
        let entries = vec![
            CatalogEntry::seal(b"real secret"),
            CatalogEntry::seal(b"first decoy"),
            CatalogEntry::seal(b"second decoy"),
        ];
        for secret in [&b"real secret"[..], b"first decoy", b"second decoy"] {
            assert!(catalog_contains(&entries, secret));
        }
        assert!(!catalog_contains(&entries, b"third decoy"));
    }

    #[test]
    fn salts_differ_across_entries_for_same_secret() {
        let a = CatalogEntry::seal(b"same");
        let b = CatalogEntry::seal(b"same");
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.tag, b.tag);
    }
}
