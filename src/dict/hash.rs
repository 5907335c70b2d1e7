//! The pluggable hash function used by [`super::Dict`].
//!
//! spec.md §4.1 calls for "a 32-bit mixing function seeded by a
//! process-wide seed" with room for callers to plug in an alternative
//! (e.g. a case-insensitive hash). The teacher crate reaches for
//! `siphasher`, keyed by a process-wide key generated once behind a
//! `std::sync::Once` (see `patch.rs`'s `SIP_KEY`/`init()`); this module
//! does the same, using `OnceLock` instead of the teacher's `unsafe static
//! mut` since the safe equivalent has been stable since Rust 1.70 and
//! needs no `unsafe` to get the same "exactly once" guarantee.

use siphasher::sip::SipHasher13;
use std::hash::{Hash, Hasher as _};
use std::sync::OnceLock;

fn process_seed() -> &'static [u8; 16] {
    static SEED: OnceLock<[u8; 16]> = OnceLock::new();
    SEED.get_or_init(|| {
        let mut bytes = [0u8; 16];
        let mut rng = rand::thread_rng();
        rand::RngCore::fill_bytes(&mut rng, &mut bytes);
        bytes
    })
}

/// A type descriptor's hash function, parameterized over the key type so
/// that a caller can substitute e.g. a case-insensitive hash without
/// touching [`super::Dict`] itself.
pub trait KeyHasher<K: ?Sized> {
    fn hash_key(&self, key: &K) -> u64;
}

/// The default hash function: `SipHash-1-3` keyed by a seed drawn once
/// from OS randomness at process startup and reused for the lifetime of
/// the process (spec.md: "a process-wide variable set once at startup and
/// read elsewhere; treat as effectively immutable after initialization").
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHasher;

impl<K: Hash + ?Sized> KeyHasher<K> for DefaultHasher {
    fn hash_key(&self, key: &K) -> u64 {
        let seed = process_seed();
        let k0 = u64::from_le_bytes(seed[0..8].try_into().unwrap());
        let k1 = u64::from_le_bytes(seed[8..16].try_into().unwrap());
        let mut hasher = SipHasher13::new_with_keys(k0, k1);
        key.hash(&mut hasher);
        hasher.finish()
    }
}
