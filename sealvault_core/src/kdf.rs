// Password-derived multi-layer keystream: the hardest-working ~10% of this crate.
//
// For each of the N salts, the password is hashed with SHA3-256 and then
// iterated R times over its own digest. This is a fixed-round hash chain,
// not a memory-hard KDF -- preserved as specified rather than hardened.

use sha3::{Digest, Sha3_256};

use crate::salt;

/// Number of rounds the hash chain is iterated for each key.
pub const ROUNDS: usize = 1000;

/// A single derived key, one per cipher layer.
pub type Key = [u8; 32];

/// Derives the `N_KEYS` independent keys used to seed a [`crate::cipher::CipherFactory`].
///
/// Pure and total: the same password always yields the same key tuple,
/// and there is no failure mode.
pub fn derive_keys(password: &[u8]) -> [Key; salt::N_KEYS] {
    let table = salt::table();
    let mut keys = [[0u8; 32]; salt::N_KEYS];

    for (i, key) in keys.iter_mut().enumerate() {
        let mut digest: [u8; 32] = {
            let mut hasher = Sha3_256::new();
            hasher.update(password);
            hasher.update(table.salt(i));
            hasher.finalize().into()
        };

        for _ in 0..ROUNDS {
            let mut hasher = Sha3_256::new();
            hasher.update(digest);
            digest = hasher.finalize().into();
        }

        *key = digest;
    }

    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let a = derive_keys(b"correct horse battery staple");
        let b = derive_keys(b"correct horse battery staple");
        assert_eq!(a, b);
    }

    #[test]
    fn different_passwords_yield_different_keys() {
        let a = derive_keys(b"password one");
        let b = derive_keys(b"password two");
        assert_ne!(a, b);
    }

    #[test]
    fn layers_are_pairwise_distinct() {
        let keys = derive_keys(b"any password");
        for i in 0..keys.len() {
            for j in (i + 1)..keys.len() {
                assert_ne!(keys[i], keys[j]);
            }
        }
    }
}
