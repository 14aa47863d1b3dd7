// Cipher Factory and CompositeCipher: mints a fresh layered stream cipher per nonce.
//
// hbak_common's SnapshotStream/RecoveryStream (hbak_common::stream) wrap a
// single AEAD stream cipher instance per session and refuse to be reused.
// CompositeCipher follows the same "single-use per logical operation" rule,
// but layers N independent raw ChaCha20 instances instead of one
// XChaCha20Poly1305 instance -- no authentication tag, by design.

use chacha20::cipher::{KeyIvInit, StreamCipher as _};
use chacha20::{ChaCha20, Key, Nonce};
use zeroize::Zeroizing;

use crate::kdf::{self, Key as DerivedKey};
use crate::salt::N_KEYS;

/// Length in bytes of a nonce: scopes one [`CompositeCipher`] to one logical operation.
pub const NONCE_LEN: usize = 12;

/// Owns the `N_KEYS` keys derived from a password and mints fresh
/// [`CompositeCipher`] instances on demand. Never caches a cipher across calls.
///
/// The derived keys are wrapped in [`Zeroizing`] so they are overwritten with
/// zeroes the moment the factory is dropped, rather than left sitting in
/// freed memory.
pub struct CipherFactory {
    keys: Zeroizing<[DerivedKey; N_KEYS]>,
}

impl CipherFactory {
    /// Derives the factory's key material from `password`. Pure, deterministic.
    pub fn new(password: &[u8]) -> Self {
        Self {
            keys: Zeroizing::new(kdf::derive_keys(password)),
        }
    }

    /// Returns a fresh [`CompositeCipher`] seeded with `nonce`, independent of
    /// and unrelated to any cipher previously returned by this factory.
    pub fn renew(&self, nonce: &[u8; NONCE_LEN]) -> CompositeCipher {
        let nonce = Nonce::from_slice(nonce);

        let layers = self
            .keys
            .iter()
            .map(|key| ChaCha20::new(Key::from_slice(key), nonce))
            .collect();

        CompositeCipher { layers }
    }
}

/// An ordered stack of `N_KEYS` ChaCha20 instances sharing one nonce.
///
/// Stateful: each layer advances its internal stream position on every
/// encrypt/decrypt call. Reusing a `CompositeCipher` for a second logical
/// operation produces wrong output -- always obtain a fresh instance from
/// [`CipherFactory::renew`].
pub struct CompositeCipher {
    layers: Vec<ChaCha20>,
}

impl CompositeCipher {
    /// Encrypts `data` in place by applying each layer's keystream in index order.
    ///
    /// Takes `&mut self` rather than consuming: a single `CompositeCipher` is
    /// applied across many chunks of one logical operation (e.g. a streamed
    /// store), each call continuing where the layers' internal keystream
    /// counters left off. Never reuse one instance across two *different*
    /// logical operations -- always obtain a fresh one from [`CipherFactory::renew`].
    pub fn encrypt(&mut self, data: &mut [u8]) {
        for layer in &mut self.layers {
            layer.apply_keystream(data);
        }
    }

    /// Decrypts `data` in place.
    ///
    /// Each layer is a stream XOR, so encryption and decryption are the same
    /// operation; the reference layer order (index 0..N-1) is used for both
    /// directions.
    pub fn decrypt(&mut self, data: &mut [u8]) {
        self.encrypt(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt_round_trips() {
        let factory = CipherFactory::new(b"hunter2");
        let nonce = [7u8; NONCE_LEN];

        let original = b"the quick brown fox jumps over the lazy dog".to_vec();
        let mut buf = original.clone();

        factory.renew(&nonce).encrypt(&mut buf);
        assert_ne!(buf, original);

        factory.renew(&nonce).decrypt(&mut buf);
        assert_eq!(buf, original);
    }

    #[test]
    fn different_nonces_yield_different_ciphertext() {
        let factory = CipherFactory::new(b"hunter2");
        let data = b"same plaintext, different nonce".to_vec();

        let mut a = data.clone();
        factory.renew(&[1u8; NONCE_LEN]).encrypt(&mut a);

        let mut b = data.clone();
        factory.renew(&[2u8; NONCE_LEN]).encrypt(&mut b);

        assert_ne!(a, b);
    }

    #[test]
    fn different_passwords_yield_different_ciphertext() {
        let nonce = [3u8; NONCE_LEN];
        let data = b"same plaintext, different password".to_vec();

        let mut a = data.clone();
        CipherFactory::new(b"password one")
            .renew(&nonce)
            .encrypt(&mut a);

        let mut b = data.clone();
        CipherFactory::new(b"password two")
            .renew(&nonce)
            .encrypt(&mut b);

        assert_ne!(a, b);
    }
}
