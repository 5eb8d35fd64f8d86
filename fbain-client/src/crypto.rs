//! Cryptographic primitives for f.bain transfers.
//!
//! This module provides:
//! - PBKDF2-HMAC-SHA-256 key derivation from a password and public salt
//! - AES-128-GCM block encryption with counter-derived 96-bit nonces
//! - Single-use filename encryption under a fixed nonce
//!
//! # Security Notes
//!
//! - One PBKDF2 call yields the key and both IV bases from disjoint byte
//!   ranges, so a password/salt pair always reproduces the identical triple
//! - A nonce is the 8-byte IV base followed by the big-endian block counter;
//!   the counter is consumed exactly once per block in either direction
//! - After a failed delivery, [`KeyMaterial::rollback_counter`] reclaims the
//!   consumed counter value so the retried block reuses its nonce for the
//!   same plaintext; the guard flag makes a second rollback a no-op

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes128Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use fbain_types::Salt;

/// AES key size in bytes (128 bits).
pub const KEY_SIZE: usize = 16;

/// IV base size in bytes; two bases are derived per key.
pub const IV_BASE_SIZE: usize = 8;

/// AES-GCM nonce size in bytes (96 bits): IV base plus 32-bit counter.
pub const NONCE_SIZE: usize = 12;

/// Total bytes produced by one key derivation call.
pub const DERIVED_SIZE: usize = KEY_SIZE + 2 * IV_BASE_SIZE;

/// PBKDF2 iteration count for production keys.
///
/// The protocol hardened this repeatedly, from 50,000 up to 1,000,000; use
/// the highest value the latency budget allows.
pub const PBKDF2_ITERATIONS: u32 = 1_000_000;

/// Crypto errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The underlying KDF/AEAD primitives rejected the derived key.
    /// Environment fault, not a password problem; never retried.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// The filename was already encrypted under this key material.
    /// Encrypting twice would reuse the fixed filename nonce.
    #[error("filename already encrypted with this key material")]
    FilenameReuse,

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Filename decryption failed: wrong password or corrupted link.
    #[error("decryption failed: wrong password or corrupted data")]
    Decryption,

    /// A block's authentication tag did not verify. Fatal for the transfer.
    #[error("block authentication failed")]
    Authentication,

    /// The 32-bit block counter ran out; the key material is spent.
    #[error("block counter exhausted")]
    CounterExhausted,
}

/// Key derivation work factor.
///
/// Production code uses [`PBKDF2_ITERATIONS`]; tests pass a reduced count so
/// they do not spend seconds in the KDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyProfile {
    iterations: u32,
}

impl KeyProfile {
    /// Create a profile with an explicit iteration count.
    pub const fn new(iterations: u32) -> Self {
        Self { iterations }
    }

    /// Get the iteration count.
    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}

impl Default for KeyProfile {
    fn default() -> Self {
        Self::new(PBKDF2_ITERATIONS)
    }
}

/// The complete cryptographic state of one transfer.
///
/// Owned exclusively by a single upload or download; the block counter
/// inside is the only mutable protocol state and every increment consumes
/// one nonce forever.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    key: [u8; KEY_SIZE],
    block_iv_base: [u8; IV_BASE_SIZE],
    filename_iv_base: [u8; IV_BASE_SIZE],
    block_counter: u32,
    filename_used: bool,
    rolled_back: bool,
}

impl KeyMaterial {
    /// Derive key material from a password and salt at production strength.
    pub fn derive(password: &str, salt: &Salt) -> Result<Self, CryptoError> {
        Self::derive_with_profile(password, salt, KeyProfile::default())
    }

    /// Derive key material with an explicit work factor.
    ///
    /// One PBKDF2 call produces [`DERIVED_SIZE`] bytes, sliced into the AES
    /// key and the two IV bases over disjoint ranges. Deterministic: the
    /// same password and salt always yield the identical triple.
    pub fn derive_with_profile(
        password: &str,
        salt: &Salt,
        profile: KeyProfile,
    ) -> Result<Self, CryptoError> {
        let mut derived = [0u8; DERIVED_SIZE];
        pbkdf2_hmac::<Sha256>(
            password.as_bytes(),
            salt.as_bytes(),
            profile.iterations(),
            &mut derived,
        );

        let mut key = [0u8; KEY_SIZE];
        let mut block_iv_base = [0u8; IV_BASE_SIZE];
        let mut filename_iv_base = [0u8; IV_BASE_SIZE];
        key.copy_from_slice(&derived[..KEY_SIZE]);
        block_iv_base.copy_from_slice(&derived[KEY_SIZE..KEY_SIZE + IV_BASE_SIZE]);
        filename_iv_base.copy_from_slice(&derived[KEY_SIZE + IV_BASE_SIZE..]);
        derived.zeroize();

        // Validate the key against the AEAD up front so a broken environment
        // fails at derivation, not mid-transfer.
        Aes128Gcm::new_from_slice(&key).map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

        Ok(Self {
            key,
            block_iv_base,
            filename_iv_base,
            block_counter: 0,
            filename_used: false,
            // Nothing has been consumed yet, so there is nothing to roll back.
            rolled_back: true,
        })
    }

    fn cipher(&self) -> Result<Aes128Gcm, CryptoError> {
        Aes128Gcm::new_from_slice(&self.key)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))
    }

    /// Build a full nonce from an IV base and a counter value.
    fn nonce_for(base: &[u8; IV_BASE_SIZE], counter: u32) -> [u8; NONCE_SIZE] {
        let mut nonce = [0u8; NONCE_SIZE];
        nonce[..IV_BASE_SIZE].copy_from_slice(base);
        nonce[IV_BASE_SIZE..].copy_from_slice(&counter.to_be_bytes());
        nonce
    }

    /// Encrypt the filename and base64 encode the result.
    ///
    /// Single use only: the filename nonce is fixed, so a second call on the
    /// same key material fails with [`CryptoError::FilenameReuse`].
    pub fn encrypt_filename(&mut self, filename: &str) -> Result<String, CryptoError> {
        if self.filename_used {
            return Err(CryptoError::FilenameReuse);
        }
        self.filename_used = true;

        let nonce = Self::nonce_for(&self.filename_iv_base, 0);
        let ciphertext = self
            .cipher()?
            .encrypt(Nonce::from_slice(&nonce), filename.as_bytes())
            .map_err(|_| CryptoError::Encryption("aead encrypt failed".into()))?;

        Ok(STANDARD.encode(ciphertext))
    }

    /// Base64 decode and decrypt a filename.
    ///
    /// Pure function of ciphertext and the fixed nonce, so there is no reuse
    /// guard. Failure here is the receiver's password-correctness check.
    pub fn decrypt_filename(&self, ciphertext: &str) -> Result<String, CryptoError> {
        let raw = STANDARD.decode(ciphertext).map_err(|_| CryptoError::Decryption)?;

        let nonce = Self::nonce_for(&self.filename_iv_base, 0);
        let plaintext = self
            .cipher()?
            .decrypt(Nonce::from_slice(&nonce), raw.as_slice())
            .map_err(|_| CryptoError::Decryption)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::Decryption)
    }

    /// Consume the current counter value, failing once the space is spent.
    fn take_counter(&mut self) -> Result<u32, CryptoError> {
        let counter = self.block_counter;
        self.block_counter = counter.checked_add(1).ok_or(CryptoError::CounterExhausted)?;
        Ok(counter)
    }

    /// Encrypt one plaintext block, consuming the current counter value.
    ///
    /// The counter is consumed whether or not encryption succeeds; a failed
    /// operation still burns its nonce.
    pub fn encrypt_block(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let counter = self.take_counter()?;

        let nonce = Self::nonce_for(&self.block_iv_base, counter);
        let ciphertext = self
            .cipher()?
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CryptoError::Encryption("aead encrypt failed".into()))?;

        self.rolled_back = false;
        Ok(ciphertext)
    }

    /// Decrypt one ciphertext block, consuming the current counter value.
    ///
    /// The counter advances even when authentication fails: a corrupted
    /// block can never become valid by re-reading it under the same nonce
    /// sequence, so there is nothing to hold the position for.
    pub fn decrypt_block(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let counter = self.take_counter()?;

        let nonce = Self::nonce_for(&self.block_iv_base, counter);
        self.cipher()?
            .decrypt(Nonce::from_slice(&nonce), ciphertext)
            .map_err(|_| CryptoError::Authentication)
    }

    /// Reclaim the counter value of a block that was consumed but never
    /// delivered, so the retried attempt reuses the same nonce for the same
    /// plaintext.
    ///
    /// Idempotent within one failure window: only the first call after an
    /// [`encrypt_block`](Self::encrypt_block) decrements.
    pub fn rollback_counter(&mut self) {
        if !self.rolled_back {
            self.block_counter = self.block_counter.saturating_sub(1);
            self.rolled_back = true;
        }
    }

    /// The next counter value that will be consumed.
    pub fn block_counter(&self) -> u32 {
        self.block_counter
    }
}

// Don't leak key material in debug output
impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key", &"[REDACTED]")
            .field("block_iv_base", &"[REDACTED]")
            .field("filename_iv_base", &"[REDACTED]")
            .field("block_counter", &self.block_counter)
            .field("filename_used", &self.filename_used)
            .field("rolled_back", &self.rolled_back)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reduced work factor so tests do not spend seconds in PBKDF2.
    fn test_profile() -> KeyProfile {
        KeyProfile::new(1_000)
    }

    fn test_key(password: &str, salt: &Salt) -> KeyMaterial {
        KeyMaterial::derive_with_profile(password, salt, test_profile()).unwrap()
    }

    fn fixed_salt() -> Salt {
        Salt::from_bytes(&[42u8; 32]).unwrap()
    }

    // ===========================================
    // Key Derivation Tests
    // ===========================================

    #[test]
    fn derivation_is_deterministic() {
        let salt = fixed_salt();
        let a = test_key("hunter2", &salt);
        let b = test_key("hunter2", &salt);

        assert_eq!(a.key, b.key);
        assert_eq!(a.block_iv_base, b.block_iv_base);
        assert_eq!(a.filename_iv_base, b.filename_iv_base);
    }

    #[test]
    fn different_passwords_derive_different_keys() {
        let salt = fixed_salt();
        let a = test_key("password-1", &salt);
        let b = test_key("password-2", &salt);
        assert_ne!(a.key, b.key);
    }

    #[test]
    fn different_salts_derive_different_keys() {
        let a = test_key("same", &Salt::from_bytes(&[1u8; 32]).unwrap());
        let b = test_key("same", &Salt::from_bytes(&[2u8; 32]).unwrap());
        assert_ne!(a.key, b.key);
    }

    #[test]
    fn subkeys_come_from_disjoint_ranges() {
        let key = test_key("subkeys", &fixed_salt());
        assert_ne!(key.block_iv_base, key.filename_iv_base);
    }

    #[test]
    fn iteration_count_changes_the_key() {
        let salt = fixed_salt();
        let a = KeyMaterial::derive_with_profile("pw", &salt, KeyProfile::new(1_000)).unwrap();
        let b = KeyMaterial::derive_with_profile("pw", &salt, KeyProfile::new(2_000)).unwrap();
        assert_ne!(a.key, b.key);
    }

    // ===========================================
    // Filename Cipher Tests
    // ===========================================

    #[test]
    fn filename_roundtrip() {
        let salt = fixed_salt();
        let mut sender = test_key("pw", &salt);
        let encrypted = sender.encrypt_filename("tax-return.pdf").unwrap();

        let receiver = test_key("pw", &salt);
        assert_eq!(receiver.decrypt_filename(&encrypted).unwrap(), "tax-return.pdf");
    }

    #[test]
    fn filename_encrypt_twice_is_reuse_error() {
        let mut key = test_key("pw", &fixed_salt());
        key.encrypt_filename("a.txt").unwrap();

        let err = key.encrypt_filename("b.txt").unwrap_err();
        assert!(matches!(err, CryptoError::FilenameReuse));
    }

    #[test]
    fn filename_decrypt_has_no_reuse_guard() {
        let salt = fixed_salt();
        let mut sender = test_key("pw", &salt);
        let encrypted = sender.encrypt_filename("a.txt").unwrap();

        let receiver = test_key("pw", &salt);
        receiver.decrypt_filename(&encrypted).unwrap();
        receiver.decrypt_filename(&encrypted).unwrap();
    }

    #[test]
    fn wrong_password_fails_filename_decryption() {
        let salt = fixed_salt();
        let mut sender = test_key("right", &salt);
        let encrypted = sender.encrypt_filename("a.txt").unwrap();

        let receiver = test_key("wrong", &salt);
        let err = receiver.decrypt_filename(&encrypted).unwrap_err();
        assert!(matches!(err, CryptoError::Decryption));
    }

    #[test]
    fn garbage_base64_fails_filename_decryption() {
        let key = test_key("pw", &fixed_salt());
        let err = key.decrypt_filename("not/base64!!!").unwrap_err();
        assert!(matches!(err, CryptoError::Decryption));
    }

    #[test]
    fn unicode_filenames_roundtrip() {
        let salt = fixed_salt();
        let mut sender = test_key("pw", &salt);
        let encrypted = sender.encrypt_filename("übersicht 報告.txt").unwrap();

        let receiver = test_key("pw", &salt);
        assert_eq!(
            receiver.decrypt_filename(&encrypted).unwrap(),
            "übersicht 報告.txt"
        );
    }

    // ===========================================
    // Block Cipher Tests
    // ===========================================

    #[test]
    fn block_sequence_roundtrip() {
        let salt = fixed_salt();
        let mut sender = test_key("pw", &salt);

        let blocks: Vec<Vec<u8>> = vec![vec![1u8; 500], vec![2u8; 500], vec![3u8; 100]];
        let ciphertexts: Vec<Vec<u8>> = blocks
            .iter()
            .map(|b| sender.encrypt_block(b).unwrap())
            .collect();

        // Each ciphertext is its plaintext plus the tag.
        for (block, ciphertext) in blocks.iter().zip(&ciphertexts) {
            assert_eq!(ciphertext.len(), block.len() + 16);
        }

        let mut receiver = test_key("pw", &salt);
        for (block, ciphertext) in blocks.iter().zip(&ciphertexts) {
            assert_eq!(&receiver.decrypt_block(ciphertext).unwrap(), block);
        }
    }

    #[test]
    fn counter_offset_fails_authentication_for_every_block() {
        let salt = fixed_salt();
        let mut sender = test_key("pw", &salt);
        let ciphertexts: Vec<Vec<u8>> = (0..3)
            .map(|i| sender.encrypt_block(&[i as u8; 64]).unwrap())
            .collect();

        // Receiver whose counter is ahead by one: every block must fail.
        let mut receiver = test_key("pw", &salt);
        receiver.encrypt_block(&[0u8; 1]).unwrap(); // burn counter 0

        for ciphertext in &ciphertexts {
            let err = receiver.decrypt_block(ciphertext).unwrap_err();
            assert!(matches!(err, CryptoError::Authentication));
        }
    }

    #[test]
    fn counter_increments_once_per_operation() {
        let salt = fixed_salt();
        let mut key = test_key("pw", &salt);
        assert_eq!(key.block_counter(), 0);

        key.encrypt_block(b"one").unwrap();
        assert_eq!(key.block_counter(), 1);
        key.encrypt_block(b"two").unwrap();
        assert_eq!(key.block_counter(), 2);
    }

    #[test]
    fn tampered_block_fails_authentication() {
        let salt = fixed_salt();
        let mut sender = test_key("pw", &salt);
        let mut ciphertext = sender.encrypt_block(&[7u8; 256]).unwrap();
        ciphertext[100] ^= 0xFF;

        let mut receiver = test_key("pw", &salt);
        let err = receiver.decrypt_block(&ciphertext).unwrap_err();
        assert!(matches!(err, CryptoError::Authentication));
    }

    #[test]
    fn empty_final_block_roundtrips() {
        let salt = fixed_salt();
        let mut sender = test_key("pw", &salt);
        let ciphertext = sender.encrypt_block(b"").unwrap();
        assert_eq!(ciphertext.len(), 16);

        let mut receiver = test_key("pw", &salt);
        assert!(receiver.decrypt_block(&ciphertext).unwrap().is_empty());
    }

    // ===========================================
    // Rollback Tests
    // ===========================================

    #[test]
    fn rollback_reuses_the_same_nonce_for_the_same_block() {
        let salt = fixed_salt();
        let mut sender = test_key("pw", &salt);

        let first_attempt = sender.encrypt_block(&[9u8; 128]).unwrap();
        // Delivery failed: reclaim the counter and retry the same block.
        sender.rollback_counter();
        let second_attempt = sender.encrypt_block(&[9u8; 128]).unwrap();

        // Same nonce, same plaintext: identical ciphertext.
        assert_eq!(first_attempt, second_attempt);

        // And the receiver decrypts it at the expected counter position.
        let mut receiver = test_key("pw", &salt);
        assert_eq!(receiver.decrypt_block(&second_attempt).unwrap(), [9u8; 128]);
    }

    #[test]
    fn double_rollback_is_a_noop() {
        let salt = fixed_salt();
        let mut key = test_key("pw", &salt);

        key.encrypt_block(b"block 0").unwrap();
        key.encrypt_block(b"block 1").unwrap();
        assert_eq!(key.block_counter(), 2);

        key.rollback_counter();
        assert_eq!(key.block_counter(), 1);
        key.rollback_counter();
        assert_eq!(key.block_counter(), 1);
    }

    #[test]
    fn rollback_before_any_block_is_a_noop() {
        let mut key = test_key("pw", &fixed_salt());
        key.rollback_counter();
        assert_eq!(key.block_counter(), 0);
    }

    #[test]
    fn encrypt_rearms_the_rollback_guard() {
        let salt = fixed_salt();
        let mut key = test_key("pw", &salt);

        key.encrypt_block(b"a").unwrap();
        key.rollback_counter();
        key.encrypt_block(b"a").unwrap();
        key.rollback_counter();
        assert_eq!(key.block_counter(), 0);
    }

    // ===========================================
    // Debug Redaction Tests
    // ===========================================

    #[test]
    fn key_material_debug_is_redacted() {
        let key = test_key("pw", &fixed_salt());
        let debug = format!("{:?}", key);
        assert!(debug.contains("REDACTED"));
    }
}
