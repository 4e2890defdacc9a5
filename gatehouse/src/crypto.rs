//! Secret codec for ephemeral credentials.
//!
//! Two distinct treatments, chosen by whether the plaintext ever needs to be
//! recovered:
//!
//! - [`digest`]: one-way SHA-256 for email-verification and password-reset
//!   tokens. Only ever compared against a digest of the presented secret.
//! - [`SecretCodec`]: reversible ChaCha20-Poly1305 for login challenge codes,
//!   which must be decrypted to email the plaintext code to the user.

use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, KeyInit},
};
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::auth::{AuthError, AuthResult};

/// Inclusive range of the six-digit login challenge code.
pub const LOGIN_CODE_MIN: u32 = 100_000;
pub const LOGIN_CODE_MAX: u32 = 999_999;

const NONCE_LEN: usize = 12;

/// One-way digest, hex-encoded. Deterministic so the stored value can be
/// matched by querying on the digest of the presented secret.
pub fn digest(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

/// Constant-time equality for user-supplied secrets.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Uniform random six-digit login challenge code.
pub fn generate_login_code() -> String {
    rand::rng()
        .random_range(LOGIN_CODE_MIN..=LOGIN_CODE_MAX)
        .to_string()
}

/// 32 random bytes, hex-encoded. Used for verification/reset token secrets
/// and for placeholder passwords on identity-provider accounts.
pub fn generate_token_secret() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Symmetric codec keyed by a process-wide secret, injected where needed
/// rather than read from ambient state.
#[derive(Clone)]
pub struct SecretCodec {
    key: [u8; 32],
}

impl SecretCodec {
    /// Stretch the configured secret string into a fixed-width cipher key.
    pub fn new(key: &str) -> Self {
        let mut fixed = [0u8; 32];
        fixed.copy_from_slice(&Sha256::digest(key.as_bytes()));
        Self { key: fixed }
    }

    /// Encrypt a login code. Returns `hex(nonce || ciphertext)` with a fresh
    /// random 12-byte nonce per call.
    pub fn encrypt(&self, plaintext: &str) -> AuthResult<String> {
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&self.key));
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| AuthError::CryptoFailed)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(hex::encode(out))
    }

    /// Recover the plaintext from `hex(nonce || ciphertext)`.
    pub fn decrypt(&self, encoded: &str) -> AuthResult<String> {
        let data = hex::decode(encoded).map_err(|_| AuthError::CryptoFailed)?;
        if data.len() < NONCE_LEN {
            return Err(AuthError::CryptoFailed);
        }
        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&self.key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| AuthError::CryptoFailed)?;
        String::from_utf8(plaintext).map_err(|_| AuthError::CryptoFailed)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn digest_is_deterministic_and_hex() {
        let a = digest("secret");
        let b = digest("secret");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, digest("secret2"));
    }

    #[test]
    fn constant_time_eq_handles_unequal_lengths() {
        assert!(constant_time_eq("123456", "123456"));
        assert!(!constant_time_eq("123456", "123457"));
        assert!(!constant_time_eq("123456", "12345"));
    }

    #[test]
    fn login_code_is_six_digits() {
        for _ in 0..100 {
            let code = generate_login_code();
            assert_eq!(code.len(), 6);
            let value: u32 = code.parse().unwrap();
            assert!((LOGIN_CODE_MIN..=LOGIN_CODE_MAX).contains(&value));
        }
    }

    #[test]
    fn token_secret_is_32_bytes_hex() {
        let secret = generate_token_secret();
        assert_eq!(secret.len(), 64);
        assert!(hex::decode(&secret).is_ok());
    }

    #[test]
    fn encrypt_produces_distinct_ciphertexts() {
        let codec = SecretCodec::new("key");
        let a = codec.encrypt("123456").unwrap();
        let b = codec.encrypt("123456").unwrap();
        // Fresh nonce per call.
        assert_ne!(a, b);
        assert_eq!(codec.decrypt(&a).unwrap(), "123456");
        assert_eq!(codec.decrypt(&b).unwrap(), "123456");
    }

    #[test]
    fn decrypt_rejects_wrong_key_and_tampering() {
        let codec = SecretCodec::new("key");
        let other = SecretCodec::new("other key");
        let ciphertext = codec.encrypt("654321").unwrap();

        assert!(other.decrypt(&ciphertext).is_err());
        assert!(codec.decrypt("not hex").is_err());
        assert!(codec.decrypt("abcd").is_err());

        let mut tampered = ciphertext.into_bytes();
        let last = tampered.len() - 1;
        tampered[last] = if tampered[last] == b'0' { b'1' } else { b'0' };
        assert!(codec.decrypt(&String::from_utf8(tampered).unwrap()).is_err());
    }

    proptest! {
        #[test]
        fn round_trips_every_six_digit_code(code in LOGIN_CODE_MIN..=LOGIN_CODE_MAX) {
            let codec = SecretCodec::new("process wide secret");
            let plaintext = code.to_string();
            let ciphertext = codec.encrypt(&plaintext).unwrap();
            prop_assert_eq!(codec.decrypt(&ciphertext).unwrap(), plaintext);
        }
    }
}
