//! Sheet protection password hashing
//!
//! The stored verifier is `H0 = SHA-512(salt || UTF-16LE(password))`, then
//! `Hn = SHA-512(Hn-1 || n as u32 LE)` for `spin_count` rounds. Only salt, final
//! hash and spin count are kept; the password itself is dropped after hashing.

use crate::error::{ExcelError, Result};
use base64::engine::general_purpose::STANDARD as BASE64_ENGINE;
use base64::Engine;
use sha2::{Digest, Sha512};

pub const DEFAULT_SPIN_COUNT: u32 = 100_000;
pub const MAX_PASSWORD_LEN: usize = 255;
pub const ALGORITHM_NAME: &str = "SHA-512";

/// Password length must be 1..=255 characters
pub fn validate_password(password: &str) -> Result<()> {
    let len = password.chars().count();
    if len == 0 {
        return Err(ExcelError::InvalidPassword(
            "password must not be empty".to_string(),
        ));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(ExcelError::InvalidPassword(format!(
            "password has {} characters, maximum is {}",
            len, MAX_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Run the iterated SHA-512 derivation
pub fn derive_hash(password: &str, salt: &[u8], spin_count: u32) -> Vec<u8> {
    let mut pw_bytes = Vec::with_capacity(password.len() * 2);
    for unit in password.encode_utf16() {
        pw_bytes.extend_from_slice(&unit.to_le_bytes());
    }

    let mut hasher = Sha512::new();
    hasher.update(salt);
    hasher.update(&pw_bytes);
    let mut hash = hasher.finalize();

    for i in 0..spin_count {
        let mut hasher = Sha512::new();
        hasher.update(hash);
        hasher.update(i.to_le_bytes());
        hash = hasher.finalize();
    }
    hash.to_vec()
}

/// Salted verifier for a protection password
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash {
    salt: Vec<u8>,
    hash: Vec<u8>,
    spin_count: u32,
}

impl PasswordHash {
    /// Hash with a fresh random 16-byte salt
    pub fn new(password: &str, spin_count: u32) -> Result<Self> {
        let salt: [u8; 16] = rand::random();
        Self::with_salt(password, &salt, spin_count)
    }

    pub fn with_salt(password: &str, salt: &[u8], spin_count: u32) -> Result<Self> {
        validate_password(password)?;
        Ok(PasswordHash {
            salt: salt.to_vec(),
            hash: derive_hash(password, salt, spin_count),
            spin_count,
        })
    }

    pub fn hash_base64(&self) -> String {
        BASE64_ENGINE.encode(&self.hash)
    }

    pub fn salt_base64(&self) -> String {
        BASE64_ENGINE.encode(&self.salt)
    }

    pub fn spin_count(&self) -> u32 {
        self.spin_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        let salt = BASE64_ENGINE.decode("5kelhTC7DUqQ5qi78ihM8A==").unwrap();
        let hash = PasswordHash::with_salt("Lorem ipsum", &salt, DEFAULT_SPIN_COUNT).unwrap();

        assert_eq!(
            hash.hash_base64(),
            "/dQmPXViT1u/fiTHmjLlP2HqOjYeRKI8W367Qn/Eikv63K8nnZMiyk2Wl9ShdHaBL7y1AeeJq5gxm4bW0ArxYg=="
        );
        assert_eq!(hash.salt_base64(), "5kelhTC7DUqQ5qi78ihM8A==");
        assert_eq!(hash.spin_count(), 100_000);
    }

    #[test]
    fn test_single_spin() {
        let salt = BASE64_ENGINE.decode("5kelhTC7DUqQ5qi78ihM8A==").unwrap();
        assert_eq!(
            BASE64_ENGINE.encode(derive_hash("x", &salt, 1)),
            "knvz9gF2+6xM5AYITe9miF3lk3SbZfRx4+OzPTFlTIRa8JHFsGo6cdiRzLw8mySy4tgwnTLwENdlB6eqYas2Yg=="
        );
    }

    #[test]
    fn test_password_length() {
        assert!(validate_password("").is_err());
        assert!(validate_password(&"a".repeat(255)).is_ok());
        assert!(validate_password(&"a".repeat(256)).is_err());
        assert!(PasswordHash::new("", 10).is_err());
    }

    #[test]
    fn test_random_salt_differs() {
        let a = PasswordHash::new("secret", 1).unwrap();
        let b = PasswordHash::new("secret", 1).unwrap();
        assert_ne!(a.salt_base64(), b.salt_base64());
    }
}
