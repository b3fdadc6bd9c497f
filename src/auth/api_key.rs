//! Team API key material: `<prefix>.<secret>`, where only the prefix and the
//! SHA-256 of the whole key are persisted.

use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const API_KEY_HEADER: &str = "API-KEY";
pub const PREFIX_LENGTH: usize = 8;
pub const SECRET_LENGTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedKey {
    pub prefix: String,
    pub clear_key: String,
    pub hashed_key: String,
}

pub fn generate_key() -> GeneratedKey {
    let prefix: String = Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .take(PREFIX_LENGTH)
        .collect();
    let secret = Uuid::new_v4().simple().to_string();
    let clear_key = format!("{}.{}", prefix, secret);
    let hashed_key = hash_key(&clear_key);

    GeneratedKey {
        prefix,
        clear_key,
        hashed_key,
    }
}

pub fn hash_key(clear_key: &str) -> String {
    hex::encode(Sha256::digest(clear_key.as_bytes()))
}

/// Splits a presented key into its prefix, rejecting anything that is not
/// `<prefix>.<secret>`.
pub fn key_prefix(presented: &str) -> Option<&str> {
    let (prefix, secret) = presented.trim().split_once('.')?;
    if prefix.is_empty() || secret.is_empty() {
        return None;
    }
    Some(prefix)
}

pub fn verify_key(presented: &str, hashed_key: &str) -> bool {
    let computed = hash_key(presented.trim());
    computed.len() == hashed_key.len()
        && computed
            .bytes()
            .zip(hashed_key.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_key_shape() {
        let key = generate_key();
        assert_eq!(key.prefix.len(), PREFIX_LENGTH);
        let (prefix, secret) = key.clear_key.split_once('.').unwrap();
        assert_eq!(prefix, key.prefix);
        assert_eq!(secret.len(), SECRET_LENGTH);
        assert_eq!(key.hashed_key.len(), 64);
        assert_ne!(key.hashed_key, key.clear_key);
    }

    #[test]
    fn test_verify_key() {
        let key = generate_key();
        assert!(verify_key(&key.clear_key, &key.hashed_key));
        assert!(!verify_key(&format!("{}x", key.clear_key), &key.hashed_key));
    }

    #[test]
    fn test_key_prefix() {
        assert_eq!(key_prefix("abcd1234.secret"), Some("abcd1234"));
        assert_eq!(key_prefix("no-dot"), None);
        assert_eq!(key_prefix(".secret"), None);
        assert_eq!(key_prefix("abcd1234."), None);
    }
}
