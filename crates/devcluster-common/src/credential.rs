//! Administrator credential derivation and session secrets.
//!
//! Hashed credentials use the node's native format:
//! ```text
//! -pbkdf2-<hex(PBKDF2-HMAC-SHA1(password, salt, iterations, key_length))>,<salt>,<iterations>
//! ```
//! The value is derived once per session and written verbatim into every
//! node's config. Nodes never re-derive it.

use rand::Rng;
use sha1::Sha1;

use crate::constants::{PBKDF2_ITERATIONS, PBKDF2_KEY_LENGTH, PBKDF2_TAG};
use crate::error::DevClusterError;

/// Derive a hashed credential string.
///
/// Pure and deterministic: identical inputs always yield byte-identical
/// output. Empty password or salt, zero iterations, or a zero key length
/// are rejected.
pub fn derive(
    password: &str,
    salt: &str,
    iterations: u32,
    key_length: usize,
) -> Result<String, DevClusterError> {
    if password.is_empty() {
        return Err(DevClusterError::InvalidCredential(
            "password is empty".to_string(),
        ));
    }
    if salt.is_empty() {
        return Err(DevClusterError::InvalidCredential("salt is empty".to_string()));
    }
    if iterations == 0 || key_length == 0 {
        return Err(DevClusterError::InvalidCredential(
            "iterations and key length must be positive".to_string(),
        ));
    }

    let mut key = vec![0u8; key_length];
    pbkdf2::pbkdf2_hmac::<Sha1>(password.as_bytes(), salt.as_bytes(), iterations, &mut key);

    Ok(format!(
        "{PBKDF2_TAG}{},{salt},{iterations}",
        hex::encode(key)
    ))
}

/// Derive with the tool's fixed iteration count and key length
pub fn derive_default(password: &str, salt: &str) -> Result<String, DevClusterError> {
    derive(password, salt, PBKDF2_ITERATIONS, PBKDF2_KEY_LENGTH)
}

/// Random lowercase hex string of `bytes` bytes of OS randomness
pub fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::rng().fill(buf.as_mut_slice());
    hex::encode(buf)
}

/// Fresh cluster-wide secret (32 hex characters)
pub fn generate_secret() -> String {
    random_hex(16)
}

/// Fresh per-session credential salt (32 hex characters)
pub fn generate_salt() -> String {
    random_hex(16)
}
