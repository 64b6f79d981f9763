//! Session token codec.
//!
//! A session is a user ID encrypted with AES-256-GCM and carried in a cookie.
//! The token format is: base64(nonce || ciphertext || tag) where the nonce is
//! 12 bytes and the tag is 16 bytes (AES-GCM authentication tag).
//!
//! Tokens are opaque to the client and only ever decoded, never compared by
//! equality, so the random nonce making each token unique is fine.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ring::pbkdf2;
use std::num::NonZeroU32;

/// The length of the AES-256 key in bytes
pub const KEY_LENGTH: usize = 32;

/// The length of the AES-GCM nonce in bytes
const NONCE_LENGTH: usize = 12;

/// Number of PBKDF2 iterations for key derivation
const PBKDF2_ITERATIONS: u32 = 100_000;

/// Salt for PBKDF2 key derivation (fixed salt is acceptable here since the
/// secret itself is unique per deployment)
const PBKDF2_SALT: &[u8] = b"wordfave-session-v1";

/// Derive a 256-bit session key from the configured secret using PBKDF2.
///
/// Rotating the secret invalidates every outstanding session; there is no
/// migration path by design.
pub fn derive_key(secret: &str) -> [u8; KEY_LENGTH] {
    let mut key = [0u8; KEY_LENGTH];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        NonZeroU32::new(PBKDF2_ITERATIONS).unwrap(),
        PBKDF2_SALT,
        secret.as_bytes(),
        &mut key,
    );
    key
}

/// Encode a user ID into an opaque session token.
///
/// # Errors
/// Returns an error if encryption fails.
pub fn encode(user_id: i64, key: &[u8; KEY_LENGTH]) -> Result<String> {
    use rand::RngCore;

    let mut nonce_bytes = [0u8; NONCE_LENGTH];
    rand::rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| anyhow::anyhow!("Failed to create cipher: {}", e))?;

    let ciphertext = cipher
        .encrypt(nonce, user_id.to_string().as_bytes())
        .map_err(|e| anyhow::anyhow!("Encryption failed: {}", e))?;

    // nonce || ciphertext
    let mut combined = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
    combined.extend_from_slice(&nonce_bytes);
    combined.extend_from_slice(&ciphertext);

    Ok(BASE64.encode(&combined))
}

/// Decode a session token back into a user ID.
///
/// Any malformed, truncated, or tampered token, or a token produced under a
/// different secret, is an error. Callers treat a decode failure identically
/// to "no session"; it must never surface as a 5xx.
pub fn decode(token: &str, key: &[u8; KEY_LENGTH]) -> Result<i64> {
    let combined = BASE64.decode(token).context("Failed to decode base64")?;

    if combined.len() < NONCE_LENGTH + 1 {
        anyhow::bail!("Token too short");
    }

    let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LENGTH);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| anyhow::anyhow!("Failed to create cipher: {}", e))?;
    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| anyhow::anyhow!("Decryption failed (wrong key or corrupted token): {}", e))?;

    let id_text = String::from_utf8(plaintext).context("Decrypted token is not valid UTF-8")?;
    id_text
        .parse::<i64>()
        .with_context(|| format!("Decrypted token is not a user id: {id_text:?}"))
}
