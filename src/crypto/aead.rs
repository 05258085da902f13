//! ChaCha20-Poly1305 authenticated encryption.
//!
//! All record fields are fixed-size, so encryption runs in place and the
//! 16-byte Poly1305 tag travels detached, stored at its own offset in the
//! record. Associated data is never used.

use anyhow::{Result, anyhow};
use chacha20poly1305::aead::AeadInPlace;
use chacha20poly1305::{ChaCha20Poly1305, Key, KeyInit, Nonce, Tag};

use crate::config::{KEY_SIZE, NONCE_SIZE, TAG_SIZE};

/// Encrypts `buf` in place and returns the authentication tag.
///
/// The caller owns the nonce choice: the fixed nonce is only valid with a
/// key derived for this one message, and a reused key requires a fresh
/// random nonce.
pub fn encrypt(key: &[u8; KEY_SIZE], nonce: &[u8; NONCE_SIZE], buf: &mut [u8]) -> Result<[u8; TAG_SIZE]> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(nonce), b"", buf)
        .map_err(|e| anyhow!("Internal error: encryption failed: {e}"))?;

    Ok(tag.into())
}

/// Decrypts `buf` in place, verifying the tag first.
///
/// Returns `true` if the tag verifies. On `false` the buffer is left
/// untouched; the caller decides whether the failure means a wrong master
/// password or a corrupted store.
#[must_use]
pub fn decrypt(key: &[u8; KEY_SIZE], nonce: &[u8; NONCE_SIZE], buf: &mut [u8], tag: &[u8; TAG_SIZE]) -> bool {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));

    cipher.decrypt_in_place_detached(Nonce::from_slice(nonce), b"", buf, Tag::from_slice(tag)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FIXED_NONCE;

    const KEY: [u8; KEY_SIZE] = [0x42; KEY_SIZE];

    #[test]
    fn test_round_trip() {
        let mut buf = *b"three newline separated fields";
        let original = buf;

        let tag = encrypt(&KEY, &FIXED_NONCE, &mut buf).unwrap();
        assert_ne!(buf, original);

        assert!(decrypt(&KEY, &FIXED_NONCE, &mut buf, &tag));
        assert_eq!(buf, original);
    }

    #[test]
    fn test_ciphertext_bit_flip_fails() {
        let mut buf = *b"some fixed size plaintext";
        let tag = encrypt(&KEY, &FIXED_NONCE, &mut buf).unwrap();

        buf[3] ^= 0x01;
        let tampered = buf;
        assert!(!decrypt(&KEY, &FIXED_NONCE, &mut buf, &tag));
        // A failed decrypt must not touch the buffer.
        assert_eq!(buf, tampered);
    }

    #[test]
    fn test_tag_bit_flip_fails() {
        let mut buf = *b"some fixed size plaintext";
        let mut tag = encrypt(&KEY, &FIXED_NONCE, &mut buf).unwrap();

        tag[0] ^= 0x80;
        assert!(!decrypt(&KEY, &FIXED_NONCE, &mut buf, &tag));
    }

    #[test]
    fn test_wrong_key_fails() {
        let mut buf = *b"some fixed size plaintext";
        let tag = encrypt(&KEY, &FIXED_NONCE, &mut buf).unwrap();

        let wrong = [0x43; KEY_SIZE];
        assert!(!decrypt(&wrong, &FIXED_NONCE, &mut buf, &tag));
    }
}
