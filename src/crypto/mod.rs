//! Cryptographic primitives.
//!
//! Three small layers sit here:
//! - **Randomness**: non-blocking OS random bytes for salts and nonces.
//! - **Key derivation**: Argon2id, parameterized by a salt and a domain
//!   label, producing both encryption keys and the hex filenames that hide
//!   item names on disk.
//! - **Authenticated encryption**: ChaCha20-Poly1305 with detached tags,
//!   operating in place on the fixed-size record fields.
//!
//! The nonce discipline is the one rule that matters: a key derived fresh
//! for a single message uses the fixed nonce, while the one reused key
//! (item names) must get a random nonce per message.

mod aead;
mod derive;
mod random;

pub use aead::{decrypt, encrypt};
pub use derive::{derive_key, derive_name};
pub use random::fill_random;
