//! pwm - A single-user command-line password vault.
//!
//! Items (username, password, free-form notes) are stored one per file
//! under `$HOME/PwmStore`, every byte either random or authenticated
//! ciphertext under keys derived from a single master password:
//! - Argon2id for key derivation
//! - ChaCha20-Poly1305 for authenticated encryption
//! - Derived filenames so the store carries no plaintext index
//! - Locked, registered, zeroized buffers for every secret in memory

pub mod cli;
pub mod commands;
pub mod config;
pub mod crypto;
pub mod fileio;
pub mod lifecycle;
pub mod mem;
pub mod password;
pub mod secret;
pub mod ui;
pub mod util;
pub mod vault;
