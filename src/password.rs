//! Password policy, generation, and generator configuration.
//!
//! The generator draws uniformly from the pools the user enabled. Random
//! bytes above the largest multiple of the pool size are rejected outright
//! rather than folded back in, so no symbol is ever more likely than
//! another.

use anyhow::{Result, bail, ensure};

use crate::config::{CONFIG_DATA_SIZE, MAX_PASSWORD_LEN, MIN_PASSWORD_LEN};
use crate::crypto::fill_random;
use crate::secret::SecretBuf;
use crate::util::is_printable;

const NUMS: &[u8] = b"0123456789";
const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
const SPECIALS: &[u8] = b"!@#$%^&*()-_=+[{}]\\|;:'\",<.>/?";

/// Password-generator settings, persisted encrypted in the system file.
///
/// Serialized form is exactly four bytes:
/// `[useNums][useLetters][useSpecials][passwordLen]`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct GeneratorConfig {
    pub use_nums: bool,
    pub use_letters: bool,
    pub use_specials: bool,
    pub length: u8,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self { use_nums: true, use_letters: true, use_specials: true, length: crate::config::DEFAULT_PASSWORD_LEN }
    }
}

impl GeneratorConfig {
    /// Serializes to the on-disk form.
    pub fn serialize(&self) -> [u8; CONFIG_DATA_SIZE] {
        [u8::from(self.use_nums), u8::from(self.use_letters), u8::from(self.use_specials), self.length]
    }

    /// Deserializes the on-disk form.
    ///
    /// The bytes come out of an authenticated record, so anything out of
    /// range means the store is corrupted.
    pub fn deserialize(data: &[u8; CONFIG_DATA_SIZE]) -> Result<Self> {
        for &flag in &data[..3] {
            ensure!(flag <= 1, "Data corrupted: invalid generator flag");
        }

        let length = data[3];
        ensure!(
            (MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&usize::from(length)),
            "Data corrupted: invalid generator password length"
        );

        Ok(Self { use_nums: data[0] == 1, use_letters: data[1] == 1, use_specials: data[2] == 1, length })
    }

    /// The active symbol pool: enabled pools concatenated in digits,
    /// letters, specials order.
    fn symbols(&self) -> Vec<u8> {
        let mut pool = Vec::with_capacity(NUMS.len() + LETTERS.len() + SPECIALS.len());

        if self.use_nums {
            pool.extend_from_slice(NUMS);
        }
        if self.use_letters {
            pool.extend_from_slice(LETTERS);
        }
        if self.use_specials {
            pool.extend_from_slice(SPECIALS);
        }

        pool
    }
}

/// Generates a password of `cfg.length` symbols into a fresh buffer.
pub fn generate(cfg: &GeneratorConfig) -> Result<SecretBuf> {
    let pool = cfg.symbols();
    ensure!(!pool.is_empty(), "at least one symbol pool must be enabled");

    // Largest byte value that maps onto the pool without modulo bias.
    let max_index = u8::try_from((256 / pool.len()) * pool.len() - 1).unwrap_or(u8::MAX);

    let mut out = SecretBuf::with_capacity(MAX_PASSWORD_LEN)?;
    let mut rand = [0u8; MAX_PASSWORD_LEN];

    while out.len() < usize::from(cfg.length) {
        fill_random(&mut rand)?;

        for &byte in &rand {
            if byte > max_index {
                continue;
            }

            out.push(pool[usize::from(byte) % pool.len()])?;
            if out.len() == usize::from(cfg.length) {
                break;
            }
        }
    }

    Ok(out)
}

/// Checks a password against the policy.
pub fn validate(pwd: &[u8]) -> Result<()> {
    if !is_printable(pwd) {
        bail!("Only printable characters can be used.");
    }
    if pwd.len() < MIN_PASSWORD_LEN {
        bail!("Passwords must be at least {MIN_PASSWORD_LEN} characters.");
    }
    if pwd.len() > MAX_PASSWORD_LEN {
        bail!("Passwords must be at most {MAX_PASSWORD_LEN} characters.");
    }

    Ok(())
}
