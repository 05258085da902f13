//! Key and name derivation with Argon2id.
//!
//! Every key in the system is derived from the master secret, a 32-byte
//! random salt, and a fixed domain label, so keys for different purposes
//! are guaranteed distinct even under the same salt. Argon2id's memory and
//! time costs make offline guessing of the master secret expensive.
//!
//! The label rides in Argon2's associated-data field. That field is capped
//! at 32 bytes while the filename label embeds the item name, so labels are
//! first compressed to a fixed-width BLAKE3 digest; distinct labels keep
//! distinct digests.

use anyhow::{Result, anyhow, ensure};
use argon2::Algorithm::Argon2id;
use argon2::Version::V0x13;
use argon2::{Argon2, AssociatedData, ParamsBuilder};

use crate::config::{ARGON_LANES, ARGON_MEMORY, ARGON_TIME, FILENAME_BIN_LEN, SALT_SIZE};

/// Builds the Argon2id instance for a domain label.
fn hasher(label: &str) -> Result<Argon2<'static>> {
    let digest = blake3::hash(label.as_bytes());
    let ad = AssociatedData::new(digest.as_bytes()).map_err(|e| anyhow!("Internal error: invalid KDF label: {e}"))?;

    let params = ParamsBuilder::new()
        .m_cost(ARGON_MEMORY)
        .t_cost(ARGON_TIME)
        .p_cost(ARGON_LANES)
        .data(ad)
        .build()
        .map_err(|e| anyhow!("Internal error: invalid argon2 parameters: {e}"))?;

    Ok(Argon2::new(Argon2id, V0x13, params))
}

/// Derives `out.len()` key bytes from the master secret.
///
/// # Arguments
/// * `secret` - The master secret bytes; must not be empty.
/// * `salt` - Random 32-byte salt.
/// * `label` - Domain-separation label.
/// * `out` - Output buffer; its length selects the derived size.
pub fn derive_key(secret: &[u8], salt: &[u8; SALT_SIZE], label: &str, out: &mut [u8]) -> Result<()> {
    ensure!(!secret.is_empty(), "Internal error: empty KDF secret");

    hasher(label)?
        .hash_password_into(secret, salt, out)
        .map_err(|e| anyhow!("Internal error: key derivation failed: {e}"))
}

/// Derives a name string from the master secret.
///
/// Produces 32 bytes and hex-encodes them to the 64-character lowercase
/// string used as an item filename. Deterministic in all three inputs and
/// independent of anything else in the store.
pub fn derive_name(secret: &[u8], salt: &[u8; SALT_SIZE], label: &str) -> Result<String> {
    let mut bin = [0u8; FILENAME_BIN_LEN];
    derive_key(secret, salt, label, &mut bin)?;

    Ok(hex::encode(bin))
}
