//! The vault: the on-disk store of system and item records.
//!
//! The system record carries the store-wide salts and the encrypted
//! password-generator configuration; item records carry one named secret
//! each, addressed on disk by a filename derived from the master secret so
//! the directory listing reveals nothing. Everything here is
//! non-interactive; the command layer owns the prompting and calls these
//! operations with the data in hand.

mod item;
mod paths;
mod system;

pub use item::{
    ItemFields, ItemRecord, data_key, derive_item_file_name, is_item_name_valid, list_names, name_key, open_fields, open_name,
    seal_fields, seal_name,
};
pub use paths::StorePaths;
pub use system::{SystemRecord, init_store, is_initialized, rewrite_config};

use anyhow::{Context, Result};

use crate::config::KEY_SIZE;
use crate::secret::SecretBuf;

/// Views a derived-key buffer as the fixed-size array the cipher wants.
fn key_bytes(key: &SecretBuf) -> Result<&[u8; KEY_SIZE]> {
    key.as_bytes().try_into().context("Internal error: bad key size")
}
