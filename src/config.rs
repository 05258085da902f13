//! Application constants.
//!
//! This module defines the constants used throughout the vault, including:
//! - Cryptographic parameters (key sizes, nonce sizes, Argon2 costs)
//! - On-disk record layouts and field limits
//! - Key-derivation domain labels
//! - Storage location names
//!
//! These constants are the single source of truth for the file formats; the
//! system and item records are fixed-offset byte layouts built from them.

/// The application name used in user-facing output and prompts.
pub const APP_NAME: &str = "pwm";

/// Size of a symmetric encryption key in bytes.
///
/// 32 bytes (256 bits) for ChaCha20-Poly1305.
pub const KEY_SIZE: usize = 32;

/// Size of the Poly1305 authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Size of the ChaCha20-Poly1305 nonce in bytes.
///
/// Standard 12 bytes (96 bits). Random 96-bit nonces are only used with the
/// item-name key, which sees at most a couple of hundred messages; every
/// other encryption gets a fresh key and the fixed nonce.
pub const NONCE_SIZE: usize = 12;

/// Size of a key-derivation salt in bytes.
pub const SALT_SIZE: usize = 32;

/// Fixed nonce used whenever the encryption key is derived fresh for a
/// single message. Uniqueness of the (key, nonce) pair comes from the
/// per-message salt, so the nonce itself never varies.
///
/// Never use this nonce with a key that encrypts more than one message.
pub const FIXED_NONCE: [u8; NONCE_SIZE] = [0x81, 0x88, 0x77, 0x9a, 0xe0, 0x81, 0xc6, 0x9b, 0x4f, 0x11, 0x15, 0x5a];

/// Argon2id memory cost in KiB.
///
/// 8 MiB. Locked pages are a scarce resource under RLIMIT_MEMLOCK, so the
/// memory cost stays modest and the time cost carries the work factor.
#[cfg(not(test))]
pub const ARGON_MEMORY: u32 = 8192;

/// Argon2id time cost (number of passes).
#[cfg(not(test))]
pub const ARGON_TIME: u32 = 100;

// Reduced costs for unit tests. 64 KiB still satisfies Argon2's minimum of
// 8 KiB per lane.
#[cfg(test)]
pub const ARGON_MEMORY: u32 = 64;
#[cfg(test)]
pub const ARGON_TIME: u32 = 1;

/// Argon2id parallelism (lanes).
pub const ARGON_LANES: u32 = 4;

/// Domain label for data-encryption keys (config record and item data).
pub const DATA_KEY_LABEL: &str = "data";

/// Domain label for the item-name encryption key.
pub const NAME_KEY_LABEL: &str = "names";

/// Domain label suffix for filename derivation. The effective label is the
/// item name with this suffix appended.
pub const FILE_NAME_LABEL: &str = "files";

/// Number of derived bytes behind an item filename.
pub const FILENAME_BIN_LEN: usize = 32;

/// Length of an item filename: the derived bytes, hex-encoded.
pub const FILENAME_HEX_LEN: usize = FILENAME_BIN_LEN * 2;

/// Maximum length of an item name in bytes.
pub const MAX_ITEM_NAME_LEN: usize = 100;

/// Maximum length of a username in bytes.
pub const MAX_USERNAME_LEN: usize = 100;

/// Maximum length of the free-form other-info field in bytes.
pub const MAX_OTHER_INFO_LEN: usize = 300;

/// Minimum password length, for both the master password and item passwords.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Maximum password length.
pub const MAX_PASSWORD_LEN: usize = 64;

/// Size of the item-data plaintext: the three fields joined by newlines and
/// zero-padded to this fixed length so the ciphertext never leaks field
/// sizes.
pub const ITEM_DATA_SIZE: usize = 600;

/// Size of the serialized password-generator configuration.
pub const CONFIG_DATA_SIZE: usize = 4;

/// Total size of the system file:
/// `fileSalt | nameSalt | cfgSalt | cfgTag | cfgCT`.
pub const SYSTEM_FILE_SIZE: usize = 3 * SALT_SIZE + TAG_SIZE + CONFIG_DATA_SIZE;

/// Total size of an item file:
/// `nameNonce | nameTag | nameCT | dataSalt | dataTag | dataCT`.
pub const ITEM_FILE_SIZE: usize = NONCE_SIZE + TAG_SIZE + MAX_ITEM_NAME_LEN + SALT_SIZE + TAG_SIZE + ITEM_DATA_SIZE;

/// Storage directory, relative to the home directory.
pub const STORAGE_DIR: &str = "PwmStore";

/// Name of the system file inside the storage directory.
pub const SYSTEM_FILE_NAME: &str = "system";

/// Name of the transient file used for atomic rewrites.
pub const TEMP_FILE_NAME: &str = "temp";

/// Maximum number of live sensitive buffers. The bound exists to catch
/// leaks, not to scale; exceeding it is an internal error.
pub const MAX_SENSITIVE_BUFS: usize = 100;

/// Expected upper bound on the number of items in a store.
pub const MAX_NUM_ITEMS: usize = 200;

/// Default generated-password length.
pub const DEFAULT_PASSWORD_LEN: u8 = 25;

/// Initial master-password retry backoff in seconds.
pub const BACKOFF_INITIAL_SECS: u64 = 1;

/// Upper bound on the master-password retry backoff. The backoff doubles on
/// every failure up to this cap, so repeated typos stay survivable.
pub const BACKOFF_MAX_SECS: u64 = 60;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_sizes() {
        assert_eq!(SYSTEM_FILE_SIZE, 116);
        assert_eq!(ITEM_FILE_SIZE, 776);
        assert_eq!(FILENAME_HEX_LEN, 64);
    }
}
