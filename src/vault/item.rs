//! Item files.
//!
//! One file per item, 776 bytes, fixed layout:
//!
//! ```text
//! offset 0    12:  nameNonce
//! offset 12   16:  nameTag
//! offset 28  100:  nameCT    (encrypted, zero-padded item name)
//! offset 128  32:  dataSalt  (per-item data-key salt)
//! offset 160  16:  dataTag
//! offset 176 600:  dataCT    (encrypted, zero-padded item fields)
//! ```
//!
//! The filename is derived from the master secret, the store's file salt
//! and the item name, so items can be addressed by name without any index
//! while the directory listing stays opaque. Every field is fixed-size;
//! the file length never depends on the stored values.
//!
//! The data key is derived fresh per write from `dataSalt`, so data
//! encryption uses the fixed nonce. The name key is shared by all items
//! and therefore pairs with the random `nameNonce` stored in the record.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, ensure};
use tracing::debug;

use crate::config::{
    DATA_KEY_LABEL, FILE_NAME_LABEL, FIXED_NONCE, ITEM_DATA_SIZE, ITEM_FILE_SIZE, KEY_SIZE, MAX_ITEM_NAME_LEN, MAX_NUM_ITEMS,
    MAX_OTHER_INFO_LEN, MAX_PASSWORD_LEN, MAX_USERNAME_LEN, NAME_KEY_LABEL, NONCE_SIZE, SALT_SIZE, SYSTEM_FILE_NAME, TAG_SIZE,
    TEMP_FILE_NAME,
};
use crate::crypto::{decrypt, derive_key, derive_name, encrypt};
use crate::fileio;
use crate::secret::SecretBuf;
use crate::util::is_printable;

use super::paths::StorePaths;
use super::key_bytes;

/// In-memory form of an item file.
pub struct ItemRecord {
    pub name_nonce: [u8; NONCE_SIZE],
    pub name_tag: [u8; TAG_SIZE],
    pub name_ct: [u8; MAX_ITEM_NAME_LEN],
    pub data_salt: [u8; SALT_SIZE],
    pub data_tag: [u8; TAG_SIZE],
    pub data_ct: [u8; ITEM_DATA_SIZE],
}

impl Default for ItemRecord {
    fn default() -> Self {
        Self {
            name_nonce: [0; NONCE_SIZE],
            name_tag: [0; TAG_SIZE],
            name_ct: [0; MAX_ITEM_NAME_LEN],
            data_salt: [0; SALT_SIZE],
            data_tag: [0; TAG_SIZE],
            data_ct: [0; ITEM_DATA_SIZE],
        }
    }
}

impl ItemRecord {
    /// Reads and parses an item file.
    pub fn read(path: &Path) -> Result<Self> {
        let mut file = fileio::open_read(path).context("Data corrupted")?;
        let mut buf = [0u8; ITEM_FILE_SIZE];
        fileio::read_exact_buf(&mut file, &mut buf).context("Data corrupted")?;

        let mut record = Self::default();
        record.name_nonce.copy_from_slice(&buf[..12]);
        record.name_tag.copy_from_slice(&buf[12..28]);
        record.name_ct.copy_from_slice(&buf[28..128]);
        record.data_salt.copy_from_slice(&buf[128..160]);
        record.data_tag.copy_from_slice(&buf[160..176]);
        record.data_ct.copy_from_slice(&buf[176..776]);

        Ok(record)
    }

    fn to_bytes(&self) -> [u8; ITEM_FILE_SIZE] {
        let mut buf = [0u8; ITEM_FILE_SIZE];
        buf[..12].copy_from_slice(&self.name_nonce);
        buf[12..28].copy_from_slice(&self.name_tag);
        buf[28..128].copy_from_slice(&self.name_ct);
        buf[128..160].copy_from_slice(&self.data_salt);
        buf[160..176].copy_from_slice(&self.data_tag);
        buf[176..776].copy_from_slice(&self.data_ct);
        buf
    }

    /// Writes a brand-new item file. Fails if the file exists; creation is
    /// the only transition from absent to live.
    pub fn write_new(&self, path: &Path) -> Result<()> {
        let mut file = fileio::create_exclusive(path).context("Internal error")?;
        fileio::write_all_sync(&mut file, &self.to_bytes()).context("Internal error")
    }

    /// Replaces an existing item file through the temp-then-rename commit.
    pub fn write_replace(&self, paths: &StorePaths, target: &Path) -> Result<()> {
        let mut file = fileio::create_truncate(paths.temp()).context("Internal error")?;
        fileio::write_all_sync(&mut file, &self.to_bytes()).context("Internal error")?;
        drop(file);

        fileio::commit_rename(paths.temp(), target).context("Internal error")
    }
}

/// The three fields stored in an item.
#[derive(Debug)]
pub struct ItemFields {
    pub username: SecretBuf,
    pub password: SecretBuf,
    pub other_info: SecretBuf,
}

/// Checks an item name: printable, 1 to 100 bytes.
pub fn is_item_name_valid(name: &str) -> bool {
    !name.is_empty() && name.len() <= MAX_ITEM_NAME_LEN && is_printable(name.as_bytes())
}

/// Derives the on-disk filename for an item.
///
/// Deterministic in (master, fileSalt, itemName) and independent of every
/// other item in the store.
pub fn derive_item_file_name(master: &[u8], file_salt: &[u8; SALT_SIZE], item_name: &str) -> Result<String> {
    let label = format!("{item_name}{FILE_NAME_LABEL}");
    derive_name(master, file_salt, &label)
}

/// Derives a fresh data-encryption key.
pub fn data_key(master: &[u8], salt: &[u8; SALT_SIZE]) -> Result<SecretBuf> {
    let mut key = SecretBuf::zeroed(KEY_SIZE)?;
    derive_key(master, salt, DATA_KEY_LABEL, &mut key)?;
    Ok(key)
}

/// Derives the store-wide item-name encryption key.
pub fn name_key(master: &[u8], name_salt: &[u8; SALT_SIZE]) -> Result<SecretBuf> {
    let mut key = SecretBuf::zeroed(KEY_SIZE)?;
    derive_key(master, name_salt, NAME_KEY_LABEL, &mut key)?;
    Ok(key)
}

/// Encrypts the three fields into a data block.
///
/// The plaintext is `username\npassword\notherInfo`, zero-padded to the
/// fixed block size before encryption under the fixed nonce.
pub fn seal_fields(key: &SecretBuf, fields: &ItemFields) -> Result<([u8; TAG_SIZE], [u8; ITEM_DATA_SIZE])> {
    ensure!(fields.username.len() <= MAX_USERNAME_LEN, "Internal error: username too long");
    ensure!(fields.password.len() <= MAX_PASSWORD_LEN, "Internal error: password too long");
    ensure!(fields.other_info.len() <= MAX_OTHER_INFO_LEN, "Internal error: other info too long");

    let mut plaintext = SecretBuf::with_capacity(ITEM_DATA_SIZE)?;
    plaintext.extend_from_slice(&fields.username)?;
    plaintext.push(b'\n')?;
    plaintext.extend_from_slice(&fields.password)?;
    plaintext.push(b'\n')?;
    plaintext.extend_from_slice(&fields.other_info)?;

    // Pad out to the fixed block size; the padding is unambiguous because
    // the content never contains zero bytes.
    while plaintext.len() < ITEM_DATA_SIZE {
        plaintext.push(0)?;
    }

    let tag = encrypt(key_bytes(key)?, &FIXED_NONCE, &mut plaintext)?;

    let ct: [u8; ITEM_DATA_SIZE] = plaintext.as_bytes().try_into().context("Internal error: bad data block size")?;

    Ok((tag, ct))
}

/// Decrypts and splits an item's data block.
pub fn open_fields(key: &SecretBuf, record: &ItemRecord) -> Result<ItemFields> {
    let mut plaintext = SecretBuf::from_slice(&record.data_ct)?;
    ensure!(
        decrypt(key_bytes(key)?, &FIXED_NONCE, &mut plaintext, &record.data_tag),
        "Data corrupted: item data cannot be read"
    );

    let content_len = plaintext.iter().position(|&b| b == 0).context("Data corrupted: unterminated item data")?;

    let mut tokens = plaintext[..content_len].split(|&b| b == b'\n');
    let username = next_token(&mut tokens, MAX_USERNAME_LEN)?;
    let password = next_token(&mut tokens, MAX_PASSWORD_LEN)?;
    let other_info = next_token(&mut tokens, MAX_OTHER_INFO_LEN)?;
    ensure!(tokens.next().is_none(), "Data corrupted: unexpected number of tokens");

    Ok(ItemFields { username, password, other_info })
}

fn next_token<'a>(tokens: &mut impl Iterator<Item = &'a [u8]>, max_len: usize) -> Result<SecretBuf> {
    let token = tokens.next().context("Data corrupted: unexpected number of tokens")?;
    ensure!(token.len() <= max_len, "Data corrupted: token is too long");
    ensure!(is_printable(token), "Data corrupted: invalid token");

    SecretBuf::from_slice(token)
}

/// Encrypts an item name into a name block under the given nonce.
pub fn seal_name(key: &SecretBuf, nonce: &[u8; NONCE_SIZE], item_name: &str) -> Result<([u8; TAG_SIZE], [u8; MAX_ITEM_NAME_LEN])> {
    ensure!(is_item_name_valid(item_name), "Item name is invalid.");

    let mut plaintext = SecretBuf::zeroed(MAX_ITEM_NAME_LEN)?;
    plaintext[..item_name.len()].copy_from_slice(item_name.as_bytes());

    let tag = encrypt(key_bytes(key)?, nonce, &mut plaintext)?;

    let ct: [u8; MAX_ITEM_NAME_LEN] = plaintext.as_bytes().try_into().context("Internal error: bad name block size")?;

    Ok((tag, ct))
}

/// Decrypts an item's name block back to the item name.
pub fn open_name(key: &SecretBuf, record: &ItemRecord) -> Result<String> {
    let mut plaintext = SecretBuf::from_slice(&record.name_ct)?;
    ensure!(
        decrypt(key_bytes(key)?, &record.name_nonce, &mut plaintext, &record.name_tag),
        "Data corrupted: item name cannot be read"
    );

    let len = plaintext.iter().position(|&b| b == 0).unwrap_or(MAX_ITEM_NAME_LEN);
    let name = &plaintext[..len];
    ensure!(!name.is_empty() && is_printable(name), "Data corrupted: invalid item name");

    Ok(String::from_utf8_lossy(name).into_owned())
}

/// Recovers the names of all items in the store, sorted.
///
/// The sort hides the filesystem's iteration order, which would otherwise
/// leak information about the mapping between names and files.
pub fn list_names(paths: &StorePaths, name_key: &SecretBuf) -> Result<Vec<String>> {
    let mut names = Vec::with_capacity(MAX_NUM_ITEMS);

    for entry in fs::read_dir(paths.root()).context("Data corrupted: could not read storage directory")? {
        let entry = entry.context("Data corrupted: could not read storage directory")?;
        let file_name = entry.file_name();

        if file_name == SYSTEM_FILE_NAME || file_name == TEMP_FILE_NAME {
            continue;
        }

        let record = ItemRecord::read(&entry.path())?;
        names.push(open_name(name_key, &record)?);
    }

    names.sort_unstable();

    debug!(count = names.len(), "listed items");

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::fill_random;
    use tempfile::tempdir;

    const MASTER: &[u8] = b"correct horse";

    fn fields(username: &str, password: &str, other: &str) -> ItemFields {
        ItemFields {
            username: SecretBuf::from_slice(username.as_bytes()).unwrap(),
            password: SecretBuf::from_slice(password.as_bytes()).unwrap(),
            other_info: SecretBuf::from_slice(other.as_bytes()).unwrap(),
        }
    }

    fn sealed_record(name: &str, data: &ItemFields, name_salt: &[u8; SALT_SIZE]) -> ItemRecord {
        let mut record = ItemRecord::default();
        fill_random(&mut record.data_salt).unwrap();
        fill_random(&mut record.name_nonce).unwrap();

        let key = data_key(MASTER, &record.data_salt).unwrap();
        (record.data_tag, record.data_ct) = seal_fields(&key, data).unwrap();

        let nkey = name_key(MASTER, name_salt).unwrap();
        let nonce = record.name_nonce;
        (record.name_tag, record.name_ct) = seal_name(&nkey, &nonce, name).unwrap();

        record
    }

    #[test]
    fn test_fields_round_trip() {
        let data = fields("alice@example.com", "P@ssw0rd!xyz12345", "primary account");
        let name_salt = [9u8; SALT_SIZE];
        let record = sealed_record("GitHub", &data, &name_salt);

        let key = data_key(MASTER, &record.data_salt).unwrap();
        let opened = open_fields(&key, &record).unwrap();
        assert_eq!(opened.username.as_bytes(), b"alice@example.com");
        assert_eq!(opened.password.as_bytes(), b"P@ssw0rd!xyz12345");
        assert_eq!(opened.other_info.as_bytes(), b"primary account");
    }

    #[test]
    fn test_empty_other_info_round_trips() {
        let data = fields("bob", "longenough", "");
        let name_salt = [9u8; SALT_SIZE];
        let record = sealed_record("Site", &data, &name_salt);

        let key = data_key(MASTER, &record.data_salt).unwrap();
        let opened = open_fields(&key, &record).unwrap();
        assert!(opened.other_info.is_empty());
    }

    #[test]
    fn test_tampered_data_is_corrupt() {
        let data = fields("alice", "longenough", "notes");
        let name_salt = [9u8; SALT_SIZE];
        let mut record = sealed_record("GitHub", &data, &name_salt);
        record.data_ct[100] ^= 0x01;

        let key = data_key(MASTER, &record.data_salt).unwrap();
        let err = open_fields(&key, &record).unwrap_err();
        assert!(format!("{err:#}").contains("Data corrupted"));
    }

    #[test]
    fn test_name_round_trip() {
        let name_salt = [9u8; SALT_SIZE];
        let data = fields("alice", "longenough", "");
        let record = sealed_record("My Bank Login", &data, &name_salt);

        let nkey = name_key(MASTER, &name_salt).unwrap();
        assert_eq!(open_name(&nkey, &record).unwrap(), "My Bank Login");
    }

    #[test]
    fn test_record_file_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("item");

        let name_salt = [9u8; SALT_SIZE];
        let data = fields("alice", "longenough", "notes");
        let record = sealed_record("GitHub", &data, &name_salt);
        record.write_new(&path).unwrap();

        assert_eq!(std::fs::metadata(&path).unwrap().len(), 776);
        assert!(record.write_new(&path).is_err());

        let loaded = ItemRecord::read(&path).unwrap();
        assert_eq!(loaded.data_ct, record.data_ct);
        assert_eq!(loaded.name_nonce, record.name_nonce);
    }

    #[test]
    fn test_file_name_is_deterministic_and_name_bound() {
        let file_salt = [3u8; SALT_SIZE];

        let a = derive_item_file_name(MASTER, &file_salt, "GitHub").unwrap();
        let b = derive_item_file_name(MASTER, &file_salt, "GitHub").unwrap();
        let c = derive_item_file_name(MASTER, &file_salt, "GitLab").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn test_list_names_sorted() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("store");
        std::fs::create_dir(&root).unwrap();
        let paths = StorePaths::at(root);

        // A system file that must be skipped.
        std::fs::write(paths.system(), [0u8; 116]).unwrap();

        let name_salt = [9u8; SALT_SIZE];
        let file_salt = [3u8; SALT_SIZE];
        for name in ["zebra", "Apple", "mango"] {
            let data = fields("user", "longenough", "");
            let record = sealed_record(name, &data, &name_salt);
            let file_name = derive_item_file_name(MASTER, &file_salt, name).unwrap();
            record.write_new(&paths.item(&file_name)).unwrap();
        }

        let nkey = name_key(MASTER, &name_salt).unwrap();
        let names = list_names(&paths, &nkey).unwrap();
        assert_eq!(names, ["Apple", "mango", "zebra"]);
    }

    #[test]
    fn test_update_replaces_data_and_keeps_name_block() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("store");
        std::fs::create_dir(&root).unwrap();
        let paths = StorePaths::at(root);
        let path = paths.item("item");

        let name_salt = [9u8; SALT_SIZE];
        let data = fields("alice", "old password!", "notes");
        let record = sealed_record("GitHub", &data, &name_salt);
        record.write_new(&path).unwrap();

        // Rewrite with a fresh salt and a new password, as update does.
        let mut updated = ItemRecord::read(&path).unwrap();
        fill_random(&mut updated.data_salt).unwrap();
        let key = data_key(MASTER, &updated.data_salt).unwrap();
        let new_data = fields("alice", "new password!", "notes");
        (updated.data_tag, updated.data_ct) = seal_fields(&key, &new_data).unwrap();
        updated.write_replace(&paths, &path).unwrap();

        let reloaded = ItemRecord::read(&path).unwrap();
        assert_eq!(reloaded.name_ct, record.name_ct);
        assert_eq!(reloaded.name_nonce, record.name_nonce);

        let key = data_key(MASTER, &reloaded.data_salt).unwrap();
        let opened = open_fields(&key, &reloaded).unwrap();
        assert_eq!(opened.password.as_bytes(), b"new password!");
        assert_eq!(opened.username.as_bytes(), b"alice");

        let nkey = name_key(MASTER, &name_salt).unwrap();
        assert_eq!(open_name(&nkey, &reloaded).unwrap(), "GitHub");
        assert!(!fileio::exists(paths.temp()).unwrap());
    }

    #[test]
    fn test_item_name_validity() {
        assert!(is_item_name_valid("GitHub"));
        assert!(is_item_name_valid(&"x".repeat(100)));
        assert!(!is_item_name_valid(""));
        assert!(!is_item_name_valid(&"x".repeat(101)));
        assert!(!is_item_name_valid("line\nbreak"));
    }
}
