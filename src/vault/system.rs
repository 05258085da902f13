//! The system file.
//!
//! One per store, 116 bytes, fixed layout:
//!
//! ```text
//! offset 0    32:  fileSalt   (item filename derivation)
//! offset 32   32:  nameSalt   (item-name encryption key)
//! offset 64   32:  cfgSalt    (config encryption key)
//! offset 96   16:  cfgTag
//! offset 112   4:  cfgCT      (encrypted generator config)
//! ```
//!
//! Decrypting `cfgCT` doubles as the master-password check: the key is
//! derived from the candidate password, so a bad password fails the tag.
//! `fileSalt` and `nameSalt` never change after `init`; rewriting the
//! config rolls only `cfgSalt` so the fresh key never re-uses the fixed
//! nonce.

use std::fs::DirBuilder;
use std::os::unix::fs::DirBuilderExt;

use anyhow::{Context, Result, ensure};
use tracing::debug;

use crate::config::{CONFIG_DATA_SIZE, DATA_KEY_LABEL, FIXED_NONCE, KEY_SIZE, SALT_SIZE, SYSTEM_FILE_SIZE, TAG_SIZE};
use crate::crypto::{decrypt, derive_key, encrypt, fill_random};
use crate::fileio;
use crate::password::GeneratorConfig;
use crate::secret::SecretBuf;

use super::paths::StorePaths;
use super::key_bytes;

/// In-memory form of the system file.
#[derive(Debug)]
pub struct SystemRecord {
    pub file_salt: [u8; SALT_SIZE],
    pub name_salt: [u8; SALT_SIZE],
    cfg_salt: [u8; SALT_SIZE],
    cfg_tag: [u8; TAG_SIZE],
    cfg_ct: [u8; CONFIG_DATA_SIZE],
}

impl SystemRecord {
    /// Reads and parses the system file.
    pub fn read(paths: &StorePaths) -> Result<Self> {
        let mut file = fileio::open_read(paths.system()).context("Data corrupted")?;
        let mut buf = [0u8; SYSTEM_FILE_SIZE];
        fileio::read_exact_buf(&mut file, &mut buf).context("Data corrupted")?;

        let mut record = Self {
            file_salt: [0; SALT_SIZE],
            name_salt: [0; SALT_SIZE],
            cfg_salt: [0; SALT_SIZE],
            cfg_tag: [0; TAG_SIZE],
            cfg_ct: [0; CONFIG_DATA_SIZE],
        };
        record.file_salt.copy_from_slice(&buf[..32]);
        record.name_salt.copy_from_slice(&buf[32..64]);
        record.cfg_salt.copy_from_slice(&buf[64..96]);
        record.cfg_tag.copy_from_slice(&buf[96..112]);
        record.cfg_ct.copy_from_slice(&buf[112..116]);

        Ok(record)
    }

    fn to_bytes(&self) -> [u8; SYSTEM_FILE_SIZE] {
        let mut buf = [0u8; SYSTEM_FILE_SIZE];
        buf[..32].copy_from_slice(&self.file_salt);
        buf[32..64].copy_from_slice(&self.name_salt);
        buf[64..96].copy_from_slice(&self.cfg_salt);
        buf[96..112].copy_from_slice(&self.cfg_tag);
        buf[112..116].copy_from_slice(&self.cfg_ct);
        buf
    }

    /// Checks a candidate master password.
    ///
    /// Returns the decrypted generator config on success and `None` when
    /// the password is wrong. Anything else (a config that decrypts but
    /// does not parse) is corruption.
    pub fn try_unlock(&self, candidate: &[u8]) -> Result<Option<GeneratorConfig>> {
        let mut key = SecretBuf::zeroed(KEY_SIZE)?;
        derive_key(candidate, &self.cfg_salt, DATA_KEY_LABEL, &mut key)?;

        let mut plaintext = SecretBuf::from_slice(&self.cfg_ct)?;
        if !decrypt(key_bytes(&key)?, &FIXED_NONCE, &mut plaintext, &self.cfg_tag) {
            return Ok(None);
        }

        let data: &[u8; CONFIG_DATA_SIZE] = plaintext.as_bytes().try_into().context("Internal error: bad config size")?;

        GeneratorConfig::deserialize(data).map(Some)
    }
}

/// Encrypts the generator config under a key derived from `master` and
/// `cfg_salt`. Wipes the master secret once the key is derived.
fn seal_config(master: &mut SecretBuf, cfg_salt: &[u8; SALT_SIZE], cfg: &GeneratorConfig) -> Result<([u8; TAG_SIZE], [u8; CONFIG_DATA_SIZE])> {
    let mut key = SecretBuf::zeroed(KEY_SIZE)?;
    derive_key(master, cfg_salt, DATA_KEY_LABEL, &mut key)?;
    master.clear();

    let mut plaintext = SecretBuf::from_slice(&cfg.serialize())?;
    let tag = encrypt(key_bytes(&key)?, &FIXED_NONCE, &mut plaintext)?;

    let ct: [u8; CONFIG_DATA_SIZE] = plaintext.as_bytes().try_into().context("Internal error: bad config size")?;

    Ok((tag, ct))
}

/// Whether the store has been initialized.
pub fn is_initialized(paths: &StorePaths) -> Result<bool> {
    fileio::exists(paths.system())
}

/// Creates the store: directory, salts, and the system file.
///
/// The master secret buffer is wiped as soon as the config key has been
/// derived from it.
pub fn init_store(paths: &StorePaths, master: &mut SecretBuf, cfg: &GeneratorConfig) -> Result<()> {
    ensure!(!is_initialized(paths)?, "The system has already been initialized.");

    let mut record = SystemRecord {
        file_salt: [0; SALT_SIZE],
        name_salt: [0; SALT_SIZE],
        cfg_salt: [0; SALT_SIZE],
        cfg_tag: [0; TAG_SIZE],
        cfg_ct: [0; CONFIG_DATA_SIZE],
    };
    fill_random(&mut record.file_salt)?;
    fill_random(&mut record.name_salt)?;
    fill_random(&mut record.cfg_salt)?;

    let (tag, ct) = seal_config(master, &record.cfg_salt, cfg)?;
    record.cfg_tag = tag;
    record.cfg_ct = ct;

    DirBuilder::new()
        .mode(0o700)
        .create(paths.root())
        .with_context(|| format!("Internal error: could not create {}", paths.root().display()))?;

    let mut file = fileio::create_exclusive(paths.system()).context("Internal error")?;
    fileio::write_all_sync(&mut file, &record.to_bytes()).context("Internal error")?;

    debug!("store initialized");

    Ok(())
}

/// Rewrites the system file with a new generator config.
///
/// A fresh `cfgSalt` gives a fresh config key; `fileSalt` and `nameSalt`
/// are carried over unchanged so existing item filenames stay valid. The
/// new record is committed by renaming the temp file over the target.
pub fn rewrite_config(paths: &StorePaths, master: &mut SecretBuf, record: &SystemRecord, cfg: &GeneratorConfig) -> Result<()> {
    let mut updated = SystemRecord {
        file_salt: record.file_salt,
        name_salt: record.name_salt,
        cfg_salt: [0; SALT_SIZE],
        cfg_tag: [0; TAG_SIZE],
        cfg_ct: [0; CONFIG_DATA_SIZE],
    };
    fill_random(&mut updated.cfg_salt)?;

    let (tag, ct) = seal_config(master, &updated.cfg_salt, cfg)?;
    updated.cfg_tag = tag;
    updated.cfg_ct = ct;

    let mut file = fileio::create_truncate(paths.temp()).context("Internal error")?;
    fileio::write_all_sync(&mut file, &updated.to_bytes()).context("Internal error")?;
    drop(file);

    fileio::commit_rename(paths.temp(), paths.system()).context("Internal error")?;

    debug!("system file rewritten");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn test_store() -> (tempfile::TempDir, StorePaths) {
        let dir = tempdir().unwrap();
        let paths = StorePaths::at(dir.path().join("store"));
        (dir, paths)
    }

    fn master() -> SecretBuf {
        SecretBuf::from_slice(b"correct horse").unwrap()
    }

    #[test]
    fn test_init_writes_fixed_size_file() {
        let (_dir, paths) = test_store();
        init_store(&paths, &mut master(), &GeneratorConfig::default()).unwrap();

        assert!(is_initialized(&paths).unwrap());
        assert_eq!(fs::metadata(paths.system()).unwrap().len(), 116);
    }

    #[test]
    fn test_init_refuses_existing_store() {
        let (_dir, paths) = test_store();
        init_store(&paths, &mut master(), &GeneratorConfig::default()).unwrap();

        let err = init_store(&paths, &mut master(), &GeneratorConfig::default()).unwrap_err();
        assert!(err.to_string().contains("already been initialized"));
    }

    #[test]
    fn test_init_wipes_master() {
        let (_dir, paths) = test_store();
        let mut m = master();
        init_store(&paths, &mut m, &GeneratorConfig::default()).unwrap();
        assert!(m.is_empty());
    }

    #[test]
    fn test_unlock_right_and_wrong_password() {
        let (_dir, paths) = test_store();
        let cfg = GeneratorConfig { use_nums: true, use_letters: true, use_specials: false, length: 30 };
        init_store(&paths, &mut master(), &cfg).unwrap();

        let record = SystemRecord::read(&paths).unwrap();
        let unlocked = record.try_unlock(b"correct horse").unwrap();
        assert_eq!(unlocked, Some(cfg));

        assert_eq!(record.try_unlock(b"battery staple").unwrap(), None);
    }

    #[test]
    fn test_rewrite_preserves_store_salts() {
        let (_dir, paths) = test_store();
        init_store(&paths, &mut master(), &GeneratorConfig::default()).unwrap();
        let record = SystemRecord::read(&paths).unwrap();

        let new_cfg = GeneratorConfig { use_nums: false, use_letters: true, use_specials: true, length: 16 };
        rewrite_config(&paths, &mut master(), &record, &new_cfg).unwrap();

        let updated = SystemRecord::read(&paths).unwrap();
        assert_eq!(updated.file_salt, record.file_salt);
        assert_eq!(updated.name_salt, record.name_salt);
        assert_eq!(updated.try_unlock(b"correct horse").unwrap(), Some(new_cfg));
        assert_eq!(fs::metadata(paths.system()).unwrap().len(), 116);
        assert!(!fileio::exists(paths.temp()).unwrap());
    }

    #[test]
    fn test_corrupted_system_file_fails_parse() {
        let (_dir, paths) = test_store();
        init_store(&paths, &mut master(), &GeneratorConfig::default()).unwrap();

        // Truncate the file.
        let data = fs::read(paths.system()).unwrap();
        fs::write(paths.system(), &data[..100]).unwrap();

        let err = SystemRecord::read(&paths).unwrap_err();
        assert!(format!("{err:#}").contains("Data corrupted"));
    }
}
