//! Interactive vault operations.
//!
//! One function per verb, each owning the full conversation: master
//! password entry with backoff, field prompts, confirmations, and the
//! calls into the vault core. Prompt wording follows the original tool.

use std::io::Write;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use tracing::debug;
use zeroize::Zeroize;

use crate::config::{
    BACKOFF_INITIAL_SECS, BACKOFF_MAX_SECS, MAX_OTHER_INFO_LEN, MAX_PASSWORD_LEN, MAX_USERNAME_LEN, MIN_PASSWORD_LEN, NONCE_SIZE,
    SALT_SIZE,
};
use crate::crypto::fill_random;
use crate::fileio;
use crate::mem::ct_eq;
use crate::password::{self, GeneratorConfig};
use crate::secret::SecretBuf;
use crate::ui;
use crate::vault::{self, ItemFields, ItemRecord, StorePaths, SystemRecord};

/// Everything the master-password check hands back.
struct Unlocked {
    master: SecretBuf,
    record: SystemRecord,
    cfg: GeneratorConfig,
}

fn ensure_initialized(paths: &StorePaths) -> Result<()> {
    ensure!(vault::is_initialized(paths)?, "The system has not been initialized.");
    Ok(())
}

/// Next master-password retry delay: doubled, capped.
fn next_backoff(secs: u64) -> u64 {
    (secs * 2).min(BACKOFF_MAX_SECS)
}

/// Prompts for the master password until it verifies against the store.
///
/// Every wrong answer costs a doubling sleep, so interactive guessing gets
/// slow fast while the legitimate user is never locked out.
fn check_master(paths: &StorePaths) -> Result<Unlocked> {
    let record = SystemRecord::read(paths)?;
    let mut master = SecretBuf::with_capacity(MAX_PASSWORD_LEN)?;
    let mut backoff = BACKOFF_INITIAL_SECS;

    println!("Please enter your master password:");

    loop {
        ui::read_password(&mut master)?;

        print!("Thinking...");
        std::io::stdout().flush().ok();

        if let Some(cfg) = record.try_unlock(&master)? {
            debug!("master password verified");
            return Ok(Unlocked { master, record, cfg });
        }

        for _ in 0..backoff {
            print!(".");
            std::io::stdout().flush().ok();
            thread::sleep(Duration::from_secs(1));
        }
        backoff = next_backoff(backoff);

        println!("\nMaster password is incorrect.");
        println!("Try again:");
    }
}

fn get_new_username() -> Result<SecretBuf> {
    println!("Please enter the username for this item:");

    let mut buf = SecretBuf::with_capacity(MAX_USERNAME_LEN)?;
    ui::read_line_secret(&mut buf)?;
    ensure!(crate::util::is_printable(&buf), "Username is invalid.");

    Ok(buf)
}

fn get_new_password(cfg: &GeneratorConfig) -> Result<SecretBuf> {
    println!("Would you like to generate the password [Y/n]?");
    if ui::get_yes_no(true)? {
        return password::generate(cfg);
    }

    println!("OK, please enter the password you want to use:");
    let mut buf = SecretBuf::with_capacity(MAX_PASSWORD_LEN)?;
    ui::read_password(&mut buf)?;

    Ok(buf)
}

fn get_new_other_info() -> Result<SecretBuf> {
    println!("Enter other info:");

    let mut buf = SecretBuf::with_capacity(MAX_OTHER_INFO_LEN)?;
    ui::read_line_secret(&mut buf)?;
    ensure!(crate::util::is_printable(&buf), "Info contains invalid characters.");

    Ok(buf)
}

/// Shows an item, revealing the password only on request.
fn show_summary(item_name: &str, fields: &ItemFields) -> Result<()> {
    println!("Do you want to see the password [y/N]?");
    let show_password = ui::get_yes_no(false)?;

    println!("OK, here is what we have.\n");
    println!("Item: '{item_name}'");
    println!("Username: '{}'", fields.username.as_str()?);

    if show_password {
        println!("Password: '{}'", fields.password.as_str()?);
    } else {
        println!("Password: *****");
    }

    println!("Other info: '{}'\n", fields.other_info.as_str()?);

    Ok(())
}

/// Derives an item's path from its name.
fn item_path(paths: &StorePaths, master: &SecretBuf, record: &SystemRecord, item_name: &str) -> Result<std::path::PathBuf> {
    let file_name = vault::derive_item_file_name(master, &record.file_salt, item_name)?;
    println!("OK");

    Ok(paths.item(&file_name))
}

/// `init`: create the store.
pub fn run_init(paths: &StorePaths) -> Result<()> {
    ensure!(!vault::is_initialized(paths)?, "The system has already been initialized.");

    println!(
        "Create your master password.  This should be something very difficult to guess but\n\
         memorable for you.  If you forget your master password you will lose access to all of\n\
         your stored items.\n\
         Please enter your master password:"
    );
    let mut master = SecretBuf::with_capacity(MAX_PASSWORD_LEN)?;
    ui::read_password(&mut master)?;

    println!("Confirm master password:");
    let mut confirm = SecretBuf::with_capacity(MAX_PASSWORD_LEN)?;
    ui::read_password(&mut confirm)?;

    ensure!(ct_eq(&master, &confirm), "Passwords do not match.");
    drop(confirm);

    vault::init_store(paths, &mut master, &GeneratorConfig::default())?;

    println!("OK all set.");

    Ok(())
}

/// `destroy`: remove the whole store.
pub fn run_destroy(paths: &StorePaths) -> Result<()> {
    ensure_initialized(paths)?;

    println!("Do you really want to delete all your data [y/N]?");
    if !ui::get_yes_no(false)? {
        return Ok(());
    }

    println!("Are you sure? You will lose access to all your data [y/N]?");
    if !ui::get_yes_no(false)? {
        return Ok(());
    }

    // Deleting everything still requires the master password.
    drop(check_master(paths)?);

    fileio::remove_tree(paths.root()).context("Error deleting data.")?;

    println!("OK, everything is gone.");

    Ok(())
}

/// `list`: print every item name, sorted.
pub fn run_list(paths: &StorePaths) -> Result<()> {
    ensure_initialized(paths)?;

    let unlocked = check_master(paths)?;
    let name_key = vault::name_key(&unlocked.master, &unlocked.record.name_salt)?;
    drop(unlocked.master);

    println!("OK");

    let mut names = vault::list_names(paths, &name_key)?;
    for name in &mut names {
        println!("{name}");
        name.zeroize();
    }

    Ok(())
}

/// `config`: show and update the password-generator settings.
pub fn run_config(paths: &StorePaths) -> Result<()> {
    ensure_initialized(paths)?;

    let Unlocked { mut master, record, cfg } = check_master(paths)?;
    println!("OK");

    println!("Password generation uses:");
    println!("  Numbers: {}", if cfg.use_nums { "yes" } else { "no" });
    println!("  Letters: {}", if cfg.use_letters { "yes" } else { "no" });
    println!("  Special characters: {}", if cfg.use_specials { "yes" } else { "no" });
    println!("  Length: {}", cfg.length);

    println!("Use numbers when generating passwords [Y/n]?");
    let use_nums = ui::get_yes_no(true)?;

    println!("Use letters when generating passwords [Y/n]?");
    let use_letters = ui::get_yes_no(true)?;

    println!("Use special characters when generating passwords [Y/n]?");
    let use_specials = ui::get_yes_no(true)?;

    println!("Set generated password length [{MIN_PASSWORD_LEN}-{MAX_PASSWORD_LEN}]");
    let length = u8::try_from(ui::get_unsigned(MIN_PASSWORD_LEN, MAX_PASSWORD_LEN)?).context("Internal error: bad length")?;

    let new_cfg = GeneratorConfig { use_nums, use_letters, use_specials, length };
    vault::rewrite_config(paths, &mut master, &record, &new_cfg)?;

    println!("Done.");

    Ok(())
}

/// `create <name>`: add a new item.
pub fn run_create(paths: &StorePaths, item_name: &str) -> Result<()> {
    ensure!(vault::is_item_name_valid(item_name), "Item name is invalid.");
    ensure_initialized(paths)?;

    let Unlocked { mut master, record, cfg } = check_master(paths)?;

    let path = item_path(paths, &master, &record, item_name)?;
    ensure!(!fileio::exists(&path)?, "Item already exists.");

    // The master secret is wiped before any field prompt.
    let mut data_salt = [0u8; SALT_SIZE];
    fill_random(&mut data_salt)?;
    let data_key = vault::data_key(&master, &data_salt)?;
    let name_key = vault::name_key(&master, &record.name_salt)?;
    master.clear();

    let fields = ItemFields { username: get_new_username()?, password: get_new_password(&cfg)?, other_info: get_new_other_info()? };

    let (data_tag, data_ct) = vault::seal_fields(&data_key, &fields)?;

    let mut name_nonce = [0u8; NONCE_SIZE];
    fill_random(&mut name_nonce)?;
    let (name_tag, name_ct) = vault::seal_name(&name_key, &name_nonce, item_name)?;

    show_summary(item_name, &fields)?;

    println!("Do you want to save the item [Y/n]?");
    if ui::get_yes_no(true)? {
        let item = ItemRecord { name_nonce, name_tag, name_ct, data_salt, data_tag, data_ct };
        item.write_new(&path)?;

        println!("Saved.");
    }

    Ok(())
}

/// `get <name>`: show an item.
pub fn run_get(paths: &StorePaths, item_name: &str) -> Result<()> {
    ensure!(vault::is_item_name_valid(item_name), "Item name is invalid.");
    ensure_initialized(paths)?;

    let Unlocked { mut master, record, cfg: _ } = check_master(paths)?;

    let path = item_path(paths, &master, &record, item_name)?;
    ensure!(fileio::exists(&path)?, "Item doesn't exist.");

    let item = ItemRecord::read(&path)?;
    let data_key = vault::data_key(&master, &item.data_salt)?;
    master.clear();

    let fields = vault::open_fields(&data_key, &item)?;

    show_summary(item_name, &fields)
}

/// `update <name>`: edit an item's fields in place.
pub fn run_update(paths: &StorePaths, item_name: &str) -> Result<()> {
    ensure!(vault::is_item_name_valid(item_name), "Item name is invalid.");
    ensure_initialized(paths)?;

    let Unlocked { mut master, record, cfg } = check_master(paths)?;

    let path = item_path(paths, &master, &record, item_name)?;
    ensure!(fileio::exists(&path)?, "Item doesn't exist.");

    let item = ItemRecord::read(&path)?;
    let old_key = vault::data_key(&master, &item.data_salt)?;
    let mut fields = vault::open_fields(&old_key, &item)?;
    drop(old_key);

    // The rewrite gets a fresh salt and key.
    let mut data_salt = [0u8; SALT_SIZE];
    fill_random(&mut data_salt)?;
    let data_key = vault::data_key(&master, &data_salt)?;
    master.clear();

    let mut has_changes = false;
    loop {
        println!("What do you want to update [(u)sername, (p)assword, (o)ther info, (d)one]?");
        let answer = ui::read_line(10)?;

        match answer.as_str() {
            "username" | "Username" | "u" | "U" => {
                fields.username = get_new_username()?;
                has_changes = true;
            }
            "password" | "Password" | "p" | "P" => {
                fields.password = get_new_password(&cfg)?;
                has_changes = true;
            }
            "other info" | "Other info" | "o" | "O" => {
                fields.other_info = get_new_other_info()?;
                has_changes = true;
            }
            "done" | "Done" | "d" | "D" => break,
            _ => println!("I don't understand."),
        }
    }

    if !has_changes {
        println!("No changes.");
        return Ok(());
    }

    let (data_tag, data_ct) = vault::seal_fields(&data_key, &fields)?;

    show_summary(item_name, &fields)?;

    // The name has not changed, so its block is carried over verbatim.
    let original = ItemRecord::read(&path)?;

    println!("Do you want to save the updates [Y/n]?");
    if !ui::get_yes_no(true)? {
        println!("Discarding changes.");
        return Ok(());
    }

    let updated = ItemRecord {
        name_nonce: original.name_nonce,
        name_tag: original.name_tag,
        name_ct: original.name_ct,
        data_salt,
        data_tag,
        data_ct,
    };
    updated.write_replace(paths, &path)?;

    println!("Updates saved.");

    Ok(())
}

/// `delete <name>`: remove an item.
pub fn run_delete(paths: &StorePaths, item_name: &str) -> Result<()> {
    ensure!(vault::is_item_name_valid(item_name), "Item name is invalid.");
    ensure_initialized(paths)?;

    let Unlocked { master, record, cfg: _ } = check_master(paths)?;

    let path = item_path(paths, &master, &record, item_name)?;
    ensure!(fileio::exists(&path)?, "Item doesn't exist.");
    drop(master);

    println!("Are you sure you want to delete this item [y/N]?");
    if !ui::get_yes_no(false)? {
        return Ok(());
    }

    std::fs::remove_file(&path).context("Could not delete item.")?;

    println!("Item deleted.");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_to_cap() {
        let mut backoff = BACKOFF_INITIAL_SECS;
        let mut seen = Vec::new();
        for _ in 0..8 {
            seen.push(backoff);
            backoff = next_backoff(backoff);
        }
        assert_eq!(seen, [1, 2, 4, 8, 16, 32, 60, 60]);
    }
}
