//! Terminal prompts.
//!
//! All interaction runs over plain stdin/stdout. Secret entry lands
//! directly in a [`SecretBuf`] with terminal echo disabled; everything
//! else (menu answers, yes/no, numbers) uses ordinary strings.

use std::io::{self, Read};

use anyhow::{Context, Result, ensure};

use crate::password;
use crate::secret::SecretBuf;

/// Turns terminal echo on or off.
///
/// A no-op when stdin is not a terminal.
pub fn turn_echo_on(on: bool) -> Result<()> {
    unsafe {
        if libc::isatty(libc::STDIN_FILENO) == 0 {
            return Ok(());
        }

        let mut term: libc::termios = std::mem::zeroed();
        ensure!(libc::tcgetattr(libc::STDIN_FILENO, &mut term) == 0, "Internal error: could not get terminal attributes");

        if on {
            term.c_lflag |= libc::ECHO;
        } else {
            term.c_lflag &= !libc::ECHO;
        }

        ensure!(libc::tcsetattr(libc::STDIN_FILENO, libc::TCSAFLUSH, &term) == 0, "Internal error: could not set terminal attributes");
    }

    Ok(())
}

/// Reads one byte from stdin; `None` at end of input.
fn read_byte(stdin: &mut impl Read) -> Result<Option<u8>> {
    let mut byte = [0u8; 1];
    match stdin.read(&mut byte).context("Internal error: could not read standard input")? {
        0 => Ok(None),
        _ => Ok(Some(byte[0])),
    }
}

/// Discards input up to and including the next newline.
fn flush_line(stdin: &mut impl Read) -> Result<()> {
    while let Some(byte) = read_byte(stdin)? {
        if byte == b'\n' {
            break;
        }
    }

    Ok(())
}

/// Reads a line into a sensitive buffer.
///
/// At most `buf.capacity()` bytes are accepted. A longer line is flushed
/// and the user is asked to try again. The newline is not stored.
pub fn read_line_secret(buf: &mut SecretBuf) -> Result<()> {
    let mut stdin = io::stdin().lock();

    loop {
        buf.clear();

        loop {
            match read_byte(&mut stdin)? {
                None => {
                    ensure!(!buf.is_empty(), "Internal error: end of input");
                    return Ok(());
                }
                Some(b'\n') => return Ok(()),
                Some(byte) if buf.len() < buf.capacity() => buf.push(byte)?,
                Some(_) => break,
            }
        }

        println!("Entry is too long.  Try again:");
        flush_line(&mut stdin)?;
    }
}

/// Reads a line of at most `max` characters into a plain string.
pub fn read_line(max: usize) -> Result<String> {
    let mut stdin = io::stdin().lock();

    loop {
        let mut line = String::new();

        loop {
            match read_byte(&mut stdin)? {
                None => {
                    ensure!(!line.is_empty(), "Internal error: end of input");
                    return Ok(line);
                }
                Some(b'\n') => return Ok(line),
                Some(byte) if line.len() < max => line.push(char::from(byte)),
                Some(_) => break,
            }
        }

        println!("Entry is too long.  Try again:");
        flush_line(&mut stdin)?;
    }
}

/// Asks a yes/no question already printed by the caller.
///
/// An empty answer selects the default.
pub fn get_yes_no(default_yes: bool) -> Result<bool> {
    loop {
        let answer = read_line(3)?;

        match answer.as_str() {
            "" => return Ok(default_yes),
            "y" | "Y" | "yes" | "Yes" | "YES" => return Ok(true),
            "n" | "N" | "no" | "No" | "NO" => return Ok(false),
            _ => println!("I don't understand.  Please answer yes or no."),
        }
    }
}

/// Reads an unsigned integer within an inclusive range.
pub fn get_unsigned(min: usize, max: usize) -> Result<usize> {
    loop {
        let line = read_line(9)?;

        match line.parse::<usize>() {
            Ok(value) if (min..=max).contains(&value) => return Ok(value),
            Ok(_) => println!("Value must be between {min} and {max}."),
            Err(_) => println!("Please enter a number."),
        }
    }
}

/// Reads a password with echo disabled, re-prompting until it satisfies
/// the policy.
pub fn read_password(buf: &mut SecretBuf) -> Result<()> {
    turn_echo_on(false)?;

    let result = read_password_inner(buf);

    // Echo comes back on whether or not the read succeeded.
    turn_echo_on(true)?;
    result
}

fn read_password_inner(buf: &mut SecretBuf) -> Result<()> {
    loop {
        read_line_secret(buf)?;

        match password::validate(buf) {
            Ok(()) => return Ok(()),
            Err(e) => {
                println!("{e}");
                println!("Try again:");
            }
        }
    }
}
