//! Small shared helpers.

/// Checks that every byte is a printable ASCII character (space included).
///
/// Item names, usernames, passwords and notes are all restricted to
/// printable ASCII, both on input and when decrypted back from disk.
#[inline]
pub fn is_printable(bytes: &[u8]) -> bool {
    bytes.iter().all(|&b| b == b' ' || b.is_ascii_graphic())
}
