//! OS randomness.

use anyhow::{Result, anyhow};
use rand::rand_core::TryRng;
use rand::rngs::SysRng;

/// Fills `buf` with cryptographically strong random bytes.
///
/// Sourced from the operating system's non-blocking generator. There is no
/// retry: the calls are rare and interactive, so a generator that cannot
/// deliver immediately is treated as an internal error by the caller.
pub fn fill_random(buf: &mut [u8]) -> Result<()> {
    SysRng.try_fill_bytes(buf).map_err(|e| anyhow!("Internal error: rng failed: {e}"))
}
