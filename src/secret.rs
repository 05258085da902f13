//! Sensitive heap buffers with guaranteed zeroization.
//!
//! Every secret in the process (master password, derived keys, decrypted
//! item data) lives inside a [`SecretBuf`]. The buffer zeroizes itself on
//! drop, and it is additionally registered in a process-wide table so that
//! [`wipe_all`] can overwrite every live secret from the termination paths
//! (exit hook and signal handler) even when the normal drops never run.
//!
//! The table holds at most [`MAX_SENSITIVE_BUFS`] entries. The bound is a
//! leak detector, not a scaling concern: each vault operation owns a
//! handful of buffers and releases them before returning.
//!
//! ## Signal safety
//!
//! [`wipe_all`] only loads atomics and performs volatile byte writes; it
//! never allocates, frees, or takes a lock. Registration publishes the
//! buffer pointer while the buffer is still all zeros and the length
//! after, so a signal landing mid-register either wipes the slot or skips
//! a buffer that does not yet hold a secret. A signal landing mid-drop at
//! worst re-wipes memory that was just zeroized.

use std::ops::{Deref, DerefMut};
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use anyhow::{Result, bail, ensure};
use zeroize::Zeroize;

use crate::config::MAX_SENSITIVE_BUFS;

/// One registry entry: the buffer's address and size.
struct Slot {
    ptr: AtomicPtr<u8>,
    len: AtomicUsize,
}

#[allow(clippy::declare_interior_mutable_const)]
const EMPTY_SLOT: Slot = Slot { ptr: AtomicPtr::new(ptr::null_mut()), len: AtomicUsize::new(0) };

/// Process-wide table of live sensitive buffers.
static REGISTRY: [Slot; MAX_SENSITIVE_BUFS] = [EMPTY_SLOT; MAX_SENSITIVE_BUFS];

/// Overwrites every registered buffer with zeros, without freeing.
///
/// Called from the exit hook and the signal handler. Safe to call at any
/// point, any number of times; buffers still alive afterwards simply hold
/// zeros.
pub fn wipe_all() {
    for slot in &REGISTRY {
        let p = slot.ptr.load(Ordering::Acquire);
        if p.is_null() {
            continue;
        }

        let len = slot.len.load(Ordering::Acquire);
        for i in 0..len {
            // Volatile so the writes survive optimization.
            unsafe { ptr::write_volatile(p.add(i), 0) };
        }
    }
}

/// Claims a registry slot for the given buffer.
fn register(p: *mut u8, len: usize) -> Result<usize> {
    for (index, slot) in REGISTRY.iter().enumerate() {
        if slot.ptr.compare_exchange(ptr::null_mut(), p, Ordering::AcqRel, Ordering::Relaxed).is_ok() {
            slot.len.store(len, Ordering::Release);
            return Ok(index);
        }
    }

    bail!("Internal error: out of sensitive memory buffers")
}

/// Clears a registry slot once its buffer has been zeroized.
fn deregister(index: usize) {
    REGISTRY[index].ptr.store(ptr::null_mut(), Ordering::Release);
    REGISTRY[index].len.store(0, Ordering::Release);
}

/// A fixed-capacity heap buffer for secret bytes.
///
/// The capacity is chosen at construction and never changes, so the buffer
/// is never reallocated and no stale copy of its contents is left behind.
/// Dereferences to the initialized prefix (`len` bytes).
pub struct SecretBuf {
    buf: Box<[u8]>,
    len: usize,
    slot: usize,
}

impl SecretBuf {
    /// Creates a zero-filled buffer with `len == capacity == size`.
    ///
    /// Use this shape for fixed-size secrets (keys, record plaintext) that
    /// are written through the mutable slice.
    pub fn zeroed(size: usize) -> Result<Self> {
        let mut buf = Self::with_capacity(size)?;
        buf.len = size;
        Ok(buf)
    }

    /// Creates an empty buffer that can grow up to `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut buf = vec![0u8; capacity].into_boxed_slice();
        let slot = register(buf.as_mut_ptr(), capacity)?;

        Ok(Self { buf, len: 0, slot })
    }

    /// Creates a buffer holding a copy of `data`, filled to capacity.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let mut buf = Self::zeroed(data.len())?;
        buf.copy_from_slice(data);
        Ok(buf)
    }

    /// Total capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Number of initialized bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends one byte; fails if the buffer is full.
    pub fn push(&mut self, byte: u8) -> Result<()> {
        ensure!(self.len < self.buf.len(), "Internal error: sensitive buffer overflow");
        self.buf[self.len] = byte;
        self.len += 1;
        Ok(())
    }

    /// Appends a slice; fails if it does not fit.
    pub fn extend_from_slice(&mut self, data: &[u8]) -> Result<()> {
        ensure!(self.buf.len() - self.len >= data.len(), "Internal error: sensitive buffer overflow");
        self.buf[self.len..self.len + data.len()].copy_from_slice(data);
        self.len += data.len();
        Ok(())
    }

    /// Zeroizes the contents and resets the length to zero.
    pub fn clear(&mut self) {
        self.buf.zeroize();
        self.len = 0;
    }

    /// The initialized bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// The initialized bytes as UTF-8, for fields that are shown to the
    /// user.
    pub fn as_str(&self) -> Result<&str> {
        std::str::from_utf8(self.as_bytes()).map_err(|_| anyhow::anyhow!("Data corrupted: field is not valid text"))
    }
}

impl Deref for SecretBuf {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl DerefMut for SecretBuf {
    #[inline]
    fn deref_mut(&mut self) -> &mut [u8] {
        let len = self.len;
        &mut self.buf[..len]
    }
}

impl Drop for SecretBuf {
    fn drop(&mut self) {
        // Wipe before the slot is released so the signal path covers the
        // whole window in which the allocation may hold a secret.
        self.buf.zeroize();
        deregister(self.slot);
    }
}

impl std::fmt::Debug for SecretBuf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretBuf([REDACTED])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed_and_push() {
        let buf = SecretBuf::zeroed(8).unwrap();
        assert_eq!(buf.len(), 8);
        assert_eq!(buf.as_bytes(), &[0u8; 8]);

        let mut buf = SecretBuf::with_capacity(4).unwrap();
        assert!(buf.is_empty());
        buf.push(b'a').unwrap();
        buf.extend_from_slice(b"bcd").unwrap();
        assert_eq!(buf.as_bytes(), b"abcd");
        assert!(buf.push(b'e').is_err());
    }

    #[test]
    fn test_from_slice_round_trip() {
        let buf = SecretBuf::from_slice(b"hunter2!").unwrap();
        assert_eq!(buf.as_str().unwrap(), "hunter2!");
        assert_eq!(buf.capacity(), 8);
    }

    #[test]
    fn test_clear_wipes_contents() {
        let mut buf = SecretBuf::from_slice(b"secret").unwrap();
        buf.clear();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 6);
    }

    // wipe_all() zeroes every live buffer in the process, so its test
    // lives in its own integration-test binary (tests/wipe.rs) where it
    // cannot disturb concurrently running tests.
}
