//! Registry wipe behavior.
//!
//! `wipe_all` zeroes every live sensitive buffer in the process, which is
//! exactly what the termination paths rely on. It runs in its own test
//! binary so the process-wide wipe cannot race other tests.

use pwm::secret::{SecretBuf, wipe_all};

#[test]
fn wipe_all_zeroes_every_live_buffer() {
    let full = SecretBuf::from_slice(b"alpha secret").unwrap();

    let mut partial = SecretBuf::with_capacity(16).unwrap();
    partial.extend_from_slice(b"beta secret").unwrap();

    wipe_all();

    assert_eq!(full.as_bytes(), &[0u8; 12]);
    assert_eq!(partial.as_bytes(), &[0u8; 11]);

    // Idempotent: a second wipe (the exit hook after a signal wipe) is
    // harmless.
    wipe_all();
    assert_eq!(full.as_bytes(), &[0u8; 12]);

    // The registry keeps working after a wipe.
    let fresh = SecretBuf::from_slice(b"gamma").unwrap();
    assert_eq!(fresh.as_bytes(), b"gamma");
}
