//! Constant-time memory comparison.

use subtle::ConstantTimeEq;

/// Compares two byte slices in constant time.
///
/// The comparison visits every byte regardless of where the first difference
/// sits, so it is safe for secret material such as the master-password
/// confirmation. Slices of different lengths are never equal.
#[inline]
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.ct_eq(b).into()
}
