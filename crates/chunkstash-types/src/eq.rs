use subtle::ConstantTimeEq;

/// Compare two byte buffers in data-independent time.
///
/// Buffers of different length are unequal without inspecting contents, so
/// the running time leaks only the length.
///
/// This is the single equality primitive used both for binary key parts and
/// for "did the content change" checks on captured artifacts.
pub fn timing_safe_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
