//! Constant-time credential comparison.
//!
//! Equal-length inputs are always scanned to the end; the only early exit is
//! on a length mismatch, which leaks the expected length and nothing else.

/// Compare a presented credential against the expected one.
///
/// Inputs are opaque: no trimming, no case folding, no normalisation.
pub fn constant_time_eq(provided: &str, expected: &str) -> bool {
    xor_fold(provided.as_bytes(), expected.as_bytes(), |_| {})
}

/// XOR-accumulate every byte pair, reporting each visited index to `visit`.
///
/// Kept separate so the no-early-exit property can be asserted directly.
fn xor_fold(a: &[u8], b: &[u8], mut visit: impl FnMut(usize)) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut acc = 0u8;
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        visit(i);
        acc |= x ^ y;
    }

    // Keep the optimiser from turning the fold into an early-exit memcmp.
    std::hint::black_box(acc) == 0
}
