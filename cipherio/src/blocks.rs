//! Byte accounting shared by the stream adapters.

/// Round `n` up to the next multiple of `block_size`.
#[must_use]
pub fn round_up(n: usize, block_size: usize) -> usize {
    n.div_ceil(block_size) * block_size
}

/// Round `n` down to a multiple of `block_size`.
#[must_use]
pub fn round_down(n: usize, block_size: usize) -> usize {
    n / block_size * block_size
}
