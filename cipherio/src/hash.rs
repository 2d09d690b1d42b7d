use std::io::Write;

/// A cryptographic hash that computes a fixed size digest from any amount of input.
///
/// Input is written in through [`Write`].
/// Taking the digest finalizes the hash: further writes fail with
/// [`crate::Error::Finalized`] until the hash is [reset](Hash::reset).
/// For an intermediate digest, or to continue along diverging inputs,
/// clone the hash with [`Hash::box_clone`] after the common prefix.
pub trait Hash: Write + Send {
    /// Finalize the computation and return the digest.
    /// Calling this again returns the same digest.
    fn digest(&mut self) -> Vec<u8>;

    /// The length of the digest in bytes.
    fn size(&self) -> usize;

    /// The block size of the underlying compression function in bytes.
    fn block_size(&self) -> usize;

    /// A copy in exactly the same state, finalized or not.
    fn box_clone(&self) -> Box<dyn Hash>;

    /// Return to the initial state, as though no input had been written.
    fn reset(&mut self);

    /// Discard any state. Safe to call more than once.
    fn close(&mut self);
}

impl Clone for Box<dyn Hash> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}
