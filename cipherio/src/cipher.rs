use std::cmp::min;

use zeroize::Zeroize;

use crate::blocks::round_down;

/// The direction a cipher instance transforms data in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Encrypt,
    Decrypt,
}

/// A symmetric (secret key) cipher, used incrementally.
///
/// The same key encrypts and decrypts, so it must be kept secret.
/// This interface is deliberately minimal; [`crate::CipherWriter`] and
/// [`crate::CipherReader`] should be preferred wherever a stream is available.
pub trait Cipher: Send {
    /// Transform as much of `input` as fits into `output`.
    /// Returns `(consumed, produced)`.
    ///
    /// When `output` has room for less than one block this makes no progress and
    /// returns `(0, 0)`; the caller has to drain its output before trying again.
    /// Otherwise `produced` is a multiple of the block size, and anything consumed but
    /// not produced stays buffered, which is always less than a block.
    ///
    /// # Panics
    /// When called after [`Cipher::finish`].
    fn update(&mut self, input: &[u8], output: &mut [u8]) -> (usize, usize);

    /// Complete the last block and write out whatever remains buffered,
    /// returning the number of bytes written.
    /// No calls to [`Cipher::update`] are allowed afterwards.
    ///
    /// # Panics
    /// If the mode needs whole blocks of input (ECB, CBC) and the total input
    /// was not a multiple of the block size, or when called a second time.
    fn finish(&mut self, output: &mut [u8]) -> usize;

    /// The block size of the algorithm in bytes, 1 for stream ciphers and
    /// for block ciphers in a streaming mode (CTR, OFB, CFB).
    fn block_size(&self) -> usize;

    /// The size of the key in bytes.
    fn key_size(&self) -> usize;

    /// How much input has been accepted but not yet transformed.
    fn buffered_size(&self) -> usize;

    /// Discard key material and any buffered input.
    /// Safe to call more than once; dropping a cipher also does this.
    fn close(&mut self);
}

/// A block cipher and chaining mode, keyed for one direction,
/// that transforms whole blocks in place.
pub trait BlockTransform: Send {
    fn block_size(&self) -> usize;

    /// `blocks.len()` is always a multiple of `block_size()`.
    fn transform_blocks(&mut self, blocks: &mut [u8]);
}

/// A keyed stream transform that carries its state between calls,
/// so data may be passed through in pieces of any size.
pub trait Keystream: Send {
    fn apply(&mut self, data: &mut [u8]);
}

/// A [`Cipher`] over a [`BlockTransform`].
/// Partial blocks are held back until enough input arrives to complete them.
pub struct BlockCipher {
    transform: Option<Box<dyn BlockTransform>>,
    block_size: usize,
    key_size: usize,
    buffer: Vec<u8>,
    finished: bool,
}

impl BlockCipher {
    #[must_use]
    pub fn new(transform: Box<dyn BlockTransform>, key_size: usize) -> Self {
        let block_size = transform.block_size();
        assert!(block_size > 0, "block size must be positive");
        Self {
            transform: Some(transform),
            block_size,
            key_size,
            buffer: Vec::with_capacity(block_size),
            finished: false,
        }
    }

    fn transform(&mut self) -> &mut (dyn BlockTransform + 'static) {
        self.transform
            .as_deref_mut()
            .expect("cipher used after close")
    }
}

impl Cipher for BlockCipher {
    fn update(&mut self, input: &[u8], output: &mut [u8]) -> (usize, usize) {
        assert!(!self.finished, "update called after finish");
        let bs = self.block_size;
        if output.len() < bs {
            return (0, 0);
        }

        let buffered = self.buffer.len();
        let consumed = min(input.len(), output.len() - buffered);
        let produced = round_down(buffered + consumed, bs);
        if produced == 0 {
            self.buffer.extend_from_slice(&input[..consumed]);
        } else {
            let taken = produced - buffered;
            output[..buffered].copy_from_slice(&self.buffer);
            output[buffered..produced].copy_from_slice(&input[..taken]);
            self.transform().transform_blocks(&mut output[..produced]);
            self.buffer.zeroize();
            self.buffer.extend_from_slice(&input[taken..consumed]);
        }

        assert!(
            self.buffer.len() < bs,
            "unprocessed input exceeded the block size"
        );
        (consumed, produced)
    }

    /// Never produces output: the remainder is always empty when this returns.
    fn finish(&mut self, _output: &mut [u8]) -> usize {
        assert!(!self.finished, "finish called twice");
        self.finished = true;
        // The remainder is always shorter than a block, so it is aligned only when empty.
        assert!(
            self.buffer.is_empty(),
            "input is not a multiple of the cipher block size"
        );
        0
    }

    fn block_size(&self) -> usize {
        self.block_size
    }

    fn key_size(&self) -> usize {
        self.key_size
    }

    fn buffered_size(&self) -> usize {
        self.buffer.len()
    }

    fn close(&mut self) {
        self.transform = None;
        self.buffer.zeroize();
    }
}

impl Drop for BlockCipher {
    fn drop(&mut self) {
        self.close();
    }
}

/// A [`Cipher`] over a [`Keystream`]: every byte consumed is produced immediately.
pub struct StreamCipher {
    keystream: Option<Box<dyn Keystream>>,
    key_size: usize,
    finished: bool,
}

impl StreamCipher {
    #[must_use]
    pub fn new(keystream: Box<dyn Keystream>, key_size: usize) -> Self {
        Self {
            keystream: Some(keystream),
            key_size,
            finished: false,
        }
    }
}

impl Cipher for StreamCipher {
    fn update(&mut self, input: &[u8], output: &mut [u8]) -> (usize, usize) {
        assert!(!self.finished, "update called after finish");
        let n = min(input.len(), output.len());
        output[..n].copy_from_slice(&input[..n]);
        self.keystream
            .as_deref_mut()
            .expect("cipher used after close")
            .apply(&mut output[..n]);
        (n, n)
    }

    fn finish(&mut self, _output: &mut [u8]) -> usize {
        assert!(!self.finished, "finish called twice");
        self.finished = true;
        0
    }

    fn block_size(&self) -> usize {
        1
    }

    fn key_size(&self) -> usize {
        self.key_size
    }

    fn buffered_size(&self) -> usize {
        0
    }

    fn close(&mut self) {
        self.keystream = None;
    }
}

impl Drop for StreamCipher {
    fn drop(&mut self) {
        self.close();
    }
}
