use std::{
    cmp::{max, min},
    io::{Error as IoError, Read, Result as IoResult},
    ops::Range,
};

use log::{debug, trace};
use zeroize::Zeroize;

use crate::{
    blocks::round_down,
    cipher::Cipher,
    err::{Error, Res},
    DEFAULT_BUFFER_SIZE,
};

/// Read up to `scratch.len()` bytes of ciphertext from `src` and decrypt them into `out`.
/// `out` has to have room for everything the cipher could produce.
/// Returns `None` at the end of the source.
fn decrypt_from(
    src: &mut impl Read,
    cipher: &mut dyn Cipher,
    scratch: &mut [u8],
    out: &mut [u8],
) -> IoResult<Option<usize>> {
    let n = src.read(scratch)?;
    if n == 0 {
        return Ok(None);
    }
    let (consumed, produced) = cipher.update(&scratch[..n], out);
    assert_eq!(consumed, n, "cipher left ciphertext unconsumed");
    trace!("CipherReader: read {n}, produced {produced}");
    Ok(Some(produced))
}

/// Decrypts bytes read from an underlying reader.
///
/// The reader takes no more ciphertext than it needs for each request:
/// a read of `n` bytes consumes at most enough whole blocks to cover `n`.
/// When a request ends part way through a block, the rest of that block is kept
/// and handed out by the next read.
///
/// Call [`CipherReader::close`] once the source is exhausted to find out whether
/// the ciphertext ended on a block boundary.
pub struct CipherReader<R> {
    src: R,
    cipher: Box<dyn Cipher>,
    buf: Vec<u8>,
    /// Holds the last decrypted block when a read wanted less than a block.
    block: Vec<u8>,
    pending: Range<usize>,
    /// An error from the source that arrived after some plaintext was delivered.
    error: Option<IoError>,
    closed: bool,
}

impl<R: Read> CipherReader<R> {
    pub fn new(src: R, cipher: Box<dyn Cipher>) -> Self {
        Self::with_buffer_size(src, cipher, DEFAULT_BUFFER_SIZE)
    }

    /// Use a working buffer of `size` bytes, which bounds how much ciphertext
    /// is requested from the source at once.
    /// The buffer is never smaller than one cipher block.
    pub fn with_buffer_size(src: R, cipher: Box<dyn Cipher>, size: usize) -> Self {
        let block_size = cipher.block_size();
        if size < block_size {
            debug!("CipherReader buffer raised from {size} to {block_size} bytes");
        }
        let size = max(size, block_size);
        Self {
            src,
            cipher,
            buf: vec![0; size],
            block: vec![0; block_size],
            pending: 0..0,
            error: None,
            closed: false,
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.src
    }

    /// Reading directly from the underlying reader will desynchronize the cipher.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.src
    }

    /// Check that the ciphertext ended cleanly and release the cipher.
    /// The cipher is released even when this fails.
    ///
    /// Closing an already closed reader does nothing.
    ///
    /// # Errors
    /// [`Error::Truncated`] when the ciphertext stopped part way through a block.
    pub fn close(&mut self) -> Res<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let remainder = self.cipher.buffered_size();
        let truncated = remainder != 0 || self.cipher.finish(&mut self.buf) != 0;
        self.cipher.close();
        self.block.zeroize();
        self.pending = 0..0;
        if truncated {
            debug!("CipherReader closed with {remainder} bytes of an unfinished block");
            Err(Error::Truncated)
        } else {
            Ok(())
        }
    }

    /// Close the reader and recover the underlying reader.
    pub fn into_inner(mut self) -> Res<R> {
        self.close()?;
        Ok(self.src)
    }

    /// Copy out plaintext left over from a partially delivered block.
    fn take_pending(&mut self, dest: &mut [u8]) -> usize {
        let n = min(self.pending.len(), dest.len());
        let start = self.pending.start;
        dest[..n].copy_from_slice(&self.block[start..start + n]);
        self.pending.start += n;
        n
    }

    /// Decrypt one block into the holding area and deliver the start of it.
    fn read_tail(&mut self, dest: &mut [u8]) -> IoResult<Option<usize>> {
        let want = self.cipher.block_size() - self.cipher.buffered_size();
        let produced = decrypt_from(
            &mut self.src,
            &mut *self.cipher,
            &mut self.buf[..want],
            &mut self.block,
        )?;
        Ok(produced.map(|produced| {
            self.pending = 0..produced;
            self.take_pending(dest)
        }))
    }
}

impl<R: Read> Read for CipherReader<R> {
    /// Fill `dest` with plaintext, stopping short only at the end of the source.
    ///
    /// An error from the source is returned at once if nothing was produced yet.
    /// Otherwise the plaintext is returned and the error is reported by the next call.
    fn read(&mut self, dest: &mut [u8]) -> IoResult<usize> {
        if self.closed {
            return Err(Error::ReadAfterClose.into());
        }
        if let Some(e) = self.error.take() {
            return Err(e);
        }

        let block_size = self.cipher.block_size();
        let limit = self.buf.len();
        let mut written = self.take_pending(dest);
        while written < dest.len() {
            let to_write = dest.len() - written;
            let res = if to_write >= block_size {
                let buffered = self.cipher.buffered_size();
                let want = if to_write >= limit + buffered {
                    limit
                } else {
                    min(limit, round_down(to_write, block_size) - buffered)
                };
                decrypt_from(
                    &mut self.src,
                    &mut *self.cipher,
                    &mut self.buf[..want],
                    &mut dest[written..],
                )
            } else {
                self.read_tail(&mut dest[written..])
            };

            match res {
                Ok(Some(n)) => written += n,
                Ok(None) => break,
                Err(e) if written == 0 => return Err(e),
                Err(e) => {
                    debug!("CipherReader: holding error until the next read: {e}");
                    self.error = Some(e);
                    break;
                }
            }
        }
        Ok(written)
    }
}

#[cfg(test)]
mod test {
    use std::io::{ErrorKind, Read, Write};

    use sync_io::{Dribble, Pipe, Recorder, SplitAt, Unadapt};

    use crate::{
        cipher::{toy, Mode},
        test::init,
        CipherReader, CipherWriter, Error,
    };

    const BS: usize = 16;

    fn plaintext(len: usize) -> Vec<u8> {
        #[allow(clippy::cast_possible_truncation)]
        (0..len).map(|i| (i % 253) as u8).collect()
    }

    fn encrypt(pt: &[u8]) -> Vec<u8> {
        let mut w = CipherWriter::new(Vec::new(), toy::block(BS, Mode::Encrypt));
        w.write_all(pt).unwrap();
        w.into_inner().unwrap()
    }

    fn decrypter<R: Read>(src: R) -> CipherReader<R> {
        CipherReader::new(src, toy::block(BS, Mode::Decrypt))
    }

    /// Read everything using reads of `chunk` bytes.
    fn read_chunked<R: Read>(r: &mut CipherReader<R>, chunk: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = vec![0; chunk];
        loop {
            let n = r.read(&mut buf).unwrap();
            if n == 0 {
                return out;
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    #[test]
    fn odd_sized_reads() {
        init();
        let pt = plaintext(BS * 100);
        let ct = encrypt(&pt);
        for chunk in [1, 7, 17, BS, BS * 3 + 5, 1000, ct.len() + 1] {
            let mut r = decrypter(&ct[..]);
            assert_eq!(read_chunked(&mut r, chunk), pt, "chunk {chunk}");
            r.close().unwrap();
        }
    }

    #[test]
    fn small_working_buffer() {
        init();
        let pt = plaintext(BS * 20);
        let ct = encrypt(&pt);
        for size in [1, BS, BS + 3, 50] {
            let mut r =
                CipherReader::with_buffer_size(&ct[..], toy::block(BS, Mode::Decrypt), size);
            assert_eq!(read_chunked(&mut r, 77), pt, "buffer {size}");
            r.into_inner().unwrap();
        }
    }

    #[test]
    fn one_byte_reads_one_block() {
        init();
        let ct = encrypt(&plaintext(BS * 10));
        let mut r = decrypter(Recorder::new(&ct[..]));
        let mut buf = [0; 1];
        assert_eq!(r.read(&mut buf).unwrap(), 1);
        assert_eq!(r.get_ref().total(), BS);

        // The rest of the block is held back for the next reads.
        let mut buf = [0; BS - 1];
        r.read_exact(&mut buf).unwrap();
        assert_eq!(r.get_ref().total(), BS);
        assert_eq!(&buf[..], &plaintext(BS)[1..]);
    }

    #[test]
    fn minimal_read_ahead() {
        init();
        let ct = encrypt(&plaintext(BS * 10));
        let mut r = decrypter(Recorder::new(&ct[..]));
        let mut buf = [0; BS + 1];
        r.read_exact(&mut buf).unwrap();
        // One whole block straight into the output, then one more for the last byte.
        assert_eq!(r.get_ref().requests(), &[(BS, BS), (BS, BS)]);
        r.get_mut().clear();

        let mut buf = [0; BS * 3 + 2];
        r.read_exact(&mut buf).unwrap();
        // BS - 1 bytes came from the held back block.
        assert_eq!(r.get_ref().total(), BS * 3);
        assert_eq!(&buf[..], &plaintext(BS * 5)[BS + 1..BS * 4 + 3]);
    }

    #[test]
    fn dribbling_source() {
        init();
        let pt = plaintext(BS * 7);
        let ct = encrypt(&pt);
        let mut r = decrypter(Dribble::new(&ct[..]));
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        assert_eq!(out, pt);
        r.close().unwrap();
    }

    #[test]
    fn dribbling_source_with_odd_reads() {
        init();
        let pt = plaintext(BS * 5);
        let ct = encrypt(&pt);
        let mut r = decrypter(Dribble::new(&ct[..]));
        let mut out = Vec::new();
        let mut buf = [0; 5];
        loop {
            let n = r.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, pt);
    }

    #[test]
    fn truncated() {
        init();
        for k in 1..4 {
            let ct = encrypt(&plaintext(BS * k));
            let mut r = decrypter(&ct[..ct.len() - 1]);
            let out = read_chunked(&mut r, 100);
            assert_eq!(out.len(), BS * (k - 1));
            assert!(matches!(r.close(), Err(Error::Truncated)));
            // The check only applies once.
            r.close().unwrap();
        }
    }

    #[test]
    fn empty_source() {
        init();
        let mut r = decrypter(&[][..]);
        assert_eq!(r.read(&mut [0; 10]).unwrap(), 0);
        assert_eq!(r.read(&mut [0; 1]).unwrap(), 0);
        r.close().unwrap();
    }

    #[test]
    fn error_after_progress() {
        init();
        let pt = plaintext(BS * 4);
        let ct = encrypt(&pt);
        let mut r = decrypter(SplitAt::new(&ct[..], BS * 2 + 8));
        let mut out = vec![0; pt.len()];
        // The source stops after two and a half blocks.
        assert_eq!(r.read(&mut out).unwrap(), BS * 2);
        assert_eq!(r.read(&mut out[BS * 2..]).unwrap_err().kind(), ErrorKind::Interrupted);
        assert_eq!(r.read(&mut out[BS * 2..]).unwrap(), BS * 2);
        assert_eq!(out, pt);
        assert_eq!(r.into_inner().unwrap().unadapt().len(), 0);
    }

    #[test]
    fn read_exact_through_interruption() {
        init();
        let pt = plaintext(BS * 6);
        let ct = encrypt(&pt);
        for split in [0, 1, BS - 1, BS, BS * 3 + 7] {
            let mut r = decrypter(SplitAt::new(&ct[..], split));
            let mut out = vec![0; pt.len()];
            r.read_exact(&mut out).unwrap();
            assert_eq!(out, pt, "split {split}");
        }
    }

    #[test]
    fn interleaved_with_writer() {
        init();
        let (pr, pw) = Pipe::new();
        let mut w = CipherWriter::new(pw, toy::block(BS, Mode::Encrypt));
        let mut r = decrypter(pr);
        let pt = plaintext(BS * 3);

        w.write_all(&pt[..BS * 2 + 5]).unwrap();
        let mut out = vec![0; 40];
        // Only whole blocks have reached the pipe.
        assert_eq!(r.read(&mut out).unwrap(), BS * 2);
        assert_eq!(&out[..BS * 2], &pt[..BS * 2]);

        w.write_all(&pt[BS * 2 + 5..]).unwrap();
        w.close().unwrap();
        assert_eq!(r.get_ref().available(), BS);
        assert_eq!(r.read(&mut out).unwrap(), BS);
        assert_eq!(&out[..BS], &pt[BS * 2..]);
        assert_eq!(r.read(&mut out).unwrap(), 0);
        r.close().unwrap();
    }

    #[test]
    fn stream_cipher() {
        init();
        let pt = plaintext(99);
        let mut w = CipherWriter::new(Vec::new(), toy::stream());
        w.write_all(&pt).unwrap();
        let ct = w.into_inner().unwrap();
        assert_eq!(ct.len(), pt.len());

        let mut r = CipherReader::new(Recorder::new(&ct[..]), toy::stream());
        let mut buf = [0; 10];
        r.read_exact(&mut buf).unwrap();
        assert_eq!(r.get_ref().total(), 10);
        let mut rest = Vec::new();
        r.read_to_end(&mut rest).unwrap();
        assert_eq!([&buf[..], &rest[..]].concat(), pt);
        r.close().unwrap();
    }

    #[test]
    fn read_after_close() {
        init();
        let ct = encrypt(&plaintext(BS));
        let mut r = decrypter(&ct[..]);
        r.close().unwrap();
        let e = r.read(&mut [0; 4]).unwrap_err();
        assert!(matches!(
            e.get_ref().and_then(|e| e.downcast_ref::<Error>()),
            Some(Error::ReadAfterClose)
        ));
    }
}
