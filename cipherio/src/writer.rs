use std::{
    cmp::max,
    io::{Result as IoResult, Write},
};

use log::{debug, trace};

use crate::{
    cipher::Cipher,
    err::{partial, Error, Res},
    DEFAULT_BUFFER_SIZE,
};

/// Encrypts bytes as they are written, passing the ciphertext on to the underlying writer.
///
/// A `CipherWriter` has to be closed with [`CipherWriter::close`] (or
/// [`CipherWriter::into_inner`]) to complete the last block; dropping it
/// discards the key but does not finish the stream.
pub struct CipherWriter<W> {
    dst: W,
    cipher: Box<dyn Cipher>,
    buf: Vec<u8>,
    closed: bool,
}

impl<W: Write> CipherWriter<W> {
    /// Wrap `dst` with an encrypting cipher and a working buffer of
    /// [`DEFAULT_BUFFER_SIZE`] bytes.
    pub fn new(dst: W, cipher: Box<dyn Cipher>) -> Self {
        Self::with_buffer_size(dst, cipher, DEFAULT_BUFFER_SIZE)
    }

    /// Wrap `dst` using a working buffer of `size` bytes.
    /// The buffer is never smaller than one cipher block.
    pub fn with_buffer_size(dst: W, cipher: Box<dyn Cipher>, size: usize) -> Self {
        let block_size = cipher.block_size();
        if size < block_size {
            debug!("CipherWriter buffer raised from {size} to {block_size} bytes");
        }
        let size = max(size, block_size);
        Self {
            dst,
            cipher,
            buf: vec![0; size],
            closed: false,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.dst
    }

    /// Writing directly to the underlying writer will corrupt the ciphertext stream.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.dst
    }

    /// Finish encrypting any pending input, write it out and flush the underlying writer.
    /// The cipher is released whether or not this succeeds.
    ///
    /// Closing an already closed writer does nothing.
    pub fn close(&mut self) -> Res<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let res = self.finish();
        self.cipher.close();
        debug!("CipherWriter closed: {:?}", res.as_ref().map(|()| "ok"));
        res
    }

    fn finish(&mut self) -> Res<()> {
        let encrypted = self.cipher.finish(&mut self.buf);
        if encrypted > 0 {
            self.dst.write_all(&self.buf[..encrypted])?;
        }
        self.dst.flush()?;
        Ok(())
    }

    /// Close the writer and recover the underlying writer.
    pub fn into_inner(mut self) -> Res<W> {
        self.close()?;
        Ok(self.dst)
    }
}

impl<W: Write> Write for CipherWriter<W> {
    /// Encrypt all of `input` and write the result to the underlying writer.
    ///
    /// If the underlying writer fails, the error is returned straight away.
    /// Any ciphertext that had not been written by then is lost,
    /// so the stream cannot be continued;
    /// [`crate::processed`] reports how much of `input` the cipher took.
    fn write(&mut self, input: &[u8]) -> IoResult<usize> {
        if self.closed {
            return Err(Error::WriteAfterClose.into());
        }

        let mut total = 0;
        while total < input.len() {
            let (consumed, produced) = self.cipher.update(&input[total..], &mut self.buf);
            assert!(
                consumed > 0 || produced > 0,
                "cipher made no progress with a full block of room"
            );
            total += consumed;
            trace!("CipherWriter: consumed {consumed}, produced {produced}");
            if let Err(e) = self.dst.write_all(&self.buf[..produced]) {
                return Err(partial(total, e));
            }
        }
        Ok(total)
    }

    /// Flush the underlying writer.
    /// Input short of a whole block stays inside the cipher until more arrives or
    /// the writer is closed.
    fn flush(&mut self) -> IoResult<()> {
        self.dst.flush()
    }
}

#[cfg(test)]
mod test {
    use std::io::{ErrorKind, Write};

    use sync_io::{Dribble, FailAfter, Unadapt};

    use crate::{
        cipher::{toy, Mode},
        processed,
        test::init,
        CipherWriter, Error,
    };

    const BS: usize = 16;

    fn plaintext(len: usize) -> Vec<u8> {
        #[allow(clippy::cast_possible_truncation)]
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    fn encrypt_whole(pt: &[u8]) -> Vec<u8> {
        let mut c = toy::block(BS, Mode::Encrypt);
        let mut out = vec![0; pt.len()];
        assert_eq!(c.update(pt, &mut out), (pt.len(), pt.len()));
        out
    }

    #[test]
    fn matches_direct_update() {
        init();
        let pt = plaintext(BS * 64);
        let expected = encrypt_whole(&pt);
        for (buffer, chunk) in [(BS, 1), (BS, 17), (BS + 1, 100), (100, BS), (1 << 14, 333)] {
            let mut w =
                CipherWriter::with_buffer_size(Vec::new(), toy::block(BS, Mode::Encrypt), buffer);
            for piece in pt.chunks(chunk) {
                assert_eq!(w.write(piece).unwrap(), piece.len());
            }
            assert_eq!(w.into_inner().unwrap(), expected, "buffer {buffer}, chunk {chunk}");
        }
    }

    #[test]
    fn buffer_at_least_one_block() {
        init();
        let pt = plaintext(BS * 3);
        let mut w = CipherWriter::with_buffer_size(Vec::new(), toy::block(BS, Mode::Encrypt), 1);
        w.write_all(&pt).unwrap();
        assert_eq!(w.into_inner().unwrap(), encrypt_whole(&pt));
    }

    #[test]
    fn partial_block_waits_for_more() {
        init();
        let mut w = CipherWriter::new(Vec::new(), toy::block(BS, Mode::Encrypt));
        w.write_all(&[1; BS - 1]).unwrap();
        w.flush().unwrap();
        assert!(w.get_ref().is_empty());
        w.write_all(&[1; 1]).unwrap();
        assert_eq!(w.get_ref().len(), BS);
    }

    #[test]
    fn dribbling_sink() {
        init();
        let pt = plaintext(BS * 4);
        let mut w = CipherWriter::new(Dribble::new(Vec::new()), toy::block(BS, Mode::Encrypt));
        w.write_all(&pt).unwrap();
        assert_eq!(w.into_inner().unwrap().unadapt(), encrypt_whole(&pt));
    }

    #[test]
    fn stream_cipher_writes_everything() {
        init();
        let mut w = CipherWriter::with_buffer_size(Vec::new(), toy::stream(), 3);
        w.write_all(b"stream of bytes").unwrap();
        assert_eq!(w.get_ref().len(), 15);
        w.close().unwrap();
    }

    #[test]
    fn sink_failure_reports_progress() {
        init();
        let sink = FailAfter::new(Vec::new(), BS * 2);
        let mut w = CipherWriter::with_buffer_size(sink, toy::block(BS, Mode::Encrypt), BS);
        let e = w.write(&plaintext(BS * 4)).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::BrokenPipe);
        // The third block was consumed by the cipher but never written.
        assert_eq!(processed(&e), BS * 3);
    }

    #[test]
    fn sink_failure_before_progress() {
        init();
        let sink = FailAfter::new(Vec::new(), 0);
        let mut w = CipherWriter::with_buffer_size(sink, toy::block(BS, Mode::Encrypt), BS);
        // Nothing is written downstream until a block is complete.
        assert_eq!(w.write(&[0; 3]).unwrap(), 3);
        // The three held back bytes complete the first block with the first 13 of these.
        let e = w.write(&[0; BS]).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::BrokenPipe);
        assert_eq!(processed(&e), BS - 3);
    }

    #[test]
    fn write_after_close() {
        init();
        let mut w = CipherWriter::new(Vec::new(), toy::stream());
        w.close().unwrap();
        w.close().unwrap();
        let e = w.write(b"late").unwrap_err();
        assert!(matches!(
            e.get_ref().and_then(|e| e.downcast_ref::<Error>()),
            Some(Error::WriteAfterClose)
        ));
    }

    #[test]
    #[should_panic(expected = "not a multiple")]
    fn unaligned_close() {
        let mut w = CipherWriter::new(Vec::new(), toy::block(BS, Mode::Encrypt));
        w.write_all(&[0; BS + 1]).unwrap();
        let _ = w.close();
    }
}
