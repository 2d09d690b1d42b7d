use std::{
    cell::RefCell,
    cmp::min,
    io::{Error as IoError, ErrorKind, Read, Result as IoResult, Write},
    rc::Rc,
};

/// Recover the wrapped stream from an adapter.
pub trait Unadapt {
    type S;
    fn unadapt(self) -> Self::S;
}

/// An adapter for [`Read`] and [`Write`] that reads or writes a single byte at a time.
pub struct Dribble<S> {
    s: S,
}

impl<S> Dribble<S> {
    pub fn new(s: S) -> Self {
        Self { s }
    }
}

impl<S> Unadapt for Dribble<S> {
    type S = S;
    fn unadapt(self) -> Self::S {
        self.s
    }
}

impl<S: Read> Read for Dribble<S> {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        let cut = min(buf.len(), 1);
        self.s.read(&mut buf[..cut])
    }
}

impl<S: Write> Write for Dribble<S> {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        let cut = min(buf.len(), 1);
        self.s.write(&buf[..cut])
    }

    fn flush(&mut self) -> IoResult<()> {
        self.s.flush()
    }
}

/// An adapter for [`Read`] and [`Write`] that is interrupted at a chosen offset.
pub struct SplitAt<S> {
    s: S,
    remaining: Option<usize>,
}

impl<S> SplitAt<S> {
    /// Split the stream at the selected `offset`.
    /// Read or write calls stop short at the indicated offset,
    /// the next call fails once with [`ErrorKind::Interrupted`],
    /// after which all operations proceed normally.
    pub fn new(s: S, offset: usize) -> Self {
        Self {
            s,
            remaining: Some(offset),
        }
    }

    fn cut(&mut self, len: usize) -> IoResult<usize> {
        match self.remaining {
            Some(0) => {
                self.remaining = None;
                Err(IoError::new(ErrorKind::Interrupted, "split point reached"))
            }
            Some(remaining) => Ok(min(remaining, len)),
            None => Ok(len),
        }
    }

    fn advance(&mut self, count: usize) {
        if let Some(r) = self.remaining.as_mut() {
            *r -= count;
        }
    }
}

impl<S> Unadapt for SplitAt<S> {
    type S = S;
    fn unadapt(self) -> Self::S {
        self.s
    }
}

impl<S: Read> Read for SplitAt<S> {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        let cut = self.cut(buf.len())?;
        let count = self.s.read(&mut buf[..cut])?;
        self.advance(count);
        Ok(count)
    }
}

impl<S: Write> Write for SplitAt<S> {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        let cut = self.cut(buf.len())?;
        let count = self.s.write(&buf[..cut])?;
        self.advance(count);
        Ok(count)
    }

    fn flush(&mut self) -> IoResult<()> {
        self.s.flush()
    }
}

/// An adapter for [`Read`] that records the size of every request it receives
/// and how many bytes the wrapped reader returned for it.
pub struct Recorder<S> {
    s: S,
    requests: Vec<(usize, usize)>,
}

impl<S> Recorder<S> {
    pub fn new(s: S) -> Self {
        Self {
            s,
            requests: Vec::new(),
        }
    }

    /// Each entry is `(requested, returned)`.
    #[must_use]
    pub fn requests(&self) -> &[(usize, usize)] {
        &self.requests
    }

    /// Total number of bytes handed out so far.
    #[must_use]
    pub fn total(&self) -> usize {
        self.requests.iter().map(|(_, r)| r).sum()
    }

    pub fn clear(&mut self) {
        self.requests.clear();
    }
}

impl<S> Unadapt for Recorder<S> {
    type S = S;
    fn unadapt(self) -> Self::S {
        self.s
    }
}

impl<S: Read> Read for Recorder<S> {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        let count = self.s.read(buf)?;
        self.requests.push((buf.len(), count));
        Ok(count)
    }
}

/// A [`Write`] adapter that accepts `limit` bytes and then fails every write
/// with [`ErrorKind::BrokenPipe`].
pub struct FailAfter<S> {
    s: S,
    limit: usize,
}

impl<S> FailAfter<S> {
    pub fn new(s: S, limit: usize) -> Self {
        Self { s, limit }
    }
}

impl<S> Unadapt for FailAfter<S> {
    type S = S;
    fn unadapt(self) -> Self::S {
        self.s
    }
}

impl<S: Write> Write for FailAfter<S> {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        if self.limit == 0 && !buf.is_empty() {
            return Err(IoError::new(ErrorKind::BrokenPipe, "sink closed"));
        }
        let cut = min(self.limit, buf.len());
        let count = self.s.write(&buf[..cut])?;
        self.limit -= count;
        Ok(count)
    }

    fn flush(&mut self) -> IoResult<()> {
        self.s.flush()
    }
}

#[derive(Default)]
struct Shared {
    buf: Vec<u8>,
    r: usize,
}

/// A paired [`Read`]/[`Write`] implementation over a shared buffer.
///
/// This allows tests to create paired read and write objects,
/// where writes to one can be read by the other.
/// Reading everything that was written returns `Ok(0)`,
/// which looks like the end of the stream until more is written.
pub struct Pipe;

impl Pipe {
    #[must_use]
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (PipeReader, PipeWriter) {
        let shared = Rc::new(RefCell::new(Shared::default()));
        (PipeReader(Rc::clone(&shared)), PipeWriter(shared))
    }
}

pub struct PipeReader(Rc<RefCell<Shared>>);

impl PipeReader {
    /// How many written bytes have not been read yet.
    #[must_use]
    pub fn available(&self) -> usize {
        let shared = self.0.borrow();
        shared.buf.len() - shared.r
    }
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        let mut shared = self.0.borrow_mut();
        let start = shared.r;
        let amnt = min(buf.len(), shared.buf.len() - start);
        buf[..amnt].copy_from_slice(&shared.buf[start..start + amnt]);
        shared.r += amnt;
        Ok(amnt)
    }
}

pub struct PipeWriter(Rc<RefCell<Shared>>);

impl Write for PipeWriter {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        self.0.borrow_mut().buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}
