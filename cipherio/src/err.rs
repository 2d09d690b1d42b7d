use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// An IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// An IO error that interrupted a stream after some bytes were processed.
    #[error("IO error after {processed} bytes: {source}")]
    Partial {
        processed: usize,
        #[source]
        source: io::Error,
    },
    /// The decrypting stream ended part way through a cipher block.
    #[error("ciphertext stream ended with an unfinished cipher block")]
    Truncated,
    /// The key length is not supported by the algorithm.
    #[error("invalid key size {0}")]
    InvalidKeySize(usize),
    /// The initialization vector is missing or has the wrong length.
    #[error("invalid initialization vector size {0}")]
    InvalidIvSize(usize),
    /// No provider was registered for the requested algorithm.
    #[error("{0} is not available")]
    Unavailable(String),
    /// A write was attempted after the stream was closed.
    #[error("write after close")]
    WriteAfterClose,
    /// A read was attempted after the stream was closed.
    #[error("read after close")]
    ReadAfterClose,
    /// Input was written into a hash after its digest was taken.
    #[error("cannot write into a finalized hash")]
    Finalized,
}

pub type Res<T> = Result<T, Error>;

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            Error::Partial { ref source, .. } => {
                let kind = source.kind();
                Self::new(kind, e)
            }
            _ => Self::other(e),
        }
    }
}

/// Attach the count of bytes already processed to an IO error.
/// Errors that interrupt a stream before any progress pass through untouched.
pub(crate) fn partial(processed: usize, source: io::Error) -> io::Error {
    if processed == 0 {
        source
    } else {
        io::Error::from(Error::Partial { processed, source })
    }
}

/// How many bytes a stream adapter processed before failing with `e`.
/// This is zero for errors that happened before any progress was made.
#[must_use]
pub fn processed(e: &io::Error) -> usize {
    match e.get_ref().and_then(|inner| inner.downcast_ref::<Error>()) {
        Some(Error::Partial { processed, .. }) => *processed,
        _ => 0,
    }
}
