use std::io::{Error as IoError, Read, Result as IoResult};

use rand::{rngs::OsRng, RngCore};

use crate::{
    err::Error,
    random::Random,
    registry::{RandomId, RegistryBuilder},
};

/// Random bytes from the operating system.
#[derive(Default)]
struct OsRandom {
    closed: bool,
}

impl OsRandom {
    fn boxed() -> Box<dyn Random> {
        Box::<Self>::default()
    }
}

impl Read for OsRandom {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        if self.closed {
            return Err(Error::ReadAfterClose.into());
        }
        OsRng.try_fill_bytes(buf).map_err(IoError::other)?;
        Ok(buf.len())
    }
}

impl Random for OsRandom {
    fn close(&mut self) {
        self.closed = true;
    }
}

pub(super) fn register(builder: RegistryBuilder) -> RegistryBuilder {
    builder.random(RandomId::Default, OsRandom::boxed)
}
