use std::io::{Result as IoResult, Write};

use digest::{core_api::BlockSizeUser, Digest};
use md5::Md5;
use ripemd::Ripemd160;
use sha1::Sha1;
use sha2::{Sha224, Sha256, Sha384, Sha512};

use crate::{
    err::Error,
    hash::Hash,
    registry::{HashId, RegistryBuilder},
};

/// A [`Hash`] over any RustCrypto digest.
/// The digest is computed from a copy of the state, so it can be retrieved again.
#[derive(Clone)]
struct DigestHash<D> {
    state: D,
    digest: Option<Vec<u8>>,
}

impl<D: Digest + BlockSizeUser + Clone + Send + 'static> DigestHash<D> {
    fn boxed() -> Box<dyn Hash> {
        Box::new(Self {
            state: D::new(),
            digest: None,
        })
    }
}

impl<D: Digest> Write for DigestHash<D> {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        if self.digest.is_some() {
            return Err(Error::Finalized.into());
        }
        self.state.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

impl<D: Digest + BlockSizeUser + Clone + Send + 'static> Hash for DigestHash<D> {
    fn digest(&mut self) -> Vec<u8> {
        let state = &self.state;
        self.digest
            .get_or_insert_with(|| state.clone().finalize().to_vec())
            .clone()
    }

    fn size(&self) -> usize {
        <D as Digest>::output_size()
    }

    fn block_size(&self) -> usize {
        <D as BlockSizeUser>::block_size()
    }

    fn box_clone(&self) -> Box<dyn Hash> {
        Box::new(self.clone())
    }

    fn reset(&mut self) {
        self.state = D::new();
        self.digest = None;
    }

    fn close(&mut self) {
        self.reset();
    }
}

pub(super) fn register(builder: RegistryBuilder) -> RegistryBuilder {
    builder
        .hash(HashId::Md5, DigestHash::<Md5>::boxed)
        .hash(HashId::Sha1, DigestHash::<Sha1>::boxed)
        .hash(HashId::Sha224, DigestHash::<Sha224>::boxed)
        .hash(HashId::Sha256, DigestHash::<Sha256>::boxed)
        .hash(HashId::Sha384, DigestHash::<Sha384>::boxed)
        .hash(HashId::Sha512, DigestHash::<Sha512>::boxed)
        .hash(HashId::Ripemd160, DigestHash::<Ripemd160>::boxed)
}
