#![deny(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

mod blocks;
mod cipher;
mod err;
mod hash;
mod random;
#[cfg(feature = "rust-crypto")]
mod rc;
mod reader;
mod registry;
mod writer;

pub use blocks::{round_down, round_up};
pub use self::cipher::{BlockCipher, BlockTransform, Cipher, Keystream, Mode, StreamCipher};
pub use err::{processed, Error, Res};
pub use hash::Hash;
pub use random::Random;
pub use reader::CipherReader;
pub use registry::{
    CipherConstructor, CipherId, HashConstructor, HashId, RandomConstructor, RandomId, Registry,
    RegistryBuilder,
};
pub use writer::CipherWriter;

/// The size of the working buffer that readers and writers use unless told otherwise.
pub const DEFAULT_BUFFER_SIZE: usize = 16 * 1024;
