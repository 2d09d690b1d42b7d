//! Algorithms provided by the RustCrypto crates.

mod cipher;
mod hash;
mod random;

use crate::registry::RegistryBuilder;

pub(crate) fn register(builder: RegistryBuilder) -> RegistryBuilder {
    random::register(hash::register(cipher::register(builder)))
}
