use std::{
    collections::HashMap,
    fmt::{self, Display, Formatter},
    io::{Read, Write},
    str::FromStr,
};

use log::debug;

use crate::{
    cipher::{Cipher, Mode},
    err::{Error, Res},
    hash::Hash,
    random::Random,
    CipherReader, CipherWriter,
};

/// Creates a cipher from a key, an optional initialization vector and a direction.
pub type CipherConstructor = fn(key: &[u8], iv: Option<&[u8]>, mode: Mode) -> Res<Box<dyn Cipher>>;
pub type HashConstructor = fn() -> Box<dyn Hash>;
pub type RandomConstructor = fn() -> Box<dyn Random>;

macro_rules! algorithm_ids {
    ($(#[$meta:meta])* $id:ident { $($(#[$vmeta:meta])* $v:ident = $name:literal,)+ }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $id {
            $($(#[$vmeta])* $v,)+
        }

        impl $id {
            pub const ALL: &'static [Self] = &[$(Self::$v,)+];

            #[must_use]
            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$v => $name,)+
                }
            }
        }

        impl Display for $id {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }

        impl FromStr for $id {
            type Err = Error;

            fn from_str(s: &str) -> Res<Self> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|id| id.name().eq_ignore_ascii_case(s))
                    .ok_or_else(|| Error::Unavailable(s.to_owned()))
            }
        }
    };
}

algorithm_ids! {
    /// A cipher algorithm together with its mode of operation.
    CipherId {
        AesEcb = "aes-ecb",
        AesCbc = "aes-cbc",
        AesOfb = "aes-ofb",
        AesCfb = "aes-cfb",
        AesCtr = "aes-ctr",
        BfEcb = "bf-ecb",
        BfCbc = "bf-cbc",
        BfOfb = "bf-ofb",
        BfCfb = "bf-cfb",
        Des3Ecb = "des3-ecb",
        Des3Cbc = "des3-cbc",
        Des3Ofb = "des3-ofb",
        Des3Cfb = "des3-cfb",
        Rc4 = "rc4",
    }
}

algorithm_ids! {
    HashId {
        Md5 = "md5",
        Sha1 = "sha1",
        Sha224 = "sha224",
        Sha256 = "sha256",
        Sha384 = "sha384",
        Sha512 = "sha512",
        Ripemd160 = "ripemd160",
    }
}

algorithm_ids! {
    RandomId {
        /// Whatever generator the provider considers its default.
        Default = "default",
    }
}

/// Collects constructors for a [`Registry`].
/// Registering an identifier a second time replaces the earlier constructor.
#[derive(Clone, Default)]
pub struct RegistryBuilder {
    ciphers: HashMap<CipherId, CipherConstructor>,
    hashes: HashMap<HashId, HashConstructor>,
    randoms: HashMap<RandomId, RandomConstructor>,
}

impl RegistryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn cipher(mut self, id: CipherId, c: CipherConstructor) -> Self {
        if self.ciphers.insert(id, c).is_some() {
            debug!("Replacing cipher constructor for {id}");
        }
        self
    }

    #[must_use]
    pub fn hash(mut self, id: HashId, c: HashConstructor) -> Self {
        if self.hashes.insert(id, c).is_some() {
            debug!("Replacing hash constructor for {id}");
        }
        self
    }

    #[must_use]
    pub fn random(mut self, id: RandomId, c: RandomConstructor) -> Self {
        if self.randoms.insert(id, c).is_some() {
            debug!("Replacing random constructor for {id}");
        }
        self
    }

    #[must_use]
    pub fn build(self) -> Registry {
        debug!(
            "Registry with {} ciphers, {} hashes, {} random generators",
            self.ciphers.len(),
            self.hashes.len(),
            self.randoms.len()
        );
        Registry {
            ciphers: self.ciphers,
            hashes: self.hashes,
            randoms: self.randoms,
        }
    }
}

/// Maps algorithm identifiers to the constructors that implement them.
///
/// A registry is built once and not changed afterwards.
/// Share it by reference with whatever needs to resolve algorithms.
/// Asking for an algorithm that nothing registered fails with [`Error::Unavailable`].
pub struct Registry {
    ciphers: HashMap<CipherId, CipherConstructor>,
    hashes: HashMap<HashId, HashConstructor>,
    randoms: HashMap<RandomId, RandomConstructor>,
}

impl Registry {
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// A registry holding every algorithm the RustCrypto provider implements.
    #[cfg(feature = "rust-crypto")]
    #[must_use]
    pub fn rust_crypto() -> Self {
        crate::rc::register(RegistryBuilder::new()).build()
    }

    pub fn cipher(&self, id: CipherId) -> Res<CipherConstructor> {
        self.ciphers
            .get(&id)
            .copied()
            .ok_or_else(|| Error::Unavailable(id.to_string()))
    }

    pub fn hash(&self, id: HashId) -> Res<HashConstructor> {
        self.hashes
            .get(&id)
            .copied()
            .ok_or_else(|| Error::Unavailable(id.to_string()))
    }

    pub fn random(&self, id: RandomId) -> Res<RandomConstructor> {
        self.randoms
            .get(&id)
            .copied()
            .ok_or_else(|| Error::Unavailable(id.to_string()))
    }

    /// The registered cipher identifiers, in declaration order.
    pub fn ciphers(&self) -> impl Iterator<Item = CipherId> + '_ {
        CipherId::ALL
            .iter()
            .copied()
            .filter(|id| self.ciphers.contains_key(id))
    }

    pub fn new_cipher(
        &self,
        id: CipherId,
        key: &[u8],
        iv: Option<&[u8]>,
        mode: Mode,
    ) -> Res<Box<dyn Cipher>> {
        self.cipher(id)?(key, iv, mode)
    }

    pub fn new_hash(&self, id: HashId) -> Res<Box<dyn Hash>> {
        Ok(self.hash(id)?())
    }

    pub fn new_random(&self, id: RandomId) -> Res<Box<dyn Random>> {
        Ok(self.random(id)?())
    }

    /// An encrypting writer over `dst`, with the default buffer size.
    pub fn writer<W: Write>(
        &self,
        dst: W,
        id: CipherId,
        key: &[u8],
        iv: Option<&[u8]>,
    ) -> Res<CipherWriter<W>> {
        let cipher = self.new_cipher(id, key, iv, Mode::Encrypt)?;
        Ok(CipherWriter::new(dst, cipher))
    }

    /// A decrypting reader over `src`, with the default buffer size.
    pub fn reader<R: Read>(
        &self,
        src: R,
        id: CipherId,
        key: &[u8],
        iv: Option<&[u8]>,
    ) -> Res<CipherReader<R>> {
        let cipher = self.new_cipher(id, key, iv, Mode::Decrypt)?;
        Ok(CipherReader::new(src, cipher))
    }
}
