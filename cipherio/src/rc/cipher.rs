use aes::{Aes128, Aes192, Aes256};
use blowfish::Blowfish;
use cfb_mode::{BufDecryptor, BufEncryptor};
use cipher::{
    consts::{
        U1, U10, U11, U12, U13, U14, U15, U16, U17, U18, U19, U2, U20, U21, U22, U23, U24, U25,
        U26, U256, U27, U28, U29, U3, U30, U31, U32, U4, U5, U6, U7, U8, U9,
    },
    generic_array::GenericArray,
    typenum::{IsLess, Le, NonZero},
    BlockCipher, BlockDecryptMut, BlockEncryptMut, InnerIvInit, KeyInit, StreamCipher,
    StreamCipherCore, StreamCipherCoreWrapper,
};
use ctr::{flavors::Ctr128BE, CtrCore};
use des::{TdesEde2, TdesEde3};
use ofb::OfbCore;
use rc4::Rc4;
#[cfg(feature = "unsafe-print-secrets")]
use log::trace;

use crate::{
    cipher::{BlockCipher as Blocks, BlockTransform, Cipher, Keystream, Mode, StreamCipher as Stream},
    err::{Error, Res},
    registry::{CipherConstructor, CipherId, RegistryBuilder},
};

struct Encrypting<M>(M);

impl<M: BlockEncryptMut + Send> BlockTransform for Encrypting<M> {
    fn block_size(&self) -> usize {
        M::block_size()
    }

    fn transform_blocks(&mut self, blocks: &mut [u8]) {
        for block in blocks.chunks_exact_mut(M::block_size()) {
            self.0.encrypt_block_mut(GenericArray::from_mut_slice(block));
        }
    }
}

struct Decrypting<M>(M);

impl<M: BlockDecryptMut + Send> BlockTransform for Decrypting<M> {
    fn block_size(&self) -> usize {
        M::block_size()
    }

    fn transform_blocks(&mut self, blocks: &mut [u8]) {
        for block in blocks.chunks_exact_mut(M::block_size()) {
            self.0.decrypt_block_mut(GenericArray::from_mut_slice(block));
        }
    }
}

struct Xor<S>(S);

impl<S: StreamCipher + Send> Keystream for Xor<S> {
    fn apply(&mut self, data: &mut [u8]) {
        self.0.apply_keystream(data);
    }
}

impl<C: BlockEncryptMut + BlockCipher + Send> Keystream for BufEncryptor<C> {
    fn apply(&mut self, data: &mut [u8]) {
        self.encrypt(data);
    }
}

impl<C: BlockEncryptMut + BlockCipher + Send> Keystream for BufDecryptor<C> {
    fn apply(&mut self, data: &mut [u8]) {
        self.decrypt(data);
    }
}

#[cfg(feature = "unsafe-print-secrets")]
fn print_secrets(key: &[u8], iv: Option<&[u8]>) {
    trace!(
        "Cipher key {} iv {}",
        hex::encode(key),
        iv.map_or_else(|| String::from("-"), hex::encode)
    );
}

#[cfg(not(feature = "unsafe-print-secrets"))]
fn print_secrets(_key: &[u8], _iv: Option<&[u8]>) {}

/// Key a mode that takes no initialization vector.
fn keyed<M: KeyInit>(key: &[u8], iv: Option<&[u8]>) -> Res<M> {
    if let Some(iv) = iv.filter(|iv| !iv.is_empty()) {
        return Err(Error::InvalidIvSize(iv.len()));
    }
    M::new_from_slice(key).map_err(|_| Error::InvalidKeySize(key.len()))
}

/// Key the block cipher, then start the mode from the initialization vector.
fn keyed_iv<M>(key: &[u8], iv: Option<&[u8]>) -> Res<M>
where
    M: InnerIvInit,
    M::Inner: KeyInit,
{
    let inner = M::Inner::new_from_slice(key).map_err(|_| Error::InvalidKeySize(key.len()))?;
    let iv = iv.unwrap_or_default();
    M::inner_iv_slice_init(inner, iv).map_err(|_| Error::InvalidIvSize(iv.len()))
}

fn ecb<C>(key: &[u8], iv: Option<&[u8]>, mode: Mode) -> Res<Box<dyn Cipher>>
where
    C: BlockEncryptMut + BlockDecryptMut + BlockCipher + KeyInit + Send + 'static,
{
    let transform: Box<dyn BlockTransform> = match mode {
        Mode::Encrypt => Box::new(Encrypting(keyed::<ecb::Encryptor<C>>(key, iv)?)),
        Mode::Decrypt => Box::new(Decrypting(keyed::<ecb::Decryptor<C>>(key, iv)?)),
    };
    Ok(Box::new(Blocks::new(transform, key.len())))
}

fn cbc<C>(key: &[u8], iv: Option<&[u8]>, mode: Mode) -> Res<Box<dyn Cipher>>
where
    C: BlockEncryptMut + BlockDecryptMut + BlockCipher + KeyInit + Send + 'static,
{
    let transform: Box<dyn BlockTransform> = match mode {
        Mode::Encrypt => Box::new(Encrypting(keyed_iv::<cbc::Encryptor<C>>(key, iv)?)),
        Mode::Decrypt => Box::new(Decrypting(keyed_iv::<cbc::Decryptor<C>>(key, iv)?)),
    };
    Ok(Box::new(Blocks::new(transform, key.len())))
}

fn cfb<C>(key: &[u8], iv: Option<&[u8]>, mode: Mode) -> Res<Box<dyn Cipher>>
where
    C: BlockEncryptMut + BlockCipher + KeyInit + Send + 'static,
{
    let keystream: Box<dyn Keystream> = match mode {
        Mode::Encrypt => Box::new(keyed_iv::<BufEncryptor<C>>(key, iv)?),
        Mode::Decrypt => Box::new(keyed_iv::<BufDecryptor<C>>(key, iv)?),
    };
    Ok(Box::new(Stream::new(keystream, key.len())))
}

/// OFB and CTR apply the same keystream in both directions.
/// The mode is built from its core so that the key length is checked by the block cipher.
fn xor<K>(key: &[u8], iv: Option<&[u8]>, _mode: Mode) -> Res<Box<dyn Cipher>>
where
    K: StreamCipherCore + InnerIvInit + Send + 'static,
    K::Inner: KeyInit,
    K::BlockSize: IsLess<U256>,
    Le<K::BlockSize, U256>: NonZero,
{
    let s = StreamCipherCoreWrapper::from_core(keyed_iv::<K>(key, iv)?);
    Ok(Box::new(Stream::new(Box::new(Xor(s)), key.len())))
}

fn rc4_with<S>(key: &[u8], iv: Option<&[u8]>) -> Res<Box<dyn Cipher>>
where
    S: KeyInit + StreamCipher + Send + 'static,
{
    let s = keyed::<S>(key, iv)?;
    Ok(Box::new(Stream::new(Box::new(Xor(s)), key.len())))
}

macro_rules! by_key_size {
    ($name:ident { $($len:pat => $build:expr,)+ }) => {
        fn $name(key: &[u8], iv: Option<&[u8]>, mode: Mode) -> Res<Box<dyn Cipher>> {
            print_secrets(key, iv);
            let build: CipherConstructor = match key.len() {
                $($len => $build,)+
                n => return Err(Error::InvalidKeySize(n)),
            };
            build(key, iv, mode)
        }
    };
}

by_key_size!(aes_ecb {
    16 => ecb::<Aes128>,
    24 => ecb::<Aes192>,
    32 => ecb::<Aes256>,
});
by_key_size!(aes_cbc {
    16 => cbc::<Aes128>,
    24 => cbc::<Aes192>,
    32 => cbc::<Aes256>,
});
by_key_size!(aes_cfb {
    16 => cfb::<Aes128>,
    24 => cfb::<Aes192>,
    32 => cfb::<Aes256>,
});
by_key_size!(aes_ofb {
    16 => xor::<OfbCore<Aes128>>,
    24 => xor::<OfbCore<Aes192>>,
    32 => xor::<OfbCore<Aes256>>,
});
by_key_size!(aes_ctr {
    16 => xor::<CtrCore<Aes128, Ctr128BE>>,
    24 => xor::<CtrCore<Aes192, Ctr128BE>>,
    32 => xor::<CtrCore<Aes256, Ctr128BE>>,
});
by_key_size!(des3_ecb {
    16 => ecb::<TdesEde2>,
    24 => ecb::<TdesEde3>,
});
by_key_size!(des3_cbc {
    16 => cbc::<TdesEde2>,
    24 => cbc::<TdesEde3>,
});
by_key_size!(des3_cfb {
    16 => cfb::<TdesEde2>,
    24 => cfb::<TdesEde3>,
});
by_key_size!(des3_ofb {
    16 => xor::<OfbCore<TdesEde2>>,
    24 => xor::<OfbCore<TdesEde3>>,
});

// Blowfish takes keys of 4 to 56 bytes and checks the length itself.
by_key_size!(bf_ecb {
    4..=56 => ecb::<Blowfish>,
});
by_key_size!(bf_cbc {
    4..=56 => cbc::<Blowfish>,
});
by_key_size!(bf_cfb {
    4..=56 => cfb::<Blowfish>,
});
by_key_size!(bf_ofb {
    4..=56 => xor::<OfbCore<Blowfish>>,
});

macro_rules! rc4_by_key_size {
    ($($len:literal => $k:ty),+ $(,)?) => {
        /// RC4 has the same keystream in both directions and no initialization vector.
        fn rc4(key: &[u8], iv: Option<&[u8]>, _mode: Mode) -> Res<Box<dyn Cipher>> {
            print_secrets(key, iv);
            match key.len() {
                $($len => rc4_with::<Rc4<$k>>(key, iv),)+
                n => Err(Error::InvalidKeySize(n)),
            }
        }
    };
}

rc4_by_key_size!(
    1 => U1, 2 => U2, 3 => U3, 4 => U4, 5 => U5, 6 => U6, 7 => U7, 8 => U8,
    9 => U9, 10 => U10, 11 => U11, 12 => U12, 13 => U13, 14 => U14, 15 => U15, 16 => U16,
    17 => U17, 18 => U18, 19 => U19, 20 => U20, 21 => U21, 22 => U22, 23 => U23, 24 => U24,
    25 => U25, 26 => U26, 27 => U27, 28 => U28, 29 => U29, 30 => U30, 31 => U31, 32 => U32,
);

pub(super) fn register(builder: RegistryBuilder) -> RegistryBuilder {
    builder
        .cipher(CipherId::AesEcb, aes_ecb)
        .cipher(CipherId::AesCbc, aes_cbc)
        .cipher(CipherId::AesOfb, aes_ofb)
        .cipher(CipherId::AesCfb, aes_cfb)
        .cipher(CipherId::AesCtr, aes_ctr)
        .cipher(CipherId::BfEcb, bf_ecb)
        .cipher(CipherId::BfCbc, bf_cbc)
        .cipher(CipherId::BfOfb, bf_ofb)
        .cipher(CipherId::BfCfb, bf_cfb)
        .cipher(CipherId::Des3Ecb, des3_ecb)
        .cipher(CipherId::Des3Cbc, des3_cbc)
        .cipher(CipherId::Des3Ofb, des3_ofb)
        .cipher(CipherId::Des3Cfb, des3_cfb)
        .cipher(CipherId::Rc4, rc4)
}
