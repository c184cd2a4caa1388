// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The 96-byte record header and its flags word.

use sha2::{Digest, Sha256};
use zerocopy::byteorder::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::{
    align_up, SbiError, AES_BLOCK_LEN, HEADER_SIZE, RSA_MOD_LEN,
    SHA_DIGEST_LEN,
};

/// `"SBMG"`, as the little-endian word stored in the `magic` field.
pub const HEADER_MAGIC: u32 = 0x5342_4D47;

/// What a record contains, from the low three bits of the flags word.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ObjectType {
    /// Executable payload; control is transferred to it at the end of
    /// the boot attempt and never comes back.
    PayloadNoReturn,
    /// AES content-encryption key, wrapped with a device-derived key.
    EncryptionKey,
    /// The self-signed trust anchor; must be the first record.
    RootCert,
    /// An intermediate CA or the end-entity certificate.
    NonRootCert,
    /// Executable payload invoked as a plain call that returns.
    PayloadWithReturn,
    /// Data-only payload; loaded, never executed.
    PayloadNoExec,
}

impl ObjectType {
    fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0 => Some(Self::PayloadNoReturn),
            1 => Some(Self::EncryptionKey),
            2 => Some(Self::RootCert),
            3 => Some(Self::NonRootCert),
            4 => Some(Self::PayloadWithReturn),
            5 => Some(Self::PayloadNoExec),
            _ => None,
        }
    }

    pub fn is_payload(self) -> bool {
        matches!(
            self,
            Self::PayloadNoReturn
                | Self::PayloadWithReturn
                | Self::PayloadNoExec
        )
    }
}

/// Decoded view of the header flags word.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ImageFlags(pub u32);

impl ImageFlags {
    pub const CHECKSUM: u32 = 1 << 3;
    pub const ENCRYPTED: u32 = 1 << 4;
    pub const SIGN_OF_ENCRYPTED: u32 = 1 << 5;
    pub const SIGNED: u32 = 1 << 6;
    pub const SKIP_HEADER_HASH: u32 = 1 << 7;

    /// Bits 0-2. Values 6 and 7 are not assigned to any record type.
    pub fn object_type(self) -> Result<ObjectType, SbiError> {
        ObjectType::from_bits(self.0 & 0x7).ok_or(SbiError::ImageBadType)
    }

    /// The payload digest field is authoritative.
    pub fn checksum(self) -> bool {
        self.0 & Self::CHECKSUM != 0
    }

    /// The body on flash is AES-CBC ciphertext.
    pub fn encrypted(self) -> bool {
        self.0 & Self::ENCRYPTED != 0
    }

    /// The signature covers the ciphertext rather than the plaintext.
    /// Meaningful only together with `signed`; ignored otherwise.
    pub fn sign_of_encrypted(self) -> bool {
        self.0 & Self::SIGN_OF_ENCRYPTED != 0 && self.signed()
    }

    /// The body is followed by an RSA signature of [`RSA_MOD_LEN`] bytes.
    pub fn signed(self) -> bool {
        self.0 & Self::SIGNED != 0
    }

    /// Request to skip the header self-hash check. Only honored while
    /// boot-secure-enable is clear in OTP.
    pub fn skip_header_hash(self) -> bool {
        self.0 & Self::SKIP_HEADER_HASH != 0
    }
}

/// The record header exactly as stored on flash, little-endian.
///
/// `header_digest` is the SHA-256 of these 96 bytes computed with the
/// digest field itself zeroed.
#[derive(
    Copy, Clone, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned,
)]
#[repr(C)]
pub struct ImageHeader {
    pub magic: U32,
    pub payload_size: U32,
    pub load_addr: U32,
    pub entry_addr: U32,
    pub flags: U32,
    pub key_index: U32,
    pub cert_id: U32,
    pub sign_cert_id: U32,
    pub payload_digest: [u8; SHA_DIGEST_LEN],
    pub header_digest: [u8; SHA_DIGEST_LEN],
}

static_assertions::const_assert_eq!(
    core::mem::size_of::<ImageHeader>(),
    HEADER_SIZE
);

impl ImageHeader {
    /// Reads a header from the first [`HEADER_SIZE`] bytes of `buf`.
    pub fn read_from(buf: &[u8]) -> Result<Self, SbiError> {
        Self::read_from_prefix(buf)
            .map(|(header, _)| header)
            .map_err(|_| SbiError::ReadFailed)
    }

    pub fn flags(&self) -> ImageFlags {
        ImageFlags(self.flags.get())
    }

    pub fn object_type(&self) -> Result<ObjectType, SbiError> {
        self.flags().object_type()
    }

    pub fn check_magic(&self) -> Result<(), SbiError> {
        if self.magic.get() != HEADER_MAGIC {
            return Err(SbiError::ImageBadHeaderId);
        }
        Ok(())
    }

    /// Payload length padded out to whole AES blocks.
    pub fn cipher_size(&self) -> usize {
        align_up(self.payload_size.get() as usize, AES_BLOCK_LEN)
    }

    /// Length of the body as stored on flash.
    pub fn body_size(&self) -> usize {
        if self.flags().encrypted() {
            self.cipher_size()
        } else {
            self.payload_size.get() as usize
        }
    }

    /// Length of the signature between header and body, possibly zero.
    pub fn sign_size(&self) -> usize {
        if self.flags().signed() {
            RSA_MOD_LEN
        } else {
            0
        }
    }

    /// Total on-flash footprint of the record, header included.
    ///
    /// Encrypted records are padded to an AES-block boundary, everything
    /// else to a word boundary.
    pub fn image_size(&self) -> usize {
        let raw = HEADER_SIZE + self.sign_size() + self.body_size();
        let align =
            if self.flags().encrypted() { AES_BLOCK_LEN } else { 4 };
        align_up(raw, align)
    }

    /// SHA-256 of the header with `header_digest` zeroed.
    pub fn self_digest(&self) -> [u8; SHA_DIGEST_LEN] {
        let mut copy = *self;
        copy.header_digest = [0; SHA_DIGEST_LEN];
        let mut hash = Sha256::new();
        hash.update(copy.as_bytes());
        hash.finalize().into()
    }

    pub fn check_self_digest(&self) -> Result<(), SbiError> {
        if self.self_digest() != self.header_digest {
            return Err(SbiError::ImageBadHeaderHash);
        }
        Ok(())
    }

    /// Stamps `header_digest` so that [`Self::check_self_digest`] passes.
    pub fn seal(&mut self) {
        self.header_digest = [0; SHA_DIGEST_LEN];
        self.header_digest = self.self_digest();
    }
}
