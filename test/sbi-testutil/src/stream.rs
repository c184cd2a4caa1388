// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Record and stream assembly mirroring the image signing tooling.

use sha2::{Digest, Sha256};
use zerocopy::{FromZeros, IntoBytes};

use sbi_image::{ImageFlags, ImageHeader, HEADER_MAGIC, HEADER_SIZE};

use crate::{cbc_encrypt, sign};

#[derive(Default, Clone)]
pub struct RecordOpts {
    /// Object type bits (0..=5).
    pub object_type: u32,
    pub checksum: bool,
    pub encrypted: bool,
    pub sign_of_encrypted: bool,
    pub signed: bool,
    pub skip_header_hash: bool,
    pub load_addr: u32,
    pub entry_addr: u32,
    pub key_index: u32,
    pub cert_id: u32,
    pub sign_cert_id: u32,
}

/// Assembles one record: sealed header, optional signature, body
/// (encrypted when requested), padded out to the on-flash size.
pub fn build_record(
    opts: &RecordOpts,
    plaintext: &[u8],
    cek: Option<&[u8; 16]>,
) -> Vec<u8> {
    let mut flags = opts.object_type & 0x7;
    if opts.checksum {
        flags |= ImageFlags::CHECKSUM;
    }
    if opts.encrypted {
        flags |= ImageFlags::ENCRYPTED;
    }
    if opts.sign_of_encrypted {
        flags |= ImageFlags::SIGN_OF_ENCRYPTED;
    }
    if opts.signed {
        flags |= ImageFlags::SIGNED;
    }
    if opts.skip_header_hash {
        flags |= ImageFlags::SKIP_HEADER_HASH;
    }

    let stored_body = if opts.encrypted {
        cbc_encrypt(cek.expect("an encrypted record needs a CEK"), plaintext)
    } else {
        plaintext.to_vec()
    };

    let mut header = ImageHeader::new_zeroed();
    header.magic = HEADER_MAGIC.into();
    header.payload_size = (plaintext.len() as u32).into();
    header.load_addr = opts.load_addr.into();
    header.entry_addr = opts.entry_addr.into();
    header.flags = flags.into();
    header.key_index = opts.key_index.into();
    header.cert_id = opts.cert_id.into();
    header.sign_cert_id = opts.sign_cert_id.into();
    if opts.checksum {
        header.payload_digest = Sha256::digest(plaintext).into();
    }
    header.seal();

    let signature = if opts.signed {
        if opts.sign_of_encrypted {
            sign(&stored_body)
        } else {
            sign(plaintext)
        }
    } else {
        Vec::new()
    };

    let mut record = header.as_bytes().to_vec();
    record.extend_from_slice(&signature);
    record.extend_from_slice(&stored_body);
    record.resize(header.image_size(), 0);
    record
}

/// An unsigned certificate record.
pub fn cert_record(root: bool, cert_id: u32, der: &[u8]) -> Vec<u8> {
    build_record(
        &RecordOpts {
            object_type: if root { 2 } else { 3 },
            cert_id,
            ..Default::default()
        },
        der,
        None,
    )
}

/// A signed ENCRYPTION_KEY record carrying a wrapped content key.
pub fn key_record(
    sign_cert_id: u32,
    key_index: u16,
    wrapped: &[u8; 16],
) -> Vec<u8> {
    build_record(
        &RecordOpts {
            object_type: 1,
            signed: true,
            key_index: key_index as u32,
            sign_cert_id,
            ..Default::default()
        },
        wrapped,
        None,
    )
}

/// A header's worth of erased flash, which terminates the record loop.
pub fn terminator() -> Vec<u8> {
    vec![0xFF; HEADER_SIZE]
}

/// Concatenates records and appends the terminator.
pub fn flash_image(records: &[&[u8]]) -> Vec<u8> {
    let mut out = records.concat();
    out.extend_from_slice(&terminator());
    out
}
