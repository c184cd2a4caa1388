// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Key-encryption-key derivation and content-key unwrap.
//!
//! The KEK is derived from the device-unique key, the serial number and
//! the record's 16-bit key index by two chained AES-ECB encryptions;
//! the content-encryption key then falls out of one CBC block
//! decryption. Every intermediate key is wiped as soon as it has been
//! used.

use aes::cipher::{
    BlockCipherEncrypt, BlockModeDecrypt, KeyInit, KeyIvInit,
};
use aes::Aes128;
use sbi_image::{AES_BLOCK_LEN, AES_KEY_LEN};
use zeroize::Zeroize;

/// The IV used by every CBC decryption in the image format.
pub const FIXED_IV: [u8; AES_BLOCK_LEN] = [
    0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x0B,
    0x0C, 0x0D, 0x0E, 0x0F, 0x10,
];

/// Derives the key-encryption key for `key_index`.
pub fn derive_kek(
    duk: &[u8; AES_KEY_LEN],
    serial: &[u8; 4],
    key_index: u16,
) -> [u8; AES_KEY_LEN] {
    let kh = (key_index >> 8) as u8;
    let kl = key_index as u8;

    let mut k1: [u8; AES_BLOCK_LEN] = [
        0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00,
        0x00, 0x00, 0x00, 0x00, kh, kl,
    ];
    let mut kek: [u8; AES_BLOCK_LEN] = [
        serial[0], serial[1], serial[2], serial[3], 0x00, 0x01, 0x00,
        0x00, 0x00, 0x00, 0x00, 0x00, kh, kl, 0x00, 0x00,
    ];

    Aes128::new(duk.into()).encrypt_block((&mut k1).into());
    Aes128::new((&k1).into()).encrypt_block((&mut kek).into());
    k1.zeroize();
    kek
}

/// Unwraps the content-encryption key carried by an ENCRYPTION_KEY
/// record.
pub fn unwrap_cek(
    duk: &[u8; AES_KEY_LEN],
    serial: &[u8; 4],
    key_index: u16,
    encrypted_key: &[u8; AES_KEY_LEN],
) -> [u8; AES_KEY_LEN] {
    let mut kek = derive_kek(duk, serial, key_index);
    let mut cek = *encrypted_key;
    cbc::Decryptor::<Aes128>::new((&kek).into(), (&FIXED_IV).into())
        .decrypt_block((&mut cek).into());
    kek.zeroize();
    cek
}
