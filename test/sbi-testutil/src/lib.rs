// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Host-side fixtures for exercising the boot executor: a shared
//! RSA-3072 key, a DER certificate builder, record/stream assembly and
//! a RAM-backed [`sbi_executor::BootEnv`] implementation.
//!
//! Everything here runs on the host with `std`; none of it ships in a
//! boot image.

pub mod cert;
pub mod der;
pub mod env;
pub mod stream;

use std::sync::OnceLock;

use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha2::{Digest, Sha256};

use sbi_executor::{derive_kek, Otp};

pub use cert::{build_cert, CertSpec};
pub use env::MemEnv;
pub use stream::{
    build_record, cert_record, flash_image, key_record, terminator,
    RecordOpts,
};

/// The RSA-3072 key every test certificate uses. Generating one takes
/// seconds, so it is done once per process.
pub fn test_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| {
        RsaPrivateKey::new(&mut rand::thread_rng(), 3072)
            .expect("RSA keygen")
    })
}

/// PKCS#1 v1.5 / SHA-256 signature over `msg` with the shared key.
pub fn sign(msg: &[u8]) -> Vec<u8> {
    rsa::pkcs1v15::SigningKey::<Sha256>::new(test_key().clone())
        .sign(msg)
        .to_vec()
}

/// The OTP snapshot used by the scenarios: serial `01 02 03 04`, DUK
/// `00 01 .. 0F`, root hash anchored to `root_der`.
pub fn test_otp(root_der: &[u8], flags: u16) -> Otp {
    Otp {
        serial: [0x01, 0x02, 0x03, 0x04],
        duk: core::array::from_fn(|i| i as u8),
        root_hash: Sha256::digest(root_der).into(),
        flags,
        fw_counter: 1,
    }
}

/// AES-CBC encryption with the format's fixed IV; the input is
/// zero-padded to a whole number of blocks.
pub fn cbc_encrypt(key: &[u8; 16], data: &[u8]) -> Vec<u8> {
    use aes::cipher::{BlockModeEncrypt, KeyIvInit};

    let mut padded = data.to_vec();
    padded.resize(data.len().next_multiple_of(16), 0);

    let mut enc = cbc::Encryptor::<aes::Aes128>::new(
        key.into(),
        (&sbi_executor::FIXED_IV).into(),
    );
    for block in padded.chunks_mut(16) {
        enc.encrypt_block(aes::Block::from_mut_slice(block));
    }
    padded
}

/// Wraps a content-encryption key the way the signing tooling does:
/// CBC-encrypted under the KEK derived from DUK, serial and key index.
pub fn wrap_cek(otp: &Otp, key_index: u16, cek: &[u8; 16]) -> [u8; 16] {
    let kek = derive_kek(&otp.duk, &otp.serial, key_index);
    cbc_encrypt(&kek, cek).try_into().unwrap()
}

/// The standard three-certificate chain used by most scenarios:
/// root (CA, self-signed) -> intermediate (CA) -> leaf (end entity),
/// all on the shared key. Returned as DER.
pub fn standard_chain() -> (Vec<u8>, Vec<u8>, Vec<u8>) {
    let root = build_cert(&CertSpec {
        subject: "boot root",
        issuer: "boot root",
        ca: true,
        path_len: None,
        key_usage: Some(cert::KU_KEY_CERT_SIGN),
    });
    let inter = build_cert(&CertSpec {
        subject: "boot intermediate",
        issuer: "boot root",
        ca: true,
        path_len: None,
        key_usage: Some(cert::KU_KEY_CERT_SIGN),
    });
    let leaf = build_cert(&CertSpec {
        subject: "boot leaf",
        issuer: "boot intermediate",
        ca: false,
        path_len: None,
        key_usage: Some(cert::KU_DIGITAL_SIGNATURE),
    });
    (root, inter, leaf)
}
