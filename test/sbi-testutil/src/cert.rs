// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! X.509 v3 certificate assembly for tests. Every certificate carries
//! the shared test key and is signed with it (the chain in these
//! fixtures is about names and extensions, not key separation).

use rsa::traits::PublicKeyParts;

use crate::der::*;
use crate::{sign, test_key};

const OID_SHA256_WITH_RSA: &[u8] =
    &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x0B];
const OID_RSA_ENCRYPTION: &[u8] =
    &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x01];
const OID_COMMON_NAME: &[u8] = &[0x55, 0x04, 0x03];
const OID_BASIC_CONSTRAINTS: &[u8] = &[0x55, 0x1D, 0x13];
const OID_KEY_USAGE: &[u8] = &[0x55, 0x1D, 0x0F];

/// RFC 5280 key-usage bit numbers.
pub const KU_DIGITAL_SIGNATURE: u16 = 1 << 0;
pub const KU_KEY_CERT_SIGN: u16 = 1 << 5;

pub struct CertSpec<'a> {
    /// Subject common name.
    pub subject: &'a str,
    /// Issuer common name; equal to `subject` for a self-signed root.
    pub issuer: &'a str,
    pub ca: bool,
    pub path_len: Option<u32>,
    /// RFC 5280 bit numbers, e.g. [`KU_KEY_CERT_SIGN`].
    pub key_usage: Option<u16>,
}

fn name(cn: &str) -> Vec<u8> {
    seq(&[&set(&[&seq(&[&oid(OID_COMMON_NAME), &utf8(cn)])])])
}

fn validity() -> Vec<u8> {
    seq(&[&utc_time("250101000000Z"), &utc_time("450101000000Z")])
}

fn spki() -> Vec<u8> {
    let key = test_key();
    let rsa_key = seq(&[
        &uint(&key.n().to_bytes_be()),
        &uint(&key.e().to_bytes_be()),
    ]);
    seq(&[
        &seq(&[&oid(OID_RSA_ENCRYPTION), &null()]),
        &bit_string(&rsa_key),
    ])
}

/// KeyUsage BIT STRING from RFC bit numbers, most significant bit
/// first.
fn key_usage_bits(bits: u16) -> Vec<u8> {
    let mut bytes = [0u8; 2];
    for i in 0..16 {
        if bits & (1 << i) != 0 {
            bytes[i / 8] |= 0x80 >> (i % 8);
        }
    }
    let value: &[u8] =
        if bytes[1] == 0 { &bytes[..1] } else { &bytes[..] };
    bit_string(value)
}

fn extensions(spec: &CertSpec<'_>) -> Vec<u8> {
    let mut bc_inner = Vec::new();
    if spec.ca {
        bc_inner.extend_from_slice(&boolean(true));
    }
    if let Some(pl) = spec.path_len {
        bc_inner.extend_from_slice(&small_uint(pl));
    }
    let bc = seq(&[
        &oid(OID_BASIC_CONSTRAINTS),
        &boolean(true), // critical
        &octet_string(&seq(&[&bc_inner])),
    ]);

    let mut exts = bc;
    if let Some(ku) = spec.key_usage {
        exts.extend_from_slice(&seq(&[
            &oid(OID_KEY_USAGE),
            &boolean(true), // critical
            &octet_string(&key_usage_bits(ku)),
        ]));
    }
    explicit(3, &seq(&[&exts]))
}

/// Builds and signs one DER certificate.
pub fn build_cert(spec: &CertSpec<'_>) -> Vec<u8> {
    let tbs = seq(&[
        &explicit(0, &small_uint(2)), // v3
        &small_uint(1),               // serialNumber
        &seq(&[&oid(OID_SHA256_WITH_RSA), &null()]),
        &name(spec.issuer),
        &validity(),
        &name(spec.subject),
        &spki(),
        &extensions(spec),
    ]);

    let signature = sign(&tbs);
    let mut sig_content = vec![0u8];
    sig_content.extend_from_slice(&signature);

    seq(&[
        &tbs,
        &seq(&[&oid(OID_SHA256_WITH_RSA), &null()]),
        &tlv(0x03, &sig_content),
    ])
}
