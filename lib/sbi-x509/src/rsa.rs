// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! RSASSA-PKCS1-v1_5 signature verification with SHA-256, for moduli of
//! up to 3072 bits.
//!
//! The public operation is a fixed-width Montgomery exponentiation; the
//! recovered block is then checked against the exact EMSA-PKCS1-v1_5
//! layout: `00 01 FF..FF 00 <DigestInfo> <digest>`, with the padding run
//! required to be at least eight bytes. Working buffers are wiped after
//! every verification, pass or fail.

use crypto_bigint::modular::runtime_mod::{DynResidue, DynResidueParams};
use crypto_bigint::{Encoding, Integer, Zero, U3072};
use zeroize::Zeroize;

use crate::{X509Error, MAX_MODULUS_LEN};

/// DigestInfo prefix for SHA-256: SEQUENCE { AlgorithmIdentifier
/// { sha256, NULL }, OCTET STRING (32) }.
const DIGEST_INFO_SHA256: [u8; 19] = [
    0x30, 0x31, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65,
    0x03, 0x04, 0x02, 0x01, 0x05, 0x00, 0x04, 0x20,
];

const DIGEST_LEN: usize = 32;

/// Shortest block that can hold the mandatory framing, eight bytes of
/// padding, the DigestInfo prefix and the digest.
const MIN_BLOCK_LEN: usize = 2 + 8 + 1 + DIGEST_INFO_SHA256.len() + DIGEST_LEN;

/// An RSA public key imported from a certificate.
#[derive(Clone)]
pub struct RsaPublicKey {
    modulus: U3072,
    modulus_len: usize,
    exponent: U3072,
    exponent_bits: usize,
}

impl RsaPublicKey {
    /// Imports a key from big-endian modulus and exponent bytes.
    ///
    /// The modulus must be odd (every RSA modulus is) and no longer than
    /// [`MAX_MODULUS_LEN`] bytes once leading zeros are stripped.
    pub fn from_components(
        modulus: &[u8],
        exponent: &[u8],
    ) -> Result<Self, X509Error> {
        let modulus = crate::der::strip_leading_zeros(modulus);
        let exponent = crate::der::strip_leading_zeros(exponent);
        if modulus.is_empty()
            || modulus.len() > MAX_MODULUS_LEN
            || exponent.is_empty()
            || exponent.len() > MAX_MODULUS_LEN
        {
            return Err(X509Error::BadDer);
        }

        let modulus_len = modulus.len();
        let modulus = import(modulus);
        let exponent = import(exponent);
        if bool::from(modulus.is_even()) {
            return Err(X509Error::BadDer);
        }

        let exponent_bits = exponent.bits();
        Ok(Self {
            modulus,
            modulus_len,
            exponent,
            exponent_bits,
        })
    }

    /// Significant length of the modulus in bytes. Signatures made with
    /// this key are exactly this long.
    pub fn modulus_len(&self) -> usize {
        self.modulus_len
    }

    /// Verifies `signature` against a SHA-256 `digest`.
    pub fn verify_digest(
        &self,
        digest: &[u8; DIGEST_LEN],
        signature: &[u8],
    ) -> Result<(), X509Error> {
        let sig_len = signature.len();
        if sig_len != self.modulus_len || sig_len < MIN_BLOCK_LEN {
            return Err(X509Error::BadSignature);
        }

        let sig = import(signature);
        // The signature representative must be in range for the modulus.
        if sig >= self.modulus || bool::from(sig.is_zero()) {
            return Err(X509Error::BadSignature);
        }

        let params = DynResidueParams::new(&self.modulus);
        let mut recovered = DynResidue::new(&sig, params)
            .pow_bounded_exp(&self.exponent, self.exponent_bits)
            .retrieve();
        let mut block = recovered.to_be_bytes();
        recovered.zeroize();

        let ok = unwrap_emsa(&block[block.len() - sig_len..], digest);
        block.zeroize();

        if ok {
            Ok(())
        } else {
            Err(X509Error::BadSignature)
        }
    }
}

/// Checks the EMSA-PKCS1-v1_5 layout of a recovered block.
fn unwrap_emsa(block: &[u8], digest: &[u8; DIGEST_LEN]) -> bool {
    let len = block.len();
    // Fixed positions: the separator sits right before DigestInfo.
    let sep = len - 1 - DIGEST_INFO_SHA256.len() - DIGEST_LEN;

    if block[0] != 0x00 || block[1] != 0x01 {
        return false;
    }
    if block[2..sep].iter().any(|&b| b != 0xFF) {
        return false;
    }
    if block[sep] != 0x00 {
        return false;
    }
    if block[sep + 1..len - DIGEST_LEN] != DIGEST_INFO_SHA256 {
        return false;
    }
    block[len - DIGEST_LEN..] == digest[..]
}

/// Imports big-endian bytes into a fixed-width integer.
fn import(bytes: &[u8]) -> U3072 {
    let mut padded = [0u8; MAX_MODULUS_LEN];
    padded[MAX_MODULUS_LEN - bytes.len()..].copy_from_slice(bytes);
    let value = U3072::from_be_slice(&padded);
    padded.zeroize();
    value
}
