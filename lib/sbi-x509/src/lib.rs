// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Minimal X.509 v3 support for the secure-boot chain.
//!
//! Certificates arrive as DER blobs inside boot records and are parsed
//! into fixed-size, heap-free [`Certificate`] values: distinguished
//! names, the RSA public key, the TBS and whole-certificate digests,
//! the signature, and the three extensions the boot flow cares about
//! (BasicConstraints, KeyUsage, SubjectAltName). Only
//! sha256WithRSAEncryption certificates are accepted.
//!
//! Signature verification is RSASSA-PKCS1-v1_5 with SHA-256 over moduli
//! of up to 3072 bits, implemented in [`rsa`] on top of fixed-width
//! Montgomery exponentiation. There is no notion of time here: validity
//! periods are parsed over and ignored.

#![cfg_attr(not(test), no_std)]

pub mod cert;
pub mod der;
pub mod name;
pub mod rsa;

pub use cert::{BasicConstraints, Certificate, KeyUsage};
pub use name::DistinguishedName;
pub use rsa::RsaPublicKey;

/// Largest supported modulus (and therefore signature), in bytes.
pub const MAX_MODULUS_LEN: usize = 384;

/// Everything that can go wrong while parsing or verifying a
/// certificate.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum X509Error {
    /// Malformed or truncated DER.
    BadDer,
    /// The signature algorithm is not sha256WithRSAEncryption, or the
    /// public key is not an RSA key.
    UnsupportedDigest,
    /// Signature unwrap or digest comparison failed.
    BadSignature,
    /// No acceptable signer was found for this certificate.
    NoTrustedCert,
    /// The issuer does not match the proposed signer's subject.
    InvalidChain,
    /// The certificate is self-signed where that is not allowed.
    SelfSigned,
    /// BasicConstraints or KeyUsage forbid this use of the certificate.
    BasicConstraint,
    /// A fixed-capacity field in the parsed record overflowed.
    Capacity,
}
