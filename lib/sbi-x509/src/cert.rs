// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! DER certificate parsing into a fixed record.

use heapless::Vec;
use sha2::{Digest, Sha256};

use crate::der::{strip_leading_zeros, tag, Reader};
use crate::name::DistinguishedName;
use crate::rsa::RsaPublicKey;
use crate::{X509Error, MAX_MODULUS_LEN};

/// sha256WithRSAEncryption, the only signature algorithm accepted.
const OID_SHA256_WITH_RSA: &[u8] =
    &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x0B];
/// rsaEncryption, the only subject-public-key algorithm accepted.
const OID_RSA_ENCRYPTION: &[u8] =
    &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x01];

const OID_BASIC_CONSTRAINTS: &[u8] = &[0x55, 0x1D, 0x13];
const OID_KEY_USAGE: &[u8] = &[0x55, 0x1D, 0x0F];
const OID_SUBJECT_ALT_NAME: &[u8] = &[0x55, 0x1D, 0x11];

/// pathLenConstraint when BasicConstraints does not carry one:
/// effectively unlimited.
pub const DEFAULT_PATH_LEN: u32 = 10000;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BasicConstraints {
    pub ca: bool,
    pub path_len: u32,
    pub critical: bool,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KeyUsage {
    /// RFC 5280 bit numbering: bit `i` of the BIT STRING is `1 << i`
    /// here.
    pub bits: u16,
    pub critical: bool,
}

impl KeyUsage {
    pub const DIGITAL_SIGNATURE: u16 = 1 << 0;
    pub const KEY_CERT_SIGN: u16 = 1 << 5;
    pub const CRL_SIGN: u16 = 1 << 6;

    pub fn key_cert_sign(&self) -> bool {
        self.bits & Self::KEY_CERT_SIGN != 0
    }
}

/// A parsed certificate. Everything the boot chain consults lives here;
/// everything else in the DER blob has been skipped (safely).
#[derive(Clone)]
pub struct Certificate {
    pub issuer: DistinguishedName,
    pub subject: DistinguishedName,
    pub key: RsaPublicKey,
    /// SHA-256 over the `tbsCertificate` element.
    pub tbs_digest: [u8; 32],
    /// SHA-256 over the entire DER blob; compared against the fused
    /// root-of-trust hash for root certificates.
    pub cert_digest: [u8; 32],
    signature: Vec<u8, MAX_MODULUS_LEN>,
    pub basic_constraints: Option<BasicConstraints>,
    pub key_usage: Option<KeyUsage>,
    pub subject_alt_name_present: bool,
}

impl Certificate {
    /// Parses one DER certificate from the front of `der`.
    pub fn parse(der: &[u8]) -> Result<Self, X509Error> {
        let mut r = Reader::new(der);

        // Total size of the outer SEQUENCE, for the whole-cert digest.
        let cert_size = {
            let mut probe = r;
            probe.skip(tag::SEQUENCE)?;
            probe.pos()
        };

        r.enter(tag::SEQUENCE)?;
        let tbs_start = r.pos();
        let tbs_end = {
            let mut probe = r;
            probe.skip(tag::SEQUENCE)?;
            probe.pos()
        };

        r.enter(tag::SEQUENCE)?;

        // Optional [0] EXPLICIT version. v1 certificates omit it;
        // extensions are only processed for v3 (value 2).
        let mut version = 0;
        if r.peek_tag()? == tag::EXPLICIT_VERSION {
            r.enter(tag::EXPLICIT_VERSION)?;
            version = r.read_small_uint()?;
        }

        r.skip(tag::INTEGER)?; // serialNumber

        check_signature_algorithm(&mut r)?;

        let issuer = DistinguishedName::parse(&mut r)?;
        r.skip(tag::SEQUENCE)?; // validity; time is not our problem
        let subject = DistinguishedName::parse(&mut r)?;

        let key = parse_public_key(&mut r)?;

        let mut basic_constraints = None;
        let mut key_usage = None;
        let mut subject_alt_name_present = false;
        if version == 2
            && r.pos() < tbs_end
            && r.peek_tag()? == tag::EXPLICIT_EXTENSIONS
        {
            parse_extensions(
                &mut r,
                &mut basic_constraints,
                &mut key_usage,
                &mut subject_alt_name_present,
            )?;
        }

        // Whatever else the TBS carries is uninteresting.
        r.seek(tbs_end);
        r.skip(tag::SEQUENCE)?; // signatureAlgorithm, checked above
        let sig_bytes = r.read_bit_string()?;
        let mut signature = Vec::new();
        signature
            .extend_from_slice(sig_bytes)
            .map_err(|_| X509Error::Capacity)?;

        let tbs_digest =
            Sha256::digest(der.get(tbs_start..tbs_end).ok_or(X509Error::BadDer)?)
                .into();
        let cert_digest =
            Sha256::digest(der.get(..cert_size).ok_or(X509Error::BadDer)?)
                .into();

        Ok(Self {
            issuer,
            subject,
            key,
            tbs_digest,
            cert_digest,
            signature,
            basic_constraints,
            key_usage,
            subject_alt_name_present,
        })
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }

    /// True when issuer and subject are the same DN.
    pub fn is_self_signed(&self) -> bool {
        self.issuer == self.subject
    }

    /// True when BasicConstraints asserts `cA`. A certificate without
    /// the extension counts as an end entity.
    pub fn is_ca(&self) -> bool {
        self.basic_constraints.map(|bc| bc.ca).unwrap_or(false)
    }

    /// Effective pathLenConstraint.
    pub fn path_len(&self) -> u32 {
        self.basic_constraints
            .map(|bc| bc.path_len)
            .unwrap_or(DEFAULT_PATH_LEN)
    }

    /// Verifies this certificate's signature against `signer`'s public
    /// key.
    pub fn verify_signature(
        &self,
        signer: &RsaPublicKey,
    ) -> Result<(), X509Error> {
        signer.verify_digest(&self.tbs_digest, &self.signature)
    }
}

fn check_signature_algorithm(r: &mut Reader<'_>) -> Result<(), X509Error> {
    let alg_len = r.enter(tag::SEQUENCE)?;
    let alg_end = r.pos() + alg_len;
    let oid = r.read(tag::OID)?;
    if oid != OID_SHA256_WITH_RSA {
        return Err(X509Error::UnsupportedDigest);
    }
    r.seek(alg_end); // optional NULL parameters
    Ok(())
}

/// SubjectPublicKeyInfo: the RSA modulus and public exponent.
fn parse_public_key(r: &mut Reader<'_>) -> Result<RsaPublicKey, X509Error> {
    r.enter(tag::SEQUENCE)?;

    let alg_len = r.enter(tag::SEQUENCE)?;
    let alg_end = r.pos() + alg_len;
    let oid = r.read(tag::OID)?;
    if oid != OID_RSA_ENCRYPTION {
        return Err(X509Error::UnsupportedDigest);
    }
    r.seek(alg_end);

    let key_bits = r.read_bit_string()?;
    let mut kr = Reader::new(key_bits);
    kr.enter(tag::SEQUENCE)?;
    let modulus = strip_leading_zeros(kr.read(tag::INTEGER)?);
    let exponent = strip_leading_zeros(kr.read(tag::INTEGER)?);
    if modulus.len() > MAX_MODULUS_LEN {
        return Err(X509Error::Capacity);
    }
    RsaPublicKey::from_components(modulus, exponent)
}

fn parse_extensions(
    r: &mut Reader<'_>,
    basic_constraints: &mut Option<BasicConstraints>,
    key_usage: &mut Option<KeyUsage>,
    subject_alt_name_present: &mut bool,
) -> Result<(), X509Error> {
    r.enter(tag::EXPLICIT_EXTENSIONS)?;
    let list_len = r.enter(tag::SEQUENCE)?;
    let list_end = r.pos() + list_len;

    while r.pos() < list_end {
        let ext_len = r.enter(tag::SEQUENCE)?;
        let ext_end = r.pos() + ext_len;

        let oid = r.read(tag::OID)?;

        let mut critical = false;
        if r.peek_tag()? == tag::BOOLEAN {
            critical = r.read_bool()?;
        }
        let value = r.read(tag::OCTET_STRING)?;

        if oid == OID_BASIC_CONSTRAINTS {
            *basic_constraints =
                Some(parse_basic_constraints(value, critical)?);
        } else if oid == OID_KEY_USAGE {
            *key_usage = Some(parse_key_usage(value, critical)?);
        } else if oid == OID_SUBJECT_ALT_NAME {
            // Recorded but not enforced by the boot flow.
            *subject_alt_name_present = true;
        }

        if r.pos() != ext_end {
            return Err(X509Error::BadDer);
        }
    }
    Ok(())
}

fn parse_basic_constraints(
    value: &[u8],
    critical: bool,
) -> Result<BasicConstraints, X509Error> {
    let mut r = Reader::new(value);
    let len = r.enter(tag::SEQUENCE)?;
    let end = r.pos() + len;

    // Both fields are optional: absent cA reads as false, absent
    // pathLenConstraint as unlimited.
    let mut bc = BasicConstraints {
        ca: false,
        path_len: DEFAULT_PATH_LEN,
        critical,
    };
    if r.pos() < end && r.peek_tag()? == tag::BOOLEAN {
        bc.ca = r.read_bool()?;
    }
    if r.pos() < end {
        bc.path_len = r.read_small_uint()?;
    }
    Ok(bc)
}

fn parse_key_usage(
    value: &[u8],
    critical: bool,
) -> Result<KeyUsage, X509Error> {
    let mut r = Reader::new(value);
    let (_, bytes) = r.read_bit_string_padded()?;

    let mut bits = 0u16;
    for i in 0..16 {
        let Some(&byte) = bytes.get(i / 8) else { break };
        if byte >> (7 - i % 8) & 1 != 0 {
            bits |= 1 << i;
        }
    }
    Ok(KeyUsage { bits, critical })
}
