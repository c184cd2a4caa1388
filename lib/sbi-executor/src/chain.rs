// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Certificate-chain state for one boot attempt.
//!
//! The chain is anchored at a self-signed root whose whole-certificate
//! SHA-256 must match the OTP fuses, followed by intermediate CAs and
//! terminated by exactly one end-entity certificate. Certificates live
//! in a fixed array; a parent is an index into it, never a pointer.
//! The end entity occupies the slot at the current count but is not
//! counted as a signer.

use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

use sbi_image::{ImageHeader, SbiError, AES_KEY_LEN, SHA_DIGEST_LEN};
use sbi_x509::{Certificate, X509Error};

/// Capacity of the intermediate-certificate array.
pub const MAX_CA_CERTS: usize = 4;

/// The wrapped content-encryption key accepted from an ENCRYPTION_KEY
/// record. Wiped on drop and on every purge.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct EncKey {
    pub key: [u8; AES_KEY_LEN],
    pub index: u16,
}

/// Back-link from a certificate to its signer: the root slot or an
/// index into the intermediate array.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Signer {
    Root,
    Slot(u8),
}

pub(crate) struct Chain {
    root: Option<Certificate>,
    slots: [Option<Certificate>; MAX_CA_CERTS],
    cert_ids: [u32; MAX_CA_CERTS],
    /// Accepted signing (CA) certificates; the end entity is not
    /// counted.
    count: usize,
    end_entity_seen: bool,
    encrypted_key: Option<EncKey>,
}

/// Maps parser errors onto the boot status vocabulary: capacity
/// exhaustion is an allocation failure, anything else is the caller's
/// X.509 code.
fn cert_err(e: X509Error, fallback: SbiError) -> SbiError {
    match e {
        X509Error::Capacity => SbiError::MallocErr,
        _ => fallback,
    }
}

impl Chain {
    pub fn new() -> Self {
        Self {
            root: None,
            slots: [None, None, None, None],
            cert_ids: [0; MAX_CA_CERTS],
            count: 0,
            end_entity_seen: false,
            encrypted_key: None,
        }
    }

    /// The end-entity certificate, once one has been accepted. Its key
    /// verifies payload and encryption-key signatures.
    pub fn leaf(&self) -> Option<&Certificate> {
        if self.end_entity_seen {
            self.slots[self.count].as_ref()
        } else {
            None
        }
    }

    pub fn encrypted_key(&self) -> Option<&EncKey> {
        self.encrypted_key.as_ref()
    }

    /// Accepts the stream's first record: the self-signed trust anchor.
    pub fn accept_root(
        &mut self,
        der: &[u8],
        root_hash: &[u8; SHA_DIGEST_LEN],
    ) -> Result<(), SbiError> {
        let cert = Certificate::parse(der)
            .map_err(|e| cert_err(e, SbiError::RootCertX509Err))?;

        if !cert.is_self_signed() {
            return Err(SbiError::RootCertX509Err);
        }
        check_constraints(&cert, 0)
            .map_err(|_| SbiError::RootCertX509Err)?;
        cert.verify_signature(&cert.key)
            .map_err(|_| SbiError::RootCertX509Err)?;

        if cert.cert_digest != *root_hash {
            return Err(SbiError::RootCertBadHash);
        }

        self.root = Some(cert);
        Ok(())
    }

    /// Accepts an intermediate CA or the end-entity certificate.
    /// Returns true when the new certificate is the end entity.
    pub fn accept_non_root(
        &mut self,
        der: &[u8],
        cert_id: u32,
    ) -> Result<bool, SbiError> {
        if self.count >= MAX_CA_CERTS {
            return Err(SbiError::NonRootCertTooMuchCerts);
        }
        for &seen in &self.cert_ids[..self.count] {
            if seen == cert_id {
                return Err(SbiError::NonRootCertX509Err);
            }
        }

        let cert = Certificate::parse(der)
            .map_err(|e| cert_err(e, SbiError::NonRootCertX509Err))?;

        let parent_ref = self
            .find_parent(&cert)
            .ok_or(SbiError::NonRootCertX509Err)?;
        let parent = self
            .signer(parent_ref)
            .ok_or(SbiError::NonRootCertX509Err)?;

        // The signer's key usage, if stated, must allow certificate
        // signing.
        if let Some(ku) = parent.key_usage {
            if !ku.key_cert_sign() {
                return Err(SbiError::NonRootCertX509Err);
            }
        }
        check_constraints(&cert, self.count)
            .map_err(|_| SbiError::NonRootCertX509Err)?;
        cert.verify_signature(&parent.key)
            .map_err(|_| SbiError::NonRootCertX509Err)?;

        let is_end_entity = !cert.is_ca();
        self.cert_ids[self.count] = cert_id;
        self.slots[self.count] = Some(cert);
        if is_end_entity {
            self.end_entity_seen = true;
        } else {
            self.count += 1;
        }
        Ok(is_end_entity)
    }

    /// Looks a signer reference back up.
    fn signer(&self, s: Signer) -> Option<&Certificate> {
        match s {
            Signer::Root => self.root.as_ref(),
            Signer::Slot(i) => self.slots[i as usize].as_ref(),
        }
    }

    /// Accepts an ENCRYPTION_KEY record: the wrapped content key plus a
    /// signature made by a previously accepted certificate.
    pub fn accept_encryption_key(
        &mut self,
        header: &ImageHeader,
        signature: &[u8],
        data: &[u8],
    ) -> Result<(), SbiError> {
        // Key records must always carry a signature.
        if !header.flags().signed() {
            return Err(SbiError::EncKeyIsNotSigned);
        }
        if data.len() != AES_KEY_LEN {
            return Err(SbiError::EncKeyBadHash);
        }

        let signer = self.resolve_signer(header.sign_cert_id.get())?;
        let digest: [u8; SHA_DIGEST_LEN] = Sha256::digest(data).into();
        signer
            .key
            .verify_digest(&digest, signature)
            .map_err(|_| SbiError::EncKeyBadSignature)?;

        let mut key = [0; AES_KEY_LEN];
        key.copy_from_slice(data);
        self.encrypted_key = Some(EncKey {
            key,
            index: header.key_index.get() as u16,
        });
        Ok(())
    }

    /// Finds the accepted certificate carrying `cert_id`. The end
    /// entity is eligible.
    fn resolve_signer(
        &self,
        sign_cert_id: u32,
    ) -> Result<&Certificate, SbiError> {
        let occupied = self.count + usize::from(self.end_entity_seen);
        for i in 0..occupied {
            if self.cert_ids[i] == sign_cert_id {
                return self.slots[i]
                    .as_ref()
                    .ok_or(SbiError::EncKeyNoCertChain);
            }
        }
        Err(SbiError::EncKeyNoCertChain)
    }

    /// Resolves the issuer of `cert`: the root wins on a DN match,
    /// otherwise the most recently accepted intermediate whose subject
    /// matches.
    fn find_parent(&self, cert: &Certificate) -> Option<Signer> {
        if let Some(root) = &self.root {
            if root.subject == cert.issuer {
                return Some(Signer::Root);
            }
        }
        for i in (0..self.count).rev() {
            if let Some(ca) = &self.slots[i] {
                if ca.subject == cert.issuer {
                    return Some(Signer::Slot(i as u8));
                }
            }
        }
        None
    }

    /// Drops every certificate and wipes the wrapped key.
    pub fn purge(&mut self) {
        self.root = None;
        for slot in &mut self.slots {
            *slot = None;
        }
        self.cert_ids.zeroize();
        self.count = 0;
        self.end_entity_seen = false;
        self.encrypted_key = None;
    }

    #[cfg(test)]
    pub fn secrets_cleared(&self) -> bool {
        self.encrypted_key.is_none()
    }

    #[cfg(test)]
    pub fn inject_encrypted_key(&mut self, key: [u8; AES_KEY_LEN], index: u16) {
        self.encrypted_key = Some(EncKey { key, index });
    }
}

/// The BasicConstraints/KeyUsage consistency checks applied to a
/// certificate joining a chain that already has `path_len` signers.
fn check_constraints(
    cert: &Certificate,
    path_len: usize,
) -> Result<(), X509Error> {
    let Some(bc) = cert.basic_constraints else {
        return Ok(());
    };

    // A non-CA certificate must not claim the KeyCertSign usage.
    if !bc.ca {
        if let Some(ku) = cert.key_usage {
            if ku.key_cert_sign() {
                return Err(X509Error::BasicConstraint);
            }
        }
    }

    // pathLenConstraint bounds how deep below this CA the chain may
    // grow; joining at depth `path_len` requires constraint + 1 >=
    // path_len.
    let signs_certs = cert
        .key_usage
        .map(|ku| ku.key_cert_sign())
        .unwrap_or(true);
    if bc.ca
        && signs_certs
        && (bc.path_len as usize + 1) < path_len
    {
        return Err(X509Error::BasicConstraint);
    }
    Ok(())
}
