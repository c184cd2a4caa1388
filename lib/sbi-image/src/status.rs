// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Status vocabulary shared by the record codec and the executor.

/// Successful outcomes of consuming one record.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Progress {
    /// The record was accepted; keep pulling records.
    Continue,
    /// A with-return payload was executed and came back.
    Executed,
    /// A no-return payload is staged; `finish` performs the jump.
    Finish,
}

impl Progress {
    pub fn code(self) -> u32 {
        match self {
            Self::Continue => 0,
            Self::Finish => 1,
            Self::Executed => 2,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::Continue => "No Error",
            Self::Finish => "Load finished",
            Self::Executed => "Load continue",
        }
    }
}

/// Everything that can stop a boot attempt.
///
/// The first group is the record/chain/policy vocabulary reported to the
/// diagnostic console; the second group covers failures of the host
/// callbacks and misuse of a terminated session.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SbiError {
    ImageBadHeaderId,
    ImageBadHeaderHash,
    ImageBadType,
    RootCertIsNotFirst,
    RootCertX509Err,
    RootCertBadHash,
    RootCertRevoked,
    NonRootCertTooMuchCerts,
    NonRootCertIsFirst,
    NonRootCertX509Err,
    EncKeyBadCertChain,
    EncKeyNoCertChain,
    EncKeyIsNotSigned,
    EncKeyBadHash,
    EncKeyBadSignature,
    PayloadHeaderErr,
    PayloadBadCertChain,
    PayloadNoCertChain,
    PayloadIsNotSigned,
    PayloadIsNotEncrypted,
    PayloadBadHash,
    PayloadBadSignature,
    PayloadBadFwCounter,
    MallocErr,

    /// The stream reader failed to produce the requested bytes.
    ReadFailed,
    /// The load-address predicate rejected the target region.
    BadLoadAddress,
    /// The exec-address predicate rejected the entry point.
    BadExecAddress,
    /// Operation not allowed in the current session state.
    InvalidState,
}

impl SbiError {
    pub fn code(self) -> u32 {
        match self {
            Self::ImageBadHeaderId => 3,
            Self::ImageBadHeaderHash => 4,
            Self::ImageBadType => 5,
            Self::RootCertIsNotFirst => 6,
            Self::RootCertX509Err => 7,
            Self::RootCertBadHash => 8,
            Self::RootCertRevoked => 9,
            Self::NonRootCertTooMuchCerts => 10,
            Self::NonRootCertIsFirst => 11,
            Self::NonRootCertX509Err => 12,
            Self::EncKeyBadCertChain => 13,
            Self::EncKeyNoCertChain => 14,
            Self::EncKeyIsNotSigned => 15,
            Self::EncKeyBadHash => 16,
            Self::EncKeyBadSignature => 17,
            Self::PayloadHeaderErr => 18,
            Self::PayloadBadCertChain => 19,
            Self::PayloadNoCertChain => 20,
            Self::PayloadIsNotSigned => 21,
            Self::PayloadIsNotEncrypted => 22,
            Self::PayloadBadHash => 23,
            Self::PayloadBadSignature => 24,
            Self::PayloadBadFwCounter => 25,
            Self::MallocErr => 26,
            Self::ReadFailed => 64,
            Self::BadLoadAddress => 65,
            Self::BadExecAddress => 66,
            Self::InvalidState => 67,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::ImageBadHeaderId => "Incorrect header id",
            Self::ImageBadHeaderHash => "Incorrect header hash",
            Self::ImageBadType => "Incorrect type",
            Self::RootCertIsNotFirst => "Root certificate isn't first",
            Self::RootCertX509Err => "X.509 error",
            Self::RootCertBadHash => "Incorrect hash of root certificate",
            Self::RootCertRevoked => "Root certificate revoked",
            Self::NonRootCertTooMuchCerts => {
                "Intermediate certificates number is too much"
            }
            Self::NonRootCertIsFirst => "Intermediate certificate is first",
            Self::NonRootCertX509Err => {
                "Intermediate certificate X.509 error"
            }
            Self::EncKeyBadCertChain => {
                "Encryption key: incorrect chain of certificates"
            }
            Self::EncKeyNoCertChain => {
                "Encryption key: certificate is missed in chain"
            }
            Self::EncKeyIsNotSigned => "Encryption key: isn't signed",
            Self::EncKeyBadHash => "Encryption key: incorrect hash",
            Self::EncKeyBadSignature => "Encryption key: incorrect signature",
            Self::PayloadHeaderErr => "Payload: incorrect header",
            Self::PayloadBadCertChain => {
                "Payload: incorrect chain of certificates"
            }
            Self::PayloadNoCertChain => {
                "Payload: certificate is missed in chain"
            }
            Self::PayloadIsNotSigned => "Payload: isn't signed",
            Self::PayloadIsNotEncrypted => "Payload: isn't encrypted",
            Self::PayloadBadHash => "Payload: incorrect hash",
            Self::PayloadBadSignature => "Payload: incorrect signature",
            Self::PayloadBadFwCounter => "Payload: incorrect firmware counter",
            Self::MallocErr => "Memory allocation error",
            Self::ReadFailed => "Image read failed",
            Self::BadLoadAddress => "Bad load address",
            Self::BadExecAddress => "Bad entry address",
            Self::InvalidState => {
                "Invalid state, operation disallowed in this state"
            }
        }
    }
}
