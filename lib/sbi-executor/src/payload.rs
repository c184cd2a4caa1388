// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Payload records: copy to the load address, then verify, decrypt and
//! digest-check in the order the header flags dictate.
//!
//! In commit mode the body is copied to its load target first and every
//! operation runs in place there; if anything fails, the target region
//! is wiped before the error propagates. The dry-run mode performs the
//! same checks against the staging buffer without touching target
//! memory; plaintext digests of encrypted bodies are then derived by
//! decrypting one block at a time into a scratch block, so plaintext is
//! never materialized anywhere.

use aes::cipher::{BlockModeDecrypt, KeyIvInit};
use aes::{Aes128, Block};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use sbi_image::{
    ImageHeader, ObjectType, SbiError, AES_BLOCK_LEN, AES_KEY_LEN,
    HEADER_SIZE, SHA_DIGEST_LEN,
};
use sbi_x509::Certificate;

use crate::chain::Chain;
use crate::env::{BootEnv, Otp};
use crate::kek::{unwrap_cek, FIXED_IV};

pub(crate) enum PayloadOutcome {
    /// Data is in place; nothing was executed.
    Loaded,
    /// A with-return payload ran and came back.
    Executed,
    /// A no-return payload is verified and loaded; the jump happens in
    /// `finish`.
    Finish,
}

#[derive(Copy, Clone)]
enum Act {
    VerifyCipher,
    VerifyPlain,
    Decrypt,
    DigestPlain,
}

pub(crate) fn handle<E: BootEnv>(
    env: &mut E,
    chain: &Chain,
    otp: &Otp,
    header: &ImageHeader,
    staged: &[u8],
    commit: bool,
) -> Result<PayloadOutcome, SbiError> {
    let flags = header.flags();
    let otype = header.object_type()?;
    let leaf = chain.leaf().ok_or(SbiError::PayloadBadCertChain)?;

    if otp.flags().force_sign() && !flags.signed() {
        return Err(SbiError::PayloadIsNotSigned);
    }
    if otp.flags().force_encrypt() && !flags.encrypted() {
        return Err(SbiError::PayloadIsNotEncrypted);
    }

    let sign_size = header.sign_size();
    let body_len = header.body_size();
    let signature = &staged[HEADER_SIZE..HEADER_SIZE + sign_size];
    let body =
        &staged[HEADER_SIZE + sign_size..HEADER_SIZE + sign_size + body_len];

    // Which operations run, and in what order, is a pure function of
    // the flags. A payload that is neither signed nor digest-checked
    // has no integrity at all and is rejected.
    let ops: &[Act] = match (
        flags.encrypted(),
        flags.sign_of_encrypted(),
        flags.signed(),
        flags.checksum(),
    ) {
        (false, _, true, _) => &[Act::VerifyPlain],
        (false, _, false, true) => &[Act::DigestPlain],
        (true, false, true, _) => &[Act::Decrypt, Act::VerifyPlain],
        (true, false, false, true) => &[Act::Decrypt, Act::DigestPlain],
        (true, true, true, false) => &[Act::VerifyCipher, Act::Decrypt],
        (true, true, true, true) => {
            &[Act::VerifyCipher, Act::Decrypt, Act::DigestPlain]
        }
        _ => return Err(SbiError::PayloadIsNotSigned),
    };

    if !commit {
        dry_run(chain, otp, header, leaf, signature, body, ops)?;
        return Ok(match otype {
            ObjectType::PayloadNoReturn => PayloadOutcome::Finish,
            _ => PayloadOutcome::Loaded,
        });
    }

    let load_addr = header.load_addr.get();
    let payload_size = header.payload_size.get();
    if !env.check_load_address(load_addr, payload_size) {
        return Err(SbiError::BadLoadAddress);
    }

    let target = env.target(load_addr, body_len as u32)?;
    target.copy_from_slice(body);
    if let Err(e) =
        run_ops(chain, otp, header, leaf, signature, &mut *target, ops)
    {
        target.zeroize();
        return Err(e);
    }

    match otype {
        ObjectType::PayloadNoExec => Ok(PayloadOutcome::Loaded),
        ObjectType::PayloadNoReturn => Ok(PayloadOutcome::Finish),
        ObjectType::PayloadWithReturn => {
            let entry = header.entry_addr.get();
            if !env.check_exec_address(load_addr, payload_size, entry) {
                env.target(load_addr, body_len as u32)?.zeroize();
                return Err(SbiError::BadExecAddress);
            }
            env.execute(entry)?;
            Ok(PayloadOutcome::Executed)
        }
        _ => Err(SbiError::ImageBadType),
    }
}

/// Runs the operation chain in place at the load target.
fn run_ops(
    chain: &Chain,
    otp: &Otp,
    header: &ImageHeader,
    leaf: &Certificate,
    signature: &[u8],
    target: &mut [u8],
    ops: &[Act],
) -> Result<(), SbiError> {
    let data_size = header.payload_size.get() as usize;
    let cipher_size = header.cipher_size();

    for op in ops {
        match op {
            Act::VerifyCipher => {
                let digest: [u8; SHA_DIGEST_LEN] =
                    Sha256::digest(&target[..cipher_size]).into();
                leaf.key
                    .verify_digest(&digest, signature)
                    .map_err(|_| SbiError::PayloadBadSignature)?;
            }
            Act::VerifyPlain => {
                let digest: [u8; SHA_DIGEST_LEN] =
                    Sha256::digest(&target[..data_size]).into();
                leaf.key
                    .verify_digest(&digest, signature)
                    .map_err(|_| SbiError::PayloadBadSignature)?;
            }
            Act::Decrypt => {
                let mut cek = content_key(chain, otp)?;
                cbc_decrypt_in_place(&cek, &mut target[..cipher_size]);
                cek.zeroize();
            }
            Act::DigestPlain => {
                let digest: [u8; SHA_DIGEST_LEN] =
                    Sha256::digest(&target[..data_size]).into();
                if digest != header.payload_digest {
                    return Err(SbiError::PayloadBadHash);
                }
            }
        }
    }
    Ok(())
}

/// The same checks without a load target: signatures and digests are
/// computed from the staging buffer, decryption happens only inside the
/// one-block scratch of [`streamed_plain_digest`].
fn dry_run(
    chain: &Chain,
    otp: &Otp,
    header: &ImageHeader,
    leaf: &Certificate,
    signature: &[u8],
    body: &[u8],
    ops: &[Act],
) -> Result<(), SbiError> {
    let encrypted = header.flags().encrypted();
    let data_size = header.payload_size.get() as usize;
    let cipher_size = header.cipher_size();

    let plain_digest = || -> Result<[u8; SHA_DIGEST_LEN], SbiError> {
        if encrypted {
            streamed_plain_digest(chain, otp, &body[..cipher_size], data_size)
        } else {
            Ok(Sha256::digest(&body[..data_size]).into())
        }
    };

    for op in ops {
        match op {
            Act::VerifyCipher => {
                let digest: [u8; SHA_DIGEST_LEN] =
                    Sha256::digest(&body[..cipher_size]).into();
                leaf.key
                    .verify_digest(&digest, signature)
                    .map_err(|_| SbiError::PayloadBadSignature)?;
            }
            Act::VerifyPlain => {
                let digest = plain_digest()?;
                leaf.key
                    .verify_digest(&digest, signature)
                    .map_err(|_| SbiError::PayloadBadSignature)?;
            }
            Act::Decrypt => {}
            Act::DigestPlain => {
                let digest = plain_digest()?;
                if digest != header.payload_digest {
                    return Err(SbiError::PayloadBadHash);
                }
            }
        }
    }
    Ok(())
}

/// Unwraps the content key accepted earlier in the stream.
fn content_key(
    chain: &Chain,
    otp: &Otp,
) -> Result<[u8; AES_KEY_LEN], SbiError> {
    let wrapped =
        chain.encrypted_key().ok_or(SbiError::EncKeyNoCertChain)?;
    Ok(unwrap_cek(&otp.duk, &otp.serial, wrapped.index, &wrapped.key))
}

/// CBC decryption in place; `buf` is always a whole number of blocks by
/// construction of the record sizes.
fn cbc_decrypt_in_place(key: &[u8; AES_KEY_LEN], buf: &mut [u8]) {
    let mut dec =
        cbc::Decryptor::<Aes128>::new(key.into(), (&FIXED_IV).into());
    for block in buf.chunks_exact_mut(AES_BLOCK_LEN) {
        dec.decrypt_block(Block::from_mut_slice(block));
    }
}

/// SHA-256 of the plaintext of `cipher`, truncated to `plain_len`
/// bytes, computed through a single scratch block.
fn streamed_plain_digest(
    chain: &Chain,
    otp: &Otp,
    cipher: &[u8],
    plain_len: usize,
) -> Result<[u8; SHA_DIGEST_LEN], SbiError> {
    let mut cek = content_key(chain, otp)?;
    let mut dec =
        cbc::Decryptor::<Aes128>::new((&cek).into(), (&FIXED_IV).into());
    cek.zeroize();

    let mut hash = Sha256::new();
    let mut scratch = [0u8; AES_BLOCK_LEN];
    let mut remaining = plain_len;
    for block in cipher.chunks(AES_BLOCK_LEN) {
        dec.decrypt_block_b2b(
            Block::from_slice(block),
            Block::from_mut_slice(&mut scratch),
        );
        let take = remaining.min(AES_BLOCK_LEN);
        hash.update(&scratch[..take]);
        remaining -= take;
    }
    scratch.zeroize();
    Ok(hash.finalize().into())
}
