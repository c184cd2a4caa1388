// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The secure-boot image executor.
//!
//! A session owns the staging buffer, a snapshot of the OTP fuses and
//! the certificate-chain state for one boot attempt. Records are pulled
//! from the stream one at a time and dispatched through a small state
//! machine: the self-signed root certificate first, then intermediate
//! CAs down to one end entity, then optionally a wrapped content key,
//! then payloads. The driver loop is the same shape it has always been:
//!
//! ```ignore
//! let mut boot = SbiExecutor::new(env, &mut staging, otp, offset);
//! let status = loop {
//!     match boot.update() {
//!         Ok(Progress::Continue) | Ok(Progress::Executed) => continue,
//!         other => break other,
//!     }
//! };
//! boot.finish(status) // diverges: jumps to the payload or panics
//! ```
//!
//! [`SbiExecutor::check`] walks the stream with the same verifications
//! but commits nothing; it is the validation path used while the
//! boot-secure fuse is still clear.
//!
//! Secrets (the OTP snapshot, the wrapped content key, every derived
//! AES key) are zeroized on every exit path: `finish`, `abort`, `check`
//! completion, and drop.

#![cfg_attr(not(test), no_std)]

mod chain;
mod env;
mod kek;
mod payload;
mod region;

pub use chain::MAX_CA_CERTS;
pub use env::{BootEnv, Otp, OtpFlags};
pub use kek::{derive_kek, unwrap_cek, FIXED_IV};
pub use region::RegionPolicy;

use log::{error, info};
use zeroize::Zeroize;

use chain::Chain;
use payload::PayloadOutcome;
use sbi_image::{ImageHeader, ObjectType, Progress, SbiError, HEADER_SIZE};

enum Phase {
    ExpectRoot,
    ExpectCertOrEndEntity,
    ExpectKeyOrPayload,
    Terminated,
}

/// One boot attempt.
pub struct SbiExecutor<'a, E: BootEnv> {
    env: E,
    staging: &'a mut [u8],
    offset: usize,
    otp: Otp,
    chain: Chain,
    phase: Phase,
}

impl<'a, E: BootEnv> SbiExecutor<'a, E> {
    /// Starts a session reading the record stream at byte
    /// `image_offset`. The OTP snapshot is owned (and eventually
    /// wiped) by the session.
    pub fn new(
        env: E,
        staging: &'a mut [u8],
        otp: Otp,
        image_offset: usize,
    ) -> Self {
        Self {
            env,
            staging,
            offset: image_offset,
            otp,
            chain: Chain::new(),
            phase: Phase::ExpectRoot,
        }
    }

    /// Consumes and processes one record.
    pub fn update(&mut self) -> Result<Progress, SbiError> {
        self.step(true)
    }

    /// Walks the remaining stream performing every verification but
    /// committing nothing: no copies to load addresses, no address
    /// checks, no execution.
    ///
    /// Returns `Ok(())` when the walk reaches a no-return payload, the
    /// terminator error otherwise. The session is spent afterwards.
    pub fn check(&mut self) -> Result<(), SbiError> {
        let result = loop {
            match self.step(false) {
                Ok(Progress::Finish) => break Ok(()),
                Ok(_) => {}
                Err(e) => break Err(e),
            }
        };
        self.purge();
        result
    }

    /// Abandons the attempt: wipes secrets and refuses further work.
    pub fn abort(&mut self) {
        if !self.otp.flags().disable_log() {
            info!("boot attempt aborted");
        }
        self.purge();
    }

    /// Ends the boot attempt. For a successful stream this re-reads the
    /// final no-return record, validates its entry point, wipes all
    /// secret state and transfers control to the payload. Anything else
    /// wipes and panics with the diagnostic for `last`.
    pub fn finish(mut self, last: Result<Progress, SbiError>) -> ! {
        let quiet = self.otp.flags().disable_log();

        if let Ok(Progress::Finish) = last {
            match self.final_entry() {
                Ok(entry) => {
                    self.purge();
                    if !quiet {
                        info!("transferring control to {entry:#010x}");
                    }
                    self.env.execute_noreturn(entry)
                }
                Err(e) => {
                    self.purge();
                    if !quiet {
                        error!("secure boot failed: {}", e.describe());
                    }
                    panic!("secure boot failed: {}", e.describe());
                }
            }
        }

        self.purge();
        match last {
            Ok(p) => {
                if !quiet {
                    error!("boot ended without a bootable payload: {}", p.describe());
                }
                panic!("boot ended without a bootable payload: {}", p.describe());
            }
            Err(e) => {
                if !quiet {
                    error!("secure boot failed: {}", e.describe());
                }
                panic!("secure boot failed: {}", e.describe());
            }
        }
    }

    /// The no-return record was verified but its offset never consumed;
    /// read it back for the final jump.
    fn final_entry(&mut self) -> Result<u32, SbiError> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        self.env.read_image(&mut header_bytes, self.offset)?;
        let header = ImageHeader::read_from(&header_bytes)?;

        let load = header.load_addr.get();
        let size = header.payload_size.get();
        let entry = header.entry_addr.get();
        if !self.env.check_exec_address(load, size, entry) {
            return Err(SbiError::BadExecAddress);
        }
        Ok(entry)
    }

    fn step(&mut self, commit: bool) -> Result<Progress, SbiError> {
        if matches!(self.phase, Phase::Terminated) {
            return Err(SbiError::InvalidState);
        }

        let mut header_bytes = [0u8; HEADER_SIZE];
        self.env.read_image(&mut header_bytes, self.offset)?;
        let header = ImageHeader::read_from(&header_bytes)?;
        header.check_magic()?;

        // The self-hash pins every other header field. The skip flag
        // is a development convenience that dies once bs_en is fused.
        if self.otp.flags().bs_en() || !header.flags().skip_header_hash() {
            header.check_self_digest()?;
        }

        let otype = header.object_type()?;
        let image_size = header.image_size();
        if image_size > self.staging.len() {
            return Err(SbiError::PayloadHeaderErr);
        }
        self.env
            .read_image(&mut self.staging[..image_size], self.offset)?;

        let data_start = HEADER_SIZE + header.sign_size();
        let data_end = data_start + header.body_size();

        let progress = match otype {
            ObjectType::RootCert => match self.phase {
                Phase::ExpectRoot => {
                    self.chain.accept_root(
                        &self.staging[data_start..data_end],
                        &self.otp.root_hash,
                    )?;
                    self.phase = Phase::ExpectCertOrEndEntity;
                    Progress::Continue
                }
                _ => return Err(SbiError::RootCertIsNotFirst),
            },

            ObjectType::NonRootCert => match self.phase {
                Phase::ExpectRoot => {
                    return Err(SbiError::NonRootCertIsFirst)
                }
                Phase::ExpectCertOrEndEntity => {
                    let end_entity = self.chain.accept_non_root(
                        &self.staging[data_start..data_end],
                        header.cert_id.get(),
                    )?;
                    if end_entity {
                        self.phase = Phase::ExpectKeyOrPayload;
                    }
                    Progress::Continue
                }
                // The end entity terminates certificate processing.
                _ => return Err(SbiError::NonRootCertX509Err),
            },

            ObjectType::EncryptionKey => match self.phase {
                Phase::ExpectRoot => {
                    return Err(SbiError::RootCertIsNotFirst)
                }
                Phase::ExpectKeyOrPayload => {
                    let (sig, data) = (
                        &self.staging[HEADER_SIZE..data_start],
                        &self.staging[data_start..data_end],
                    );
                    self.chain.accept_encryption_key(&header, sig, data)?;
                    Progress::Continue
                }
                _ => return Err(SbiError::EncKeyBadCertChain),
            },

            ObjectType::PayloadNoReturn
            | ObjectType::PayloadWithReturn
            | ObjectType::PayloadNoExec => match self.phase {
                Phase::ExpectRoot => {
                    return Err(SbiError::RootCertIsNotFirst)
                }
                Phase::ExpectKeyOrPayload => {
                    let outcome = payload::handle(
                        &mut self.env,
                        &self.chain,
                        &self.otp,
                        &header,
                        &self.staging[..image_size],
                        commit,
                    )?;
                    match outcome {
                        PayloadOutcome::Loaded => Progress::Continue,
                        PayloadOutcome::Executed => Progress::Executed,
                        PayloadOutcome::Finish => Progress::Finish,
                    }
                }
                _ => return Err(SbiError::PayloadBadCertChain),
            },
        };

        if matches!(progress, Progress::Finish) {
            // Leave the record un-consumed for `finish` and accept no
            // further records.
            if commit {
                self.phase = Phase::Terminated;
            }
        } else {
            self.offset += image_size;
        }
        Ok(progress)
    }

    fn purge(&mut self) {
        self.chain.purge();
        self.otp.zeroize();
        self.phase = Phase::Terminated;
    }
}

impl<E: BootEnv> Drop for SbiExecutor<'_, E> {
    fn drop(&mut self) {
        self.purge();
    }
}
