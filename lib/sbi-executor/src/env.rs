// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! What the executor needs from the platform: the OTP snapshot and the
//! host capability trait.

use sbi_image::SbiError;
use zeroize::Zeroize;

/// OTP policy bits.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct OtpFlags(pub u16);

impl OtpFlags {
    pub const FORCE_SIGN: u16 = 1 << 0;
    pub const FORCE_ENCRYPT: u16 = 1 << 1;
    pub const BS_EN: u16 = 1 << 2;
    pub const DISABLE_LOG: u16 = 1 << 3;
    pub const ENABLE_WATCHDOG: u16 = 1 << 4;

    /// Every payload and encryption-key record must be signed.
    pub fn force_sign(self) -> bool {
        self.0 & Self::FORCE_SIGN != 0
    }

    /// Every payload must be encrypted.
    pub fn force_encrypt(self) -> bool {
        self.0 & Self::FORCE_ENCRYPT != 0
    }

    /// Boot-secure-enable: header self-hashes are always verified,
    /// whatever the record's skip flag says.
    pub fn bs_en(self) -> bool {
        self.0 & Self::BS_EN != 0
    }

    pub fn disable_log(self) -> bool {
        self.0 & Self::DISABLE_LOG != 0
    }

    pub fn enable_watchdog(self) -> bool {
        self.0 & Self::ENABLE_WATCHDOG != 0
    }
}

/// Read-once snapshot of the OTP fuse block.
///
/// The executor owns a copy for the duration of a boot attempt and
/// zeroizes it (the DUK in particular) on every exit path.
#[derive(Clone, Default, Zeroize)]
pub struct Otp {
    /// Device serial number, mixed into KEK derivation.
    pub serial: [u8; 4],
    /// Device-unique AES key.
    pub duk: [u8; 16],
    /// SHA-256 of the only acceptable root certificate.
    pub root_hash: [u8; 32],
    /// Policy bits, see [`OtpFlags`].
    pub flags: u16,
    /// Anti-rollback counter. Read here; updating it is the platform's
    /// job.
    pub fw_counter: u32,
}

impl Otp {
    pub fn flags(&self) -> OtpFlags {
        OtpFlags(self.flags)
    }
}

/// Host services the executor is parameterized over.
///
/// The boot ROM wires these to the flash driver, the platform's memory
/// map and a bare jump; tests wire them to RAM fakes.
pub trait BootEnv {
    /// Reads exactly `dst.len()` bytes of the boot stream starting at
    /// byte `offset`.
    fn read_image(
        &mut self,
        dst: &mut [u8],
        offset: usize,
    ) -> Result<(), SbiError>;

    /// Whether `[addr, addr + size)` may be used as a load target.
    fn check_load_address(&self, addr: u32, size: u32) -> bool;

    /// Whether `entry` is a valid entry point for an image loaded at
    /// `[addr, addr + size)`.
    fn check_exec_address(&self, addr: u32, size: u32, entry: u32) -> bool;

    /// Mutable view of target memory at `addr`. Only called for
    /// regions that passed [`Self::check_load_address`].
    fn target(
        &mut self,
        addr: u32,
        size: u32,
    ) -> Result<&mut [u8], SbiError>;

    /// Transfers control to `entry` as a plain call that returns.
    fn execute(&mut self, entry: u32) -> Result<(), SbiError>;

    /// Transfers control to `entry`, never to return.
    fn execute_noreturn(&mut self, entry: u32) -> !;
}

impl<T: BootEnv + ?Sized> BootEnv for &mut T {
    fn read_image(
        &mut self,
        dst: &mut [u8],
        offset: usize,
    ) -> Result<(), SbiError> {
        (**self).read_image(dst, offset)
    }

    fn check_load_address(&self, addr: u32, size: u32) -> bool {
        (**self).check_load_address(addr, size)
    }

    fn check_exec_address(&self, addr: u32, size: u32, entry: u32) -> bool {
        (**self).check_exec_address(addr, size, entry)
    }

    fn target(
        &mut self,
        addr: u32,
        size: u32,
    ) -> Result<&mut [u8], SbiError> {
        (**self).target(addr, size)
    }

    fn execute(&mut self, entry: u32) -> Result<(), SbiError> {
        (**self).execute(entry)
    }

    fn execute_noreturn(&mut self, entry: u32) -> ! {
        (**self).execute_noreturn(entry)
    }
}
