// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A RAM-backed host environment: flash is a byte vector, target
//! memory is a window of RAM, executions are recorded.

use core::ops::Range;

use sbi_executor::{BootEnv, RegionPolicy};
use sbi_image::SbiError;

/// Base of the modeled load window.
pub const RAM_BASE: u32 = 0xC000_0000;
/// Size of the modeled load window.
pub const RAM_SIZE: u32 = 0x10_0000;

pub struct MemEnv {
    pub flash: Vec<u8>,
    pub ram: Vec<u8>,
    pub ram_base: u32,
    pub loadable: Vec<Range<u32>>,
    pub reserved: Vec<Range<u32>>,
    /// Entry points jumped to, in order.
    pub executed: Vec<u32>,
}

impl MemEnv {
    pub fn new(flash: Vec<u8>) -> Self {
        Self {
            flash,
            ram: vec![0; RAM_SIZE as usize],
            ram_base: RAM_BASE,
            loadable: vec![RAM_BASE..RAM_BASE + RAM_SIZE],
            reserved: Vec::new(),
            executed: Vec::new(),
        }
    }

    fn policy(&self) -> RegionPolicy<'_> {
        RegionPolicy {
            loadable: &self.loadable,
            reserved: &self.reserved,
        }
    }

    /// Target memory as loaded, for assertions.
    pub fn ram_at(&self, addr: u32, len: usize) -> &[u8] {
        let offset = (addr - self.ram_base) as usize;
        &self.ram[offset..offset + len]
    }
}

impl BootEnv for MemEnv {
    fn read_image(
        &mut self,
        dst: &mut [u8],
        offset: usize,
    ) -> Result<(), SbiError> {
        let end =
            offset.checked_add(dst.len()).ok_or(SbiError::ReadFailed)?;
        let src =
            self.flash.get(offset..end).ok_or(SbiError::ReadFailed)?;
        dst.copy_from_slice(src);
        Ok(())
    }

    fn check_load_address(&self, addr: u32, size: u32) -> bool {
        self.policy().check_load(addr, size)
    }

    fn check_exec_address(&self, addr: u32, size: u32, entry: u32) -> bool {
        self.policy().check_exec(addr, size, entry)
    }

    fn target(
        &mut self,
        addr: u32,
        size: u32,
    ) -> Result<&mut [u8], SbiError> {
        let offset = addr
            .checked_sub(self.ram_base)
            .ok_or(SbiError::BadLoadAddress)? as usize;
        let end = offset
            .checked_add(size as usize)
            .ok_or(SbiError::BadLoadAddress)?;
        self.ram
            .get_mut(offset..end)
            .ok_or(SbiError::BadLoadAddress)
    }

    fn execute(&mut self, entry: u32) -> Result<(), SbiError> {
        self.executed.push(entry);
        Ok(())
    }

    fn execute_noreturn(&mut self, entry: u32) -> ! {
        self.executed.push(entry);
        panic!("jumped to {entry:#010x}");
    }
}
