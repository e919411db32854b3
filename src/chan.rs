use crate::err::MemoryError;
use crate::mem::MainStore;

use log::{debug, warn};

///
/// Channel address translation.
///
/// Devices address memory through one of two maps. The Data Channel (DCH)
/// map is a single-level table of 512 slots; the Burst Multiplexor Channel
/// (BMC) map is a 1024-slot table addressed as 32 translation tables of 32
/// entries. Each slot occupies two consecutive 16-bit registers, high word
/// first, and names a 1 KW physical page.
///

pub const BMC_REGS: usize = 2048;
pub const DCH_REGS: usize = 1024;
pub const BMC_SLOTS: usize = BMC_REGS / 2;
pub const DCH_SLOTS: usize = DCH_REGS / 2;

// Unified register numbering used by CIO and CIOI.
pub const FIRST_BMC_REG: u16 = 0o0000;
pub const FIRST_DCH_REG: u16 = 0o4000;
pub const IOCDR_REG: u16 = 0o7700;
pub const IOC_STATUS_REG: u16 = 0o7701;
pub const IOC_MASK_REG: u16 = 0o7702;

/// IOCDR bit enabling DCH translation.
pub const IOCDR_DCH_MAPPING: u16 = 0x0002;

const PAGE_SHIFT: u32 = 10;
const PAGE_OFFSET_MASK: u32 = 0x3ff;
const BMC_PHYSICAL: u32 = 1 << 20;

#[derive(Debug)]
pub struct ChannelMap {
    bmc: Vec<u16>,
    dch: Vec<u16>,
    iocdr: u16,
    status: u16,
    mask: u16,
}

impl Default for ChannelMap {
    fn default() -> Self {
        ChannelMap::new()
    }
}

impl ChannelMap {
    pub fn new() -> ChannelMap {
        ChannelMap {
            bmc: vec![0; BMC_REGS],
            dch: vec![0; DCH_REGS],
            iocdr: 0,
            status: 0,
            mask: 0,
        }
    }

    pub fn reset(&mut self) {
        for reg in self.bmc.iter_mut().chain(self.dch.iter_mut()) {
            *reg = 0;
        }
        self.iocdr = 0;
        self.status = 0;
        self.mask = 0;
    }

    pub fn dch_mode(&self) -> bool {
        self.iocdr & IOCDR_DCH_MAPPING != 0
    }

    /// Read a map register by its unified number.
    pub fn read_reg(&self, reg: u16) -> u16 {
        let r = reg as usize;
        match reg {
            0o0000..=0o3777 => self.bmc[r],
            0o4000..=0o5777 => self.dch[r - FIRST_DCH_REG as usize],
            IOCDR_REG => self.iocdr,
            IOC_STATUS_REG => self.status,
            IOC_MASK_REG => self.mask,
            _ => {
                warn!("CHAN read of unknown map register {:#o}", reg);
                0
            }
        }
    }

    /// Write a map register by its unified number.
    pub fn write_reg(&mut self, reg: u16, val: u16) {
        let r = reg as usize;
        debug!("CHAN register {:#o} <- {:#06x}", reg, val);
        match reg {
            0o0000..=0o3777 => self.bmc[r] = val,
            0o4000..=0o5777 => self.dch[r - FIRST_DCH_REG as usize] = val,
            IOCDR_REG => self.iocdr = val,
            IOC_STATUS_REG => self.status = val,
            IOC_MASK_REG => self.mask = val,
            _ => warn!("CHAN write of unknown map register {:#o} ignored", reg),
        }
    }

    /// Fetch a 32-bit map slot. Slots 0..1023 are BMC, 1024..1535 are DCH.
    pub fn slot(&self, slot: usize) -> u32 {
        match self.slot_regs(slot) {
            Some((regs, n)) => u32::from(regs[2 * n]) << 16 | u32::from(regs[2 * n + 1]),
            None => {
                warn!("CHAN read of nonexistent map slot {}", slot);
                0
            }
        }
    }

    pub fn set_slot(&mut self, slot: usize, val: u32) {
        let (regs, n) = if slot < BMC_SLOTS {
            (&mut self.bmc, slot)
        } else if slot < BMC_SLOTS + DCH_SLOTS {
            (&mut self.dch, slot - BMC_SLOTS)
        } else {
            warn!("CHAN write of nonexistent map slot {} ignored", slot);
            return;
        };
        regs[2 * n] = (val >> 16) as u16;
        regs[2 * n + 1] = val as u16;
    }

    fn slot_regs(&self, slot: usize) -> Option<(&Vec<u16>, usize)> {
        if slot < BMC_SLOTS {
            Some((&self.bmc, slot))
        } else if slot < BMC_SLOTS + DCH_SLOTS {
            Some((&self.dch, slot - BMC_SLOTS))
        } else {
            None
        }
    }

    pub fn bmc_slot(&self, n: usize) -> u32 {
        self.slot(n)
    }

    pub fn dch_slot(&self, n: usize) -> u32 {
        self.slot(BMC_SLOTS + n)
    }

    /// Translate a DCH address. Pass-through unless DCH mapping is enabled.
    pub fn resolve_dch(&self, addr: u32) -> u32 {
        if !self.dch_mode() {
            return addr;
        }
        let slot = ((addr >> PAGE_SHIFT) as usize) & (DCH_SLOTS - 1);
        let offset = addr & PAGE_OFFSET_MASK;
        page_base(&self.dch, slot) | offset
    }

    /// Translate a 21-bit BMC address.
    pub fn resolve_bmc(&self, addr: u32) -> u32 {
        if addr & BMC_PHYSICAL != 0 {
            // Bank, extended channel address and channel address concatenate
            // directly into the physical address.
            return addr & 0xfffff;
        }
        let tt = (addr >> 15) & 0x1f;
        let ttr = (addr >> 10) & 0x1f;
        let slot = (tt << 5 | ttr) as usize;
        let offset = addr & PAGE_OFFSET_MASK;
        page_base(&self.bmc, slot) | offset
    }
}

fn page_base(regs: &[u16], slot: usize) -> u32 {
    let hi = u32::from(regs[2 * slot]);
    let lo = u32::from(regs[2 * slot + 1]);
    let page = (hi & 0x1f) << 16 | lo;
    page << PAGE_SHIFT
}

///
/// A device's view of memory during a channel transfer.
///
/// Device address fields are plain integers owned by the device; the block
/// helpers advance them past the words moved.
///
pub struct Dma<'a> {
    mem: &'a mut MainStore,
    map: &'a ChannelMap,
}

impl<'a> Dma<'a> {
    pub fn new(mem: &'a mut MainStore, map: &'a ChannelMap) -> Dma<'a> {
        Dma { mem, map }
    }

    pub fn map(&self) -> &ChannelMap {
        self.map
    }

    pub fn read_word_dch(&self, addr: u32) -> Result<u16, MemoryError> {
        self.mem.read_word(self.map.resolve_dch(addr))
    }

    pub fn write_word_dch(&mut self, addr: u32, val: u16) -> Result<(), MemoryError> {
        self.mem.write_word(self.map.resolve_dch(addr), val)
    }

    pub fn read_word_bmc(&self, addr: u32) -> Result<u16, MemoryError> {
        self.mem.read_word(self.map.resolve_bmc(addr))
    }

    pub fn write_word_bmc(&mut self, addr: u32, val: u16) -> Result<(), MemoryError> {
        self.mem.write_word(self.map.resolve_bmc(addr), val)
    }

    /// Copy words from memory into `buf`, starting at `*addr`.
    pub fn dch_read_block(&self, addr: &mut u32, buf: &mut [u16]) -> Result<(), MemoryError> {
        for word in buf.iter_mut() {
            *word = self.read_word_dch(*addr)?;
            *addr = addr.wrapping_add(1);
        }
        Ok(())
    }

    pub fn dch_write_block(&mut self, addr: &mut u32, words: &[u16]) -> Result<(), MemoryError> {
        for word in words {
            self.write_word_dch(*addr, *word)?;
            *addr = addr.wrapping_add(1);
        }
        Ok(())
    }

    pub fn bmc_read_block(&self, addr: &mut u32, buf: &mut [u16]) -> Result<(), MemoryError> {
        for word in buf.iter_mut() {
            *word = self.read_word_bmc(*addr)?;
            *addr = addr.wrapping_add(1);
        }
        Ok(())
    }

    pub fn bmc_write_block(&mut self, addr: &mut u32, words: &[u16]) -> Result<(), MemoryError> {
        for word in words {
            self.write_word_bmc(*addr, *word)?;
            *addr = addr.wrapping_add(1);
        }
        Ok(())
    }
}
