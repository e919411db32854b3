//!
//! Effective address resolution.
//!
//! Three variants exist, one per instruction generation: the Nova form
//! yields a 15-bit address, the Eclipse form a 16-bit address without the
//! final 15-bit mask, and the Eagle form a 31-bit address with
//! double-word indirection. The 16-bit forms stay within the current segment.
//!

use super::{Cpu, RING_MASK};
use crate::bus::Bus;
use crate::decode::IndexMode;
use crate::err::{CpuError, ExecutionFault};

/// Longest indirection chain followed before declaring a runaway.
pub const MAX_INDIRECTION: u32 = 1024;

impl Cpu {
    fn base16(&self, mode: IndexMode) -> u32 {
        match mode {
            IndexMode::Absolute => 0,
            IndexMode::Pc => self.pc & 0xffff,
            IndexMode::Ac2 => u32::from(self.ac16(2)),
            IndexMode::Ac3 => u32::from(self.ac16(3)),
        }
    }

    fn base32(&self, mode: IndexMode) -> u32 {
        match mode {
            IndexMode::Absolute => 0,
            IndexMode::Pc => self.pc,
            IndexMode::Ac2 => self.ac[2],
            IndexMode::Ac3 => self.ac[3],
        }
    }

    /// Follow a 16-bit indirection chain starting at `addr`.
    fn indirect16(&self, bus: &Bus, addr: u32) -> Result<u32, CpuError> {
        let ring = self.pc & RING_MASK;
        let mut word = self.read_word(bus, ring | addr)?;
        let mut depth = 1;
        while word & 0x8000 != 0 {
            if depth >= MAX_INDIRECTION {
                return Err(ExecutionFault::IndirectionRunaway { address: addr }.into());
            }
            word = self.read_word(bus, ring | u32::from(word & 0x7fff))?;
            depth += 1;
        }
        Ok(u32::from(word))
    }

    /// Nova effective address: 15 bits, in the current segment.
    pub fn resolve16(
        &self,
        bus: &Bus,
        ind: bool,
        mode: IndexMode,
        disp: i32,
    ) -> Result<u32, CpuError> {
        let mut ea = self.base16(mode).wrapping_add(disp as u32) & 0x7fff;
        if ind {
            ea = self.indirect16(bus, ea)?;
        }
        Ok((self.pc & RING_MASK) | (ea & 0x7fff))
    }

    /// Eclipse effective address: 16 bits, no final 15-bit mask.
    pub fn resolve_eclipse16(
        &self,
        bus: &Bus,
        ind: bool,
        mode: IndexMode,
        disp: i32,
    ) -> Result<u32, CpuError> {
        let mut ea = self.base16(mode).wrapping_add(disp as u32) & 0xffff;
        if ind {
            ea = self.indirect16(bus, ea & 0x7fff)?;
        }
        Ok((self.pc & RING_MASK) | ea)
    }

    /// Eagle effective address with double-word indirection.
    pub fn resolve32(
        &self,
        bus: &Bus,
        ind: bool,
        mode: IndexMode,
        disp: i32,
    ) -> Result<u32, CpuError> {
        let mut ea = self.base32(mode).wrapping_add(disp as u32);
        if ind {
            let start = ea;
            let mut dword = self.read_dword(bus, ea)?;
            let mut depth = 1;
            while dword & 0x8000_0000 != 0 {
                if depth >= MAX_INDIRECTION {
                    return Err(ExecutionFault::IndirectionRunaway { address: start }.into());
                }
                dword = self.read_dword(bus, dword & 0x7fff_ffff)?;
                depth += 1;
            }
            ea = dword;
        }
        Ok(ea & 0x7fff_ffff)
    }

    /// Word address of an Eclipse byte reference; never indirect.
    pub fn resolve_byte16(&self, mode: IndexMode, disp: i32) -> u32 {
        (self.pc & RING_MASK) | (self.base16(mode).wrapping_add(disp as u32) & 0xffff)
    }

    /// Word address of an Eagle byte reference; never indirect.
    pub fn resolve_byte32(&self, mode: IndexMode, disp: i32) -> u32 {
        self.base32(mode).wrapping_add(disp as u32) & 0x7fff_ffff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::tests::{do_with_program, BASE};

    #[test]
    fn resolves_nova_modes() {
        do_with_program(&[], |cpu, bus| {
            assert_eq!(0o377, cpu.resolve16(bus, false, IndexMode::Absolute, 0o377).unwrap());
            assert_eq!(BASE - 1, cpu.resolve16(bus, false, IndexMode::Pc, -1).unwrap());
            cpu.ac[2] = 0xffff_0100;
            assert_eq!(0x0102, cpu.resolve16(bus, false, IndexMode::Ac2, 2).unwrap());
            cpu.ac[3] = 0;
            // Wraps within 15 bits.
            assert_eq!(0x7fff, cpu.resolve16(bus, false, IndexMode::Ac3, -1).unwrap());
        });
    }

    #[test]
    fn follows_indirection_chain() {
        do_with_program(&[], |cpu, bus| {
            bus.mem.write_word(0o100, 0x8000 | 0o200).unwrap();
            bus.mem.write_word(0o200, 0o300).unwrap();
            assert_eq!(0o300, cpu.resolve16(bus, true, IndexMode::Absolute, 0o100).unwrap());
            assert_eq!(
                0o300,
                cpu.resolve_eclipse16(bus, true, IndexMode::Absolute, 0o100).unwrap()
            );
        });
    }

    #[test]
    fn eclipse_form_keeps_sixteen_bits() {
        do_with_program(&[], |cpu, bus| {
            cpu.ac[2] = 0x7fff;
            assert_eq!(0x8001, cpu.resolve_eclipse16(bus, false, IndexMode::Ac2, 2).unwrap());
            assert_eq!(0x0001, cpu.resolve16(bus, false, IndexMode::Ac2, 2).unwrap());
        });
    }

    #[test]
    fn detects_indirection_loop() {
        do_with_program(&[], |cpu, bus| {
            bus.mem.write_word(0o100, 0x8000 | 0o100).unwrap();
            assert_eq!(
                Err(CpuError::Fault(ExecutionFault::IndirectionRunaway { address: 0o100 })),
                cpu.resolve16(bus, true, IndexMode::Absolute, 0o100)
            );

            bus.mem.write_dword(0o200, 0x8000_0000 | 0o200).unwrap();
            assert_eq!(
                Err(CpuError::Fault(ExecutionFault::IndirectionRunaway { address: 0o200 })),
                cpu.resolve32(bus, true, IndexMode::Absolute, 0o200)
            );
        });
    }

    #[test]
    fn resolves_wide_indirection() {
        do_with_program(&[], |cpu, bus| {
            bus.mem.write_dword(0o400, 0x8000_0000 | 0o402).unwrap();
            bus.mem.write_dword(0o402, 0x0000_1234).unwrap();
            cpu.ac[3] = 0o300;
            assert_eq!(0x1234, cpu.resolve32(bus, true, IndexMode::Ac3, 0o100).unwrap());
            assert_eq!(BASE + 0x10000, cpu.resolve32(bus, false, IndexMode::Pc, 0x10000).unwrap());
        });
    }
}
