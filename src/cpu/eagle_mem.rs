//!
//! Eagle memory reference and wide stack instructions.
//!

use super::eagle_op::sext16;
use super::{Cpu, WFP_LOC, WSB_LOC, WSL_LOC, WSP_LOC};
use crate::bus::Bus;
use crate::decode::{DecodedInstruction, Operands};
use crate::err::{CpuError, ExecutionFault};
use crate::instr::Mnemonic;

/// Stack register addressed by the LDA/STA-to-stack-register family.
fn stack_reg(mnemonic: Mnemonic) -> Option<u32> {
    match mnemonic {
        Mnemonic::LDAFP | Mnemonic::STAFP => Some(WFP_LOC),
        Mnemonic::LDATS | Mnemonic::STATS => Some(WSP_LOC),
        Mnemonic::LDASB | Mnemonic::STASB => Some(WSB_LOC),
        Mnemonic::LDASL | Mnemonic::STASL => Some(WSL_LOC),
        _ => None,
    }
}

impl Cpu {
    pub(super) fn eagle_mem_ref(&mut self, bus: &mut Bus, instr: &DecodedInstruction) -> Result<(), CpuError> {
        if let Some(loc) = stack_reg(instr.mnemonic) {
            let ac = operands!(self, instr, Operands::OneAcc { ac } => ac);
            match instr.mnemonic {
                Mnemonic::LDAFP | Mnemonic::LDATS | Mnemonic::LDASB | Mnemonic::LDASL => {
                    self.ac[ac] = self.wide_reg(bus, loc)?;
                }
                _ => self.set_wide_reg(bus, loc, self.ac[ac])?,
            }
            self.advance(instr.len);
            return Ok(());
        }

        match instr.mnemonic {
            Mnemonic::WLDB | Mnemonic::WSTB => {
                let (acs, acd) = operands!(self, instr, Operands::TwoAcc { acs, acd } => (acs, acd));
                if instr.mnemonic == Mnemonic::WLDB {
                    self.ac[acd] = u32::from(self.read_byte_ba(bus, self.ac[acs])?);
                } else {
                    self.write_byte_ba(bus, self.ac[acs], self.ac[acd] as u8)?;
                }
            }

            Mnemonic::XLDB
            | Mnemonic::XSTB
            | Mnemonic::XLEFB
            | Mnemonic::LLDB
            | Mnemonic::LSTB
            | Mnemonic::LLEFB => {
                let (ac, mode, disp, lo_byte) = operands!(self, instr,
                    Operands::ByteAddr { ac: Some(ac), mode, disp, lo_byte } => (ac, mode, disp, lo_byte));
                let ea = self.resolve_byte32(mode, disp);
                match instr.mnemonic {
                    Mnemonic::XLDB | Mnemonic::LLDB => {
                        self.ac[ac] = u32::from(self.read_byte(bus, ea, lo_byte)?);
                    }
                    Mnemonic::XSTB | Mnemonic::LSTB => {
                        self.write_byte(bus, ea, lo_byte, self.ac[ac] as u8)?;
                    }
                    _ => self.ac[ac] = ea << 1 | u32::from(lo_byte),
                }
            }

            _ => {
                let (ac, ind, mode, disp) = operands!(self, instr,
                    Operands::OneAccEffAddr { ac, ind, mode, disp } => (ac, ind, mode, disp));
                let ea = self.resolve32(bus, ind, mode, disp)?;
                let v = self.ac[ac];
                self.ac[ac] = match instr.mnemonic {
                    Mnemonic::XNLDA | Mnemonic::LNLDA => sext16(self.read_word(bus, ea)?),
                    Mnemonic::XWLDA | Mnemonic::LWLDA => self.read_dword(bus, ea)?,
                    Mnemonic::XNSTA | Mnemonic::LNSTA => {
                        self.write_word(bus, ea, v as u16)?;
                        v
                    }
                    Mnemonic::XWSTA | Mnemonic::LWSTA => {
                        self.write_dword(bus, ea, v)?;
                        v
                    }
                    Mnemonic::XLEF | Mnemonic::LLEF => ea,
                    Mnemonic::XNADD | Mnemonic::LNADD => {
                        let word = self.read_word(bus, ea)?;
                        self.narrow_add(v as u16, word)
                    }
                    Mnemonic::XNSUB | Mnemonic::LNSUB => {
                        let word = self.read_word(bus, ea)?;
                        self.narrow_sub(v as u16, word)
                    }
                    Mnemonic::XWADD | Mnemonic::LWADD => {
                        let dword = self.read_dword(bus, ea)?;
                        self.wide_add(v, dword)
                    }
                    Mnemonic::XWSUB | Mnemonic::LWSUB => {
                        let dword = self.read_dword(bus, ea)?;
                        self.wide_sub(v, dword)
                    }
                    _ => return Err(self.unimplemented(instr)),
                };
            }
        }
        self.advance(instr.len);
        Ok(())
    }

    /// Push a wide frame: AC0-AC2, the old frame pointer, then AC3 with
    /// carry in bit 0. The new frame pointer and AC3 both address the last
    /// word pushed, and `frame` more dwords are reserved above it.
    fn wide_save(&mut self, bus: &mut Bus, frame: u16) -> Result<(), CpuError> {
        let fp = self.wide_reg(bus, WFP_LOC)?;
        let ac3 = self.ac[3] & 0x7fff_ffff | if self.carry { 0x8000_0000 } else { 0 };
        self.wsp_reserve(bus, self.wide_reg(bus, WSP_LOC)?, 5, true)?;
        for &val in &[self.ac[0], self.ac[1], self.ac[2], fp, ac3] {
            self.wsp_push(bus, val)?;
        }
        let sp = self.wide_reg(bus, WSP_LOC)?;
        self.set_wide_reg(bus, WFP_LOC, sp)?;
        self.ac[3] = sp;
        self.set_wide_reg(bus, WSP_LOC, sp.wrapping_add(2 * u32::from(frame)))
    }

    pub(super) fn eagle_stack(&mut self, bus: &mut Bus, instr: &DecodedInstruction) -> Result<(), CpuError> {
        match instr.mnemonic {
            Mnemonic::WPSH => {
                let (acs, acd) = operands!(self, instr, Operands::TwoAcc { acs, acd } => (acs, acd));
                let n = ((acd + 4 - acs) & 3) as u32 + 1;
                self.wsp_reserve(bus, self.wide_reg(bus, WSP_LOC)?, n, true)?;
                let mut ac = acs;
                loop {
                    self.wsp_push(bus, self.ac[ac])?;
                    if ac == acd {
                        break;
                    }
                    ac = (ac + 1) & 3;
                }
            }
            Mnemonic::WPOP => {
                let (acs, acd) = operands!(self, instr, Operands::TwoAcc { acs, acd } => (acs, acd));
                let n = ((acs + 4 - acd) & 3) as u32 + 1;
                self.wsp_reserve(bus, self.wide_reg(bus, WSP_LOC)?, n, false)?;
                let mut ac = acs;
                loop {
                    self.ac[ac] = self.wsp_pop(bus)?;
                    if ac == acd {
                        break;
                    }
                    ac = (ac + 3) & 3;
                }
            }
            Mnemonic::WPOPJ => {
                self.pc = self.wsp_pop(bus)? & 0x7fff_ffff;
                return Ok(());
            }
            Mnemonic::WRTN => {
                let fp = self.wide_reg(bus, WFP_LOC)?;
                self.wsp_reserve(bus, fp, 5, false)?;
                self.set_wide_reg(bus, WSP_LOC, fp)?;
                let ret = self.wsp_pop(bus)?;
                self.carry = ret & 0x8000_0000 != 0;
                for ac in (0..4).rev() {
                    self.ac[ac] = self.wsp_pop(bus)?;
                }
                self.set_wide_reg(bus, WFP_LOC, self.ac[3])?;
                self.pc = ret & 0x7fff_ffff;
                return Ok(());
            }
            Mnemonic::WSAVR | Mnemonic::WSAVS => {
                let frame = operands!(self, instr, Operands::Word(w) => w);
                if instr.mnemonic == Mnemonic::WSAVS {
                    let wsp = self.wide_reg(bus, WSP_LOC)?;
                    let limit = self.wide_reg(bus, WSL_LOC)?;
                    let top = u64::from(wsp) + 10 + 2 * u64::from(frame);
                    if top > u64::from(limit) {
                        return Err(ExecutionFault::StackOverflow { wsp, limit }.into());
                    }
                }
                self.wide_save(bus, frame)?;
            }
            Mnemonic::WMSP => {
                let ac = operands!(self, instr, Operands::OneAcc { ac } => ac);
                let sp = self.wide_reg(bus, WSP_LOC)?.wrapping_add(self.ac[ac].wrapping_mul(2));
                self.set_wide_reg(bus, WSP_LOC, sp)?;
            }
            Mnemonic::LPEFB => {
                let (mode, disp, lo_byte) = operands!(self, instr,
                    Operands::ByteAddr { ac: None, mode, disp, lo_byte } => (mode, disp, lo_byte));
                let ea = self.resolve_byte32(mode, disp);
                self.wsp_push(bus, ea << 1 | u32::from(lo_byte))?;
            }
            Mnemonic::LPEF | Mnemonic::XPEF | Mnemonic::LPSHJ | Mnemonic::XPSHJ => {
                let (ind, mode, disp) = operands!(self, instr,
                    Operands::NoAccEffAddr { ind, mode, disp } => (ind, mode, disp));
                let ea = self.resolve32(bus, ind, mode, disp)?;
                if instr.mnemonic == Mnemonic::LPEF || instr.mnemonic == Mnemonic::XPEF {
                    self.wsp_push(bus, ea)?;
                } else {
                    self.wsp_push(bus, self.pc.wrapping_add(instr.len))?;
                    self.pc = ea;
                    return Ok(());
                }
            }
            _ => return Err(self.unimplemented(instr)),
        }
        self.advance(instr.len);
        Ok(())
    }
}
