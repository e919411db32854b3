//!
//! Eagle (32-bit) operate instructions: narrow and wide arithmetic, logic,
//! shifts, immediates and the wide block moves.
//!
//! Narrow results are sign-extended into the full accumulator. Adds report
//! the unsigned carry-out, subtracts set carry when no borrow occurs.
//!

use super::Cpu;
use crate::bus::Bus;
use crate::decode::{DecodedInstruction, Operands};
use crate::err::{CpuError, ExecutionFault};
use crate::instr::Mnemonic;

/// Sign-extend a narrow result into a wide accumulator.
pub(super) fn sext16(v: u16) -> u32 {
    v as i16 as i32 as u32
}

fn shift_logical(val: u32, count: i32) -> u32 {
    match count {
        0 => val,
        1..=31 => val << count,
        -31..=-1 => val >> -count,
        _ => 0,
    }
}

fn shift_arithmetic(val: u32, count: i32) -> u32 {
    let val = val as i32;
    let result = match count {
        0 => val,
        1..=31 => val << count,
        -31..=-1 => val >> -count,
        c if c > 0 => 0,
        _ => val >> 31,
    };
    result as u32
}

impl Cpu {
    pub(super) fn narrow_add(&mut self, d: u16, s: u16) -> u32 {
        let (r, carry) = d.overflowing_add(s);
        self.carry = carry;
        sext16(r)
    }

    pub(super) fn narrow_sub(&mut self, d: u16, s: u16) -> u32 {
        self.carry = s <= d;
        sext16(d.wrapping_sub(s))
    }

    pub(super) fn wide_add(&mut self, d: u32, s: u32) -> u32 {
        let (r, carry) = d.overflowing_add(s);
        self.carry = carry;
        r
    }

    pub(super) fn wide_sub(&mut self, d: u32, s: u32) -> u32 {
        self.carry = s <= d;
        d.wrapping_sub(s)
    }

    /// Resolve a wide bit pointer: word address in ACS (unless ACS is ACD)
    /// plus the word offset in ACD, bit number in the low nibble of ACD.
    pub(super) fn bit_pointer32(&self, acs: usize, acd: usize) -> (u32, u16) {
        let base = if acs == acd { 0 } else { self.ac[acs] };
        let ea = base.wrapping_add(self.ac[acd] >> 4) & 0x7fff_ffff;
        (ea, 0x8000 >> (self.ac[acd] & 0xf))
    }

    fn check_imm(&self, instr: &DecodedInstruction, imm: u16) -> Result<(), CpuError> {
        if (1..=4).contains(&imm) {
            Ok(())
        } else {
            Err(ExecutionFault::InvalidImmediate {
                mnemonic: instr.name(),
                value: i32::from(imm),
            }
            .into())
        }
    }

    pub(super) fn eagle_op(&mut self, bus: &mut Bus, instr: &DecodedInstruction) -> Result<(), CpuError> {
        match instr.mnemonic {
            Mnemonic::CRYTC => self.carry = !self.carry,
            Mnemonic::CRYTO => self.carry = true,
            Mnemonic::CRYTZ => self.carry = false,
            Mnemonic::WBLM => self.wide_block_move(bus)?,
            Mnemonic::WCMV => self.wide_char_move(bus)?,

            Mnemonic::CVWN | Mnemonic::WHLV | Mnemonic::WMOVR => {
                let ac = operands!(self, instr, Operands::OneAcc { ac } => ac);
                let v = self.ac[ac];
                self.ac[ac] = match instr.mnemonic {
                    Mnemonic::CVWN => {
                        let i = v as i32;
                        if i < i32::from(i16::MIN) || i > i32::from(i16::MAX) {
                            self.carry = true;
                        }
                        sext16(v as u16)
                    }
                    Mnemonic::WHLV => (v as i32 / 2) as u32,
                    _ => v >> 1,
                };
            }

            Mnemonic::WADI | Mnemonic::WSBI | Mnemonic::NADI | Mnemonic::NSBI | Mnemonic::WLSI => {
                let (imm, ac) = operands!(self, instr, Operands::ImmOneAcc { imm, ac } => (imm, ac));
                self.check_imm(instr, imm)?;
                let v = self.ac[ac];
                self.ac[ac] = match instr.mnemonic {
                    Mnemonic::WADI => self.wide_add(v, u32::from(imm)),
                    Mnemonic::WSBI => self.wide_sub(v, u32::from(imm)),
                    Mnemonic::NADI => self.narrow_add(v as u16, imm),
                    Mnemonic::NSBI => self.narrow_sub(v as u16, imm),
                    _ => v << imm,
                };
            }

            Mnemonic::NADDI
            | Mnemonic::NLDAI
            | Mnemonic::WLSHI
            | Mnemonic::WASHI
            | Mnemonic::WADDI
            | Mnemonic::WANDI
            | Mnemonic::WIORI
            | Mnemonic::WXORI
            | Mnemonic::WLDAI => {
                let (ac, imm) = operands!(self, instr, Operands::OneAccImm { ac, imm } => (ac, imm));
                let v = self.ac[ac];
                let count = i32::from(imm as u8 as i8);
                self.ac[ac] = match instr.mnemonic {
                    Mnemonic::NADDI => self.narrow_add(v as u16, imm as u16),
                    Mnemonic::NLDAI => imm as u32,
                    Mnemonic::WLSHI => shift_logical(v, count),
                    Mnemonic::WASHI => shift_arithmetic(v, count),
                    Mnemonic::WADDI => self.wide_add(v, imm as u32),
                    Mnemonic::WANDI => v & imm as u32,
                    Mnemonic::WIORI => v | imm as u32,
                    Mnemonic::WXORI => v ^ imm as u32,
                    _ => imm as u32,
                };
            }

            Mnemonic::WBTO | Mnemonic::WBTZ => {
                let (acs, acd) = operands!(self, instr, Operands::TwoAcc { acs, acd } => (acs, acd));
                let (ea, mask) = self.bit_pointer32(acs, acd);
                let word = self.read_word(bus, ea)?;
                let word = if instr.mnemonic == Mnemonic::WBTO {
                    word | mask
                } else {
                    word & !mask
                };
                self.write_word(bus, ea, word)?;
            }

            _ => {
                let (acs, acd) = operands!(self, instr, Operands::TwoAcc { acs, acd } => (acs, acd));
                self.eagle_two_acc(instr, acs, acd)?;
            }
        }
        self.advance(instr.len);
        Ok(())
    }

    fn eagle_two_acc(&mut self, instr: &DecodedInstruction, acs: usize, acd: usize) -> Result<(), CpuError> {
        let s = self.ac[acs];
        let d = self.ac[acd];
        let count = i32::from(s as u8 as i8);
        let result = match instr.mnemonic {
            Mnemonic::NADD => self.narrow_add(d as u16, s as u16),
            Mnemonic::NSUB => self.narrow_sub(d as u16, s as u16),
            Mnemonic::NNEG => sext16((s as u16).wrapping_neg()),
            Mnemonic::NMUL => match (d as i16).checked_mul(s as i16) {
                Some(p) => sext16(p as u16),
                None => {
                    self.carry = true;
                    d
                }
            },
            Mnemonic::NDIV => match (d as i16).checked_div(s as i16) {
                Some(q) => sext16(q as u16),
                None => {
                    self.carry = true;
                    d
                }
            },
            Mnemonic::WADD => self.wide_add(d, s),
            Mnemonic::WADC => self.wide_add(d, !s),
            Mnemonic::WSUB => self.wide_sub(d, s),
            Mnemonic::WAND => d & s,
            Mnemonic::WIOR => d | s,
            Mnemonic::WXOR => d ^ s,
            Mnemonic::WANC => d & !s,
            Mnemonic::WINC => s.wrapping_add(1),
            Mnemonic::WNEG => s.wrapping_neg(),
            Mnemonic::WCOM => !s,
            Mnemonic::WMOV => s,
            Mnemonic::WMUL => match (d as i32).checked_mul(s as i32) {
                Some(p) => p as u32,
                None => {
                    self.carry = true;
                    d
                }
            },
            Mnemonic::WDIV => match (d as i32).checked_div(s as i32) {
                Some(q) => q as u32,
                None => {
                    self.carry = true;
                    d
                }
            },
            Mnemonic::WLSH => shift_logical(d, count),
            Mnemonic::WASH => shift_arithmetic(d, count),
            Mnemonic::ZEX => s & 0xffff,
            Mnemonic::SEX => sext16(s as u16),
            Mnemonic::WXCH => {
                self.ac[acs] = d;
                s
            }
            _ => return Err(self.unimplemented(instr)),
        };
        self.ac[acd] = result;
        Ok(())
    }

    /// AC1 holds a signed word count, AC2 the source and AC3 the destination.
    fn wide_block_move(&mut self, bus: &mut Bus) -> Result<(), CpuError> {
        let count = self.ac[1] as i32;
        let step = count.signum() as u32;
        let mut src = self.ac[2];
        let mut dst = self.ac[3];
        for _ in 0..count.unsigned_abs() {
            let word = self.read_word(bus, src)?;
            self.write_word(bus, dst, word)?;
            src = src.wrapping_add(step);
            dst = dst.wrapping_add(step);
        }
        self.ac[1] = 0;
        self.ac[2] = src;
        self.ac[3] = dst;
        Ok(())
    }

    /// Byte move with independent signed counts: AC0 destination count,
    /// AC1 source count, AC2 destination and AC3 source byte pointers. An
    /// exhausted source fills the rest of the destination with spaces.
    fn wide_char_move(&mut self, bus: &mut Bus) -> Result<(), CpuError> {
        let dst_count = self.ac[0] as i32;
        if dst_count == 0 {
            return Ok(());
        }
        let mut src_count = self.ac[1] as i32;
        self.carry = src_count.unsigned_abs() > dst_count.unsigned_abs();

        let dst_step = dst_count.signum() as u32;
        let src_step = src_count.signum();
        let mut dst = self.ac[2];
        let mut src = self.ac[3];

        for _ in 0..dst_count.unsigned_abs() {
            let byte = if src_count != 0 {
                let b = self.read_byte_ba(bus, src)?;
                src = src.wrapping_add(src_step as u32);
                src_count -= src_step;
                b
            } else {
                b' '
            };
            self.write_byte_ba(bus, dst, byte)?;
            dst = dst.wrapping_add(dst_step);
        }

        self.ac[0] = 0;
        self.ac[1] = src_count as u32;
        self.ac[2] = dst;
        self.ac[3] = src;
        Ok(())
    }
}
