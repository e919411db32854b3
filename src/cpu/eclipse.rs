use super::{Cpu, RING_MASK};
use crate::bus::Bus;
use crate::decode::{DecodedInstruction, Operands};
use crate::err::{CpuError, ExecutionFault};
use crate::instr::Mnemonic;

/// Logical shift of a 16-bit value; positive counts shift left.
fn shift_logical16(val: u16, count: i32) -> u16 {
    match count {
        0 => val,
        1..=15 => val << count,
        -15..=-1 => val >> -count,
        _ => 0,
    }
}

fn shift_logical32(val: u32, count: i32) -> u32 {
    match count {
        0 => val,
        1..=31 => val << count,
        -31..=-1 => val >> -count,
        _ => 0,
    }
}

impl Cpu {
    /// Accumulator pair `ac`:`ac + 1` as one 32-bit value.
    fn pair16(&self, ac: usize) -> u32 {
        u32::from(self.ac16(ac)) << 16 | u32::from(self.ac16((ac + 1) & 3))
    }

    fn set_pair16(&mut self, ac: usize, val: u32) {
        self.set_ac16(ac, (val >> 16) as u16);
        self.set_ac16((ac + 1) & 3, val as u16);
    }

    /// Resolve a 16-bit bit pointer: ACS holds the base word address (unless
    /// it is the same accumulator as ACD), ACD the bit offset.
    fn bit_pointer16(&self, acs: usize, acd: usize) -> (u32, u16) {
        let base = if acs == acd {
            0
        } else {
            u32::from(self.ac16(acs))
        };
        let offset = self.ac16(acd);
        let word = base.wrapping_add(u32::from(offset >> 4)) & 0x7fff;
        ((self.pc & RING_MASK) | word, 0x8000 >> (offset & 0xf))
    }

    pub(super) fn eclipse_mem_ref(
        &mut self,
        bus: &mut Bus,
        instr: &DecodedInstruction,
    ) -> Result<(), CpuError> {
        match instr.mnemonic {
            Mnemonic::LEF | Mnemonic::ELEF => {
                let (ac, ind, mode, disp) = operands!(self, instr,
                    Operands::OneAccEffAddr { ac, ind, mode, disp } => (ac, ind, mode, disp));
                let ea = self.resolve_eclipse16(bus, ind, mode, disp)?;
                self.set_ac16(ac, ea as u16);
            }
            Mnemonic::ELDA => {
                let (ac, ind, mode, disp) = operands!(self, instr,
                    Operands::OneAccEffAddr { ac, ind, mode, disp } => (ac, ind, mode, disp));
                let ea = self.resolve_eclipse16(bus, ind, mode, disp)?;
                let val = self.read_word(bus, ea)?;
                self.set_ac16(ac, val);
            }
            Mnemonic::ESTA => {
                let (ac, ind, mode, disp) = operands!(self, instr,
                    Operands::OneAccEffAddr { ac, ind, mode, disp } => (ac, ind, mode, disp));
                let ea = self.resolve_eclipse16(bus, ind, mode, disp)?;
                self.write_word(bus, ea, self.ac16(ac))?;
            }
            Mnemonic::ELDB | Mnemonic::ESTB => {
                let (ac, mode, disp, lo_byte) = operands!(self, instr,
                    Operands::ByteAddr { ac: Some(ac), mode, disp, lo_byte } => (ac, mode, disp, lo_byte));
                let ea = self.resolve_byte16(mode, disp);
                if instr.mnemonic == Mnemonic::ELDB {
                    let byte = self.read_byte(bus, ea, lo_byte)?;
                    self.set_ac16(ac, u16::from(byte));
                } else {
                    self.write_byte(bus, ea, lo_byte, self.ac16(ac) as u8)?;
                }
            }
            Mnemonic::LDB | Mnemonic::STB => {
                let (acs, acd) = operands!(self, instr, Operands::TwoAcc { acs, acd } => (acs, acd));
                let bp = self.ac16(acs);
                let ea = (self.pc & RING_MASK) | u32::from(bp >> 1);
                let lo_byte = bp & 1 == 1;
                if instr.mnemonic == Mnemonic::LDB {
                    let byte = self.read_byte(bus, ea, lo_byte)?;
                    self.set_ac16(acd, u16::from(byte));
                } else {
                    self.write_byte(bus, ea, lo_byte, self.ac16(acd) as u8)?;
                }
            }
            _ => return Err(self.unimplemented(instr)),
        }
        self.advance(instr.len);
        Ok(())
    }

    pub(super) fn eclipse_op(&mut self, bus: &mut Bus, instr: &DecodedInstruction) -> Result<(), CpuError> {
        match instr.mnemonic {
            Mnemonic::ADI | Mnemonic::SBI | Mnemonic::HXL | Mnemonic::HXR | Mnemonic::DHXL | Mnemonic::DHXR => {
                let (imm, ac) = operands!(self, instr, Operands::ImmOneAcc { imm, ac } => (imm, ac));
                if !(1..=4).contains(&imm) {
                    return Err(ExecutionFault::InvalidImmediate {
                        mnemonic: instr.name(),
                        value: i32::from(imm),
                    }
                    .into());
                }
                let v = self.ac16(ac);
                let bits = 4 * i32::from(imm);
                match instr.mnemonic {
                    Mnemonic::ADI => self.set_ac16(ac, v.wrapping_add(imm)),
                    Mnemonic::SBI => self.set_ac16(ac, v.wrapping_sub(imm)),
                    Mnemonic::HXL => self.set_ac16(ac, shift_logical16(v, bits)),
                    Mnemonic::HXR => self.set_ac16(ac, shift_logical16(v, -bits)),
                    Mnemonic::DHXL => self.set_pair16(ac, shift_logical32(self.pair16(ac), bits)),
                    _ => self.set_pair16(ac, shift_logical32(self.pair16(ac), -bits)),
                }
            }
            Mnemonic::ADDI | Mnemonic::ANDI | Mnemonic::IORI | Mnemonic::XORI => {
                let (ac, imm) = operands!(self, instr, Operands::OneAccImm { ac, imm } => (ac, imm));
                let v = self.ac16(ac);
                let imm = imm as u16;
                let result = match instr.mnemonic {
                    Mnemonic::ADDI => v.wrapping_add(imm),
                    Mnemonic::ANDI => v & imm,
                    Mnemonic::IORI => v | imm,
                    _ => v ^ imm,
                };
                self.set_ac16(ac, result);
            }
            Mnemonic::IOR
            | Mnemonic::XOR
            | Mnemonic::ANC
            | Mnemonic::XCH
            | Mnemonic::LSH
            | Mnemonic::DLSH
            | Mnemonic::BTO
            | Mnemonic::BTZ => {
                let (acs, acd) = operands!(self, instr, Operands::TwoAcc { acs, acd } => (acs, acd));
                let s = self.ac16(acs);
                let d = self.ac16(acd);
                let count = i32::from(s as u8 as i8);
                match instr.mnemonic {
                    Mnemonic::IOR => self.set_ac16(acd, d | s),
                    Mnemonic::XOR => self.set_ac16(acd, d ^ s),
                    Mnemonic::ANC => self.set_ac16(acd, d & !s),
                    Mnemonic::XCH => {
                        self.set_ac16(acd, s);
                        self.set_ac16(acs, d);
                    }
                    Mnemonic::LSH => self.set_ac16(acd, shift_logical16(d, count)),
                    Mnemonic::DLSH => self.set_pair16(acd, shift_logical32(self.pair16(acd), count)),
                    Mnemonic::BTO | Mnemonic::BTZ => {
                        let (ea, mask) = self.bit_pointer16(acs, acd);
                        let word = self.read_word(bus, ea)?;
                        let word = if instr.mnemonic == Mnemonic::BTO {
                            word | mask
                        } else {
                            word & !mask
                        };
                        self.write_word(bus, ea, word)?;
                    }
                    _ => return Err(self.unimplemented(instr)),
                }
            }
            Mnemonic::MUL => {
                let product =
                    u32::from(self.ac16(1)) * u32::from(self.ac16(2)) + u32::from(self.ac16(0));
                self.set_pair16(0, product);
            }
            Mnemonic::MULS => {
                let product = i32::from(self.ac16(1) as i16) * i32::from(self.ac16(2) as i16)
                    + i32::from(self.ac16(0) as i16);
                self.set_pair16(0, product as u32);
            }
            Mnemonic::DIV => {
                let divisor = u32::from(self.ac16(2));
                if self.ac16(0) >= self.ac16(2) {
                    self.carry = true;
                } else {
                    let dividend = self.pair16(0);
                    self.set_ac16(1, (dividend / divisor) as u16);
                    self.set_ac16(0, (dividend % divisor) as u16);
                    self.carry = false;
                }
            }
            Mnemonic::DIVS => {
                let dividend = self.pair16(0) as i32;
                let divisor = i32::from(self.ac16(2) as i16);
                match dividend.checked_div(divisor) {
                    Some(q) if q >= i32::from(i16::MIN) && q <= i32::from(i16::MAX) => {
                        self.set_ac16(1, q as u16);
                        self.set_ac16(0, (dividend % divisor) as u16);
                        self.carry = false;
                    }
                    _ => self.carry = true,
                }
            }
            Mnemonic::BLM => {
                let ring = self.pc & RING_MASK;
                let count = self.ac16(1);
                let mut src = self.ac16(2);
                let mut dst = self.ac16(3);
                for _ in 0..count {
                    let word = self.read_word(bus, ring | u32::from(src & 0x7fff))?;
                    self.write_word(bus, ring | u32::from(dst & 0x7fff), word)?;
                    src = src.wrapping_add(1);
                    dst = dst.wrapping_add(1);
                }
                self.set_ac16(1, 0);
                self.set_ac16(2, src);
                self.set_ac16(3, dst);
            }
            _ => return Err(self.unimplemented(instr)),
        }
        self.advance(instr.len);
        Ok(())
    }

    pub(super) fn eclipse_pc(&mut self, bus: &mut Bus, instr: &DecodedInstruction) -> Result<(), CpuError> {
        match instr.mnemonic {
            Mnemonic::EJMP | Mnemonic::EJSR | Mnemonic::EISZ | Mnemonic::EDSZ => {
                let (ind, mode, disp) = operands!(self, instr,
                    Operands::NoAccEffAddr { ind, mode, disp } => (ind, mode, disp));
                let ea = self.resolve_eclipse16(bus, ind, mode, disp)?;
                match instr.mnemonic {
                    Mnemonic::EJMP => self.pc = ea,
                    Mnemonic::EJSR => {
                        let ret = self.pc.wrapping_add(2) as u16;
                        self.set_ac16(3, ret);
                        self.pc = ea;
                    }
                    _ => {
                        let word = self.read_word(bus, ea)?;
                        let word = if instr.mnemonic == Mnemonic::EISZ {
                            word.wrapping_add(1)
                        } else {
                            word.wrapping_sub(1)
                        };
                        self.write_word(bus, ea, word)?;
                        self.skip_if(instr, word == 0);
                    }
                }
            }
            Mnemonic::SGT | Mnemonic::SGE => {
                let (acs, acd) = operands!(self, instr, Operands::TwoAcc { acs, acd } => (acs, acd));
                let s = self.ac16(acs) as i16;
                let d = self.ac16(acd) as i16;
                let skip = if instr.mnemonic == Mnemonic::SGT {
                    s > d
                } else {
                    s >= d
                };
                self.skip_if(instr, skip);
            }
            Mnemonic::SZB | Mnemonic::SNB | Mnemonic::SZBO => {
                let (acs, acd) = operands!(self, instr, Operands::TwoAcc { acs, acd } => (acs, acd));
                let (ea, mask) = self.bit_pointer16(acs, acd);
                let word = self.read_word(bus, ea)?;
                let set = word & mask != 0;
                let skip = match instr.mnemonic {
                    Mnemonic::SNB => set,
                    Mnemonic::SZBO => {
                        self.write_word(bus, ea, word | mask)?;
                        !set
                    }
                    _ => !set,
                };
                self.skip_if(instr, skip);
            }
            Mnemonic::CLM => {
                let (acs, acd) = operands!(self, instr, Operands::TwoAcc { acs, acd } => (acs, acd));
                let val = self.ac16(acs) as i16;
                let (lo, hi, words) = if acs == acd {
                    let lo = self.read_word(bus, self.pc.wrapping_add(1))?;
                    let hi = self.read_word(bus, self.pc.wrapping_add(2))?;
                    (lo, hi, 3)
                } else {
                    let limits = (self.pc & RING_MASK) | u32::from(self.ac16(acd) & 0x7fff);
                    let lo = self.read_word(bus, limits)?;
                    let hi = self.read_word(bus, limits.wrapping_add(1))?;
                    (lo, hi, 1)
                };
                let in_range = val >= lo as i16 && val <= hi as i16;
                self.advance(if in_range { words + 1 } else { words });
            }
            Mnemonic::DSPA => {
                let (ac, ind, mode, disp) = operands!(self, instr,
                    Operands::OneAccEffAddr { ac, ind, mode, disp } => (ac, ind, mode, disp));
                let table = self.resolve_eclipse16(bus, ind, mode, disp)?;
                let lo = i32::from(self.read_word(bus, table.wrapping_sub(2))? as i16);
                let hi = i32::from(self.read_word(bus, table.wrapping_sub(1))? as i16);
                let val = i32::from(self.ac16(ac) as i16);
                if val < lo || val > hi {
                    self.advance(instr.len);
                } else {
                    let entry = self.read_word(bus, table.wrapping_add((val - lo) as u32))?;
                    if entry == 0xffff {
                        self.advance(instr.len);
                    } else {
                        self.pc = (self.pc & RING_MASK) | u32::from(entry);
                    }
                }
            }
            _ => return Err(self.unimplemented(instr)),
        }
        Ok(())
    }

    pub(super) fn eclipse_stack(&mut self, bus: &mut Bus, instr: &DecodedInstruction) -> Result<(), CpuError> {
        match instr.mnemonic {
            Mnemonic::PSH => {
                let (acs, acd) = operands!(self, instr, Operands::TwoAcc { acs, acd } => (acs, acd));
                let n = ((acd + 4 - acs) & 3) as u16 + 1;
                self.nsp_reserve(bus, self.nsp(bus)?, n, true)?;
                let mut ac = acs;
                loop {
                    self.nsp_push(bus, self.ac16(ac))?;
                    if ac == acd {
                        break;
                    }
                    ac = (ac + 1) & 3;
                }
            }
            Mnemonic::POP => {
                let (acs, acd) = operands!(self, instr, Operands::TwoAcc { acs, acd } => (acs, acd));
                let n = ((acs + 4 - acd) & 3) as u16 + 1;
                self.nsp_reserve(bus, self.nsp(bus)?, n, false)?;
                let mut ac = acs;
                loop {
                    let val = self.nsp_pop(bus)?;
                    self.set_ac16(ac, val);
                    if ac == acd {
                        break;
                    }
                    ac = (ac + 3) & 3;
                }
            }
            Mnemonic::PSHJ => {
                let (ind, mode, disp) = operands!(self, instr,
                    Operands::NoAccEffAddr { ind, mode, disp } => (ind, mode, disp));
                let ea = self.resolve_eclipse16(bus, ind, mode, disp)?;
                self.nsp_push(bus, self.pc.wrapping_add(2) as u16)?;
                self.pc = ea;
                return Ok(());
            }
            Mnemonic::POPJ => {
                let ret = self.nsp_pop(bus)?;
                self.pc = (self.pc & RING_MASK) | u32::from(ret & 0x7fff);
                return Ok(());
            }
            Mnemonic::SAVE => {
                let frame = operands!(self, instr, Operands::Word(w) => w);
                let fp = self.nfp(bus)?;
                let ac3 = self.ac16(3) & 0x7fff | if self.carry { 0x8000 } else { 0 };
                self.nsp_reserve(bus, self.nsp(bus)?, 5, true)?;
                self.nsp_push(bus, self.ac16(0))?;
                self.nsp_push(bus, self.ac16(1))?;
                self.nsp_push(bus, self.ac16(2))?;
                self.nsp_push(bus, fp)?;
                self.nsp_push(bus, ac3)?;
                let sp = self.nsp(bus)?;
                self.set_nfp(bus, sp)?;
                self.set_ac16(3, sp);
                self.set_nsp(bus, sp.wrapping_add(frame))?;
            }
            Mnemonic::RTN => {
                let fp = self.nfp(bus)?;
                self.nsp_reserve(bus, fp, 5, false)?;
                self.set_nsp(bus, fp)?;
                let ret = self.nsp_pop(bus)?;
                self.carry = ret & 0x8000 != 0;
                for ac in (0..4).rev() {
                    let val = self.nsp_pop(bus)?;
                    self.set_ac16(ac, val);
                }
                self.set_nfp(bus, self.ac16(3))?;
                self.pc = (self.pc & RING_MASK) | u32::from(ret & 0x7fff);
                return Ok(());
            }
            Mnemonic::MSP => {
                let ac = operands!(self, instr, Operands::OneAcc { ac } => ac);
                let sp = self.nsp(bus)?.wrapping_add(self.ac16(ac));
                self.set_nsp(bus, sp)?;
            }
            _ => return Err(self.unimplemented(instr)),
        }
        self.advance(instr.len);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::tests::{do_with_program, BASE};
    use crate::cpu::{NFP_LOC, NSP_LOC};

    fn two_acc(bits: u16, acs: u16, acd: u16) -> u16 {
        bits | acs << 13 | acd << 11
    }

    fn imm_acc(bits: u16, imm: u16, ac: u16) -> u16 {
        bits | (imm - 1) << 13 | ac << 11
    }

    #[test]
    fn shifts_logically() {
        assert_eq!(0x0010, shift_logical16(0x0001, 4));
        assert_eq!(0x0001, shift_logical16(0x0010, -4));
        assert_eq!(0, shift_logical16(0xffff, 16));
        assert_eq!(0, shift_logical32(0xffff_ffff, -32));
    }

    #[test]
    fn immediate_add_and_subtract_leave_carry() {
        let program = [imm_acc(0x8008, 4, 1), imm_acc(0x8048, 2, 1)];
        do_with_program(&program, |cpu, bus| {
            cpu.ac[1] = 0xfffe;
            cpu.step(bus).unwrap();
            assert_eq!(2, cpu.ac16(1));
            assert!(!cpu.carry);
            cpu.step(bus).unwrap();
            assert_eq!(0, cpu.ac16(1));
        });
    }

    #[test]
    fn invalid_immediate_faults() {
        do_with_program(&[], |cpu, bus| {
            let instr = DecodedInstruction {
                mnemonic: Mnemonic::SBI,
                layout: crate::instr::Layout::ImmOneAcc,
                class: crate::instr::InstrClass::EclipseOp,
                len: 1,
                opcode: 0x8048,
                operands: Operands::ImmOneAcc { imm: 5, ac: 0 },
                disassembly: None,
            };
            assert_eq!(
                Err(CpuError::Fault(ExecutionFault::InvalidImmediate {
                    mnemonic: "SBI",
                    value: 5
                })),
                cpu.execute(bus, &instr)
            );
        });
    }

    #[test]
    fn hex_shifts() {
        let program = [imm_acc(0x8308, 1, 0), imm_acc(0x83c8, 2, 2)];
        do_with_program(&program, |cpu, bus| {
            cpu.ac[0] = 0x1234;
            cpu.ac[2] = 0x1234;
            cpu.ac[3] = 0x5678;
            cpu.step(bus).unwrap();
            assert_eq!(0x2340, cpu.ac16(0));
            cpu.step(bus).unwrap();
            assert_eq!(0x0012, cpu.ac16(2));
            assert_eq!(0x3456, cpu.ac16(3));
        });
    }

    #[test]
    fn logical_shift_uses_signed_count() {
        let program = [two_acc(0x8288, 1, 2), two_acc(0x8288, 3, 2)];
        do_with_program(&program, |cpu, bus| {
            cpu.ac[1] = 3;
            cpu.ac[3] = 0x00ff; // -1
            cpu.ac[2] = 0x0101;
            cpu.step(bus).unwrap();
            assert_eq!(0x0808, cpu.ac16(2));
            cpu.step(bus).unwrap();
            assert_eq!(0x0404, cpu.ac16(2));
        });
    }

    #[test]
    fn multiplies_and_divides() {
        // MUL / DIV
        do_with_program(&[0xc7c8, 0xd7c8], |cpu, bus| {
            cpu.ac[0] = 5;
            cpu.ac[1] = 0x1000;
            cpu.ac[2] = 0x0100;
            cpu.step(bus).unwrap();
            assert_eq!(0x0010, cpu.ac16(0));
            assert_eq!(0x0005, cpu.ac16(1));
            cpu.step(bus).unwrap();
            assert_eq!(0x1000, cpu.ac16(1));
            assert_eq!(5, cpu.ac16(0));
            assert!(!cpu.carry);
        });
    }

    #[test]
    fn divide_overflow_sets_carry() {
        do_with_program(&[0xd7c8, 0xdfc8], |cpu, bus| {
            cpu.ac[0] = 2;
            cpu.ac[1] = 0;
            cpu.ac[2] = 2;
            cpu.step(bus).unwrap();
            assert!(cpu.carry);
            assert_eq!(2, cpu.ac16(0));

            cpu.ac[2] = 0;
            cpu.carry = false;
            cpu.step(bus).unwrap();
            assert!(cpu.carry);
        });
    }

    #[test]
    fn signed_multiply() {
        do_with_program(&[0xcfc8], |cpu, bus| {
            cpu.ac[0] = 0;
            cpu.ac[1] = (-3i16) as u16 as u32;
            cpu.ac[2] = 7;
            cpu.step(bus).unwrap();
            assert_eq!(0xffff, cpu.ac16(0));
            assert_eq!((-21i16) as u16, cpu.ac16(1));
        });
    }

    #[test]
    fn sets_and_tests_bits() {
        // BTO 1,2 / SNB 1,2 / BTZ 1,2 / SZB 1,2
        let program = [
            two_acc(0x8408, 1, 2),
            two_acc(0x84c8, 1, 2),
            0,
            two_acc(0x8448, 1, 2),
            two_acc(0x8488, 1, 2),
        ];
        do_with_program(&program, |cpu, bus| {
            cpu.ac[1] = 0o2000;
            cpu.ac[2] = 0x0013; // word 1, bit 3
            cpu.step(bus).unwrap();
            assert_eq!(0x1000, bus.mem[0o2001]);
            cpu.step(bus).unwrap();
            assert_eq!(BASE + 3, cpu.pc);
            cpu.step(bus).unwrap();
            assert_eq!(0, bus.mem[0o2001]);
            cpu.step(bus).unwrap();
            assert_eq!(BASE + 6, cpu.pc);
        });
    }

    #[test]
    fn loads_and_stores_bytes() {
        // LDB 0,1 / STB 0,2
        let program = [two_acc(0x8548, 0, 1), two_acc(0x85c8, 0, 2)];
        do_with_program(&program, |cpu, bus| {
            bus.mem.write_word(0o3000, 0x4142).unwrap();
            cpu.ac[0] = 0o3000 * 2 + 1;
            cpu.step(bus).unwrap();
            assert_eq!(0x42, cpu.ac16(1));
            cpu.ac[2] = 0x5a;
            cpu.step(bus).unwrap();
            assert_eq!(0x415a, bus.mem[0o3000]);
        });
    }

    #[test]
    fn extended_load_store() {
        // ELDA 0,2,PC / ESTA 0,0o3000
        let program = [0xa538, 3, 0xc438, 0o3000, 0o777];
        do_with_program(&program, |cpu, bus| {
            cpu.step(bus).unwrap();
            assert_eq!(0o777, cpu.ac16(0));
            assert_eq!(BASE + 2, cpu.pc);
            cpu.step(bus).unwrap();
            assert_eq!(0o777, bus.mem[0o3000]);
        });
    }

    #[test]
    fn compares_to_limits() {
        // CLM 1,1 with inline limits / CLM 1,2
        let program = [two_acc(0x8588, 1, 1), 10, 20, 0, two_acc(0x8588, 1, 2)];
        do_with_program(&program, |cpu, bus| {
            cpu.ac[1] = 15;
            cpu.step(bus).unwrap();
            assert_eq!(BASE + 4, cpu.pc);

            bus.mem.write_word(0o3000, (-5i16) as u16).unwrap();
            bus.mem.write_word(0o3001, 5).unwrap();
            cpu.ac[2] = 0o3000;
            cpu.step(bus).unwrap();
            assert_eq!(BASE + 5, cpu.pc);
        });
    }

    #[test]
    fn dispatches_through_table() {
        // DSPA 0,0o3000
        do_with_program(&[0xc478, 0o3000], |cpu, bus| {
            bus.load(0o2776, &[2, 4, 0o5000, 0xffff, 0o6000]).unwrap();
            cpu.ac[0] = 2;
            cpu.step(bus).unwrap();
            assert_eq!(0o5000, cpu.pc);

            cpu.set_pc(BASE);
            cpu.ac[0] = 3;
            cpu.step(bus).unwrap();
            assert_eq!(BASE + 2, cpu.pc);

            cpu.set_pc(BASE);
            cpu.ac[0] = 9;
            cpu.step(bus).unwrap();
            assert_eq!(BASE + 2, cpu.pc);
        });
    }

    #[test]
    fn block_move() {
        do_with_program(&[0xb7c8, 0xb7c8], |cpu, bus| {
            bus.load(0o3000, &[1, 2, 3]).unwrap();
            cpu.ac[1] = 3;
            cpu.ac[2] = 0o3000;
            cpu.ac[3] = 0o4000;
            cpu.step(bus).unwrap();
            assert_eq!(2, bus.mem[0o4001]);
            assert_eq!(0, cpu.ac16(1));
            assert_eq!(0o3003, cpu.ac16(2));
            assert_eq!(0o4003, cpu.ac16(3));

            // A zero count moves nothing.
            cpu.step(bus).unwrap();
            assert_eq!(0o4003, cpu.ac16(3));
        });
    }

    #[test]
    fn pushes_and_pops_accumulator_ranges() {
        // PSH 1,3 / POP 3,1
        let program = [two_acc(0x8608, 1, 3), two_acc(0x8688, 3, 1)];
        do_with_program(&program, |cpu, bus| {
            bus.mem.write_word(NSP_LOC, 0o2000).unwrap();
            cpu.ac = [0, 11, 22, 33];
            cpu.step(bus).unwrap();
            assert_eq!(0o2003, bus.mem[NSP_LOC as usize]);
            assert_eq!(33, bus.mem[0o2003]);
            cpu.ac = [0, 0, 0, 0];
            cpu.step(bus).unwrap();
            assert_eq!([0, 11, 22, 33], cpu.ac);
            assert_eq!(0o2000, bus.mem[NSP_LOC as usize]);
        });
    }

    #[test]
    fn push_past_memory_leaves_stack_alone() {
        // PSH 1,3 with room for two words
        let mut cpu = Cpu::new();
        let mut bus = Bus::new(0o2003);
        bus.load(BASE, &[two_acc(0x8608, 1, 3)]).unwrap();
        bus.mem.write_word(NSP_LOC, 0o2000).unwrap();
        cpu.set_pc(BASE);
        cpu.ac = [0, 11, 22, 33];
        assert_eq!(
            Err(CpuError::Memory(crate::err::MemoryError::OutOfRange(0o2003))),
            cpu.step(&mut bus)
        );
        assert_eq!(0o2000, bus.mem[NSP_LOC as usize]);
        assert_eq!(0, bus.mem[0o2001]);
        assert_eq!(0, bus.mem[0o2002]);
        assert_eq!(BASE, cpu.pc);
    }

    #[test]
    fn save_and_return() {
        // SAVE 3 ... RTN
        let program = [0xe7a8, 3, 0xa7a8];
        do_with_program(&program, |cpu, bus| {
            bus.mem.write_word(NSP_LOC, 0o2000).unwrap();
            bus.mem.write_word(NFP_LOC, 0o1777).unwrap();
            cpu.ac = [1, 2, 3, 0o4000];
            cpu.carry = true;
            cpu.step(bus).unwrap();
            assert_eq!(0o2005, bus.mem[NFP_LOC as usize]);
            assert_eq!(0o2010, bus.mem[NSP_LOC as usize]);
            assert_eq!(0o2005, cpu.ac16(3));
            assert_eq!(0x8000 | 0o4000, bus.mem[0o2005]);

            cpu.ac = [0, 0, 0, 0];
            cpu.carry = false;
            cpu.step(bus).unwrap();
            assert_eq!([1, 2, 3, 0o1777], cpu.ac);
            assert!(cpu.carry);
            assert_eq!(0o4000, cpu.pc);
            assert_eq!(0o2000, bus.mem[NSP_LOC as usize]);
            assert_eq!(0o1777, bus.mem[NFP_LOC as usize]);
        });
    }

    #[test]
    fn push_jump_and_pop_jump() {
        // PSHJ 0o3000 ... POPJ
        do_with_program(&[0x84b8, 0o3000], |cpu, bus| {
            bus.mem.write_word(NSP_LOC, 0o2000).unwrap();
            bus.mem.write_word(0o3000, 0x9fc8).unwrap();
            cpu.step(bus).unwrap();
            assert_eq!(0o3000, cpu.pc);
            assert_eq!(BASE as u16 + 2, bus.mem[0o2001]);
            cpu.step(bus).unwrap();
            assert_eq!(BASE + 2, cpu.pc);
        });
    }
}
