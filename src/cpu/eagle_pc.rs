use super::eagle_op::sext16;
use super::{Cpu, Sbr, CPU_MODEL_NO, UCODE_REV, WSP_LOC};
use crate::bus::Bus;
use crate::decode::{DecodedInstruction, Operands};
use crate::err::{CpuError, ExecutionFault};
use crate::instr::Mnemonic;

use log::debug;

/// Main Store size expressed in 32K-word pages, less one.
fn memory_pages(bus: &Bus) -> u32 {
    ((bus.mem.size_words() >> 15) as u32).saturating_sub(1)
}

impl Cpu {
    pub(super) fn eagle_pc(&mut self, bus: &mut Bus, instr: &DecodedInstruction) -> Result<(), CpuError> {
        match instr.mnemonic {
            Mnemonic::WBR => {
                let disp = operands!(self, instr, Operands::Branch { disp } => disp);
                self.pc = self.pc.wrapping_add(disp as u32);
            }

            Mnemonic::XJMP
            | Mnemonic::LJMP
            | Mnemonic::XJSR
            | Mnemonic::LJSR
            | Mnemonic::XNISZ
            | Mnemonic::XNDSZ
            | Mnemonic::LNISZ
            | Mnemonic::LNDSZ
            | Mnemonic::XWISZ
            | Mnemonic::XWDSZ
            | Mnemonic::LWISZ
            | Mnemonic::LWDSZ => {
                let (ind, mode, disp) = operands!(self, instr,
                    Operands::NoAccEffAddr { ind, mode, disp } => (ind, mode, disp));
                let ea = self.resolve32(bus, ind, mode, disp)?;
                match instr.mnemonic {
                    Mnemonic::XJMP | Mnemonic::LJMP => self.pc = ea,
                    Mnemonic::XJSR | Mnemonic::LJSR => {
                        self.ac[3] = self.pc.wrapping_add(instr.len);
                        self.pc = ea;
                    }
                    Mnemonic::XNISZ | Mnemonic::LNISZ | Mnemonic::XNDSZ | Mnemonic::LNDSZ => {
                        let word = self.read_word(bus, ea)?;
                        let word = match instr.mnemonic {
                            Mnemonic::XNISZ | Mnemonic::LNISZ => word.wrapping_add(1),
                            _ => word.wrapping_sub(1),
                        };
                        self.write_word(bus, ea, word)?;
                        self.skip_if(instr, word == 0);
                    }
                    _ => {
                        let dword = self.read_dword(bus, ea)?;
                        let dword = match instr.mnemonic {
                            Mnemonic::XWISZ | Mnemonic::LWISZ => dword.wrapping_add(1),
                            _ => dword.wrapping_sub(1),
                        };
                        self.write_dword(bus, ea, dword)?;
                        self.skip_if(instr, dword == 0);
                    }
                }
            }

            Mnemonic::WSEQ
            | Mnemonic::WSNE
            | Mnemonic::WSGE
            | Mnemonic::WSGT
            | Mnemonic::WSLE
            | Mnemonic::WSLT
            | Mnemonic::WUSGT => {
                let (acs, acd) = operands!(self, instr, Operands::TwoAcc { acs, acd } => (acs, acd));
                let s = self.ac[acs];
                let d = if acs == acd { 0 } else { self.ac[acd] };
                let skip = match instr.mnemonic {
                    Mnemonic::WSEQ => s == d,
                    Mnemonic::WSNE => s != d,
                    Mnemonic::WSGE => (s as i32) >= (d as i32),
                    Mnemonic::WSGT => (s as i32) > (d as i32),
                    Mnemonic::WSLE => (s as i32) <= (d as i32),
                    Mnemonic::WSLT => (s as i32) < (d as i32),
                    _ => s > d,
                };
                self.skip_if(instr, skip);
            }

            Mnemonic::WSEQI | Mnemonic::WSNEI | Mnemonic::WSGTI | Mnemonic::WSLEI => {
                let (ac, imm) = operands!(self, instr, Operands::OneAccImm { ac, imm } => (ac, imm));
                let v = self.ac[ac] as i32;
                let skip = match instr.mnemonic {
                    Mnemonic::WSEQI => v == imm,
                    Mnemonic::WSNEI => v != imm,
                    Mnemonic::WSGTI => v > imm,
                    _ => v <= imm,
                };
                self.skip_if(instr, skip);
            }

            Mnemonic::WSKBO | Mnemonic::WSKBZ => {
                let (ac, bit) = operands!(self, instr, Operands::OneAccBit { ac, bit } => (ac, bit));
                let set = self.ac[ac] & (0x8000_0000 >> (bit & 31)) != 0;
                self.skip_if(instr, set == (instr.mnemonic == Mnemonic::WSKBO));
            }

            Mnemonic::WSZB | Mnemonic::WSNB => {
                let (acs, acd) = operands!(self, instr, Operands::TwoAcc { acs, acd } => (acs, acd));
                let (ea, mask) = self.bit_pointer32(acs, acd);
                let set = self.read_word(bus, ea)? & mask != 0;
                self.skip_if(instr, set == (instr.mnemonic == Mnemonic::WSNB));
            }

            Mnemonic::WCLM => {
                let (acs, acd) = operands!(self, instr, Operands::TwoAcc { acs, acd } => (acs, acd));
                let val = self.ac[acs] as i32;
                let (lo, hi, words) = if acs == acd {
                    let lo = self.read_dword(bus, self.pc.wrapping_add(1))?;
                    let hi = self.read_dword(bus, self.pc.wrapping_add(3))?;
                    (lo, hi, 5)
                } else {
                    let limits = self.ac[acd];
                    let lo = self.read_dword(bus, limits)?;
                    let hi = self.read_dword(bus, limits.wrapping_add(2))?;
                    (lo, hi, 1)
                };
                let in_range = val >= lo as i32 && val <= hi as i32;
                self.advance(if in_range { words + 1 } else { words });
            }

            Mnemonic::ISZTS | Mnemonic::DSZTS => {
                let sp = self.wide_reg(bus, WSP_LOC)?;
                let dword = self.read_dword(bus, sp)?;
                let dword = if instr.mnemonic == Mnemonic::ISZTS {
                    dword.wrapping_add(1)
                } else {
                    dword.wrapping_sub(1)
                };
                self.write_dword(bus, sp, dword)?;
                self.skip_if(instr, dword == 0);
            }

            Mnemonic::XCALL | Mnemonic::LCALL => {
                let (ind, mode, disp, arg_count) = operands!(self, instr,
                    Operands::Call { ind, mode, disp, arg_count } => (ind, mode, disp, arg_count));
                let ea = self.resolve32(bus, ind, mode, disp)?;
                if arg_count & 0x8000 == 0 {
                    self.wsp_push(bus, u32::from(arg_count))?;
                }
                self.ac[3] = self.pc.wrapping_add(instr.len);
                self.pc = ea;
            }

            Mnemonic::LDSP => {
                let (ac, ind, mode, disp) = operands!(self, instr,
                    Operands::OneAccEffAddr { ac, ind, mode, disp } => (ac, ind, mode, disp));
                let table = self.resolve32(bus, ind, mode, disp)?;
                let lo = self.read_dword(bus, table.wrapping_sub(4))? as i32;
                let hi = self.read_dword(bus, table.wrapping_sub(2))? as i32;
                let val = self.ac[ac] as i32;
                if val < lo || val > hi {
                    self.advance(instr.len);
                } else {
                    let slot = table.wrapping_add((val.wrapping_sub(lo) as u32).wrapping_mul(2));
                    match self.read_dword(bus, slot)? {
                        0xffff_ffff => self.advance(instr.len),
                        entry => self.pc = slot.wrapping_add(entry) & 0x7fff_ffff,
                    }
                }
            }

            Mnemonic::XNDO | Mnemonic::LNDO => {
                let (ac, ind, mode, disp, offset) = operands!(self, instr,
                    Operands::Do { ac, ind, mode, disp, offset } => (ac, ind, mode, disp, offset));
                let ea = self.resolve32(bus, ind, mode, disp)?;
                let limit = self.ac[ac] as i32;
                let var = (self.read_word(bus, ea)?).wrapping_add(1);
                self.write_word(bus, ea, var)?;
                self.ac[ac] = sext16(var);
                if i32::from(var as i16) > limit {
                    self.pc = self.pc.wrapping_add(1).wrapping_add(i32::from(offset) as u32);
                } else {
                    self.advance(instr.len);
                }
            }

            _ => return Err(self.unimplemented(instr)),
        }
        Ok(())
    }

    pub(super) fn eagle_io(&mut self, bus: &mut Bus, instr: &DecodedInstruction) -> Result<(), CpuError> {
        if !self.io_allowed() {
            return Err(ExecutionFault::IoProtection {
                segment: self.segment() as u8,
            }
            .into());
        }

        match instr.mnemonic {
            Mnemonic::CIO | Mnemonic::CIOI => {
                let (acd, command) = match instr.operands {
                    Operands::TwoAcc { acs, acd } => (acd, self.ac16(acs)),
                    Operands::TwoAccImm { acs, acd, imm } if acs == acd => (acd, imm),
                    Operands::TwoAccImm { acs, acd, imm } => (acd, imm | self.ac16(acs)),
                    _ => return Err(self.bad_operands(instr)),
                };
                let reg = command & 0x0fff;
                if command & 0x8000 != 0 {
                    bus.map.write_reg(reg, self.ac16(acd));
                } else {
                    self.ac[acd] = u32::from(bus.map.read_reg(reg));
                }
            }
            Mnemonic::WLMP => {
                let mut count = self.ac[1];
                let mut slot = self.ac[2];
                let mut addr = self.ac[0];
                while count > 0 {
                    let val = self.read_dword(bus, addr)?;
                    bus.map.set_slot(slot as usize, val);
                    slot = slot.wrapping_add(1);
                    addr = addr.wrapping_add(2);
                    count -= 1;
                }
                self.ac[0] = addr;
                self.ac[1] = 0;
                self.ac[2] = slot;
            }
            Mnemonic::NCLID => {
                self.ac[0] = u32::from(CPU_MODEL_NO);
                self.ac[1] = u32::from(UCODE_REV);
                self.ac[2] = memory_pages(bus);
            }
            Mnemonic::LCPID => {
                self.ac[0] = u32::from(CPU_MODEL_NO) << 16
                    | u32::from(UCODE_REV) << 8
                    | (memory_pages(bus) & 0xff);
            }
            Mnemonic::LSBRA => {
                let base = self.ac[0];
                for i in 0..self.sbr.len() {
                    let w = self.read_dword(bus, base.wrapping_add(2 * i as u32))?;
                    self.sbr[i] = Sbr::from_word(w);
                    debug!("CPU SBR{} <- {:#010x} {:?}", i, w, self.sbr[i]);
                }
                self.atu = self.sbr.iter().any(|sbr| sbr.valid);
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
    use crate::cpu::WFP_LOC;

    #[test]
    fn wide_branch_is_relative() {
        // WBR -2
        do_with_program(&[0, 0, 0xfbb8], |cpu, bus| {
            cpu.set_pc(BASE + 2);
            cpu.step(bus).unwrap();
            assert_eq!(BASE, cpu.pc);
        });
    }

    #[test]
    fn extended_jump_to_subroutine() {
        do_with_program(&[0x83a9, 0o3000], |cpu, bus| {
            cpu.step(bus).unwrap();
            assert_eq!(0o3000, cpu.pc);
            assert_eq!(BASE + 2, cpu.ac[3]);
        });
    }

    #[test]
    fn increments_and_skips_on_zero() {
        // XNISZ 0o3000 / XWDSZ 0o3002
        do_with_program(&[0x8639, 0o3000, 0, 0x83b9, 0o3002], |cpu, bus| {
            bus.mem.write_word(0o3000, 0xffff).unwrap();
            bus.mem.write_dword(0o3002, 2).unwrap();
            cpu.step(bus).unwrap();
            assert_eq!(BASE + 3, cpu.pc);
            cpu.step(bus).unwrap();
            assert_eq!(BASE + 5, cpu.pc);
            assert_eq!(1, bus.mem.read_dword(0o3002).unwrap());
        });
    }

    #[test]
    fn wide_compares_signed_and_unsigned() {
        // WSGT 0,1 / WUSGT 0,1 / WSEQ 2,2
        do_with_program(&[0x89d9, 0, 0x89f9, 0xd1a9], |cpu, bus| {
            cpu.ac = [5, 0xffff_ffff, 0, 0];
            cpu.step(bus).unwrap();
            assert_eq!(BASE + 2, cpu.pc);
            cpu.step(bus).unwrap();
            assert_eq!(BASE + 3, cpu.pc);
            cpu.step(bus).unwrap();
            assert_eq!(BASE + 5, cpu.pc);
        });
    }

    #[test]
    fn compares_against_immediate() {
        // WSEQI 0,-2
        do_with_program(&[0xe6c9, 0xfffe], |cpu, bus| {
            cpu.ac[0] = 0xffff_fffe;
            cpu.step(bus).unwrap();
            assert_eq!(BASE + 3, cpu.pc);
        });
    }

    #[test]
    fn skips_on_accumulator_bit() {
        // WSKBO 1,31
        do_with_program(&[0xe879, 0xe879], |cpu, bus| {
            cpu.ac[1] = 1;
            cpu.step(bus).unwrap();
            assert_eq!(BASE + 2, cpu.pc);
            cpu.set_pc(BASE);
            cpu.ac[1] = 0x8000_0000;
            cpu.step(bus).unwrap();
            assert_eq!(BASE + 1, cpu.pc);
        });
    }

    #[test]
    fn wide_compare_to_inline_limits() {
        // WCLM 1,1
        do_with_program(&[0xad69, 0, 10, 0, 20], |cpu, bus| {
            cpu.ac[1] = 15;
            cpu.step(bus).unwrap();
            assert_eq!(BASE + 6, cpu.pc);
            cpu.set_pc(BASE);
            cpu.ac[1] = 21;
            cpu.step(bus).unwrap();
            assert_eq!(BASE + 5, cpu.pc);
        });
    }

    #[test]
    fn increments_top_of_stack() {
        do_with_program(&[0xc7c9], |cpu, bus| {
            bus.mem.write_dword(WSP_LOC, 0o4000).unwrap();
            bus.mem.write_dword(0o4000, 0xffff_ffff).unwrap();
            cpu.step(bus).unwrap();
            assert_eq!(BASE + 2, cpu.pc);
            assert_eq!(0, bus.mem.read_dword(0o4000).unwrap());
        });
    }

    #[test]
    fn call_pushes_argument_count() {
        // XCALL 0o3000,2
        do_with_program(&[0x8609, 0o3000, 2], |cpu, bus| {
            bus.mem.write_dword(WSP_LOC, 0o4000).unwrap();
            bus.mem.write_dword(WFP_LOC, 0o4000).unwrap();
            cpu.step(bus).unwrap();
            assert_eq!(0o3000, cpu.pc);
            assert_eq!(BASE + 3, cpu.ac[3]);
            assert_eq!(2, bus.mem.read_dword(0o4002).unwrap());
        });
    }

    #[test]
    fn dispatches_self_relative() {
        // LDSP 0,0o3004
        do_with_program(&[0x8519, 0, 0o3004], |cpu, bus| {
            bus.mem.write_dword(0o3000, 1).unwrap();
            bus.mem.write_dword(0o3002, 3).unwrap();
            bus.mem.write_dword(0o3004, 0o100).unwrap();
            bus.mem.write_dword(0o3006, 0xffff_ffff).unwrap();
            cpu.ac[0] = 1;
            cpu.step(bus).unwrap();
            assert_eq!(0o3104, cpu.pc);

            for &v in &[2, 4] {
                cpu.set_pc(BASE);
                cpu.ac[0] = v;
                cpu.step(bus).unwrap();
                assert_eq!(BASE + 3, cpu.pc);
            }
        });
    }

    #[test]
    fn dispatch_index_wraps_across_full_range() {
        // LDSP 0,0o3004 with limits spanning every 32-bit index
        do_with_program(&[0x8519, 0, 0o3004], |cpu, bus| {
            bus.mem.write_dword(0o3000, i32::MIN as u32).unwrap();
            bus.mem.write_dword(0o3002, i32::MAX as u32).unwrap();
            bus.mem.write_dword(0o3004, 0o100).unwrap();
            cpu.ac[0] = i32::MAX as u32;
            cpu.step(bus).unwrap();
            // The slot wraps back onto the upper limit word.
            assert_eq!(0o3001, cpu.pc);

            cpu.set_pc(BASE);
            cpu.ac[0] = i32::MIN as u32;
            cpu.step(bus).unwrap();
            assert_eq!(0o3104, cpu.pc);
        });
    }

    #[test]
    fn do_loop_terminates_past_limit() {
        // XNDO 1,var,+5
        do_with_program(&[0xa219, 5, 0o3000], |cpu, bus| {
            bus.mem.write_word(0o3000, 2).unwrap();
            cpu.ac[1] = 3;
            cpu.step(bus).unwrap();
            assert_eq!(BASE + 3, cpu.pc);
            assert_eq!(3, cpu.ac[1]);

            cpu.set_pc(BASE);
            cpu.step(bus).unwrap();
            assert_eq!(BASE + 6, cpu.pc);
            assert_eq!(4, bus.mem[0o3000]);
        });
    }

    #[test]
    fn reads_and_writes_map_registers() {
        // CIO 0,1 / CIO 0,2 / CIOI 3,3
        do_with_program(&[0x8de9, 0x95e9, 0xfdf9, 0o0001], |cpu, bus| {
            cpu.ac[0] = 0x8001;
            cpu.ac[1] = 3;
            cpu.step(bus).unwrap();
            assert_eq!(3, bus.map.read_reg(1));
            cpu.ac[0] = 0x0001;
            cpu.step(bus).unwrap();
            assert_eq!(3, cpu.ac[2]);
            cpu.step(bus).unwrap();
            assert_eq!(3, cpu.ac[3]);
            assert_eq!(BASE + 4, cpu.pc);
        });
    }

    #[test]
    fn loads_map_slots_from_memory() {
        do_with_program(&[0xa7f9], |cpu, bus| {
            bus.mem.write_dword(0o3000, 3).unwrap();
            bus.mem.write_dword(0o3002, 7).unwrap();
            cpu.ac[0] = 0o3000;
            cpu.ac[1] = 2;
            cpu.ac[2] = 0;
            cpu.step(bus).unwrap();
            assert_eq!(3, bus.map.slot(0));
            assert_eq!(7, bus.map.slot(1));
            assert_eq!([0o3004, 0, 2], [cpu.ac[0], cpu.ac[1], cpu.ac[2]]);
        });
    }

    #[test]
    fn identifies_the_processor() {
        // NCLID / LCPID
        do_with_program(&[0x683f, 0x85c9], |cpu, bus| {
            cpu.step(bus).unwrap();
            assert_eq!(u32::from(CPU_MODEL_NO), cpu.ac[0]);
            assert_eq!(u32::from(UCODE_REV), cpu.ac[1]);
            assert_eq!(1, cpu.ac[2]);
            cpu.step(bus).unwrap();
            assert_eq!(0x224c_0401, cpu.ac[0]);
        });
    }

    #[test]
    fn loading_segment_registers_enables_translation() {
        do_with_program(&[0x8fa9], |cpu, bus| {
            bus.mem.write_dword(0o3000, 0x9000_0000).unwrap();
            cpu.ac[0] = 0o3000;
            cpu.step(bus).unwrap();
            assert!(cpu.atu);
            assert!(cpu.sbr[0].valid);
            assert!(cpu.sbr[0].io);
            assert!(!cpu.sbr[1].valid);
            assert_eq!(BASE + 1, cpu.pc);
        });
    }
}
