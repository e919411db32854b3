#![allow(clippy::unreadable_literal)]

use crate::bus::Bus;
use crate::decode::{self, DecodeContext, DecodedInstruction};
use crate::err::*;
use crate::instr::InstrClass;

use log::{debug, trace};

/// Pull the expected operand payload out of a decoded instruction, or fail
/// the instruction.
macro_rules! operands {
    ($cpu:expr, $instr:expr, $pat:pat => $out:expr) => {
        match $instr.operands {
            $pat => $out,
            _ => return Err($cpu.bad_operands($instr)),
        }
    };
}

mod eagle_mem;
mod eagle_op;
mod eagle_pc;
mod eclipse;
mod nova;
mod resolve;

pub use self::resolve::MAX_INDIRECTION;

///
/// Low-memory locations holding stack registers, relative to the current segment.
///
pub const WFP_LOC: u32 = 0o20;
pub const WSP_LOC: u32 = 0o22;
pub const WSL_LOC: u32 = 0o24;
pub const WSB_LOC: u32 = 0o26;
pub const NSP_LOC: u32 = 0o40;
pub const NFP_LOC: u32 = 0o41;
pub const NSL_LOC: u32 = 0o42;
pub const NSF_LOC: u32 = 0o43;

/// Ring/segment field of a 32-bit logical address.
pub const RING_MASK: u32 = 0x7000_0000;
const OFFSET_MASK: u32 = 0x0fff_ffff;

pub const CPU_MODEL_NO: u16 = 0x224c;
pub const UCODE_REV: u16 = 0x04;

///
/// Segment base register.
///
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Sbr {
    pub valid: bool,
    pub two_level: bool,
    pub lef: bool,
    pub io: bool,
    /// Physical word address of the segment's first page.
    pub base: u32,
}

impl Sbr {
    pub fn from_word(w: u32) -> Sbr {
        Sbr {
            valid: w & 0x8000_0000 != 0,
            two_level: w & 0x4000_0000 != 0,
            lef: w & 0x2000_0000 != 0,
            io: w & 0x1000_0000 != 0,
            base: (w & 0x7ffff) << 10,
        }
    }

    pub fn to_word(self) -> u32 {
        let mut w = (self.base >> 10) & 0x7ffff;
        if self.valid {
            w |= 0x8000_0000;
        }
        if self.two_level {
            w |= 0x4000_0000;
        }
        if self.lef {
            w |= 0x2000_0000;
        }
        if self.io {
            w |= 0x1000_0000;
        }
        w
    }
}

#[derive(Debug)]
pub struct Cpu {
    //
    // Accumulators are 32 bits wide. Nova and Eclipse instructions only
    // ever see or change the low 16 bits.
    //
    pub ac: [u32; 4],
    pub pc: u32,
    pub carry: bool,
    pub ion: bool,
    pub atu: bool,
    pub sbr: [Sbr; 8],
    /// Interrupt mask set by MSKO.
    pub mask: u16,
    /// Console data switches, read by READS.
    pub switches: u16,
    steps: u64,
}

impl Default for Cpu {
    fn default() -> Self {
        Cpu::new()
    }
}

impl Cpu {
    pub fn new() -> Cpu {
        Cpu {
            ac: [0; 4],
            pc: 0,
            carry: false,
            ion: false,
            atu: false,
            sbr: [Sbr::default(); 8],
            mask: 0,
            switches: 0,
            steps: 0,
        }
    }

    /// Reset the CPU to its power-up state.
    pub fn reset(&mut self) {
        *self = Cpu {
            switches: self.switches,
            ..Cpu::new()
        };
    }

    pub fn ac16(&self, n: usize) -> u16 {
        self.ac[n] as u16
    }

    /// Set the low 16 bits of an accumulator, leaving the upper half alone.
    pub fn set_ac16(&mut self, n: usize, val: u16) {
        self.ac[n] = (self.ac[n] & 0xffff_0000) | u32::from(val);
    }

    pub fn segment(&self) -> usize {
        ((self.pc & RING_MASK) >> 28) as usize
    }

    /// LEF mode is in force when the current segment permits it.
    pub fn lef_mode(&self) -> bool {
        self.atu && self.sbr[self.segment()].lef
    }

    pub fn io_allowed(&self) -> bool {
        !self.atu || self.sbr[self.segment()].io
    }

    pub fn decode_context(&self, disassemble: bool) -> DecodeContext {
        DecodeContext {
            lef_mode: self.lef_mode(),
            disassemble,
        }
    }

    pub fn get_steps(&self) -> u64 {
        self.steps
    }

    pub fn set_pc(&mut self, val: u32) {
        self.pc = val;
    }

    fn advance(&mut self, words: u32) {
        self.pc = self.pc.wrapping_add(words);
    }

    /// Skip the next instruction when `skip` holds; otherwise fall through.
    fn skip_if(&mut self, instr: &DecodedInstruction, skip: bool) {
        self.advance(instr.len + if skip { 1 } else { 0 });
    }

    /// Translate a logical address to a physical word address.
    pub fn translate(&self, ea: u32) -> Result<u32, CpuError> {
        if !self.atu {
            return Ok(ea & OFFSET_MASK);
        }
        let segment = ((ea & RING_MASK) >> 28) as u8;
        let sbr = &self.sbr[segment as usize];
        if !sbr.valid {
            return Err(ExecutionFault::SegmentInvalid {
                segment,
                address: ea,
            }
            .into());
        }
        Ok(sbr.base.wrapping_add(ea & OFFSET_MASK))
    }

    /// Address of a low-memory location in the current segment.
    fn seg_addr(&self, loc: u32) -> u32 {
        (self.pc & RING_MASK) | loc
    }

    pub fn read_word(&self, bus: &Bus, ea: u32) -> Result<u16, CpuError> {
        Ok(bus.mem.read_word(self.translate(ea)?)?)
    }

    pub fn write_word(&self, bus: &mut Bus, ea: u32, val: u16) -> Result<(), CpuError> {
        Ok(bus.mem.write_word(self.translate(ea)?, val)?)
    }

    pub fn read_dword(&self, bus: &Bus, ea: u32) -> Result<u32, CpuError> {
        Ok(bus.mem.read_dword(self.translate(ea)?)?)
    }

    pub fn write_dword(&self, bus: &mut Bus, ea: u32, val: u32) -> Result<(), CpuError> {
        Ok(bus.mem.write_dword(self.translate(ea)?, val)?)
    }

    pub fn read_byte(&self, bus: &Bus, ea: u32, lo_byte: bool) -> Result<u8, CpuError> {
        Ok(bus.mem.read_byte(self.translate(ea)?, lo_byte)?)
    }

    pub fn write_byte(&self, bus: &mut Bus, ea: u32, lo_byte: bool, val: u8) -> Result<(), CpuError> {
        Ok(bus.mem.write_byte(self.translate(ea)?, lo_byte, val)?)
    }

    /// Read a byte by byte address. The ring field sits one bit higher
    /// than in a word address.
    pub fn read_byte_ba(&self, bus: &Bus, byte_addr: u32) -> Result<u8, CpuError> {
        self.read_byte(bus, byte_addr >> 1, byte_addr & 1 == 1)
    }

    pub fn write_byte_ba(&self, bus: &mut Bus, byte_addr: u32, val: u8) -> Result<(), CpuError> {
        self.write_byte(bus, byte_addr >> 1, byte_addr & 1 == 1, val)
    }

    //
    // Narrow (16-bit) stack.
    //

    pub fn nsp(&self, bus: &Bus) -> Result<u16, CpuError> {
        self.read_word(bus, self.seg_addr(NSP_LOC))
    }

    pub fn set_nsp(&self, bus: &mut Bus, val: u16) -> Result<(), CpuError> {
        self.write_word(bus, self.seg_addr(NSP_LOC), val)
    }

    pub fn nfp(&self, bus: &Bus) -> Result<u16, CpuError> {
        self.read_word(bus, self.seg_addr(NFP_LOC))
    }

    pub fn set_nfp(&self, bus: &mut Bus, val: u16) -> Result<(), CpuError> {
        self.write_word(bus, self.seg_addr(NFP_LOC), val)
    }

    pub fn nsp_push(&self, bus: &mut Bus, val: u16) -> Result<(), CpuError> {
        let sp = self.nsp(bus)?.wrapping_add(1);
        self.write_word(bus, self.seg_addr(u32::from(sp)), val)?;
        self.set_nsp(bus, sp)
    }

    pub fn nsp_pop(&self, bus: &mut Bus) -> Result<u16, CpuError> {
        let sp = self.nsp(bus)?;
        let val = self.read_word(bus, self.seg_addr(u32::from(sp)))?;
        self.set_nsp(bus, sp.wrapping_sub(1))?;
        Ok(val)
    }

    /// Touch every word a push (or pop) of `n` words from `sp` will use, so a
    /// multi-word transfer faults before anything has moved.
    pub fn nsp_reserve(&self, bus: &Bus, sp: u16, n: u16, push: bool) -> Result<(), CpuError> {
        for i in 0..n {
            let at = if push { sp.wrapping_add(i + 1) } else { sp.wrapping_sub(i) };
            self.read_word(bus, self.seg_addr(u32::from(at)))?;
        }
        Ok(())
    }

    //
    // Wide (32-bit) stack.
    //

    pub fn wide_reg(&self, bus: &Bus, loc: u32) -> Result<u32, CpuError> {
        self.read_dword(bus, self.seg_addr(loc))
    }

    pub fn set_wide_reg(&self, bus: &mut Bus, loc: u32, val: u32) -> Result<(), CpuError> {
        trace!("CPU wide stack register {:#o} <- {:#o}", loc, val);
        self.write_dword(bus, self.seg_addr(loc), val)
    }

    pub fn wsp_push(&self, bus: &mut Bus, val: u32) -> Result<(), CpuError> {
        let sp = self.wide_reg(bus, WSP_LOC)?.wrapping_add(2);
        self.write_dword(bus, sp, val)?;
        self.set_wide_reg(bus, WSP_LOC, sp)
    }

    pub fn wsp_pop(&self, bus: &mut Bus) -> Result<u32, CpuError> {
        let sp = self.wide_reg(bus, WSP_LOC)?;
        let val = self.read_dword(bus, sp)?;
        self.set_wide_reg(bus, WSP_LOC, sp.wrapping_sub(2))?;
        Ok(val)
    }

    pub fn wsp_reserve(&self, bus: &Bus, sp: u32, n: u32, push: bool) -> Result<(), CpuError> {
        for i in 0..n {
            let at = if push {
                sp.wrapping_add(2 * (i + 1))
            } else {
                sp.wrapping_sub(2 * i)
            };
            self.read_dword(bus, at)?;
        }
        Ok(())
    }

    pub(crate) fn unimplemented(&self, instr: &DecodedInstruction) -> CpuError {
        ExecutionFault::Unimplemented {
            mnemonic: instr.name(),
            pc: self.pc,
        }
        .into()
    }

    pub(crate) fn bad_operands(&self, instr: &DecodedInstruction) -> CpuError {
        debug!("CPU operand payload does not fit {}: {:?}", instr.name(), instr.operands);
        self.unimplemented(instr)
    }

    /// Fetch and decode the instruction at PC without executing it.
    pub fn fetch(&self, bus: &Bus, disassemble: bool) -> Result<DecodedInstruction, CpuError> {
        let phys = self.translate(self.pc)?;
        let opcode = bus.mem.read_word(phys)?;
        decode::decode(&bus.mem, opcode, phys, self.decode_context(disassemble))
    }

    /// Execute one decoded instruction, dispatching on its class.
    pub fn execute(&mut self, bus: &mut Bus, instr: &DecodedInstruction) -> Result<(), CpuError> {
        match instr.class {
            InstrClass::NovaMemRef => self.nova_mem_ref(bus, instr)?,
            InstrClass::NovaOp => self.nova_op(instr)?,
            InstrClass::NovaIo => self.nova_io(bus, instr)?,
            InstrClass::NovaPc => self.nova_pc(bus, instr)?,
            InstrClass::EclipseMemRef => self.eclipse_mem_ref(bus, instr)?,
            InstrClass::EclipseOp => self.eclipse_op(bus, instr)?,
            InstrClass::EclipsePc => self.eclipse_pc(bus, instr)?,
            InstrClass::EclipseStack => self.eclipse_stack(bus, instr)?,
            InstrClass::EagleMemRef => self.eagle_mem_ref(bus, instr)?,
            InstrClass::EagleOp => self.eagle_op(bus, instr)?,
            InstrClass::EagleIo => self.eagle_io(bus, instr)?,
            InstrClass::EaglePc => self.eagle_pc(bus, instr)?,
            InstrClass::EagleStack => self.eagle_stack(bus, instr)?,
        }
        self.steps += 1;
        Ok(())
    }

    /// Step the CPU by one instruction.
    pub fn step(&mut self, bus: &mut Bus) -> Result<(), CpuError> {
        let instr = self.fetch(bus, false)?;
        self.execute(bus, &instr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Bus;

    pub(crate) const BASE: u32 = 0o1000;

    /// Helper function to set up and prepare a cpu and bus
    /// with a supplied program.
    pub(crate) fn do_with_program<F>(program: &[u16], test: F)
    where
        F: Fn(&mut Cpu, &mut Bus),
    {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut cpu: Cpu = Cpu::new();
        let mut bus: Bus = Bus::new(0x10000);

        bus.load(BASE, program).unwrap();
        cpu.set_pc(BASE);

        test(&mut cpu, &mut bus);
    }

    #[test]
    fn accumulator_halves() {
        let mut cpu = Cpu::new();
        cpu.ac[1] = 0x1234_5678;
        assert_eq!(0x5678, cpu.ac16(1));
        cpu.set_ac16(1, 0xabcd);
        assert_eq!(0x1234_abcd, cpu.ac[1]);
    }

    #[test]
    fn sbr_words_round_trip() {
        let sbr = Sbr::from_word(0xb000_0012);
        assert!(sbr.valid);
        assert!(!sbr.two_level);
        assert!(sbr.lef);
        assert!(sbr.io);
        assert_eq!(0x12 << 10, sbr.base);
        assert_eq!(0xb000_0012, sbr.to_word());
    }

    #[test]
    fn translates_addresses() {
        let mut cpu = Cpu::new();
        assert_eq!(0o1234, cpu.translate(0x7000_0000 | 0o1234).unwrap());

        cpu.atu = true;
        cpu.sbr[7] = Sbr {
            valid: true,
            base: 0x4000,
            ..Sbr::default()
        };
        assert_eq!(0x4000 + 0o1234, cpu.translate(0x7000_0000 | 0o1234).unwrap());
        assert_eq!(
            Err(CpuError::Fault(ExecutionFault::SegmentInvalid {
                segment: 3,
                address: 0x3000_0000
            })),
            cpu.translate(0x3000_0000)
        );
    }

    #[test]
    fn lef_mode_follows_current_segment() {
        let mut cpu = Cpu::new();
        cpu.sbr[0].lef = true;
        assert!(!cpu.lef_mode());
        cpu.atu = true;
        assert!(cpu.lef_mode());
        assert!(!cpu.io_allowed());
        cpu.pc = 0x1000_0000;
        assert!(!cpu.lef_mode());
    }

    #[test]
    fn narrow_stack_pushes_then_increments() {
        do_with_program(&[], |cpu, bus| {
            bus.mem.write_word(NSP_LOC, 0o2000).unwrap();
            cpu.nsp_push(bus, 0o123).unwrap();
            assert_eq!(0o2001, bus.mem[NSP_LOC as usize]);
            assert_eq!(0o123, bus.mem[0o2001]);
            assert_eq!(0o123, cpu.nsp_pop(bus).unwrap());
            assert_eq!(0o2000, bus.mem[NSP_LOC as usize]);
        });
    }

    #[test]
    fn wide_stack_moves_by_two() {
        do_with_program(&[], |cpu, bus| {
            bus.mem.write_dword(WSP_LOC, 0o4000).unwrap();
            cpu.wsp_push(bus, 0xdead_beef).unwrap();
            assert_eq!(0o4002, bus.mem.read_dword(WSP_LOC).unwrap());
            assert_eq!(0xdead_beef, bus.mem.read_dword(0o4002).unwrap());
            assert_eq!(0xdead_beef, cpu.wsp_pop(bus).unwrap());
            assert_eq!(0o4000, bus.mem.read_dword(WSP_LOC).unwrap());
        });
    }

    #[test]
    fn steps_through_a_program() {
        // LDA 0,4,PC / INC 0,0 / STA 0,2,PC / HALT / 41
        let program = [0o020404, 0o101400, 0o040402, 0o063077, 0o41];
        do_with_program(&program, |cpu, bus| {
            cpu.step(bus).unwrap();
            assert_eq!(0o41, cpu.ac[0]);
            cpu.step(bus).unwrap();
            assert_eq!(0o42, cpu.ac[0]);
            cpu.step(bus).unwrap();
            assert_eq!(0o42, bus.mem[BASE as usize + 4]);
            assert_eq!(
                Err(CpuError::Fault(ExecutionFault::Halt { pc: BASE + 3 })),
                cpu.step(bus)
            );
            assert_eq!(BASE + 3, cpu.pc);
            assert_eq!(3, cpu.get_steps());
        });
    }

    #[test]
    fn reports_undecodable_instruction() {
        do_with_program(&[0x8718], |cpu, bus| match cpu.step(bus) {
            Err(CpuError::Decode(DecodeError::NoMatch { opcode, pc })) => {
                assert_eq!(0x8718, opcode);
                assert_eq!(BASE, pc);
            }
            other => panic!("unexpected {:?}", other),
        });
    }
}
