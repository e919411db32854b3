use crate::err::{CpuError, DecodeError};
use crate::instr::{self, InstrClass, Layout, Mnemonic};
use crate::mem::MainStore;

use log::trace;
use std::fmt;

/// Index mode of a memory-reference instruction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IndexMode {
    Absolute,
    Pc,
    Ac2,
    Ac3,
}

impl IndexMode {
    fn from_bits(bits: u16) -> IndexMode {
        match bits & 3 {
            0 => IndexMode::Absolute,
            1 => IndexMode::Pc,
            2 => IndexMode::Ac2,
            _ => IndexMode::Ac3,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            IndexMode::Absolute => "",
            IndexMode::Pc => ",PC",
            IndexMode::Ac2 => ",AC2",
            IndexMode::Ac3 => ",AC3",
        }
    }
}

/// Carry preset applied before a Nova operate instruction's function.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CarryOp {
    None,
    Zero,
    One,
    Complement,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ShiftOp {
    None,
    Left,
    Right,
    Swap,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SkipOp {
    Never,
    Always,
    Szc,
    Snc,
    Szr,
    Snr,
    Sez,
    Sbn,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IoFlag {
    None,
    Start,
    Clear,
    Pulse,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IoTest {
    BusyNonZero,
    BusyZero,
    DoneNonZero,
    DoneZero,
}

/// Operand payload. Several layouts share a payload shape.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Operands {
    None,
    Word(u16),
    NoAccEffAddr {
        ind: bool,
        mode: IndexMode,
        disp: i32,
    },
    OneAccEffAddr {
        ac: usize,
        ind: bool,
        mode: IndexMode,
        disp: i32,
    },
    /// Byte reference: word displacement plus byte selector.
    ByteAddr {
        ac: Option<usize>,
        mode: IndexMode,
        disp: i32,
        lo_byte: bool,
    },
    MultOp {
        acs: usize,
        acd: usize,
        shift: ShiftOp,
        carry: CarryOp,
        no_load: bool,
        skip: SkipOp,
    },
    DataIo {
        ac: usize,
        flag: IoFlag,
        dev: u8,
    },
    FlagsDev {
        flag: IoFlag,
        dev: u8,
    },
    TestDev {
        test: IoTest,
        dev: u8,
    },
    OneAcc {
        ac: usize,
    },
    TwoAcc {
        acs: usize,
        acd: usize,
    },
    /// Biased 2-bit immediate, already decoded to 1..=4.
    ImmOneAcc {
        imm: u16,
        ac: usize,
    },
    OneAccImm {
        ac: usize,
        imm: i32,
    },
    TwoAccImm {
        acs: usize,
        acd: usize,
        imm: u16,
    },
    Call {
        ind: bool,
        mode: IndexMode,
        disp: i32,
        arg_count: u16,
    },
    Branch {
        disp: i32,
    },
    OneAccBit {
        ac: usize,
        bit: u8,
    },
    Do {
        ac: usize,
        ind: bool,
        mode: IndexMode,
        disp: i32,
        offset: i16,
    },
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DecodeContext {
    pub lef_mode: bool,
    pub disassemble: bool,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DecodedInstruction {
    pub mnemonic: Mnemonic,
    pub layout: Layout,
    pub class: InstrClass,
    pub len: u32,
    pub opcode: u16,
    pub operands: Operands,
    pub disassembly: Option<String>,
}

impl DecodedInstruction {
    pub fn name(&self) -> &'static str {
        self.mnemonic.name()
    }

    /// The accumulator an I/O instruction transfers through, if any.
    pub fn io_ac(&self) -> Option<usize> {
        match self.operands {
            Operands::DataIo { ac, .. } | Operands::OneAcc { ac } => Some(ac),
            _ => None,
        }
    }
}

impl fmt::Display for DecodedInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.disassembly {
            Some(text) => write!(f, "{}", text),
            None => write!(f, "{}", disassemble(self)),
        }
    }
}

/// Extract bits `first..=last` of a word, numbered from the most significant (bit 0).
fn field(word: u16, first: u32, last: u32) -> u16 {
    let width = last - first + 1;
    (word >> (15 - last)) & ((1u32 << width) - 1) as u16
}

fn bit(word: u16, n: u32) -> bool {
    field(word, n, n) == 1
}

pub fn decode_8bit_disp(d: u8, mode: IndexMode) -> i32 {
    if mode == IndexMode::Absolute {
        i32::from(d)
    } else {
        i32::from(d as i8)
    }
}

fn extend_15bit(d: u16, mode: IndexMode) -> i32 {
    let d = d & 0x7fff;
    if mode == IndexMode::Absolute || d & 0x4000 == 0 {
        i32::from(d)
    } else {
        i32::from((d | 0x8000) as i16)
    }
}

pub fn decode_15bit_disp(d: u16, mode: IndexMode) -> i32 {
    let disp = extend_15bit(d, mode);
    if mode == IndexMode::Pc {
        disp + 1
    } else {
        disp
    }
}

/// Narrow form used by a handful of Eclipse branch and LEF instructions:
/// the field is only 14 bits wide.
pub fn decode_15bit_eclipse_disp(d: u16, mode: IndexMode) -> i32 {
    let d = d & 0x3fff;
    let disp = if mode == IndexMode::Absolute || d & 0x2000 == 0 {
        i32::from(d)
    } else {
        i32::from((d | 0xc000) as i16)
    };
    if mode == IndexMode::Pc {
        disp + 1
    } else {
        disp
    }
}

pub fn decode_31bit_disp(hi: u16, lo: u16, mode: IndexMode) -> i32 {
    let disp = (extend_15bit(hi, mode) << 16) | i32::from(lo);
    if mode == IndexMode::Pc {
        disp.wrapping_add(1)
    } else {
        disp
    }
}

/// Split a 16-bit byte displacement into a word displacement and the
/// low-byte selector.
pub fn decode_byte_disp16(d: u16, mode: IndexMode) -> (i32, bool) {
    let disp = if mode == IndexMode::Absolute {
        i32::from(d >> 1)
    } else {
        i32::from((d as i16) >> 1)
    };
    (disp, d & 1 == 1)
}

pub fn decode_byte_disp32(d: u32, mode: IndexMode) -> (i32, bool) {
    let disp = if mode == IndexMode::Absolute {
        (d >> 1) as i32
    } else {
        (d as i32) >> 1
    };
    (disp, d & 1 == 1)
}

/// Stored values 0..=3 mean 1..=4.
pub fn decode_2bit_imm(i: u16) -> u16 {
    (i & 3) + 1
}

fn carry_op(bits: u16) -> CarryOp {
    match bits & 3 {
        0 => CarryOp::None,
        1 => CarryOp::Zero,
        2 => CarryOp::One,
        _ => CarryOp::Complement,
    }
}

fn shift_op(bits: u16) -> ShiftOp {
    match bits & 3 {
        0 => ShiftOp::None,
        1 => ShiftOp::Left,
        2 => ShiftOp::Right,
        _ => ShiftOp::Swap,
    }
}

fn skip_op(bits: u16) -> SkipOp {
    match bits & 7 {
        0 => SkipOp::Never,
        1 => SkipOp::Always,
        2 => SkipOp::Szc,
        3 => SkipOp::Snc,
        4 => SkipOp::Szr,
        5 => SkipOp::Snr,
        6 => SkipOp::Sez,
        _ => SkipOp::Sbn,
    }
}

fn io_flag(bits: u16) -> IoFlag {
    match bits & 3 {
        0 => IoFlag::None,
        1 => IoFlag::Start,
        2 => IoFlag::Clear,
        _ => IoFlag::Pulse,
    }
}

fn io_test(bits: u16) -> IoTest {
    match bits & 3 {
        0 => IoTest::BusyNonZero,
        1 => IoTest::BusyZero,
        2 => IoTest::DoneNonZero,
        _ => IoTest::DoneZero,
    }
}

fn uses_narrow_eclipse_disp(mnemonic: Mnemonic) -> bool {
    matches!(
        mnemonic,
        Mnemonic::EJMP | Mnemonic::EJSR | Mnemonic::PSHJ | Mnemonic::ELEF
    )
}

/// Decode the instruction whose first word `opcode` was fetched from
/// physical address `pc`. Trailing words are read from `pc + 1` onwards.
pub fn decode(
    mem: &MainStore,
    opcode: u16,
    pc: u32,
    ctx: DecodeContext,
) -> Result<DecodedInstruction, CpuError> {
    let desc =
        instr::find(opcode, ctx.lef_mode).ok_or(DecodeError::NoMatch { opcode, pc })?;

    let word = |n: u32| mem.read_word(pc.wrapping_add(n));

    let ac12 = || field(opcode, 1, 2) as usize;
    let ac34 = || field(opcode, 3, 4) as usize;
    let mode67 = || IndexMode::from_bits(field(opcode, 6, 7));
    let mode34 = || IndexMode::from_bits(field(opcode, 3, 4));

    let operands = match desc.layout {
        Layout::UniqueOneWord => Operands::None,
        Layout::UniqueTwoWord => Operands::Word(word(1)?),
        Layout::NovaNoAccEffAddr | Layout::NovaOneAccEffAddr => {
            let mode = mode67();
            let ind = bit(opcode, 5);
            let disp = decode_8bit_disp(opcode as u8, mode);
            if desc.layout == Layout::NovaNoAccEffAddr {
                Operands::NoAccEffAddr { ind, mode, disp }
            } else {
                Operands::OneAccEffAddr {
                    ac: ac34(),
                    ind,
                    mode,
                    disp,
                }
            }
        }
        Layout::NovaTwoAccMultOp => Operands::MultOp {
            acs: ac12(),
            acd: ac34(),
            shift: shift_op(field(opcode, 8, 9)),
            carry: carry_op(field(opcode, 10, 11)),
            no_load: bit(opcode, 12),
            skip: skip_op(field(opcode, 13, 15)),
        },
        Layout::NovaDataIo => Operands::DataIo {
            ac: ac34(),
            flag: io_flag(field(opcode, 8, 9)),
            dev: field(opcode, 10, 15) as u8,
        },
        Layout::IoFlagsDev => Operands::FlagsDev {
            flag: io_flag(field(opcode, 8, 9)),
            dev: field(opcode, 10, 15) as u8,
        },
        Layout::IoTestDev => Operands::TestDev {
            test: io_test(field(opcode, 8, 9)),
            dev: field(opcode, 10, 15) as u8,
        },
        Layout::OneAccOneWord => Operands::OneAcc { ac: ac34() },
        Layout::TwoAccOneWord => Operands::TwoAcc {
            acs: ac12(),
            acd: ac34(),
        },
        Layout::ImmOneAcc => Operands::ImmOneAcc {
            imm: decode_2bit_imm(field(opcode, 1, 2)),
            ac: ac34(),
        },
        Layout::OneAccImm2Word => Operands::OneAccImm {
            ac: ac34(),
            imm: i32::from(word(1)? as i16),
        },
        Layout::OneAccImmWd2Word => Operands::OneAccImm {
            ac: ac34(),
            imm: i32::from(word(1)?),
        },
        Layout::OneAccImmDwd3Word => Operands::OneAccImm {
            ac: ac34(),
            imm: (u32::from(word(1)?) << 16 | u32::from(word(2)?)) as i32,
        },
        Layout::TwoAccImm2Word => Operands::TwoAccImm {
            acs: ac12(),
            acd: ac34(),
            imm: word(1)?,
        },
        Layout::NoAccModeInd2WordE | Layout::OneAccModeInd2WordE => {
            let mode = mode67();
            let w = word(1)?;
            let disp = if uses_narrow_eclipse_disp(desc.mnemonic) {
                decode_15bit_eclipse_disp(w, mode)
            } else {
                decode_15bit_disp(w, mode)
            };
            let ind = bit(w, 0);
            if desc.layout == Layout::NoAccModeInd2WordE {
                Operands::NoAccEffAddr { ind, mode, disp }
            } else {
                Operands::OneAccEffAddr {
                    ac: ac34(),
                    ind,
                    mode,
                    disp,
                }
            }
        }
        Layout::OneAccMode2WordE => {
            let mode = mode67();
            let (disp, lo_byte) = decode_byte_disp16(word(1)?, mode);
            Operands::ByteAddr {
                ac: Some(ac34()),
                mode,
                disp,
                lo_byte,
            }
        }
        Layout::NoAccModeInd2WordX => {
            let mode = mode34();
            let w = word(1)?;
            Operands::NoAccEffAddr {
                ind: bit(w, 0),
                mode,
                disp: decode_15bit_disp(w, mode),
            }
        }
        Layout::OneAccModeInd2WordX => {
            let mode = mode34();
            let w = word(1)?;
            Operands::OneAccEffAddr {
                ac: ac12(),
                ind: bit(w, 0),
                mode,
                disp: decode_15bit_disp(w, mode),
            }
        }
        Layout::OneAccMode2WordXB => {
            let mode = mode34();
            let (disp, lo_byte) = decode_byte_disp16(word(1)?, mode);
            Operands::ByteAddr {
                ac: Some(ac12()),
                mode,
                disp,
                lo_byte,
            }
        }
        Layout::NoAccModeInd3Word => {
            let mode = mode34();
            let hi = word(1)?;
            Operands::NoAccEffAddr {
                ind: bit(hi, 0),
                mode,
                disp: decode_31bit_disp(hi, word(2)?, mode),
            }
        }
        Layout::OneAccModeInd3Word => {
            let mode = mode34();
            let hi = word(1)?;
            Operands::OneAccEffAddr {
                ac: ac12(),
                ind: bit(hi, 0),
                mode,
                disp: decode_31bit_disp(hi, word(2)?, mode),
            }
        }
        Layout::OneAccMode3Word | Layout::NoAccMode3Word => {
            let mode = mode34();
            let d = u32::from(word(1)?) << 16 | u32::from(word(2)?);
            let (disp, lo_byte) = decode_byte_disp32(d, mode);
            let ac = if desc.layout == Layout::OneAccMode3Word {
                Some(ac12())
            } else {
                None
            };
            Operands::ByteAddr {
                ac,
                mode,
                disp,
                lo_byte,
            }
        }
        Layout::NoAccModeInd3WordXcall => {
            let mode = mode34();
            let w = word(1)?;
            Operands::Call {
                ind: bit(w, 0),
                mode,
                disp: decode_15bit_disp(w, mode),
                arg_count: word(2)?,
            }
        }
        Layout::NoAccModeInd4WordLcall => {
            let mode = mode34();
            let hi = word(1)?;
            Operands::Call {
                ind: bit(hi, 0),
                mode,
                disp: decode_31bit_disp(hi, word(2)?, mode),
                arg_count: word(3)?,
            }
        }
        Layout::SplitEightBitDisp => {
            let d = (field(opcode, 1, 4) << 4 | field(opcode, 6, 9)) as u8;
            Operands::Branch {
                disp: decode_8bit_disp(d, IndexMode::Pc),
            }
        }
        Layout::OneAccBit => Operands::OneAccBit {
            ac: ac34(),
            bit: (field(opcode, 1, 2) << 3 | field(opcode, 9, 11)) as u8,
        },
        Layout::ThreeWordDo => {
            let mode = mode34();
            let w = word(2)?;
            Operands::Do {
                ac: ac12(),
                ind: bit(w, 0),
                mode,
                disp: decode_15bit_disp(w, mode),
                offset: word(1)? as i16,
            }
        }
        Layout::FourWordDo => {
            let mode = mode34();
            let hi = word(2)?;
            Operands::Do {
                ac: ac12(),
                ind: bit(hi, 0),
                mode,
                disp: decode_31bit_disp(hi, word(3)?, mode),
                offset: word(1)? as i16,
            }
        }
    };

    let mut instr = DecodedInstruction {
        mnemonic: desc.mnemonic,
        layout: desc.layout,
        class: desc.class,
        len: u32::from(desc.len),
        opcode,
        operands,
        disassembly: None,
    };

    if ctx.disassemble {
        let text = disassemble(&instr);
        trace!("DECODE {:011o}: {}", pc, text);
        instr.disassembly = Some(text);
    }

    Ok(instr)
}

fn octal(v: i32) -> String {
    if v < 0 {
        format!("-{:o}", v.unsigned_abs())
    } else {
        format!("{:o}", v)
    }
}

fn device_name(dev: u8) -> String {
    match dev {
        0o01 => "MAP".to_owned(),
        0o10 => "TTI".to_owned(),
        0o11 => "TTO".to_owned(),
        0o14 => "RTC".to_owned(),
        0o17 => "LPT".to_owned(),
        0o22 => "MTB".to_owned(),
        0o24 => "DSKP".to_owned(),
        0o27 => "DPF".to_owned(),
        0o43 => "PIT".to_owned(),
        0o77 => "CPU".to_owned(),
        _ => format!("{:o}", dev),
    }
}

fn flag_suffix(flag: IoFlag) -> &'static str {
    match flag {
        IoFlag::None => "",
        IoFlag::Start => "S",
        IoFlag::Clear => "C",
        IoFlag::Pulse => "P",
    }
}

fn eff_addr(ind: bool, mode: IndexMode, disp: i32) -> String {
    format!("{}{}{}", if ind { "@" } else { "" }, octal(disp), mode.suffix())
}

/// Render an instruction in assembler syntax.
pub fn disassemble(instr: &DecodedInstruction) -> String {
    let name = instr.name();
    match &instr.operands {
        Operands::None => name.to_owned(),
        Operands::Word(w) => format!("{} {:o}", name, w),
        Operands::NoAccEffAddr { ind, mode, disp } => {
            format!("{} {}", name, eff_addr(*ind, *mode, *disp))
        }
        Operands::OneAccEffAddr { ac, ind, mode, disp } => {
            format!("{} {},{}", name, ac, eff_addr(*ind, *mode, *disp))
        }
        Operands::ByteAddr {
            ac,
            mode,
            disp,
            lo_byte,
        } => {
            let byte_disp = disp.wrapping_mul(2) + i32::from(*lo_byte);
            match ac {
                Some(ac) => format!("{} {},{}{}", name, ac, octal(byte_disp), mode.suffix()),
                None => format!("{} {}{}", name, octal(byte_disp), mode.suffix()),
            }
        }
        Operands::MultOp {
            acs,
            acd,
            shift,
            carry,
            no_load,
            skip,
        } => {
            let c = match carry {
                CarryOp::None => "",
                CarryOp::Zero => "Z",
                CarryOp::One => "O",
                CarryOp::Complement => "C",
            };
            let s = match shift {
                ShiftOp::None => "",
                ShiftOp::Left => "L",
                ShiftOp::Right => "R",
                ShiftOp::Swap => "S",
            };
            let k = match skip {
                SkipOp::Never => "",
                SkipOp::Always => ",SKP",
                SkipOp::Szc => ",SZC",
                SkipOp::Snc => ",SNC",
                SkipOp::Szr => ",SZR",
                SkipOp::Snr => ",SNR",
                SkipOp::Sez => ",SEZ",
                SkipOp::Sbn => ",SBN",
            };
            let nl = if *no_load { "#" } else { "" };
            format!("{}{}{}{} {},{}{}", name, c, s, nl, acs, acd, k)
        }
        Operands::DataIo { ac, flag, dev } => {
            format!("{}{} {},{}", name, flag_suffix(*flag), ac, device_name(*dev))
        }
        Operands::FlagsDev { flag, dev } => {
            format!("{}{} {}", name, flag_suffix(*flag), device_name(*dev))
        }
        Operands::TestDev { test, dev } => {
            let t = match test {
                IoTest::BusyNonZero => "BN",
                IoTest::BusyZero => "BZ",
                IoTest::DoneNonZero => "DN",
                IoTest::DoneZero => "DZ",
            };
            format!("{}{} {}", name, t, device_name(*dev))
        }
        Operands::OneAcc { ac } => format!("{} {}", name, ac),
        Operands::TwoAcc { acs, acd } => format!("{} {},{}", name, acs, acd),
        Operands::ImmOneAcc { imm, ac } => format!("{} {},{}", name, imm, ac),
        Operands::OneAccImm { ac, imm } => format!("{} {},{}", name, octal(*imm), ac),
        Operands::TwoAccImm { acs, acd, imm } => format!("{} {:o},{},{}", name, imm, acs, acd),
        Operands::Call {
            ind,
            mode,
            disp,
            arg_count,
        } => format!("{} {},{}", name, eff_addr(*ind, *mode, *disp), arg_count),
        Operands::Branch { disp } => format!("{} {}", name, octal(*disp)),
        Operands::OneAccBit { ac, bit } => format!("{} {},{}", name, bit, ac),
        Operands::Do {
            ac,
            ind,
            mode,
            disp,
            offset,
        } => format!(
            "{} {},{},{}",
            name,
            ac,
            octal(i32::from(*offset)),
            eff_addr(*ind, *mode, *disp)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: load a program at 0o100 and decode the first instruction.
    fn decode_program(program: &[u16], lef_mode: bool) -> DecodedInstruction {
        let mut mem = MainStore::new(0x1000);
        mem.load(0o100, program).unwrap();
        let ctx = DecodeContext {
            lef_mode,
            disassemble: true,
        };
        decode(&mem, program[0], 0o100, ctx).unwrap()
    }

    #[test]
    fn extracts_dg_numbered_fields() {
        assert_eq!(1, field(0x8000, 0, 0));
        assert_eq!(0b11, field(0x6000, 1, 2));
        assert_eq!(0o77, field(0x003f, 10, 15));
    }

    #[test]
    fn decodes_8bit_displacements() {
        assert_eq!(-1, decode_8bit_disp(0xff, IndexMode::Pc));
        assert_eq!(7, decode_8bit_disp(0x07, IndexMode::Pc));
        assert_eq!(255, decode_8bit_disp(0xff, IndexMode::Absolute));
        assert_eq!(-128, decode_8bit_disp(0x80, IndexMode::Ac2));
    }

    #[test]
    fn decodes_15bit_displacements() {
        assert_eq!(-300, decode_15bit_disp(0x7ed4, IndexMode::Ac2));
        assert_eq!(-299, decode_15bit_disp(0x7ed4, IndexMode::Pc));
        assert_eq!(0x7ed4, decode_15bit_disp(0x7ed4, IndexMode::Absolute));
        // The indirect bit is not part of the displacement.
        assert_eq!(5, decode_15bit_disp(0x8005, IndexMode::Ac3));
    }

    #[test]
    fn decodes_narrow_eclipse_displacements() {
        assert_eq!(0x3fff, decode_15bit_eclipse_disp(0x7fff, IndexMode::Absolute));
        assert_eq!(-1, decode_15bit_eclipse_disp(0x3fff, IndexMode::Ac2));
        assert_eq!(0, decode_15bit_eclipse_disp(0x3fff, IndexMode::Pc));
        assert_eq!(0x1000, decode_15bit_eclipse_disp(0x1000, IndexMode::Ac3));
    }

    #[test]
    fn decodes_31bit_displacements() {
        assert_eq!(0x0001_0002, decode_31bit_disp(0x0001, 0x0002, IndexMode::Absolute));
        assert_eq!(-2, decode_31bit_disp(0x7fff, 0xfffe, IndexMode::Ac2));
        assert_eq!(-1, decode_31bit_disp(0x7fff, 0xfffe, IndexMode::Pc));
        assert_eq!(0x7fff_fffe, decode_31bit_disp(0xffff, 0xfffe, IndexMode::Absolute));
    }

    #[test]
    fn decodes_byte_displacements() {
        assert_eq!((3, true), decode_byte_disp16(7, IndexMode::Absolute));
        assert_eq!((-1, false), decode_byte_disp16(0xfffe, IndexMode::Ac2));
        assert_eq!((0x7fff, false), decode_byte_disp16(0xfffe, IndexMode::Absolute));
        assert_eq!((-2, true), decode_byte_disp32(0xffff_fffd, IndexMode::Pc));
    }

    #[test]
    fn decodes_2bit_immediates() {
        assert_eq!(1, decode_2bit_imm(0));
        assert_eq!(2, decode_2bit_imm(1));
        assert_eq!(3, decode_2bit_imm(2));
        assert_eq!(4, decode_2bit_imm(3));
    }

    #[test]
    fn decodes_nova_memory_reference() {
        // LDA 1,@-3,PC
        let instr = decode_program(&[0o026775], false);
        assert_eq!(Mnemonic::LDA, instr.mnemonic);
        assert_eq!(
            Operands::OneAccEffAddr {
                ac: 1,
                ind: true,
                mode: IndexMode::Pc,
                disp: -3
            },
            instr.operands
        );
        assert_eq!(Some("LDA 1,@-3,PC".to_owned()), instr.disassembly);
    }

    #[test]
    fn decodes_nova_operate() {
        // ADDZL# 1,2,SZC
        let instr = decode_program(&[0o133132], false);
        assert_eq!(Mnemonic::ADD, instr.mnemonic);
        assert_eq!(
            Operands::MultOp {
                acs: 1,
                acd: 2,
                shift: ShiftOp::Left,
                carry: CarryOp::Zero,
                no_load: true,
                skip: SkipOp::Szc
            },
            instr.operands
        );
        assert_eq!("ADDZL# 1,2,SZC", instr.to_string());
    }

    #[test]
    fn decodes_nova_io() {
        // DOAS 2,TTO
        let instr = decode_program(&[0o071111], false);
        assert_eq!(Mnemonic::DOA, instr.mnemonic);
        assert_eq!(Some(2), instr.io_ac());
        assert_eq!("DOAS 2,TTO", instr.to_string());

        // SKPDN TTI
        let instr = decode_program(&[0o063610], false);
        assert_eq!(
            Operands::TestDev {
                test: IoTest::DoneNonZero,
                dev: 0o10
            },
            instr.operands
        );
    }

    #[test]
    fn decodes_lef_only_in_lef_mode() {
        let instr = decode_program(&[0o060410], false);
        assert_eq!(Mnemonic::DIA, instr.mnemonic);
        let instr = decode_program(&[0o060410], true);
        assert_eq!(Mnemonic::LEF, instr.mnemonic);
        assert_eq!(InstrClass::EclipseMemRef, instr.class);
    }

    #[test]
    fn decodes_eclipse_extended() {
        // ELDA 1,-300,AC2
        let instr = decode_program(&[0xa438 | 1 << 11 | 2 << 8, 0x7ed4], false);
        assert_eq!(Mnemonic::ELDA, instr.mnemonic);
        assert_eq!(2, instr.len);
        assert_eq!(
            Operands::OneAccEffAddr {
                ac: 1,
                ind: false,
                mode: IndexMode::Ac2,
                disp: -300
            },
            instr.operands
        );
    }

    #[test]
    fn decodes_biased_immediate() {
        // ADI 4,3
        let instr = decode_program(&[0x8008 | 3 << 13 | 3 << 11], false);
        assert_eq!(Mnemonic::ADI, instr.mnemonic);
        assert_eq!(Operands::ImmOneAcc { imm: 4, ac: 3 }, instr.operands);
        assert_eq!("ADI 4,3", instr.to_string());
    }

    #[test]
    fn decodes_eagle_long_reference() {
        // LWLDA 2,@0x12345,AC3
        let instr = decode_program(&[0x83e9 | 2 << 13 | 3 << 11, 0x8001, 0x2345], false);
        assert_eq!(Mnemonic::LWLDA, instr.mnemonic);
        assert_eq!(3, instr.len);
        assert_eq!(
            Operands::OneAccEffAddr {
                ac: 2,
                ind: true,
                mode: IndexMode::Ac3,
                disp: 0x12345
            },
            instr.operands
        );
    }

    #[test]
    fn decodes_lcall() {
        let instr = decode_program(&[0xa6c9 | 1 << 11, 0, 0o10, 2], false);
        assert_eq!(Mnemonic::LCALL, instr.mnemonic);
        assert_eq!(
            Operands::Call {
                ind: false,
                mode: IndexMode::Pc,
                disp: 0o11,
                arg_count: 2
            },
            instr.operands
        );
    }

    #[test]
    fn decodes_split_branch_displacement() {
        // WBR -2: disp 0xfe, high nibble in bits 1-4, low nibble in bits 6-9
        let instr = decode_program(&[0x8038 | 0xf << 11 | 0xe << 6], false);
        assert_eq!(Mnemonic::WBR, instr.mnemonic);
        assert_eq!(Operands::Branch { disp: -2 }, instr.operands);
    }

    #[test]
    fn decodes_bit_number() {
        // WSKBO 27,1: bit 27 = 0b11_011
        let instr = decode_program(&[0x8009 | 3 << 13 | 1 << 11 | 3 << 4], false);
        assert_eq!(Mnemonic::WSKBO, instr.mnemonic);
        assert_eq!(Operands::OneAccBit { ac: 1, bit: 27 }, instr.operands);
    }

    #[test]
    fn reports_undecodable_words() {
        let mem = MainStore::new(0x10);
        let err = decode(&mem, 0x8718, 4, DecodeContext::default());
        assert_eq!(
            Err(CpuError::Decode(DecodeError::NoMatch {
                opcode: 0x8718,
                pc: 4
            })),
            err
        );
    }
}
