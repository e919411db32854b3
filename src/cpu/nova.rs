use super::Cpu;
use crate::bus::{Bus, IoRegister, DEV_CPU, DEV_MMU};
use crate::decode::{CarryOp, DecodedInstruction, IoFlag, IoTest, Operands, ShiftOp, SkipOp};
use crate::err::{CpuError, ExecutionFault};
use crate::instr::Mnemonic;

use log::{trace, warn};

/// Apply a Nova shift to a 16-bit result and carry, rotating through carry.
pub(super) fn shift16(result: u16, carry: bool, shift: ShiftOp) -> (u16, bool) {
    match shift {
        ShiftOp::None => (result, carry),
        ShiftOp::Left => (result << 1 | carry as u16, result & 0x8000 != 0),
        ShiftOp::Right => (result >> 1 | (carry as u16) << 15, result & 1 != 0),
        ShiftOp::Swap => (result.swap_bytes(), carry),
    }
}

fn skip_taken(skip: SkipOp, result: u16, carry: bool) -> bool {
    match skip {
        SkipOp::Never => false,
        SkipOp::Always => true,
        SkipOp::Szc => !carry,
        SkipOp::Snc => carry,
        SkipOp::Szr => result == 0,
        SkipOp::Snr => result != 0,
        SkipOp::Sez => !carry || result == 0,
        SkipOp::Sbn => carry && result != 0,
    }
}

fn io_register(mnemonic: Mnemonic) -> IoRegister {
    match mnemonic {
        Mnemonic::DIA | Mnemonic::DOA => IoRegister::A,
        Mnemonic::DIB | Mnemonic::DOB => IoRegister::B,
        _ => IoRegister::C,
    }
}

impl Cpu {
    pub(super) fn nova_mem_ref(
        &mut self,
        bus: &mut Bus,
        instr: &DecodedInstruction,
    ) -> Result<(), CpuError> {
        match instr.mnemonic {
            Mnemonic::LDA => {
                let (ac, ind, mode, disp) = operands!(self, instr,
                    Operands::OneAccEffAddr { ac, ind, mode, disp } => (ac, ind, mode, disp));
                let ea = self.resolve16(bus, ind, mode, disp)?;
                let val = self.read_word(bus, ea)?;
                self.set_ac16(ac, val);
                self.advance(1);
            }
            Mnemonic::STA => {
                let (ac, ind, mode, disp) = operands!(self, instr,
                    Operands::OneAccEffAddr { ac, ind, mode, disp } => (ac, ind, mode, disp));
                let ea = self.resolve16(bus, ind, mode, disp)?;
                self.write_word(bus, ea, self.ac16(ac))?;
                self.advance(1);
            }
            Mnemonic::ISZ | Mnemonic::DSZ => {
                let (ind, mode, disp) = operands!(self, instr,
                    Operands::NoAccEffAddr { ind, mode, disp } => (ind, mode, disp));
                let ea = self.resolve16(bus, ind, mode, disp)?;
                let val = self.read_word(bus, ea)?;
                let val = if instr.mnemonic == Mnemonic::ISZ {
                    val.wrapping_add(1)
                } else {
                    val.wrapping_sub(1)
                };
                self.write_word(bus, ea, val)?;
                self.skip_if(instr, val == 0);
            }
            _ => return Err(self.unimplemented(instr)),
        }
        Ok(())
    }

    pub(super) fn nova_pc(&mut self, bus: &mut Bus, instr: &DecodedInstruction) -> Result<(), CpuError> {
        let (ind, mode, disp) = operands!(self, instr,
            Operands::NoAccEffAddr { ind, mode, disp } => (ind, mode, disp));
        let ea = self.resolve16(bus, ind, mode, disp)?;
        match instr.mnemonic {
            Mnemonic::JMP => {}
            Mnemonic::JSR => {
                let ret = self.pc.wrapping_add(1) as u16;
                self.set_ac16(3, ret);
            }
            _ => return Err(self.unimplemented(instr)),
        }
        self.pc = ea;
        Ok(())
    }

    /// Two-accumulator multiple operation.
    pub(super) fn nova_op(&mut self, instr: &DecodedInstruction) -> Result<(), CpuError> {
        let (acs, acd, shift, carry, no_load, skip) = operands!(self, instr,
            Operands::MultOp { acs, acd, shift, carry, no_load, skip } =>
                (acs, acd, shift, carry, no_load, skip));

        let base = match carry {
            CarryOp::None => self.carry,
            CarryOp::Zero => false,
            CarryOp::One => true,
            CarryOp::Complement => !self.carry,
        };
        let s = u32::from(self.ac16(acs));
        let d = u32::from(self.ac16(acd));

        let (result, c) = match instr.mnemonic {
            Mnemonic::COM => (!s, base),
            Mnemonic::NEG => ((!s).wrapping_add(1), base ^ (s == 0)),
            Mnemonic::MOV => (s, base),
            Mnemonic::INC => (s + 1, base ^ (s == 0xffff)),
            Mnemonic::ADC => {
                let sum = d + (!s & 0xffff);
                (sum, base ^ (sum > 0xffff))
            }
            Mnemonic::SUB => (d.wrapping_sub(s), base ^ (s <= d)),
            Mnemonic::ADD => {
                let sum = d + s;
                (sum, base ^ (sum > 0xffff))
            }
            Mnemonic::AND => (d & s, base),
            _ => return Err(self.unimplemented(instr)),
        };

        let (result, c) = shift16(result as u16, c, shift);
        let skip = skip_taken(skip, result, c);

        if !no_load {
            self.set_ac16(acd, result);
            self.carry = c;
        }
        self.skip_if(instr, skip);
        Ok(())
    }

    pub(super) fn nova_io(&mut self, bus: &mut Bus, instr: &DecodedInstruction) -> Result<(), CpuError> {
        if !self.io_allowed() {
            return Err(ExecutionFault::IoProtection {
                segment: self.segment() as u8,
            }
            .into());
        }

        match instr.mnemonic {
            Mnemonic::INTEN => self.ion = true,
            Mnemonic::INTDS => self.ion = false,
            Mnemonic::READS => {
                let ac = operands!(self, instr, Operands::OneAcc { ac } => ac);
                self.set_ac16(ac, self.switches);
            }
            Mnemonic::INTA => {
                let ac = operands!(self, instr, Operands::OneAcc { ac } => ac);
                self.set_ac16(ac, u16::from(bus.first_done().unwrap_or(0)));
            }
            Mnemonic::MSKO => {
                let ac = operands!(self, instr, Operands::OneAcc { ac } => ac);
                self.mask = self.ac16(ac);
            }
            Mnemonic::IORST => self.io_reset(bus),
            Mnemonic::HALT => return Err(ExecutionFault::Halt { pc: self.pc }.into()),
            Mnemonic::NIO => {
                let (flag, dev) = operands!(self, instr, Operands::FlagsDev { flag, dev } => (flag, dev));
                if dev == DEV_CPU {
                    self.cpu_flag(flag);
                } else if self.device_ready(bus, dev)? {
                    Self::device_flag(bus, dev, flag)?;
                }
            }
            Mnemonic::SKP => {
                let (test, dev) = operands!(self, instr, Operands::TestDev { test, dev } => (test, dev));
                let skip = if dev == DEV_CPU {
                    match test {
                        IoTest::BusyNonZero => self.ion,
                        IoTest::BusyZero => !self.ion,
                        // No power failure to report.
                        IoTest::DoneNonZero => false,
                        IoTest::DoneZero => true,
                    }
                } else if self.device_ready(bus, dev)? {
                    match test {
                        IoTest::BusyNonZero => bus.busy(dev),
                        IoTest::BusyZero => !bus.busy(dev),
                        IoTest::DoneNonZero => bus.done(dev),
                        IoTest::DoneZero => !bus.done(dev),
                    }
                } else {
                    false
                };
                self.skip_if(instr, skip);
                return Ok(());
            }
            Mnemonic::DIA
            | Mnemonic::DIB
            | Mnemonic::DIC
            | Mnemonic::DOA
            | Mnemonic::DOB
            | Mnemonic::DOC => {
                let (ac, flag, dev) = operands!(self, instr,
                    Operands::DataIo { ac, flag, dev } => (ac, flag, dev));
                if dev == DEV_CPU {
                    self.cpu_data_io(bus, instr, ac)?;
                    self.cpu_flag(flag);
                } else if self.device_ready(bus, dev)? {
                    let reg = io_register(instr.mnemonic);
                    match instr.mnemonic {
                        Mnemonic::DIA | Mnemonic::DIB | Mnemonic::DIC => {
                            bus.data_in(dev, self, instr, reg)?
                        }
                        _ => bus.data_out(dev, self, instr, reg)?,
                    }
                    Self::device_flag(bus, dev, flag)?;
                }
            }
            _ => return Err(self.unimplemented(instr)),
        }

        self.advance(1);
        Ok(())
    }

    /// Check a device can take part in I/O. The memory-map query device is
    /// tolerated when absent; anything else unattached stops the machine.
    fn device_ready(&self, bus: &Bus, dev: u8) -> Result<bool, CpuError> {
        if bus.is_attached(dev) && bus.is_io_device(dev) {
            return Ok(true);
        }
        if dev == DEV_MMU {
            warn!("CPU I/O to absent map device at PC {:#o} ignored", self.pc);
            return Ok(false);
        }
        Err(ExecutionFault::IoDevice { dev }.into())
    }

    fn device_flag(bus: &mut Bus, dev: u8, flag: IoFlag) -> Result<(), CpuError> {
        match flag {
            IoFlag::None => {}
            IoFlag::Start => {
                bus.set_busy(dev, true)?;
                bus.set_done(dev, false)?;
            }
            IoFlag::Clear => {
                bus.set_busy(dev, false)?;
                bus.set_done(dev, false)?;
            }
            IoFlag::Pulse => trace!("CPU pulse to device {:#o}", dev),
        }
        Ok(())
    }

    /// Control flags addressed to the CPU switch the interrupt system.
    fn cpu_flag(&mut self, flag: IoFlag) {
        match flag {
            IoFlag::Start => self.ion = true,
            IoFlag::Clear => self.ion = false,
            IoFlag::None | IoFlag::Pulse => {}
        }
    }

    /// Generic data I/O forms addressed to the CPU device.
    fn cpu_data_io(&mut self, bus: &mut Bus, instr: &DecodedInstruction, ac: usize) -> Result<(), CpuError> {
        match instr.mnemonic {
            Mnemonic::DIA => self.set_ac16(ac, self.switches),
            Mnemonic::DIB => self.set_ac16(ac, u16::from(bus.first_done().unwrap_or(0))),
            Mnemonic::DIC => self.io_reset(bus),
            Mnemonic::DOA => trace!("CPU console lights <- {:#o}", self.ac16(ac)),
            Mnemonic::DOB => self.mask = self.ac16(ac),
            Mnemonic::DOC => return Err(ExecutionFault::Halt { pc: self.pc }.into()),
            _ => return Err(self.unimplemented(instr)),
        }
        Ok(())
    }

    fn io_reset(&mut self, bus: &mut Bus) {
        bus.reset_all();
        self.mask = 0;
    }
}
