use crate::chan::{ChannelMap, Dma};
use crate::cpu::Cpu;
use crate::decode::DecodedInstruction;
use crate::err::{BusError, CpuError, MemoryError};
use crate::mem::MainStore;

use log::debug;
use std::fmt::Debug;

pub const DEVICE_COUNT: usize = 64;

/// The processor itself answers to this device code.
pub const DEV_CPU: u8 = 0o77;
/// Memory-map query device; tolerated when nothing is attached.
pub const DEV_MMU: u8 = 0o01;

/// Device register addressed by a data-in or data-out instruction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum IoRegister {
    A,
    B,
    C,
}

/// A peripheral attached to the I/O bus.
///
/// The bus keeps the busy and done flags; devices only see transfers.
/// Callbacks run synchronously inside the executing I/O instruction.
pub trait Device: Send + Debug {
    fn name(&self) -> &str;

    fn is_io_device(&self) -> bool {
        true
    }

    fn is_bootable(&self) -> bool {
        false
    }

    fn reset(&mut self) {}

    /// DIA/DIB/DIC: place data in the accumulator named by `instr`.
    fn data_in(
        &mut self,
        cpu: &mut Cpu,
        instr: &DecodedInstruction,
        reg: IoRegister,
        dma: &mut Dma,
    ) -> Result<(), CpuError>;

    /// DOA/DOB/DOC: take data from the accumulator named by `instr`.
    fn data_out(
        &mut self,
        cpu: &mut Cpu,
        instr: &DecodedInstruction,
        reg: IoRegister,
        dma: &mut Dma,
    ) -> Result<(), CpuError>;
}

#[derive(Debug, Default)]
struct DeviceSlot {
    device: Option<Box<dyn Device>>,
    busy: bool,
    done: bool,
}

///
/// The system bus: main store, channel map and the 64 device slots.
///
#[derive(Debug)]
pub struct Bus {
    pub mem: MainStore,
    pub map: ChannelMap,
    slots: Vec<DeviceSlot>,
}

impl Bus {
    pub fn new(mem_size_words: usize) -> Bus {
        Bus {
            mem: MainStore::new(mem_size_words),
            map: ChannelMap::new(),
            slots: (0..DEVICE_COUNT).map(|_| DeviceSlot::default()).collect(),
        }
    }

    fn slot(&self, dev: u8) -> Result<&DeviceSlot, BusError> {
        self.slots.get(dev as usize).ok_or(BusError::BadDevice(dev))
    }

    fn slot_mut(&mut self, dev: u8) -> Result<&mut DeviceSlot, BusError> {
        self.slots.get_mut(dev as usize).ok_or(BusError::BadDevice(dev))
    }

    pub fn attach(&mut self, dev: u8, device: Box<dyn Device>) -> Result<(), BusError> {
        let slot = self.slot_mut(dev)?;
        if slot.device.is_some() {
            return Err(BusError::AlreadyAttached(dev));
        }
        debug!("BUS attaching {} at {:#o}", device.name(), dev);
        slot.device = Some(device);
        slot.busy = false;
        slot.done = false;
        Ok(())
    }

    pub fn detach(&mut self, dev: u8) -> Option<Box<dyn Device>> {
        self.slots.get_mut(dev as usize).and_then(|slot| {
            slot.busy = false;
            slot.done = false;
            slot.device.take()
        })
    }

    pub fn is_attached(&self, dev: u8) -> bool {
        self.slot(dev).map(|s| s.device.is_some()).unwrap_or(false)
    }

    pub fn is_io_device(&self, dev: u8) -> bool {
        match self.slot(dev) {
            Ok(DeviceSlot { device: Some(d), .. }) => d.is_io_device(),
            _ => false,
        }
    }

    pub fn is_bootable(&self, dev: u8) -> bool {
        match self.slot(dev) {
            Ok(DeviceSlot { device: Some(d), .. }) => d.is_bootable(),
            _ => false,
        }
    }

    pub fn name(&self, dev: u8) -> Option<&str> {
        match self.slot(dev) {
            Ok(DeviceSlot { device: Some(d), .. }) => Some(d.name()),
            _ => None,
        }
    }

    pub fn busy(&self, dev: u8) -> bool {
        self.slot(dev).map(|s| s.busy).unwrap_or(false)
    }

    pub fn done(&self, dev: u8) -> bool {
        self.slot(dev).map(|s| s.done).unwrap_or(false)
    }

    pub fn set_busy(&mut self, dev: u8, busy: bool) -> Result<(), BusError> {
        self.slot_mut(dev)?.busy = busy;
        Ok(())
    }

    pub fn set_done(&mut self, dev: u8, done: bool) -> Result<(), BusError> {
        self.slot_mut(dev)?.done = done;
        Ok(())
    }

    /// Lowest-numbered device with its done flag raised.
    pub fn first_done(&self) -> Option<u8> {
        self.slots
            .iter()
            .position(|s| s.device.is_some() && s.done)
            .map(|n| n as u8)
    }

    pub fn reset_device(&mut self, dev: u8) -> Result<(), BusError> {
        let slot = self.slot_mut(dev)?;
        slot.busy = false;
        slot.done = false;
        match slot.device.as_mut() {
            Some(d) => {
                d.reset();
                Ok(())
            }
            None => Err(BusError::NoDevice(dev)),
        }
    }

    /// Reset every attached device and clear all busy/done flags.
    pub fn reset_all(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.busy = false;
            slot.done = false;
            if let Some(d) = slot.device.as_mut() {
                d.reset();
            }
        }
    }

    pub fn data_in(
        &mut self,
        dev: u8,
        cpu: &mut Cpu,
        instr: &DecodedInstruction,
        reg: IoRegister,
    ) -> Result<(), CpuError> {
        let Bus { mem, map, slots } = self;
        let slot = slots.get_mut(dev as usize).ok_or(BusError::BadDevice(dev))?;
        let device = slot.device.as_mut().ok_or(BusError::NoDevice(dev))?;
        let mut dma = Dma::new(mem, map);
        device.data_in(cpu, instr, reg, &mut dma)
    }

    pub fn data_out(
        &mut self,
        dev: u8,
        cpu: &mut Cpu,
        instr: &DecodedInstruction,
        reg: IoRegister,
    ) -> Result<(), CpuError> {
        let Bus { mem, map, slots } = self;
        let slot = slots.get_mut(dev as usize).ok_or(BusError::BadDevice(dev))?;
        let device = slot.device.as_mut().ok_or(BusError::NoDevice(dev))?;
        let mut dma = Dma::new(mem, map);
        device.data_out(cpu, instr, reg, &mut dma)
    }

    /// Load a block of words into main store.
    pub fn load(&mut self, addr: u32, words: &[u16]) -> Result<(), MemoryError> {
        self.mem.load(addr, words)
    }
}

/// A device with three latched registers, used by tests.
///
/// DOC additionally copies register A to the DCH address held in register B.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct LatchDevice {
    pub regs: [u16; 3],
    pub resets: u32,
}

#[cfg(test)]
impl Device for LatchDevice {
    fn name(&self) -> &str {
        "LATCH"
    }

    fn reset(&mut self) {
        self.regs = [0; 3];
        self.resets += 1;
    }

    fn data_in(
        &mut self,
        cpu: &mut Cpu,
        instr: &DecodedInstruction,
        reg: IoRegister,
        _dma: &mut Dma,
    ) -> Result<(), CpuError> {
        if let Some(ac) = instr.io_ac() {
            cpu.set_ac16(ac, self.regs[reg as usize]);
        }
        Ok(())
    }

    fn data_out(
        &mut self,
        cpu: &mut Cpu,
        instr: &DecodedInstruction,
        reg: IoRegister,
        dma: &mut Dma,
    ) -> Result<(), CpuError> {
        if let Some(ac) = instr.io_ac() {
            self.regs[reg as usize] = cpu.ac16(ac);
        }
        if reg == IoRegister::C {
            let mut addr = u32::from(self.regs[1]);
            dma.dch_write_block(&mut addr, &self.regs[0..1])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attaches_and_detaches_devices() {
        let mut bus = Bus::new(0x100);
        assert!(!bus.is_attached(0o10));
        bus.attach(0o10, Box::new(LatchDevice::default())).unwrap();
        assert!(bus.is_attached(0o10));
        assert!(bus.is_io_device(0o10));
        assert!(!bus.is_bootable(0o10));
        assert_eq!(Some("LATCH"), bus.name(0o10));
        assert_eq!(
            Err(BusError::AlreadyAttached(0o10)),
            bus.attach(0o10, Box::new(LatchDevice::default()))
        );
        assert!(bus.detach(0o10).is_some());
        assert!(!bus.is_attached(0o10));
    }

    #[test]
    fn rejects_bad_device_numbers() {
        let mut bus = Bus::new(0x100);
        assert_eq!(Err(BusError::BadDevice(64)), bus.set_busy(64, true));
        assert!(!bus.busy(64));
    }

    #[test]
    fn tracks_busy_and_done() {
        let mut bus = Bus::new(0x100);
        bus.attach(0o11, Box::new(LatchDevice::default())).unwrap();
        bus.attach(0o12, Box::new(LatchDevice::default())).unwrap();
        assert_eq!(None, bus.first_done());
        bus.set_done(0o12, true).unwrap();
        bus.set_busy(0o11, true).unwrap();
        assert!(bus.busy(0o11));
        assert_eq!(Some(0o12), bus.first_done());

        bus.reset_all();
        assert!(!bus.busy(0o11));
        assert!(!bus.done(0o12));
        assert_eq!(None, bus.first_done());
    }

    #[test]
    fn reset_device_requires_attachment() {
        let mut bus = Bus::new(0x100);
        assert_eq!(Err(BusError::NoDevice(0o20)), bus.reset_device(0o20));
    }
}
