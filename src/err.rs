use thiserror::Error;

/// Main Store access outside the configured memory size. Always fatal.
#[derive(Error, Debug, Clone, Copy, Eq, PartialEq)]
pub enum MemoryError {
    #[error("word address {0:#o} is beyond the end of memory")]
    OutOfRange(u32),
}

#[derive(Error, Debug, Clone, Copy, Eq, PartialEq)]
pub enum DecodeError {
    #[error("no instruction matches opcode {opcode:#06x} at PC {pc:#o}")]
    NoMatch { opcode: u16, pc: u32 },
}

/// Faults raised while executing a decoded instruction.
///
/// Most variants describe a condition that would have stopped the real
/// machine. `Unimplemented` is different: it means the emulator does not
/// (yet) know how to execute an instruction that decoded correctly.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum ExecutionFault {
    #[error("processor halted at PC {pc:#o}")]
    Halt { pc: u32 },
    #[error("I/O instruction addressed device {dev:#o}, which is not attached")]
    IoDevice { dev: u8 },
    #[error("I/O instruction not permitted in segment {segment}")]
    IoProtection { segment: u8 },
    #[error("reference to invalid segment {segment} (address {address:#o})")]
    SegmentInvalid { segment: u8, address: u32 },
    #[error("wide stack overflow: WSP {wsp:#o} beyond limit {limit:#o}")]
    StackOverflow { wsp: u32, limit: u32 },
    #[error("immediate value {value} is out of range for {mnemonic}")]
    InvalidImmediate { mnemonic: &'static str, value: i32 },
    #[error("indirection chain starting at {address:#o} did not terminate")]
    IndirectionRunaway { address: u32 },
    #[error("instruction {mnemonic} at PC {pc:#o} is not implemented")]
    Unimplemented { mnemonic: &'static str, pc: u32 },
}

/// Errors reported by the device bus.
#[derive(Error, Debug, Clone, Copy, Eq, PartialEq)]
pub enum BusError {
    #[error("device number {0:#o} is out of range")]
    BadDevice(u8),
    #[error("no device attached at {0:#o}")]
    NoDevice(u8),
    #[error("device {0:#o} is not an I/O device")]
    NotIoDevice(u8),
    #[error("device {0:#o} is already attached")]
    AlreadyAttached(u8),
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum CpuError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Memory(#[from] MemoryError),
    #[error(transparent)]
    Fault(#[from] ExecutionFault),
    #[error(transparent)]
    Bus(#[from] BusError),
}

impl CpuError {
    /// True when the error means emulation cannot meaningfully continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CpuError::Memory(_) | CpuError::Bus(_))
    }

    /// True for conditions the emulated machine itself would have stopped on,
    /// as opposed to gaps in the emulator.
    pub fn halts_machine(&self) -> bool {
        match self {
            CpuError::Fault(ExecutionFault::Unimplemented { .. }) => false,
            CpuError::Fault(_) => true,
            _ => false,
        }
    }
}
