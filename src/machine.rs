use crate::bus::{Bus, Device};
use crate::cpu::Cpu;
use crate::err::{BusError, CpuError, MemoryError};
use crate::history::{History, HistoryEntry};
use crate::mem::MEM_SIZE_WORDS;

use log::{error, info, warn};

/// Construction parameters for a [`Machine`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MachineConfig {
    pub mem_words: usize,
    /// Number of executed instructions to remember; zero disables history.
    pub history_depth: usize,
    /// Attach disassembly text to every decoded instruction.
    pub disassemble: bool,
}

impl Default for MachineConfig {
    fn default() -> MachineConfig {
        MachineConfig {
            mem_words: MEM_SIZE_WORDS,
            history_depth: 0,
            disassemble: false,
        }
    }
}

impl MachineConfig {
    pub fn mem_words(mut self, words: usize) -> MachineConfig {
        self.mem_words = words;
        self
    }

    pub fn history_depth(mut self, depth: usize) -> MachineConfig {
        self.history_depth = depth;
        self
    }

    pub fn disassemble(mut self, on: bool) -> MachineConfig {
        self.disassemble = on;
        self
    }
}

///
/// A complete processor: CPU state, bus and optional execution history.
///
pub struct Machine {
    cpu: Cpu,
    bus: Bus,
    history: Option<History>,
    disassemble: bool,
}

impl Machine {
    pub fn new(config: MachineConfig) -> Machine {
        let history = match config.history_depth {
            0 => None,
            depth => Some(History::new(depth)),
        };
        Machine {
            cpu: Cpu::new(),
            bus: Bus::new(config.mem_words),
            history,
            disassemble: config.disassemble,
        }
    }

    /// Console reset: processor state, device flags and the channel map are
    /// cleared. Main Store is left alone.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.bus.reset_all();
        self.bus.map.reset();
        if let Some(history) = &mut self.history {
            history.clear();
        }
        info!("MACHINE reset");
    }

    pub fn load(&mut self, addr: u32, words: &[u16]) -> Result<(), MemoryError> {
        self.bus.load(addr, words)
    }

    pub fn attach(&mut self, dev: u8, device: Box<dyn Device>) -> Result<(), BusError> {
        self.bus.attach(dev, device)
    }

    /// Fetch, record and execute a single instruction.
    pub fn step(&mut self) -> Result<(), CpuError> {
        let pc = self.cpu.pc;
        let wants_text = self.disassemble || self.history.is_some();
        let instr = match self.cpu.fetch(&self.bus, wants_text) {
            Ok(instr) => instr,
            Err(e) => {
                warn!("MACHINE fetch failed at {:#o}: {}", pc, e);
                return Err(e);
            }
        };

        if let Some(history) = &mut self.history {
            history.push(HistoryEntry::new(&instr, pc));
        }

        let result = self.cpu.execute(&mut self.bus, &instr);
        if let Err(e) = &result {
            if e.halts_machine() || e.is_fatal() {
                error!("MACHINE stopped at {:#o} ({}): {}", pc, instr, e);
            } else {
                warn!("MACHINE {} at {:#o}: {}", instr, pc, e);
            }
        }
        result
    }

    /// Step until a fault stops the processor or `max_steps` instructions
    /// have run. Returns the number of instructions completed.
    pub fn run(&mut self, max_steps: u64) -> Result<u64, CpuError> {
        for n in 0..max_steps {
            if let Err(e) = self.step() {
                info!("MACHINE ran {} instructions before {}", n, e);
                return Err(e);
            }
        }
        Ok(max_steps)
    }

    pub fn get_pc(&self) -> u32 {
        self.cpu.pc
    }

    pub fn set_pc(&mut self, pc: u32) {
        self.cpu.set_pc(pc);
    }

    pub fn get_register(&self, reg: usize) -> u32 {
        self.cpu.ac[reg & 3]
    }

    pub fn get_carry(&self) -> bool {
        self.cpu.carry
    }

    pub fn get_steps(&self) -> u64 {
        self.cpu.get_steps()
    }

    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Cpu {
        &mut self.cpu
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut Bus {
        &mut self.bus
    }

    pub fn history(&self) -> Option<&History> {
        self.history.as_ref()
    }

    /// Render the recorded history oldest first; empty when disabled.
    pub fn dump_history(&self) -> Vec<String> {
        self.history.as_ref().map(History::dump).unwrap_or_default()
    }
}
