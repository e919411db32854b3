use crate::err::MemoryError;

use log::{log_enabled, trace, Level};
use std::ops::Index;
use std::vec::Vec;

/// Default physical memory size in 16-bit words (16 MB).
pub const MEM_SIZE_WORDS: usize = 8 * 1024 * 1024;

///
/// Physical main store: a flat array of 16-bit words.
///
/// Double-words are stored high word first. Bytes are the two halves of a
/// word; the "low" byte is the right-hand (least significant) half, which is
/// also the byte selected by an odd byte address.
///
#[derive(Debug)]
pub struct MainStore {
    ram: Vec<u16>,
}

impl MainStore {
    pub fn new(size_words: usize) -> MainStore {
        MainStore {
            ram: vec![0; size_words],
        }
    }

    pub fn size_words(&self) -> usize {
        self.ram.len()
    }

    fn offset(&self, addr: u32) -> Result<usize, MemoryError> {
        let offset = addr as usize;
        if offset >= self.ram.len() {
            Err(MemoryError::OutOfRange(addr))
        } else {
            Ok(offset)
        }
    }

    pub fn read_word(&self, addr: u32) -> Result<u16, MemoryError> {
        Ok(self.ram[self.offset(addr)?])
    }

    /// The single primitive through which all memory mutation flows.
    pub fn write_word(&mut self, addr: u32, val: u16) -> Result<(), MemoryError> {
        let offset = self.offset(addr)?;
        if log_enabled!(Level::Trace) {
            trace!("MEM {:011o} <- {:06o} (was {:06o})", addr, val, self.ram[offset]);
        }
        self.ram[offset] = val;
        Ok(())
    }

    pub fn read_dword(&self, addr: u32) -> Result<u32, MemoryError> {
        let hi = self.read_word(addr)?;
        let lo = self.read_word(addr.wrapping_add(1))?;
        Ok(u32::from(hi) << 16 | u32::from(lo))
    }

    pub fn write_dword(&mut self, addr: u32, val: u32) -> Result<(), MemoryError> {
        // Check the far end first so a failed write leaves memory untouched.
        self.offset(addr.wrapping_add(1))?;
        self.write_word(addr, (val >> 16) as u16)?;
        self.write_word(addr.wrapping_add(1), val as u16)
    }

    pub fn read_byte(&self, addr: u32, lo_byte: bool) -> Result<u8, MemoryError> {
        let word = self.read_word(addr)?;
        if lo_byte {
            Ok(word as u8)
        } else {
            Ok((word >> 8) as u8)
        }
    }

    pub fn write_byte(&mut self, addr: u32, lo_byte: bool, val: u8) -> Result<(), MemoryError> {
        let word = self.read_word(addr)?;
        let word = if lo_byte {
            (word & 0xff00) | u16::from(val)
        } else {
            (word & 0x00ff) | u16::from(val) << 8
        };
        self.write_word(addr, word)
    }

    /// Read a byte given a byte address (word address * 2, plus 1 for the low byte).
    pub fn read_byte_ba(&self, byte_addr: u32) -> Result<u8, MemoryError> {
        self.read_byte(byte_addr >> 1, byte_addr & 1 == 1)
    }

    pub fn write_byte_ba(&mut self, byte_addr: u32, val: u8) -> Result<(), MemoryError> {
        self.write_byte(byte_addr >> 1, byte_addr & 1 == 1, val)
    }

    /// Load a block of words into memory at the specified address.
    pub fn load(&mut self, addr: u32, words: &[u16]) -> Result<(), MemoryError> {
        let end = addr as usize + words.len();
        if end > self.ram.len() {
            return Err(MemoryError::OutOfRange(end as u32));
        }
        for (i, word) in words.iter().enumerate() {
            self.write_word(addr + i as u32, *word)?;
        }
        Ok(())
    }

    /// Zero all of memory.
    pub fn clear(&mut self) {
        for word in self.ram.iter_mut() {
            *word = 0;
        }
    }
}

impl Index<usize> for MainStore {
    type Output = u16;

    fn index(&self, idx: usize) -> &u16 {
        &self.ram[idx]
    }
}
