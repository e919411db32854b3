use crate::decode::DecodedInstruction;

use ringbuffer::{AllocRingBuffer, RingBuffer};
use std::fmt;

///
/// Bounded record of recently executed instructions.
///

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct HistoryEntry {
    pub pc: u32,
    pub text: String,
}

impl HistoryEntry {
    pub fn new(instr: &DecodedInstruction, pc: u32) -> HistoryEntry {
        let text = match &instr.disassembly {
            Some(text) => text.clone(),
            None => crate::decode::disassemble(instr),
        };
        HistoryEntry { pc, text }
    }
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:011o}:\t{}", self.pc, self.text)
    }
}

pub struct History {
    entries: AllocRingBuffer<HistoryEntry>,
}

impl History {
    /// `capacity` must be non-zero.
    pub fn new(capacity: usize) -> History {
        History {
            entries: AllocRingBuffer::new(capacity),
        }
    }

    /// Record an entry, evicting the oldest when full.
    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.enqueue(entry);
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Render the whole history, one instruction per line.
    pub fn dump(&self) -> Vec<String> {
        self.iter().map(|e| e.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(text: &str) -> HistoryEntry {
        HistoryEntry {
            pc: 0o400,
            text: text.to_owned(),
        }
    }

    #[test]
    fn creates_history_with_initial_capacity() {
        let history = History::new(1024);
        assert_eq!(1024, history.capacity());
        assert!(history.is_empty());
    }

    #[test]
    fn evicts_oldest_entries() {
        let mut history = History::new(3);
        for text in &["FOO", "BAR", "BAZ", "QUUX", "FLATCH"] {
            history.push(entry(text));
        }
        assert_eq!(3, history.len());

        let texts: Vec<&str> = history.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(vec!["BAZ", "QUUX", "FLATCH"], texts);

        history.clear();
        assert_eq!(0, history.len());
    }

    #[test]
    fn dumps_with_octal_pc() {
        let mut history = History::new(2);
        history.push(entry("HALT"));
        assert_eq!(vec!["00000000400:\tHALT".to_owned()], history.dump());
    }
}
